use rayon::prelude::*;

use axon_core::backend::ReduceOp;
use axon_core::dtype::{KernelResult, WithDType};
use axon_core::error::{Error, Result};
use axon_core::layout::Layout;
use axon_core::shape::Shape;

use crate::kernels::{fault_error, fill_chunks, CHUNK_SIZE, PARALLEL_THRESHOLD};
use crate::storage::{CpuElement, CpuStorage};

// Reductions
//
// Global reductions cut the logical element sequence into CHUNK_SIZE pieces,
// fold each piece on its own (in parallel above the threshold) and then
// combine the partials left to right. The chunk boundaries depend only on
// the element count, so a float sum is bit-identical for any thread count.
//
// Axis reductions give every output element to one task, which folds its
// lane sequentially.

/// Fold step shared by every value reduction. Max and min propagate NaN.
fn fold<T: WithDType>(op: ReduceOp, acc: T, x: T) -> KernelResult<T> {
    match op {
        ReduceOp::Sum => acc.try_add(x),
        ReduceOp::Prod => acc.try_mul(x),
        ReduceOp::Max => Ok(if acc.is_nan() || (!x.is_nan() && acc >= x) { acc } else { x }),
        ReduceOp::Min => Ok(if acc.is_nan() || (!x.is_nan() && acc <= x) { acc } else { x }),
        ReduceOp::ArgMax | ReduceOp::ArgMin => Err(axon_core::KernelFault::Unsupported),
    }
}

/// Whether `x` replaces the current arg-candidate `best`. Ties keep the
/// earlier index; the first NaN wins outright.
fn arg_better<T: WithDType>(op: ReduceOp, best: T, x: T) -> bool {
    if best.is_nan() {
        return false;
    }
    if x.is_nan() {
        return true;
    }
    match op {
        ReduceOp::ArgMax => x > best,
        _ => x < best,
    }
}

/// Fold a run of values. `None` for an empty run of max/min/arg*.
fn fold_values<T: WithDType>(
    op: ReduceOp,
    values: impl Iterator<Item = (usize, T)>,
) -> KernelResult<Option<(usize, T)>> {
    let mut acc: Option<(usize, T)> = match op {
        ReduceOp::Sum => Some((0, T::zero())),
        ReduceOp::Prod => Some((0, T::one())),
        _ => None,
    };
    for (i, x) in values {
        acc = Some(match acc {
            None => (i, x),
            Some((bi, b)) => match op {
                ReduceOp::ArgMax | ReduceOp::ArgMin => {
                    if arg_better(op, b, x) {
                        (i, x)
                    } else {
                        (bi, b)
                    }
                }
                _ => (0, fold(op, b, x)?),
            },
        });
    }
    Ok(acc)
}

fn empty_error(op: ReduceOp) -> Error {
    Error::msg(format!(
        "{}: zero-size reduction has no identity",
        op.name()
    ))
}

fn wrap<T: CpuElement>(op: ReduceOp, values: Vec<(usize, T)>) -> CpuStorage {
    match op {
        ReduceOp::ArgMax | ReduceOp::ArgMin => {
            CpuStorage::I64(values.into_iter().map(|(i, _)| i as i64).collect())
        }
        _ => T::into_storage(values.into_iter().map(|(_, v)| v).collect()),
    }
}

/// Reduce over every element in logical order.
fn reduce_all<T: CpuElement>(op: ReduceOp, data: &[T], layout: &Layout) -> Result<CpuStorage> {
    let n = layout.elem_count();
    let chunk = |c: usize| {
        let start = c * CHUNK_SIZE;
        let len = CHUNK_SIZE.min(n - start);
        let values = layout
            .strided_indices_from(start)
            .take(len)
            .enumerate()
            .map(|(k, i)| (start + k, data[i]));
        fold_values(op, values)
    };
    let n_chunks = n.div_ceil(CHUNK_SIZE);
    let partials: KernelResult<Vec<Option<(usize, T)>>> = if n >= PARALLEL_THRESHOLD {
        (0..n_chunks).into_par_iter().map(chunk).collect()
    } else {
        (0..n_chunks).map(chunk).collect()
    };
    let partials = partials.map_err(|f| fault_error(op.name(), T::DTYPE, f))?;

    // partials are (index, value) pairs, so arg* folds across chunks the same
    // way it folds inside one
    let combined = fold_values(op, partials.into_iter().flatten())
        .map_err(|f| fault_error(op.name(), T::DTYPE, f))?;
    let result = combined.ok_or_else(|| empty_error(op))?;
    Ok(wrap(op, vec![result]))
}

/// Reduce along `axis`, returning one value per remaining position.
fn reduce_axis<T: CpuElement>(
    op: ReduceOp,
    data: &[T],
    layout: &Layout,
    axis: usize,
) -> Result<CpuStorage> {
    let len = layout.dims()[axis];
    let step = layout.strides()[axis];

    // layout of the lane starts: the input with `axis` dropped
    let mut dims = layout.dims().to_vec();
    let mut strides = layout.strides().to_vec();
    dims.remove(axis);
    strides.remove(axis);
    let lanes = Layout::new(Shape::new(dims), strides, layout.offset());
    let n_out = lanes.elem_count();
    if len == 0 && n_out > 0 && !matches!(op, ReduceOp::Sum | ReduceOp::Prod) {
        return Err(empty_error(op));
    }

    let lane = |base: usize| {
        let values = (0..len).map(|k| (k, data[(base as isize + k as isize * step) as usize]));
        fold_values(op, values)
    };

    let mut out: Vec<(usize, T)> = vec![(0, T::zero()); n_out];
    fill_chunks(&mut out, |start, chunk| {
        for (o, base) in chunk.iter_mut().zip(lanes.strided_indices_from(start)) {
            // empty lanes were rejected above for ops without an identity
            *o = lane(base)?.unwrap_or((0, T::zero()));
        }
        Ok(())
    })
    .map_err(|f| fault_error(op.name(), T::DTYPE, f))?;
    Ok(wrap(op, out))
}

pub fn reduce<T: CpuElement>(
    op: ReduceOp,
    data: &[T],
    layout: &Layout,
    axis: Option<usize>,
) -> Result<CpuStorage> {
    match axis {
        None => reduce_all(op, data, layout),
        Some(a) => reduce_axis(op, data, layout, a),
    }
}
