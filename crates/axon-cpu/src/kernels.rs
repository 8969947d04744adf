use rayon::prelude::*;

use axon_core::backend::{BinaryOp, CmpOp, UnaryOp};
use axon_core::dtype::{cast_scalar, DType, KernelFault, KernelResult, WithDType};
use axon_core::error::{Error, Result};
use axon_core::layout::Layout;

use crate::storage::CpuElement;

// Element-wise kernels
//
// Every kernel walks its inputs through their layouts, so broadcast, sliced
// and flipped views are read in place. The output is split into fixed-size
// chunks; each chunk seeks its own StridedIter to the chunk start, which lets
// rayon fill chunks independently once a buffer is large enough.

/// Buffers with at least this many elements are processed on the rayon pool.
pub const PARALLEL_THRESHOLD: usize = 1 << 15;

/// Elements per work item, for both the sequential and the parallel path.
pub(crate) const CHUNK_SIZE: usize = 4096;

/// Fill `out` chunk by chunk. `fill` receives the logical index of the first
/// element of its chunk.
pub(crate) fn fill_chunks<T, F>(out: &mut [T], fill: F) -> KernelResult<()>
where
    T: Send,
    F: Fn(usize, &mut [T]) -> KernelResult<()> + Send + Sync,
{
    if out.len() >= PARALLEL_THRESHOLD {
        out.par_chunks_mut(CHUNK_SIZE)
            .enumerate()
            .try_for_each(|(i, chunk)| fill(i * CHUNK_SIZE, chunk))
    } else {
        out.chunks_mut(CHUNK_SIZE)
            .enumerate()
            .try_for_each(|(i, chunk)| fill(i * CHUNK_SIZE, chunk))
    }
}

/// Turn a scalar kernel failure into an error naming the op and dtype.
pub(crate) fn fault_error(op: &'static str, dtype: DType, fault: KernelFault) -> Error {
    match fault {
        KernelFault::DivisionByZero => Error::DivisionByZero { op, dtype },
        KernelFault::Unsupported if op == "pow" && dtype.is_int() => {
            Error::not_implemented(op, format!("negative exponents on {dtype}"))
        }
        KernelFault::Unsupported => Error::not_implemented(op, format!("{dtype} operands")),
    }
}

fn binary_fn<T: WithDType>(op: BinaryOp) -> fn(T, T) -> KernelResult<T> {
    match op {
        BinaryOp::Add => T::try_add,
        BinaryOp::Sub => T::try_sub,
        BinaryOp::Mul => T::try_mul,
        BinaryOp::Div => T::try_div,
        BinaryOp::Pow => T::try_pow,
    }
}

/// `out[i] = op(lhs[i], rhs[i])` over two layouts of the same shape.
pub fn binary<T: CpuElement>(
    op: BinaryOp,
    lhs: &[T],
    lhs_layout: &Layout,
    rhs: &[T],
    rhs_layout: &Layout,
) -> Result<Vec<T>> {
    let f = binary_fn::<T>(op);
    let mut out = vec![T::zero(); lhs_layout.elem_count()];
    fill_chunks(&mut out, |start, chunk| {
        let li = lhs_layout.strided_indices_from(start);
        let ri = rhs_layout.strided_indices_from(start);
        for ((o, a), b) in chunk.iter_mut().zip(li).zip(ri) {
            *o = f(lhs[a], rhs[b])?;
        }
        Ok(())
    })
    .map_err(|fault| fault_error(op.name(), T::DTYPE, fault))?;
    Ok(out)
}

/// `out[i] = op(x[i], s)`, or `op(s, x[i])` when `reflected`.
pub fn scalar<T: CpuElement>(
    op: BinaryOp,
    input: &[T],
    layout: &Layout,
    scalar: f64,
    reflected: bool,
) -> Result<Vec<T>> {
    let f = binary_fn::<T>(op);
    let s = T::from_f64(scalar);
    let mut out = vec![T::zero(); layout.elem_count()];
    fill_chunks(&mut out, |start, chunk| {
        for (o, i) in chunk.iter_mut().zip(layout.strided_indices_from(start)) {
            *o = if reflected { f(s, input[i])? } else { f(input[i], s)? };
        }
        Ok(())
    })
    .map_err(|fault| fault_error(op.name(), T::DTYPE, fault))?;
    Ok(out)
}

/// Unary kernels. Transcendentals go through f64 and are cast back.
pub fn unary<T: CpuElement>(op: UnaryOp, input: &[T], layout: &Layout) -> Result<Vec<T>> {
    let f: Box<dyn Fn(T) -> KernelResult<T> + Send + Sync> = match op {
        UnaryOp::Neg => Box::new(|x: T| x.try_neg()),
        UnaryOp::Abs => Box::new(|x: T| Ok(x.absolute())),
        UnaryOp::Square => Box::new(|x: T| x.try_mul(x)),
        _ => Box::new(move |x: T| Ok(T::from_f64(op.eval_f64(x.to_f64())))),
    };
    let mut out = vec![T::zero(); layout.elem_count()];
    fill_chunks(&mut out, |start, chunk| {
        for (o, i) in chunk.iter_mut().zip(layout.strided_indices_from(start)) {
            *o = f(input[i])?;
        }
        Ok(())
    })
    .map_err(|fault| fault_error(op.name(), T::DTYPE, fault))?;
    Ok(out)
}

/// Element-wise comparison into a bool buffer.
pub fn cmp<T: CpuElement>(
    op: CmpOp,
    lhs: &[T],
    lhs_layout: &Layout,
    rhs: &[T],
    rhs_layout: &Layout,
) -> Vec<bool> {
    let f: fn(&T, &T) -> bool = match op {
        CmpOp::Eq => |a, b| a == b,
        CmpOp::Ne => |a, b| a != b,
        CmpOp::Gt => |a, b| a > b,
        CmpOp::Ge => |a, b| a >= b,
        CmpOp::Lt => |a, b| a < b,
        CmpOp::Le => |a, b| a <= b,
    };
    let mut out = vec![false; lhs_layout.elem_count()];
    let filled: KernelResult<()> = fill_chunks(&mut out, |start, chunk| {
        let li = lhs_layout.strided_indices_from(start);
        let ri = rhs_layout.strided_indices_from(start);
        for ((o, a), b) in chunk.iter_mut().zip(li).zip(ri) {
            *o = f(&lhs[a], &rhs[b]);
        }
        Ok(())
    });
    debug_assert!(filled.is_ok());
    out
}

/// Pack the elements selected by `layout`, converting each with `convert`.
pub fn gather_map<S, D, F>(input: &[S], layout: &Layout, convert: F) -> Vec<D>
where
    S: WithDType,
    D: Copy + Default + Send,
    F: Fn(S) -> D + Send + Sync,
{
    if let Some((start, end)) = layout.contiguous_range() {
        return input[start..end].iter().map(|&x| convert(x)).collect();
    }
    let mut out = vec![D::default(); layout.elem_count()];
    let filled: KernelResult<()> = fill_chunks(&mut out, |start, chunk| {
        for (o, i) in chunk.iter_mut().zip(layout.strided_indices_from(start)) {
            *o = convert(input[i]);
        }
        Ok(())
    });
    debug_assert!(filled.is_ok());
    out
}

pub fn gather<T: CpuElement>(input: &[T], layout: &Layout) -> Vec<T> {
    if let Some((start, end)) = layout.contiguous_range() {
        return input[start..end].to_vec();
    }
    let mut out = vec![T::zero(); layout.elem_count()];
    let filled: KernelResult<()> = fill_chunks(&mut out, |start, chunk| {
        for (o, i) in chunk.iter_mut().zip(layout.strided_indices_from(start)) {
            *o = input[i];
        }
        Ok(())
    });
    debug_assert!(filled.is_ok());
    out
}

/// Re-encode as `D` under the uniform cast policy.
pub fn cast<S: CpuElement, D: CpuElement>(input: &[S], layout: &Layout) -> Vec<D> {
    if let Some((start, end)) = layout.contiguous_range() {
        return input[start..end].iter().map(|&x| cast_scalar::<S, D>(x)).collect();
    }
    let mut out = vec![D::zero(); layout.elem_count()];
    let filled: KernelResult<()> = fill_chunks(&mut out, |start, chunk| {
        for (o, i) in chunk.iter_mut().zip(layout.strided_indices_from(start)) {
            *o = cast_scalar::<S, D>(input[i]);
        }
        Ok(())
    });
    debug_assert!(filled.is_ok());
    out
}
