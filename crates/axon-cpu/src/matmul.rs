use rayon::prelude::*;

use axon_core::dtype::KernelResult;
use axon_core::error::{Error, Result};
use axon_core::layout::Layout;
use axon_core::shape::Shape;

use crate::kernels::{fault_error, PARALLEL_THRESHOLD};
use crate::storage::CpuElement;

// Batched GEMM
//
// Operands arrive as [..batch, m, k] and [..batch, k, n] layouts that were
// already broadcast to the same batch dims, so a batch axis may have stride
// 0. The kernel reads both operands through their strides and parallelises
// over output rows once the multiply-add count crosses the threshold.

/// Flat offsets of each batch entry: the leading dims of `layout` walked
/// with the layout's own strides.
fn batch_offsets(layout: &Layout) -> Vec<usize> {
    let nb = layout.rank() - 2;
    let batch = Layout::new(
        Shape::from(&layout.dims()[..nb]),
        layout.strides()[..nb].to_vec(),
        layout.offset(),
    );
    batch.strided_indices().collect()
}

pub fn matmul<T: CpuElement>(
    lhs: &[T],
    lhs_layout: &Layout,
    rhs: &[T],
    rhs_layout: &Layout,
) -> Result<Vec<T>> {
    let (ld, rd) = (lhs_layout.dims(), rhs_layout.dims());
    if ld.len() < 2 || ld.len() != rd.len() {
        return Err(Error::msg(format!(
            "matmul kernel expects matching batched operands, got {} and {}",
            lhs_layout.shape(),
            rhs_layout.shape()
        )));
    }
    let r = ld.len();
    let (m, k) = (ld[r - 2], ld[r - 1]);
    let n = rd[r - 1];
    if rd[r - 2] != k {
        return Err(Error::MatmulShapeMismatch { m, k1: k, k2: rd[r - 2], n });
    }

    let (ls_m, ls_k) = (lhs_layout.strides()[r - 2], lhs_layout.strides()[r - 1]);
    let (rs_k, rs_n) = (rhs_layout.strides()[r - 2], rhs_layout.strides()[r - 1]);
    let lhs_base = batch_offsets(lhs_layout);
    let rhs_base = batch_offsets(rhs_layout);

    let mut out = vec![T::zero(); lhs_base.len() * m * n];
    if out.is_empty() {
        return Ok(out);
    }

    let row = |r: usize, dst: &mut [T]| -> KernelResult<()> {
        let (b, i) = (r / m, r % m);
        let a_row = lhs_base[b] as isize + i as isize * ls_m;
        let b0 = rhs_base[b] as isize;
        for (j, o) in dst.iter_mut().enumerate() {
            let mut acc = T::zero();
            for p in 0..k {
                let a = lhs[(a_row + p as isize * ls_k) as usize];
                let bv = rhs[(b0 + p as isize * rs_k + j as isize * rs_n) as usize];
                acc = acc.try_add(a.try_mul(bv)?)?;
            }
            *o = acc;
        }
        Ok(())
    };

    let work = out.len() * k.max(1);
    let filled = if work >= PARALLEL_THRESHOLD {
        out.par_chunks_mut(n)
            .enumerate()
            .try_for_each(|(r, dst)| row(r, dst))
    } else {
        out.chunks_mut(n)
            .enumerate()
            .try_for_each(|(r, dst)| row(r, dst))
    };
    filled.map_err(|f| fault_error("matmul", T::DTYPE, f))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(dims: &[usize]) -> Layout {
        Layout::contiguous(Shape::from(dims))
    }

    #[test]
    fn test_matmul_2x2() {
        let a = [1.0f64, 2.0, 3.0, 4.0];
        let b = [5.0f64, 6.0, 7.0, 8.0];
        let out = matmul(&a, &layout(&[2, 2]), &b, &layout(&[2, 2])).unwrap();
        assert_eq!(out, vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_matmul_transposed_rhs() {
        // a @ b.T with b stored row-major as [[1, 0], [0, 1], [1, 1]]
        let a = [1i32, 2, 3, 4];
        let b = [1i32, 0, 0, 1, 1, 1];
        let bt = layout(&[3, 2]).transpose().unwrap();
        let out = matmul(&a, &layout(&[2, 2]), &b, &bt).unwrap();
        assert_eq!(out, vec![1, 2, 3, 3, 4, 7]);
    }

    #[test]
    fn test_matmul_broadcast_batch() {
        // one lhs matrix against a batch of two rhs matrices
        let a = [1.0f32, 2.0];
        let b = [1.0f32, 1.0, 2.0, 2.0];
        let al = layout(&[1, 1, 2]).broadcast_as(&Shape::from((2, 1, 2))).unwrap();
        let out = matmul(&a, &al, &b, &layout(&[2, 2, 1])).unwrap();
        assert_eq!(out, vec![3.0, 6.0]);
    }

    #[test]
    fn test_matmul_inner_mismatch() {
        let a = [0.0f64; 6];
        let err = matmul(&a, &layout(&[2, 3]), &a, &layout(&[2, 3])).unwrap_err();
        assert!(matches!(err, Error::MatmulShapeMismatch { m: 2, k1: 3, k2: 2, n: 3 }));
    }

    #[test]
    fn test_matmul_empty_inner() {
        let a: [f64; 0] = [];
        let out = matmul(&a, &layout(&[2, 0]), &a, &layout(&[0, 3])).unwrap();
        assert_eq!(out, vec![0.0; 6]);
    }
}
