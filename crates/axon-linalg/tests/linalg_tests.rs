// Linear algebra tests on the CPU backend
//
// Factorizations are checked by reconstruction rather than against fixed
// factors, except where the result is unique (det, eigenvalues, QR with a
// positive diagonal).

use axon_core::{DType, Error, Result};
use axon_cpu::{CpuArray, CpuDevice};
use axon_linalg as la;
use axon_linalg::{LinalgOptions, Normalization};

fn assert_close(got: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(got.len(), expected.len(), "length mismatch");
    for (i, (g, e)) in got.iter().zip(expected).enumerate() {
        assert!((g - e).abs() < tol, "index {i}: got {g} expected {e}");
    }
}

fn arr(data: &[f64], dims: &[usize], dtype: DType) -> CpuArray {
    CpuArray::from_f64_slice(data, dims, dtype, &CpuDevice).unwrap()
}

fn mat(data: &[f64], rows: usize, cols: usize) -> CpuArray {
    arr(data, &[rows, cols], DType::F64)
}

fn identity(n: usize) -> Vec<f64> {
    let mut v = vec![0.0; n * n];
    for i in 0..n {
        v[i * n + i] = 1.0;
    }
    v
}

// Determinant

#[test]
fn test_det_2x2() -> Result<()> {
    let a = arr(&[1.0, 2.0, 3.0, 4.0], &[2, 2], DType::F32);
    let d = la::det(&a)?;
    assert_eq!(d.rank(), 0);
    assert_eq!(d.dtype(), DType::F32);
    assert_close(&d.to_f64_vec()?, &[-2.0], 1e-5);
    Ok(())
}

#[test]
fn test_det_int_input_is_f64() -> Result<()> {
    let a = arr(&[2.0, 0.0, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 4.0], &[3, 3], DType::I32);
    let d = la::det(&a)?;
    assert_eq!(d.dtype(), DType::F64);
    assert_close(&d.to_f64_vec()?, &[24.0], 1e-12);
    Ok(())
}

#[test]
fn test_det_batched_and_singular() -> Result<()> {
    let a = mat(&[1.0, 2.0, 3.0, 4.0, 1.0, 2.0, 2.0, 4.0], 4, 2).reshape((2, 2, 2))?;
    let d = la::det(&a)?;
    assert_eq!(d.dims(), &[2]);
    assert_close(&d.to_f64_vec()?, &[-2.0, 0.0], 1e-12);
    Ok(())
}

#[test]
fn test_det_rejects_bad_shapes() {
    let a = CpuArray::zeros((1, 2, 2, 2), DType::F64, &CpuDevice).unwrap();
    assert!(matches!(
        la::det(&a).unwrap_err(),
        Error::UnsupportedRank { op: "det", got: 4, .. }
    ));
    let a = CpuArray::zeros((2, 3), DType::F64, &CpuDevice).unwrap();
    assert!(matches!(
        la::det(&a).unwrap_err(),
        Error::NotSquare { op: "det", rows: 2, cols: 3 }
    ));
}

#[test]
fn test_det_on_transposed_view() -> Result<()> {
    let a = mat(&[1.0, 2.0, 3.0, 4.0], 2, 2).t()?;
    assert_close(&la::det(&a)?.to_f64_vec()?, &[-2.0], 1e-12);
    Ok(())
}

// LU and QR

#[test]
fn test_lu_reconstructs_input() -> Result<()> {
    let data = [0.0, 2.0, 1.0, 1.0, 1.0, 0.0, 3.0, 0.0, 1.0];
    let a = mat(&data, 3, 3);
    let (l, u) = la::lu(&a)?;
    assert_eq!(l.dims(), &[3, 3]);
    assert_close(&l.matmul(&u)?.to_f64_vec()?, &data, 1e-12);

    // U is upper triangular
    let uv = u.to_f64_vec()?;
    assert_eq!((uv[3], uv[6], uv[7]), (0.0, 0.0, 0.0));
    Ok(())
}

#[test]
fn test_lu_batched() -> Result<()> {
    let data = [4.0, 3.0, 6.0, 3.0, 1.0, 2.0, 3.0, 4.0];
    let a = arr(&data, &[2, 2, 2], DType::F32);
    let (l, u) = la::lu(&a)?;
    assert_eq!(l.dtype(), DType::F32);
    assert_close(&l.matmul(&u)?.to_f64_vec()?, &data, 1e-5);
    Ok(())
}

#[test]
fn test_qr_reconstructs_with_positive_diagonal() -> Result<()> {
    let data = [12.0, -51.0, 4.0, 6.0, 167.0, -68.0, -4.0, 24.0, -41.0];
    let a = mat(&data, 3, 3);
    let (q, r) = la::qr(&a)?;
    assert_close(&q.matmul(&r)?.to_f64_vec()?, &data, 1e-9);
    let rv = r.to_f64_vec()?;
    assert_close(&[rv[0], rv[4], rv[8]], &[14.0, 175.0, 35.0], 1e-9);
    assert_close(&q.t()?.matmul(&q)?.to_f64_vec()?, &identity(3), 1e-12);
    Ok(())
}

#[test]
fn test_qr_reduced_shapes() -> Result<()> {
    let tall = mat(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], 4, 2);
    let (q, r) = la::qr(&tall)?;
    assert_eq!(q.dims(), &[4, 2]);
    assert_eq!(r.dims(), &[2, 2]);
    assert_close(&q.matmul(&r)?.to_f64_vec()?, &tall.to_f64_vec()?, 1e-12);

    let batch = tall.reshape((2, 2, 2))?;
    let (q, r) = la::qr(&batch)?;
    assert_eq!(q.dims(), &[2, 2, 2]);
    assert_close(&q.matmul(&r)?.to_f64_vec()?, &batch.to_f64_vec()?, 1e-12);
    Ok(())
}

// Inverse, solve, least squares, rank

#[test]
fn test_inv() -> Result<()> {
    let a = mat(&[4.0, 7.0, 2.0, 6.0], 2, 2);
    let inv = la::inv(&a)?;
    assert_close(&inv.to_f64_vec()?, &[0.6, -0.7, -0.2, 0.4], 1e-12);
    assert_close(&a.matmul(&inv)?.to_f64_vec()?, &identity(2), 1e-12);
    Ok(())
}

#[test]
fn test_inv_singular() {
    let a = mat(&[1.0, 2.0, 2.0, 4.0], 2, 2);
    assert!(matches!(la::inv(&a).unwrap_err(), Error::SingularMatrix { op: "inv" }));
}

#[test]
fn test_solve_vector_and_matrix() -> Result<()> {
    let a = mat(&[3.0, 1.0, 1.0, 2.0], 2, 2);
    let b = arr(&[9.0, 8.0], &[2], DType::F64);
    let x = la::solve(&a, &b)?;
    assert_eq!(x.dims(), &[2]);
    assert_close(&x.to_f64_vec()?, &[2.0, 3.0], 1e-12);

    let b = mat(&[9.0, 1.0, 8.0, 2.0], 2, 2);
    let x = la::solve(&a, &b)?;
    assert_close(&a.matmul(&x)?.to_f64_vec()?, &b.to_f64_vec()?, 1e-12);
    Ok(())
}

#[test]
fn test_solve_batched() -> Result<()> {
    let a = arr(&[2.0, 0.0, 0.0, 4.0, 1.0, 1.0, 0.0, 1.0], &[2, 2, 2], DType::F64);
    let b = arr(&[2.0, 8.0, 3.0, 1.0], &[2, 2], DType::F64);
    let x = la::solve(&a, &b)?;
    assert_eq!(x.dims(), &[2, 2]);
    assert_close(&x.to_f64_vec()?, &[1.0, 2.0, 2.0, 1.0], 1e-12);
    Ok(())
}

#[test]
fn test_solve_shape_errors() {
    let a = mat(&[1.0, 0.0, 0.0, 1.0], 2, 2);
    let b = arr(&[1.0, 2.0, 3.0], &[3], DType::F64);
    assert!(matches!(
        la::solve(&a, &b).unwrap_err(),
        Error::ShapeMismatch { op: "solve", .. }
    ));
    let singular = mat(&[0.0; 4], 2, 2);
    let b = arr(&[1.0, 2.0], &[2], DType::F64);
    assert!(matches!(
        la::solve(&singular, &b).unwrap_err(),
        Error::SingularMatrix { op: "solve" }
    ));
}

#[test]
fn test_lstsq_line_fit() -> Result<()> {
    // y = 1 + 2x sampled exactly at four points
    let a = mat(&[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0], 4, 2);
    let b = arr(&[1.0, 3.0, 5.0, 7.0], &[4], DType::F64);
    let x = la::lstsq(&a, &b)?;
    assert_eq!(x.dims(), &[2]);
    assert_close(&x.to_f64_vec()?, &[1.0, 2.0], 1e-10);

    // noisy: the mean of 0 and 2 at the same x
    let a = mat(&[1.0, 1.0, 1.0], 3, 1);
    let b = arr(&[0.0, 2.0, 1.0], &[3], DType::F64);
    assert_close(&la::lstsq(&a, &b)?.to_f64_vec()?, &[1.0], 1e-12);
    Ok(())
}

#[test]
fn test_lstsq_underdetermined() {
    let a = mat(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);
    let b = arr(&[1.0, 2.0], &[2], DType::F64);
    assert!(matches!(
        la::lstsq(&a, &b).unwrap_err(),
        Error::NotImplemented { op: "lstsq", .. }
    ));
}

#[test]
fn test_matrix_rank() -> Result<()> {
    let a = mat(&[1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 1.0, 0.0, 1.0], 3, 3);
    let r = la::matrix_rank(&a)?;
    assert_eq!(r.dtype(), DType::I64);
    assert_eq!(r.to_scalar()?, 2.0);

    let batch = arr(&[1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0], &[2, 2, 2], DType::F32);
    assert_eq!(la::matrix_rank(&batch)?.to_f64_vec()?, vec![2.0, 0.0]);
    Ok(())
}

// Eigen

#[test]
fn test_eig_general() -> Result<()> {
    let a = mat(&[4.0, 1.0, 2.0, 3.0], 2, 2);
    let values = la::eig(&a)?;
    assert_eq!(values.dims(), &[2]);
    assert_close(&values.to_f64_vec()?, &[2.0, 5.0], 1e-10);

    let vectors = la::eigv(&a)?;
    assert_eq!(vectors.dims(), &[2, 2]);
    let lhs = a.matmul(&vectors)?.to_f64_vec()?;
    let rhs = vectors.mul(&values)?.to_f64_vec()?;
    assert_close(&lhs, &rhs, 1e-8);
    Ok(())
}

#[test]
fn test_eig_larger_nonsymmetric() -> Result<()> {
    // lower triangular, so the eigenvalues are the diagonal
    let a = mat(
        &[
            4.0, 0.0, 0.0, 0.0, //
            1.0, 3.0, 0.0, 0.0, //
            2.0, 1.0, 2.0, 0.0, //
            0.5, 1.0, 3.0, 1.0,
        ],
        4,
        4,
    );
    let values = la::eig(&a)?;
    assert_close(&values.to_f64_vec()?, &[1.0, 2.0, 3.0, 4.0], 1e-9);
    let vectors = la::eigv(&a)?;
    let lhs = a.matmul(&vectors)?.to_f64_vec()?;
    let rhs = vectors.mul(&values)?.to_f64_vec()?;
    assert_close(&lhs, &rhs, 1e-7);
    Ok(())
}

#[test]
fn test_eig_complex_spectrum() {
    let rotation = mat(&[0.0, -1.0, 1.0, 0.0], 2, 2);
    assert!(matches!(
        la::eig(&rotation).unwrap_err(),
        Error::ComplexEigenvalues { op: "eig" }
    ));
}

#[test]
fn test_eigh_values_and_vectors() -> Result<()> {
    let a = mat(&[4.0, 1.0, 2.0, 1.0, 3.0, 0.5, 2.0, 0.5, 1.0], 3, 3);
    let values = la::eigh(&a)?;
    let v = values.to_f64_vec()?;
    assert!(v.windows(2).all(|w| w[0] <= w[1]));
    // trace is preserved
    assert!((v.iter().sum::<f64>() - 8.0).abs() < 1e-10);

    let vectors = la::eighv(&a)?;
    assert_close(&vectors.t()?.matmul(&vectors)?.to_f64_vec()?, &identity(3), 1e-10);
    let lhs = a.matmul(&vectors)?.to_f64_vec()?;
    let rhs = vectors.mul(&values)?.to_f64_vec()?;
    assert_close(&lhs, &rhs, 1e-10);
    Ok(())
}

#[test]
fn test_eigh_agrees_with_eig_on_symmetric_input() -> Result<()> {
    let a = mat(&[2.0, -1.0, 0.0, -1.0, 2.0, -1.0, 0.0, -1.0, 2.0], 3, 3);
    let general = la::eig(&a)?.to_f64_vec()?;
    let symmetric = la::eigh(&a)?.to_f64_vec()?;
    let s = std::f64::consts::SQRT_2;
    assert_close(&symmetric, &[2.0 - s, 2.0, 2.0 + s], 1e-10);
    assert_close(&general, &symmetric, 1e-9);
    Ok(())
}

#[test]
fn test_eigen_batched_shapes() -> Result<()> {
    let a = arr(&[2.0, 1.0, 1.0, 2.0, 5.0, 0.0, 0.0, 1.0], &[2, 2, 2], DType::F32);
    let values = la::eigh(&a)?;
    assert_eq!(values.dims(), &[2, 2]);
    assert_eq!(values.dtype(), DType::F32);
    assert_close(&values.to_f64_vec()?, &[1.0, 3.0, 1.0, 5.0], 1e-5);
    assert_eq!(la::eighv(&a)?.dims(), &[2, 2, 2]);
    assert_eq!(la::eig(&a)?.dims(), &[2, 2]);
    assert_eq!(la::eigv(&a)?.dims(), &[2, 2, 2]);

    let rank4 = CpuArray::zeros((1, 1, 2, 2), DType::F64, &CpuDevice)?;
    assert!(matches!(
        la::eigh(&rank4).unwrap_err(),
        Error::UnsupportedRank { op: "eigh", got: 4, .. }
    ));
    Ok(())
}

#[test]
fn test_eigh_iteration_limit() {
    let a = mat(&[4.0, 1.0, 1.0, 3.0], 2, 2);
    let opts = LinalgOptions::default().with_max_iter(0);
    assert!(matches!(
        la::eigh_with(&a, &opts).unwrap_err(),
        Error::NoConvergence { op: "eigh", .. }
    ));
}

// Products

#[test]
fn test_dot_contract() -> Result<()> {
    let v = arr(&[1.0, 2.0, 3.0], &[3], DType::I32);
    let d = la::dot(&v, &v)?;
    assert_eq!(d.rank(), 0);
    assert_eq!(d.to_scalar()?, 14.0);
    assert_eq!(d.dtype(), DType::I32);

    let a = CpuArray::ones((2, 2, 3), DType::F64, &CpuDevice)?;
    let b = CpuArray::ones((2, 3, 4), DType::F64, &CpuDevice)?;
    assert_eq!(la::dot(&a, &b)?.dims(), &[2, 2, 4]);

    let b = CpuArray::ones((1, 3, 4), DType::F64, &CpuDevice)?;
    assert!(matches!(
        la::dot(&a, &b).unwrap_err(),
        Error::ShapeMismatch { op: "dot", .. }
    ));
    let c = CpuArray::ones((2, 2, 2, 3), DType::F64, &CpuDevice)?;
    assert!(matches!(
        la::dot(&c, &b).unwrap_err(),
        Error::UnsupportedRank { op: "dot", got: 4, .. }
    ));
    Ok(())
}

#[test]
fn test_inner_and_outer() -> Result<()> {
    let a = arr(&[1.0, 2.0, 3.0], &[3], DType::F64);
    let b = arr(&[4.0, 5.0], &[2], DType::F64);
    assert_eq!(la::inner(&a, &a)?.to_scalar()?, 14.0);
    assert!(matches!(
        la::inner(&a, &b).unwrap_err(),
        Error::ShapeMismatch { op: "inner", .. }
    ));

    let o = la::outer(&a, &b)?;
    assert_eq!(o.dims(), &[3, 2]);
    assert_eq!(o.to_f64_vec()?, vec![4.0, 5.0, 8.0, 10.0, 12.0, 15.0]);
    Ok(())
}

#[test]
fn test_cross() -> Result<()> {
    let x = arr(&[1.0, 0.0, 0.0], &[3], DType::F32);
    let y = arr(&[0.0, 1.0, 0.0], &[3], DType::F32);
    assert_eq!(la::cross(&x, &y, None)?.to_f64_vec()?, vec![0.0, 0.0, 1.0]);

    // two vectors stored as columns of a 3x2 matrix
    let a = arr(&[1.0, 0.0, 0.0, 1.0, 0.0, 0.0], &[3, 2], DType::F64);
    let b = arr(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0], &[3, 2], DType::F64);
    let c = la::cross(&a, &b, Some(0))?;
    assert_eq!(c.dims(), &[3, 2]);
    assert_eq!(c.to_f64_vec()?, vec![0.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
    // the same pairs laid out as rows
    let rows = la::cross(&a.t()?, &b.t()?, Some(-1))?;
    assert_eq!(rows.to_f64_vec()?, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
    Ok(())
}

#[test]
fn test_cross_axis_errors() {
    let a = CpuArray::ones((2, 3), DType::F64, &CpuDevice).unwrap();
    assert!(matches!(
        la::cross(&a, &a, None).unwrap_err(),
        Error::MissingAxis { op: "cross", ndim: 2 }
    ));
    assert!(matches!(
        la::cross(&a, &a, Some(2)).unwrap_err(),
        Error::AxisOutOfRange { op: "cross", axis: 2, ndim: 2 }
    ));
    assert!(matches!(
        la::cross(&a, &a, Some(0)).unwrap_err(),
        Error::ShapeMismatch { op: "cross", .. }
    ));
}

#[test]
fn test_trace() -> Result<()> {
    let a = arr(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], DType::I64);
    let t = la::trace(&a)?;
    assert_eq!(t.dtype(), DType::I64);
    assert_eq!(t.to_scalar()?, 6.0);
    let batch = arr(&[1.0, 0.0, 0.0, 1.0, 2.0, 5.0, 5.0, 3.0], &[2, 2, 2], DType::F64);
    assert_eq!(la::trace(&batch)?.to_f64_vec()?, vec![2.0, 5.0]);
    Ok(())
}

#[test]
fn test_linear() -> Result<()> {
    let w = arr(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2], DType::F32);
    let x = arr(&[1.0, 2.0], &[2], DType::F32);
    let b = arr(&[0.1, 0.2, 0.3], &[3], DType::F32);
    let y = la::linear(&x, &w, Some(&b))?;
    assert_eq!(y.dims(), &[3]);
    assert_close(&y.to_f64_vec()?, &[5.1, 11.2, 17.3], 1e-5);

    let batch = arr(&[1.0, 2.0, 0.0, 1.0], &[2, 2], DType::F32);
    let y = la::linear(&batch, &w, None)?;
    assert_eq!(y.dims(), &[2, 3]);
    assert_close(&y.to_f64_vec()?, &[5.0, 11.0, 17.0, 2.0, 4.0, 6.0], 1e-5);
    Ok(())
}

// Norms

#[test]
fn test_norms() -> Result<()> {
    let a = arr(&[3.0, -4.0], &[2], DType::I32);
    let l1 = la::l1_norm(&a)?;
    assert_eq!(l1.rank(), 0);
    assert_eq!(l1.dtype(), DType::F64);
    assert_eq!(l1.to_scalar()?, 7.0);
    assert_eq!(la::l2_norm(&a)?.to_scalar()?, 5.0);
    assert_close(&la::unit_norm(&a)?.to_f64_vec()?, &[0.6, -0.8], 1e-12);
    Ok(())
}

#[test]
fn test_normalize() -> Result<()> {
    let a = arr(&[1.0, 2.0, 3.0, 5.0], &[2, 2], DType::F32);
    let mm = la::normalize(&a, Normalization::MinMax)?;
    assert_eq!(mm.dims(), &[2, 2]);
    assert_close(&mm.to_f64_vec()?, &[0.0, 0.25, 0.5, 1.0], 1e-6);

    let z = la::normalize(&a, Normalization::Std)?.to_f64_vec()?;
    assert!(z.iter().sum::<f64>().abs() < 1e-5);
    let var = z.iter().map(|v| v * v).sum::<f64>() / 4.0;
    assert!((var - 1.0).abs() < 1e-5);

    let rms = la::normalize(&a, Normalization::Rms)?.to_f64_vec()?;
    let mean_sq = rms.iter().map(|v| v * v).sum::<f64>() / 4.0;
    assert!((mean_sq - 1.0).abs() < 1e-5);
    Ok(())
}

#[test]
fn test_robust_norm_uses_median_and_iqr() -> Result<()> {
    // the outlier moves neither the median nor the quartiles
    let a = arr(&[100.0, 2.0, 3.0, 1.0, 5.0], &[5], DType::I32);
    let r = la::robust_norm(&a)?;
    assert_eq!(r.dtype(), DType::F64);
    assert_eq!(r.dims(), &[5]);
    assert_close(
        &r.to_f64_vec()?,
        &[97.0 / 3.0, -1.0 / 3.0, 0.0, -2.0 / 3.0, 2.0 / 3.0],
        1e-12,
    );

    let m = arr(&[1.0, 2.0, 3.0, 4.0], &[2, 2], DType::F32).transpose()?;
    let n = la::normalize(&m, Normalization::Robust)?;
    assert_eq!(n.dims(), &[2, 2]);
    // median 2.5, IQR 3.25 - 1.75
    assert_close(&n.to_f64_vec()?, &[-1.0, 1.0 / 3.0, -1.0 / 3.0, 1.0], 1e-6);
    Ok(())
}
