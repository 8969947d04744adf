use axon_core::{Array, Backend, DType, Error, Result, Shape};

use crate::matrix::{pack, unpack, unpack_square, Batch, Matrix, PivotedLu};
use crate::options::LinalgOptions;

// Factorizations and solvers
//
// All of these accept a single matrix (rank 2) or a batch of matrices
// (rank 3), compute in f64 and return float arrays: float inputs keep their
// dtype, integer and bool inputs come back as float64.

fn float_dtype(a: DType) -> DType {
    a.float_result()
}

/// Result dtype for a solver with two operands.
fn solve_dtype(a: DType, b: DType) -> DType {
    if a == b {
        a.float_result()
    } else {
        DType::F64
    }
}

fn is_singular(lu: &PivotedLu, scale: f64, opts: &LinalgOptions) -> bool {
    lu.min_pivot() <= opts.singular_tol * scale
}

/// Determinant. Rank 2 gives a 0-D array, rank 3 one value per matrix.
pub fn det<B: Backend>(a: &Array<B>) -> Result<Array<B>> {
    det_with(a, &LinalgOptions::default())
}

pub fn det_with<B: Backend>(a: &Array<B>, opts: &LinalgOptions) -> Result<Array<B>> {
    let batch = unpack_square("det", a)?;
    tracing::debug!(shape = %a.shape(), "det");
    let values = batch
        .mats
        .iter()
        .map(|m| {
            let lu = PivotedLu::factor(m);
            let pivot = lu.min_pivot();
            if pivot > 0.0 && pivot <= opts.singular_tol * m.max_abs() {
                tracing::warn!(pivot, "det: matrix is close to singular");
            }
            lu.det()
        })
        .collect();
    pack(batch.out_shape(&[]), values, float_dtype(a.dtype()), a.device())
}

/// LU factorization `(L, U)` of square matrices with partial pivoting.
///
/// The row permutation is folded into `L`, so `L` is a row permutation of a
/// unit lower triangular matrix and `L @ U` reproduces the input.
pub fn lu<B: Backend>(a: &Array<B>) -> Result<(Array<B>, Array<B>)> {
    let batch = unpack_square("lu", a)?;
    tracing::debug!(shape = %a.shape(), "lu");
    let n = batch.rows;
    let mut lower = Vec::with_capacity(batch.mats.len() * n * n);
    let mut upper = Vec::with_capacity(batch.mats.len() * n * n);
    for m in &batch.mats {
        let lu = PivotedLu::factor(m);
        lower.extend(lu.lower().into_vec());
        upper.extend(lu.upper().into_vec());
    }
    let dtype = float_dtype(a.dtype());
    Ok((
        pack(a.shape().clone(), lower, dtype, a.device())?,
        pack(a.shape().clone(), upper, dtype, a.device())?,
    ))
}

/// Householder QR of an m x n matrix, reduced to k = min(m, n): `Q` is
/// m x k with orthonormal columns and `R` is k x n upper triangular with a
/// non-negative diagonal.
pub(crate) fn householder_qr(a: &Matrix) -> (Matrix, Matrix) {
    let (m, n) = (a.rows(), a.cols());
    let k = m.min(n);
    let mut q = Matrix::identity(m);
    let mut r = a.clone();

    for col in 0..k {
        let mut v: Vec<f64> = (col..m).map(|i| r[(i, col)]).collect();
        let norm_x = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm_x == 0.0 {
            continue;
        }
        // v = x + sign(x0) * ||x|| * e1, then H = I - 2 v v^T / (v^T v)
        v[0] += v[0].signum() * norm_x;
        let norm_v = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        for x in &mut v {
            *x /= norm_v;
        }

        for j in col..n {
            let dot: f64 = (col..m).map(|i| v[i - col] * r[(i, j)]).sum();
            for i in col..m {
                r[(i, j)] -= 2.0 * dot * v[i - col];
            }
        }
        for i in 0..m {
            let qv: f64 = (col..m).map(|j| q[(i, j)] * v[j - col]).sum();
            for j in col..m {
                q[(i, j)] -= 2.0 * qv * v[j - col];
            }
        }
    }

    // keep the first k columns of Q and rows of R, flipping signs so that
    // diag(R) >= 0; the flips cancel in Q @ R
    let mut q_out = Matrix::zeros(m, k);
    let mut r_out = Matrix::zeros(k, n);
    for i in 0..k {
        let sign = if r[(i, i)] < 0.0 { -1.0 } else { 1.0 };
        for j in i..n {
            r_out[(i, j)] = sign * r[(i, j)];
        }
        for row in 0..m {
            q_out[(row, i)] = sign * q[(row, i)];
        }
    }
    (q_out, r_out)
}

/// Reduced QR factorization `(Q, R)`.
///
/// For an input of shape `[.., m, n]`, `Q` is `[.., m, k]` and `R` is
/// `[.., k, n]` with `k = min(m, n)`. `R` has a non-negative diagonal.
pub fn qr<B: Backend>(a: &Array<B>) -> Result<(Array<B>, Array<B>)> {
    let batch = unpack("qr", a)?;
    tracing::debug!(shape = %a.shape(), "qr");
    let (m, n) = (batch.rows, batch.cols);
    let k = m.min(n);
    let mut qs = Vec::with_capacity(batch.mats.len() * m * k);
    let mut rs = Vec::with_capacity(batch.mats.len() * k * n);
    for mat in &batch.mats {
        let (q, r) = householder_qr(mat);
        qs.extend(q.into_vec());
        rs.extend(r.into_vec());
    }
    let dtype = float_dtype(a.dtype());
    Ok((
        pack(batch.out_shape(&[m, k]), qs, dtype, a.device())?,
        pack(batch.out_shape(&[k, n]), rs, dtype, a.device())?,
    ))
}

/// Matrix inverse.
pub fn inv<B: Backend>(a: &Array<B>) -> Result<Array<B>> {
    inv_with(a, &LinalgOptions::default())
}

pub fn inv_with<B: Backend>(a: &Array<B>, opts: &LinalgOptions) -> Result<Array<B>> {
    let batch = unpack_square("inv", a)?;
    tracing::debug!(shape = %a.shape(), "inv");
    let n = batch.rows;
    let mut out = Vec::with_capacity(batch.mats.len() * n * n);
    for m in &batch.mats {
        let lu = PivotedLu::factor(m);
        if is_singular(&lu, m.max_abs(), opts) {
            return Err(Error::SingularMatrix { op: "inv" });
        }
        let mut inverse = Matrix::zeros(n, n);
        let mut e = vec![0.0; n];
        for j in 0..n {
            e[j] = 1.0;
            inverse.set_column(j, &lu.solve(&e));
            e[j] = 0.0;
        }
        out.extend(inverse.into_vec());
    }
    pack(a.shape().clone(), out, float_dtype(a.dtype()), a.device())
}

/// Right-hand sides matching a batch of `rows`-row matrices.
///
/// Without a batch axis `b` is `[rows]` or `[rows, k]`; with one it is
/// `[batch, rows]` or `[batch, rows, k]`. Returns one `rows x k` matrix per
/// batch entry and whether `b` was a vector.
fn unpack_rhs<B: Backend>(
    op: &'static str,
    lhs: &Batch,
    b: &Array<B>,
) -> Result<(Vec<Matrix>, bool)> {
    let bd = b.dims();
    let vector = match (lhs.batch, bd.len()) {
        (None, 1) | (Some(_), 2) => true,
        (None, 2) | (Some(_), 3) => false,
        (None, got) => {
            return Err(Error::UnsupportedRank {
                op,
                got,
                expected: "rank 1 or 2 right-hand side",
            })
        }
        (Some(_), got) => {
            return Err(Error::UnsupportedRank {
                op,
                got,
                expected: "rank 2 or 3 right-hand side for batched input",
            })
        }
    };
    let k = if vector { 1 } else { bd[bd.len() - 1] };
    let mut expected: Vec<usize> = lhs.batch.into_iter().collect();
    expected.push(lhs.rows);
    if !vector {
        expected.push(k);
    }
    if bd != expected.as_slice() {
        return Err(Error::ShapeMismatch {
            op,
            expected: Shape::new(expected),
            got: b.shape().clone(),
        });
    }
    let data = b.to_f64_vec()?;
    let size = lhs.rows * k;
    let mats = (0..lhs.batch.unwrap_or(1))
        .map(|i| Matrix::from_vec(lhs.rows, k, data[i * size..(i + 1) * size].to_vec()))
        .collect();
    Ok((mats, vector))
}

/// Solve `a @ x = b` for square `a`.
///
/// `b` is a vector or a matrix of right-hand sides, with the same leading
/// batch axis as `a` when `a` is rank 3. `x` has the shape of `b`.
pub fn solve<B: Backend>(a: &Array<B>, b: &Array<B>) -> Result<Array<B>> {
    solve_with(a, b, &LinalgOptions::default())
}

pub fn solve_with<B: Backend>(a: &Array<B>, b: &Array<B>, opts: &LinalgOptions) -> Result<Array<B>> {
    let lhs = unpack_square("solve", a)?;
    let (rhs, _) = unpack_rhs("solve", &lhs, b)?;
    tracing::debug!(a = %a.shape(), b = %b.shape(), "solve");
    let mut out = Vec::with_capacity(b.elem_count());
    for (m, rhs) in lhs.mats.iter().zip(&rhs) {
        let lu = PivotedLu::factor(m);
        if is_singular(&lu, m.max_abs(), opts) {
            return Err(Error::SingularMatrix { op: "solve" });
        }
        let mut x = Matrix::zeros(rhs.rows(), rhs.cols());
        for j in 0..rhs.cols() {
            x.set_column(j, &lu.solve(&rhs.column(j)));
        }
        out.extend(x.into_vec());
    }
    pack(b.shape().clone(), out, solve_dtype(a.dtype(), b.dtype()), a.device())
}

/// Least-squares solution of `a @ x = b` for `m >= n`, through QR.
///
/// `b` follows the same layout rules as in [`solve`]; `x` replaces the `m`
/// axis of `b` with `n`. Rank-deficient `a` is reported as singular.
pub fn lstsq<B: Backend>(a: &Array<B>, b: &Array<B>) -> Result<Array<B>> {
    lstsq_with(a, b, &LinalgOptions::default())
}

pub fn lstsq_with<B: Backend>(a: &Array<B>, b: &Array<B>, opts: &LinalgOptions) -> Result<Array<B>> {
    let lhs = unpack("lstsq", a)?;
    let (m, n) = (lhs.rows, lhs.cols);
    if m < n {
        return Err(Error::not_implemented(
            "lstsq",
            format!("underdetermined systems ({m} equations, {n} unknowns)"),
        ));
    }
    let (rhs, vector) = unpack_rhs("lstsq", &lhs, b)?;
    tracing::debug!(a = %a.shape(), b = %b.shape(), "lstsq");
    let k = if vector { 1 } else { b.dims()[b.rank() - 1] };
    let mut out = Vec::with_capacity(rhs.len() * n * k);
    for (mat, rhs) in lhs.mats.iter().zip(&rhs) {
        let (q, r) = householder_qr(mat);
        let tol = opts.singular_tol * mat.max_abs();
        if (0..n).any(|i| r[(i, i)] <= tol) {
            return Err(Error::SingularMatrix { op: "lstsq" });
        }
        // R x = Q^T b by back substitution
        let mut x = q.transpose().matmul(rhs);
        for j in 0..k {
            for i in (0..n).rev() {
                let mut v = x[(i, j)];
                for p in i + 1..n {
                    v -= r[(i, p)] * x[(p, j)];
                }
                x[(i, j)] = v / r[(i, i)];
            }
        }
        out.extend(x.into_vec());
    }
    let mut dims: Vec<usize> = lhs.batch.into_iter().collect();
    dims.push(n);
    if !vector {
        dims.push(k);
    }
    pack(Shape::new(dims), out, solve_dtype(a.dtype(), b.dtype()), a.device())
}

/// Numerical rank via Gaussian elimination with partial pivoting.
/// Returns an int64 array: 0-D for rank 2 input, `[batch]` for rank 3.
pub fn matrix_rank<B: Backend>(a: &Array<B>) -> Result<Array<B>> {
    matrix_rank_with(a, &LinalgOptions::default())
}

pub fn matrix_rank_with<B: Backend>(a: &Array<B>, opts: &LinalgOptions) -> Result<Array<B>> {
    let batch = unpack("matrix_rank", a)?;
    let ranks = batch
        .mats
        .iter()
        .map(|m| echelon_rank(m.clone(), opts.singular_tol * m.max_abs()) as f64)
        .collect();
    pack(batch.out_shape(&[]), ranks, DType::I64, a.device())
}

fn echelon_rank(mut m: Matrix, tol: f64) -> usize {
    let (rows, cols) = (m.rows(), m.cols());
    let mut rank = 0;
    for col in 0..cols {
        if rank == rows {
            break;
        }
        let mut p = rank;
        for i in rank + 1..rows {
            if m[(i, col)].abs() > m[(p, col)].abs() {
                p = i;
            }
        }
        if m[(p, col)].abs() <= tol {
            continue;
        }
        m.swap_rows(p, rank);
        let pivot = m[(rank, col)];
        for i in rank + 1..rows {
            let f = m[(i, col)] / pivot;
            for j in col..cols {
                m[(i, j)] -= f * m[(rank, j)];
            }
        }
        rank += 1;
    }
    rank
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_householder_qr_square() {
        let a = Matrix::from_vec(
            3,
            3,
            vec![12.0, -51.0, 4.0, 6.0, 167.0, -68.0, -4.0, 24.0, -41.0],
        );
        let (q, r) = householder_qr(&a);
        assert!((r[(0, 0)] - 14.0).abs() < 1e-10);
        assert!((r[(1, 1)] - 175.0).abs() < 1e-10);
        assert!((r[(2, 2)] - 35.0).abs() < 1e-10);
        assert_eq!(r[(2, 0)], 0.0);
        let back = q.matmul(&r);
        for (x, y) in back.into_vec().iter().zip(a.into_vec()) {
            assert!((x - y).abs() < 1e-10);
        }
    }

    #[test]
    fn test_householder_qr_shapes() {
        let tall = Matrix::from_vec(3, 2, vec![1.0, 0.0, 1.0, 1.0, 0.0, 1.0]);
        let (q, r) = householder_qr(&tall);
        assert_eq!((q.rows(), q.cols()), (3, 2));
        assert_eq!((r.rows(), r.cols()), (2, 2));
        let qtq = q.transpose().matmul(&q);
        assert!((qtq[(0, 0)] - 1.0).abs() < 1e-12);
        assert!(qtq[(0, 1)].abs() < 1e-12);

        let wide = tall.transpose();
        let (q, r) = householder_qr(&wide);
        assert_eq!((q.rows(), q.cols()), (2, 2));
        assert_eq!((r.rows(), r.cols()), (2, 3));
    }

    #[test]
    fn test_echelon_rank() {
        let m = Matrix::from_vec(3, 3, vec![1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 1.0, 0.0, 1.0]);
        assert_eq!(echelon_rank(m.clone(), 1e-12 * m.max_abs()), 2);
        assert_eq!(echelon_rank(Matrix::zeros(2, 3), 0.0), 0);
        assert_eq!(echelon_rank(Matrix::identity(4), 1e-12), 4);
    }
}
