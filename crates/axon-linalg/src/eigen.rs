//! Eigendecompositions of real square matrices.
//!
//! - [`eig`] / [`eigv`]: general matrices. The input is reduced to upper
//!   Hessenberg form by stabilized elimination, then the Francis double-shift
//!   QR iteration deflates one real root or a 2x2 block at a time. Only real
//!   spectra are representable; a complex pair is an error. Eigenvectors come
//!   from inverse iteration against each computed eigenvalue.
//! - [`eigh`] / [`eighv`]: symmetric matrices, by cyclic Jacobi rotations.
//!   Only the lower triangle of the input is read.
//!
//! Eigenvalues are returned in ascending order. Eigenvectors are the columns
//! of the returned matrix, in the same order, with unit Euclidean norm and
//! their largest-magnitude component positive.

use axon_core::{Array, Backend, Error, Result};

use crate::matrix::{pack, unpack_square, Batch, Matrix, PivotedLu};
use crate::options::LinalgOptions;

/// `|a|` carrying the sign of `b`, with `b = -0.0` counting as positive.
fn sign(a: f64, b: f64) -> f64 {
    if b >= 0.0 {
        a.abs()
    } else {
        -a.abs()
    }
}

/// Reduce to upper Hessenberg form by Gaussian elimination with pivoting.
/// The result is similar to the input, so the eigenvalues are unchanged.
fn hessenberg(a: &mut Matrix) {
    let n = a.rows();
    for m in 1..n.saturating_sub(1) {
        let mut x: f64 = 0.0;
        let mut pivot = m;
        for j in m..n {
            if a[(j, m - 1)].abs() > x.abs() {
                x = a[(j, m - 1)];
                pivot = j;
            }
        }
        if pivot != m {
            a.swap_rows(pivot, m);
            for j in 0..n {
                let t = a[(j, pivot)];
                a[(j, pivot)] = a[(j, m)];
                a[(j, m)] = t;
            }
        }
        if x == 0.0 {
            continue;
        }
        for i in m + 1..n {
            let y = a[(i, m - 1)] / x;
            if y == 0.0 {
                continue;
            }
            for j in m - 1..n {
                a[(i, j)] -= y * a[(m, j)];
            }
            for j in 0..n {
                a[(j, m)] += y * a[(j, i)];
            }
        }
    }
    for i in 2..n {
        for j in 0..i - 1 {
            a[(i, j)] = 0.0;
        }
    }
}

/// Eigenvalues of an upper Hessenberg matrix as `(re, im)` pairs. `h` is
/// destroyed.
fn hessenberg_qr(
    op: &'static str,
    h: &mut Matrix,
    opts: &LinalgOptions,
) -> Result<Vec<(f64, f64)>> {
    let n = h.rows();
    let eps = f64::EPSILON;
    let mut roots = vec![(0.0, 0.0); n];
    let mut anorm = 0.0;
    for i in 0..n {
        for j in i.saturating_sub(1)..n {
            anorm += h[(i, j)].abs();
        }
    }

    // accumulated exceptional shifts
    let mut t = 0.0;
    // rows hi.. are deflated
    let mut hi = n;
    while hi > 0 {
        let nn = hi - 1;
        let mut its = 0;
        loop {
            // find the bottom of the active unreduced block
            let mut l = nn;
            while l > 0 {
                let mut s = h[(l - 1, l - 1)].abs() + h[(l, l)].abs();
                if s == 0.0 {
                    s = anorm;
                }
                if h[(l, l - 1)].abs() <= eps * s {
                    h[(l, l - 1)] = 0.0;
                    break;
                }
                l -= 1;
            }

            let mut x = h[(nn, nn)];
            if l == nn {
                roots[nn] = (x + t, 0.0);
                hi -= 1;
                break;
            }
            let mut y = h[(nn - 1, nn - 1)];
            let mut w = h[(nn, nn - 1)] * h[(nn - 1, nn)];
            if l == nn - 1 {
                let p = 0.5 * (y - x);
                let mut q = p * p + w;
                // rounding can push the discriminant of a double root below 0
                let noise = opts.eig_tol * (p * p + w.abs()).max(eps * anorm * anorm);
                if q < 0.0 && -q <= noise {
                    q = 0.0;
                }
                let z = q.abs().sqrt();
                x += t;
                if q >= 0.0 {
                    let z = p + sign(z, p);
                    let upper = if z != 0.0 { x - w / z } else { x + z };
                    roots[nn - 1] = (x + z, 0.0);
                    roots[nn] = (upper, 0.0);
                } else {
                    roots[nn - 1] = (x + p, z);
                    roots[nn] = (x + p, -z);
                }
                hi -= 2;
                break;
            }

            if its == opts.max_iter {
                return Err(Error::NoConvergence {
                    op,
                    iterations: its,
                });
            }
            if its > 0 && its % 10 == 0 {
                // exceptional shift
                t += x;
                for i in 0..=nn {
                    h[(i, i)] -= x;
                }
                let s = h[(nn, nn - 1)].abs() + h[(nn - 1, nn - 2)].abs();
                x = 0.75 * s;
                y = x;
                w = -0.4375 * s * s;
            }
            its += 1;
            tracing::trace!(op, row = nn, its, "qr iteration");

            // look for two consecutive small subdiagonal elements
            let mut m = nn - 2;
            let (mut p, mut q, mut r) = loop {
                let z = h[(m, m)];
                let r0 = x - z;
                let s0 = y - z;
                let p = (r0 * s0 - w) / h[(m + 1, m)] + h[(m, m + 1)];
                let q = h[(m + 1, m + 1)] - z - r0 - s0;
                let r = h[(m + 2, m + 1)];
                let s = p.abs() + q.abs() + r.abs();
                let (p, q, r) = (p / s, q / s, r / s);
                if m == l {
                    break (p, q, r);
                }
                let u = h[(m, m - 1)].abs() * (q.abs() + r.abs());
                let v = p.abs() * (h[(m - 1, m - 1)].abs() + z.abs() + h[(m + 1, m + 1)].abs());
                if u <= eps * v {
                    break (p, q, r);
                }
                m -= 1;
            };
            for i in m..nn - 1 {
                h[(i + 2, i)] = 0.0;
                if i != m {
                    h[(i + 2, i - 1)] = 0.0;
                }
            }

            // double-shift QR step on rows l..=nn and columns m..=nn
            for k in m..nn {
                let scale = if k == m {
                    0.0
                } else {
                    p = h[(k, k - 1)];
                    q = h[(k + 1, k - 1)];
                    r = if k + 1 != nn { h[(k + 2, k - 1)] } else { 0.0 };
                    let scale = p.abs() + q.abs() + r.abs();
                    if scale != 0.0 {
                        p /= scale;
                        q /= scale;
                        r /= scale;
                    }
                    scale
                };
                let s = sign((p * p + q * q + r * r).sqrt(), p);
                if s == 0.0 {
                    continue;
                }
                if k == m {
                    if l != m {
                        h[(k, k - 1)] = -h[(k, k - 1)];
                    }
                } else {
                    h[(k, k - 1)] = -s * scale;
                }
                p += s;
                let (xk, yk, zk) = (p / s, q / s, r / s);
                q /= p;
                r /= p;
                for j in k..=nn {
                    let mut v = h[(k, j)] + q * h[(k + 1, j)];
                    if k + 1 != nn {
                        v += r * h[(k + 2, j)];
                        h[(k + 2, j)] -= v * zk;
                    }
                    h[(k + 1, j)] -= v * yk;
                    h[(k, j)] -= v * xk;
                }
                for i in l..=nn.min(k + 3) {
                    let mut v = xk * h[(i, k)] + yk * h[(i, k + 1)];
                    if k + 1 != nn {
                        v += zk * h[(i, k + 2)];
                        h[(i, k + 2)] -= v * r;
                    }
                    h[(i, k + 1)] -= v * q;
                    h[(i, k)] -= v;
                }
            }
        }
    }
    Ok(roots)
}

/// Real eigenvalues of a general matrix, ascending.
fn general_values(op: &'static str, a: &Matrix, opts: &LinalgOptions) -> Result<Vec<f64>> {
    let mut h = a.clone();
    hessenberg(&mut h);
    let roots = hessenberg_qr(op, &mut h, opts)?;
    if roots.iter().any(|&(_, im)| im != 0.0) {
        return Err(Error::ComplexEigenvalues { op });
    }
    let mut values: Vec<f64> = roots.into_iter().map(|(re, _)| re).collect();
    values.sort_by(f64::total_cmp);
    Ok(values)
}

fn normalize_column(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return;
    }
    let lead = v.iter().fold(0.0f64, |m, &x| if x.abs() > m.abs() { x } else { m });
    let scale = if lead < 0.0 { -norm } else { norm };
    for x in v.iter_mut() {
        *x /= scale;
    }
}

/// Remove the components along `basis` columns from `v`.
fn orthogonalize(v: &mut [f64], basis: &[Vec<f64>]) {
    for b in basis {
        let d: f64 = v.iter().zip(b).map(|(x, y)| x * y).sum();
        for (x, y) in v.iter_mut().zip(b) {
            *x -= d * y;
        }
    }
}

/// A starting vector for inverse iteration with a solid component outside
/// `basis`. Falls back to the unit vector that `basis` covers least.
fn start_vector(n: usize, basis: &[Vec<f64>]) -> Vec<f64> {
    let remainder = |mut v: Vec<f64>| {
        orthogonalize(&mut v, basis);
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        (v, norm)
    };
    let generic: Vec<f64> = (0..n)
        .map(|i| 1.0 + (i as f64 * 0.618_033_988_75).fract())
        .collect();
    let generic_norm = generic.iter().map(|x| x * x).sum::<f64>().sqrt();
    let (v, norm) = remainder(generic);
    if norm > 0.1 * generic_norm {
        return v;
    }
    (0..n)
        .map(|j| {
            let mut e = vec![0.0; n];
            e[j] = 1.0;
            remainder(e)
        })
        .fold((v, norm), |best, cand| if cand.1 > best.1 { cand } else { best })
        .0
}

/// Eigenvectors for known eigenvalues by inverse iteration.
///
/// Each solve runs against `A - (lambda + delta) I` with a small offset
/// `delta`, which makes the wanted direction dominate after a couple of
/// steps. Vectors of (numerically) repeated eigenvalues are kept
/// orthogonal to each other.
fn inverse_iteration(a: &Matrix, values: &[f64]) -> Matrix {
    const STEPS: usize = 3;
    let n = a.rows();
    let scale = a.max_abs().max(f64::MIN_POSITIVE);
    let delta = 1e-10 * scale;
    let mut vectors: Vec<Vec<f64>> = Vec::with_capacity(n);

    for (c, &lambda) in values.iter().enumerate() {
        let mut shifted = a.clone();
        for i in 0..n {
            shifted[(i, i)] -= lambda + delta;
        }
        let mut lu = PivotedLu::factor(&shifted);
        lu.clamp_pivots(f64::EPSILON * scale);

        let same: Vec<Vec<f64>> = values[..c]
            .iter()
            .zip(&vectors)
            .filter(|(&mu, _)| (mu - lambda).abs() <= 1e-8 * scale)
            .map(|(_, v)| v.clone())
            .collect();

        let mut v = start_vector(n, &same);
        for _ in 0..STEPS {
            orthogonalize(&mut v, &same);
            normalize_column(&mut v);
            v = lu.solve(&v);
        }
        orthogonalize(&mut v, &same);
        normalize_column(&mut v);
        vectors.push(v);
    }

    let mut out = Matrix::zeros(n, n);
    for (j, v) in vectors.iter().enumerate() {
        out.set_column(j, v);
    }
    out
}

/// Symmetric eigenproblem by cyclic Jacobi. Returns ascending eigenvalues
/// and the matching eigenvector columns.
fn jacobi(op: &'static str, a: &Matrix, opts: &LinalgOptions) -> Result<(Vec<f64>, Matrix)> {
    let n = a.rows();
    let mut s = a.clone();
    for i in 0..n {
        for j in i + 1..n {
            s[(i, j)] = s[(j, i)];
        }
    }
    let mut v = Matrix::identity(n);
    let target = opts.eig_tol * s.frobenius();

    let mut sweep = 0;
    loop {
        let mut off = 0.0;
        for p in 0..n {
            for q in p + 1..n {
                off += 2.0 * s[(p, q)] * s[(p, q)];
            }
        }
        let off = off.sqrt();
        tracing::trace!(op, sweep, off, "jacobi sweep");
        if off <= target {
            break;
        }
        if sweep == opts.max_iter {
            return Err(Error::NoConvergence {
                op,
                iterations: sweep,
            });
        }
        sweep += 1;

        for p in 0..n {
            for q in p + 1..n {
                let apq = s[(p, q)];
                if apq == 0.0 {
                    continue;
                }
                let theta = (s[(q, q)] - s[(p, p)]) / (2.0 * apq);
                let t = sign(1.0, theta) / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let sn = t * c;
                for k in 0..n {
                    let (kp, kq) = (s[(k, p)], s[(k, q)]);
                    s[(k, p)] = c * kp - sn * kq;
                    s[(k, q)] = sn * kp + c * kq;
                }
                for k in 0..n {
                    let (pk, qk) = (s[(p, k)], s[(q, k)]);
                    s[(p, k)] = c * pk - sn * qk;
                    s[(q, k)] = sn * pk + c * qk;
                }
                s[(p, q)] = 0.0;
                s[(q, p)] = 0.0;
                for k in 0..n {
                    let (kp, kq) = (v[(k, p)], v[(k, q)]);
                    v[(k, p)] = c * kp - sn * kq;
                    v[(k, q)] = sn * kp + c * kq;
                }
            }
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| s[(i, i)].total_cmp(&s[(j, j)]));
    let values = order.iter().map(|&i| s[(i, i)]).collect();
    let mut vectors = Matrix::zeros(n, n);
    for (dst, &src) in order.iter().enumerate() {
        let mut col = v.column(src);
        normalize_column(&mut col);
        vectors.set_column(dst, &col);
    }
    Ok((values, vectors))
}

fn log_entry<B: Backend>(op: &'static str, a: &Array<B>, batch: &Batch) {
    tracing::debug!(op, shape = %a.shape(), matrices = batch.mats.len(), "eigendecomposition");
}

/// Eigenvalues of general square matrices, ascending.
///
/// Returns `[n]` for a single matrix and `[batch, n]` for rank 3 input.
/// Fails with [`Error::ComplexEigenvalues`] when the spectrum is not real.
pub fn eig<B: Backend>(a: &Array<B>) -> Result<Array<B>> {
    eig_with(a, &LinalgOptions::default())
}

pub fn eig_with<B: Backend>(a: &Array<B>, opts: &LinalgOptions) -> Result<Array<B>> {
    let batch = unpack_square("eig", a)?;
    log_entry("eig", a, &batch);
    let mut values = Vec::with_capacity(batch.mats.len() * batch.rows);
    for m in &batch.mats {
        values.extend(general_values("eig", m, opts)?);
    }
    pack(batch.out_shape(&[batch.rows]), values, a.dtype().float_result(), a.device())
}

/// Eigenvectors of general square matrices, as the columns of an array with
/// the input's shape. Column `j` belongs to eigenvalue `j` of [`eig`].
pub fn eigv<B: Backend>(a: &Array<B>) -> Result<Array<B>> {
    eigv_with(a, &LinalgOptions::default())
}

pub fn eigv_with<B: Backend>(a: &Array<B>, opts: &LinalgOptions) -> Result<Array<B>> {
    let batch = unpack_square("eigv", a)?;
    log_entry("eigv", a, &batch);
    let n = batch.rows;
    let mut out = Vec::with_capacity(batch.mats.len() * n * n);
    for m in &batch.mats {
        let values = general_values("eigv", m, opts)?;
        out.extend(inverse_iteration(m, &values).into_vec());
    }
    pack(a.shape().clone(), out, a.dtype().float_result(), a.device())
}

/// Eigenvalues of symmetric matrices, ascending. Reads the lower triangle.
pub fn eigh<B: Backend>(a: &Array<B>) -> Result<Array<B>> {
    eigh_with(a, &LinalgOptions::default())
}

pub fn eigh_with<B: Backend>(a: &Array<B>, opts: &LinalgOptions) -> Result<Array<B>> {
    let batch = unpack_square("eigh", a)?;
    log_entry("eigh", a, &batch);
    let mut values = Vec::with_capacity(batch.mats.len() * batch.rows);
    for m in &batch.mats {
        values.extend(jacobi("eigh", m, opts)?.0);
    }
    pack(batch.out_shape(&[batch.rows]), values, a.dtype().float_result(), a.device())
}

/// Orthonormal eigenvectors of symmetric matrices, as columns ordered like
/// the values of [`eigh`].
pub fn eighv<B: Backend>(a: &Array<B>) -> Result<Array<B>> {
    eighv_with(a, &LinalgOptions::default())
}

pub fn eighv_with<B: Backend>(a: &Array<B>, opts: &LinalgOptions) -> Result<Array<B>> {
    let batch = unpack_square("eighv", a)?;
    log_entry("eighv", a, &batch);
    let n = batch.rows;
    let mut out = Vec::with_capacity(batch.mats.len() * n * n);
    for m in &batch.mats {
        out.extend(jacobi("eighv", m, opts)?.1.into_vec());
    }
    pack(a.shape().clone(), out, a.dtype().float_result(), a.device())
}
