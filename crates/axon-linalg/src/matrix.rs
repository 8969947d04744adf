use std::ops::{Index, IndexMut};

use axon_core::{Array, Backend, DType, Error, Result, Shape};

// Dense f64 working matrices
//
// Every decomposition copies its input out of the array into row-major f64
// matrices, runs there, and packs the results back into a fresh array. A
// rank-2 input is one matrix; a rank-3 input is a batch over dim 0.

/// Row-major dense matrix of f64.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m[(i, i)] = 1.0;
        }
        m
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), rows * cols);
        Matrix { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    pub fn transpose(&self) -> Matrix {
        let mut t = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                t[(j, i)] = self[(i, j)];
            }
        }
        t
    }

    /// Plain triple-loop product. Callers guarantee matching inner dims.
    pub fn matmul(&self, other: &Matrix) -> Matrix {
        debug_assert_eq!(self.cols, other.rows);
        let mut out = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            for p in 0..self.cols {
                let a = self[(i, p)];
                if a == 0.0 {
                    continue;
                }
                for j in 0..other.cols {
                    out[(i, j)] += a * other[(p, j)];
                }
            }
        }
        out
    }

    /// Largest absolute entry, the scale for relative tolerances.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |m, v| m.max(v.abs()))
    }

    pub fn frobenius(&self) -> f64 {
        self.data.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    pub fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for c in 0..self.cols {
            self.data.swap(a * self.cols + c, b * self.cols + c);
        }
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.rows).map(|i| self[(i, j)]).collect()
    }

    pub fn set_column(&mut self, j: usize, values: &[f64]) {
        for (i, &v) in values.iter().enumerate() {
            self[(i, j)] = v;
        }
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[i * self.cols + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        &mut self.data[i * self.cols + j]
    }
}

// LU with partial pivoting
//
// PA = LU with L unit lower triangular, both packed into one matrix. A zero
// pivot column is left as is, so the factorization of a singular matrix
// still exists and its determinant comes out as exactly 0.

pub(crate) struct PivotedLu {
    lu: Matrix,
    /// Row `i` of PA is row `perm[i]` of A.
    perm: Vec<usize>,
    swaps: usize,
}

impl PivotedLu {
    pub fn factor(a: &Matrix) -> Self {
        let n = a.rows();
        let mut lu = a.clone();
        let mut perm: Vec<usize> = (0..n).collect();
        let mut swaps = 0;
        for k in 0..n {
            let mut p = k;
            for i in k + 1..n {
                if lu[(i, k)].abs() > lu[(p, k)].abs() {
                    p = i;
                }
            }
            if p != k {
                lu.swap_rows(p, k);
                perm.swap(p, k);
                swaps += 1;
            }
            let pivot = lu[(k, k)];
            if pivot == 0.0 {
                continue;
            }
            for i in k + 1..n {
                let f = lu[(i, k)] / pivot;
                lu[(i, k)] = f;
                if f == 0.0 {
                    continue;
                }
                for j in k + 1..n {
                    let u = lu[(k, j)];
                    lu[(i, j)] -= f * u;
                }
            }
        }
        PivotedLu { lu, perm, swaps }
    }

    pub fn det(&self) -> f64 {
        let sign = if self.swaps % 2 == 0 { 1.0 } else { -1.0 };
        (0..self.lu.rows()).fold(sign, |d, i| d * self.lu[(i, i)])
    }

    /// Smallest absolute pivot; infinite for an empty matrix.
    pub fn min_pivot(&self) -> f64 {
        (0..self.lu.rows()).fold(f64::INFINITY, |m, i| m.min(self.lu[(i, i)].abs()))
    }

    /// Solve `A x = b`. Only meaningful when every pivot is non-zero.
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.lu.rows();
        let mut x: Vec<f64> = self.perm.iter().map(|&p| b[p]).collect();
        for i in 0..n {
            for j in 0..i {
                x[i] -= self.lu[(i, j)] * x[j];
            }
        }
        for i in (0..n).rev() {
            for j in i + 1..n {
                x[i] -= self.lu[(i, j)] * x[j];
            }
            x[i] /= self.lu[(i, i)];
        }
        x
    }

    /// Raise pivots smaller than `floor` in magnitude to `floor`, keeping
    /// their sign. Used by inverse iteration, where the shifted matrix is
    /// singular on purpose.
    pub fn clamp_pivots(&mut self, floor: f64) {
        for i in 0..self.lu.rows() {
            let p = self.lu[(i, i)];
            if p.abs() < floor {
                self.lu[(i, i)] = if p < 0.0 { -floor } else { floor };
            }
        }
    }

    /// L with the row permutation folded in, so that `lower() * upper() == A`.
    pub fn lower(&self) -> Matrix {
        let n = self.lu.rows();
        let mut l = Matrix::zeros(n, n);
        for i in 0..n {
            let row = self.perm[i];
            for j in 0..i {
                l[(row, j)] = self.lu[(i, j)];
            }
            l[(row, i)] = 1.0;
        }
        l
    }

    pub fn upper(&self) -> Matrix {
        let n = self.lu.rows();
        let mut u = Matrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                u[(i, j)] = self.lu[(i, j)];
            }
        }
        u
    }
}

// Batching

/// Matrices read out of a rank-2 or rank-3 array.
pub(crate) struct Batch {
    pub mats: Vec<Matrix>,
    /// Length of the leading batch axis, `None` for a rank-2 input.
    pub batch: Option<usize>,
    pub rows: usize,
    pub cols: usize,
}

impl Batch {
    /// Dims of an output with `inner` trailing dims per matrix.
    pub fn out_shape(&self, inner: &[usize]) -> Shape {
        Shape::new(self.batch.iter().chain(inner).copied().collect())
    }
}

pub(crate) fn unpack<B: Backend>(op: &'static str, a: &Array<B>) -> Result<Batch> {
    let (batch, rows, cols) = match *a.dims() {
        [r, c] => (None, r, c),
        [b, r, c] => (Some(b), r, c),
        _ => {
            return Err(Error::UnsupportedRank {
                op,
                got: a.rank(),
                expected: "rank 2 or 3",
            })
        }
    };
    let data = a.to_f64_vec()?;
    let size = rows * cols;
    let mats = (0..batch.unwrap_or(1))
        .map(|i| Matrix::from_vec(rows, cols, data[i * size..(i + 1) * size].to_vec()))
        .collect();
    Ok(Batch {
        mats,
        batch,
        rows,
        cols,
    })
}

pub(crate) fn unpack_square<B: Backend>(op: &'static str, a: &Array<B>) -> Result<Batch> {
    let batch = unpack(op, a)?;
    if batch.rows != batch.cols {
        return Err(Error::NotSquare {
            op,
            rows: batch.rows,
            cols: batch.cols,
        });
    }
    Ok(batch)
}

/// Build a contiguous result array from row-major f64 data.
pub(crate) fn pack<B: Backend>(
    shape: Shape,
    data: Vec<f64>,
    dtype: DType,
    device: &B::Device,
) -> Result<Array<B>> {
    Array::from_f64_slice(&data, shape, dtype, device)
}
