use axon_core::{normalize_axis, Array, Backend, Error, Result, Shape};

// Products
//
// These keep the input dtype. `dot` and `inner` go through the backend GEMM
// and reduction kernels; `cross` and `trace` read the operands out as f64
// and write the result back in the input dtype.

/// `dot` for rank <= 2 operands, or two rank-3 batches of equal length.
///
/// A 0-D operand scales the other one. Anything beyond those cases is
/// rejected rather than broadcast; use [`Array::matmul`] for that.
pub fn dot<B: Backend>(a: &Array<B>, b: &Array<B>) -> Result<Array<B>> {
    match (a.rank(), b.rank()) {
        (0, _) | (_, 0) => a.mul(b),
        (ra, rb) if ra <= 2 && rb <= 2 => a.matmul(b),
        (3, 3) => {
            if a.dims()[0] != b.dims()[0] {
                let mut expected = b.dims().to_vec();
                expected[0] = a.dims()[0];
                return Err(Error::ShapeMismatch {
                    op: "dot",
                    expected: Shape::new(expected),
                    got: b.shape().clone(),
                });
            }
            a.matmul(b)
        }
        (ra, rb) => Err(Error::UnsupportedRank {
            op: "dot",
            got: ra.max(rb),
            expected: "rank <= 2, or two rank-3 operands",
        }),
    }
}

/// Inner product of two equal-length vectors, as a 0-D array.
pub fn inner<B: Backend>(a: &Array<B>, b: &Array<B>) -> Result<Array<B>> {
    for x in [a, b] {
        if x.rank() != 1 {
            return Err(Error::UnsupportedRank {
                op: "inner",
                got: x.rank(),
                expected: "rank 1",
            });
        }
    }
    if a.shape() != b.shape() {
        return Err(Error::ShapeMismatch {
            op: "inner",
            expected: a.shape().clone(),
            got: b.shape().clone(),
        });
    }
    a.mul(b)?.sum(None, false)
}

/// Outer product `out[i, j] = a[i] * b[j]`. Operands of any rank are
/// flattened first.
pub fn outer<B: Backend>(a: &Array<B>, b: &Array<B>) -> Result<Array<B>> {
    let col = a.reshape((a.elem_count(), 1))?;
    let row = b.reshape((1, b.elem_count()))?;
    col.mul(&row)
}

/// Cross product of 3-vectors.
///
/// Rank-1 operands must have length 3. For rank 2 and 3 the axis holding
/// the vector components has to be given explicitly; it may be negative.
/// Both operands must have the same shape and dtype.
pub fn cross<B: Backend>(a: &Array<B>, b: &Array<B>, axis: Option<isize>) -> Result<Array<B>> {
    const OP: &str = "cross";
    if a.dtype() != b.dtype() {
        return Err(Error::DTypeMismatch {
            op: OP,
            lhs: a.dtype(),
            rhs: b.dtype(),
        });
    }
    let ndim = a.rank();
    let axis = match (ndim, axis) {
        (1, None) => 0,
        (1..=3, Some(ax)) => normalize_axis(OP, ax, ndim)?,
        (2 | 3, None) => return Err(Error::MissingAxis { op: OP, ndim }),
        (got, _) => {
            return Err(Error::UnsupportedRank {
                op: OP,
                got,
                expected: "rank 1, 2 or 3",
            })
        }
    };
    if a.shape() != b.shape() {
        return Err(Error::ShapeMismatch {
            op: OP,
            expected: a.shape().clone(),
            got: b.shape().clone(),
        });
    }
    if a.dims()[axis] != 3 {
        let mut expected = a.dims().to_vec();
        expected[axis] = 3;
        return Err(Error::ShapeMismatch {
            op: OP,
            expected: Shape::new(expected),
            got: a.shape().clone(),
        });
    }

    let (x, y) = (a.to_f64_vec()?, b.to_f64_vec()?);
    let inner: usize = a.dims()[axis + 1..].iter().product();
    let outer: usize = a.dims()[..axis].iter().product();
    let mut out = vec![0.0; x.len()];
    for o in 0..outer {
        for i in 0..inner {
            let at = |k: usize| (o * 3 + k) * inner + i;
            let (x0, x1, x2) = (x[at(0)], x[at(1)], x[at(2)]);
            let (y0, y1, y2) = (y[at(0)], y[at(1)], y[at(2)]);
            out[at(0)] = x1 * y2 - x2 * y1;
            out[at(1)] = x2 * y0 - x0 * y2;
            out[at(2)] = x0 * y1 - x1 * y0;
        }
    }
    Array::from_f64_slice(&out, a.shape().clone(), a.dtype(), a.device())
}

/// Sum of the main diagonal. Rank 3 gives one trace per matrix.
/// Non-square matrices sum their `min(rows, cols)` diagonal entries.
pub fn trace<B: Backend>(a: &Array<B>) -> Result<Array<B>> {
    let batch = crate::matrix::unpack("trace", a)?;
    let k = batch.rows.min(batch.cols);
    let values: Vec<f64> = batch
        .mats
        .iter()
        .map(|m| (0..k).map(|i| m[(i, i)]).sum())
        .collect();
    crate::matrix::pack(batch.out_shape(&[]), values, a.dtype(), a.device())
}

/// Affine map `input @ weight.T + bias`.
///
/// `weight` is `[out_features, in_features]`; `input` is a single sample
/// `[in_features]` or any batch `[..., in_features]`. `bias`, when given,
/// broadcasts against the `[..., out_features]` result.
pub fn linear<B: Backend>(
    input: &Array<B>,
    weight: &Array<B>,
    bias: Option<&Array<B>>,
) -> Result<Array<B>> {
    if weight.rank() != 2 {
        return Err(Error::UnsupportedRank {
            op: "linear",
            got: weight.rank(),
            expected: "rank 2 weight",
        });
    }
    let out = input.matmul(&weight.t()?)?;
    match bias {
        Some(b) => out.add(b),
        None => Ok(out),
    }
}
