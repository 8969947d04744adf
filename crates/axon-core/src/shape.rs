use std::fmt;

use crate::error::{Error, Result};

// Shape: N-dimensional shape representation
//
// A Shape describes the size of each dimension of an array:
//   - Scalar: Shape([])          0 dimensions, 1 element
//   - Vector: Shape([5])         1 dimension, 5 elements
//   - Matrix: Shape([3, 4])      2 dimensions, 12 elements
//   - Batch:  Shape([2, 3, 4])   3 dimensions, 24 elements
//
// The geometry rules of the engine (broadcasting, default transpose,
// reshape, squeeze, expand_dims, reduced shapes) are all pure functions of
// shapes and live here. Anything that also needs strides lives in Layout.

/// N-dimensional shape of an array.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Shape(dims)
    }

    /// The dimension sizes as a slice.
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// Number of dimensions (0 for scalar, 1 for vector, 2 for matrix, etc.).
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements, a plain product of the dimensions.
    /// The empty shape is a scalar with one element; any zero-sized
    /// dimension makes the count zero.
    pub fn elem_count(&self) -> usize {
        self.0.iter().product()
    }

    /// Canonical row-major strides, in elements.
    ///
    /// Right-to-left running product: for [2, 3, 4] this is [12, 4, 1].
    pub fn stride_contiguous(&self) -> Vec<isize> {
        let mut strides = vec![0isize; self.rank()];
        let mut acc = 1isize;
        for i in (0..self.rank()).rev() {
            strides[i] = acc;
            acc *= self.0[i] as isize;
        }
        strides
    }

    /// Size of a specific dimension.
    pub fn dim(&self, d: usize) -> Result<usize> {
        self.0.get(d).copied().ok_or(Error::AxisOutOfRange {
            op: "dim",
            axis: d as isize,
            ndim: self.rank(),
        })
    }

    // Broadcasting

    /// Compute the broadcast output shape from two input shapes.
    ///
    /// Shapes are right-aligned, missing leading dimensions count as 1, and
    /// each aligned pair must be equal or contain a 1 that stretches.
    ///
    ///   [3, 4] and [4]       -> [3, 4]
    ///   [2, 1] and [1, 3]    -> [2, 3]
    ///   [5, 3, 1] and [3, 4] -> [5, 3, 4]
    ///   [3] and [4]          -> BroadcastError
    pub fn broadcast_shape(op: &'static str, lhs: &Shape, rhs: &Shape) -> Result<Shape> {
        let l = lhs.dims();
        let r = rhs.dims();
        let max_rank = l.len().max(r.len());
        let mut result = Vec::with_capacity(max_rank);

        for i in 0..max_rank {
            let ld = if i < l.len() { l[l.len() - 1 - i] } else { 1 };
            let rd = if i < r.len() { r[r.len() - 1 - i] } else { 1 };

            if ld == rd || rd == 1 {
                result.push(ld);
            } else if ld == 1 {
                result.push(rd);
            } else {
                return Err(Error::BroadcastError {
                    op,
                    lhs: lhs.clone(),
                    rhs: rhs.clone(),
                });
            }
        }

        result.reverse();
        Ok(Shape::new(result))
    }

    // Geometry

    /// Shape after a reshape request in which at most one entry may be -1.
    pub fn resolve_reshape(&self, request: &[isize]) -> Result<Shape> {
        let src = self.elem_count();
        let mut inferred = None;
        let mut known = 1usize;
        for (i, &d) in request.iter().enumerate() {
            if d == -1 {
                if inferred.replace(i).is_some() {
                    return Err(Error::msg("reshape: only one dimension can be inferred"));
                }
            } else if d < 0 {
                crate::bail!("reshape: invalid dimension {d}");
            } else {
                known *= d as usize;
            }
        }
        let mut dims: Vec<usize> = request.iter().map(|&d| d.max(0) as usize).collect();
        if let Some(i) = inferred {
            if known == 0 || src % known != 0 {
                dims[i] = 0;
                let dst_shape = Shape::new(dims);
                return Err(Error::ReshapeSizeMismatch {
                    src,
                    dst: dst_shape.elem_count(),
                    dst_shape,
                });
            }
            dims[i] = src / known;
        }
        let target = Shape::new(dims);
        self.check_reshape(&target)?;
        Ok(target)
    }

    /// A reshape is valid iff the element counts agree.
    pub fn check_reshape(&self, target: &Shape) -> Result<()> {
        if self.elem_count() != target.elem_count() {
            return Err(Error::ReshapeSizeMismatch {
                src: self.elem_count(),
                dst: target.elem_count(),
                dst_shape: target.clone(),
            });
        }
        Ok(())
    }

    /// Axes that `squeeze` keeps. `None` drops every size-1 dimension, an
    /// explicit axis drops only that one and must have size 1.
    pub fn squeeze_axes(&self, axis: Option<usize>) -> Result<Vec<usize>> {
        match axis {
            None => Ok((0..self.rank()).filter(|&i| self.0[i] != 1).collect()),
            Some(axis) => {
                let size = self.dim(axis).map_err(|_| Error::AxisOutOfRange {
                    op: "squeeze",
                    axis: axis as isize,
                    ndim: self.rank(),
                })?;
                if size != 1 {
                    return Err(Error::InvalidSqueezeAxis {
                        axis,
                        size,
                        shape: self.clone(),
                    });
                }
                Ok((0..self.rank()).filter(|&i| i != axis).collect())
            }
        }
    }

    pub fn squeeze(&self, axis: Option<usize>) -> Result<Shape> {
        let keep = self.squeeze_axes(axis)?;
        Ok(Shape::new(keep.iter().map(|&i| self.0[i]).collect()))
    }

    /// Position at which `expand_dims` inserts the new axis.
    /// Negative axes count from the end of the *output* rank.
    pub fn expand_axis(&self, axis: isize) -> Result<usize> {
        normalize_axis("expand_dims", axis, self.rank() + 1)
    }

    pub fn expand_dims(&self, axis: isize) -> Result<Shape> {
        let pos = self.expand_axis(axis)?;
        let mut dims = self.0.clone();
        dims.insert(pos, 1);
        Ok(Shape::new(dims))
    }

    /// Axis order of the default transpose: identity for rank 0 and 1, a
    /// swap for rank 2, and a swap of the trailing two axes for rank 3 with
    /// the batch axis kept in front.
    pub fn default_transpose_axes(&self) -> Result<Vec<usize>> {
        match self.rank() {
            0 => Ok(vec![]),
            1 => Ok(vec![0]),
            2 => Ok(vec![1, 0]),
            3 => Ok(vec![0, 2, 1]),
            got => Err(Error::UnsupportedRank {
                op: "transpose",
                got,
                expected: "rank <= 3",
            }),
        }
    }

    pub fn transpose(&self) -> Result<Shape> {
        let axes = self.default_transpose_axes()?;
        Ok(Shape::new(axes.iter().map(|&a| self.0[a]).collect()))
    }

    /// Output shape of a reduction. `None` reduces every axis.
    pub fn reduced(&self, axis: Option<usize>, keepdims: bool) -> Shape {
        match (axis, keepdims) {
            (None, false) => Shape::new(vec![]),
            (None, true) => Shape::new(vec![1]),
            (Some(a), false) => {
                let mut dims = self.0.clone();
                dims.remove(a);
                Shape::new(dims)
            }
            (Some(a), true) => {
                let mut dims = self.0.clone();
                dims[a] = 1;
                Shape::new(dims)
            }
        }
    }
}

/// Map a possibly negative axis into `[0, ndim)`.
pub fn normalize_axis(op: &'static str, axis: isize, ndim: usize) -> Result<usize> {
    let n = ndim as isize;
    let resolved = if axis < 0 { axis + n } else { axis };
    if resolved < 0 || resolved >= n {
        return Err(Error::AxisOutOfRange { op, axis, ndim });
    }
    Ok(resolved as usize)
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

// Convenient From implementations
// These let you write: Shape::from((3, 4)) instead of Shape::new(vec![3, 4])

impl From<()> for Shape {
    /// Scalar shape (0 dimensions).
    fn from(_: ()) -> Self {
        Shape(vec![])
    }
}

impl From<usize> for Shape {
    /// 1-D shape.
    fn from(d: usize) -> Self {
        Shape(vec![d])
    }
}

impl From<(usize,)> for Shape {
    fn from((d0,): (usize,)) -> Self {
        Shape(vec![d0])
    }
}

impl From<(usize, usize)> for Shape {
    fn from((d0, d1): (usize, usize)) -> Self {
        Shape(vec![d0, d1])
    }
}

impl From<(usize, usize, usize)> for Shape {
    fn from((d0, d1, d2): (usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2])
    }
}

impl From<(usize, usize, usize, usize)> for Shape {
    fn from((d0, d1, d2, d3): (usize, usize, usize, usize)) -> Self {
        Shape(vec![d0, d1, d2, d3])
    }
}

impl From<Vec<usize>> for Shape {
    fn from(v: Vec<usize>) -> Self {
        Shape(v)
    }
}

impl From<&[usize]> for Shape {
    fn from(s: &[usize]) -> Self {
        Shape(s.to_vec())
    }
}

impl From<&Shape> for Shape {
    fn from(s: &Shape) -> Self {
        s.clone()
    }
}
