use crate::error::{Error, Result};
use crate::shape::Shape;

// Layout: memory layout of an array (shape + strides + offset)
//
// The Layout decouples the *logical* shape of an array from how its data is
// arranged in the buffer. This is what makes transpose, permute, slicing,
// flipping, squeeze and expand_dims free: they only derive a new layout and
// share the buffer.
//
// KEY CONCEPTS:
//
// 1. **Strides** are signed element counts. A contiguous [2,3] matrix has
//    strides [3,1]; flipping axis 1 gives strides [3,-1] with the offset
//    moved to the last column.
//
// 2. **Broadcast** views use stride 0: every step along a stretched
//    dimension reads the same element.
//
// 3. **Contiguity** only looks at strides: each stride must equal the next
//    stride times the next dimension, and the last stride must be 1. A
//    contiguous view can still start at a non-zero offset.

/// Layout describes how an array's logical shape maps to flat storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
    strides: Vec<isize>,
    /// Index of the logical element [0, 0, ...] in the storage buffer.
    offset: usize,
}

impl Layout {
    /// Create a new contiguous layout for the given shape.
    pub fn contiguous(shape: Shape) -> Self {
        let strides = shape.stride_contiguous();
        Layout {
            shape,
            strides,
            offset: 0,
        }
    }

    /// Create a layout with explicit strides and offset (for views).
    pub fn new(shape: Shape, strides: Vec<isize>, offset: usize) -> Self {
        Layout {
            shape,
            strides,
            offset,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn elem_count(&self) -> usize {
        self.shape.elem_count()
    }

    /// Row-major check, scanning from the last dimension.
    pub fn is_contiguous(&self) -> bool {
        let dims = self.dims();
        let mut expected = 1isize;
        for i in (0..dims.len()).rev() {
            if self.strides[i] != expected {
                return false;
            }
            expected *= dims[i] as isize;
        }
        true
    }

    /// Contiguous and starting at the beginning of the buffer.
    pub fn is_packed(&self) -> bool {
        self.offset == 0 && self.is_contiguous()
    }

    /// The contiguous storage range `[start, start + len)` covered by this
    /// layout, if it is contiguous.
    pub fn contiguous_range(&self) -> Option<(usize, usize)> {
        if self.is_contiguous() {
            Some((self.offset, self.offset + self.elem_count()))
        } else {
            None
        }
    }

    /// Reorder axes: output axis `i` is input axis `axes[i]`.
    pub fn permute(&self, axes: &[usize]) -> Result<Layout> {
        let rank = self.rank();
        if axes.len() != rank {
            return Err(Error::msg(format!(
                "permute: expected {} axes, got {}",
                rank,
                axes.len()
            )));
        }
        let mut seen = vec![false; rank];
        for &a in axes {
            if a >= rank {
                return Err(Error::AxisOutOfRange {
                    op: "permute",
                    axis: a as isize,
                    ndim: rank,
                });
            }
            if seen[a] {
                crate::bail!("permute: repeated axis {a}");
            }
            seen[a] = true;
        }
        let dims = self.dims();
        Ok(Layout::new(
            Shape::new(axes.iter().map(|&a| dims[a]).collect()),
            axes.iter().map(|&a| self.strides[a]).collect(),
            self.offset,
        ))
    }

    /// Swap two axes.
    pub fn swap_axes(&self, dim0: usize, dim1: usize) -> Result<Layout> {
        let rank = self.rank();
        for d in [dim0, dim1] {
            if d >= rank {
                return Err(Error::AxisOutOfRange {
                    op: "swap_axes",
                    axis: d as isize,
                    ndim: rank,
                });
            }
        }
        let mut axes: Vec<usize> = (0..rank).collect();
        axes.swap(dim0, dim1);
        self.permute(&axes)
    }

    /// The default transpose: rank 2 swaps, rank 3 swaps the trailing two
    /// axes, rank > 3 is unsupported.
    pub fn transpose(&self) -> Result<Layout> {
        let axes = self.shape.default_transpose_axes()?;
        self.permute(&axes)
    }

    /// Strided slice along one axis, `start..end` with a non-zero `step`.
    ///
    /// Bounds are clamped like Python slices. A negative step walks
    /// backwards from `start` (exclusive of `end`) and yields a negative
    /// stride.
    pub fn slice(&self, axis: usize, start: isize, end: isize, step: isize) -> Result<Layout> {
        let rank = self.rank();
        if axis >= rank {
            return Err(Error::AxisOutOfRange {
                op: "slice",
                axis: axis as isize,
                ndim: rank,
            });
        }
        if step == 0 {
            return Err(Error::msg("slice: step cannot be zero"));
        }
        let n = self.dims()[axis] as isize;
        let clamp = |i: isize, lo: isize, hi: isize| {
            let i = if i < 0 { i + n } else { i };
            i.clamp(lo, hi)
        };
        let (first, len) = if step > 0 {
            let s = clamp(start, 0, n);
            let e = clamp(end, 0, n);
            (s, if e > s { (e - s + step - 1) / step } else { 0 })
        } else {
            let s = clamp(start, -1, n - 1);
            let e = clamp(end, -1, n - 1);
            (s, if s > e { (s - e - step - 1) / (-step) } else { 0 })
        };

        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims[axis] = len as usize;
        let offset = if len > 0 {
            self.shifted_offset(first * self.strides[axis])?
        } else {
            self.offset
        };
        strides[axis] *= step;
        Ok(Layout::new(Shape::new(dims), strides, offset))
    }

    /// Narrow along an axis: `len` elements starting at `start`.
    pub fn narrow(&self, axis: usize, start: usize, len: usize) -> Result<Layout> {
        let rank = self.rank();
        if axis >= rank {
            return Err(Error::AxisOutOfRange {
                op: "narrow",
                axis: axis as isize,
                ndim: rank,
            });
        }
        let dim_size = self.dims()[axis];
        if start + len > dim_size {
            return Err(Error::msg(format!(
                "narrow: range {}..{} out of bounds for axis {} of size {}",
                start,
                start + len,
                axis,
                dim_size
            )));
        }
        self.slice(axis, start as isize, (start + len) as isize, 1)
    }

    /// Reverse the order of elements along an axis.
    pub fn flip(&self, axis: usize) -> Result<Layout> {
        let n = self.shape.dim(axis).map_err(|_| Error::AxisOutOfRange {
            op: "flip",
            axis: axis as isize,
            ndim: self.rank(),
        })?;
        if n == 0 {
            return Ok(self.clone());
        }
        let mut strides = self.strides.clone();
        let offset = self.shifted_offset((n as isize - 1) * strides[axis])?;
        strides[axis] = -strides[axis];
        Ok(Layout::new(self.shape.clone(), strides, offset))
    }

    /// Drop size-1 axes (all of them, or exactly `axis`).
    pub fn squeeze(&self, axis: Option<usize>) -> Result<Layout> {
        let keep = self.shape.squeeze_axes(axis)?;
        let dims = self.dims();
        Ok(Layout::new(
            Shape::new(keep.iter().map(|&i| dims[i]).collect()),
            keep.iter().map(|&i| self.strides[i]).collect(),
            self.offset,
        ))
    }

    /// Insert a size-1 axis. The new stride keeps a contiguous layout
    /// contiguous.
    pub fn expand_dims(&self, axis: isize) -> Result<Layout> {
        let pos = self.shape.expand_axis(axis)?;
        let stride = if pos < self.rank() {
            self.strides[pos] * self.dims()[pos] as isize
        } else {
            1
        };
        let mut dims = self.dims().to_vec();
        let mut strides = self.strides.clone();
        dims.insert(pos, 1);
        strides.insert(pos, stride);
        Ok(Layout::new(Shape::new(dims), strides, self.offset))
    }

    /// View this layout with a broadcast target shape: missing leading axes
    /// and stretched size-1 axes get stride 0.
    pub fn broadcast_as(&self, target: &Shape) -> Result<Layout> {
        let src = self.dims();
        let dst = target.dims();
        if src.len() > dst.len() {
            return Err(Error::BroadcastError {
                op: "broadcast_to",
                lhs: self.shape.clone(),
                rhs: target.clone(),
            });
        }
        let lead = dst.len() - src.len();
        let mut strides = vec![0isize; dst.len()];
        for (i, &d) in src.iter().enumerate() {
            if d == dst[i + lead] {
                strides[i + lead] = self.strides[i];
            } else if d != 1 {
                return Err(Error::BroadcastError {
                    op: "broadcast_to",
                    lhs: self.shape.clone(),
                    rhs: target.clone(),
                });
            }
        }
        Ok(Layout::new(target.clone(), strides, self.offset))
    }

    /// Flat storage index of a multi-dimensional index:
    /// `offset + sum(index[i] * strides[i])`.
    pub fn flat_index(&self, index: &[usize]) -> usize {
        let mut flat = self.offset as isize;
        for (i, &idx) in index.iter().enumerate() {
            flat += idx as isize * self.strides[i];
        }
        flat as usize
    }

    /// Flat storage indices of all elements in logical (row-major) order.
    pub fn strided_indices(&self) -> StridedIter {
        StridedIter::new(self, 0)
    }

    /// Like `strided_indices`, starting at the `start`-th logical element.
    /// Used to hand disjoint chunks of an array to worker threads.
    pub fn strided_indices_from(&self, start: usize) -> StridedIter {
        StridedIter::new(self, start)
    }

    fn shifted_offset(&self, delta: isize) -> Result<usize> {
        let off = self.offset as isize + delta;
        if off < 0 {
            return Err(Error::msg(format!(
                "layout offset underflow: {} + {}",
                self.offset, delta
            )));
        }
        Ok(off as usize)
    }
}

// StridedIter: iterates over flat storage indices respecting strides
//
// For a contiguous layout this counts offset, offset+1, ...; for views it
// follows the (possibly negative or zero) strides. The iterator keeps a
// running flat index and updates it incrementally on every step.

/// Iterator that yields flat storage indices for each element of a Layout.
pub struct StridedIter {
    /// Current multi-dimensional index.
    current: Vec<usize>,
    dims: Vec<usize>,
    strides: Vec<isize>,
    /// Flat index of `current`.
    flat: isize,
    remaining: usize,
}

impl StridedIter {
    fn new(layout: &Layout, start: usize) -> Self {
        let dims = layout.dims().to_vec();
        let total = layout.elem_count();
        let start = start.min(total);
        let mut current = vec![0usize; dims.len()];
        let mut rem = start;
        for i in (0..dims.len()).rev() {
            if dims[i] > 0 {
                current[i] = rem % dims[i];
                rem /= dims[i];
            }
        }
        let flat = layout.flat_index(&current) as isize;
        StridedIter {
            current,
            dims,
            strides: layout.strides().to_vec(),
            flat,
            remaining: total - start,
        }
    }

    /// Advance the multi-dimensional index by one (rightmost dimension first).
    fn advance(&mut self) {
        for i in (0..self.dims.len()).rev() {
            self.current[i] += 1;
            self.flat += self.strides[i];
            if self.current[i] < self.dims[i] {
                return;
            }
            self.flat -= self.strides[i] * self.dims[i] as isize;
            self.current[i] = 0;
        }
    }
}

impl Iterator for StridedIter {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        let out = self.flat as usize;
        self.remaining -= 1;
        if self.remaining > 0 {
            self.advance();
        }
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for StridedIter {}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(l: &Layout) -> Vec<usize> {
        l.strided_indices().collect()
    }

    #[test]
    fn test_contiguous_layout() {
        let layout = Layout::contiguous(Shape::from((2, 3)));
        assert!(layout.is_contiguous());
        assert_eq!(layout.strides(), &[3, 1]);
        assert_eq!(indices(&layout), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_transpose_indices() {
        // [[0, 1, 2],
        //  [3, 4, 5]] read column-major
        let layout = Layout::contiguous(Shape::from((2, 3)));
        let t = layout.transpose().unwrap();
        assert_eq!(t.dims(), &[3, 2]);
        assert_eq!(t.strides(), &[1, 3]);
        assert!(!t.is_contiguous());
        assert_eq!(indices(&t), vec![0, 3, 1, 4, 2, 5]);
        assert_eq!(t.transpose().unwrap(), layout);
    }

    #[test]
    fn test_batched_transpose() {
        let layout = Layout::contiguous(Shape::from((2, 2, 3)));
        let t = layout.transpose().unwrap();
        assert_eq!(t.dims(), &[2, 3, 2]);
        assert_eq!(t.strides(), &[6, 1, 3]);
    }

    #[test]
    fn test_flip() {
        let layout = Layout::contiguous(Shape::from((2, 3)));
        let f = layout.flip(1).unwrap();
        assert_eq!(f.strides(), &[3, -1]);
        assert_eq!(f.offset(), 2);
        assert_eq!(indices(&f), vec![2, 1, 0, 5, 4, 3]);
    }

    #[test]
    fn test_slice_steps() {
        let layout = Layout::contiguous(Shape::from(10));
        let s = layout.slice(0, 1, 8, 3).unwrap();
        assert_eq!(indices(&s), vec![1, 4, 7]);
        let r = layout.slice(0, -1, -11, -2).unwrap();
        assert_eq!(indices(&r), vec![9, 7, 5, 3, 1]);
        let empty = layout.slice(0, 5, 2, 1).unwrap();
        assert_eq!(empty.elem_count(), 0);
    }

    #[test]
    fn test_narrow() {
        let layout = Layout::contiguous(Shape::from((4, 6)));
        let n = layout.narrow(1, 2, 3).unwrap();
        assert_eq!(n.dims(), &[4, 3]);
        assert_eq!(n.offset(), 2);
        assert_eq!(n.strides(), &[6, 1]);
        assert!(layout.narrow(1, 5, 3).is_err());
    }

    #[test]
    fn test_expand_dims_keeps_contiguity() {
        let layout = Layout::contiguous(Shape::from((3, 4)));
        for axis in [-3, -1, 0, 1, 2] {
            assert!(layout.expand_dims(axis).unwrap().is_contiguous());
        }
    }

    #[test]
    fn test_squeeze() {
        let layout = Layout::contiguous(Shape::from((1, 3, 1)));
        let s = layout.squeeze(None).unwrap();
        assert_eq!(s.dims(), &[3]);
        assert_eq!(s.strides(), &[1]);
    }

    #[test]
    fn test_broadcast_as() {
        let layout = Layout::contiguous(Shape::from(2));
        let b = layout.broadcast_as(&Shape::from((3, 2))).unwrap();
        assert_eq!(b.strides(), &[0, 1]);
        assert_eq!(indices(&b), vec![0, 1, 0, 1, 0, 1]);
        assert!(layout.broadcast_as(&Shape::from(3)).is_err());
    }

    #[test]
    fn test_strided_from() {
        let layout = Layout::contiguous(Shape::from((2, 3))).transpose().unwrap();
        let tail: Vec<usize> = layout.strided_indices_from(3).collect();
        assert_eq!(tail, vec![4, 2, 5]);
    }

    #[test]
    fn test_flat_index() {
        let layout = Layout::contiguous(Shape::from((2, 3, 4)));
        assert_eq!(layout.flat_index(&[1, 2, 3]), 23);
        assert_eq!(layout.flat_index(&[0, 0, 0]), 0);

        // a resumed iterator starts at the element's flat index
        let flipped = Layout::contiguous(Shape::from((3, 4)))
            .slice(1, -1, -5, -1)
            .unwrap();
        let mut resumed = flipped.strided_indices_from(6);
        assert_eq!(resumed.next(), Some(flipped.flat_index(&[1, 2])));
        assert_eq!(resumed.next(), Some(4));
    }
}
