use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backend::Backend;
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::nested::NestedData;
use crate::shape::Shape;

// Array: the fundamental data structure
//
// An Array is an n-dimensional, strided view over a typed buffer:
//
//   1. Holds data on a specific backend device
//   2. Has a shape, signed strides and an offset (its Layout)
//   3. Has a dtype, fixed for the lifetime of the buffer
//
// MEMORY MODEL:
//
//   The buffer sits behind Arc<RwLock<Storage>>. Views (transpose, slice,
//   squeeze, ...) clone the Arc and derive a new Layout, so a buffer is
//   released only when the last array referencing it is dropped. Many
//   arrays may read the buffer concurrently. The single in-place operation,
//   make_contiguous, needs `&mut self` and the write lock, and detaches onto
//   a fresh buffer when other arrays still share the old one.
//
//   Every other operation allocates a new buffer for its result and never
//   writes to its inputs.

/// An n-dimensional array of numbers on a specific backend.
///
/// # Type Parameter
/// - `B: Backend`: the compute backend (e.g. `CpuBackend`)
///
/// # Example
/// ```ignore
/// use axon_core::{Array, DType};
/// use axon_cpu::{CpuBackend, CpuDevice};
///
/// let a = Array::<CpuBackend>::from_f64_slice(&[1.0, 2.0, 3.0, 4.0], (2, 2), DType::F64, &CpuDevice)?;
/// let b = a.add(10.0)?;
/// ```
pub struct Array<B: Backend> {
    storage: Arc<RwLock<B::Storage>>,
    layout: Layout,
    dtype: DType,
    device: B::Device,
    /// Set when this array borrows a buffer created by another array.
    is_view: bool,
}

impl<B: Backend> Clone for Array<B> {
    fn clone(&self) -> Self {
        Array {
            storage: Arc::clone(&self.storage),
            layout: self.layout.clone(),
            dtype: self.dtype,
            device: self.device.clone(),
            is_view: self.is_view,
        }
    }
}

impl<B: Backend> std::fmt::Debug for Array<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Array(shape={}, strides={:?}, dtype={}, device={:?}, view={})",
            self.layout.shape(),
            self.layout.strides(),
            self.dtype,
            self.device,
            self.is_view,
        )
    }
}

impl<B: Backend> Array<B> {
    // Internal constructors

    /// Wrap freshly produced storage. The new array is the sole owner.
    pub(crate) fn from_storage(
        storage: B::Storage,
        layout: Layout,
        dtype: DType,
        device: B::Device,
    ) -> Self {
        Array {
            storage: Arc::new(RwLock::new(storage)),
            layout,
            dtype,
            device,
            is_view: false,
        }
    }

    /// An array sharing this buffer through a different layout.
    fn view_with_layout(&self, layout: Layout) -> Self {
        Array {
            storage: Arc::clone(&self.storage),
            layout,
            dtype: self.dtype,
            device: self.device.clone(),
            is_view: true,
        }
    }

    // Accessors

    pub fn shape(&self) -> &Shape {
        self.layout.shape()
    }

    /// The dimensions as a slice (shortcut for shape().dims()).
    pub fn dims(&self) -> &[usize] {
        self.layout.dims()
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.layout.rank()
    }

    /// Total number of elements.
    pub fn elem_count(&self) -> usize {
        self.layout.elem_count()
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// The memory layout (shape + strides + offset).
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    pub fn is_view(&self) -> bool {
        self.is_view
    }

    /// Whether two arrays read the same buffer.
    pub fn shares_storage(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Read access to the underlying storage.
    pub fn storage(&self) -> Result<RwLockReadGuard<'_, B::Storage>> {
        self.read_storage()
    }

    pub(crate) fn read_storage(&self) -> Result<RwLockReadGuard<'_, B::Storage>> {
        self.storage
            .read()
            .map_err(|_| Error::msg("storage lock poisoned"))
    }

    fn write_storage(&self) -> Result<RwLockWriteGuard<'_, B::Storage>> {
        self.storage
            .write()
            .map_err(|_| Error::msg("storage lock poisoned"))
    }

    /// Run `f` with both buffers read-locked. Arrays that share a buffer
    /// take the lock once.
    pub(crate) fn with_storages<R>(
        &self,
        other: &Self,
        f: impl FnOnce(&B::Storage, &B::Storage) -> Result<R>,
    ) -> Result<R> {
        let lhs = self.read_storage()?;
        if self.shares_storage(other) {
            return f(&lhs, &lhs);
        }
        let rhs = other.read_storage()?;
        f(&lhs, &rhs)
    }

    // Creation methods

    pub fn zeros(shape: impl Into<Shape>, dtype: DType, device: &B::Device) -> Result<Self> {
        let shape = shape.into();
        let storage = B::zeros(&shape, dtype, device)?;
        Ok(Self::from_storage(
            storage,
            Layout::contiguous(shape),
            dtype,
            device.clone(),
        ))
    }

    pub fn ones(shape: impl Into<Shape>, dtype: DType, device: &B::Device) -> Result<Self> {
        let shape = shape.into();
        let storage = B::ones(&shape, dtype, device)?;
        Ok(Self::from_storage(
            storage,
            Layout::contiguous(shape),
            dtype,
            device.clone(),
        ))
    }

    /// Create an array filled with a constant value.
    pub fn full(
        shape: impl Into<Shape>,
        val: f64,
        dtype: DType,
        device: &B::Device,
    ) -> Result<Self> {
        let shape = shape.into();
        let storage = B::full(&shape, val, dtype, device)?;
        Ok(Self::from_storage(
            storage,
            Layout::contiguous(shape),
            dtype,
            device.clone(),
        ))
    }

    /// A 0-D array holding one value.
    pub fn scalar(val: f64, dtype: DType, device: &B::Device) -> Result<Self> {
        Self::full((), val, dtype, device)
    }

    /// Create an array from a flat slice of f64 values in row-major order.
    /// The data is converted to the specified dtype.
    pub fn from_f64_slice(
        data: &[f64],
        shape: impl Into<Shape>,
        dtype: DType,
        device: &B::Device,
    ) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                expected: shape.elem_count(),
                got: data.len(),
                shape,
            });
        }
        let storage = B::from_f64_slice(data, dtype, device)?;
        Ok(Self::from_storage(
            storage,
            Layout::contiguous(shape),
            dtype,
            device.clone(),
        ))
    }

    /// Materialize a nested literal into a freshly owned contiguous buffer.
    pub fn from_nested(
        data: impl Into<NestedData>,
        dtype: DType,
        device: &B::Device,
    ) -> Result<Self> {
        let (shape, values) = data.into().to_flat()?;
        Self::from_f64_slice(&values, shape, dtype, device)
    }

    /// Uniform samples in `[low, high)`.
    pub fn rand_uniform(
        shape: impl Into<Shape>,
        low: f64,
        high: f64,
        dtype: DType,
        device: &B::Device,
    ) -> Result<Self> {
        let shape = shape.into();
        let storage = B::rand_uniform(&shape, low, high, dtype, device)?;
        Ok(Self::from_storage(
            storage,
            Layout::contiguous(shape),
            dtype,
            device.clone(),
        ))
    }

    /// Normal samples with the given mean and standard deviation.
    pub fn rand_normal(
        shape: impl Into<Shape>,
        mean: f64,
        std: f64,
        dtype: DType,
        device: &B::Device,
    ) -> Result<Self> {
        let shape = shape.into();
        let storage = B::rand_normal(&shape, mean, std, dtype, device)?;
        Ok(Self::from_storage(
            storage,
            Layout::contiguous(shape),
            dtype,
            device.clone(),
        ))
    }

    /// Uniform integers in `[low, high)`.
    pub fn randint(
        shape: impl Into<Shape>,
        low: i64,
        high: i64,
        dtype: DType,
        device: &B::Device,
    ) -> Result<Self> {
        let shape = shape.into();
        let storage = B::randint(&shape, low, high, dtype, device)?;
        Ok(Self::from_storage(
            storage,
            Layout::contiguous(shape),
            dtype,
            device.clone(),
        ))
    }

    /// `steps` evenly spaced values from `start` to `end` (inclusive).
    ///
    /// ```ignore
    /// let t = Array::linspace(0.0, 1.0, 5, DType::F64, &dev)?;
    /// // => [0.0, 0.25, 0.5, 0.75, 1.0]
    /// ```
    pub fn linspace(
        start: f64,
        end: f64,
        steps: usize,
        dtype: DType,
        device: &B::Device,
    ) -> Result<Self> {
        if steps == 0 {
            return Self::from_f64_slice(&[], 0, dtype, device);
        }
        if steps == 1 {
            return Self::from_f64_slice(&[start], 1, dtype, device);
        }
        let step = (end - start) / (steps as f64 - 1.0);
        let data: Vec<f64> = (0..steps).map(|i| start + step * i as f64).collect();
        Self::from_f64_slice(&data, steps, dtype, device)
    }

    /// Values `start, start + step, ...` strictly before `stop`.
    pub fn arange(
        start: f64,
        stop: f64,
        step: f64,
        dtype: DType,
        device: &B::Device,
    ) -> Result<Self> {
        if step == 0.0 || !step.is_finite() {
            crate::bail!("arange: invalid step {step}");
        }
        let count = ((stop - start) / step).ceil();
        // the f64 staging buffer must be addressable
        let limit = (isize::MAX as usize / std::mem::size_of::<f64>()) as f64;
        if !(count <= limit) {
            crate::bail!("arange: [{start}, {stop}) with step {step} has too many elements");
        }
        let n = count.max(0.0) as usize;
        let data: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
        Self::from_f64_slice(&data, n, dtype, device)
    }

    /// Identity matrix of size `n x n`.
    pub fn eye(n: usize, dtype: DType, device: &B::Device) -> Result<Self> {
        let mut data = vec![0.0f64; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self::from_f64_slice(&data, (n, n), dtype, device)
    }

    pub fn zeros_like(other: &Self) -> Result<Self> {
        Self::zeros(other.shape().clone(), other.dtype(), other.device())
    }

    pub fn ones_like(other: &Self) -> Result<Self> {
        Self::ones(other.shape().clone(), other.dtype(), other.device())
    }

    pub fn full_like(other: &Self, val: f64) -> Result<Self> {
        Self::full(other.shape().clone(), val, other.dtype(), other.device())
    }

    // Views (no data copy)

    /// A new array sharing this buffer with identical shape and strides.
    pub fn view(&self) -> Self {
        self.view_with_layout(self.layout.clone())
    }

    /// Default transpose: identity for rank <= 1, swap for rank 2, swap of
    /// the trailing two axes for rank 3.
    pub fn transpose(&self) -> Result<Self> {
        Ok(self.view_with_layout(self.layout.transpose()?))
    }

    /// Transpose a 2-D matrix. Errors for any other rank.
    pub fn t(&self) -> Result<Self> {
        if self.rank() != 2 {
            return Err(Error::UnsupportedRank {
                op: "t",
                got: self.rank(),
                expected: "rank 2",
            });
        }
        self.transpose()
    }

    pub fn swap_axes(&self, dim0: usize, dim1: usize) -> Result<Self> {
        Ok(self.view_with_layout(self.layout.swap_axes(dim0, dim1)?))
    }

    /// Permute the axes: output axis `i` is input axis `axes[i]`.
    pub fn permute(&self, axes: &[usize]) -> Result<Self> {
        Ok(self.view_with_layout(self.layout.permute(axes)?))
    }

    /// Python-style strided slice along one axis.
    pub fn slice(&self, axis: usize, start: isize, end: isize, step: isize) -> Result<Self> {
        Ok(self.view_with_layout(self.layout.slice(axis, start, end, step)?))
    }

    pub fn narrow(&self, axis: usize, start: usize, len: usize) -> Result<Self> {
        Ok(self.view_with_layout(self.layout.narrow(axis, start, len)?))
    }

    /// Reverse the element order along an axis (negative stride view).
    pub fn flip(&self, axis: usize) -> Result<Self> {
        Ok(self.view_with_layout(self.layout.flip(axis)?))
    }

    /// Remove every size-1 axis (`None`) or exactly one of them.
    pub fn squeeze(&self, axis: Option<usize>) -> Result<Self> {
        Ok(self.view_with_layout(self.layout.squeeze(axis)?))
    }

    /// Insert a size-1 axis. `axis` may be negative, counting from the end
    /// of the output rank.
    pub fn expand_dims(&self, axis: isize) -> Result<Self> {
        Ok(self.view_with_layout(self.layout.expand_dims(axis)?))
    }

    /// Read-only broadcast view with stride 0 along stretched axes.
    pub fn broadcast_to(&self, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        Ok(self.view_with_layout(self.layout.broadcast_as(&shape)?))
    }

    /// Reshape to a new shape with the same element count. Contiguous
    /// arrays are reshaped as views; others are packed first.
    pub fn reshape(&self, new_shape: impl Into<Shape>) -> Result<Self> {
        let new_shape = new_shape.into();
        self.shape().check_reshape(&new_shape)?;
        if self.is_contiguous() {
            let layout = Layout::new(
                new_shape.clone(),
                new_shape.stride_contiguous(),
                self.layout.offset(),
            );
            return Ok(self.view_with_layout(layout));
        }
        let packed = self.contiguous()?;
        Ok(Self {
            layout: Layout::contiguous(new_shape),
            ..packed
        })
    }

    /// Reshape where one dimension may be `-1` and is inferred.
    pub fn reshape_infer(&self, dims: &[isize]) -> Result<Self> {
        let shape = self.shape().resolve_reshape(dims)?;
        self.reshape(shape)
    }

    /// Collapse to one dimension.
    pub fn flatten(&self) -> Result<Self> {
        self.reshape(self.elem_count())
    }

    // Materialization

    /// A freshly allocated, canonically strided copy. Always copies.
    pub fn contiguous(&self) -> Result<Self> {
        let storage = self.read_storage()?;
        let packed = B::to_contiguous(&storage, &self.layout)?;
        Ok(Self::from_storage(
            packed,
            Layout::contiguous(self.shape().clone()),
            self.dtype,
            self.device.clone(),
        ))
    }

    /// Repack this array's buffer in place and reset its strides.
    ///
    /// Runs under `&mut self` and the storage write lock. When other arrays
    /// still share the buffer, this array moves to a fresh buffer instead of
    /// overwriting theirs.
    pub fn make_contiguous(&mut self) -> Result<()> {
        if self.layout.is_packed() && !self.is_view {
            return Ok(());
        }
        let shape = self.shape().clone();
        if Arc::strong_count(&self.storage) == 1 {
            let mut guard = self.write_storage()?;
            let packed = B::to_contiguous(&guard, &self.layout)?;
            *guard = packed;
        } else {
            tracing::debug!(shape = %shape, "make_contiguous: detaching from shared buffer");
            let packed = {
                let guard = self.read_storage()?;
                B::to_contiguous(&guard, &self.layout)?
            };
            self.storage = Arc::new(RwLock::new(packed));
        }
        self.layout = Layout::contiguous(shape);
        self.is_view = false;
        Ok(())
    }

    /// A new owned array re-encoded as `dtype`, with canonical strides.
    pub fn cast(&self, dtype: DType) -> Result<Self> {
        let storage = self.read_storage()?;
        let converted = B::cast(&storage, &self.layout, dtype, &self.device)?;
        Ok(Self::from_storage(
            converted,
            Layout::contiguous(self.shape().clone()),
            dtype,
            self.device.clone(),
        ))
    }

    // Data extraction

    /// Values in logical row-major order, as f64.
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        let storage = self.read_storage()?;
        B::to_f64_vec(&storage, &self.layout)
    }

    /// Round-trip back to a nested structure.
    pub fn to_nested(&self) -> Result<NestedData> {
        NestedData::from_flat(self.shape(), &self.to_f64_vec()?)
    }

    /// The single value of a one-element array.
    pub fn to_scalar(&self) -> Result<f64> {
        if self.elem_count() != 1 {
            return Err(Error::NotAScalar {
                shape: self.shape().clone(),
            });
        }
        let values = self.to_f64_vec()?;
        Ok(values[0])
    }
}
