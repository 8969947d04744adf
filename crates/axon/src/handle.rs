// Handle table
//
// The front end never holds an Array directly. It receives opaque integer
// handles and goes through this table for construction, introspection,
// printing and release. Each slot records once, at insertion, whether it
// owns its array or borrows another slot's buffer; nothing downstream has to
// ask again.
//
// Buffers are reference counted, so destroying an owner while views of it
// are still registered is fine: the storage is dropped with the last slot
// that references it. Handles are never reused, which makes a second
// destroy of the same handle detectable.

use std::collections::HashMap;
use std::fmt;

use axon_core::{Array, Backend, Error, Result, Shape};

use crate::config::Context;

/// Opaque identifier for an array registered in a [`HandleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a handle refers to.
#[derive(Debug, Clone)]
pub enum Slot<B: Backend> {
    /// An array that was created through, or inserted into, the table.
    Owned(Array<B>),
    /// A view over the buffer of another slot.
    View { array: Array<B>, source: Handle },
}

impl<B: Backend> Slot<B> {
    pub fn array(&self) -> &Array<B> {
        match self {
            Slot::Owned(array) | Slot::View { array, .. } => array,
        }
    }

    pub fn is_view(&self) -> bool {
        matches!(self, Slot::View { .. })
    }
}

pub struct HandleTable<'c, B: Backend> {
    ctx: &'c Context,
    device: B::Device,
    slots: HashMap<u64, Slot<B>>,
    next: u64,
}

impl<'c, B: Backend> HandleTable<'c, B> {
    pub fn new(ctx: &'c Context, device: B::Device) -> Self {
        Self {
            ctx,
            device,
            slots: HashMap::new(),
            next: 1,
        }
    }

    pub fn context(&self) -> &Context {
        self.ctx
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn register(&mut self, slot: Slot<B>) -> Handle {
        let handle = Handle(self.next);
        self.next += 1;
        self.slots.insert(handle.0, slot);
        handle
    }

    fn slot(&self, handle: Handle) -> Result<&Slot<B>> {
        self.slots
            .get(&handle.0)
            .ok_or(Error::InvalidHandle(handle.0))
    }

    /// Build an array from flattened values and register it.
    ///
    /// `ndim` and `size` are the front end's own view of the literal and
    /// are checked against `shape`; `dtype` falls back to the configured
    /// default when `None`.
    pub fn create(
        &mut self,
        data: &[f64],
        ndim: usize,
        shape: &[usize],
        size: usize,
        dtype: Option<&str>,
    ) -> Result<Handle> {
        if ndim != shape.len() {
            axon_core::bail!("create: ndim {ndim} does not match shape {shape:?}");
        }
        let shape = Shape::from(shape);
        if size != shape.elem_count() {
            return Err(Error::ElementCountMismatch {
                expected: shape.elem_count(),
                got: size,
                shape,
            });
        }
        let dtype = self.ctx.resolve_dtype(dtype)?;
        let array = Array::<B>::from_f64_slice(data, shape, dtype, &self.device)?;
        let handle = self.register(Slot::Owned(array));
        tracing::debug!(%handle, dtype = %dtype, size, "handle create");
        Ok(handle)
    }

    /// Register an array produced by an operation. The table becomes its
    /// owner.
    pub fn insert(&mut self, array: Array<B>) -> Handle {
        let handle = self.register(Slot::Owned(array));
        tracing::debug!(%handle, "handle insert");
        handle
    }

    /// Register a view sharing the buffer of `source`.
    pub fn view(&mut self, source: Handle) -> Result<Handle> {
        let array = self.slot(source)?.array().view();
        let handle = self.register(Slot::View { array, source });
        tracing::debug!(%handle, %source, "handle view");
        Ok(handle)
    }

    pub fn get(&self, handle: Handle) -> Result<&Array<B>> {
        Ok(self.slot(handle)?.array())
    }

    /// The handle a view was taken from, `None` for owning slots.
    pub fn source(&self, handle: Handle) -> Result<Option<Handle>> {
        Ok(match self.slot(handle)? {
            Slot::Owned(_) => None,
            Slot::View { source, .. } => Some(*source),
        })
    }

    pub fn is_view(&self, handle: Handle) -> Result<bool> {
        Ok(self.slot(handle)?.is_view())
    }

    /// Values in logical row-major order.
    pub fn out_data(&self, handle: Handle) -> Result<Vec<f64>> {
        self.get(handle)?.to_f64_vec()
    }

    pub fn out_shape(&self, handle: Handle) -> Result<Vec<usize>> {
        Ok(self.get(handle)?.dims().to_vec())
    }

    pub fn out_strides(&self, handle: Handle) -> Result<Vec<isize>> {
        Ok(self.get(handle)?.strides().to_vec())
    }

    pub fn out_size(&self, handle: Handle) -> Result<usize> {
        Ok(self.get(handle)?.elem_count())
    }

    pub fn out_dtype(&self, handle: Handle) -> Result<&'static str> {
        Ok(self.get(handle)?.dtype().name())
    }

    /// Render with the configured print options and write to stdout.
    pub fn print(&self, handle: Handle) -> Result<()> {
        self.get(handle)?.print(&self.ctx.config().print)
    }

    /// Render with the configured print options.
    pub fn format(&self, handle: Handle) -> Result<String> {
        self.get(handle)?.format_with(&self.ctx.config().print)
    }

    /// Release a handle. Unknown and already destroyed handles are errors.
    pub fn destroy(&mut self, handle: Handle) -> Result<()> {
        let slot = self
            .slots
            .remove(&handle.0)
            .ok_or(Error::InvalidHandle(handle.0))?;
        tracing::debug!(%handle, view = slot.is_view(), "handle destroy");
        Ok(())
    }

    /// Apply a unary operation and register its result.
    pub fn map<F>(&mut self, handle: Handle, f: F) -> Result<Handle>
    where
        F: FnOnce(&Array<B>) -> Result<Array<B>>,
    {
        let out = f(self.get(handle)?)?;
        Ok(self.insert(out))
    }

    /// Apply a binary operation and register its result.
    pub fn zip<F>(&mut self, lhs: Handle, rhs: Handle, f: F) -> Result<Handle>
    where
        F: FnOnce(&Array<B>, &Array<B>) -> Result<Array<B>>,
    {
        let out = f(self.get(lhs)?, self.get(rhs)?)?;
        Ok(self.insert(out))
    }
}

impl<B: Backend> fmt::Debug for HandleTable<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleTable")
            .field("live", &self.slots.len())
            .field("next", &self.next)
            .finish()
    }
}
