//! # axon-core
//!
//! Core array primitives, types and the backend trait for axon.
//!
//! This crate provides:
//! - [`Array`]: strided n-dimensional array with views and broadcasting ops
//! - [`Shape`] / [`Layout`]: shape, signed strides and offset
//! - [`DType`] / [`DTypeRegistry`]: the eleven element kinds and their casts
//! - [`Backend`] trait: the kernel interface a storage backend implements
//! - [`NestedData`]: nested literals in, nested values out
//! - [`PrintOptions`]: `axon.array(...)` rendering

pub mod array;
pub mod backend;
pub mod dtype;
pub mod error;
pub mod format;
pub mod layout;
pub mod nested;
pub mod ops;
pub mod shape;

pub use array::Array;
pub use backend::{Backend, BackendDevice, BackendStorage, BinaryOp, CmpOp, ReduceOp, UnaryOp};
pub use dtype::{cast_scalar, DType, DTypeCategory, DTypeInfo, DTypeRegistry, KernelFault, WithDType};
pub use error::{Error, Result};
pub use format::PrintOptions;
pub use layout::{Layout, StridedIter};
pub use nested::NestedData;
pub use ops::{binary, Operand};
pub use shape::{normalize_axis, Shape};
