//! # Axon
//!
//! Strided n-dimensional arrays for Rust: eleven dtypes, zero-copy views,
//! NumPy-style broadcasting, reductions and dense linear algebra.
//!
//! This is the top-level facade crate that re-exports everything you need.
//!
//! ## Usage
//!
//! ```rust
//! use axon::prelude::*;
//!
//! let a = CpuArray::from_f64_slice(&[1.0, 2.0, 3.0, 4.0], (2, 2), DType::F64, &CpuDevice)?;
//! let d = axon::linalg::det(&a)?;
//! assert!((d.to_scalar()? + 2.0).abs() < 1e-12);
//! # Ok::<(), axon::Error>(())
//! ```
//!
//! ## Architecture
//!
//! | Crate | Purpose |
//! |-------|----------|
//! | `axon-core` | Array, Shape, Layout, DType registry, Backend trait, formatting |
//! | `axon-cpu` | CPU backend with rayon-parallel kernels and GEMM |
//! | `axon-linalg` | det, LU, QR, solvers, eigenvalues, products and norms |
//!
//! ## Modules
//!
//! - [`config`]: `EngineConfig` and the `Context` passed to the handle table
//! - [`handle`]: the handle-based boundary used by foreign front ends

use tracing_subscriber::EnvFilter;

/// Re-export core types.
pub use axon_core::{
    backend::{Backend, BackendDevice, BackendStorage, BinaryOp, CmpOp, ReduceOp, UnaryOp},
    normalize_axis, Array, DType, DTypeCategory, DTypeInfo, DTypeRegistry, Error, Layout,
    NestedData, Operand, PrintOptions, Result, Shape, WithDType,
};

/// Re-export CPU backend.
pub use axon_cpu::{CpuArray, CpuBackend, CpuDevice, CpuStorage, PARALLEL_THRESHOLD};

/// Re-export linear algebra routines.
pub mod linalg {
    pub use axon_linalg::*;
}

/// Engine configuration and context.
pub mod config;

/// Handle table for front ends that cannot hold Rust values.
pub mod handle;

/// Install a global `tracing` subscriber writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used (for example
/// the `log_filter` of an [`config::EngineConfig`]). Fails if a global
/// subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::msg(format!("init_tracing: {e}")))
}

/// Prelude: import this for the most common types.
pub mod prelude {
    pub use crate::config::{Context, EngineConfig};
    pub use crate::handle::{Handle, HandleTable, Slot};
    pub use crate::linalg::{LinalgOptions, Normalization};
    pub use crate::{CpuArray, CpuBackend, CpuDevice, DType, DTypeRegistry, Error, Shape};
    pub use crate::{NestedData, Operand, PrintOptions, Result};
}
