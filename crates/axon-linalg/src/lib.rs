//! # axon-linalg
//!
//! Dense linear algebra on axon arrays, generic over any [`Backend`].
//!
//! 1. **Products**: `dot`, `inner`, `outer`, `cross`, `trace`, `linear`
//! 2. **Norms**: `l1_norm`, `l2_norm`, `unit_norm`, `robust_norm`, `normalize`
//! 3. **Factorizations**: `det`, `lu`, `qr`
//! 4. **Solvers**: `inv`, `solve`, `lstsq`, `matrix_rank`
//! 5. **Eigen**: `eig`, `eigv` (general) and `eigh`, `eighv` (symmetric)
//!
//! Matrix routines take a single matrix (rank 2) or a batch of matrices
//! stacked along dim 0 (rank 3); anything else is
//! [`Error::UnsupportedRank`](axon_core::Error::UnsupportedRank).
//! Factorizations run in f64 and return float arrays: float inputs keep
//! their dtype, integer and bool inputs produce float64.
//!
//! Tolerances live in [`LinalgOptions`]; each routine that uses them has a
//! `*_with` variant taking explicit options.
//!
//! [`Backend`]: axon_core::Backend

pub mod decompose;
pub mod eigen;
mod matrix;
pub mod norms;
pub mod options;
pub mod product;

pub use decompose::{
    det, det_with, inv, inv_with, lstsq, lstsq_with, lu, matrix_rank, matrix_rank_with, qr, solve,
    solve_with,
};
pub use eigen::{eig, eig_with, eigh, eigh_with, eighv, eighv_with, eigv, eigv_with};
pub use norms::{l1_norm, l2_norm, normalize, robust_norm, unit_norm, Normalization};
pub use options::LinalgOptions;
pub use product::{cross, dot, inner, linear, outer, trace};
