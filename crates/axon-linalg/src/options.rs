/// Tolerances and iteration limits for the iterative and pivoting routines.
///
/// Every decomposition has a `*_with(&LinalgOptions)` variant; the plain
/// function uses `LinalgOptions::default()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinalgOptions {
    /// Relative convergence threshold for the eigen solvers. Jacobi stops
    /// once the off-diagonal norm falls below `eig_tol * ||A||_F`; the
    /// general solver also uses it to accept a slightly negative
    /// discriminant as a repeated real root.
    pub eig_tol: f64,
    /// Jacobi sweeps for `eigh`, and QR iterations per eigenvalue for `eig`.
    pub max_iter: usize,
    /// A pivot smaller than `singular_tol * max|a_ij|` counts as zero.
    pub singular_tol: f64,
}

impl Default for LinalgOptions {
    fn default() -> Self {
        LinalgOptions {
            eig_tol: 1e-12,
            max_iter: 100,
            singular_tol: 1e-12,
        }
    }
}

impl LinalgOptions {
    pub fn with_eig_tol(mut self, eig_tol: f64) -> Self {
        self.eig_tol = eig_tol;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_singular_tol(mut self, singular_tol: f64) -> Self {
        self.singular_tol = singular_tol;
        self
    }
}
