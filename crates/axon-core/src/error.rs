use crate::dtype::DType;
use crate::shape::Shape;

/// All errors that can occur within axon.
///
/// Every variant carries the operation name together with the offending
/// shapes, axis or dtype, so a failure can be diagnosed from the message
/// alone. Operations report errors before touching any state: a failed call
/// never leaves a partially written array behind.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A dtype string that is not one of the supported element kinds.
    #[error("unsupported dtype '{name}': expected one of {valid}")]
    UnsupportedDType { name: String, valid: String },

    /// Two shapes that cannot be broadcast against each other.
    #[error("{op}: shapes {lhs} and {rhs} cannot be broadcast together")]
    BroadcastError {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// Reshape target with a different element count.
    #[error("cannot reshape array of size {src} into shape {dst_shape} (size {dst})")]
    ReshapeSizeMismatch {
        src: usize,
        dst: usize,
        dst_shape: Shape,
    },

    #[error("cannot squeeze axis {axis} of shape {shape}: size is {size}, expected 1")]
    InvalidSqueezeAxis {
        axis: usize,
        size: usize,
        shape: Shape,
    },

    #[error("{op}: axis {axis} is out of range for array with {ndim} dimensions")]
    AxisOutOfRange {
        op: &'static str,
        axis: isize,
        ndim: usize,
    },

    /// `ddof` is at least the number of reduced elements.
    #[error("{op}: ddof {ddof} must be smaller than the number of reduced elements ({count})")]
    DegreesOfFreedomError {
        op: &'static str,
        ddof: usize,
        count: usize,
    },

    /// The operation does not support arrays of this rank.
    #[error("{op}: rank {got} is not supported (expected {expected})")]
    UnsupportedRank {
        op: &'static str,
        got: usize,
        expected: &'static str,
    },

    #[error("{op}: an explicit axis is required for {ndim}-D operands")]
    MissingAxis { op: &'static str, ndim: usize },

    /// Integer division (or remainder) by zero. Floats follow IEEE instead.
    #[error("{op}: integer division by zero ({dtype})")]
    DivisionByZero { op: &'static str, dtype: DType },

    /// A documented combination that the engine refuses to evaluate.
    #[error("{op}: not implemented for {detail}")]
    NotImplemented { op: &'static str, detail: String },

    /// Binary operands with different dtypes. Cast one explicitly first.
    #[error("{op}: dtype mismatch, {lhs} vs {rhs}")]
    DTypeMismatch {
        op: &'static str,
        lhs: DType,
        rhs: DType,
    },

    #[error("{op}: shape mismatch, expected {expected}, got {got}")]
    ShapeMismatch {
        op: &'static str,
        expected: Shape,
        got: Shape,
    },

    /// Matrix multiplication dimension mismatch.
    #[error("matmul shape mismatch: [{m}x{k1}] @ [{k2}x{n}], inner dims must match")]
    MatmulShapeMismatch {
        m: usize,
        k1: usize,
        k2: usize,
        n: usize,
    },

    #[error("{op}: expected square matrices, got {rows}x{cols}")]
    NotSquare {
        op: &'static str,
        rows: usize,
        cols: usize,
    },

    #[error("{op}: matrix is singular")]
    SingularMatrix { op: &'static str },

    /// The real input has a complex conjugate eigenpair.
    #[error("{op}: matrix has complex eigenvalues, which no supported dtype can hold")]
    ComplexEigenvalues { op: &'static str },

    #[error("{op}: no convergence after {iterations} iterations")]
    NoConvergence { op: &'static str, iterations: usize },

    /// Element count mismatch when creating from a flat buffer.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// Nested input whose sibling lists have different lengths.
    #[error("ragged nested sequence at depth {depth}: expected length {expected}, got {got}")]
    RaggedNesting {
        depth: usize,
        expected: usize,
        got: usize,
    },

    /// Tried to read a scalar out of an array with more than one element.
    #[error("not a scalar: array has shape {shape}")]
    NotAScalar { shape: Shape },

    #[error("invalid array handle {0}")]
    InvalidHandle(u64),

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    pub fn not_implemented(op: &'static str, detail: impl Into<String>) -> Self {
        Error::NotImplemented {
            op,
            detail: detail.into(),
        }
    }
}

/// Convenience Result type used throughout axon.
pub type Result<T> = std::result::Result<T, Error>;

/// Macro for early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
