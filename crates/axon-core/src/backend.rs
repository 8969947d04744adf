use std::fmt;

use crate::dtype::DType;
use crate::error::Result;
use crate::layout::Layout;
use crate::shape::Shape;

// Backend: abstraction over the place where array data lives
//
// Each backend provides its own storage type and the kernels that operate on
// it. Array<B: Backend> only resolves geometry (broadcast shapes, reduced
// shapes, views) and hands storage plus layouts to the backend.
//
// Kernels never mutate their inputs. Every operation reads through a Layout,
// so broadcast (stride 0), transposed, sliced and flipped inputs need no
// copy before a kernel can consume them, and every operation returns a new,
// contiguous storage buffer.

/// Identifies a compute device (e.g. "cpu").
pub trait BackendDevice: Clone + fmt::Debug + Send + Sync + 'static {
    /// A human-readable name for this device.
    fn name(&self) -> String;
}

/// A storage buffer that holds array data on a specific device.
pub trait BackendStorage: Clone + Send + Sync + 'static {
    /// The data type of the elements in this storage.
    fn dtype(&self) -> DType;

    /// Total number of elements in this storage.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Element-wise binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Pow => "pow",
        }
    }
}

/// Element-wise unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Abs,
    Square,
    Exp,
    Log,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Sinh,
    Cosh,
    Tanh,
}

impl UnaryOp {
    pub fn name(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Abs => "abs",
            UnaryOp::Square => "square",
            UnaryOp::Exp => "exp",
            UnaryOp::Log => "log",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Sinh => "sinh",
            UnaryOp::Cosh => "cosh",
            UnaryOp::Tanh => "tanh",
        }
    }

    pub fn eval_f64(&self, x: f64) -> f64 {
        match self {
            UnaryOp::Neg => -x,
            UnaryOp::Abs => x.abs(),
            UnaryOp::Square => x * x,
            UnaryOp::Exp => x.exp(),
            UnaryOp::Log => x.ln(),
            UnaryOp::Sqrt => x.sqrt(),
            UnaryOp::Sin => x.sin(),
            UnaryOp::Cos => x.cos(),
            UnaryOp::Tan => x.tan(),
            UnaryOp::Sinh => x.sinh(),
            UnaryOp::Cosh => x.cosh(),
            UnaryOp::Tanh => x.tanh(),
        }
    }
}

/// Reductions over one axis or over all elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    Sum,
    Prod,
    Max,
    Min,
    ArgMax,
    ArgMin,
}

impl ReduceOp {
    pub fn name(&self) -> &'static str {
        match self {
            ReduceOp::Sum => "sum",
            ReduceOp::Prod => "prod",
            ReduceOp::Max => "max",
            ReduceOp::Min => "min",
            ReduceOp::ArgMax => "argmax",
            ReduceOp::ArgMin => "argmin",
        }
    }

    /// Dtype of the reduced storage for a given input dtype.
    pub fn output_dtype(&self, input: DType) -> DType {
        match self {
            ReduceOp::ArgMax | ReduceOp::ArgMin => DType::I64,
            _ => input,
        }
    }
}

/// Comparison operations (produce bool arrays).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    pub fn name(&self) -> &'static str {
        match self {
            CmpOp::Eq => "equal",
            CmpOp::Ne => "not_equal",
            CmpOp::Gt => "greater",
            CmpOp::Ge => "greater_equal",
            CmpOp::Lt => "less",
            CmpOp::Le => "less_equal",
        }
    }
}

// Backend Trait: the interface every backend implements

/// The main Backend trait. Implementing this for a struct (e.g. CpuBackend)
/// makes that struct a complete compute backend for axon.
///
/// All operations take storage + layout and return new contiguous storage.
/// Binary operations receive layouts that were already broadcast to the
/// output shape.
pub trait Backend: Clone + Send + Sync + fmt::Debug + 'static {
    /// The device type for this backend.
    type Device: BackendDevice;
    /// The storage type for this backend.
    type Storage: BackendStorage;

    //  Creation

    fn zeros(shape: &Shape, dtype: DType, device: &Self::Device) -> Result<Self::Storage>;

    fn ones(shape: &Shape, dtype: DType, device: &Self::Device) -> Result<Self::Storage>;

    /// Allocate storage filled with `val` converted to `dtype`.
    fn full(shape: &Shape, val: f64, dtype: DType, device: &Self::Device) -> Result<Self::Storage>;

    /// Create storage from a flat f64 slice, converting to the target dtype
    /// with the `from_f64` policy of the element type.
    fn from_f64_slice(data: &[f64], dtype: DType, device: &Self::Device) -> Result<Self::Storage>;

    /// Uniform samples in `[low, high)`.
    fn rand_uniform(
        shape: &Shape,
        low: f64,
        high: f64,
        dtype: DType,
        device: &Self::Device,
    ) -> Result<Self::Storage>;

    /// Normal samples with the given mean and standard deviation.
    fn rand_normal(
        shape: &Shape,
        mean: f64,
        std: f64,
        dtype: DType,
        device: &Self::Device,
    ) -> Result<Self::Storage>;

    /// Uniform integers in `[low, high)`.
    fn randint(
        shape: &Shape,
        low: i64,
        high: i64,
        dtype: DType,
        device: &Self::Device,
    ) -> Result<Self::Storage>;

    //  Element-wise ops

    /// `result[i] = op(lhs[i], rhs[i])`. Both layouts have the output shape.
    fn binary_op(
        op: BinaryOp,
        lhs: &Self::Storage,
        lhs_layout: &Layout,
        rhs: &Self::Storage,
        rhs_layout: &Layout,
    ) -> Result<Self::Storage>;

    /// `result[i] = op(input[i], scalar)`, or `op(scalar, input[i])` when
    /// `reflected` is set. The scalar is converted to the input dtype.
    fn scalar_op(
        op: BinaryOp,
        input: &Self::Storage,
        layout: &Layout,
        scalar: f64,
        reflected: bool,
    ) -> Result<Self::Storage>;

    fn unary_op(op: UnaryOp, input: &Self::Storage, layout: &Layout) -> Result<Self::Storage>;

    /// Element-wise comparison producing bool storage. Both layouts have the
    /// output shape.
    fn cmp_op(
        op: CmpOp,
        lhs: &Self::Storage,
        lhs_layout: &Layout,
        rhs: &Self::Storage,
        rhs_layout: &Layout,
    ) -> Result<Self::Storage>;

    //  Reductions

    /// Reduce over `axis`, or over all elements when `axis` is None. The
    /// result is contiguous with the reduced axis removed.
    fn reduce_op(
        op: ReduceOp,
        input: &Self::Storage,
        layout: &Layout,
        axis: Option<usize>,
    ) -> Result<Self::Storage>;

    //  Matrix multiplication

    /// Batched matrix product. `lhs_layout` is `[..batch, m, k]` and
    /// `rhs_layout` is `[..batch, k, n]` with identical (possibly broadcast)
    /// batch dimensions. The result is `[..batch, m, n]`.
    fn matmul(
        lhs: &Self::Storage,
        lhs_layout: &Layout,
        rhs: &Self::Storage,
        rhs_layout: &Layout,
    ) -> Result<Self::Storage>;

    //  Data movement

    /// Pack the elements selected by `layout` into fresh contiguous storage.
    fn to_contiguous(input: &Self::Storage, layout: &Layout) -> Result<Self::Storage>;

    /// Values in logical order, converted to f64 (for inspection and for
    /// host-side numerics).
    fn to_f64_vec(input: &Self::Storage, layout: &Layout) -> Result<Vec<f64>>;

    /// Re-encode the elements selected by `layout` as `dtype`.
    fn cast(
        input: &Self::Storage,
        layout: &Layout,
        dtype: DType,
        device: &Self::Device,
    ) -> Result<Self::Storage>;
}
