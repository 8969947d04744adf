use crate::array::Array;
use crate::backend::{Backend, BinaryOp, CmpOp, ReduceOp, UnaryOp};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::shape::Shape;

// Operations on arrays
//
// Every arithmetic entry point funnels into one of three generic paths:
//
//   binary:  broadcast both layouts to the output shape, one backend call
//   unary:   one backend call over the input layout
//   reduce:  one backend call, then an optional keepdims reshape
//
// Array-vs-scalar dispatch is resolved once, through Operand, instead of
// being re-checked inside each operator.

/// The right- or left-hand side of a binary operation.
#[derive(Debug)]
pub enum Operand<'a, B: Backend> {
    Array(&'a Array<B>),
    Scalar(f64),
}

impl<'a, B: Backend> From<&'a Array<B>> for Operand<'a, B> {
    fn from(a: &'a Array<B>) -> Self {
        Operand::Array(a)
    }
}

impl<B: Backend> From<f64> for Operand<'_, B> {
    fn from(v: f64) -> Self {
        Operand::Scalar(v)
    }
}

impl<B: Backend> From<i64> for Operand<'_, B> {
    fn from(v: i64) -> Self {
        Operand::Scalar(v as f64)
    }
}

impl<B: Backend> From<i32> for Operand<'_, B> {
    fn from(v: i32) -> Self {
        Operand::Scalar(v as f64)
    }
}

/// Apply a binary op to any pairing of arrays and scalars.
///
/// `scalar op array` is the reflected form (`10 - a`, `2 ** a`). Two bare
/// scalars never reach the array engine.
pub fn binary<B: Backend>(lhs: Operand<'_, B>, rhs: Operand<'_, B>, op: BinaryOp) -> Result<Array<B>> {
    match (lhs, rhs) {
        (Operand::Array(a), Operand::Array(b)) => a.binary_arrays(b, op),
        (Operand::Array(a), Operand::Scalar(s)) => a.binary_scalar(op, s, false),
        (Operand::Scalar(s), Operand::Array(a)) => a.binary_scalar(op, s, true),
        (Operand::Scalar(_), Operand::Scalar(_)) => Err(Error::not_implemented(
            op.name(),
            "two scalar operands (no array involved)",
        )),
    }
}

impl<B: Backend> Array<B> {
    // Arithmetic operations

    /// Element-wise addition: self + rhs.
    pub fn add<'r>(&self, rhs: impl Into<Operand<'r, B>>) -> Result<Self> {
        binary(Operand::Array(self), rhs.into(), BinaryOp::Add)
    }

    /// Element-wise subtraction: self - rhs.
    pub fn sub<'r>(&self, rhs: impl Into<Operand<'r, B>>) -> Result<Self> {
        binary(Operand::Array(self), rhs.into(), BinaryOp::Sub)
    }

    /// Element-wise multiplication: self * rhs.
    pub fn mul<'r>(&self, rhs: impl Into<Operand<'r, B>>) -> Result<Self> {
        binary(Operand::Array(self), rhs.into(), BinaryOp::Mul)
    }

    /// Element-wise division: self / rhs.
    ///
    /// Floats follow IEEE semantics; integer division truncates toward zero
    /// and fails with `DivisionByZero` on a zero divisor.
    pub fn div<'r>(&self, rhs: impl Into<Operand<'r, B>>) -> Result<Self> {
        binary(Operand::Array(self), rhs.into(), BinaryOp::Div)
    }

    /// Element-wise power: self ^ rhs.
    pub fn pow<'r>(&self, rhs: impl Into<Operand<'r, B>>) -> Result<Self> {
        binary(Operand::Array(self), rhs.into(), BinaryOp::Pow)
    }

    /// Reflected subtraction: `scalar - self`.
    pub fn rsub(&self, scalar: f64) -> Result<Self> {
        binary(Operand::Scalar(scalar), Operand::Array(self), BinaryOp::Sub)
    }

    /// Reflected division: `scalar / self`.
    pub fn rdiv(&self, scalar: f64) -> Result<Self> {
        binary(Operand::Scalar(scalar), Operand::Array(self), BinaryOp::Div)
    }

    /// Reflected power: `scalar ^ self`.
    pub fn rpow(&self, scalar: f64) -> Result<Self> {
        binary(Operand::Scalar(scalar), Operand::Array(self), BinaryOp::Pow)
    }

    fn binary_arrays(&self, rhs: &Self, op: BinaryOp) -> Result<Self> {
        if self.dtype() != rhs.dtype() {
            return Err(Error::DTypeMismatch {
                op: op.name(),
                lhs: self.dtype(),
                rhs: rhs.dtype(),
            });
        }
        let shape = Shape::broadcast_shape(op.name(), self.shape(), rhs.shape())?;
        let lhs_layout = self.layout().broadcast_as(&shape)?;
        let rhs_layout = rhs.layout().broadcast_as(&shape)?;
        let result = self.with_storages(rhs, |l, r| {
            B::binary_op(op, l, &lhs_layout, r, &rhs_layout)
        })?;
        Ok(Self::from_storage(
            result,
            Layout::contiguous(shape),
            self.dtype(),
            self.device().clone(),
        ))
    }

    /// Array-scalar path: the output keeps this array's shape and dtype.
    ///
    /// A scalar the dtype cannot hold exactly (`0.5` or `-1` against an
    /// integer or unsigned array) is not converted; the operation runs in
    /// float64 and the result is cast back.
    fn binary_scalar(&self, op: BinaryOp, scalar: f64, reflected: bool) -> Result<Self> {
        if !self.dtype().holds_exactly(scalar) {
            return self
                .cast(DType::F64)?
                .binary_scalar(op, scalar, reflected)?
                .cast(self.dtype());
        }
        let result = {
            let storage = self.read_storage()?;
            B::scalar_op(op, &storage, self.layout(), scalar, reflected)?
        };
        Ok(Self::from_storage(
            result,
            Layout::contiguous(self.shape().clone()),
            self.dtype(),
            self.device().clone(),
        ))
    }

    // Comparison operations

    /// Element-wise `==`, producing a bool array with the broadcast shape.
    pub fn equal<'r>(&self, rhs: impl Into<Operand<'r, B>>) -> Result<Self> {
        self.cmp_op(rhs.into(), CmpOp::Eq)
    }

    pub fn not_equal<'r>(&self, rhs: impl Into<Operand<'r, B>>) -> Result<Self> {
        self.cmp_op(rhs.into(), CmpOp::Ne)
    }

    pub fn greater<'r>(&self, rhs: impl Into<Operand<'r, B>>) -> Result<Self> {
        self.cmp_op(rhs.into(), CmpOp::Gt)
    }

    pub fn greater_equal<'r>(&self, rhs: impl Into<Operand<'r, B>>) -> Result<Self> {
        self.cmp_op(rhs.into(), CmpOp::Ge)
    }

    pub fn less<'r>(&self, rhs: impl Into<Operand<'r, B>>) -> Result<Self> {
        self.cmp_op(rhs.into(), CmpOp::Lt)
    }

    pub fn less_equal<'r>(&self, rhs: impl Into<Operand<'r, B>>) -> Result<Self> {
        self.cmp_op(rhs.into(), CmpOp::Le)
    }

    fn cmp_op(&self, rhs: Operand<'_, B>, op: CmpOp) -> Result<Self> {
        let scalar;
        let rhs = match rhs {
            Operand::Array(a) => a,
            Operand::Scalar(s) if !self.dtype().holds_exactly(s) => {
                return self.cast(DType::F64)?.cmp_op(Operand::Scalar(s), op);
            }
            Operand::Scalar(s) => {
                scalar = Self::scalar(s, self.dtype(), self.device())?;
                &scalar
            }
        };
        if self.dtype() != rhs.dtype() {
            return Err(Error::DTypeMismatch {
                op: op.name(),
                lhs: self.dtype(),
                rhs: rhs.dtype(),
            });
        }
        let shape = Shape::broadcast_shape(op.name(), self.shape(), rhs.shape())?;
        let lhs_layout = self.layout().broadcast_as(&shape)?;
        let rhs_layout = rhs.layout().broadcast_as(&shape)?;
        let result = self.with_storages(rhs, |l, r| {
            B::cmp_op(op, l, &lhs_layout, r, &rhs_layout)
        })?;
        Ok(Self::from_storage(
            result,
            Layout::contiguous(shape),
            DType::Bool,
            self.device().clone(),
        ))
    }

    // Unary operations

    /// Element-wise negation: -self. Integers wrap; bool is rejected.
    pub fn neg(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Neg)
    }

    pub fn abs(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Abs)
    }

    pub fn square(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Square)
    }

    pub fn exp(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Exp)
    }

    /// Natural logarithm.
    pub fn log(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Log)
    }

    pub fn sqrt(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Sqrt)
    }

    pub fn sin(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Sin)
    }

    pub fn cos(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Cos)
    }

    pub fn tan(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Tan)
    }

    pub fn sinh(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Sinh)
    }

    pub fn cosh(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Cosh)
    }

    pub fn tanh(&self) -> Result<Self> {
        self.unary_op(UnaryOp::Tanh)
    }

    fn unary_op(&self, op: UnaryOp) -> Result<Self> {
        let result = {
            let storage = self.read_storage()?;
            B::unary_op(op, &storage, self.layout())?
        };
        Ok(Self::from_storage(
            result,
            Layout::contiguous(self.shape().clone()),
            self.dtype(),
            self.device().clone(),
        ))
    }

    // Reductions
    //
    // `axis: None` reduces over every element. With `keepdims` the reduced
    // axis stays with size 1, and a global reduction yields shape (1,).

    /// Sum of elements. Integers wrap on overflow.
    pub fn sum(&self, axis: Option<usize>, keepdims: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::Sum, axis, keepdims)
    }

    pub fn prod(&self, axis: Option<usize>, keepdims: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::Prod, axis, keepdims)
    }

    pub fn max(&self, axis: Option<usize>, keepdims: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::Max, axis, keepdims)
    }

    pub fn min(&self, axis: Option<usize>, keepdims: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::Min, axis, keepdims)
    }

    /// Index of the largest element (flat index when `axis` is None), int64.
    pub fn argmax(&self, axis: Option<usize>, keepdims: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::ArgMax, axis, keepdims)
    }

    pub fn argmin(&self, axis: Option<usize>, keepdims: bool) -> Result<Self> {
        self.reduce_op(ReduceOp::ArgMin, axis, keepdims)
    }

    /// Arithmetic mean. Non-float inputs produce float64.
    pub fn mean(&self, axis: Option<usize>, keepdims: bool) -> Result<Self> {
        let count = self.reduced_count("mean", axis)?;
        let x = self.to_float()?;
        x.sum(axis, keepdims)?.mul(1.0 / count as f64)
    }

    /// Variance with `count - ddof` as divisor.
    pub fn var(&self, axis: Option<usize>, ddof: usize, keepdims: bool) -> Result<Self> {
        self.var_impl("var", axis, ddof, keepdims)
    }

    /// Standard deviation, the square root of `var`.
    pub fn std(&self, axis: Option<usize>, ddof: usize, keepdims: bool) -> Result<Self> {
        self.var_impl("std", axis, ddof, keepdims)?.sqrt()
    }

    fn var_impl(
        &self,
        op: &'static str,
        axis: Option<usize>,
        ddof: usize,
        keepdims: bool,
    ) -> Result<Self> {
        let count = self.reduced_count(op, axis)?;
        if ddof >= count {
            return Err(Error::DegreesOfFreedomError { op, ddof, count });
        }
        let x = self.to_float()?;
        let centered = x.sub(&x.mean(axis, true)?)?;
        centered
            .square()?
            .sum(axis, keepdims)?
            .mul(1.0 / (count - ddof) as f64)
    }

    /// Number of elements folded into each output of a reduction.
    fn reduced_count(&self, op: &'static str, axis: Option<usize>) -> Result<usize> {
        match axis {
            None => Ok(self.elem_count()),
            Some(a) => self.dims().get(a).copied().ok_or(Error::AxisOutOfRange {
                op,
                axis: a as isize,
                ndim: self.rank(),
            }),
        }
    }

    fn to_float(&self) -> Result<Self> {
        if self.dtype().is_float() {
            Ok(self.clone())
        } else {
            self.cast(DType::F64)
        }
    }

    fn reduce_op(&self, op: ReduceOp, axis: Option<usize>, keepdims: bool) -> Result<Self> {
        if let Some(a) = axis {
            if a >= self.rank() {
                return Err(Error::AxisOutOfRange {
                    op: op.name(),
                    axis: a as isize,
                    ndim: self.rank(),
                });
            }
        }
        let result = {
            let storage = self.read_storage()?;
            B::reduce_op(op, &storage, self.layout(), axis)?
        };
        let out_shape = self.shape().reduced(axis, keepdims);
        Ok(Self::from_storage(
            result,
            Layout::contiguous(out_shape),
            op.output_dtype(self.dtype()),
            self.device().clone(),
        ))
    }

    // Matrix multiplication

    /// Matrix product with NumPy `matmul` semantics.
    ///
    /// - 1-D operands are promoted to a row (lhs) or column (rhs) vector and
    ///   the promoted axis is dropped again; 1-D @ 1-D is a 0-D scalar.
    /// - Leading (batch) dimensions broadcast; the trailing two contract.
    pub fn matmul(&self, rhs: &Self) -> Result<Self> {
        if self.dtype() != rhs.dtype() {
            return Err(Error::DTypeMismatch {
                op: "matmul",
                lhs: self.dtype(),
                rhs: rhs.dtype(),
            });
        }
        for r in [self.rank(), rhs.rank()] {
            if r == 0 {
                return Err(Error::UnsupportedRank {
                    op: "matmul",
                    got: 0,
                    expected: "rank >= 1",
                });
            }
        }
        let lhs_vec = self.rank() == 1;
        let rhs_vec = rhs.rank() == 1;
        let a = if lhs_vec { self.expand_dims(0)? } else { self.clone() };
        let b = if rhs_vec { rhs.expand_dims(-1)? } else { rhs.clone() };

        let (ad, bd) = (a.dims(), b.dims());
        let (m, k1) = (ad[ad.len() - 2], ad[ad.len() - 1]);
        let (k2, n) = (bd[bd.len() - 2], bd[bd.len() - 1]);
        if k1 != k2 {
            return Err(Error::MatmulShapeMismatch { m, k1, k2, n });
        }

        let batch = Shape::broadcast_shape(
            "matmul",
            &Shape::from(&ad[..ad.len() - 2]),
            &Shape::from(&bd[..bd.len() - 2]),
        )?;
        let with_tail = |x: usize, y: usize| {
            let mut dims = batch.dims().to_vec();
            dims.extend([x, y]);
            Shape::new(dims)
        };
        let a_layout = a.layout().broadcast_as(&with_tail(m, k1))?;
        let b_layout = b.layout().broadcast_as(&with_tail(k2, n))?;
        let result = a.with_storages(&b, |l, r| B::matmul(l, &a_layout, r, &b_layout))?;

        let mut out_dims = batch.dims().to_vec();
        if !lhs_vec {
            out_dims.push(m);
        }
        if !rhs_vec {
            out_dims.push(n);
        }
        Ok(Self::from_storage(
            result,
            Layout::contiguous(Shape::new(out_dims)),
            self.dtype(),
            self.device().clone(),
        ))
    }
}
