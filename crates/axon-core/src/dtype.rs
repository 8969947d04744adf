use std::fmt;

use num_traits::AsPrimitive;

use crate::error::{Error, Result};

// DType: supported element kinds
//
// Every array has a DType that fixes its element width and numeric
// behaviour. The set is closed:
//
//   float32, float64                  IEEE floats
//   int8, int16, int32, int64         two's-complement signed integers
//   uint8, uint16, uint32, uint64     unsigned integers
//   bool                              one byte, 0 or 1
//
// Binary kernels never promote. Mixing dtypes is an error until the caller
// casts one operand explicitly.

/// Enum of all supported element data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DType {
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Bool,
}

/// Numeric family of a dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DTypeCategory {
    Float,
    SignedInt,
    UnsignedInt,
    Bool,
}

impl DType {
    pub const ALL: [DType; 11] = [
        DType::F32,
        DType::F64,
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::U8,
        DType::U16,
        DType::U32,
        DType::U64,
        DType::Bool,
    ];

    /// Size of one element in bytes.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::I8 | DType::U8 | DType::Bool => 1,
            DType::I16 | DType::U16 => 2,
            DType::F32 | DType::I32 | DType::U32 => 4,
            DType::F64 | DType::I64 | DType::U64 => 8,
        }
    }

    pub fn category(&self) -> DTypeCategory {
        match self {
            DType::F32 | DType::F64 => DTypeCategory::Float,
            DType::I8 | DType::I16 | DType::I32 | DType::I64 => DTypeCategory::SignedInt,
            DType::U8 | DType::U16 | DType::U32 | DType::U64 => DTypeCategory::UnsignedInt,
            DType::Bool => DTypeCategory::Bool,
        }
    }

    /// Canonical name, as accepted at the boundary.
    pub fn name(&self) -> &'static str {
        match self {
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::U8 => "uint8",
            DType::U16 => "uint16",
            DType::U32 => "uint32",
            DType::U64 => "uint64",
            DType::Bool => "bool",
        }
    }

    /// Short alias (`f32`, `i64`, ...).
    pub fn alias(&self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::U8 => "u8",
            DType::U16 => "u16",
            DType::U32 => "u32",
            DType::U64 => "u64",
            DType::Bool => "b8",
        }
    }

    pub fn is_float(&self) -> bool {
        self.category() == DTypeCategory::Float
    }

    /// Signed or unsigned integer. Bool is not an integer here.
    pub fn is_int(&self) -> bool {
        matches!(
            self.category(),
            DTypeCategory::SignedInt | DTypeCategory::UnsignedInt
        )
    }

    /// The dtype a float-producing operation returns for this input:
    /// floats keep their width, everything else becomes float64.
    pub fn float_result(&self) -> DType {
        if self.is_float() {
            *self
        } else {
            DType::F64
        }
    }

    /// Whether `v` converts to this dtype without changing value. Floats
    /// accept everything; integers need an integral value in range; bool
    /// only takes 0 and 1.
    pub fn holds_exactly(&self, v: f64) -> bool {
        let (low, high) = match self {
            DType::F32 | DType::F64 => return true,
            DType::Bool => return v == 0.0 || v == 1.0,
            DType::I8 => (-(2f64.powi(7)), 2f64.powi(7)),
            DType::I16 => (-(2f64.powi(15)), 2f64.powi(15)),
            DType::I32 => (-(2f64.powi(31)), 2f64.powi(31)),
            DType::I64 => (-(2f64.powi(63)), 2f64.powi(63)),
            DType::U8 => (0.0, 2f64.powi(8)),
            DType::U16 => (0.0, 2f64.powi(16)),
            DType::U32 => (0.0, 2f64.powi(32)),
            DType::U64 => (0.0, 2f64.powi(64)),
        };
        v.fract() == 0.0 && v >= low && v < high
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// DTypeRegistry: explicit lookup table
//
// Parsing dtype strings goes through a table that is built once and handed
// around by reference. There is no global registry keyed by name.

/// Width, category and names of one dtype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DTypeInfo {
    pub dtype: DType,
    pub name: &'static str,
    pub alias: &'static str,
    pub size_in_bytes: usize,
    pub category: DTypeCategory,
}

/// Immutable table of the supported dtypes.
#[derive(Debug, Clone)]
pub struct DTypeRegistry {
    entries: Vec<DTypeInfo>,
}

impl DTypeRegistry {
    pub fn new() -> Self {
        let entries = DType::ALL
            .iter()
            .map(|&dtype| DTypeInfo {
                dtype,
                name: dtype.name(),
                alias: dtype.alias(),
                size_in_bytes: dtype.size_in_bytes(),
                category: dtype.category(),
            })
            .collect();
        DTypeRegistry { entries }
    }

    /// Resolve a dtype string. Accepts canonical names and short aliases.
    pub fn parse(&self, name: &str) -> Result<DType> {
        let wanted = name.trim();
        self.entries
            .iter()
            .find(|e| e.name == wanted || e.alias == wanted)
            .map(|e| e.dtype)
            .ok_or_else(|| Error::UnsupportedDType {
                name: name.to_string(),
                valid: self.valid_names(),
            })
    }

    pub fn info(&self, dtype: DType) -> &DTypeInfo {
        // entries are built from DType::ALL in declaration order
        &self.entries[dtype as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &DTypeInfo> {
        self.entries.iter()
    }

    /// Comma separated canonical names, used in error messages.
    pub fn valid_names(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for DTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// WithDType: the bridge between Rust primitives and DType
//
// Besides the DType tag, the trait carries the scalar kernels that the
// backends apply element by element. Each kernel returns a KernelResult so
// that integer division by zero and operations a dtype cannot express are
// reported instead of producing garbage.

/// Failure of a single scalar kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelFault {
    DivisionByZero,
    Unsupported,
}

pub type KernelResult<T> = std::result::Result<T, KernelFault>;

/// Trait implemented by Rust types that can be stored in an array.
pub trait WithDType: Copy + Send + Sync + PartialOrd + fmt::Debug + 'static {
    /// The corresponding DType enum variant.
    const DTYPE: DType;

    fn to_f64(self) -> f64;

    /// `as` semantics: floats round to nearest, integers truncate toward
    /// zero and saturate, NaN becomes 0, bool is `v != 0`.
    fn from_f64(v: f64) -> Self;

    /// Integer view of the value. Floats truncate toward zero.
    fn to_i128(self) -> i128;

    /// Two's-complement wrapping conversion for integers.
    fn from_i128(v: i128) -> Self;

    fn is_nonzero(self) -> bool;

    fn is_nan(self) -> bool {
        false
    }

    fn zero() -> Self;
    fn one() -> Self;

    fn try_add(self, rhs: Self) -> KernelResult<Self>;
    fn try_sub(self, rhs: Self) -> KernelResult<Self>;
    fn try_mul(self, rhs: Self) -> KernelResult<Self>;
    fn try_div(self, rhs: Self) -> KernelResult<Self>;
    fn try_pow(self, rhs: Self) -> KernelResult<Self>;
    fn try_neg(self) -> KernelResult<Self>;
    fn absolute(self) -> Self;
}

macro_rules! impl_float {
    ($t:ty, $dtype:ident) => {
        impl WithDType for $t {
            const DTYPE: DType = DType::$dtype;

            fn to_f64(self) -> f64 {
                self.as_()
            }
            fn from_f64(v: f64) -> Self {
                v.as_()
            }
            fn to_i128(self) -> i128 {
                self.as_()
            }
            fn from_i128(v: i128) -> Self {
                v.as_()
            }
            fn is_nonzero(self) -> bool {
                self != 0.0
            }
            fn is_nan(self) -> bool {
                <$t>::is_nan(self)
            }
            fn zero() -> Self {
                0.0
            }
            fn one() -> Self {
                1.0
            }
            fn try_add(self, rhs: Self) -> KernelResult<Self> {
                Ok(self + rhs)
            }
            fn try_sub(self, rhs: Self) -> KernelResult<Self> {
                Ok(self - rhs)
            }
            fn try_mul(self, rhs: Self) -> KernelResult<Self> {
                Ok(self * rhs)
            }
            fn try_div(self, rhs: Self) -> KernelResult<Self> {
                Ok(self / rhs)
            }
            fn try_pow(self, rhs: Self) -> KernelResult<Self> {
                Ok(self.powf(rhs))
            }
            fn try_neg(self) -> KernelResult<Self> {
                Ok(-self)
            }
            fn absolute(self) -> Self {
                <$t>::abs(self)
            }
        }
    };
}

macro_rules! impl_int {
    (@pow $t:ty, $exp:expr) => {
        impl IntPow for $t {
            fn pow_kernel(self, rhs: Self) -> KernelResult<Self> {
                let exp: fn($t) -> Option<u128> = $exp;
                match exp(rhs) {
                    Some(e) => Ok(self.wrapping_pow(u32::try_from(e).unwrap_or(u32::MAX))),
                    None => Err(KernelFault::Unsupported),
                }
            }
        }
    };
    (@common $t:ty, $dtype:ident) => {
        impl WithDType for $t {
            const DTYPE: DType = DType::$dtype;

            fn to_f64(self) -> f64 {
                self.as_()
            }
            fn from_f64(v: f64) -> Self {
                v.as_()
            }
            fn to_i128(self) -> i128 {
                self.as_()
            }
            fn from_i128(v: i128) -> Self {
                v.as_()
            }
            fn is_nonzero(self) -> bool {
                self != 0
            }
            fn zero() -> Self {
                0
            }
            fn one() -> Self {
                1
            }
            fn try_add(self, rhs: Self) -> KernelResult<Self> {
                Ok(self.wrapping_add(rhs))
            }
            fn try_sub(self, rhs: Self) -> KernelResult<Self> {
                Ok(self.wrapping_sub(rhs))
            }
            fn try_mul(self, rhs: Self) -> KernelResult<Self> {
                Ok(self.wrapping_mul(rhs))
            }
            fn try_div(self, rhs: Self) -> KernelResult<Self> {
                if rhs == 0 {
                    return Err(KernelFault::DivisionByZero);
                }
                Ok(self.wrapping_div(rhs))
            }
            fn try_pow(self, rhs: Self) -> KernelResult<Self> {
                IntPow::pow_kernel(self, rhs)
            }
            fn try_neg(self) -> KernelResult<Self> {
                IntKernels::neg_kernel(self)
            }
            fn absolute(self) -> Self {
                IntKernels::abs_kernel(self)
            }
        }
    };
    ($t:ty, $dtype:ident, signed) => {
        impl_int!(@common $t, $dtype);
        impl_int!(@pow $t, |e: $t| if e < 0 { None } else { Some(e as u128) });

        impl IntKernels for $t {
            fn neg_kernel(self) -> KernelResult<Self> {
                Ok(self.wrapping_neg())
            }
            fn abs_kernel(self) -> Self {
                self.wrapping_abs()
            }
        }
    };
    ($t:ty, $dtype:ident, unsigned) => {
        impl_int!(@common $t, $dtype);
        impl_int!(@pow $t, |e: $t| Some(e as u128));

        impl IntKernels for $t {
            fn neg_kernel(self) -> KernelResult<Self> {
                Ok(self.wrapping_neg())
            }
            fn abs_kernel(self) -> Self {
                self
            }
        }
    };
}

// Sign-dependent integer kernels, kept out of the public trait.
trait IntKernels: Sized {
    fn neg_kernel(self) -> KernelResult<Self>;
    fn abs_kernel(self) -> Self;
}

trait IntPow: Sized {
    fn pow_kernel(self, rhs: Self) -> KernelResult<Self>;
}

impl_float!(f32, F32);
impl_float!(f64, F64);
impl_int!(i8, I8, signed);
impl_int!(i16, I16, signed);
impl_int!(i32, I32, signed);
impl_int!(i64, I64, signed);
impl_int!(u8, U8, unsigned);
impl_int!(u16, U16, unsigned);
impl_int!(u32, U32, unsigned);
impl_int!(u64, U64, unsigned);

// bool arithmetic: `+` is logical or, `*` is logical and. Subtraction,
// division, powers and negation have no boolean meaning.
impl WithDType for bool {
    const DTYPE: DType = DType::Bool;

    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }
    fn from_f64(v: f64) -> Self {
        v != 0.0
    }
    fn to_i128(self) -> i128 {
        self as i128
    }
    fn from_i128(v: i128) -> Self {
        v != 0
    }
    fn is_nonzero(self) -> bool {
        self
    }
    fn zero() -> Self {
        false
    }
    fn one() -> Self {
        true
    }
    fn try_add(self, rhs: Self) -> KernelResult<Self> {
        Ok(self | rhs)
    }
    fn try_sub(self, _rhs: Self) -> KernelResult<Self> {
        Err(KernelFault::Unsupported)
    }
    fn try_mul(self, rhs: Self) -> KernelResult<Self> {
        Ok(self & rhs)
    }
    fn try_div(self, _rhs: Self) -> KernelResult<Self> {
        Err(KernelFault::Unsupported)
    }
    fn try_pow(self, _rhs: Self) -> KernelResult<Self> {
        Err(KernelFault::Unsupported)
    }
    fn try_neg(self) -> KernelResult<Self> {
        Err(KernelFault::Unsupported)
    }
    fn absolute(self) -> Self {
        self
    }
}

/// Convert one element between dtypes using the uniform cast policy:
///
/// - float to int truncates toward zero and saturates (NaN becomes 0)
/// - int to int wraps (two's complement)
/// - anything to float rounds to the nearest representable value
/// - anything to bool is `value != 0`
pub fn cast_scalar<S: WithDType, D: WithDType>(v: S) -> D {
    if D::DTYPE == DType::Bool {
        D::from_i128(v.is_nonzero() as i128)
    } else if D::DTYPE.is_float() || S::DTYPE.is_float() {
        D::from_f64(v.to_f64())
    } else {
        D::from_i128(v.to_i128())
    }
}
