use std::fmt;

use axon_core::backend::BackendStorage;
use axon_core::dtype::{DType, WithDType};
use axon_core::error::{Error, Result};

// CpuStorage: host memory for each supported dtype
//
// One variant per dtype, each owning a plain Vec<T>. Kernels are written once
// over `T: CpuElement` and reached through the `dispatch!` family of macros,
// which expand into a match with one arm per variant.

/// Host-side storage. Each variant wraps a `Vec` of the matching primitive.
pub enum CpuStorage {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    Bool(Vec<bool>),
}

/// Run `$body` with `$v` bound to the typed slice of `$storage`.
macro_rules! dispatch {
    ($storage:expr, $v:ident => $body:expr) => {
        match $storage {
            $crate::storage::CpuStorage::F32($v) => $body,
            $crate::storage::CpuStorage::F64($v) => $body,
            $crate::storage::CpuStorage::I8($v) => $body,
            $crate::storage::CpuStorage::I16($v) => $body,
            $crate::storage::CpuStorage::I32($v) => $body,
            $crate::storage::CpuStorage::I64($v) => $body,
            $crate::storage::CpuStorage::U8($v) => $body,
            $crate::storage::CpuStorage::U16($v) => $body,
            $crate::storage::CpuStorage::U32($v) => $body,
            $crate::storage::CpuStorage::U64($v) => $body,
            $crate::storage::CpuStorage::Bool($v) => $body,
        }
    };
}

/// Like `dispatch!` for two storages that must share a dtype. A mismatch
/// is reported as `DTypeMismatch` for `$op`.
macro_rules! dispatch_pair {
    ($op:expr, $lhs:expr, $rhs:expr, ($a:ident, $b:ident) => $body:expr) => {{
        use $crate::storage::CpuStorage as S;
        match ($lhs, $rhs) {
            (S::F32($a), S::F32($b)) => $body,
            (S::F64($a), S::F64($b)) => $body,
            (S::I8($a), S::I8($b)) => $body,
            (S::I16($a), S::I16($b)) => $body,
            (S::I32($a), S::I32($b)) => $body,
            (S::I64($a), S::I64($b)) => $body,
            (S::U8($a), S::U8($b)) => $body,
            (S::U16($a), S::U16($b)) => $body,
            (S::U32($a), S::U32($b)) => $body,
            (S::U64($a), S::U64($b)) => $body,
            (S::Bool($a), S::Bool($b)) => $body,
            (l, r) => {
                return Err(axon_core::Error::DTypeMismatch {
                    op: $op,
                    lhs: axon_core::BackendStorage::dtype(l),
                    rhs: axon_core::BackendStorage::dtype(r),
                })
            }
        }
    }};
}

/// Run `$body` with `$t` aliased to the primitive type of `$dtype`.
macro_rules! with_dtype {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            axon_core::DType::F32 => {
                type $t = f32;
                $body
            }
            axon_core::DType::F64 => {
                type $t = f64;
                $body
            }
            axon_core::DType::I8 => {
                type $t = i8;
                $body
            }
            axon_core::DType::I16 => {
                type $t = i16;
                $body
            }
            axon_core::DType::I32 => {
                type $t = i32;
                $body
            }
            axon_core::DType::I64 => {
                type $t = i64;
                $body
            }
            axon_core::DType::U8 => {
                type $t = u8;
                $body
            }
            axon_core::DType::U16 => {
                type $t = u16;
                $body
            }
            axon_core::DType::U32 => {
                type $t = u32;
                $body
            }
            axon_core::DType::U64 => {
                type $t = u64;
                $body
            }
            axon_core::DType::Bool => {
                type $t = bool;
                $body
            }
        }
    };
}

pub(crate) use {dispatch, dispatch_pair, with_dtype};

/// A primitive that can live in a `CpuStorage`.
pub trait CpuElement: WithDType {
    /// Move a typed buffer into the matching storage variant.
    fn into_storage(data: Vec<Self>) -> CpuStorage;

    /// Borrow the buffer if `storage` holds this type.
    fn slice(storage: &CpuStorage) -> Option<&[Self]>;
}

macro_rules! impl_cpu_element {
    ($t:ty, $variant:ident) => {
        impl CpuElement for $t {
            fn into_storage(data: Vec<Self>) -> CpuStorage {
                CpuStorage::$variant(data)
            }

            fn slice(storage: &CpuStorage) -> Option<&[Self]> {
                match storage {
                    CpuStorage::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }
        }
    };
}

impl_cpu_element!(f32, F32);
impl_cpu_element!(f64, F64);
impl_cpu_element!(i8, I8);
impl_cpu_element!(i16, I16);
impl_cpu_element!(i32, I32);
impl_cpu_element!(i64, I64);
impl_cpu_element!(u8, U8);
impl_cpu_element!(u16, U16);
impl_cpu_element!(u32, U32);
impl_cpu_element!(u64, U64);
impl_cpu_element!(bool, Bool);

impl CpuStorage {
    /// Build storage of `dtype` from f64 values with the element's
    /// `from_f64` conversion.
    pub fn from_f64_iter(dtype: DType, values: impl Iterator<Item = f64>) -> CpuStorage {
        with_dtype!(dtype, T => T::into_storage(values.map(T::from_f64).collect()))
    }

    /// Typed view of the buffer.
    pub fn as_slice<T: CpuElement>(&self) -> Result<&[T]> {
        T::slice(self).ok_or_else(|| {
            Error::msg(format!(
                "storage holds {}, requested {}",
                self.dtype(),
                T::DTYPE
            ))
        })
    }

    /// Every element converted to f64, in buffer order.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        dispatch!(self, v => v.iter().map(|x| x.to_f64()).collect())
    }
}

impl Clone for CpuStorage {
    fn clone(&self) -> Self {
        dispatch!(self, v => CpuElement::into_storage(v.clone()))
    }
}

impl fmt::Debug for CpuStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CpuStorage::{:?}(len={})", self.dtype(), self.len())
    }
}

impl BackendStorage for CpuStorage {
    fn dtype(&self) -> DType {
        match self {
            CpuStorage::F32(_) => DType::F32,
            CpuStorage::F64(_) => DType::F64,
            CpuStorage::I8(_) => DType::I8,
            CpuStorage::I16(_) => DType::I16,
            CpuStorage::I32(_) => DType::I32,
            CpuStorage::I64(_) => DType::I64,
            CpuStorage::U8(_) => DType::U8,
            CpuStorage::U16(_) => DType::U16,
            CpuStorage::U32(_) => DType::U32,
            CpuStorage::U64(_) => DType::U64,
            CpuStorage::Bool(_) => DType::Bool,
        }
    }

    fn len(&self) -> usize {
        dispatch!(self, v => v.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_f64_iter_converts() {
        let s = CpuStorage::from_f64_iter(DType::U8, [1.9, 300.0, -4.0].into_iter());
        assert_eq!(s.dtype(), DType::U8);
        assert_eq!(s.as_slice::<u8>().unwrap(), &[1, 255, 0]);

        let b = CpuStorage::from_f64_iter(DType::Bool, [0.0, 0.5].into_iter());
        assert_eq!(b.as_slice::<bool>().unwrap(), &[false, true]);
    }

    #[test]
    fn test_as_slice_wrong_type() {
        let s = CpuStorage::F32(vec![1.0, 2.0]);
        assert!(s.as_slice::<f64>().is_err());
        assert_eq!(s.len(), 2);
        assert_eq!(s.to_f64_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_clone_is_deep() {
        let s = CpuStorage::I64(vec![1, 2, 3]);
        let c = s.clone();
        assert_eq!(c.as_slice::<i64>().unwrap(), s.as_slice::<i64>().unwrap());
        assert_eq!(format!("{c:?}"), "CpuStorage::I64(len=3)");
    }
}
