//! # axon-cpu
//!
//! CPU backend for axon.
//!
//! Stores every array as a typed `Vec<T>` (see [`CpuStorage`]) and runs the
//! element-wise, reduction and GEMM kernels on the host. Buffers of at least
//! [`PARALLEL_THRESHOLD`] elements are processed on the rayon thread pool;
//! results do not depend on the number of threads.

pub mod kernels;
pub mod matmul;
pub mod reduce;
pub mod storage;

use rand::distributions::Uniform;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use axon_core::backend::{
    Backend, BackendDevice, BackendStorage, BinaryOp, CmpOp, ReduceOp, UnaryOp,
};
use axon_core::dtype::DType;
use axon_core::error::{Error, Result};
use axon_core::layout::Layout;
use axon_core::shape::Shape;
use axon_core::Array;

pub use kernels::PARALLEL_THRESHOLD;
pub use storage::{CpuElement, CpuStorage};

use storage::{dispatch, dispatch_pair, with_dtype};

/// The host device. There is only one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuDevice;

impl BackendDevice for CpuDevice {
    fn name(&self) -> String {
        "cpu".to_string()
    }
}

/// Backend marker type for the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

/// An array stored in host memory.
pub type CpuArray = Array<CpuBackend>;

fn check_range(op: &'static str, low: f64, high: f64) -> Result<()> {
    if low < high && (high - low).is_finite() {
        Ok(())
    } else {
        Err(Error::msg(format!("{op}: empty range [{low}, {high})")))
    }
}

impl Backend for CpuBackend {
    type Device = CpuDevice;
    type Storage = CpuStorage;

    fn zeros(shape: &Shape, dtype: DType, device: &CpuDevice) -> Result<CpuStorage> {
        Self::full(shape, 0.0, dtype, device)
    }

    fn ones(shape: &Shape, dtype: DType, device: &CpuDevice) -> Result<CpuStorage> {
        Self::full(shape, 1.0, dtype, device)
    }

    fn full(shape: &Shape, val: f64, dtype: DType, _device: &CpuDevice) -> Result<CpuStorage> {
        Ok(CpuStorage::from_f64_iter(
            dtype,
            std::iter::repeat(val).take(shape.elem_count()),
        ))
    }

    fn from_f64_slice(data: &[f64], dtype: DType, _device: &CpuDevice) -> Result<CpuStorage> {
        Ok(CpuStorage::from_f64_iter(dtype, data.iter().copied()))
    }

    fn rand_uniform(
        shape: &Shape,
        low: f64,
        high: f64,
        dtype: DType,
        _device: &CpuDevice,
    ) -> Result<CpuStorage> {
        check_range("rand_uniform", low, high)?;
        let dist = Uniform::new(low, high);
        let mut rng = rand::thread_rng();
        let values = (0..shape.elem_count()).map(|_| dist.sample(&mut rng));
        Ok(CpuStorage::from_f64_iter(dtype, values))
    }

    fn rand_normal(
        shape: &Shape,
        mean: f64,
        std: f64,
        dtype: DType,
        _device: &CpuDevice,
    ) -> Result<CpuStorage> {
        let dist = Normal::new(mean, std)
            .map_err(|e| Error::msg(format!("rand_normal: {e}")))?;
        let mut rng = rand::thread_rng();
        let values = (0..shape.elem_count()).map(|_| dist.sample(&mut rng));
        Ok(CpuStorage::from_f64_iter(dtype, values))
    }

    fn randint(
        shape: &Shape,
        low: i64,
        high: i64,
        dtype: DType,
        _device: &CpuDevice,
    ) -> Result<CpuStorage> {
        if low >= high {
            return Err(Error::msg(format!("randint: empty range [{low}, {high})")));
        }
        let mut rng = rand::thread_rng();
        let n = shape.elem_count();
        Ok(with_dtype!(dtype, T => {
            let values: Vec<T> = (0..n)
                .map(|_| axon_core::WithDType::from_i128(rng.gen_range(low..high) as i128))
                .collect();
            CpuElement::into_storage(values)
        }))
    }

    fn binary_op(
        op: BinaryOp,
        lhs: &CpuStorage,
        lhs_layout: &Layout,
        rhs: &CpuStorage,
        rhs_layout: &Layout,
    ) -> Result<CpuStorage> {
        dispatch_pair!(op.name(), lhs, rhs, (a, b) => {
            kernels::binary(op, a, lhs_layout, b, rhs_layout).map(CpuElement::into_storage)
        })
    }

    fn scalar_op(
        op: BinaryOp,
        input: &CpuStorage,
        layout: &Layout,
        scalar: f64,
        reflected: bool,
    ) -> Result<CpuStorage> {
        dispatch!(input, x => {
            kernels::scalar(op, x, layout, scalar, reflected).map(CpuElement::into_storage)
        })
    }

    fn unary_op(op: UnaryOp, input: &CpuStorage, layout: &Layout) -> Result<CpuStorage> {
        dispatch!(input, x => kernels::unary(op, x, layout).map(CpuElement::into_storage))
    }

    fn cmp_op(
        op: CmpOp,
        lhs: &CpuStorage,
        lhs_layout: &Layout,
        rhs: &CpuStorage,
        rhs_layout: &Layout,
    ) -> Result<CpuStorage> {
        let out = dispatch_pair!(op.name(), lhs, rhs, (a, b) => {
            kernels::cmp(op, a, lhs_layout, b, rhs_layout)
        });
        Ok(CpuStorage::Bool(out))
    }

    fn reduce_op(
        op: ReduceOp,
        input: &CpuStorage,
        layout: &Layout,
        axis: Option<usize>,
    ) -> Result<CpuStorage> {
        dispatch!(input, x => reduce::reduce(op, x, layout, axis))
    }

    fn matmul(
        lhs: &CpuStorage,
        lhs_layout: &Layout,
        rhs: &CpuStorage,
        rhs_layout: &Layout,
    ) -> Result<CpuStorage> {
        tracing::trace!(
            lhs = %lhs_layout.shape(),
            rhs = %rhs_layout.shape(),
            dtype = %lhs.dtype(),
            "cpu matmul"
        );
        dispatch_pair!("matmul", lhs, rhs, (a, b) => {
            matmul::matmul(a, lhs_layout, b, rhs_layout).map(CpuElement::into_storage)
        })
    }

    fn to_contiguous(input: &CpuStorage, layout: &Layout) -> Result<CpuStorage> {
        Ok(dispatch!(input, x => CpuElement::into_storage(kernels::gather(x, layout))))
    }

    fn to_f64_vec(input: &CpuStorage, layout: &Layout) -> Result<Vec<f64>> {
        Ok(dispatch!(input, x => kernels::gather_map(x, layout, |v| axon_core::WithDType::to_f64(v))))
    }

    fn cast(
        input: &CpuStorage,
        layout: &Layout,
        dtype: DType,
        _device: &CpuDevice,
    ) -> Result<CpuStorage> {
        Ok(dispatch!(input, x => {
            with_dtype!(dtype, D => CpuElement::into_storage(kernels::cast::<_, D>(x, layout)))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_name() {
        assert_eq!(CpuDevice.name(), "cpu");
    }

    #[test]
    fn test_random_creation_ranges() {
        let shape = Shape::from((4, 5));
        let u = CpuBackend::rand_uniform(&shape, -1.0, 1.0, DType::F32, &CpuDevice).unwrap();
        assert_eq!(u.len(), 20);
        assert!(u.to_f64_vec().iter().all(|&v| (-1.0..=1.0).contains(&v)));

        let r = CpuBackend::randint(&shape, 3, 6, DType::U8, &CpuDevice).unwrap();
        assert!(r.as_slice::<u8>().unwrap().iter().all(|&v| (3..6).contains(&v)));

        let n = CpuBackend::rand_normal(&shape, 0.0, 1.0, DType::F64, &CpuDevice).unwrap();
        assert!(n.to_f64_vec().iter().all(|v| v.is_finite()));

        assert!(CpuBackend::rand_uniform(&shape, 1.0, 1.0, DType::F32, &CpuDevice).is_err());
        assert!(CpuBackend::rand_uniform(&shape, -1e308, 1e308, DType::F64, &CpuDevice).is_err());
        assert!(CpuBackend::rand_uniform(&shape, 0.0, f64::INFINITY, DType::F64, &CpuDevice).is_err());
        assert!(CpuBackend::randint(&shape, 5, 5, DType::I32, &CpuDevice).is_err());
        assert!(CpuBackend::rand_normal(&shape, 0.0, -1.0, DType::F64, &CpuDevice).is_err());
    }

    #[test]
    fn test_binary_dtype_mismatch() {
        let l = Layout::contiguous(Shape::from(2));
        let a = CpuStorage::F32(vec![1.0, 2.0]);
        let b = CpuStorage::F64(vec![1.0, 2.0]);
        let err = CpuBackend::binary_op(BinaryOp::Add, &a, &l, &b, &l).unwrap_err();
        assert!(matches!(
            err,
            Error::DTypeMismatch { op: "add", lhs: DType::F32, rhs: DType::F64 }
        ));
    }

    #[test]
    fn test_cast_between_storages() {
        let l = Layout::contiguous(Shape::from(3));
        let s = CpuStorage::F64(vec![-1.7, 0.0, 2.2]);
        let c = CpuBackend::cast(&s, &l, DType::Bool, &CpuDevice).unwrap();
        assert_eq!(c.as_slice::<bool>().unwrap(), &[true, false, true]);
        let c = CpuBackend::cast(&s, &l, DType::I16, &CpuDevice).unwrap();
        assert_eq!(c.as_slice::<i16>().unwrap(), &[-1, 0, 2]);
    }
}
