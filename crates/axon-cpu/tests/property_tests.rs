//! Property-based tests for the CPU kernels on strided inputs.

use axon_core::DType;
use axon_cpu::{CpuArray, CpuDevice};
use proptest::prelude::*;

fn proptest_config() -> ProptestConfig {
    ProptestConfig {
        cases: 48,
        ..ProptestConfig::default()
    }
}

fn values(n: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec((-20i32..20).prop_map(f64::from), n)
}

fn naive_matmul(a: &[f64], b: &[f64], m: usize, k: usize, n: usize) -> Vec<f64> {
    let mut out = vec![0.0; m * n];
    for i in 0..m {
        for j in 0..n {
            out[i * n + j] = (0..k).map(|p| a[i * k + p] * b[p * n + j]).sum();
        }
    }
    out
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn matmul_matches_reference(
        (m, k, n, a, b) in (1usize..7, 1usize..7, 1usize..7).prop_flat_map(|(m, k, n)| {
            (Just(m), Just(k), Just(n), values(m * k), values(k * n))
        })
    ) {
        let x = CpuArray::from_f64_slice(&a, (m, k), DType::F64, &CpuDevice).unwrap();
        let y = CpuArray::from_f64_slice(&b, (k, n), DType::F64, &CpuDevice).unwrap();
        let got = x.matmul(&y).unwrap();
        prop_assert_eq!(got.dims(), &[m, n]);
        prop_assert_eq!(got.to_f64_vec().unwrap(), naive_matmul(&a, &b, m, k, n));

        // integer dtypes give the same exact products
        let xi = x.cast(DType::I64).unwrap();
        let yi = y.cast(DType::I64).unwrap();
        prop_assert_eq!(
            xi.matmul(&yi).unwrap().to_f64_vec().unwrap(),
            naive_matmul(&a, &b, m, k, n)
        );
    }

    #[test]
    fn strided_views_behave_like_their_copies(
        (r, c, data) in (2usize..8, 2usize..8).prop_flat_map(|(r, c)| {
            (Just(r), Just(c), values(r * c))
        })
    ) {
        let a = CpuArray::from_f64_slice(&data, (r, c), DType::F64, &CpuDevice).unwrap();
        let view = a.transpose().unwrap().slice(0, -1, -(c as isize) - 1, -2).unwrap();
        let copy = view.contiguous().unwrap();
        prop_assert!(view.shares_storage(&a));
        prop_assert!(!copy.shares_storage(&a));
        prop_assert_eq!(view.to_f64_vec().unwrap(), copy.to_f64_vec().unwrap());

        for axis in [None, Some(0), Some(1)] {
            let lhs = view.sum(axis, false).unwrap().to_f64_vec().unwrap();
            let rhs = copy.sum(axis, false).unwrap().to_f64_vec().unwrap();
            prop_assert_eq!(lhs, rhs);
        }
        let lhs = view.mul(&view).unwrap().to_f64_vec().unwrap();
        let rhs = copy.mul(&copy).unwrap().to_f64_vec().unwrap();
        prop_assert_eq!(lhs, rhs);
    }
}
