//! Property-based tests for the array algebra exposed by the facade.

use axon::prelude::*;
use proptest::prelude::*;

fn proptest_config() -> ProptestConfig {
    ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    }
}

/// A matrix shape and matching integral values, so every dtype holds them
/// exactly.
fn matrix() -> impl Strategy<Value = (usize, usize, Vec<f64>)> {
    (1usize..6, 1usize..6).prop_flat_map(|(r, c)| {
        (
            Just(r),
            Just(c),
            prop::collection::vec((-100i32..100).prop_map(f64::from), r * c),
        )
    })
}

fn array(data: &[f64], dims: &[usize], dtype: DType) -> CpuArray {
    CpuArray::from_f64_slice(data, dims, dtype, &CpuDevice).unwrap()
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn transpose_is_an_involution((r, c, data) in matrix()) {
        let a = array(&data, &[r, c], DType::F64);
        let tt = a.transpose().unwrap().transpose().unwrap();
        prop_assert_eq!(tt.dims(), a.dims());
        prop_assert_eq!(tt.strides(), a.strides());
        prop_assert_eq!(tt.to_f64_vec().unwrap(), data);
    }

    #[test]
    fn reshape_round_trips((r, c, data) in matrix()) {
        let a = array(&data, &[r, c], DType::I32);
        let flat = a.reshape(r * c).unwrap();
        let back = flat.reshape((r, c)).unwrap();
        prop_assert_eq!(back.dims(), &[r, c]);
        prop_assert_eq!(back.to_f64_vec().unwrap(), data);

        // through a non-contiguous view as well
        let t = a.transpose().unwrap().reshape(r * c).unwrap();
        prop_assert_eq!(t.elem_count(), r * c);
    }

    #[test]
    fn cast_round_trips_exact_values(
        (r, c, data) in matrix(),
        via in prop::sample::select(vec![DType::F32, DType::F64, DType::I16, DType::I32, DType::I64]),
    ) {
        let a = array(&data, &[r, c], DType::I32);
        let back = a.cast(via).unwrap().cast(DType::I32).unwrap();
        prop_assert_eq!(back.dtype(), DType::I32);
        prop_assert_eq!(back.to_f64_vec().unwrap(), data);
    }

    #[test]
    fn reflected_subtraction_is_other_minus_self((r, c, data) in matrix(), s in -50i32..50) {
        let a = array(&data, &[r, c], DType::F64);
        let s = f64::from(s);
        let got = a.rsub(s).unwrap().to_f64_vec().unwrap();
        let expected: Vec<f64> = data.iter().map(|v| s - v).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn broadcasting_a_row_matches_explicit_tiling((r, c, data) in matrix()) {
        let a = array(&data, &[r, c], DType::F64);
        let row: Vec<f64> = (0..c).map(|j| j as f64 * 10.0).collect();
        let b = array(&row, &[c], DType::F64);
        let got = a.add(&b).unwrap();
        prop_assert_eq!(got.dims(), &[r, c]);
        let expected: Vec<f64> = data
            .iter()
            .enumerate()
            .map(|(i, v)| v + row[i % c])
            .collect();
        prop_assert_eq!(got.to_f64_vec().unwrap(), expected);
    }

    #[test]
    fn sum_over_axes_agrees_with_total((r, c, data) in matrix()) {
        let a = array(&data, &[r, c], DType::I64);
        let total = a.sum(None, false).unwrap().to_scalar().unwrap();
        let by_rows = a.sum(Some(0), false).unwrap().sum(None, false).unwrap().to_scalar().unwrap();
        let by_cols = a.sum(Some(1), true).unwrap();
        prop_assert_eq!(by_cols.dims(), &[r, 1]);
        prop_assert_eq!(total, data.iter().sum::<f64>());
        prop_assert_eq!(by_rows, total);
    }
}
