use axon_core::{Array, Backend, Result};

/// How [`normalize`] rescales the values of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// `(x - min) / (max - min)`, mapping onto `[0, 1]`.
    MinMax,
    /// `(x - mean) / std` with the population standard deviation.
    Std,
    /// `x / sqrt(mean(x^2))`.
    Rms,
    /// `(x - median) / IQR`, with quartiles linearly interpolated between
    /// order statistics.
    Robust,
}

fn as_float<B: Backend>(a: &Array<B>) -> Result<Array<B>> {
    a.cast(a.dtype().float_result())
}

/// Sum of absolute values over the whole array, as a 0-D float array.
pub fn l1_norm<B: Backend>(a: &Array<B>) -> Result<Array<B>> {
    as_float(a)?.abs()?.sum(None, false)
}

/// Euclidean (Frobenius) norm over the whole array, as a 0-D float array.
pub fn l2_norm<B: Backend>(a: &Array<B>) -> Result<Array<B>> {
    as_float(a)?.square()?.sum(None, false)?.sqrt()
}

/// Scale so that the whole array has unit Euclidean norm.
pub fn unit_norm<B: Backend>(a: &Array<B>) -> Result<Array<B>> {
    let x = as_float(a)?;
    x.div(&l2_norm(&x)?)
}

/// Rescale every value using statistics of the whole array. The result has
/// the input's shape and a float dtype. A constant input divides by zero
/// and yields NaN under IEEE rules.
pub fn normalize<B: Backend>(a: &Array<B>, method: Normalization) -> Result<Array<B>> {
    let x = as_float(a)?;
    match method {
        Normalization::MinMax => {
            let lo = x.min(None, false)?;
            let range = x.max(None, false)?.sub(&lo)?;
            x.sub(&lo)?.div(&range)
        }
        Normalization::Std => x.sub(&x.mean(None, false)?)?.div(&x.std(None, 0, false)?),
        Normalization::Rms => x.div(&x.square()?.mean(None, false)?.sqrt()?),
        Normalization::Robust => {
            let mut values = x.to_f64_vec()?;
            values.sort_by(f64::total_cmp);
            let median = quantile(&values, 0.5);
            let iqr = quantile(&values, 0.75) - quantile(&values, 0.25);
            x.sub(median)?.div(iqr)
        }
    }
}

/// Shorthand for `normalize(a, Normalization::Robust)`.
pub fn robust_norm<B: Backend>(a: &Array<B>) -> Result<Array<B>> {
    normalize(a, Normalization::Robust)
}

/// `q`-quantile of sorted values; NaN when empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&v, 0.5), 2.5);
        assert_eq!(quantile(&v, 0.25), 1.75);
        assert_eq!(quantile(&v, 0.75), 3.25);
        assert_eq!(quantile(&[7.0], 0.25), 7.0);
        assert!(quantile(&[], 0.5).is_nan());
    }
}
