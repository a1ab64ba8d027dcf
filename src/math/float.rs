//! Floating-point helpers: NaN-propagating min/max, cancellation-free
//! `log1p`/`expm1`, and the inverse error function.

use num::Float;

use crate::error::Result;
use crate::math::target::TargetMath;

/// Below this magnitude `log1p` uses its Taylor expansion.
pub const LOG1P_SMALL_THRESHOLD: f64 = 1e-4;
/// Below this magnitude `expm1` uses its Taylor expansion.
pub const EXPM1_SMALL_THRESHOLD: f64 = 1e-5;

/// Coefficients for `erfinv` when `w < 5`, highest order first.
#[allow(clippy::excessive_precision)]
pub const ERFINV_CENTRAL_COEFFICIENTS: [f32; 9] = [
    2.81022636e-08,
    3.43273939e-07,
    -3.5233877e-06,
    -4.39150654e-06,
    0.00021858087,
    -0.00125372503,
    -0.00417768164,
    0.246640727,
    1.50140941,
];

/// Coefficients for `erfinv` when `w >= 5`, highest order first.
#[allow(clippy::excessive_precision)]
pub const ERFINV_TAIL_COEFFICIENTS: [f32; 9] = [
    -0.000200214257,
    0.000100950558,
    0.00134934322,
    -0.00367342844,
    0.00573950773,
    -0.0076224613,
    0.00943887047,
    1.00167406,
    2.83297682,
];

/// Converts an `f64` constant into `T`.
#[inline]
pub(crate) fn constant<T: Float>(value: f64) -> T {
    T::from(value).unwrap_or_else(T::nan)
}

/// Maximum that returns NaN when either input is NaN.
///
/// With `no_nans` set the caller guarantees NaN-free inputs and the plain
/// unordered comparison is used.
pub fn float_max<T: Float>(lhs: T, rhs: T, no_nans: bool) -> T {
    // lhs >= rhs (ordered), or lhs is NaN.
    let pick_lhs = if no_nans {
        !(lhs < rhs)
    } else {
        lhs >= rhs || lhs.is_nan()
    };
    if pick_lhs {
        lhs
    } else {
        rhs
    }
}

/// Minimum that returns NaN when either input is NaN.
pub fn float_min<T: Float>(lhs: T, rhs: T, no_nans: bool) -> T {
    let pick_lhs = if no_nans {
        !(lhs > rhs)
    } else {
        lhs <= rhs || lhs.is_nan()
    };
    if pick_lhs {
        lhs
    } else {
        rhs
    }
}

/// `ln(1 + x)`, switching to `x - x^2/2` for `|x| < 1e-4`.
pub fn log1p<T: Float, M: TargetMath>(math: &M, x: T) -> Result<T> {
    let one = T::one();
    let for_large_x = math.log(x + one)?;
    let for_small_x = (constant::<T>(-0.5) * x + one) * x;
    let x_is_small = x.abs() < constant(LOG1P_SMALL_THRESHOLD);
    Ok(if x_is_small { for_small_x } else { for_large_x })
}

/// `e^x - 1`, switching to `x + x^2/2` for `|x| < 1e-5`.
pub fn expm1<T: Float, M: TargetMath>(math: &M, x: T) -> Result<T> {
    let one = T::one();
    let half = constant::<T>(0.5);
    let for_large_x = math.exp(x)? - one;
    let for_small_x = x + x * x * half;
    let x_is_small = x.abs() < constant(EXPM1_SMALL_THRESHOLD);
    Ok(if x_is_small { for_small_x } else { for_large_x })
}

fn multiply_add(coefficients: &[f32], w: f32) -> f32 {
    let mut p = coefficients[0];
    for &coefficient in &coefficients[1..] {
        p = p * w + coefficient;
    }
    p
}

/// Inverse error function for `f32` (Giles, "Approximating the erfinv
/// function").
pub fn erf_inv_f32<M: TargetMath>(math: &M, x: f32) -> Result<f32> {
    let w = -math.log((1.0 - x) * (1.0 + x))?;
    let p = if w < 5.0 {
        multiply_add(&ERFINV_CENTRAL_COEFFICIENTS, w - 2.5)
    } else {
        multiply_add(&ERFINV_TAIL_COEFFICIENTS, math.sqrt(w)? - 3.0)
    };
    Ok(p * x)
}

/// Inverse complementary error function: `erfinv(1 - x)`.
pub fn erfc_inv_f32<M: TargetMath>(math: &M, x: f32) -> Result<f32> {
    erf_inv_f32(math, 1.0 - x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::target::BaseMath;

    #[test]
    fn test_max_min_propagate_nan_from_either_side() {
        assert!(float_max(f32::NAN, 1.0, false).is_nan());
        assert!(float_max(1.0, f32::NAN, false).is_nan());
        assert!(float_min(f64::NAN, 1.0, false).is_nan());
        assert!(float_min(1.0, f64::NAN, false).is_nan());
        assert_eq!(float_max(2.0f32, 1.0, false), 2.0);
        assert_eq!(float_min(2.0f32, 1.0, false), 1.0);
    }

    #[test]
    fn test_log1p_small_branch() {
        let x = 1e-6f32;
        let y = log1p(&BaseMath, x).unwrap();
        assert_eq!(y, (-0.5 * x + 1.0) * x);
    }

    #[test]
    fn test_expm1_branches() {
        let small = 1e-7f64;
        assert_eq!(expm1(&BaseMath, small).unwrap(), small + small * small * 0.5);
        let large = 0.5f64;
        assert_eq!(expm1(&BaseMath, large).unwrap(), large.exp() - 1.0);
    }

    #[test]
    fn test_erfinv_is_odd_and_zero_at_origin() {
        assert_eq!(erf_inv_f32(&BaseMath, 0.0).unwrap(), 0.0);
        let a = erf_inv_f32(&BaseMath, 0.3).unwrap();
        let b = erf_inv_f32(&BaseMath, -0.3).unwrap();
        assert!((a + b).abs() < 1e-7);
    }
}
