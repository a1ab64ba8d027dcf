//! Precision reduction of `f32` values and the pseudo-bfloat16 format.
//!
//! Reduction simulates rounding to a float with fewer exponent and mantissa
//! bits, staying in the 32-bit encoding throughout. Mantissa rounding is
//! round-to-nearest-even; values whose exponent falls outside the reduced range
//! saturate to signed zero or signed infinity (denormals flush to zero).

use crate::shape::{BFLOAT16_EXPONENT_BITS, BFLOAT16_MANTISSA_BITS};

const F32_MANTISSA_BITS: u32 = 23;
const F32_EXPONENT_BITS: u32 = 8;
const F32_SIGN_BIT_MASK: u32 = 1 << 31;
const F32_EXP_BITS_MASK: u32 = 0xff << 23;

/// Rounds `x` to a float with `exponent_bits` exponent bits and
/// `mantissa_bits` mantissa bits, returning the result widened back to `f32`.
///
/// When `detect_nans` is false the caller promises no NaN inputs and the NaN
/// repair step is skipped, matching fast-math code generation.
///
/// # Panics
///
/// Panics if `exponent_bits` is 0 or greater than 8, or `mantissa_bits`
/// exceeds 23.
///
/// # Examples
///
/// ```
/// use elemental::math::reduce_precision::reduce_precision_f32;
///
/// // 1 + 2^-11 is a tie at half precision and rounds down to even.
/// let x = f32::from_bits(0x3f80_1000);
/// assert_eq!(reduce_precision_f32(x, 5, 10, true), 1.0);
/// ```
pub fn reduce_precision_f32(x: f32, exponent_bits: u32, mantissa_bits: u32, detect_nans: bool) -> f32 {
    assert!(
        (1..=F32_EXPONENT_BITS).contains(&exponent_bits),
        "exponent_bits must be in [1, 8], got {exponent_bits}"
    );
    assert!(
        mantissa_bits <= F32_MANTISSA_BITS,
        "mantissa_bits must be at most 23, got {mantissa_bits}"
    );

    let mut x_as_int = x.to_bits();

    if mantissa_bits < F32_MANTISSA_BITS {
        // Last remaining mantissa bit.
        let last_mantissa_bit_mask: u32 = 1 << (F32_MANTISSA_BITS - mantissa_bits);

        // Bias of 0111... plus one when the last kept bit is set gives
        // round-to-nearest with ties to even.
        let base_rounding_bias: u32 = (last_mantissa_bit_mask >> 1).wrapping_sub(1);
        let x_last_mantissa_bit = (x_as_int & last_mantissa_bit_mask) >> (F32_MANTISSA_BITS - mantissa_bits);
        let x_rounding_bias = x_last_mantissa_bit.wrapping_add(base_rounding_bias);

        // A carry out of the mantissa increments the exponent, which is the
        // correctly rounded result.
        let truncation_mask = !(last_mantissa_bit_mask - 1);
        x_as_int = x_as_int.wrapping_add(x_rounding_bias) & truncation_mask;
    }

    if exponent_bits < F32_EXPONENT_BITS {
        // An exponent field of 2^(n-1)-1 encodes 1.0 at every width n, so the
        // reduced range in f32 terms is 127 +/- (2^(n-1)-1).
        let f32_exponent_bias: u32 = (1 << 7) - 1;
        let reduced_exponent_bias: u32 = (1 << (exponent_bits - 1)) - 1;
        let reduced_max_exponent = f32_exponent_bias + reduced_exponent_bias;
        let reduced_min_exponent = f32_exponent_bias - reduced_exponent_bias;

        let x_exponent = x_as_int & F32_EXP_BITS_MASK;
        let x_overflows = x_exponent > (reduced_max_exponent << 23);
        let x_underflows = x_exponent <= (reduced_min_exponent << 23);

        let x_signed_zero = x_as_int & F32_SIGN_BIT_MASK;
        let x_signed_inf = x_signed_zero | F32_EXP_BITS_MASK;

        if x_overflows {
            x_as_int = x_signed_inf;
        }
        if x_underflows {
            x_as_int = x_signed_zero;
        }
    }

    let result = f32::from_bits(x_as_int);

    // Exponent handling turns NaN into infinity and mantissa rounding can carry
    // a NaN payload into the sign bit; restore the input unless the reduced
    // format has no mantissa to hold a NaN.
    if detect_nans && x.is_nan() {
        if mantissa_bits > 0 {
            return x;
        }
        return f32::INFINITY;
    }
    result
}

/// Truncates an `f32` to pseudo-bfloat16 after rounding it to 8 exponent and
/// 7 mantissa bits.
pub fn f32_to_bf16(x: f32) -> u16 {
    let reduced = reduce_precision_f32(x, BFLOAT16_EXPONENT_BITS, BFLOAT16_MANTISSA_BITS, true);
    (reduced.to_bits() >> 16) as u16
}

/// Widens pseudo-bfloat16 bits into the high half of an `f32`.
pub fn bf16_to_f32(bits: u16) -> f32 {
    f32::from_bits((bits as u32) << 16)
}
