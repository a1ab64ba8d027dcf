//! Fixed-width integer arithmetic with defined overflow behavior.
//!
//! Every operation works on a raw bit pattern (`u64`) plus a bit width and a
//! signedness flag, so all integer element types share one implementation.
//! Results are always truncated to `width` bits.
//!
//! Division and remainder never trap:
//!
//! * `x / 0 == -1` (all ones) and `x % 0 == x`
//! * `INT_MIN / -1 == INT_MIN` and `INT_MIN % -1 == 0` for signed types
//!
//! Shifts by `width` or more saturate to zero, or to the sign fill for
//! arithmetic right shifts.

/// Comparison direction for integer and float comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonDirection {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

/// Mask with the low `width` bits set.
#[inline]
pub fn mask(width: u32) -> u64 {
    debug_assert!((1..=64).contains(&width));
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

#[inline]
pub fn truncate(bits: u64, width: u32) -> u64 {
    bits & mask(width)
}

/// Interprets the low `width` bits as a two's complement number.
#[inline]
pub fn sign_extend(bits: u64, width: u32) -> i64 {
    let shift = 64 - width;
    ((bits << shift) as i64) >> shift
}

/// Sign-extends or truncates `bits` from `from_width` to `to_width`.
#[inline]
pub fn sext_or_trunc(bits: u64, from_width: u32, to_width: u32) -> u64 {
    truncate(sign_extend(bits, from_width) as u64, to_width)
}

/// Bit pattern of the most negative signed value.
#[inline]
pub fn signed_min(width: u32) -> u64 {
    1u64 << (width - 1)
}

#[inline]
fn is_int_min_division_overflow(lhs: u64, rhs: u64, width: u32) -> bool {
    truncate(lhs, width) == signed_min(width) && truncate(rhs, width) == mask(width)
}

pub fn add(lhs: u64, rhs: u64, width: u32) -> u64 {
    truncate(lhs.wrapping_add(rhs), width)
}

pub fn subtract(lhs: u64, rhs: u64, width: u32) -> u64 {
    truncate(lhs.wrapping_sub(rhs), width)
}

pub fn multiply(lhs: u64, rhs: u64, width: u32) -> u64 {
    truncate(lhs.wrapping_mul(rhs), width)
}

pub fn negate(x: u64, width: u32) -> u64 {
    truncate(x.wrapping_neg(), width)
}

/// Division with the non-trapping overflow rules above.
pub fn divide(lhs: u64, rhs: u64, width: u32, is_signed: bool) -> u64 {
    let lhs = truncate(lhs, width);
    let rhs = truncate(rhs, width);
    let has_zero_divisor = rhs == 0;

    if !is_signed {
        let safe_rhs = if has_zero_divisor { 1 } else { rhs };
        let safe_div = lhs / safe_rhs;
        return if has_zero_divisor { mask(width) } else { safe_div };
    }

    let has_int_min_overflow = is_int_min_division_overflow(lhs, rhs, width);
    let unsafe_divisor = has_zero_divisor || has_int_min_overflow;
    let safe_rhs = if unsafe_divisor { 1 } else { sign_extend(rhs, width) };
    let safe_div = truncate((sign_extend(lhs, width) / safe_rhs) as u64, width);

    if has_zero_divisor {
        mask(width)
    } else if has_int_min_overflow {
        signed_min(width)
    } else {
        safe_div
    }
}

/// Remainder with the non-trapping overflow rules above. The sign of a signed
/// result follows the dividend.
pub fn remainder(lhs: u64, rhs: u64, width: u32, is_signed: bool) -> u64 {
    let lhs = truncate(lhs, width);
    let rhs = truncate(rhs, width);
    let has_zero_divisor = rhs == 0;

    if !is_signed {
        let safe_rhs = if has_zero_divisor { 1 } else { rhs };
        let safe_rem = lhs % safe_rhs;
        return if has_zero_divisor { lhs } else { safe_rem };
    }

    let has_int_min_overflow = is_int_min_division_overflow(lhs, rhs, width);
    let unsafe_divisor = has_zero_divisor || has_int_min_overflow;
    let safe_rhs = if unsafe_divisor { 1 } else { sign_extend(rhs, width) };
    let safe_rem = truncate((sign_extend(lhs, width) % safe_rhs) as u64, width);

    if has_zero_divisor {
        lhs
    } else if has_int_min_overflow {
        0
    } else {
        safe_rem
    }
}

#[inline]
fn shift_amount_in_range(rhs: u64, width: u32) -> bool {
    truncate(rhs, width) < width as u64
}

pub fn shift_left(lhs: u64, rhs: u64, width: u32) -> u64 {
    if !shift_amount_in_range(rhs, width) {
        return 0;
    }
    truncate(lhs << truncate(rhs, width), width)
}

pub fn shift_right_logical(lhs: u64, rhs: u64, width: u32) -> u64 {
    if !shift_amount_in_range(rhs, width) {
        return 0;
    }
    truncate(lhs, width) >> truncate(rhs, width)
}

pub fn shift_right_arithmetic(lhs: u64, rhs: u64, width: u32) -> u64 {
    let value = sign_extend(lhs, width);
    if !shift_amount_in_range(rhs, width) {
        return if value < 0 { mask(width) } else { 0 };
    }
    truncate((value >> truncate(rhs, width)) as u64, width)
}

pub fn compare(direction: ComparisonDirection, lhs: u64, rhs: u64, width: u32, is_signed: bool) -> bool {
    let ordering = if is_signed {
        sign_extend(lhs, width).cmp(&sign_extend(rhs, width))
    } else {
        truncate(lhs, width).cmp(&truncate(rhs, width))
    };
    match direction {
        ComparisonDirection::Eq => ordering.is_eq(),
        ComparisonDirection::Ne => ordering.is_ne(),
        ComparisonDirection::Lt => ordering.is_lt(),
        ComparisonDirection::Gt => ordering.is_gt(),
        ComparisonDirection::Le => ordering.is_le(),
        ComparisonDirection::Ge => ordering.is_ge(),
    }
}

pub fn max(lhs: u64, rhs: u64, width: u32, is_signed: bool) -> u64 {
    if compare(ComparisonDirection::Ge, lhs, rhs, width, is_signed) {
        truncate(lhs, width)
    } else {
        truncate(rhs, width)
    }
}

pub fn min(lhs: u64, rhs: u64, width: u32, is_signed: bool) -> u64 {
    if compare(ComparisonDirection::Le, lhs, rhs, width, is_signed) {
        truncate(lhs, width)
    } else {
        truncate(rhs, width)
    }
}

/// `min(hi, max(lo, x))` under the given signedness.
pub fn clamp(lo: u64, x: u64, hi: u64, width: u32, is_signed: bool) -> u64 {
    min(hi, max(lo, x, width, is_signed), width, is_signed)
}

/// Leading zero count; `width` for zero.
pub fn count_leading_zeros(x: u64, width: u32) -> u64 {
    let x = truncate(x, width);
    (x.leading_zeros() - (64 - width)) as u64
}

/// -1, 0 or 1 for signed types; 0 or 1 for unsigned types.
pub fn sign(x: u64, width: u32, is_signed: bool) -> u64 {
    let x = truncate(x, width);
    if x == 0 {
        0
    } else if is_signed {
        shift_right_arithmetic(x, (width - 1) as u64, width) | 1
    } else {
        1
    }
}

/// Absolute value; identity for unsigned types and wraps for `INT_MIN`.
pub fn abs(x: u64, width: u32, is_signed: bool) -> u64 {
    if is_signed && sign_extend(x, width) < 0 {
        negate(x, width)
    } else {
        truncate(x, width)
    }
}
