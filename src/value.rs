//! Typed scalar values produced and consumed by element generators.
//!
//! A [`Value`] is the bit pattern of one element together with its element
//! type. Integers of every width share one arithmetic path through their raw
//! bits (see [`crate::math::integer`]); 16-bit floats are widened to `f32`
//! for arithmetic and narrowed back afterwards.

use half::f16;
use num::complex::Complex;

use crate::math::reduce_precision::{bf16_to_f32, f32_to_bf16};
use crate::math::integer;
use crate::shape::PrimitiveType;

/// One element of an array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Pred(bool),
    S8(i8),
    S16(i16),
    S32(i32),
    S64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F16(f16),
    /// Raw pseudo-bfloat16 bits: the top half of an `f32`.
    BF16(u16),
    F32(f32),
    F64(f64),
    C64(Complex<f32>),
    C128(Complex<f64>),
}

/// A floating-point value in the width arithmetic is carried out in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum WideFloat {
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn element_type(&self) -> PrimitiveType {
        match self {
            Value::Pred(_) => PrimitiveType::Pred,
            Value::S8(_) => PrimitiveType::S8,
            Value::S16(_) => PrimitiveType::S16,
            Value::S32(_) => PrimitiveType::S32,
            Value::S64(_) => PrimitiveType::S64,
            Value::U8(_) => PrimitiveType::U8,
            Value::U16(_) => PrimitiveType::U16,
            Value::U32(_) => PrimitiveType::U32,
            Value::U64(_) => PrimitiveType::U64,
            Value::F16(_) => PrimitiveType::F16,
            Value::BF16(_) => PrimitiveType::BF16,
            Value::F32(_) => PrimitiveType::F32,
            Value::F64(_) => PrimitiveType::F64,
            Value::C64(_) => PrimitiveType::C64,
            Value::C128(_) => PrimitiveType::C128,
        }
    }

    /// The all-zero value of `ty`.
    pub fn zero(ty: PrimitiveType) -> Value {
        match ty {
            PrimitiveType::C64 => Value::C64(Complex::new(0.0, 0.0)),
            PrimitiveType::C128 => Value::C128(Complex::new(0.0, 0.0)),
            other => Value::from_raw_bits(other, 0),
        }
    }

    /// Builds a value of a non-complex type from its raw bit pattern.
    /// Bits above the type's width are discarded. `Pred` is an 8-bit
    /// integer underneath, so any nonzero low byte reads as true.
    ///
    /// # Panics
    ///
    /// Panics if `ty` is complex.
    pub fn from_raw_bits(ty: PrimitiveType, bits: u64) -> Value {
        match ty {
            PrimitiveType::Pred => Value::Pred(bits as u8 != 0),
            PrimitiveType::S8 => Value::S8(bits as u8 as i8),
            PrimitiveType::S16 => Value::S16(bits as u16 as i16),
            PrimitiveType::S32 => Value::S32(bits as u32 as i32),
            PrimitiveType::S64 => Value::S64(bits as i64),
            PrimitiveType::U8 => Value::U8(bits as u8),
            PrimitiveType::U16 => Value::U16(bits as u16),
            PrimitiveType::U32 => Value::U32(bits as u32),
            PrimitiveType::U64 => Value::U64(bits),
            PrimitiveType::F16 => Value::F16(f16::from_bits(bits as u16)),
            PrimitiveType::BF16 => Value::BF16(bits as u16),
            PrimitiveType::F32 => Value::F32(f32::from_bits(bits as u32)),
            PrimitiveType::F64 => Value::F64(f64::from_bits(bits)),
            PrimitiveType::C64 | PrimitiveType::C128 => {
                panic!("complex type {ty} has no single raw bit pattern")
            }
        }
    }

    /// Raw bit pattern, zero-extended to 64 bits. `None` for complex values.
    pub fn raw_bits(&self) -> Option<u64> {
        let bits = match *self {
            Value::Pred(b) => b as u64,
            Value::S8(v) => v as u8 as u64,
            Value::S16(v) => v as u16 as u64,
            Value::S32(v) => v as u32 as u64,
            Value::S64(v) => v as u64,
            Value::U8(v) => v as u64,
            Value::U16(v) => v as u64,
            Value::U32(v) => v as u64,
            Value::U64(v) => v,
            Value::F16(v) => v.to_bits() as u64,
            Value::BF16(v) => v as u64,
            Value::F32(v) => v.to_bits() as u64,
            Value::F64(v) => v.to_bits(),
            Value::C64(_) | Value::C128(_) => return None,
        };
        Some(bits)
    }

    /// Raw bits of an integer or predicate value.
    ///
    /// # Panics
    ///
    /// Panics on floating-point and complex values.
    pub(crate) fn int_bits(&self) -> u64 {
        match self.element_type() {
            ty if ty.is_integral() || ty == PrimitiveType::Pred => {
                self.raw_bits().unwrap_or_default()
            }
            ty => panic!("expected an integer value, found {ty}"),
        }
    }

    /// Integer value interpreted by its own signedness.
    pub fn as_i128(&self) -> Option<i128> {
        let ty = self.element_type();
        if ty.is_signed_integral() {
            Some(integer::sign_extend(self.int_bits(), ty.bit_width()) as i128)
        } else if ty.is_unsigned_integral() || ty == PrimitiveType::Pred {
            Some(self.int_bits() as i128)
        } else {
            None
        }
    }

    /// Real value as `f64`, for any non-complex type.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F16(v) => Some(v.to_f64()),
            Value::BF16(v) => Some(bf16_to_f32(v) as f64),
            Value::F32(v) => Some(v as f64),
            Value::F64(v) => Some(v),
            Value::C64(_) | Value::C128(_) => None,
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    /// True when the low bit of a predicate or integer is set.
    pub fn truth_bit(&self) -> bool {
        self.int_bits() & 1 != 0
    }

    /// Bitwise equality, so NaN payloads compare equal to themselves.
    pub fn bits_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::C64(a), Value::C64(b)) => {
                a.re.to_bits() == b.re.to_bits() && a.im.to_bits() == b.im.to_bits()
            }
            (Value::C128(a), Value::C128(b)) => {
                a.re.to_bits() == b.re.to_bits() && a.im.to_bits() == b.im.to_bits()
            }
            _ => self.element_type() == other.element_type() && self.raw_bits() == other.raw_bits(),
        }
    }

    /// Widens a float to the type arithmetic runs in. `None` for other types.
    pub(crate) fn widen_float(&self) -> Option<WideFloat> {
        match *self {
            Value::F16(v) => Some(WideFloat::F32(v.to_f32())),
            Value::BF16(v) => Some(WideFloat::F32(bf16_to_f32(v))),
            Value::F32(v) => Some(WideFloat::F32(v)),
            Value::F64(v) => Some(WideFloat::F64(v)),
            _ => None,
        }
    }

    /// Narrows an `f32` result into a float type no wider than 32 bits.
    ///
    /// # Panics
    ///
    /// Panics if `ty` is not F16, BF16 or F32.
    pub(crate) fn narrow_f32(ty: PrimitiveType, x: f32) -> Value {
        match ty {
            PrimitiveType::F16 => Value::F16(f16::from_f32(x)),
            PrimitiveType::BF16 => Value::BF16(f32_to_bf16(x)),
            PrimitiveType::F32 => Value::F32(x),
            other => panic!("cannot narrow f32 into {other}"),
        }
    }

    /// Converts a widened float back into `ty`, which must be a real float type.
    pub(crate) fn from_wide(ty: PrimitiveType, x: WideFloat) -> Value {
        match (ty, x) {
            (PrimitiveType::F64, WideFloat::F64(v)) => Value::F64(v),
            (PrimitiveType::F64, WideFloat::F32(v)) => Value::F64(v as f64),
            (_, WideFloat::F32(v)) => Value::narrow_f32(ty, v),
            (_, WideFloat::F64(v)) => Value::narrow_f32(ty, v as f32),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Pred(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::S32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::S64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<Complex<f32>> for Value {
    fn from(v: Complex<f32>) -> Self {
        Value::C64(v)
    }
}

impl From<Complex<f64>> for Value {
    fn from(v: Complex<f64>) -> Self {
        Value::C128(v)
    }
}
