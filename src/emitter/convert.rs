//! Element type conversion (`convert`) and bit reinterpretation
//! (`bitcast-convert`).
//!
//! Conversions to `Pred` test for nonzero; floats compare unordered, so NaN
//! converts to `true`. Pseudo-bfloat16 always goes through `f32`. Float to
//! integer conversion saturates and maps NaN to zero.

use half::f16;
use num::complex::Complex;

use crate::error::{invalid_argument, unimplemented, Result};
use crate::math::integer;
use crate::math::reduce_precision::f32_to_bf16;
use crate::shape::PrimitiveType;
use crate::value::Value;

/// Converts `value` to `to_type`.
pub fn convert_value(value: Value, to_type: PrimitiveType) -> Result<Value> {
    let from_type = value.element_type();
    if from_type == to_type {
        return Ok(value);
    }
    if from_type.is_integral() || from_type == PrimitiveType::Pred {
        convert_integer(value, to_type)
    } else if from_type.is_floating_point() {
        convert_float(value, to_type)
    } else {
        convert_complex(value, to_type)
    }
}

fn convert_integer(value: Value, to_type: PrimitiveType) -> Result<Value> {
    let from_type = value.element_type();
    let bits = value.int_bits();
    if to_type == PrimitiveType::Pred {
        return Ok(Value::Pred(integer::truncate(bits, from_type.bit_width()) != 0));
    }
    if to_type.is_integral() {
        let bits = if from_type.is_signed_integral() {
            integer::sext_or_trunc(bits, from_type.bit_width(), to_type.bit_width())
        } else {
            integer::truncate(bits, from_type.bit_width())
        };
        return Ok(Value::from_raw_bits(to_type, bits));
    }
    // Signed sources convert as signed; unsigned and Pred as unsigned.
    let wide = value.as_i128().unwrap_or_default();
    match to_type {
        PrimitiveType::F16 => Ok(Value::F16(f16::from_f64(wide as f64))),
        PrimitiveType::BF16 => Ok(Value::BF16(f32_to_bf16(wide as f32))),
        PrimitiveType::F32 => Ok(Value::F32(wide as f32)),
        PrimitiveType::F64 => Ok(Value::F64(wide as f64)),
        PrimitiveType::C64 => Ok(Value::C64(Complex::new(wide as f32, 0.0))),
        PrimitiveType::C128 => Ok(Value::C128(Complex::new(wide as f64, 0.0))),
        _ => Err(unimplemented(format!(
            "conversion from primitive type {from_type} to {to_type}"
        ))),
    }
}

fn convert_float(value: Value, to_type: PrimitiveType) -> Result<Value> {
    // Widening f16/bf16/f32 into f64 is exact, so one path serves every source.
    let x = value.as_f64().unwrap_or(f64::NAN);
    let converted = match to_type {
        PrimitiveType::Pred => Value::Pred(x != 0.0),
        PrimitiveType::F16 => Value::F16(f16::from_f64(x)),
        PrimitiveType::BF16 => Value::BF16(f32_to_bf16(x as f32)),
        PrimitiveType::F32 => Value::F32(x as f32),
        PrimitiveType::F64 => Value::F64(x),
        PrimitiveType::S8 => Value::S8(x as i8),
        PrimitiveType::S16 => Value::S16(x as i16),
        PrimitiveType::S32 => Value::S32(x as i32),
        PrimitiveType::S64 => Value::S64(x as i64),
        PrimitiveType::U8 => Value::U8(x as u8),
        PrimitiveType::U16 => Value::U16(x as u16),
        PrimitiveType::U32 => Value::U32(x as u32),
        PrimitiveType::U64 => Value::U64(x as u64),
        PrimitiveType::C64 => Value::C64(Complex::new(x as f32, 0.0)),
        PrimitiveType::C128 => Value::C128(Complex::new(x, 0.0)),
    };
    Ok(converted)
}

fn convert_complex(value: Value, to_type: PrimitiveType) -> Result<Value> {
    match (value, to_type) {
        (Value::C64(z), PrimitiveType::C128) => {
            Ok(Value::C128(Complex::new(z.re as f64, z.im as f64)))
        }
        (Value::C128(z), PrimitiveType::C64) => {
            Ok(Value::C64(Complex::new(z.re as f32, z.im as f32)))
        }
        _ => Err(unimplemented(format!(
            "conversion from primitive type {} to {to_type}",
            value.element_type()
        ))),
    }
}

/// Reinterprets the bits of `value` as `to_type`, which must have the same
/// bit width.
pub fn bitcast_convert_value(value: Value, to_type: PrimitiveType) -> Result<Value> {
    let from_type = value.element_type();
    if from_type == to_type {
        return Ok(value);
    }
    if from_type.is_complex() || to_type.is_complex() {
        return Err(unimplemented(format!(
            "bitcast conversion from primitive type {from_type} to {to_type}"
        )));
    }
    if from_type.bit_width() != to_type.bit_width() {
        return Err(invalid_argument(format!(
            "bitcast conversion from primitive type {from_type} to {to_type} with unequal \
             bit-widths ({} versus {})",
            from_type.bit_width(),
            to_type.bit_width()
        )));
    }
    let bits = value.raw_bits().unwrap_or_default();
    Ok(Value::from_raw_bits(to_type, bits))
}
