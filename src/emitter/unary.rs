//! Unary operators on integer, predicate and floating-point elements.

use num::Float;

use crate::emitter::convert::{bitcast_convert_value, convert_value};
use crate::emitter::ElementalIrEmitter;
use crate::error::{unimplemented, Result};
use crate::hlo::{HloInstruction, HloOpcode};
use crate::math::float::{constant, expm1, log1p};
use crate::math::{integer, TargetMath};
use crate::shape::PrimitiveType;
use crate::value::{Value, WideFloat};

impl<M: TargetMath> ElementalIrEmitter<M> {
    /// Applies the unary operator of `op` to one operand element.
    pub fn emit_unary_op(&self, op: &HloInstruction, operand_value: Value) -> Result<Value> {
        let operand_type = op.operand(0).shape().element_type();
        if op.opcode() == HloOpcode::Copy {
            Ok(operand_value)
        } else if operand_type.is_integral() || operand_type == PrimitiveType::Pred {
            self.emit_integer_unary_op(op, operand_value)
        } else if operand_type.is_complex() {
            self.emit_complex_unary_op(op, operand_value)
        } else {
            self.emit_float_unary_op(op, operand_value)
        }
    }

    pub fn emit_integer_unary_op(&self, op: &HloInstruction, operand_value: Value) -> Result<Value> {
        let ty = op.shape().element_type();
        let width = ty.bit_width();
        let bits = || operand_value.int_bits();
        let result = match op.opcode() {
            HloOpcode::Convert => return convert_value(operand_value, ty),
            HloOpcode::BitcastConvert => return bitcast_convert_value(operand_value, ty),
            HloOpcode::Abs => integer::abs(bits(), width, ty.is_signed_integral()),
            HloOpcode::Clz => integer::count_leading_zeros(bits(), width),
            HloOpcode::Sign => integer::sign(bits(), width, ty.is_signed_integral()),
            HloOpcode::Negate => integer::negate(bits(), width),
            HloOpcode::Not => {
                if ty == PrimitiveType::Pred {
                    // Only the low bit of a predicate carries its truth value.
                    return Ok(Value::Pred(!operand_value.truth_bit()));
                } else if ty.is_integral() {
                    !bits()
                } else {
                    return Err(unimplemented(format!(
                        "unary op Not is not defined for type '{ty}'"
                    )));
                }
            }
            opcode => {
                return Err(unimplemented(format!("unary integer op '{opcode}'")));
            }
        };
        Ok(Value::from_raw_bits(ty, result))
    }

    pub fn emit_float_unary_op(&self, op: &HloInstruction, operand_value: Value) -> Result<Value> {
        let ty = op.shape().element_type();
        match op.opcode() {
            HloOpcode::Convert => return convert_value(operand_value, ty),
            HloOpcode::BitcastConvert => return bitcast_convert_value(operand_value, ty),
            _ => {}
        }
        let Some(x) = operand_value.widen_float() else {
            panic!(
                "{} expects a floating-point operand, found {}",
                op.name(),
                operand_value.element_type()
            );
        };
        if op.opcode() == HloOpcode::IsFinite {
            // |x| ordered-not-equal inf: false for NaN.
            let finite = match x {
                WideFloat::F32(v) => v.is_finite(),
                WideFloat::F64(v) => v.is_finite(),
            };
            return Ok(Value::Pred(finite));
        }
        let result = match x {
            WideFloat::F32(v) => WideFloat::F32(self.float_unary(op.opcode(), v)?),
            WideFloat::F64(v) => WideFloat::F64(self.float_unary(op.opcode(), v)?),
        };
        Ok(Value::from_wide(ty, result))
    }

    fn float_unary<T: Float>(&self, opcode: HloOpcode, x: T) -> Result<T> {
        let math = self.math();
        match opcode {
            HloOpcode::Exp => math.exp(x),
            HloOpcode::Expm1 => expm1(math, x),
            HloOpcode::Log => math.log(x),
            HloOpcode::Log1p => log1p(math, x),
            HloOpcode::Cos => math.cos(x),
            HloOpcode::Sin => math.sin(x),
            HloOpcode::Tanh => math.tanh(x),
            HloOpcode::Floor => Ok(x.floor()),
            HloOpcode::Ceil => Ok(x.ceil()),
            HloOpcode::Abs => Ok(x.abs()),
            // Rounds half away from zero.
            HloOpcode::RoundNearestAfz => Ok(x.round()),
            HloOpcode::Sign => {
                let zero = T::zero();
                if x == zero {
                    Ok(zero)
                } else if x < zero {
                    Ok(constant(-1.0))
                } else {
                    Ok(T::one())
                }
            }
            HloOpcode::Negate => Ok(-x),
            HloOpcode::Real => Ok(x),
            HloOpcode::Imag => Ok(T::zero()),
            _ => Err(unimplemented(format!("unary floating-point op '{opcode}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ModuleConfig;
    use crate::math::HostMath;
    use crate::module::HloModule;
    use crate::shape::Shape;

    fn unary(opcode: HloOpcode, ty: PrimitiveType, value: Value) -> Result<Value> {
        let module = Arc::new(HloModule::new("unary", ModuleConfig::default()));
        let p = module.parameter(Shape::scalar(value.element_type()));
        let op = module.unary(opcode, Shape::scalar(ty), &p);
        ElementalIrEmitter::new(module).emit_unary_op(&op, value)
    }

    #[test]
    fn test_not_on_pred_flips_truth_bit() {
        assert_eq!(
            unary(HloOpcode::Not, PrimitiveType::Pred, Value::Pred(true)).unwrap(),
            Value::Pred(false)
        );
        assert_eq!(
            unary(HloOpcode::Not, PrimitiveType::U8, Value::U8(0x0f)).unwrap(),
            Value::U8(0xf0)
        );
    }

    #[test]
    fn test_float_sign_of_zero_is_zero() {
        for (x, expected) in [(-0.0f32, 0.0f32), (0.0, 0.0), (-3.5, -1.0), (2.0, 1.0)] {
            let v = unary(HloOpcode::Sign, PrimitiveType::F32, Value::F32(x)).unwrap();
            assert_eq!(v, Value::F32(expected), "sign({x})");
        }
    }

    #[test]
    fn test_tanh_depends_on_target() {
        let err = unary(HloOpcode::Tanh, PrimitiveType::F32, Value::F32(0.5)).unwrap_err();
        assert!(err.is_unimplemented());

        let module = Arc::new(HloModule::new("host", ModuleConfig::default()));
        let p = module.parameter(Shape::scalar(PrimitiveType::F64));
        let op = module.unary_same_shape(HloOpcode::Tanh, &p);
        let host = ElementalIrEmitter::with_math(module, HostMath);
        assert_eq!(
            host.emit_unary_op(&op, Value::F64(0.5)).unwrap(),
            Value::F64(0.5f64.tanh())
        );
    }

    #[test]
    fn test_copy_passes_through() {
        let v = Value::C64(num::complex::Complex::new(1.0, 2.0));
        assert_eq!(unary(HloOpcode::Copy, PrimitiveType::C64, v).unwrap(), v);
    }
}
