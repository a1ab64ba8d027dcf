//! Binary operators on integer, predicate and floating-point elements.
//!
//! Float comparisons are ordered except not-equal, which is unordered: any
//! comparison involving NaN is false except `!=`, which is true.

use num::complex::Complex;
use num::Float;

use crate::emitter::ElementalIrEmitter;
use crate::error::{unimplemented, Result};
use crate::hlo::{HloInstruction, HloOpcode};
use crate::math::float::{float_max, float_min};
use crate::math::integer::{self, ComparisonDirection};
use crate::math::TargetMath;
use crate::shape::PrimitiveType;
use crate::value::{Value, WideFloat};

/// Direction of a comparison opcode.
pub(crate) fn comparison_direction(opcode: HloOpcode) -> Option<ComparisonDirection> {
    match opcode {
        HloOpcode::Eq => Some(ComparisonDirection::Eq),
        HloOpcode::Ne => Some(ComparisonDirection::Ne),
        HloOpcode::Lt => Some(ComparisonDirection::Lt),
        HloOpcode::Gt => Some(ComparisonDirection::Gt),
        HloOpcode::Le => Some(ComparisonDirection::Le),
        HloOpcode::Ge => Some(ComparisonDirection::Ge),
        _ => None,
    }
}

/// Float comparison; ordered for every direction but `Ne`.
pub(crate) fn float_compare<T: Float>(direction: ComparisonDirection, lhs: T, rhs: T) -> bool {
    match direction {
        ComparisonDirection::Eq => lhs == rhs,
        ComparisonDirection::Ne => lhs != rhs,
        ComparisonDirection::Lt => lhs < rhs,
        ComparisonDirection::Gt => lhs > rhs,
        ComparisonDirection::Le => lhs <= rhs,
        ComparisonDirection::Ge => lhs >= rhs,
    }
}

impl<M: TargetMath> ElementalIrEmitter<M> {
    /// Applies the binary operator of `op` to one pair of operand elements.
    pub fn emit_binary_op(&self, op: &HloInstruction, lhs_value: Value, rhs_value: Value) -> Result<Value> {
        let operand_type = op.operand(0).shape().element_type();
        if operand_type.is_integral() || operand_type == PrimitiveType::Pred {
            self.emit_integer_binary_op(
                op,
                lhs_value,
                rhs_value,
                operand_type.is_signed_integral(),
            )
        } else if operand_type.is_complex() {
            self.emit_complex_binary_op(op, lhs_value, rhs_value)
        } else {
            self.emit_float_binary_op(op, lhs_value, rhs_value)
        }
    }

    pub fn emit_integer_binary_op(
        &self,
        op: &HloInstruction,
        lhs_value: Value,
        rhs_value: Value,
        is_signed: bool,
    ) -> Result<Value> {
        let ty = lhs_value.element_type();
        let width = ty.bit_width();
        let (lhs, rhs) = (lhs_value.int_bits(), rhs_value.int_bits());
        if let Some(direction) = comparison_direction(op.opcode()) {
            return Ok(Value::Pred(integer::compare(
                direction, lhs, rhs, width, is_signed,
            )));
        }
        let result = match op.opcode() {
            HloOpcode::Add => integer::add(lhs, rhs, width),
            HloOpcode::Subtract => integer::subtract(lhs, rhs, width),
            HloOpcode::Multiply => integer::multiply(lhs, rhs, width),
            HloOpcode::Divide => integer::divide(lhs, rhs, width, is_signed),
            HloOpcode::Remainder => integer::remainder(lhs, rhs, width, is_signed),
            HloOpcode::Minimum => integer::min(lhs, rhs, width, is_signed),
            HloOpcode::Maximum => integer::max(lhs, rhs, width, is_signed),
            HloOpcode::And => lhs & rhs,
            HloOpcode::Or => lhs | rhs,
            HloOpcode::Xor => lhs ^ rhs,
            HloOpcode::ShiftLeft => integer::shift_left(lhs, rhs, width),
            HloOpcode::ShiftRightLogical => integer::shift_right_logical(lhs, rhs, width),
            HloOpcode::ShiftRightArithmetic => integer::shift_right_arithmetic(lhs, rhs, width),
            opcode => {
                return Err(unimplemented(format!("binary integer op '{opcode}'")));
            }
        };
        Ok(Value::from_raw_bits(ty, result))
    }

    pub fn emit_float_binary_op(
        &self,
        op: &HloInstruction,
        lhs_value: Value,
        rhs_value: Value,
    ) -> Result<Value> {
        let (lhs, rhs) = match (lhs_value.widen_float(), rhs_value.widen_float()) {
            (Some(lhs), Some(rhs)) => (lhs, rhs),
            _ => panic!(
                "{} expects floating-point operands, found {} and {}",
                op.name(),
                lhs_value.element_type(),
                rhs_value.element_type()
            ),
        };
        let ty = op.shape().element_type();
        match (lhs, rhs) {
            (WideFloat::F32(l), WideFloat::F32(r)) => match op.opcode() {
                HloOpcode::Complex => Ok(Value::C64(Complex::new(l, r))),
                opcode => match comparison_direction(opcode) {
                    Some(direction) => Ok(Value::Pred(float_compare(direction, l, r))),
                    None => Ok(Value::from_wide(ty, WideFloat::F32(self.float_binary(opcode, l, r)?))),
                },
            },
            (WideFloat::F64(l), WideFloat::F64(r)) => match op.opcode() {
                HloOpcode::Complex => Ok(Value::C128(Complex::new(l, r))),
                opcode => match comparison_direction(opcode) {
                    Some(direction) => Ok(Value::Pred(float_compare(direction, l, r))),
                    None => Ok(Value::from_wide(ty, WideFloat::F64(self.float_binary(opcode, l, r)?))),
                },
            },
            _ => panic!(
                "{} has operands of different widths: {} and {}",
                op.name(),
                lhs_value.element_type(),
                rhs_value.element_type()
            ),
        }
    }

    fn float_binary<T: Float>(&self, opcode: HloOpcode, lhs: T, rhs: T) -> Result<T> {
        match opcode {
            HloOpcode::Add => Ok(lhs + rhs),
            HloOpcode::Subtract => Ok(lhs - rhs),
            HloOpcode::Multiply => Ok(lhs * rhs),
            HloOpcode::Divide => Ok(lhs / rhs),
            // fmod: the result takes the sign of the dividend.
            HloOpcode::Remainder => Ok(lhs % rhs),
            HloOpcode::Maximum => Ok(float_max(lhs, rhs, self.no_nans())),
            HloOpcode::Minimum => Ok(float_min(lhs, rhs, self.no_nans())),
            HloOpcode::Power => self.math().pow(lhs, rhs),
            HloOpcode::Atan2 => self.math().atan2(lhs, rhs),
            _ => Err(unimplemented(format!("binary floating point op '{opcode}'"))),
        }
    }
}
