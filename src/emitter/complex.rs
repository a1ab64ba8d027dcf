//! Complex operators, each written out on the real and imaginary parts.
//!
//! For `z = a + bi`:
//!
//! * `log(z) = 0.5 * ln(a^2 + b^2) + atan2(b, a) i`
//! * `exp(z) = e^a cos(b) + e^a sin(b) i`
//! * `cos(z) = cos(a) cosh(b) - sin(a) sinh(b) i`
//! * `sin(z) = sin(a) cosh(b) + cos(a) sinh(b) i`
//! * `tanh(z)` is the quotient of the `sinh` and `cosh` expansions, multiplied
//!   through by the conjugate of the denominator
//! * `z^w` for `w = c + di` is
//!   `(a^2+b^2)^(c/2) e^(-d arg z) (cos q + sin q i)` with
//!   `q = c arg z + (d/2) ln(a^2 + b^2)`
//!
//! Division by zero divides each lhs component by zero, giving signed
//! infinities or NaN.

use num::complex::Complex;
use num::Float;

use crate::emitter::binary::comparison_direction;
use crate::emitter::convert::convert_value;
use crate::emitter::ElementalIrEmitter;
use crate::error::{unimplemented, Result};
use crate::hlo::{HloInstruction, HloOpcode};
use crate::math::integer::ComparisonDirection;
use crate::math::float::constant;
use crate::math::TargetMath;
use crate::value::Value;

/// Result of a complex operator: complex, a real component, or a comparison.
enum ComplexResult<T> {
    Complex(Complex<T>),
    Real(T),
    Pred(bool),
}

fn to_value_c64(result: ComplexResult<f32>) -> Value {
    match result {
        ComplexResult::Complex(z) => Value::C64(z),
        ComplexResult::Real(x) => Value::F32(x),
        ComplexResult::Pred(p) => Value::Pred(p),
    }
}

fn to_value_c128(result: ComplexResult<f64>) -> Value {
    match result {
        ComplexResult::Complex(z) => Value::C128(z),
        ComplexResult::Real(x) => Value::F64(x),
        ComplexResult::Pred(p) => Value::Pred(p),
    }
}

impl<M: TargetMath> ElementalIrEmitter<M> {
    pub fn emit_complex_unary_op(&self, op: &HloInstruction, operand_value: Value) -> Result<Value> {
        if op.opcode() == HloOpcode::Convert {
            return convert_value(operand_value, op.shape().element_type());
        }
        match operand_value {
            Value::C64(z) => Ok(to_value_c64(self.complex_unary(op.opcode(), z)?)),
            Value::C128(z) => Ok(to_value_c128(self.complex_unary(op.opcode(), z)?)),
            other => panic!(
                "{} expects a complex operand, found {}",
                op.name(),
                other.element_type()
            ),
        }
    }

    fn complex_unary<T: Float>(&self, opcode: HloOpcode, z: Complex<T>) -> Result<ComplexResult<T>> {
        let math = self.math();
        let (a, b) = (z.re, z.im);
        let one_half: T = constant(0.5);
        let result = match opcode {
            HloOpcode::Log => {
                let sum_sq = a * a + b * b;
                let log_sum_sq = math.log(sum_sq)?;
                let angle = math.atan2(b, a)?;
                Complex::new(one_half * log_sum_sq, angle)
            }
            HloOpcode::Log1p => {
                let a_plus_one = a + T::one();
                let sum_sq = a_plus_one * a_plus_one + b * b;
                let log_sum_sq = math.log(sum_sq)?;
                let angle = math.atan2(b, a_plus_one)?;
                Complex::new(one_half * log_sum_sq, angle)
            }
            HloOpcode::Exp => {
                let exp_a = math.exp(a)?;
                let cos_b = math.cos(b)?;
                let sin_b = math.sin(b)?;
                Complex::new(exp_a * cos_b, exp_a * sin_b)
            }
            HloOpcode::Expm1 => {
                let exp_a = math.exp(a)?;
                let cos_b = math.cos(b)?;
                let sin_b = math.sin(b)?;
                Complex::new(exp_a * cos_b - T::one(), exp_a * sin_b)
            }
            HloOpcode::Cos => {
                let exp_b = math.exp(b)?;
                let half_exp_b = one_half * exp_b;
                let half_exp_neg_b = one_half / exp_b;
                let cos_a = math.cos(a)?;
                let sin_a = math.sin(a)?;
                Complex::new(
                    cos_a * (half_exp_neg_b + half_exp_b),
                    sin_a * (half_exp_neg_b - half_exp_b),
                )
            }
            HloOpcode::Sin => {
                let exp_b = math.exp(b)?;
                let half_exp_b = one_half * exp_b;
                let half_exp_neg_b = one_half / exp_b;
                let cos_a = math.cos(a)?;
                let sin_a = math.sin(a)?;
                Complex::new(
                    sin_a * (half_exp_b + half_exp_neg_b),
                    cos_a * (half_exp_b - half_exp_neg_b),
                )
            }
            HloOpcode::Tanh => {
                let exp_a = math.exp(a)?;
                let cos_b = math.cos(b)?;
                let sin_b = math.sin(b)?;
                let exp_neg_a = T::one() / exp_a;
                let exp_2a_minus_exp_neg_2a = exp_a * exp_a - exp_neg_a * exp_neg_a;
                let cos_b_sq = cos_b * cos_b;
                let sin_b_sq = sin_b * sin_b;
                let real_num = cos_b_sq * exp_2a_minus_exp_neg_2a + sin_b_sq * exp_2a_minus_exp_neg_2a;
                let cos_b_sin_b = cos_b * sin_b;
                let sum = exp_a + exp_neg_a;
                let sum_sq = sum * sum;
                let difference = exp_a - exp_neg_a;
                let difference_sq = difference * difference;
                let imag_num = cos_b_sin_b * (sum_sq - difference_sq);
                let denom = cos_b_sq * sum_sq + sin_b_sq * difference_sq;
                Complex::new(real_num / denom, imag_num / denom)
            }
            HloOpcode::Abs => {
                return Ok(ComplexResult::Real(math.sqrt(a * a + b * b)?));
            }
            HloOpcode::Sign => {
                let abs = math.sqrt(a * a + b * b)?;
                if abs == T::zero() {
                    Complex::new(T::zero(), T::zero())
                } else {
                    Complex::new(a / abs, b / abs)
                }
            }
            HloOpcode::Negate => Complex::new(-a, -b),
            HloOpcode::Real => return Ok(ComplexResult::Real(a)),
            HloOpcode::Imag => return Ok(ComplexResult::Real(b)),
            _ => return Err(unimplemented(format!("unary complex op '{opcode}'"))),
        };
        Ok(ComplexResult::Complex(result))
    }

    pub fn emit_complex_binary_op(
        &self,
        op: &HloInstruction,
        lhs_value: Value,
        rhs_value: Value,
    ) -> Result<Value> {
        match (lhs_value, rhs_value) {
            (Value::C64(l), Value::C64(r)) => Ok(to_value_c64(self.complex_binary(op.opcode(), l, r)?)),
            (Value::C128(l), Value::C128(r)) => {
                Ok(to_value_c128(self.complex_binary(op.opcode(), l, r)?))
            }
            _ => panic!(
                "{} expects complex operands of one type, found {} and {}",
                op.name(),
                lhs_value.element_type(),
                rhs_value.element_type()
            ),
        }
    }

    fn complex_binary<T: Float>(
        &self,
        opcode: HloOpcode,
        lhs: Complex<T>,
        rhs: Complex<T>,
    ) -> Result<ComplexResult<T>> {
        let result = match opcode {
            HloOpcode::Add => Complex::new(lhs.re + rhs.re, lhs.im + rhs.im),
            HloOpcode::Subtract => Complex::new(lhs.re - rhs.re, lhs.im - rhs.im),
            HloOpcode::Multiply => Complex::new(
                lhs.re * rhs.re - lhs.im * rhs.im,
                lhs.re * rhs.im + lhs.im * rhs.re,
            ),
            HloOpcode::Divide => {
                let rhs_sum_sq = rhs.re * rhs.re + rhs.im * rhs.im;
                let zero = T::zero();
                if rhs_sum_sq == zero {
                    Complex::new(lhs.re / zero, lhs.im / zero)
                } else {
                    Complex::new(
                        (lhs.re * rhs.re + lhs.im * rhs.im) / rhs_sum_sq,
                        (lhs.im * rhs.re - lhs.re * rhs.im) / rhs_sum_sq,
                    )
                }
            }
            HloOpcode::Power => self.complex_power(lhs, rhs)?,
            _ => {
                let truth = match comparison_direction(opcode) {
                    // Both parts ordered-equal.
                    Some(ComparisonDirection::Eq) => lhs.re == rhs.re && lhs.im == rhs.im,
                    // Either part unordered-not-equal.
                    Some(ComparisonDirection::Ne) => lhs.re != rhs.re || lhs.im != rhs.im,
                    _ => return Err(unimplemented(format!("binary complex op '{opcode}'"))),
                };
                return Ok(ComplexResult::Pred(truth));
            }
        };
        Ok(ComplexResult::Complex(result))
    }

    fn complex_power<T: Float>(&self, lhs: Complex<T>, rhs: Complex<T>) -> Result<Complex<T>> {
        let math = self.math();
        let (a, b, c, d) = (lhs.re, lhs.im, rhs.re, rhs.im);
        let one_half: T = constant(0.5);
        let aa_p_bb = a * a + b * b;
        let aa_p_bb_to_half_c = math.pow(aa_p_bb, one_half * c)?;
        let arg_lhs = math.atan2(b, a)?;
        let e_to_neg_d_arg_lhs = math.exp(-d * arg_lhs)?;
        let coeff = aa_p_bb_to_half_c * e_to_neg_d_arg_lhs;
        let ln_aa_p_bb = math.log(aa_p_bb)?;
        let q = c * arg_lhs + one_half * d * ln_aa_p_bb;
        let cos_q = math.cos(q)?;
        let sin_q = math.sin(q)?;
        Ok(Complex::new(coeff * cos_q, coeff * sin_q))
    }
}
