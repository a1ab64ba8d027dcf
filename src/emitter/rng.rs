//! Philox-4x32-10 random number generation (Salmon et al., "Parallel random
//! numbers: as easy as 1, 2, 3", SC 2011).
//!
//! Every output element maps to one 128-bit sample and an offset within it.
//! The sample counter is the element's sample index plus the module state; the
//! key is a per-instruction value drawn from the module when the generator is
//! built. Evaluating an element touches no shared state.

use std::sync::Arc;

use tracing::debug;

use crate::emitter::{elementwise_source_index, operand_generator, ElementGenerator, ElementalIrEmitter, HloToElementGeneratorMap};
use crate::error::{invalid_argument, unimplemented, Result};
use crate::hlo::{HloInstruction, RandomDistribution};
use crate::index::{Index, IndexType};
use crate::math::float::erfc_inv_f32;
use crate::math::integer;
use crate::math::TargetMath;
use crate::shape::PrimitiveType;
use crate::value::{Value, WideFloat};

/// Weyl increment of key word 0.
pub const PHILOX_W32_A: u32 = 0x9E37_79B9;
/// Weyl increment of key word 1.
pub const PHILOX_W32_B: u32 = 0xBB67_AE85;
/// Round multiplier of counter word 0.
pub const PHILOX_M4X32_A: u32 = 0xD251_1F53;
/// Round multiplier of counter word 2.
pub const PHILOX_M4X32_B: u32 = 0xCD9E_8D57;
pub const PHILOX_ROUNDS: usize = 10;

/// Number of elements drawn from one 128-bit sample.
///
/// # Panics
///
/// Panics for element types the RNG does not produce.
pub fn elements_per_sample(ty: PrimitiveType) -> u64 {
    match ty {
        // F16 is drawn from 32 bits.
        PrimitiveType::U32 | PrimitiveType::S32 | PrimitiveType::F32 | PrimitiveType::F16 => 4,
        PrimitiveType::U64 | PrimitiveType::S64 | PrimitiveType::F64 => 2,
        other => panic!("unrecognized primitive type for RNG: {other}"),
    }
}

#[inline]
fn split_u64(v: u64) -> (u32, u32) {
    (v as u32, (v >> 32) as u32)
}

#[inline]
fn multiply_low_high(a: u32, b: u32) -> (u32, u32) {
    split_u64(a as u64 * b as u64)
}

/// Runs the ten Philox rounds over `counter` with `key`.
pub fn philox_4x32_10(mut counter: [u32; 4], mut key: [u32; 2]) -> [u32; 4] {
    for _ in 0..PHILOX_ROUNDS {
        let (lo0, hi0) = multiply_low_high(PHILOX_M4X32_A, counter[0]);
        let (lo1, hi1) = multiply_low_high(PHILOX_M4X32_B, counter[2]);
        counter = [
            hi1 ^ counter[1] ^ key[0],
            lo1,
            hi0 ^ counter[3] ^ key[1],
            lo0,
        ];
        key[0] = key[0].wrapping_add(PHILOX_W32_A);
        key[1] = key[1].wrapping_add(PHILOX_W32_B);
    }
    counter
}

/// Seeds the counter from a sample index and the module state, then mixes.
///
/// A 32-bit index type leaves counter word 1 zero.
pub fn sample_values(
    sample_index: u64,
    index_type: IndexType,
    hlo_random_value: u64,
    global_random_number: u64,
    rng_state: u64,
) -> [u32; 4] {
    let (c0, c1) = match index_type {
        IndexType::I32 => (sample_index as u32, 0),
        IndexType::I64 => split_u64(sample_index),
    };
    let (c2, c3) = split_u64(rng_state ^ global_random_number);
    let (k0, k1) = split_u64(hlo_random_value);
    philox_4x32_10([c0, c1, c2, c3], [k0, k1])
}

/// Raw random bits of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawValue {
    U32(u32),
    U64(u64),
}

impl RawValue {
    fn from_sample(sample: &[u32; 4], ty: PrimitiveType, offset: usize) -> RawValue {
        if ty.bit_width() == 64 {
            RawValue::U64(sample[2 * offset] as u64 | (sample[2 * offset + 1] as u64) << 32)
        } else {
            RawValue::U32(sample[offset])
        }
    }

    fn bits(self) -> u64 {
        match self {
            RawValue::U32(v) => v as u64,
            RawValue::U64(v) => v,
        }
    }

    /// Fixed-point fraction in `[0, 1)`, divided at the raw value's width.
    fn unit_float(self) -> WideFloat {
        match self {
            RawValue::U32(v) => WideFloat::F32(v as f32 / 4_294_967_296.0f32),
            RawValue::U64(v) => WideFloat::F64(v as f64 / 18_446_744_073_709_551_616.0f64),
        }
    }
}

impl<M: TargetMath> ElementalIrEmitter<M> {
    /// Generator for an RNG instruction.
    ///
    /// Draws the per-instruction key from the module and fixes the global seed
    /// now, so every element of the returned generator shares them.
    pub(crate) fn make_philox_rng_element_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        let module = self.module();
        let hlo_random_value = module.random_new64();
        let global_random_number = module.seed_or_global_random_value();
        let rng_state = module.rng_state();
        debug!(
            hlo = %hlo.name(),
            hlo_random_value,
            global_random_number,
            "using philox RNG"
        );

        let ty = hlo.shape().element_type();
        let elems_per_sample = elements_per_sample(ty);
        let emitter = self.clone();
        let hlo = Arc::clone(hlo);
        let a_or_mean = operand_generator(operand_to_generator, &hlo, 0);
        let b_or_sigma = operand_generator(operand_to_generator, &hlo, 1);
        Arc::new(move |index: &Index| {
            let index_type = index.index_type();
            let element_index = index_type.bits(index.linearize(hlo.shape().dimensions()));
            let sample_index = element_index / elems_per_sample;
            let offset = (element_index % elems_per_sample) as usize;

            let sample = sample_values(
                sample_index,
                index_type,
                hlo_random_value,
                global_random_number,
                rng_state,
            );
            let raw = RawValue::from_sample(&sample, ty, offset);

            let a = a_or_mean(&elementwise_source_index(index, &hlo, 0))?;
            let b = b_or_sigma(&elementwise_source_index(index, &hlo, 1))?;
            emitter.convert_to_distribution(&hlo, raw, a, b)
        })
    }

    fn convert_to_distribution(
        &self,
        hlo: &HloInstruction,
        raw: RawValue,
        a_or_mean: Value,
        b_or_sigma: Value,
    ) -> Result<Value> {
        let ty = hlo.shape().element_type();
        let distribution = hlo.random_distribution();

        if !ty.is_floating_point() {
            if distribution != RandomDistribution::Uniform {
                return Err(match distribution {
                    RandomDistribution::Invalid => {
                        invalid_argument(format!("unhandled distribution {distribution}"))
                    }
                    _ => unimplemented(format!("{distribution} for integral type {ty}")),
                });
            }
            // a + raw % (b - a); biased when the range is not a power of two.
            let width = ty.bit_width();
            let a = a_or_mean.int_bits();
            let range = integer::subtract(b_or_sigma.int_bits(), a, width);
            let raw = integer::truncate(raw.bits(), width);
            let offset = integer::remainder(raw, range, width, false);
            return Ok(Value::from_raw_bits(ty, integer::add(a, offset, width)));
        }

        // Narrow the unit value to the element type before using it.
        let unit = Value::from_wide(ty, raw.unit_float());
        match distribution {
            RandomDistribution::Uniform => {
                let scaled = match (unit.widen_float(), a_or_mean.widen_float(), b_or_sigma.widen_float()) {
                    (Some(WideFloat::F32(u)), Some(WideFloat::F32(a)), Some(WideFloat::F32(b))) => {
                        WideFloat::F32((b - a) * u + a)
                    }
                    (Some(WideFloat::F64(u)), Some(WideFloat::F64(a)), Some(WideFloat::F64(b))) => {
                        WideFloat::F64((b - a) * u + a)
                    }
                    _ => panic!("RNG parameters of {} do not match {ty}", hlo.name()),
                };
                Ok(Value::from_wide(ty, scaled))
            }
            RandomDistribution::Normal => match (unit, a_or_mean, b_or_sigma) {
                (Value::F32(u), Value::F32(mean), Value::F32(sigma)) => {
                    let r = erfc_inv_f32(self.math(), 2.0 * u)?;
                    Ok(Value::F32(r * sigma + mean))
                }
                _ => Err(unimplemented(format!("erfcinv for primitive type {ty}"))),
            },
            RandomDistribution::Invalid => {
                Err(invalid_argument(format!("unhandled distribution {distribution}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_philox_known_answer() {
        // Random123 known-answer vector for philox4x32_10.
        assert_eq!(
            philox_4x32_10([0, 0, 0, 0], [0, 0]),
            [0x6627_e8d5, 0xe169_c58d, 0xbc57_ac4c, 0x9b00_dbd8]
        );
    }

    #[test]
    fn test_elements_per_sample() {
        assert_eq!(elements_per_sample(PrimitiveType::F16), 4);
        assert_eq!(elements_per_sample(PrimitiveType::S32), 4);
        assert_eq!(elements_per_sample(PrimitiveType::F64), 2);
    }

    #[test]
    #[should_panic(expected = "unrecognized primitive type for RNG")]
    fn test_bf16_rng_is_rejected() {
        elements_per_sample(PrimitiveType::BF16);
    }

    #[test]
    fn test_i32_index_ignores_high_sample_bits() {
        let low = sample_values(7, IndexType::I32, 1, 2, 3);
        let high = sample_values(7 | 1 << 32, IndexType::I32, 1, 2, 3);
        assert_eq!(low, high);
        assert_ne!(low, sample_values(7 | 1 << 32, IndexType::I64, 1, 2, 3));
    }

    #[test]
    fn test_raw_64_bit_combines_adjacent_words() {
        let sample = [1, 2, 3, 4];
        assert_eq!(
            RawValue::from_sample(&sample, PrimitiveType::U64, 1),
            RawValue::U64(3 | 4 << 32)
        );
        assert_eq!(
            RawValue::from_sample(&sample, PrimitiveType::F32, 3),
            RawValue::U32(4)
        );
    }
}
