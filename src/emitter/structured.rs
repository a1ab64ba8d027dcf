//! Select, clamp, reduce-precision and the operators that remap coordinates
//! before reading their operands.
//!
//! Pad, concatenate and dynamic-update-slice choose between different operand
//! generators per element; only the chosen generator is invoked.

use std::sync::Arc;

use crate::emitter::{elementwise_source_index, operand_generator, ElementGenerator, ElementalIrEmitter, HloToElementGeneratorMap};
use crate::error::{unimplemented, Result};
use crate::hlo::HloInstruction;
use crate::index::{Index, IndexType};
use crate::math::float::{float_max, float_min};
use crate::math::integer;
use crate::math::reduce_precision::reduce_precision_f32;
use crate::math::TargetMath;
use crate::shape::PrimitiveType;
use crate::value::{Value, WideFloat};

/// Clamps a start index read from an operand into `[0, largest_valid]`,
/// comparing with the index operand's signedness.
fn clamp_start_index(index_type: IndexType, start: i64, largest_valid: i64, is_signed: bool) -> i64 {
    assert!(largest_valid >= 0, "slice does not fit in its operand");
    let width = index_type.bit_width();
    let clamped = integer::clamp(
        index_type.bits(0),
        index_type.bits(start),
        index_type.bits(largest_valid),
        width,
        is_signed,
    );
    index_type.from_bits(clamped)
}

impl<M: TargetMath> ElementalIrEmitter<M> {
    pub(crate) fn make_select_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        let hlo = Arc::clone(hlo);
        let pred = operand_generator(operand_to_generator, &hlo, 0);
        let on_true = operand_generator(operand_to_generator, &hlo, 1);
        let on_false = operand_generator(operand_to_generator, &hlo, 2);
        Arc::new(move |index: &Index| {
            let pred_value = pred(&elementwise_source_index(index, &hlo, 0))?;
            let on_true_value = on_true(&elementwise_source_index(index, &hlo, 1))?;
            let on_false_value = on_false(&elementwise_source_index(index, &hlo, 2))?;
            Ok(if pred_value.truth_bit() {
                on_true_value
            } else {
                on_false_value
            })
        })
    }

    pub(crate) fn make_clamp_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        let emitter = self.clone();
        let hlo = Arc::clone(hlo);
        let min = operand_generator(operand_to_generator, &hlo, 0);
        let arg = operand_generator(operand_to_generator, &hlo, 1);
        let max = operand_generator(operand_to_generator, &hlo, 2);
        Arc::new(move |index: &Index| {
            let min_value = min(&elementwise_source_index(index, &hlo, 0))?;
            let arg_value = arg(&elementwise_source_index(index, &hlo, 1))?;
            let max_value = max(&elementwise_source_index(index, &hlo, 2))?;
            emitter.emit_clamp(&hlo, min_value, arg_value, max_value)
        })
    }

    /// `min(max_value, max(min_value, arg_value))`.
    pub fn emit_clamp(
        &self,
        hlo: &HloInstruction,
        min_value: Value,
        arg_value: Value,
        max_value: Value,
    ) -> Result<Value> {
        let ty = hlo.shape().element_type();
        if ty.is_floating_point() {
            let no_nans = self.no_nans();
            let widened = (
                min_value.widen_float(),
                arg_value.widen_float(),
                max_value.widen_float(),
            );
            let clamped = match widened {
                (Some(WideFloat::F32(lo)), Some(WideFloat::F32(x)), Some(WideFloat::F32(hi))) => {
                    WideFloat::F32(float_min(hi, float_max(lo, x, no_nans), no_nans))
                }
                (Some(WideFloat::F64(lo)), Some(WideFloat::F64(x)), Some(WideFloat::F64(hi))) => {
                    WideFloat::F64(float_min(hi, float_max(lo, x, no_nans), no_nans))
                }
                _ => panic!("clamp operands of {} differ in type", hlo.name()),
            };
            Ok(Value::from_wide(ty, clamped))
        } else if ty.is_integral() {
            let bits = integer::clamp(
                min_value.int_bits(),
                arg_value.int_bits(),
                max_value.int_bits(),
                ty.bit_width(),
                ty.is_signed_integral(),
            );
            Ok(Value::from_raw_bits(ty, bits))
        } else {
            Err(unimplemented(format!("Clamp unimplemented for {ty}")))
        }
    }

    pub(crate) fn make_reduce_precision_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        let emitter = self.clone();
        let hlo = Arc::clone(hlo);
        let operand = operand_generator(operand_to_generator, &hlo, 0);
        Arc::new(move |index: &Index| {
            let value = operand(&elementwise_source_index(index, &hlo, 0))?;
            emitter.emit_reduce_precision(&hlo, value)
        })
    }

    /// Rounds an `F32` element to the exponent and mantissa widths of `hlo`.
    pub fn emit_reduce_precision(&self, hlo: &HloInstruction, x: Value) -> Result<Value> {
        match x {
            Value::F32(v) => Ok(Value::F32(reduce_precision_f32(
                v,
                hlo.exponent_bits(),
                hlo.mantissa_bits(),
                !self.no_nans(),
            ))),
            other => Err(unimplemented(format!(
                "reduce-precision only implemented for F32, found {}",
                other.element_type()
            ))),
        }
    }

    pub(crate) fn make_concatenate_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        let concat_dim = hlo.dimensions()[0] as usize;
        let operands: Vec<(i64, ElementGenerator)> = (0..hlo.operand_count())
            .map(|i| {
                (
                    hlo.operand(i).shape().dimension(concat_dim),
                    operand_generator(operand_to_generator, hlo, i),
                )
            })
            .collect();
        let name = hlo.name().to_string();
        Arc::new(move |target_index: &Index| {
            let index_type = target_index.index_type();
            let mut source_index = target_index.without_linear();
            for (extent, generator) in &operands {
                let position = index_type.bits(source_index[concat_dim]);
                let extent = index_type.bits(*extent);
                if position < extent {
                    return generator(&source_index);
                }
                source_index.set(concat_dim, index_type.from_bits(position.wrapping_sub(extent)));
            }
            panic!("{target_index:?} is past the end of every operand of {name}")
        })
    }

    pub(crate) fn make_reverse_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        let hlo = Arc::clone(hlo);
        let operand = operand_generator(operand_to_generator, &hlo, 0);
        Arc::new(move |target_index: &Index| {
            operand(&target_index.source_index_of_reverse(hlo.shape(), hlo.dimensions()))
        })
    }

    pub(crate) fn make_broadcast_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        let hlo = Arc::clone(hlo);
        let operand = operand_generator(operand_to_generator, &hlo, 0);
        Arc::new(move |target_index: &Index| {
            operand(&target_index.source_index_of_broadcast(
                hlo.shape(),
                hlo.operand(0).shape(),
                hlo.dimensions(),
            ))
        })
    }

    pub(crate) fn make_slice_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        let hlo = Arc::clone(hlo);
        let operand = operand_generator(operand_to_generator, &hlo, 0);
        Arc::new(move |index: &Index| {
            operand(&index.source_index_of_slice(hlo.slice_starts(), hlo.slice_strides()))
        })
    }

    pub(crate) fn make_bitcast_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        assert_eq!(
            hlo.shape().elements(),
            hlo.operand(0).shape().elements(),
            "bitcast {} changes the element count",
            hlo.name()
        );
        let hlo = Arc::clone(hlo);
        let operand = operand_generator(operand_to_generator, &hlo, 0);
        Arc::new(move |index: &Index| {
            operand(&index.source_index_of_bitcast(hlo.shape(), hlo.operand(0).shape()))
        })
    }

    pub(crate) fn make_reshape_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        assert_eq!(
            hlo.shape().elements(),
            hlo.operand(0).shape().elements(),
            "reshape {} changes the element count",
            hlo.name()
        );
        let hlo = Arc::clone(hlo);
        let operand = operand_generator(operand_to_generator, &hlo, 0);
        Arc::new(move |index: &Index| {
            operand(&index.source_index_of_reshape(hlo.shape(), hlo.operand(0).shape()))
        })
    }

    pub(crate) fn make_transpose_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        let hlo = Arc::clone(hlo);
        let operand = operand_generator(operand_to_generator, &hlo, 0);
        Arc::new(move |target_index: &Index| {
            operand(&target_index.source_index_of_transpose(hlo.dimensions()))
        })
    }

    pub(crate) fn make_dynamic_slice_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        let hlo = Arc::clone(hlo);
        let input = operand_generator(operand_to_generator, &hlo, 0);
        let start_indices = operand_generator(operand_to_generator, &hlo, 1);
        Arc::new(move |index: &Index| {
            let index_type = index.index_type();
            let input_shape = hlo.operand(0).shape();
            let is_signed = hlo.operand(1).shape().element_type().is_signed_integral();
            let mut input_index = Index::scalar(index_type);
            for i in 0..input_shape.rank() {
                let start = start_indices(&Index::new(vec![i as i64], index_type))?;
                let start = index_type.from_value(&start);
                let largest_valid = input_shape.dimension(i) - hlo.shape().dimension(i);
                let start = clamp_start_index(index_type, start, largest_valid, is_signed);
                input_index.push(start.wrapping_add(index[i]));
            }
            input(&input_index)
        })
    }

    pub(crate) fn make_gather_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        let hlo = Arc::clone(hlo);
        let operand = operand_generator(operand_to_generator, &hlo, 0);
        let indices = operand_generator(operand_to_generator, &hlo, 1);
        Arc::new(move |index: &Index| {
            let index_type = index.index_type();
            let dim_numbers = hlo.gather_dimension_numbers();
            let operand_shape = hlo.operand(0).shape();
            let indices_shape = hlo.operand(1).shape();
            let output_shape = hlo.shape();
            let index_vector_dim = dim_numbers.index_vector_dim as usize;

            let mut operand_index = Vec::with_capacity(operand_shape.rank());
            let mut operand_to_output_dim: Vec<Option<usize>> = vec![None; operand_shape.rank()];
            let mut offset_dims = dim_numbers.offset_dims.iter();
            for (i, output_dim) in operand_to_output_dim.iter_mut().enumerate() {
                if dim_numbers.collapsed_slice_dims.binary_search(&(i as i64)).is_ok() {
                    operand_index.push(0);
                } else {
                    let window_dim = match offset_dims.next() {
                        Some(&d) => d as usize,
                        None => panic!("{} has too few offset dimensions", hlo.name()),
                    };
                    *output_dim = Some(window_dim);
                    operand_index.push(index[window_dim]);
                }
            }

            // Coordinate of the index vector within the indices operand.
            let mut gather_index_index: Vec<i64> = (0..output_shape.rank())
                .filter(|&i| dim_numbers.offset_dims.binary_search(&(i as i64)).is_err())
                .map(|i| index[i])
                .collect();
            if gather_index_index.len() != indices_shape.rank() {
                gather_index_index.insert(index_vector_dim, 0);
            }

            let is_signed = indices_shape.element_type().is_signed_integral();
            let mut add_to_operand_index = |component: &Value, dim: usize| {
                let start = index_type.from_value(component);
                let operand_dim = dim_numbers.start_index_map[dim] as usize;
                // Collapsed dimensions iterate only index 0.
                let output_dim_size = operand_to_output_dim[operand_dim]
                    .map_or(1, |d| output_shape.dimension(d));
                let largest_valid = operand_shape.dimension(operand_dim) - output_dim_size;
                let start = clamp_start_index(index_type, start, largest_valid, is_signed);
                operand_index[operand_dim] =
                    index_type.wrap(operand_index[operand_dim].wrapping_add(start));
            };

            if indices_shape.rank() == index_vector_dim {
                let component = indices(&Index::new(gather_index_index, index_type))?;
                add_to_operand_index(&component, 0);
            } else {
                for i in 0..indices_shape.dimension(index_vector_dim) {
                    gather_index_index[index_vector_dim] = i;
                    let component =
                        indices(&Index::new(gather_index_index.clone(), index_type))?;
                    add_to_operand_index(&component, i as usize);
                }
            }
            operand(&Index::new(operand_index, index_type))
        })
    }

    pub(crate) fn make_dynamic_update_slice_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        let hlo = Arc::clone(hlo);
        let input = operand_generator(operand_to_generator, &hlo, 0);
        let update = operand_generator(operand_to_generator, &hlo, 1);
        let start_indices = operand_generator(operand_to_generator, &hlo, 2);
        Arc::new(move |index: &Index| {
            let index_type = index.index_type();
            let input_shape = hlo.operand(0).shape();
            let update_shape = hlo.operand(1).shape();
            let is_signed = hlo.operand(2).shape().element_type().is_signed_integral();
            let rank = input_shape.rank();

            let mut slice_start = Vec::with_capacity(rank);
            let mut slice_intersection = true;
            for i in 0..rank {
                let start = start_indices(&Index::new(vec![i as i64], index_type))?;
                let start = index_type.from_value(&start);
                let largest_valid = input_shape.dimension(i) - update_shape.dimension(i);
                let start = clamp_start_index(index_type, start, largest_valid, is_signed);
                let limit = index_type.wrap(start.wrapping_add(update_shape.dimension(i)));
                slice_intersection &= index[i] >= start && index[i] < limit;
                slice_start.push(start);
            }

            if slice_intersection {
                let update_index: Vec<i64> = (0..rank)
                    .map(|i| index[i].wrapping_sub(slice_start[i]))
                    .collect();
                update(&Index::new(update_index, index_type))
            } else {
                input(index)
            }
        })
    }

    pub(crate) fn make_pad_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        let hlo = Arc::clone(hlo);
        let operand = operand_generator(operand_to_generator, &hlo, 0);
        let padding_value = operand_generator(operand_to_generator, &hlo, 1);
        Arc::new(move |padded_index: &Index| {
            let index_type = padded_index.index_type();
            let operand_shape = hlo.operand(0).shape();
            let mut index = padded_index.without_linear();
            let mut in_bounds = true;
            for (i, pad) in hlo.padding_config().dimensions.iter().enumerate() {
                let stride = pad.interior_padding + 1;
                let shifted = index_type.wrap(index[i].wrapping_sub(pad.edge_padding_low));
                in_bounds &= shifted >= 0;
                in_bounds &= index_type.bits(shifted) % index_type.bits(stride) == 0;
                let source = shifted.wrapping_div(stride);
                in_bounds &= source < operand_shape.dimension(i);
                index.set(i, source);
            }
            if in_bounds {
                operand(&index)
            } else {
                padding_value(&Index::scalar(index_type))
            }
        })
    }

    pub(crate) fn make_dot_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        let emitter = self.clone();
        let hlo = Arc::clone(hlo);
        let lhs = operand_generator(operand_to_generator, &hlo, 0);
        let rhs = operand_generator(operand_to_generator, &hlo, 1);
        Arc::new(move |dot_result_index: &Index| {
            emitter.emit_dot(&hlo, &lhs, &rhs, dot_result_index)
        })
    }

    fn emit_dot(
        &self,
        hlo: &HloInstruction,
        lhs_generator: &ElementGenerator,
        rhs_generator: &ElementGenerator,
        dot_result_index: &Index,
    ) -> Result<Value> {
        let dim_numbers = hlo.dot_dimension_numbers();
        let lhs_contracting_dim = dim_numbers.lhs_contracting_dimensions[0] as usize;
        let rhs_contracting_dim = dim_numbers.rhs_contracting_dimensions[0] as usize;
        let lhs_shape = hlo.operand(0).shape();
        let contracted_dim_size = lhs_shape.dimension(lhs_contracting_dim);
        let lhs_dims = lhs_shape.rank();
        let rhs_dims = hlo.operand(1).shape().rank();
        let index_type = dot_result_index.index_type();

        let ty = hlo.shape().element_type();
        let mut accumulator = Value::zero(ty);
        for t in 0..contracted_dim_size {
            let mut lhs_index = Index::new(dot_result_index.as_slice()[..lhs_dims - 1].to_vec(), index_type);
            lhs_index.insert_at(lhs_contracting_dim, t);
            let mut rhs_index = Index::new(
                dot_result_index.as_slice()[lhs_dims - 1..lhs_dims - 1 + rhs_dims - 1].to_vec(),
                index_type,
            );
            rhs_index.insert_at(rhs_contracting_dim, t);

            let lhs_value = lhs_generator(&lhs_index)?;
            let rhs_value = rhs_generator(&rhs_index)?;
            accumulator = accumulate(accumulator, lhs_value, rhs_value);
        }
        Ok(accumulator)
    }
}

/// Rounds `x` to the precision of `ty`, a float type no wider than 32 bits.
fn round_f32_to(ty: PrimitiveType, x: f32) -> f32 {
    match Value::narrow_f32(ty, x).widen_float() {
        Some(WideFloat::F32(rounded)) => rounded,
        _ => x,
    }
}

/// `acc + lhs * rhs` in the element type's arithmetic. The product is
/// rounded to the element type before it is added.
fn accumulate(acc: Value, lhs: Value, rhs: Value) -> Value {
    match (acc, lhs, rhs) {
        (Value::C64(acc), Value::C64(l), Value::C64(r)) => {
            let product_real = l.re * r.re - l.im * r.im;
            let product_imag = l.re * r.im + l.im * r.re;
            Value::C64(num::complex::Complex::new(
                acc.re + product_real,
                acc.im + product_imag,
            ))
        }
        (Value::C128(acc), Value::C128(l), Value::C128(r)) => {
            let product_real = l.re * r.re - l.im * r.im;
            let product_imag = l.re * r.im + l.im * r.re;
            Value::C128(num::complex::Complex::new(
                acc.re + product_real,
                acc.im + product_imag,
            ))
        }
        _ => {
            let ty = acc.element_type();
            match (acc.widen_float(), lhs.widen_float(), rhs.widen_float()) {
                (Some(WideFloat::F32(a)), Some(WideFloat::F32(l)), Some(WideFloat::F32(r))) => {
                    let product = round_f32_to(ty, l * r);
                    Value::from_wide(ty, WideFloat::F32(a + product))
                }
                (Some(WideFloat::F64(a)), Some(WideFloat::F64(l)), Some(WideFloat::F64(r))) => {
                    Value::from_wide(ty, WideFloat::F64(a + l * r))
                }
                (None, None, None) => {
                    let width = ty.bit_width();
                    let product = integer::multiply(lhs.int_bits(), rhs.int_bits(), width);
                    Value::from_raw_bits(ty, integer::add(acc.int_bits(), product, width))
                }
                _ => panic!(
                    "dot operands {} and {} do not match accumulator {}",
                    lhs.element_type(),
                    rhs.element_type(),
                    ty
                ),
            }
        }
    }
}
