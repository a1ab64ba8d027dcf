//! Element generators for single instructions.
//!
//! [`ElementalIrEmitter::make_element_generator`] turns one instruction plus
//! the generators of its operands into an [`ElementGenerator`]: a function
//! from an output coordinate to the value at that coordinate. Generators are
//! built once and may be invoked concurrently from any number of threads.
//!
//! The scalar semantics live in the submodules:
//!
//! * [`unary`] integer and floating-point unary operators
//! * [`binary`] integer and floating-point binary operators
//! * [`complex`] complex unary and binary operators
//! * [`convert`] element type conversion and bit reinterpretation
//! * [`structured`] select, clamp and the index-remapping operators
//! * [`rng`] the Philox random number generator

pub mod binary;
pub mod complex;
pub mod convert;
pub mod rng;
pub mod structured;
pub mod unary;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{unimplemented, Result};
use crate::hlo::{HloId, HloInstruction, HloOpcode};
use crate::index::{Index, IndexType};
use crate::math::{BaseMath, TargetMath};
use crate::module::HloModule;
use crate::value::Value;

/// Computes the element of an instruction's output at one coordinate.
pub type ElementGenerator = Arc<dyn Fn(&Index) -> Result<Value> + Send + Sync>;

/// Generators of already-compiled instructions, keyed by instruction id.
pub type HloToElementGeneratorMap = HashMap<HloId, ElementGenerator>;

/// Builds element generators for the instructions of one module.
///
/// `M` supplies the transcendental primitives; see [`TargetMath`].
pub struct ElementalIrEmitter<M: TargetMath = BaseMath> {
    module: Arc<HloModule>,
    math: Arc<M>,
}

impl<M: TargetMath> Clone for ElementalIrEmitter<M> {
    fn clone(&self) -> Self {
        ElementalIrEmitter {
            module: Arc::clone(&self.module),
            math: Arc::clone(&self.math),
        }
    }
}

impl ElementalIrEmitter<BaseMath> {
    /// Emitter for a target without `atan2` or `tanh`.
    pub fn new(module: Arc<HloModule>) -> Self {
        ElementalIrEmitter::with_math(module, BaseMath)
    }
}

impl<M: TargetMath> ElementalIrEmitter<M> {
    pub fn with_math(module: Arc<HloModule>, math: M) -> Self {
        ElementalIrEmitter {
            module,
            math: Arc::new(math),
        }
    }

    pub fn module(&self) -> &Arc<HloModule> {
        &self.module
    }

    pub fn math(&self) -> &M {
        &self.math
    }

    pub fn index_type(&self) -> IndexType {
        self.module.config().index_type
    }

    /// Whether float operations may assume NaN-free inputs.
    pub(crate) fn no_nans(&self) -> bool {
        self.module.config().fast_math
    }

    /// Builds the generator for `hlo`.
    ///
    /// Opcodes without an elemental form still produce a generator; it fails
    /// with [`EmitterError::Unimplemented`](crate::EmitterError) when invoked.
    ///
    /// # Panics
    ///
    /// Panics if `operand_to_generator` lacks a generator for an operand the
    /// opcode reads.
    pub fn make_element_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        debug!(
            opcode = %hlo.opcode(),
            id = hlo.id().value(),
            shape = %hlo.shape(),
            "building element generator"
        );
        let opcode = hlo.opcode();
        if opcode.is_unary() {
            return self.make_unary_generator(hlo, operand_to_generator);
        }
        if opcode.is_binary() {
            return self.make_binary_generator(hlo, operand_to_generator);
        }
        match opcode {
            HloOpcode::Select => self.make_select_generator(hlo, operand_to_generator),
            HloOpcode::Clamp => self.make_clamp_generator(hlo, operand_to_generator),
            HloOpcode::ReducePrecision => {
                self.make_reduce_precision_generator(hlo, operand_to_generator)
            }
            HloOpcode::Concatenate => self.make_concatenate_generator(hlo, operand_to_generator),
            HloOpcode::Reverse => self.make_reverse_generator(hlo, operand_to_generator),
            HloOpcode::Broadcast => self.make_broadcast_generator(hlo, operand_to_generator),
            HloOpcode::Slice => self.make_slice_generator(hlo, operand_to_generator),
            HloOpcode::DynamicSlice => {
                self.make_dynamic_slice_generator(hlo, operand_to_generator)
            }
            HloOpcode::Gather => self.make_gather_generator(hlo, operand_to_generator),
            HloOpcode::DynamicUpdateSlice => {
                self.make_dynamic_update_slice_generator(hlo, operand_to_generator)
            }
            HloOpcode::Bitcast => self.make_bitcast_generator(hlo, operand_to_generator),
            HloOpcode::Reshape => self.make_reshape_generator(hlo, operand_to_generator),
            HloOpcode::Transpose => self.make_transpose_generator(hlo, operand_to_generator),
            HloOpcode::Rng => self.make_philox_rng_element_generator(hlo, operand_to_generator),
            HloOpcode::Pad => self.make_pad_generator(hlo, operand_to_generator),
            HloOpcode::Dot => self.make_dot_generator(hlo, operand_to_generator),
            _ => {
                trace!(opcode = %opcode, "no elemental form, deferring failure");
                Arc::new(move |_: &Index| {
                    Err(unimplemented(format!(
                        "Unhandled opcode for elemental IR emission: {opcode}"
                    )))
                })
            }
        }
    }

    fn make_unary_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        let emitter = self.clone();
        let hlo = Arc::clone(hlo);
        let operand = operand_generator(operand_to_generator, &hlo, 0);
        Arc::new(move |index: &Index| {
            let operand_value = operand(&elementwise_source_index(index, &hlo, 0))?;
            emitter.emit_unary_op(&hlo, operand_value)
        })
    }

    fn make_binary_generator(
        &self,
        hlo: &Arc<HloInstruction>,
        operand_to_generator: &HloToElementGeneratorMap,
    ) -> ElementGenerator {
        let emitter = self.clone();
        let hlo = Arc::clone(hlo);
        let lhs = operand_generator(operand_to_generator, &hlo, 0);
        let rhs = operand_generator(operand_to_generator, &hlo, 1);
        Arc::new(move |index: &Index| {
            let lhs_value = lhs(&elementwise_source_index(index, &hlo, 0))?;
            let rhs_value = rhs(&elementwise_source_index(index, &hlo, 1))?;
            emitter.emit_binary_op(&hlo, lhs_value, rhs_value)
        })
    }
}

/// Looks up the generator of operand `operand_no` of `hlo`.
///
/// # Panics
///
/// Panics if the map has no generator for that operand.
pub(crate) fn operand_generator(
    operand_to_generator: &HloToElementGeneratorMap,
    hlo: &HloInstruction,
    operand_no: usize,
) -> ElementGenerator {
    let operand = hlo.operand(operand_no);
    match operand_to_generator.get(&operand.id()) {
        Some(generator) => Arc::clone(generator),
        None => panic!(
            "no element generator for operand {operand_no} ({}) of {}",
            operand.name(),
            hlo.name()
        ),
    }
}

/// Coordinate to read operand `operand_no` of an elementwise instruction at.
///
/// Scalar operands read the empty coordinate. Operands with the output's
/// extents read the output coordinate unchanged, linear form included. Other
/// operands must have the output's rank and are implicitly broadcast along
/// their size-1 dimensions, which read index 0.
///
/// # Panics
///
/// Panics if `hlo` is not elementwise or the operand cannot be implicitly
/// broadcast to the output shape.
pub fn elementwise_source_index(index: &Index, hlo: &HloInstruction, operand_no: usize) -> Index {
    assert!(
        hlo.opcode().is_elementwise() || hlo.opcode() == HloOpcode::Rng,
        "{} is not elementwise",
        hlo
    );
    let operand_shape = hlo.operand(operand_no).shape();
    if operand_shape.is_scalar() {
        return Index::scalar(index.index_type());
    }
    if operand_shape.compatible_ignoring_element_type(hlo.shape()) {
        return index.clone();
    }
    assert_eq!(
        operand_shape.rank(),
        hlo.shape().rank(),
        "operand {operand_no} of {} has shape {} which cannot broadcast to {}",
        hlo.name(),
        operand_shape,
        hlo.shape()
    );
    let mut source = Index::scalar(index.index_type());
    for (i, (&operand_extent, &extent)) in operand_shape
        .dimensions()
        .iter()
        .zip(hlo.shape().dimensions())
        .enumerate()
    {
        if operand_extent == extent {
            source.push(index[i]);
        } else {
            assert_eq!(
                operand_extent, 1,
                "operand dimension {i} of {} must match or be 1",
                hlo.name()
            );
            source.push(0);
        }
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModuleConfig;
    use crate::literal::{literal_generator, Literal};
    use crate::shape::{PrimitiveType, Shape};

    #[test]
    fn test_elementwise_source_index() {
        let module = HloModule::new("m", ModuleConfig::default());
        let full = module.parameter(Shape::new(PrimitiveType::F32, &[3, 4]));
        let row = module.parameter(Shape::new(PrimitiveType::F32, &[1, 4]));
        let scalar = module.parameter(Shape::scalar(PrimitiveType::F32));
        let add = module.binary(HloOpcode::Add, full.shape().clone(), &full, &row);
        let mul = module.binary(HloOpcode::Multiply, full.shape().clone(), &full, &scalar);

        let index = Index::with_linear(vec![2, 3], 11, IndexType::I64);
        assert_eq!(elementwise_source_index(&index, &add, 0), index);
        assert_eq!(elementwise_source_index(&index, &add, 1).as_slice(), &[0, 3]);
        assert!(elementwise_source_index(&index, &mul, 1).is_empty());
    }

    #[test]
    fn test_unhandled_opcode_fails_lazily() {
        let module = Arc::new(HloModule::new("m", ModuleConfig::default()));
        let operand = module.parameter(Shape::new(PrimitiveType::F32, &[2]));
        let init = module.parameter(Shape::scalar(PrimitiveType::F32));
        let reduce = module.reduce(Shape::scalar(PrimitiveType::F32), &operand, &init, &[0]);

        let emitter = ElementalIrEmitter::new(module);
        let generator = emitter.make_element_generator(&reduce, &HashMap::new());
        let err = generator(&Index::scalar(IndexType::I64)).unwrap_err();
        assert!(err.is_unimplemented());
        assert!(err.message().contains("reduce"));
    }

    #[test]
    fn test_generator_is_shareable_across_threads() {
        let module = Arc::new(HloModule::new("m", ModuleConfig::default()));
        let p = module.parameter(Shape::new(PrimitiveType::S32, &[4]));
        let neg = module.unary_same_shape(HloOpcode::Negate, &p);
        let mut generators = HloToElementGeneratorMap::new();
        generators.insert(
            p.id(),
            literal_generator(Arc::new(Literal::vector([1i32, 2, 3, 4]))),
        );
        let generator = ElementalIrEmitter::new(module).make_element_generator(&neg, &generators);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let generator = Arc::clone(&generator);
                std::thread::spawn(move || generator(&Index::new(vec![i], IndexType::I64)))
            })
            .collect();
        let values: Vec<Value> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        assert_eq!(
            values,
            vec![Value::S32(-1), Value::S32(-2), Value::S32(-3), Value::S32(-4)]
        );
    }
}
