//! The compilation-unit context: configuration, instruction ids and the
//! random values RNG instructions draw when their generators are built.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha12Rng;

use crate::config::ModuleConfig;
use crate::hlo::{
    DotDimensionNumbers, GatherDimensionNumbers, HloId, HloInstruction, HloOpcode,
    PaddingConfig, RandomDistribution,
};
use crate::literal::Literal;
use crate::shape::{PrimitiveType, Shape};

/// Seed of the fallback generator used when the configured seed is zero.
pub const GLOBAL_RANDOM_SEED: u64 = 42;

/// Owns the configuration and random state of one compilation unit.
///
/// Random state is only advanced while generators are being built; evaluating
/// a generator never touches it.
#[derive(Debug)]
pub struct HloModule {
    name: String,
    config: ModuleConfig,
    next_id: AtomicU64,
    random_engine: Mutex<ChaCha12Rng>,
    global_random: Mutex<ChaCha12Rng>,
}

impl HloModule {
    /// Creates an empty module. Both random generators start from their seeds.
    pub fn new(name: impl Into<String>, config: ModuleConfig) -> Self {
        HloModule {
            name: name.into(),
            config,
            next_id: AtomicU64::new(0),
            random_engine: Mutex::new(ChaCha12Rng::seed_from_u64(config.seed)),
            global_random: Mutex::new(ChaCha12Rng::seed_from_u64(GLOBAL_RANDOM_SEED)),
        }
    }

    /// Name given at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// Philox state word shared by every RNG instruction of the module.
    pub fn rng_state(&self) -> u64 {
        self.config.rng_state
    }

    /// Next value of the per-module generator. Each RNG instruction draws one
    /// so that no two produce the same sequence.
    pub fn random_new64(&self) -> u64 {
        self.random_engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_u64()
    }

    /// Next value of the fallback generator seeded with [`GLOBAL_RANDOM_SEED`].
    pub fn global_random_value(&self) -> u64 {
        self.global_random
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_u64()
    }

    /// The configured seed, or a fallback value when it is zero.
    pub fn seed_or_global_random_value(&self) -> u64 {
        if self.config.seed != 0 {
            self.config.seed
        } else {
            self.global_random_value()
        }
    }

    fn next_id(&self) -> HloId {
        HloId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn build(
        &self,
        opcode: HloOpcode,
        shape: Shape,
        operands: Vec<Arc<HloInstruction>>,
        configure: impl FnOnce(&mut HloInstruction),
    ) -> Arc<HloInstruction> {
        let mut instruction = HloInstruction::new(self.next_id(), opcode, shape, operands);
        configure(&mut instruction);
        Arc::new(instruction)
    }

    /// Adds an instruction with no opcode-specific attributes.
    pub fn add_instruction(
        &self,
        opcode: HloOpcode,
        shape: Shape,
        operands: Vec<Arc<HloInstruction>>,
    ) -> Arc<HloInstruction> {
        self.build(opcode, shape, operands, |_| {})
    }

    pub fn parameter(&self, shape: Shape) -> Arc<HloInstruction> {
        self.build(HloOpcode::Parameter, shape, Vec::new(), |_| {})
    }

    pub fn constant(&self, literal: Literal) -> Arc<HloInstruction> {
        let shape = literal.shape().clone();
        self.build(HloOpcode::Constant, shape, Vec::new(), |hlo| {
            hlo.literal = Some(literal)
        })
    }

    pub fn unary(
        &self,
        opcode: HloOpcode,
        shape: Shape,
        operand: &Arc<HloInstruction>,
    ) -> Arc<HloInstruction> {
        assert!(opcode.is_unary(), "{opcode} is not a unary opcode");
        self.build(opcode, shape, vec![operand.clone()], |_| {})
    }

    /// Unary op whose result has the operand's shape.
    pub fn unary_same_shape(
        &self,
        opcode: HloOpcode,
        operand: &Arc<HloInstruction>,
    ) -> Arc<HloInstruction> {
        let shape = operand.shape().clone();
        self.unary(opcode, shape, operand)
    }

    pub fn binary(
        &self,
        opcode: HloOpcode,
        shape: Shape,
        lhs: &Arc<HloInstruction>,
        rhs: &Arc<HloInstruction>,
    ) -> Arc<HloInstruction> {
        assert!(opcode.is_binary(), "{opcode} is not a binary opcode");
        self.build(opcode, shape, vec![lhs.clone(), rhs.clone()], |_| {})
    }

    /// Comparison producing a `Pred` array shaped like `lhs`.
    pub fn compare(
        &self,
        opcode: HloOpcode,
        lhs: &Arc<HloInstruction>,
        rhs: &Arc<HloInstruction>,
    ) -> Arc<HloInstruction> {
        assert!(opcode.is_comparison(), "{opcode} is not a comparison");
        let shape = lhs.shape().with_element_type(PrimitiveType::Pred);
        self.binary(opcode, shape, lhs, rhs)
    }

    pub fn convert(
        &self,
        operand: &Arc<HloInstruction>,
        element_type: PrimitiveType,
    ) -> Arc<HloInstruction> {
        let shape = operand.shape().with_element_type(element_type);
        self.unary(HloOpcode::Convert, shape, operand)
    }

    pub fn bitcast_convert(
        &self,
        operand: &Arc<HloInstruction>,
        element_type: PrimitiveType,
    ) -> Arc<HloInstruction> {
        let shape = operand.shape().with_element_type(element_type);
        self.unary(HloOpcode::BitcastConvert, shape, operand)
    }

    pub fn select(
        &self,
        shape: Shape,
        pred: &Arc<HloInstruction>,
        on_true: &Arc<HloInstruction>,
        on_false: &Arc<HloInstruction>,
    ) -> Arc<HloInstruction> {
        self.build(
            HloOpcode::Select,
            shape,
            vec![pred.clone(), on_true.clone(), on_false.clone()],
            |_| {},
        )
    }

    pub fn clamp(
        &self,
        shape: Shape,
        min: &Arc<HloInstruction>,
        arg: &Arc<HloInstruction>,
        max: &Arc<HloInstruction>,
    ) -> Arc<HloInstruction> {
        self.build(
            HloOpcode::Clamp,
            shape,
            vec![min.clone(), arg.clone(), max.clone()],
            |_| {},
        )
    }

    pub fn reduce_precision(
        &self,
        operand: &Arc<HloInstruction>,
        exponent_bits: u32,
        mantissa_bits: u32,
    ) -> Arc<HloInstruction> {
        assert!(exponent_bits >= 1, "reduce-precision needs an exponent bit");
        let shape = operand.shape().clone();
        self.build(HloOpcode::ReducePrecision, shape, vec![operand.clone()], |hlo| {
            hlo.exponent_bits = exponent_bits;
            hlo.mantissa_bits = mantissa_bits;
        })
    }

    /// `dimensions[i]` is the output dimension operand dimension `i` maps to.
    pub fn broadcast(
        &self,
        shape: Shape,
        operand: &Arc<HloInstruction>,
        dimensions: &[i64],
    ) -> Arc<HloInstruction> {
        assert_eq!(
            dimensions.len(),
            operand.shape().rank(),
            "broadcast must map every operand dimension"
        );
        for (i, &d) in dimensions.iter().enumerate() {
            let operand_extent = operand.shape().dimension(i);
            let output_extent = shape.dimension(d as usize);
            assert!(
                operand_extent == output_extent || operand_extent == 1,
                "operand dimension {i} ({operand_extent}) cannot broadcast to {output_extent}"
            );
        }
        self.build(HloOpcode::Broadcast, shape, vec![operand.clone()], |hlo| {
            hlo.dimensions = dimensions.to_vec()
        })
    }

    pub fn slice(
        &self,
        operand: &Arc<HloInstruction>,
        starts: &[i64],
        limits: &[i64],
        strides: &[i64],
    ) -> Arc<HloInstruction> {
        let rank = operand.shape().rank();
        assert!(
            starts.len() == rank && limits.len() == rank && strides.len() == rank,
            "slice bounds must match operand rank {rank}"
        );
        let dimensions: Vec<i64> = (0..rank)
            .map(|i| {
                assert!(strides[i] > 0, "slice stride must be positive");
                assert!(
                    0 <= starts[i] && starts[i] <= limits[i]
                        && limits[i] <= operand.shape().dimension(i),
                    "slice bounds out of range in dimension {i}"
                );
                (limits[i] - starts[i] + strides[i] - 1) / strides[i]
            })
            .collect();
        let shape = Shape::new(operand.shape().element_type(), &dimensions);
        self.build(HloOpcode::Slice, shape, vec![operand.clone()], |hlo| {
            hlo.slice_starts = starts.to_vec();
            hlo.slice_limits = limits.to_vec();
            hlo.slice_strides = strides.to_vec();
        })
    }

    pub fn reshape(&self, shape: Shape, operand: &Arc<HloInstruction>) -> Arc<HloInstruction> {
        assert_eq!(
            shape.elements(),
            operand.shape().elements(),
            "reshape from {} to {shape} changes the element count",
            operand.shape()
        );
        self.build(HloOpcode::Reshape, shape, vec![operand.clone()], |_| {})
    }

    pub fn bitcast(&self, shape: Shape, operand: &Arc<HloInstruction>) -> Arc<HloInstruction> {
        assert_eq!(
            shape.elements(),
            operand.shape().elements(),
            "bitcast from {} to {shape} changes the element count",
            operand.shape()
        );
        self.build(HloOpcode::Bitcast, shape, vec![operand.clone()], |_| {})
    }

    /// Output dimension `i` is operand dimension `permutation[i]`.
    pub fn transpose(
        &self,
        operand: &Arc<HloInstruction>,
        permutation: &[i64],
    ) -> Arc<HloInstruction> {
        let rank = operand.shape().rank();
        let mut seen = vec![false; rank];
        for &p in permutation {
            let p = p as usize;
            assert!(p < rank && !seen[p], "{permutation:?} is not a permutation");
            seen[p] = true;
        }
        assert_eq!(permutation.len(), rank, "{permutation:?} is not a permutation");
        let dimensions: Vec<i64> = permutation
            .iter()
            .map(|&p| operand.shape().dimension(p as usize))
            .collect();
        let shape = Shape::new(operand.shape().element_type(), &dimensions);
        self.build(HloOpcode::Transpose, shape, vec![operand.clone()], |hlo| {
            hlo.dimensions = permutation.to_vec()
        })
    }

    pub fn reverse(&self, operand: &Arc<HloInstruction>, dimensions: &[i64]) -> Arc<HloInstruction> {
        assert!(
            dimensions
                .iter()
                .all(|&d| (d as usize) < operand.shape().rank()),
            "reverse dimension out of range"
        );
        let shape = operand.shape().clone();
        self.build(HloOpcode::Reverse, shape, vec![operand.clone()], |hlo| {
            hlo.dimensions = dimensions.to_vec()
        })
    }

    pub fn pad(
        &self,
        operand: &Arc<HloInstruction>,
        padding_value: &Arc<HloInstruction>,
        padding_config: PaddingConfig,
    ) -> Arc<HloInstruction> {
        assert!(padding_value.shape().is_scalar(), "pad value must be a scalar");
        assert_eq!(
            padding_config.dimensions.len(),
            operand.shape().rank(),
            "padding config must cover every operand dimension"
        );
        let dimensions: Vec<i64> = padding_config
            .dimensions
            .iter()
            .zip(operand.shape().dimensions())
            .map(|(pad, &extent)| {
                assert!(pad.interior_padding >= 0, "negative interior padding");
                pad.padded_extent(extent)
            })
            .collect();
        let shape = Shape::new(operand.shape().element_type(), &dimensions);
        self.build(
            HloOpcode::Pad,
            shape,
            vec![operand.clone(), padding_value.clone()],
            |hlo| hlo.padding_config = Some(padding_config),
        )
    }

    pub fn concatenate(
        &self,
        operands: &[Arc<HloInstruction>],
        dimension: i64,
    ) -> Arc<HloInstruction> {
        assert!(!operands.is_empty(), "concatenate needs at least one operand");
        let first = operands[0].shape();
        let dim = dimension as usize;
        assert!(dim < first.rank(), "concatenate dimension out of range");
        let mut dimensions = first.dimensions().to_vec();
        dimensions[dim] = 0;
        for operand in operands {
            let shape = operand.shape();
            assert_eq!(shape.rank(), first.rank(), "concatenate rank mismatch");
            for (i, (&a, &b)) in shape.dimensions().iter().zip(first.dimensions()).enumerate() {
                assert!(i == dim || a == b, "concatenate extent mismatch in dimension {i}");
            }
            dimensions[dim] += shape.dimension(dim);
        }
        let shape = Shape::new(first.element_type(), &dimensions);
        self.build(HloOpcode::Concatenate, shape, operands.to_vec(), |hlo| {
            hlo.dimensions = vec![dimension]
        })
    }

    /// `start_indices` is a rank-1 integer array with one start per operand
    /// dimension.
    pub fn dynamic_slice(
        &self,
        operand: &Arc<HloInstruction>,
        start_indices: &Arc<HloInstruction>,
        slice_sizes: &[i64],
    ) -> Arc<HloInstruction> {
        assert_start_indices(operand.shape(), start_indices.shape());
        assert_eq!(slice_sizes.len(), operand.shape().rank(), "slice sizes rank mismatch");
        for (i, (&size, &extent)) in slice_sizes.iter().zip(operand.shape().dimensions()).enumerate() {
            assert!(size <= extent, "slice size exceeds operand in dimension {i}");
        }
        let shape = Shape::new(operand.shape().element_type(), slice_sizes);
        self.build(
            HloOpcode::DynamicSlice,
            shape,
            vec![operand.clone(), start_indices.clone()],
            |_| {},
        )
    }

    pub fn dynamic_update_slice(
        &self,
        operand: &Arc<HloInstruction>,
        update: &Arc<HloInstruction>,
        start_indices: &Arc<HloInstruction>,
    ) -> Arc<HloInstruction> {
        assert_start_indices(operand.shape(), start_indices.shape());
        assert_eq!(update.shape().rank(), operand.shape().rank(), "update rank mismatch");
        for (i, (&size, &extent)) in update
            .shape()
            .dimensions()
            .iter()
            .zip(operand.shape().dimensions())
            .enumerate()
        {
            assert!(size <= extent, "update exceeds operand in dimension {i}");
        }
        let shape = operand.shape().clone();
        self.build(
            HloOpcode::DynamicUpdateSlice,
            shape,
            vec![operand.clone(), update.clone(), start_indices.clone()],
            |_| {},
        )
    }

    pub fn gather(
        &self,
        shape: Shape,
        operand: &Arc<HloInstruction>,
        indices: &Arc<HloInstruction>,
        dimension_numbers: GatherDimensionNumbers,
        slice_sizes: &[i64],
    ) -> Arc<HloInstruction> {
        assert!(
            indices.shape().element_type().is_integral(),
            "gather indices must be integers"
        );
        assert_eq!(
            slice_sizes.len(),
            operand.shape().rank(),
            "gather slice sizes must cover every operand dimension"
        );
        assert_eq!(
            dimension_numbers.offset_dims.len() + dimension_numbers.collapsed_slice_dims.len(),
            operand.shape().rank(),
            "every operand dimension must be an offset or a collapsed dimension"
        );
        for &d in &dimension_numbers.collapsed_slice_dims {
            assert_eq!(slice_sizes[d as usize], 1, "collapsed dimension {d} must have size 1");
        }
        self.build(
            HloOpcode::Gather,
            shape,
            vec![operand.clone(), indices.clone()],
            |hlo| {
                hlo.gather_dimension_numbers = Some(dimension_numbers);
                hlo.gather_slice_sizes = slice_sizes.to_vec();
            },
        )
    }

    /// Dot with one contracting dimension per side. The result dimensions are
    /// the lhs non-contracting dimensions followed by the rhs ones.
    pub fn dot(
        &self,
        lhs: &Arc<HloInstruction>,
        rhs: &Arc<HloInstruction>,
        dimension_numbers: DotDimensionNumbers,
    ) -> Arc<HloInstruction> {
        assert_eq!(
            dimension_numbers.lhs_contracting_dimensions.len(),
            1,
            "dot supports exactly one lhs contracting dimension"
        );
        assert_eq!(
            dimension_numbers.rhs_contracting_dimensions.len(),
            1,
            "dot supports exactly one rhs contracting dimension"
        );
        let lhs_contracting = dimension_numbers.lhs_contracting_dimensions[0] as usize;
        let rhs_contracting = dimension_numbers.rhs_contracting_dimensions[0] as usize;
        assert_eq!(
            lhs.shape().dimension(lhs_contracting),
            rhs.shape().dimension(rhs_contracting),
            "contracting dimensions differ in size"
        );
        assert_eq!(
            lhs.shape().element_type(),
            rhs.shape().element_type(),
            "dot operands differ in element type"
        );
        let dimensions: Vec<i64> = lhs
            .shape()
            .dimensions()
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != lhs_contracting)
            .chain(
                rhs.shape()
                    .dimensions()
                    .iter()
                    .enumerate()
                    .filter(|&(i, _)| i != rhs_contracting),
            )
            .map(|(_, &d)| d)
            .collect();
        let shape = Shape::new(lhs.shape().element_type(), &dimensions);
        self.build(HloOpcode::Dot, shape, vec![lhs.clone(), rhs.clone()], |hlo| {
            hlo.dot_dimension_numbers = Some(dimension_numbers)
        })
    }

    /// RNG with scalar parameters: `[a, b)` for uniform, `(mean, sigma)` for
    /// normal.
    pub fn rng(
        &self,
        shape: Shape,
        distribution: RandomDistribution,
        a: &Arc<HloInstruction>,
        b: &Arc<HloInstruction>,
    ) -> Arc<HloInstruction> {
        self.build(HloOpcode::Rng, shape, vec![a.clone(), b.clone()], |hlo| {
            hlo.random_distribution = Some(distribution)
        })
    }

    pub fn reduce(
        &self,
        shape: Shape,
        operand: &Arc<HloInstruction>,
        init_value: &Arc<HloInstruction>,
        dimensions: &[i64],
    ) -> Arc<HloInstruction> {
        self.build(
            HloOpcode::Reduce,
            shape,
            vec![operand.clone(), init_value.clone()],
            |hlo| hlo.dimensions = dimensions.to_vec(),
        )
    }
}

fn assert_start_indices(operand_shape: &Shape, start_shape: &Shape) {
    assert!(
        start_shape.element_type().is_integral(),
        "start indices must be integers, found {start_shape}"
    );
    assert_eq!(
        start_shape.dimensions(),
        &[operand_shape.rank() as i64],
        "start indices {start_shape} must be rank 1 with one entry per operand dimension"
    );
}
