//! The instruction graph consumed by the emitter.
//!
//! Instructions are immutable once built and shared through [`Arc`]. They are
//! created by [`HloModule`](crate::HloModule) factory methods, which assign
//! ids and check shape preconditions.

use std::fmt;
use std::sync::Arc;

use crate::literal::Literal;
use crate::shape::Shape;

/// Identity of an instruction within its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HloId(pub(crate) u64);

impl HloId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HloId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HloOpcode {
    // Leaves and container ops. Not handled elementally.
    Parameter,
    Constant,
    Tuple,
    Reduce,

    // Unary elementwise.
    Abs,
    Ceil,
    Clz,
    Convert,
    BitcastConvert,
    Copy,
    Cos,
    Exp,
    Expm1,
    Floor,
    Imag,
    IsFinite,
    Log,
    Log1p,
    Negate,
    Not,
    Real,
    RoundNearestAfz,
    Sign,
    Sin,
    Tanh,

    // Binary elementwise.
    Add,
    And,
    Atan2,
    Complex,
    Divide,
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
    Maximum,
    Minimum,
    Multiply,
    Ne,
    Or,
    Power,
    Remainder,
    ShiftLeft,
    ShiftRightArithmetic,
    ShiftRightLogical,
    Subtract,
    Xor,

    // Structured.
    Select,
    Clamp,
    ReducePrecision,
    Broadcast,
    Slice,
    Reshape,
    Bitcast,
    Transpose,
    Reverse,
    Pad,
    Concatenate,
    DynamicSlice,
    DynamicUpdateSlice,
    Gather,
    Dot,
    Rng,
}

impl HloOpcode {
    pub const UNARY: &'static [HloOpcode] = &[
        HloOpcode::Abs,
        HloOpcode::Ceil,
        HloOpcode::Clz,
        HloOpcode::Convert,
        HloOpcode::BitcastConvert,
        HloOpcode::Copy,
        HloOpcode::Cos,
        HloOpcode::Exp,
        HloOpcode::Expm1,
        HloOpcode::Floor,
        HloOpcode::Imag,
        HloOpcode::IsFinite,
        HloOpcode::Log,
        HloOpcode::Log1p,
        HloOpcode::Negate,
        HloOpcode::Not,
        HloOpcode::Real,
        HloOpcode::RoundNearestAfz,
        HloOpcode::Sign,
        HloOpcode::Sin,
        HloOpcode::Tanh,
    ];

    pub const BINARY: &'static [HloOpcode] = &[
        HloOpcode::Add,
        HloOpcode::And,
        HloOpcode::Atan2,
        HloOpcode::Complex,
        HloOpcode::Divide,
        HloOpcode::Eq,
        HloOpcode::Ge,
        HloOpcode::Gt,
        HloOpcode::Le,
        HloOpcode::Lt,
        HloOpcode::Maximum,
        HloOpcode::Minimum,
        HloOpcode::Multiply,
        HloOpcode::Ne,
        HloOpcode::Or,
        HloOpcode::Power,
        HloOpcode::Remainder,
        HloOpcode::ShiftLeft,
        HloOpcode::ShiftRightArithmetic,
        HloOpcode::ShiftRightLogical,
        HloOpcode::Subtract,
        HloOpcode::Xor,
    ];

    pub fn is_unary(self) -> bool {
        Self::UNARY.contains(&self)
    }

    pub fn is_binary(self) -> bool {
        Self::BINARY.contains(&self)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            HloOpcode::Eq
                | HloOpcode::Ne
                | HloOpcode::Lt
                | HloOpcode::Gt
                | HloOpcode::Le
                | HloOpcode::Ge
        )
    }

    /// Opcodes whose operands may be read through implicit broadcasting.
    pub fn is_elementwise(self) -> bool {
        self.is_unary()
            || self.is_binary()
            || matches!(
                self,
                HloOpcode::Select | HloOpcode::Clamp | HloOpcode::ReducePrecision
            )
    }

    pub fn name(self) -> &'static str {
        match self {
            HloOpcode::Parameter => "parameter",
            HloOpcode::Constant => "constant",
            HloOpcode::Tuple => "tuple",
            HloOpcode::Reduce => "reduce",
            HloOpcode::Abs => "abs",
            HloOpcode::Ceil => "ceil",
            HloOpcode::Clz => "count-leading-zeros",
            HloOpcode::Convert => "convert",
            HloOpcode::BitcastConvert => "bitcast-convert",
            HloOpcode::Copy => "copy",
            HloOpcode::Cos => "cosine",
            HloOpcode::Exp => "exponential",
            HloOpcode::Expm1 => "exponential-minus-one",
            HloOpcode::Floor => "floor",
            HloOpcode::Imag => "imag",
            HloOpcode::IsFinite => "is-finite",
            HloOpcode::Log => "log",
            HloOpcode::Log1p => "log-plus-one",
            HloOpcode::Negate => "negate",
            HloOpcode::Not => "not",
            HloOpcode::Real => "real",
            HloOpcode::RoundNearestAfz => "round-nearest-afz",
            HloOpcode::Sign => "sign",
            HloOpcode::Sin => "sine",
            HloOpcode::Tanh => "tanh",
            HloOpcode::Add => "add",
            HloOpcode::And => "and",
            HloOpcode::Atan2 => "atan2",
            HloOpcode::Complex => "complex",
            HloOpcode::Divide => "divide",
            HloOpcode::Eq => "equal-to",
            HloOpcode::Ge => "greater-than-or-equal-to",
            HloOpcode::Gt => "greater-than",
            HloOpcode::Le => "less-than-or-equal-to",
            HloOpcode::Lt => "less-than",
            HloOpcode::Maximum => "maximum",
            HloOpcode::Minimum => "minimum",
            HloOpcode::Multiply => "multiply",
            HloOpcode::Ne => "not-equal-to",
            HloOpcode::Or => "or",
            HloOpcode::Power => "power",
            HloOpcode::Remainder => "remainder",
            HloOpcode::ShiftLeft => "shift-left",
            HloOpcode::ShiftRightArithmetic => "shift-right-arithmetic",
            HloOpcode::ShiftRightLogical => "shift-right-logical",
            HloOpcode::Subtract => "subtract",
            HloOpcode::Xor => "xor",
            HloOpcode::Select => "select",
            HloOpcode::Clamp => "clamp",
            HloOpcode::ReducePrecision => "reduce-precision",
            HloOpcode::Broadcast => "broadcast",
            HloOpcode::Slice => "slice",
            HloOpcode::Reshape => "reshape",
            HloOpcode::Bitcast => "bitcast",
            HloOpcode::Transpose => "transpose",
            HloOpcode::Reverse => "reverse",
            HloOpcode::Pad => "pad",
            HloOpcode::Concatenate => "concatenate",
            HloOpcode::DynamicSlice => "dynamic-slice",
            HloOpcode::DynamicUpdateSlice => "dynamic-update-slice",
            HloOpcode::Gather => "gather",
            HloOpcode::Dot => "dot",
            HloOpcode::Rng => "rng",
        }
    }
}

impl fmt::Display for HloOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Padding applied to one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaddingDimension {
    pub edge_padding_low: i64,
    pub edge_padding_high: i64,
    pub interior_padding: i64,
}

impl PaddingDimension {
    pub fn new(edge_padding_low: i64, edge_padding_high: i64, interior_padding: i64) -> Self {
        PaddingDimension {
            edge_padding_low,
            edge_padding_high,
            interior_padding,
        }
    }

    /// Padded extent of an operand dimension of size `extent`.
    pub fn padded_extent(&self, extent: i64) -> i64 {
        let interior = if extent > 0 {
            (extent - 1) * self.interior_padding
        } else {
            0
        };
        self.edge_padding_low + extent + interior + self.edge_padding_high
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaddingConfig {
    pub dimensions: Vec<PaddingDimension>,
}

impl PaddingConfig {
    pub fn new(dimensions: Vec<PaddingDimension>) -> Self {
        PaddingConfig { dimensions }
    }
}

/// How a gather maps output dimensions onto operand and index dimensions.
///
/// `offset_dims` and `collapsed_slice_dims` are sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GatherDimensionNumbers {
    /// Output dimensions copied into the operand coordinate.
    pub offset_dims: Vec<i64>,
    /// Operand dimensions whose window size is 1 and that have no output dimension.
    pub collapsed_slice_dims: Vec<i64>,
    /// Operand dimension each index-vector component offsets.
    pub start_index_map: Vec<i64>,
    /// Dimension of the indices operand holding the index vector. Equal to
    /// the indices rank when every index is a scalar.
    pub index_vector_dim: i64,
}

/// Contracting dimensions of a dot. Exactly one per side is supported.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DotDimensionNumbers {
    pub lhs_contracting_dimensions: Vec<i64>,
    pub rhs_contracting_dimensions: Vec<i64>,
}

/// Distribution requested by an RNG instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomDistribution {
    /// Unset distribution; rejected when an element is generated.
    Invalid,
    Uniform,
    Normal,
}

impl fmt::Display for RandomDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RandomDistribution::Invalid => "RNG_INVALID",
            RandomDistribution::Uniform => "RNG_UNIFORM",
            RandomDistribution::Normal => "RNG_NORMAL",
        };
        f.write_str(name)
    }
}

/// One node of the dataflow graph.
#[derive(Debug, Clone)]
pub struct HloInstruction {
    pub(crate) id: HloId,
    pub(crate) name: String,
    pub(crate) opcode: HloOpcode,
    pub(crate) shape: Shape,
    pub(crate) operands: Vec<Arc<HloInstruction>>,
    pub(crate) dimensions: Vec<i64>,
    pub(crate) slice_starts: Vec<i64>,
    pub(crate) slice_limits: Vec<i64>,
    pub(crate) slice_strides: Vec<i64>,
    pub(crate) padding_config: Option<PaddingConfig>,
    pub(crate) gather_dimension_numbers: Option<GatherDimensionNumbers>,
    pub(crate) gather_slice_sizes: Vec<i64>,
    pub(crate) dot_dimension_numbers: Option<DotDimensionNumbers>,
    pub(crate) exponent_bits: u32,
    pub(crate) mantissa_bits: u32,
    pub(crate) random_distribution: Option<RandomDistribution>,
    pub(crate) literal: Option<Literal>,
}

impl HloInstruction {
    pub(crate) fn new(
        id: HloId,
        opcode: HloOpcode,
        shape: Shape,
        operands: Vec<Arc<HloInstruction>>,
    ) -> Self {
        HloInstruction {
            id,
            name: format!("{}.{}", opcode.name(), id.0),
            opcode,
            shape,
            operands,
            dimensions: Vec::new(),
            slice_starts: Vec::new(),
            slice_limits: Vec::new(),
            slice_strides: Vec::new(),
            padding_config: None,
            gather_dimension_numbers: None,
            gather_slice_sizes: Vec::new(),
            dot_dimension_numbers: None,
            exponent_bits: 0,
            mantissa_bits: 0,
            random_distribution: None,
            literal: None,
        }
    }

    pub fn id(&self) -> HloId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn opcode(&self) -> HloOpcode {
        self.opcode
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn operands(&self) -> &[Arc<HloInstruction>] {
        &self.operands
    }

    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    /// # Panics
    ///
    /// Panics if the instruction has fewer than `i + 1` operands.
    pub fn operand(&self, i: usize) -> &Arc<HloInstruction> {
        assert!(
            i < self.operands.len(),
            "{} has no operand {i}",
            self.name
        );
        &self.operands[i]
    }

    /// Dimension list of broadcast, transpose, reverse and concatenate.
    pub fn dimensions(&self) -> &[i64] {
        &self.dimensions
    }

    pub fn slice_starts(&self) -> &[i64] {
        &self.slice_starts
    }

    pub fn slice_limits(&self) -> &[i64] {
        &self.slice_limits
    }

    pub fn slice_strides(&self) -> &[i64] {
        &self.slice_strides
    }

    /// # Panics
    ///
    /// Panics if this is not a pad.
    pub fn padding_config(&self) -> &PaddingConfig {
        self.padding_config
            .as_ref()
            .unwrap_or_else(|| panic!("{} has no padding config", self.name))
    }

    /// # Panics
    ///
    /// Panics if this is not a gather.
    pub fn gather_dimension_numbers(&self) -> &GatherDimensionNumbers {
        self.gather_dimension_numbers
            .as_ref()
            .unwrap_or_else(|| panic!("{} has no gather dimension numbers", self.name))
    }

    pub fn gather_slice_sizes(&self) -> &[i64] {
        &self.gather_slice_sizes
    }

    /// # Panics
    ///
    /// Panics if this is not a dot.
    pub fn dot_dimension_numbers(&self) -> &DotDimensionNumbers {
        self.dot_dimension_numbers
            .as_ref()
            .unwrap_or_else(|| panic!("{} has no dot dimension numbers", self.name))
    }

    pub fn exponent_bits(&self) -> u32 {
        self.exponent_bits
    }

    pub fn mantissa_bits(&self) -> u32 {
        self.mantissa_bits
    }

    /// # Panics
    ///
    /// Panics if this is not an RNG instruction.
    pub fn random_distribution(&self) -> RandomDistribution {
        self.random_distribution
            .unwrap_or_else(|| panic!("{} has no random distribution", self.name))
    }

    /// Value of a constant.
    pub fn literal(&self) -> Option<&Literal> {
        self.literal.as_ref()
    }
}

impl fmt::Display for HloInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} {}(", self.name, self.shape, self.opcode)?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", operand.name)?;
        }
        write!(f, ")")
    }
}
