//! Per-element evaluation of HLO-style tensor instructions.
//!
//! An [`ElementalIrEmitter`] turns one [`HloInstruction`] and the generators of
//! its operands into an [`ElementGenerator`], a function from an output
//! coordinate to the value stored there. Chaining generators through a
//! [`HloToElementGeneratorMap`] evaluates a whole graph one element at a time.
//!
//! ```
//! use std::sync::Arc;
//!
//! use elemental::{
//!     evaluate, literal_generator, ElementalIrEmitter, HloModule, HloOpcode,
//!     HloToElementGeneratorMap, Literal, ModuleConfig, Value,
//! };
//!
//! let module = Arc::new(HloModule::new("example", ModuleConfig::default()));
//! let x = module.constant(Literal::vector([1.0f32, -2.0, 3.0]));
//! let neg = module.unary_same_shape(HloOpcode::Negate, &x);
//!
//! let emitter = ElementalIrEmitter::new(Arc::clone(&module));
//! let mut generators = HloToElementGeneratorMap::new();
//! generators.insert(x.id(), literal_generator(Arc::new(Literal::vector([1.0f32, -2.0, 3.0]))));
//! let generator = emitter.make_element_generator(&neg, &generators);
//!
//! let result = evaluate(neg.shape(), &generator, emitter.index_type()).unwrap();
//! assert_eq!(result.values(), vec![Value::F32(-1.0), Value::F32(2.0), Value::F32(-3.0)]);
//! ```

pub mod config;
pub mod driver;
pub mod emitter;
pub mod error;
pub mod hlo;
pub mod index;
pub mod literal;
pub mod math;
pub mod module;
pub mod shape;
pub mod value;

pub use config::ModuleConfig;
pub use driver::{evaluate, par_evaluate};
pub use emitter::{elementwise_source_index, ElementGenerator, ElementalIrEmitter, HloToElementGeneratorMap};
pub use error::{EmitterError, Result};
pub use hlo::{
    DotDimensionNumbers, GatherDimensionNumbers, HloId, HloInstruction, HloOpcode, PaddingConfig,
    PaddingDimension, RandomDistribution,
};
pub use index::{Index, IndexType};
pub use literal::{literal_generator, Literal};
pub use math::{BaseMath, HostMath, TargetMath};
pub use module::HloModule;
pub use shape::{PrimitiveType, Shape};
pub use value::Value;
