//! Bit-exact numeric helpers shared by the scalar evaluator.

pub mod float;
pub mod integer;
pub mod reduce_precision;
pub mod target;

pub use target::{BaseMath, HostMath, TargetMath};
