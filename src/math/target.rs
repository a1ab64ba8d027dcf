//! Transcendental primitives requested from the code-generation target.
//!
//! The emitter never calls libm directly; it asks a [`TargetMath`] for each
//! primitive. Targets that cannot lower `atan2` or `tanh` keep the default
//! methods, which report [`EmitterError::Unimplemented`](crate::EmitterError).

use num::Float;

use crate::error::{unimplemented, Result};

pub trait TargetMath: Send + Sync + 'static {
    fn exp<T: Float>(&self, x: T) -> Result<T> {
        Ok(x.exp())
    }

    fn log<T: Float>(&self, x: T) -> Result<T> {
        Ok(x.ln())
    }

    fn sin<T: Float>(&self, x: T) -> Result<T> {
        Ok(x.sin())
    }

    fn cos<T: Float>(&self, x: T) -> Result<T> {
        Ok(x.cos())
    }

    fn sqrt<T: Float>(&self, x: T) -> Result<T> {
        Ok(x.sqrt())
    }

    fn pow<T: Float>(&self, x: T, y: T) -> Result<T> {
        Ok(x.powf(y))
    }

    fn atan2<T: Float>(&self, _y: T, _x: T) -> Result<T> {
        Err(unimplemented("atan2"))
    }

    fn tanh<T: Float>(&self, _x: T) -> Result<T> {
        Err(unimplemented("tanh"))
    }
}

/// Target with no `atan2` or `tanh` lowering.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseMath;

impl TargetMath for BaseMath {}

/// Host CPU target: every primitive comes from the host libm.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostMath;

impl TargetMath for HostMath {
    fn atan2<T: Float>(&self, y: T, x: T) -> Result<T> {
        Ok(y.atan2(x))
    }

    fn tanh<T: Float>(&self, x: T) -> Result<T> {
        Ok(x.tanh())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_math_rejects_atan2_and_tanh() {
        assert!(BaseMath.atan2(1.0f32, 1.0).unwrap_err().is_unimplemented());
        assert!(BaseMath.tanh(0.5f64).unwrap_err().is_unimplemented());
        assert_eq!(BaseMath.exp(0.0f32).unwrap(), 1.0);
    }

    #[test]
    fn test_host_math_lowers_everything() {
        let angle = HostMath.atan2(1.0f64, 1.0).unwrap();
        assert!((angle - std::f64::consts::FRAC_PI_4).abs() < 1e-15);
        assert_eq!(HostMath.tanh(0.0f32).unwrap(), 0.0);
    }
}
