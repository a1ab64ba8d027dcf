//! Per-module compilation options.

use crate::index::IndexType;

/// Options fixed for the lifetime of an [`HloModule`](crate::HloModule).
///
/// # Examples
///
/// ```
/// use elemental::{IndexType, ModuleConfig};
///
/// let config = ModuleConfig::default()
///     .with_seed(7)
///     .with_index_type(IndexType::I32);
/// assert_eq!(config.seed, 7);
/// assert!(!config.fast_math);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleConfig {
    /// Seed for random values. Zero selects the global fallback value.
    pub seed: u64,
    /// Philox state word mixed into every RNG counter.
    pub rng_state: u64,
    /// Assume no NaNs. Disables NaN repair in reduce-precision and lets
    /// float min/max use plain comparisons.
    pub fast_math: bool,
    /// Width of coordinate arithmetic.
    pub index_type: IndexType,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        ModuleConfig {
            seed: 0,
            rng_state: 0,
            fast_math: false,
            index_type: IndexType::I64,
        }
    }
}

impl ModuleConfig {
    /// Sets the seed used for RNG keys.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the Philox state word.
    pub fn with_rng_state(mut self, rng_state: u64) -> Self {
        self.rng_state = rng_state;
        self
    }

    /// Enables or disables the no-NaN assumption.
    pub fn with_fast_math(mut self, fast_math: bool) -> Self {
        self.fast_math = fast_math;
        self
    }

    /// Sets the width of coordinate arithmetic.
    pub fn with_index_type(mut self, index_type: IndexType) -> Self {
        self.index_type = index_type;
        self
    }
}
