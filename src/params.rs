//! Algorithm parameters for one B&B run.

use crate::error::ParamError;
use crate::problem::SortMethod;

/// The two terms of the cost function: `W_HOSTS * activePMs + W_MIG *
/// migrations`. Exposed as a parameter (rather than hard-coded constants,
/// as in the original) so the harness and tests can exercise alternative
/// ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostWeights {
    pub hosts: i64,
    pub migrations: i64,
}

impl Default for CostWeights {
    fn default() -> Self {
        CostWeights {
            hosts: 10,
            migrations: 1,
        }
    }
}

/// One named configuration of the B&B engine's heuristics and bounds.
#[derive(Debug, Clone)]
pub struct AllocatorParams {
    pub name: String,

    pub fail_first: bool,
    pub vm_sort_method: SortMethod,
    pub pm_sort_method: SortMethod,
    pub initial_pm_first: bool,
    pub symmetry_breaking: bool,
    pub intelligent_bound: bool,

    pub bound_threshold: f64,
    pub max_migrations_ratio: i64,
    pub timeout_secs: f64,

    pub cost_weights: CostWeights,
}

impl AllocatorParams {
    /// Validates parameter ranges. Called by `Allocator::new`; a
    /// `ConfigParser` caller should also call this right after building a
    /// parameter set so malformed config fails fast.
    pub fn validate(&self) -> Result<(), ParamError> {
        if self.name.is_empty() {
            return Err(ParamError::EmptyName);
        }
        if !(self.bound_threshold > 0.0 && self.bound_threshold <= 1.0) {
            return Err(ParamError::BoundThresholdOutOfRange(self.bound_threshold));
        }
        if self.max_migrations_ratio <= 0 {
            return Err(ParamError::ZeroMigrationsRatio(self.max_migrations_ratio));
        }
        if self.timeout_secs < 0.0 {
            return Err(ParamError::NegativeTimeout(self.timeout_secs));
        }
        Ok(())
    }
}

impl Default for AllocatorParams {
    /// A conservative, exact-search default: natural ordering, no sorting,
    /// no symmetry-breaking, intelligent bound on, threshold 1 (no loss of
    /// optimality), unlimited migrations, 10s timeout.
    fn default() -> Self {
        AllocatorParams {
            name: "default".to_string(),
            fail_first: true,
            vm_sort_method: SortMethod::None,
            pm_sort_method: SortMethod::None,
            initial_pm_first: true,
            symmetry_breaking: false,
            intelligent_bound: true,
            bound_threshold: 1.0,
            max_migrations_ratio: 1,
            timeout_secs: 10.0,
            cost_weights: CostWeights::default(),
        }
    }
}
