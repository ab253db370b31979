//! Cost accountant (§4.3): incremental active-PM and migration counters,
//! plus the optional intelligent-bound auxiliary structures (§4.6).

use crate::bound::BoundAux;
use crate::params::CostWeights;

/// Tracks the two cost-function terms incrementally across
/// allocate/deallocate calls, and optionally the intelligent-bound
/// bookkeeping.
#[derive(Debug, Clone)]
pub struct Accountant {
    active_pms: i64,
    migrations: i64,
    weights: CostWeights,
    bound: Option<BoundAux>,
}

impl Accountant {
    pub fn new(weights: CostWeights, bound: Option<BoundAux>) -> Self {
        Accountant {
            active_pms: 0,
            migrations: 0,
            weights,
            bound,
        }
    }

    pub fn active_pms(&self) -> i64 {
        self.active_pms
    }

    pub fn migrations(&self) -> i64 {
        self.migrations
    }

    /// Current cost: `W_HOSTS * activePMs + W_MIG * migrations`.
    pub fn cost(&self) -> i64 {
        self.weights.hosts * self.active_pms + self.weights.migrations * self.migrations
    }

    pub fn pm_turned_on(&mut self) {
        self.active_pms += 1;
    }

    pub fn pm_turned_off(&mut self) {
        self.active_pms -= 1;
    }

    pub fn migration_started(&mut self) {
        self.migrations += 1;
    }

    pub fn migration_ended(&mut self) {
        self.migrations -= 1;
    }

    pub fn bound(&self) -> Option<&BoundAux> {
        self.bound.as_ref()
    }

    pub fn bound_mut(&mut self) -> Option<&mut BoundAux> {
        self.bound.as_mut()
    }

    /// The intelligent lower bound on additional cost (§4.6), or 0 if
    /// intelligent bounding is disabled -- a cost of 0 added to `cost()`
    /// degenerates the bound check to plain incumbent comparison.
    pub fn minimal_extra_cost(&self, remaining_migrations: i64) -> i64 {
        match &self.bound {
            Some(bound) => bound.compute_minimal_extra_cost(remaining_migrations, self.weights),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_reflects_weights() {
        let mut acc = Accountant::new(CostWeights { hosts: 10, migrations: 1 }, None);
        acc.pm_turned_on();
        acc.migration_started();
        acc.pm_turned_on();
        assert_eq!(acc.active_pms(), 2);
        assert_eq!(acc.migrations(), 1);
        assert_eq!(acc.cost(), 21);
    }

    #[test]
    fn allocate_deallocate_round_trips_counters() {
        let mut acc = Accountant::new(CostWeights::default(), None);
        acc.pm_turned_on();
        acc.migration_started();
        acc.migration_started();
        assert_eq!((acc.active_pms(), acc.migrations()), (1, 2));
        acc.migration_ended();
        acc.migration_ended();
        acc.pm_turned_off();
        assert_eq!((acc.active_pms(), acc.migrations()), (0, 0));
    }

    #[test]
    fn minimal_extra_cost_is_zero_without_bound() {
        let acc = Accountant::new(CostWeights::default(), None);
        assert_eq!(acc.minimal_extra_cost(100), 0);
    }
}
