//! The "intelligent" lower bound on unavoidable future cost (§4.6).
//!
//! From any interior search node, cost can only still decrease by
//! migrating VMs off some PM until it becomes empty. Emptying a PM that
//! currently retains `k` initial VMs not yet relocated costs `k` extra
//! migrations and saves one active host -- profitable only while
//! `k * weights.migrations < weights.hosts`. This module tracks the
//! counters the bound needs and computes it on demand.

use crate::params::CostWeights;

/// Per-PM and aggregate bookkeeping needed by the intelligent bound.
/// Only meaningful (and only maintained) when `AllocatorParams::
/// intelligent_bound` is set; unused PMs may ignore this entirely.
#[derive(Debug, Clone)]
pub struct BoundAux {
    /// For each PM: the number of its initial VMs that have not yet been
    /// migrated away. Indexed by PM id.
    num_additional_vms: Vec<usize>,
    /// Histogram: `additional_vm_counts[k]` = number of PMs currently
    /// empty of newly-placed VMs and holding exactly `k` resident initial
    /// VMs.
    additional_vm_counts: Vec<usize>,
    /// Count of PMs with at least one resident initial VM (i.e. PMs that
    /// could still become empty without any migration "cost" already
    /// paid).
    num_emptiable_pms: usize,
    /// The largest value ever seen in `num_additional_vms`, fixed at
    /// construction (not maintained afterwards -- it only bounds the
    /// search loop in `compute_minimal_extra_cost`).
    max_initial_vms_on_one_pm: usize,
}

impl BoundAux {
    /// Builds the aux structure from each VM's initial PM index (`None`
    /// for VMs with no prior placement) and the PM count.
    pub fn new(initial_pm_of_vm: &[Option<usize>], num_pms: usize) -> Self {
        let mut num_additional_vms = vec![0usize; num_pms];
        for initial in initial_pm_of_vm.iter().flatten() {
            num_additional_vms[*initial] += 1;
        }

        let max_initial_vms_on_one_pm = num_additional_vms.iter().copied().max().unwrap_or(0);
        let num_emptiable_pms = num_additional_vms.iter().filter(|&&c| c > 0).count();

        let mut additional_vm_counts = vec![0usize; max_initial_vms_on_one_pm + 1];
        for &count in &num_additional_vms {
            additional_vm_counts[count] += 1;
        }

        BoundAux {
            num_additional_vms,
            additional_vm_counts,
            num_emptiable_pms,
            max_initial_vms_on_one_pm,
        }
    }

    /// Called when `pm` (currently empty) transitions to non-empty because
    /// it was just turned on for the first time by an allocation: it can
    /// no longer be emptied for free, so it leaves the emptiable-PM
    /// bookkeeping entirely.
    pub fn on_pm_turned_on(&mut self, pm: usize) {
        let count = self.num_additional_vms[pm];
        self.additional_vm_counts[count] -= 1;
        if count > 0 {
            self.num_emptiable_pms -= 1;
        }
    }

    /// Symmetric to `on_pm_turned_on`: called when `pm` transitions back
    /// to empty (its last VM was deallocated).
    pub fn on_pm_turned_off(&mut self, pm: usize) {
        let count = self.num_additional_vms[pm];
        self.additional_vm_counts[count] += 1;
        if count > 0 {
            self.num_emptiable_pms += 1;
        }
    }

    /// Called whenever a VM is allocated directly to its own initial PM
    /// (the PM must still be off, i.e. this is the VM "returning home"):
    /// one fewer initial VM remains resident there.
    pub fn on_initial_vm_settled(&mut self, initial_pm: usize) {
        let count = self.num_additional_vms[initial_pm];
        self.additional_vm_counts[count] -= 1;
        self.additional_vm_counts[count - 1] += 1;
        if count == 1 {
            self.num_emptiable_pms -= 1;
        }
        self.num_additional_vms[initial_pm] -= 1;
    }

    /// Symmetric undo of `on_initial_vm_settled`.
    pub fn on_initial_vm_unsettled(&mut self, initial_pm: usize) {
        let count = self.num_additional_vms[initial_pm];
        self.additional_vm_counts[count] -= 1;
        self.additional_vm_counts[count + 1] += 1;
        if count == 0 {
            self.num_emptiable_pms += 1;
        }
        self.num_additional_vms[initial_pm] += 1;
    }

    /// True iff `pm` is still off and still has at least one resident
    /// initial VM (i.e. allocating `pm`'s own initial VM there would still
    /// call `on_initial_vm_settled`).
    pub fn pm_has_resident_initial_vms(&self, pm: usize) -> bool {
        self.num_additional_vms[pm] > 0
    }

    /// The intelligent lower bound on additional cost from the current
    /// node (§4.6). `remaining_migrations` is the migration budget minus
    /// migrations already committed on the path to this node.
    pub fn compute_minimal_extra_cost(&self, remaining_migrations: i64, weights: CostWeights) -> i64 {
        let mut extra = self.num_emptiable_pms as i64 * weights.hosts;
        let mut migrations_spent: i64 = 0;

        if weights.migrations <= 0 {
            return extra;
        }

        for k in 1..=self.max_initial_vms_on_one_pm {
            if (k as i64) >= weights.hosts / weights.migrations {
                break;
            }
            let remaining_budget = remaining_migrations - migrations_spent;
            if remaining_budget <= 0 {
                break;
            }
            let n = self.additional_vm_counts[k].min((remaining_budget / k as i64) as usize);
            migrations_spent += n as i64 * k as i64;
            extra -= n as i64 * (weights.hosts - k as i64 * weights.migrations);
        }

        extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights() -> CostWeights {
        CostWeights {
            hosts: 10,
            migrations: 1,
        }
    }

    #[test]
    fn builds_histogram_from_initial_placement() {
        // PM 0 has 2 initial VMs, PM 1 has 1, PM 2 has none.
        let aux = BoundAux::new(&[Some(0), Some(0), Some(1)], 3);
        assert_eq!(aux.max_initial_vms_on_one_pm, 2);
        assert_eq!(aux.num_emptiable_pms, 2); // PMs 0 and 1
        assert_eq!(aux.additional_vm_counts[0], 1); // PM 2
        assert_eq!(aux.additional_vm_counts[1], 1); // PM 1
        assert_eq!(aux.additional_vm_counts[2], 1); // PM 0
    }

    #[test]
    fn turning_on_a_pm_removes_it_from_emptiable_bookkeeping() {
        let mut aux = BoundAux::new(&[Some(0), Some(1)], 2);
        assert_eq!(aux.num_emptiable_pms, 2);
        aux.on_pm_turned_on(0);
        assert_eq!(aux.num_emptiable_pms, 1);
        assert_eq!(aux.additional_vm_counts[1], 1); // only PM 1 left at count 1
        aux.on_pm_turned_off(0);
        assert_eq!(aux.num_emptiable_pms, 2);
    }

    #[test]
    fn settling_last_initial_vm_makes_pm_non_emptiable() {
        let mut aux = BoundAux::new(&[Some(0)], 1);
        assert_eq!(aux.num_emptiable_pms, 1);
        aux.on_initial_vm_settled(0);
        assert_eq!(aux.num_emptiable_pms, 0);
        assert_eq!(aux.num_additional_vms[0], 0);
        aux.on_initial_vm_unsettled(0);
        assert_eq!(aux.num_emptiable_pms, 1);
        assert_eq!(aux.num_additional_vms[0], 1);
    }

    #[test]
    fn bound_is_zero_when_no_pm_is_emptiable() {
        let aux = BoundAux::new(&[], 0);
        assert_eq!(aux.compute_minimal_extra_cost(100, weights()), 0);
    }

    #[test]
    fn bound_accounts_for_cheap_emptying_within_budget() {
        // One PM with a single resident initial VM: emptying it costs 1
        // migration (cheaper than 10 for W_HOSTS=10, W_MIG=1) and saves a
        // host, so extra should be 0 given enough remaining budget.
        let aux = BoundAux::new(&[Some(0)], 1);
        let extra = aux.compute_minimal_extra_cost(5, weights());
        assert_eq!(extra, 0);
    }

    #[test]
    fn bound_respects_migration_budget() {
        let aux = BoundAux::new(&[Some(0)], 1);
        // No migrations left: can't empty the PM for free, so the full
        // W_HOSTS penalty remains.
        let extra = aux.compute_minimal_extra_cost(0, weights());
        assert_eq!(extra, 10);
    }

    #[test]
    fn bound_never_trades_when_unprofitable() {
        // k=10 initial VMs on one PM; emptying costs 10*1=10 migrations,
        // equal to W_HOSTS=10, so k >= W_HOSTS/W_MIG means no trade (loop
        // breaks at k=10).
        let initial: Vec<Option<usize>> = (0..10).map(|_| Some(0)).collect();
        let aux = BoundAux::new(&initial, 1);
        let extra = aux.compute_minimal_extra_cost(100, weights());
        assert_eq!(extra, 10);
    }
}
