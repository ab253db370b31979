//! The branch-and-bound placement driver (§4.1, §4.2, §4.5) and its
//! external interface (§6: construct, solve, query).
//!
//! `Allocator` owns the mutable search state layered on top of an
//! immutable `Problem`: free resources per PM, a per-VM domain of
//! candidate PMs with a cursor into it, the change journal that makes
//! backtracking an O(1) undo, and the incremental cost accountant. The
//! search itself is iterative (an explicit `path` stack standing in for
//! the call stack) so a single run can be interrupted cleanly on
//! timeout without unwinding through recursive frames.

use std::collections::HashMap;
use std::io::Write;
use std::time::Instant;

use crate::accountant::Accountant;
use crate::journal::{Change, Journal};
use crate::params::AllocatorParams;
use crate::problem::{sort_pm_indices_by, Problem, SortMethod};
use crate::strategy;

/// A recorded best-known-so-far solution.
#[derive(Debug, Clone)]
struct Incumbent {
    cost: i64,
    /// Indexed by VM slot (position in `problem.vms` after preprocessing
    /// sort), value is the PM id the VM is assigned to.
    allocation: Vec<Option<usize>>,
    active_pms: i64,
    migrations: i64,
}

/// Exact branch-and-bound solver for one placement problem under one
/// parameter set.
pub struct Allocator<W: Write> {
    problem: Problem,
    params: AllocatorParams,
    log: W,

    pm_free: Vec<Vec<i64>>,
    /// Per-VM-slot candidate PM ids still believed to fit, in the current
    /// value-ordering. Shrinks as sibling allocations consume capacity,
    /// grows back on backtrack via the journal.
    domains: Vec<Vec<usize>>,
    /// Per-VM-slot index into `domains[slot]` of the next candidate to
    /// try. Only meaningful while the slot is on the search path or is
    /// the current frontier VM.
    cursors: Vec<usize>,
    /// Per-VM-slot current allocation, or `None` if unallocated.
    allocation: Vec<Option<usize>>,
    /// Stack of allocated VM slots below the current frontier VM (the
    /// frontier VM itself is tracked separately and is not pushed until
    /// the search descends past it).
    path: Vec<usize>,

    journal: Journal,
    accountant: Accountant,

    max_migrations: i64,
    best: Option<Incumbent>,
    initial_lower_bound: i64,
}

impl<W: Write> Allocator<W> {
    /// Builds a solver for `problem` under `params`, logging a short
    /// preprocessing summary to `log`. VMs are reordered in place per
    /// `params.vm_sort_method`; PM ids are never reordered.
    pub fn new(mut problem: Problem, params: AllocatorParams, mut log: W) -> Result<Self, crate::error::ParamError> {
        params.validate()?;

        let num_pms = problem.pms.len();
        let num_vms = problem.vms.len();

        for (i, pm) in problem.pms.iter().enumerate() {
            debug_assert_eq!(pm.id, i, "PM id must equal its position");
        }

        let bound = if params.intelligent_bound {
            let initials: Vec<Option<usize>> = problem.vms.iter().map(|vm| vm.initial).collect();
            Some(crate::bound::BoundAux::new(&initials, num_pms))
        } else {
            None
        };

        problem.sort_vms(params.vm_sort_method);

        let domains: Vec<Vec<usize>> = problem
            .vms
            .iter()
            .map(|vm| {
                problem
                    .pms
                    .iter()
                    .filter(|pm| Problem::fits(&vm.demand, &pm.capacity))
                    .map(|pm| pm.id)
                    .collect()
            })
            .collect();

        let pm_free: Vec<Vec<i64>> = problem.pms.iter().map(|pm| pm.capacity.clone()).collect();
        let max_migrations = num_pms as i64 / params.max_migrations_ratio;
        let cost_weights = params.cost_weights;

        let _ = writeln!(
            log,
            "[{}] preprocessed: {} VMs, {} PMs, maxMigrations={}",
            params.name, num_vms, num_pms, max_migrations
        );

        let mut allocator = Allocator {
            problem,
            params,
            log,
            pm_free,
            domains,
            cursors: vec![0; num_vms],
            allocation: vec![None; num_vms],
            path: Vec::with_capacity(num_vms),
            journal: Journal::new(),
            accountant: Accountant::new(cost_weights, bound),
            max_migrations,
            best: None,
            initial_lower_bound: 0,
        };

        allocator.initial_lower_bound = allocator.accountant.minimal_extra_cost(allocator.max_migrations);
        Ok(allocator)
    }

    /// Runs the search to completion or until the configured timeout
    /// elapses. Idempotent only in the sense that calling it again after
    /// it returns re-runs from scratch on whatever state is left (not
    /// meaningful in practice; call once per `Allocator`).
    pub fn solve(&mut self) {
        if self.problem.vms.is_empty() {
            self.best = Some(Incumbent {
                cost: 0,
                allocation: Vec::new(),
                active_pms: 0,
                migrations: 0,
            });
            return;
        }

        let start = Instant::now();

        let mut current = match self.pick_next_vm() {
            Some(slot) => slot,
            None => return,
        };
        self.reset_candidates(current);

        loop {
            if start.elapsed().as_secs_f64() >= self.params.timeout_secs {
                let _ = writeln!(self.log, "[{}] timeout reached, stopping search", self.params.name);
                break;
            }

            if self.cursors[current] >= self.domains[current].len() {
                match self.path.pop() {
                    None => break,
                    Some(prev) => {
                        self.deallocate(prev);
                        current = prev;
                        continue;
                    }
                }
            }

            let pm_candidate = self.next_pm_candidate(current);
            self.allocate(current, pm_candidate);

            if self.accountant.migrations() > self.max_migrations {
                self.deallocate(current);
                continue;
            }

            let cost = self.accountant.cost();
            let remaining_budget = self.max_migrations - self.accountant.migrations();
            let extra = self.accountant.minimal_extra_cost(remaining_budget);
            let projected_min = cost + extra;

            let best_so_far = self.best_cost();
            if (projected_min as f64) >= best_so_far * self.params.bound_threshold {
                self.deallocate(current);
                continue;
            }

            if self.path.len() + 1 == self.problem.vms.len() {
                self.record_incumbent(cost);
                self.deallocate(current);
                continue;
            }

            self.path.push(current);
            current = self.pick_next_vm().expect("not all VMs allocated yet");
            self.reset_candidates(current);
        }
    }

    /// The best cost found so far, or `+inf` if no feasible complete
    /// allocation has been recorded.
    pub fn best_cost(&self) -> f64 {
        if self.problem.vms.is_empty() {
            return 0.0;
        }
        self.best.as_ref().map(|b| b.cost as f64).unwrap_or(f64::INFINITY)
    }

    /// The best allocation found, as a map from each VM's external `id`
    /// to the PM id it is assigned to. `None` if no feasible allocation
    /// was found (infeasible instance, or timeout before any complete
    /// allocation).
    pub fn best_allocation(&self) -> Option<HashMap<usize, usize>> {
        let best = self.best.as_ref()?;
        let mut map = HashMap::with_capacity(best.allocation.len());
        for (vm, pm) in self.problem.vms.iter().zip(best.allocation.iter()) {
            if let Some(pm_id) = pm {
                map.insert(vm.id, *pm_id);
            }
        }
        Some(map)
    }

    pub fn best_active_pms(&self) -> Option<i64> {
        self.best.as_ref().map(|b| b.active_pms)
    }

    pub fn best_migrations(&self) -> Option<i64> {
        self.best.as_ref().map(|b| b.migrations)
    }

    /// The intelligent lower bound computed once at construction time,
    /// before any VM is allocated -- a cheap sanity floor for the final
    /// result (`best_cost() >= initial_lower_bound` whenever a solution
    /// was found and the bound is enabled).
    pub fn initial_lower_bound(&self) -> i64 {
        self.initial_lower_bound
    }

    fn pm_is_on(&self, pm: usize) -> bool {
        self.pm_free[pm] != self.problem.pms[pm].capacity
    }

    fn pm_is_off(&self, pm: usize) -> bool {
        !self.pm_is_on(pm)
    }

    fn pick_next_vm(&self) -> Option<usize> {
        let unallocated = || (0..self.problem.vms.len()).filter(|&i| self.allocation[i].is_none());
        if self.params.fail_first {
            strategy::pick_fail_first(unallocated().map(|i| (i, self.domains[i].len())))
        } else {
            strategy::pick_natural(unallocated())
        }
    }

    /// (Re)establishes a fresh cursor over `slot`'s domain: applies the
    /// configured PM value-ordering (falling back to lexicographic when
    /// symmetry-breaking is on but no explicit sort was requested, since
    /// the symmetry check relies on adjacent identical PMs), then floats
    /// the VM's own initial PM to the front if requested.
    fn reset_candidates(&mut self, slot: usize) {
        let method = if self.params.pm_sort_method == SortMethod::None && self.params.symmetry_breaking {
            SortMethod::Lexicographic
        } else {
            self.params.pm_sort_method
        };

        if method != SortMethod::None {
            let pm_free = &self.pm_free;
            sort_pm_indices_by(&mut self.domains[slot], method, |pm| pm_free[pm].clone());
        }

        if self.params.initial_pm_first {
            if let Some(home) = self.problem.vms[slot].initial {
                if let Some(pos) = self.domains[slot].iter().position(|&p| p == home) {
                    let pm = self.domains[slot].remove(pos);
                    self.domains[slot].insert(0, pm);
                }
            }
        }

        self.cursors[slot] = 0;
    }

    /// Returns the PM at the current cursor and advances it, skipping a
    /// run of PMs symmetric to it when symmetry-breaking is on (keeping
    /// the VM's own initial PM, if it falls inside such a run).
    fn next_pm_candidate(&mut self, slot: usize) -> usize {
        let idx = self.cursors[slot];
        let candidate = self.domains[slot][idx];
        self.advance_cursor(slot);
        candidate
    }

    fn advance_cursor(&mut self, slot: usize) {
        if !self.params.symmetry_breaking {
            self.cursors[slot] += 1;
            return;
        }

        let domain_len = self.domains[slot].len();
        let vm_initial = self.problem.vms[slot].initial;
        loop {
            let prev_pm = self.domains[slot][self.cursors[slot]];
            self.cursors[slot] += 1;
            if self.cursors[slot] >= domain_len {
                break;
            }
            let curr_pm = self.domains[slot][self.cursors[slot]];
            let identical = self.pms_identical(prev_pm, curr_pm);
            if identical && Some(curr_pm) != vm_initial {
                continue;
            }
            break;
        }
    }

    fn pms_identical(&self, a: usize, b: usize) -> bool {
        strategy::pms_identical(&self.problem.pms[a].capacity, &self.pm_free[a], &self.problem.pms[b].capacity, &self.pm_free[b])
    }

    /// Commits `slot` to `pm`: reserves capacity, updates active-host and
    /// migration counters, updates the intelligent-bound bookkeeping, and
    /// journals which sibling VMs' domains shrank as a result.
    fn allocate(&mut self, slot: usize, pm: usize) {
        debug_assert!(self.allocation[slot].is_none());

        let pm_was_on = self.pm_is_on(pm);
        if !pm_was_on {
            self.accountant.pm_turned_on();
            if let Some(bound) = self.accountant.bound_mut() {
                bound.on_pm_turned_on(pm);
            }
        }

        let demand = &self.problem.vms[slot].demand;
        for (d, dem) in demand.iter().enumerate() {
            self.pm_free[pm][d] -= dem;
            debug_assert!(self.pm_free[pm][d] >= 0, "PM {} oversubscribed", pm);
        }
        self.allocation[slot] = Some(pm);

        let vm_initial = self.problem.vms[slot].initial;
        if let Some(home) = vm_initial {
            if self.pm_is_off(home) {
                if let Some(bound) = self.accountant.bound_mut() {
                    bound.on_initial_vm_settled(home);
                }
            }
        }

        let is_migration = vm_initial.map_or(false, |home| home != pm);
        if is_migration {
            self.accountant.migration_started();
        }

        let mut no_longer_fits = Vec::new();
        for other in 0..self.problem.vms.len() {
            if other == slot || self.allocation[other].is_some() {
                continue;
            }
            if let Some(pos) = self.domains[other].iter().position(|&p| p == pm) {
                if !Problem::fits(&self.problem.vms[other].demand, &self.pm_free[pm]) {
                    self.domains[other].remove(pos);
                    no_longer_fits.push(other);
                }
            }
        }

        self.journal.push(Change {
            vm: slot,
            target_pm: pm,
            no_longer_fits,
        });
    }

    /// Undoes the allocation of `slot`, restoring capacity, counters,
    /// bound bookkeeping, and sibling domains from the journal entry.
    fn deallocate(&mut self, slot: usize) {
        let pm = self.allocation[slot].take().expect("deallocate called on unallocated VM");
        let vm_initial = self.problem.vms[slot].initial;

        if let Some(home) = vm_initial {
            if self.pm_is_off(home) {
                if let Some(bound) = self.accountant.bound_mut() {
                    bound.on_initial_vm_unsettled(home);
                }
            }
        }

        let demand = &self.problem.vms[slot].demand;
        for (d, dem) in demand.iter().enumerate() {
            self.pm_free[pm][d] += dem;
        }

        if self.pm_is_off(pm) {
            self.accountant.pm_turned_off();
            if let Some(bound) = self.accountant.bound_mut() {
                bound.on_pm_turned_off(pm);
            }
        }

        let was_migration = vm_initial.map_or(false, |home| home != pm);
        if was_migration {
            self.accountant.migration_ended();
        }

        let change = self.journal.pop().expect("journal underflow");
        debug_assert_eq!(change.vm, slot);
        debug_assert_eq!(change.target_pm, pm);
        for other in change.no_longer_fits {
            self.domains[other].push(pm);
        }
    }

    fn record_incumbent(&mut self, cost: i64) {
        let _ = writeln!(
            self.log,
            "[{}] new best: cost={} activePMs={} migrations={}",
            self.params.name,
            cost,
            self.accountant.active_pms(),
            self.accountant.migrations()
        );
        self.best = Some(Incumbent {
            cost,
            allocation: self.allocation.clone(),
            active_pms: self.accountant.active_pms(),
            migrations: self.accountant.migrations(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::CostWeights;
    use crate::problem::{Pm, Vm};

    fn params(name: &str) -> AllocatorParams {
        AllocatorParams {
            name: name.to_string(),
            ..AllocatorParams::default()
        }
    }

    fn vm(id: usize, demand: &[i64], initial: Option<usize>) -> Vm {
        Vm {
            id,
            demand: demand.to_vec(),
            initial,
        }
    }

    fn pm(id: usize, capacity: &[i64]) -> Pm {
        Pm {
            id,
            capacity: capacity.to_vec(),
        }
    }

    /// §8 scenario 1: two PMs each hosting one VM, but the two VMs'
    /// combined demand fits on a single PM -- the optimum migrates one
    /// of them to empty a host. 1 active host + 1 migration = 11.
    #[test]
    fn two_pm_two_vm_forces_one_migration() {
        let problem = Problem::new(
            1,
            vec![vm(0, &[6], Some(0)), vm(1, &[3], Some(1))],
            vec![pm(0, &[10]), pm(1, &[10])],
        );
        let mut p = params("scenario1");
        p.max_migrations_ratio = 1;
        let mut out = Vec::new();
        let mut alloc = Allocator::new(problem, p, &mut out).unwrap();
        alloc.solve();
        assert_eq!(alloc.best_cost(), 11.0);
        assert_eq!(alloc.best_active_pms(), Some(1));
        assert_eq!(alloc.best_migrations(), Some(1));
    }

    /// §8 scenario 2: packing that already fits within two hosts with no
    /// migrations needed. Optimal is 2 active hosts + 0 migrations = 20.
    #[test]
    fn two_dimensional_packing_needs_no_migration() {
        let problem = Problem::new(
            2,
            vec![
                vm(0, &[2, 2], Some(0)),
                vm(1, &[2, 2], Some(0)),
                vm(2, &[2, 2], Some(1)),
            ],
            vec![pm(0, &[5, 5]), pm(1, &[5, 5])],
        );
        let mut p = params("scenario2");
        p.max_migrations_ratio = 1;
        let mut out = Vec::new();
        let mut alloc = Allocator::new(problem, p, &mut out).unwrap();
        alloc.solve();
        assert_eq!(alloc.best_cost(), 20.0);
        assert_eq!(alloc.best_migrations(), Some(0));
    }

    /// §8 scenario 3: three PMs each hosting one VM already, but any two
    /// of the VMs' demands fit together on one PM -- the optimum
    /// consolidates two of them (1 migration) and leaves the third in
    /// place, landing on 2 active hosts + 1 migration = 21.
    #[test]
    fn already_optimal_placement_stays_put() {
        let problem = Problem::new(
            1,
            vec![vm(0, &[4], Some(0)), vm(1, &[4], Some(1)), vm(2, &[4], Some(2))],
            vec![pm(0, &[10]), pm(1, &[10]), pm(2, &[10])],
        );
        let mut p = params("scenario3");
        p.max_migrations_ratio = 1;
        let mut out = Vec::new();
        let mut alloc = Allocator::new(problem, p, &mut out).unwrap();
        alloc.solve();
        assert_eq!(alloc.best_cost(), 21.0);
    }

    /// §8 scenario 6: a zero timeout must return with no allocation and
    /// an unbounded cost, never touching the search loop body.
    #[test]
    fn zero_timeout_finds_nothing() {
        let problem = Problem::new(1, vec![vm(0, &[1], None)], vec![pm(0, &[10])]);
        let mut p = params("scenario6");
        p.timeout_secs = 0.0;
        let mut out = Vec::new();
        let mut alloc = Allocator::new(problem, p, &mut out).unwrap();
        alloc.solve();
        assert_eq!(alloc.best_cost(), f64::INFINITY);
        assert!(alloc.best_allocation().is_none());
    }

    /// §8 scenario 4: two identical empty PMs plus a VM with no initial
    /// PM -- symmetry-breaking must still find the (trivially) optimal
    /// single-host placement.
    #[test]
    fn symmetry_breaking_still_finds_optimum() {
        let problem = Problem::new(1, vec![vm(0, &[1], None)], vec![pm(0, &[10]), pm(1, &[10])]);
        let mut p = params("scenario4");
        p.symmetry_breaking = true;
        let mut out = Vec::new();
        let mut alloc = Allocator::new(problem, p, &mut out).unwrap();
        alloc.solve();
        assert_eq!(alloc.best_cost(), 10.0);
        assert_eq!(alloc.best_active_pms(), Some(1));
    }

    /// §8 scenario 5: a tight bound threshold accepts a suboptimal
    /// incumbent -- the reported cost must be the *first* feasible
    /// incumbent found under the threshold, not necessarily the optimum,
    /// and in particular the search must terminate rather than loop.
    #[test]
    fn loose_bound_threshold_terminates_with_a_feasible_solution() {
        let problem = Problem::new(
            1,
            vec![vm(0, &[3], Some(0)), vm(1, &[3], Some(1)), vm(2, &[3], Some(2))],
            vec![pm(0, &[10]), pm(1, &[10]), pm(2, &[10])],
        );
        let mut p = params("scenario5");
        p.bound_threshold = 0.5;
        p.max_migrations_ratio = 3;
        let mut out = Vec::new();
        let mut alloc = Allocator::new(problem, p, &mut out).unwrap();
        alloc.solve();
        assert!(alloc.best_cost().is_finite());
    }

    #[test]
    fn infeasible_instance_reports_unbounded_cost() {
        let problem = Problem::new(1, vec![vm(0, &[20], None)], vec![pm(0, &[10])]);
        let mut out = Vec::new();
        let mut alloc = Allocator::new(problem, params("infeasible"), &mut out).unwrap();
        alloc.solve();
        assert_eq!(alloc.best_cost(), f64::INFINITY);
        assert!(alloc.best_allocation().is_none());
    }

    #[test]
    fn empty_problem_has_zero_cost() {
        let problem = Problem::new(1, vec![], vec![pm(0, &[10])]);
        let mut out = Vec::new();
        let mut alloc = Allocator::new(problem, params("empty"), &mut out).unwrap();
        alloc.solve();
        assert_eq!(alloc.best_cost(), 0.0);
    }

    #[test]
    fn rejects_invalid_params() {
        let problem = Problem::new(1, vec![vm(0, &[1], None)], vec![pm(0, &[10])]);
        let mut p = params("bad");
        p.bound_threshold = 2.0;
        let out = Vec::new();
        assert!(Allocator::new(problem, p, out).is_err());
    }

    #[test]
    fn cost_weights_are_configurable() {
        let problem = Problem::new(1, vec![vm(0, &[1], None)], vec![pm(0, &[10])]);
        let mut p = params("weights");
        p.cost_weights = CostWeights { hosts: 1, migrations: 5 };
        let mut out = Vec::new();
        let mut alloc = Allocator::new(problem, p, &mut out).unwrap();
        alloc.solve();
        assert_eq!(alloc.best_cost(), 1.0);
    }
}
