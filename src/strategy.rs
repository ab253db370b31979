//! Pure variable-ordering and symmetry-breaking helpers (§4.4).
//!
//! Value ordering (sorting a VM's domain) lives in
//! [`crate::problem::sort_pm_indices_by`]; this module covers the two
//! pieces that need no access to the sorted domain itself: picking the
//! next VM to branch on, and deciding whether two PMs are symmetric.

/// Picks the unallocated VM with the smallest domain, ties broken by VM
/// index (fail-first, §4.4). `candidates` yields `(vm_id, domain_len)` for
/// every currently-unallocated VM. Returns `None` if `candidates` is empty.
pub fn pick_fail_first(candidates: impl Iterator<Item = (usize, usize)>) -> Option<usize> {
    candidates
        .min_by_key(|&(vm_id, domain_len)| (domain_len, vm_id))
        .map(|(vm_id, _)| vm_id)
}

/// Picks the unallocated VM with the smallest index (natural ordering,
/// §4.4). `candidates` yields the id of every currently-unallocated VM.
pub fn pick_natural(candidates: impl Iterator<Item = usize>) -> Option<usize> {
    candidates.min()
}

/// Two PMs are "identical" for symmetry-breaking purposes iff they share
/// the same capacity vector and both are currently completely empty
/// (free resources equal capacity). Neither is tested for emptiness by
/// inspecting allocations directly -- the caller passes in each PM's
/// current free-resources vector, and emptiness is `free == capacity`.
pub fn pms_identical(capacity_a: &[i64], free_a: &[i64], capacity_b: &[i64], free_b: &[i64]) -> bool {
    capacity_a == capacity_b && free_a == capacity_a && free_b == capacity_b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_first_picks_smallest_domain() {
        let candidates = vec![(0usize, 3usize), (1, 1), (2, 2)];
        assert_eq!(pick_fail_first(candidates.into_iter()), Some(1));
    }

    #[test]
    fn fail_first_breaks_ties_by_vm_index() {
        let candidates = vec![(2usize, 1usize), (0, 1), (1, 1)];
        assert_eq!(pick_fail_first(candidates.into_iter()), Some(0));
    }

    #[test]
    fn fail_first_empty_returns_none() {
        assert_eq!(pick_fail_first(std::iter::empty()), None);
    }

    #[test]
    fn natural_picks_smallest_index() {
        assert_eq!(pick_natural(vec![3, 1, 4, 1, 5].into_iter()), Some(1));
    }

    #[test]
    fn pms_identical_requires_same_capacity_and_both_empty() {
        assert!(pms_identical(&[5, 5], &[5, 5], &[5, 5], &[5, 5]));
        // one is not empty
        assert!(!pms_identical(&[5, 5], &[3, 5], &[5, 5], &[5, 5]));
        // different capacity
        assert!(!pms_identical(&[5, 5], &[5, 5], &[4, 5], &[4, 5]));
    }
}
