//! Cycle guard for parent changes

use super::Forest;
use crate::error::{Error, Result};
use std::collections::HashSet;

/// Whether setting `parent(branch) = proposed` would make the forest cyclic.
///
/// Must pass before any new parent value is written. An absent or empty
/// `proposed` parent never cycles. If the walk from `proposed` loops without
/// reaching `branch`, the stored metadata is already corrupt and
/// [`Error::CorruptCycle`] is returned instead of a verdict.
pub fn would_cycle(forest: &Forest, branch: &str, proposed: Option<&str>) -> Result<bool> {
    let Some(proposed) = proposed.filter(|p| !p.is_empty()) else {
        return Ok(false);
    };

    let mut visited: HashSet<&str> = HashSet::new();
    let mut current = proposed;

    loop {
        if current == branch {
            return Ok(true);
        }
        if !visited.insert(current) {
            return Err(Error::CorruptCycle(current.to_string()));
        }
        match forest.parent(current) {
            Some(parent) => current = parent,
            None => return Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::forest;
    use super::*;

    #[test]
    fn test_self_parent_is_cycle() {
        let f = forest(&[("b", "main")]);
        assert!(would_cycle(&f, "b", Some("b")).unwrap());
    }

    #[test]
    fn test_no_parent_never_cycles() {
        let f = forest(&[("b", "main")]);
        assert!(!would_cycle(&f, "b", None).unwrap());
        assert!(!would_cycle(&f, "b", Some("")).unwrap());
    }

    #[test]
    fn test_descendant_as_parent_is_cycle() {
        let f = forest(&[("a", "main"), ("b", "a"), ("c", "b")]);
        assert!(would_cycle(&f, "a", Some("c")).unwrap());
        assert!(would_cycle(&f, "b", Some("c")).unwrap());
    }

    #[test]
    fn test_sibling_or_base_is_fine() {
        let f = forest(&[("a", "main"), ("b", "a"), ("c", "a")]);
        assert!(!would_cycle(&f, "b", Some("c")).unwrap());
        assert!(!would_cycle(&f, "b", Some("main")).unwrap());
        assert!(!would_cycle(&f, "b", Some("untracked")).unwrap());
    }

    #[test]
    fn test_existing_cycle_is_corrupt() {
        let f = forest(&[("x", "y"), ("y", "x"), ("b", "main")]);
        assert!(matches!(
            would_cycle(&f, "b", Some("x")),
            Err(Error::CorruptCycle(_))
        ));
    }

    #[test]
    fn test_matches_pointer_walk_definition() {
        // would_cycle(b, p) iff following parents from b after the change revisits b
        let f = forest(&[("a", "main"), ("b", "a"), ("c", "b"), ("d", "main")]);
        for branch in ["a", "b", "c", "d"] {
            for parent in ["main", "a", "b", "c", "d"] {
                let mut state = crate::tracking::TrackingState::new();
                for tracked in f.branches() {
                    state.track(tracked.clone());
                }
                let mut changed = state.get(branch).unwrap().clone();
                changed.parent = Some(parent.to_string());
                state.track(changed);
                let after = Forest::from_state(&state);

                let mut seen = HashSet::new();
                let mut cur = branch;
                let mut revisits = false;
                while let Some(p) = after.parent(cur) {
                    if p == branch {
                        revisits = true;
                        break;
                    }
                    if !seen.insert(p) {
                        break;
                    }
                    cur = p;
                }

                assert_eq!(
                    would_cycle(&f, branch, Some(parent)).unwrap(),
                    revisits,
                    "{branch} -> {parent}"
                );
            }
        }
    }
}
