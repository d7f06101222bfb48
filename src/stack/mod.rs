//! Branch forest model
//!
//! A [`Forest`] is an immutable snapshot of the parent/child structure of all
//! tracked branches, rebuilt from the metadata store on every invocation.

mod cycle;
mod ops;

pub use cycle::would_cycle;
pub use ops::{create, link_review, set_frozen, set_parent, track, untrack};

use crate::error::{Error, Result};
use crate::tracking::{MetadataStore, TrackedBranch, TrackingState};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

/// Parent/child structure of tracked branches
#[derive(Debug, Clone, Default)]
pub struct Forest {
    branches: BTreeMap<String, TrackedBranch>,
    children: BTreeMap<String, Vec<String>>,
}

impl Forest {
    /// Build a forest from a metadata snapshot.
    pub fn from_state(state: &TrackingState) -> Self {
        let branches = state.branches.clone();
        let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();

        // BTreeMap iteration keeps every child list sorted by name
        for (name, branch) in &branches {
            if let Some(parent) = &branch.parent {
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(name.clone());
            }
        }

        Self { branches, children }
    }

    /// Load the forest from a store.
    pub fn load(store: &dyn MetadataStore) -> Result<Self> {
        Ok(Self::from_state(&store.load()?))
    }

    /// Metadata for a tracked branch.
    pub fn get(&self, name: &str) -> Option<&TrackedBranch> {
        self.branches.get(name)
    }

    /// Whether a branch is tracked.
    pub fn is_tracked(&self, name: &str) -> bool {
        self.branches.contains_key(name)
    }

    /// Number of tracked branches.
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// All tracked branches, sorted by name.
    pub fn branches(&self) -> impl Iterator<Item = &TrackedBranch> {
        self.branches.values()
    }

    /// Parent of a tracked branch. Untracked branches have none.
    pub fn parent(&self, name: &str) -> Option<&str> {
        self.branches.get(name)?.parent.as_deref()
    }

    /// Direct children of a branch (tracked or not), sorted by name.
    pub fn children(&self, name: &str) -> &[String] {
        self.children.get(name).map_or(&[], Vec::as_slice)
    }

    /// Tracked ancestors of `name`, most distant first, excluding `name`.
    ///
    /// Untracked parents (bases) end the chain and are not included.
    pub fn ancestors(&self, name: &str) -> Result<Vec<String>> {
        let mut chain = Vec::new();
        let mut visited: HashSet<&str> = HashSet::from([name]);
        let mut current = name;

        while let Some(parent) = self.parent(current) {
            if !self.is_tracked(parent) {
                break;
            }
            if !visited.insert(parent) {
                return Err(Error::CorruptCycle(parent.to_string()));
            }
            chain.push(parent.to_string());
            current = parent;
        }

        chain.reverse();
        Ok(chain)
    }

    /// The untracked base a branch's chain ends on, if any.
    pub fn base_of(&self, name: &str) -> Result<Option<String>> {
        let ancestors = self.ancestors(name)?;
        let top = ancestors.first().map_or(name, String::as_str);
        Ok(self
            .parent(top)
            .filter(|p| !self.is_tracked(p))
            .map(String::from))
    }

    /// Transitive children of `name` in breadth-first order, excluding `name`.
    pub fn descendants(&self, name: &str) -> Vec<String> {
        let mut result = Vec::new();
        let mut seen: HashSet<&str> = HashSet::from([name]);
        let mut queue: VecDeque<&str> = VecDeque::from([name]);

        while let Some(current) = queue.pop_front() {
            for child in self.children(current) {
                if seen.insert(child.as_str()) {
                    result.push(child.clone());
                    queue.push_back(child);
                }
            }
        }

        result
    }

    /// Tracked branches whose parent is absent or untracked.
    pub fn roots(&self) -> Vec<&str> {
        self.branches
            .values()
            .filter(|b| b.parent.as_deref().is_none_or(|p| !self.is_tracked(p)))
            .map(|b| b.name.as_str())
            .collect()
    }

    /// Untracked parents referenced by tracked branches.
    pub fn bases(&self) -> BTreeSet<String> {
        self.branches
            .values()
            .filter_map(|b| b.parent.as_deref())
            .filter(|p| !self.is_tracked(p))
            .map(String::from)
            .collect()
    }
}
