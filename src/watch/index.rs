// src/watch/index.rs

//! Reverse dependency index: `dependency -> parents that import it`.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Paths to start and stop watching after a reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchDelta {
    /// Dependencies no parent referenced before, in declaration order.
    pub to_watch: Vec<PathBuf>,
    /// Dependencies no parent references any more.
    pub to_unwatch: Vec<PathBuf>,
}

impl WatchDelta {
    pub fn is_empty(&self) -> bool {
        self.to_watch.is_empty() && self.to_unwatch.is_empty()
    }
}

/// Maps each dependency file to the set of parent files that declare it.
///
/// Invariants:
/// - a key exists iff its parent set is non-empty;
/// - a parent appears at most once per key.
#[derive(Debug, Clone, Default)]
pub struct DependencyIndex {
    parents_by_dep: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace `parent`'s dependency set with `deps` and report which paths
    /// became referenced for the first time or stopped being referenced.
    pub fn reconcile(&mut self, parent: &Path, deps: &[PathBuf]) -> WatchDelta {
        let wanted: HashSet<&Path> = deps.iter().map(PathBuf::as_path).collect();
        let mut delta = WatchDelta::default();

        for dep in deps {
            match self.parents_by_dep.get_mut(dep) {
                Some(parents) => {
                    parents.insert(parent.to_path_buf());
                }
                None => {
                    self.parents_by_dep
                        .insert(dep.clone(), BTreeSet::from([parent.to_path_buf()]));
                    delta.to_watch.push(dep.clone());
                }
            }
        }

        self.parents_by_dep.retain(|dep, parents| {
            if wanted.contains(dep.as_path()) || !parents.remove(parent) {
                return true;
            }
            if parents.is_empty() {
                delta.to_unwatch.push(dep.clone());
                return false;
            }
            true
        });

        delta
    }

    /// Drop every dependency of `parent`.
    pub fn forget(&mut self, parent: &Path) -> WatchDelta {
        self.reconcile(parent, &[])
    }

    pub fn parents_of(&self, dep: &Path) -> Option<&BTreeSet<PathBuf>> {
        self.parents_by_dep.get(dep)
    }

    /// Dependencies currently recorded for `parent`, sorted.
    pub fn dependencies_of(&self, parent: &Path) -> Vec<PathBuf> {
        self.parents_by_dep
            .iter()
            .filter(|(_, parents)| parents.contains(parent))
            .map(|(dep, _)| dep.clone())
            .collect()
    }

    /// Every dependency with at least one parent, sorted.
    pub fn dependencies(&self) -> impl Iterator<Item = &PathBuf> {
        self.parents_by_dep.keys()
    }
}
