//! Union-find over cluster ids
//!
//! Cluster ids are provisional until every fusion recorded during a run has
//! been applied. `FusionMap` keeps the pending merges as a parent forest and
//! resolves any id to its canonical root, compressing paths as it goes.

use std::collections::HashMap;

/// Disjoint-set forest over `i32` cluster ids.
///
/// Ids that were never fused resolve to themselves and take no storage. The
/// smaller id always wins a fusion, so canonical ids are stable across
/// insertion order.
#[derive(Debug, Default)]
pub struct FusionMap {
    parent: HashMap<i32, i32>,
}

impl FusionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ids that currently point at another id
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Canonical id for `id`, following fusions to the root.
    ///
    /// Every id on the walked path is re-pointed at the root, so repeated
    /// lookups stay cheap.
    pub fn resolve(&mut self, id: i32) -> i32 {
        let mut root = id;
        while let Some(&next) = self.parent.get(&root) {
            root = next;
        }
        let mut cur = id;
        while let Some(&next) = self.parent.get(&cur) {
            self.parent.insert(cur, root);
            cur = next;
        }
        root
    }

    /// Record that `a` and `b` are the same cluster.
    ///
    /// Returns `true` when the call joined two previously distinct roots.
    pub fn fuse(&mut self, a: i32, b: i32) -> bool {
        let root_a = self.resolve(a);
        let root_b = self.resolve(b);
        if root_a == root_b {
            return false;
        }
        let (winner, loser) = if root_a < root_b {
            (root_a, root_b)
        } else {
            (root_b, root_a)
        };
        self.parent.insert(loser, winner);
        true
    }
}
