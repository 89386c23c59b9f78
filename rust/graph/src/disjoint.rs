// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Union-find over hashable keys.

use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Disjoint-set forest with path compression. The smallest key of a class
/// is always its root, so representatives are deterministic.
#[derive(Debug, Clone)]
pub struct DisjointSet<K> {
    parent: FxHashMap<K, K>,
}

impl<K: Copy + Eq + Hash + Ord> DisjointSet<K> {
    pub fn new() -> Self {
        Self {
            parent: FxHashMap::default(),
        }
    }

    /// Registers a singleton class (no-op if already known).
    pub fn insert(&mut self, key: K) {
        self.parent.entry(key).or_insert(key);
    }

    /// Representative of `key`'s class. Unknown keys are their own class.
    pub fn find(&mut self, key: K) -> K {
        let mut root = key;
        while let Some(&p) = self.parent.get(&root) {
            if p == root {
                break;
            }
            root = p;
        }

        let mut current = key;
        while current != root {
            let Some(next) = self.parent.insert(current, root) else {
                break;
            };
            current = next;
        }
        root
    }

    /// Merges the classes of `a` and `b`. Returns `false` if already merged.
    pub fn union(&mut self, a: K, b: K) -> bool {
        self.insert(a);
        self.insert(b);
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
        self.parent.insert(child, root);
        true
    }

    pub fn same(&mut self, a: K, b: K) -> bool {
        self.find(a) == self.find(b)
    }

    /// All registered classes with more than one member, members sorted.
    pub fn classes(&mut self) -> Vec<Vec<K>> {
        let keys: Vec<K> = self.parent.keys().copied().collect();
        let mut groups: FxHashMap<K, Vec<K>> = FxHashMap::default();
        for k in keys {
            let root = self.find(k);
            groups.entry(root).or_default().push(k);
        }
        let mut classes: Vec<Vec<K>> = groups
            .into_values()
            .filter(|members| members.len() > 1)
            .map(|mut members| {
                members.sort_unstable();
                members
            })
            .collect();
        classes.sort_unstable();
        classes
    }
}

impl<K: Copy + Eq + Hash + Ord> Default for DisjointSet<K> {
    fn default() -> Self {
        Self::new()
    }
}
