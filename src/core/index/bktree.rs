//! In-memory BK-tree over 64-bit Hamming hashes.
//!
//! Arena-of-nodes insert/search with triangle-inequality pruning, the same
//! recursion shape as a BK-tree backed by an on-disk heap, adapted to a
//! plain `Vec` arena: index entries are reconstructable from persisted
//! signatures, so nothing here needs to survive a restart on its own.

use super::hamming::{Distance, Hamming};
use std::collections::HashMap;
use uuid::Uuid;

struct Node {
    hash: Hamming,
    file_id: Uuid,
    tombstoned: bool,
    children: HashMap<Distance, usize>,
}

/// A BK-tree over hashes of a single algorithm. Mixing algorithms in one
/// tree is meaningless since Hamming distance only relates hashes produced
/// by the same recipe.
pub struct BkTree {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl BkTree {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }

    /// Number of live (non-tombstoned) entries.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| !n.tombstoned).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `hash` for `file_id`. Root is the first inserted entry; every
    /// other entry recurses down by its integer distance to each node it
    /// visits, landing as a new child where that distance key is unused.
    pub fn insert(&mut self, hash: Hamming, file_id: Uuid) {
        let new_index = self.nodes.len();
        self.nodes.push(Node {
            hash,
            file_id,
            tombstoned: false,
            children: HashMap::new(),
        });

        let Some(mut cur) = self.root else {
            self.root = Some(new_index);
            return;
        };

        loop {
            let dist = self.nodes[cur].hash.distance_to(hash);
            match self.nodes[cur].children.get(&dist) {
                Some(&child) => cur = child,
                None => {
                    self.nodes[cur].children.insert(dist, new_index);
                    break;
                }
            }
        }
    }

    /// Tombstone every live node carrying `file_id`. Searches skip
    /// tombstoned nodes; the arena slot and its children stay in place
    /// until `compact` rebuilds the tree.
    pub fn remove(&mut self, file_id: Uuid) {
        for node in &mut self.nodes {
            if node.file_id == file_id {
                node.tombstoned = true;
            }
        }
    }

    /// Fraction of arena slots that are tombstoned, used to decide when a
    /// rebuild is worthwhile.
    pub fn tombstone_ratio(&self) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }
        let tombstoned = self.nodes.iter().filter(|n| n.tombstoned).count();
        tombstoned as f64 / self.nodes.len() as f64
    }

    /// Rebuild the tree from its live entries, discarding tombstoned slots
    /// and shrinking the arena back down.
    pub fn compact(&mut self) {
        let live: Vec<(Hamming, Uuid)> = self
            .nodes
            .iter()
            .filter(|n| !n.tombstoned)
            .map(|n| (n.hash, n.file_id))
            .collect();
        self.nodes.clear();
        self.root = None;
        for (hash, file_id) in live {
            self.insert(hash, file_id);
        }
    }

    /// Every live entry within Hamming radius `r` of `query`, sorted by
    /// ascending distance. At each visited node N with `d = hamming(N, query)`,
    /// a child at distance key `k` is only worth visiting when
    /// `|d - k| <= r`, since the triangle inequality rules out anything
    /// closer than that from matching.
    pub fn search(&self, query: Hamming, radius: Distance) -> Vec<(Uuid, Distance)> {
        let mut matches = Vec::new();
        let Some(root) = self.root else {
            return matches;
        };

        let mut stack = vec![root];
        while let Some(cur) = stack.pop() {
            let node = &self.nodes[cur];
            let dist = node.hash.distance_to(query);
            if dist <= radius && !node.tombstoned {
                matches.push((node.file_id, dist));
            }

            let lo = dist.saturating_sub(radius);
            let hi = dist.saturating_add(radius);
            for (&key, &child) in &node.children {
                if key >= lo && key <= hi {
                    stack.push(child);
                }
            }
        }

        matches.sort_by_key(|&(_, d)| d);
        matches
    }
}

impl Default for BkTree {
    fn default() -> Self {
        Self::new()
    }
}
