//! Facade over the exact-match map and per-algorithm BK-trees.
//!
//! Below 1,000 live entries per algorithm, queries fall back to a linear
//! scan — cheaper than tree traversal at that scale and trivially correct
//! against it, since a BK-tree search is required to return exactly the
//! same set as a linear scan for any radius.

use super::bktree::BkTree;
use super::hamming::{Distance, Hamming};
use crate::core::hasher::{ContentHash, HashAlgorithmKind, PerceptualHash};
use crate::error::IndexError;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

/// Below this many live entries for an algorithm, queries use a linear
/// scan instead of the BK-tree.
const LINEAR_FALLBACK_THRESHOLD: usize = 1_000;

/// Tombstone fraction in a BK-tree that triggers a compacting rebuild.
const COMPACTION_TOMBSTONE_RATIO: f64 = 0.10;

/// The Hamming radius spec.md prescribes as the default for near queries.
pub const DEFAULT_NEAR_RADIUS: Distance = 5;

/// A near-match result from `query_near`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub file_id: Uuid,
    pub distance: Distance,
}

/// Snapshot of index occupancy, used for diagnostics and tuning.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub count_by_algorithm: HashMap<HashAlgorithmKind, usize>,
    pub mean_pairwise_distance_sample: f64,
}

struct AlgorithmBucket {
    entries: HashMap<Uuid, u64>,
    tree: BkTree,
}

impl AlgorithmBucket {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            tree: BkTree::new(),
        }
    }

    fn insert(&mut self, file_id: Uuid, hash: u64) {
        if self.entries.contains_key(&file_id) {
            self.tree.remove(file_id);
        }
        self.entries.insert(file_id, hash);
        self.tree.insert(Hamming(hash), file_id);
        if self.tree.tombstone_ratio() >= COMPACTION_TOMBSTONE_RATIO {
            self.tree.compact();
        }
    }

    fn remove(&mut self, file_id: Uuid) {
        if self.entries.remove(&file_id).is_some() {
            self.tree.remove(file_id);
            if self.tree.tombstone_ratio() >= COMPACTION_TOMBSTONE_RATIO {
                self.tree.compact();
            }
        }
    }

    fn search(&self, query: Hamming, radius: Distance, exclude: Option<Uuid>) -> Vec<Match> {
        let mut matches: Vec<Match> = if self.entries.len() < LINEAR_FALLBACK_THRESHOLD {
            let mut found: Vec<Match> = self
                .entries
                .iter()
                .filter(|&(&id, _)| Some(id) != exclude)
                .map(|(&id, &hash)| Match {
                    file_id: id,
                    distance: Hamming(hash).distance_to(query),
                })
                .filter(|m| m.distance <= radius)
                .collect();
            found.sort_by_key(|m| m.distance);
            found
        } else {
            self.tree
                .search(query, radius)
                .into_iter()
                .filter(|&(id, _)| Some(id) != exclude)
                .map(|(file_id, distance)| Match { file_id, distance })
                .collect()
        };
        matches.sort_by_key(|m| m.distance);
        matches
    }
}

struct Inner {
    exact: HashMap<ContentHash, HashSet<Uuid>>,
    file_content_hash: HashMap<Uuid, ContentHash>,
    algorithms: HashMap<HashAlgorithmKind, AlgorithmBucket>,
}

impl Inner {
    fn new() -> Self {
        Self {
            exact: HashMap::new(),
            file_content_hash: HashMap::new(),
            algorithms: HashMap::new(),
        }
    }

    fn bucket_mut(&mut self, algorithm: HashAlgorithmKind) -> &mut AlgorithmBucket {
        self.algorithms
            .entry(algorithm)
            .or_insert_with(AlgorithmBucket::new)
    }
}

/// Thread-safe facade combining an exact-content-hash map with one BK-tree
/// per perceptual hash algorithm. A single `RwLock` serializes the rare
/// mutation against many concurrent reads, since the scan pipeline has
/// exactly one writer (the indexer stage) and many readers (grouper
/// queries, stats probes).
pub struct SimilarityIndex {
    inner: RwLock<Inner>,
}

impl SimilarityIndex {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::new()),
        }
    }

    /// Insert `file_id` into every relevant structure: the exact map when a
    /// content hash is given, and one BK-tree per perceptual hash. Adding
    /// the same `(file_id, hashes)` tuple twice leaves the index state
    /// equivalent to a single add.
    pub fn add(
        &self,
        file_id: Uuid,
        content_hash: Option<ContentHash>,
        perceptual_hashes: &[PerceptualHash],
    ) {
        let mut inner = self.inner.write().expect("similarity index lock poisoned");

        if let Some(old) = inner.file_content_hash.get(&file_id).copied() {
            if let Some(set) = inner.exact.get_mut(&old) {
                set.remove(&file_id);
                if set.is_empty() {
                    inner.exact.remove(&old);
                }
            }
        }
        if let Some(hash) = content_hash {
            inner.file_content_hash.insert(file_id, hash);
            inner.exact.entry(hash).or_default().insert(file_id);
        } else {
            inner.file_content_hash.remove(&file_id);
        }

        for hash in perceptual_hashes {
            inner.bucket_mut(hash.algorithm).insert(file_id, hash.hash);
        }
    }

    /// Tombstone `file_id` out of every structure it appears in.
    pub fn remove(&self, file_id: Uuid) {
        let mut inner = self.inner.write().expect("similarity index lock poisoned");

        if let Some(hash) = inner.file_content_hash.remove(&file_id) {
            if let Some(set) = inner.exact.get_mut(&hash) {
                set.remove(&file_id);
                if set.is_empty() {
                    inner.exact.remove(&hash);
                }
            }
        }
        for bucket in inner.algorithms.values_mut() {
            bucket.remove(file_id);
        }
    }

    /// File ids sharing the given content hash, i.e. byte-identical files.
    pub fn query_exact(&self, content_hash: &ContentHash) -> Vec<Uuid> {
        let inner = self.inner.read().expect("similarity index lock poisoned");
        inner
            .exact
            .get(content_hash)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Files whose `algorithm` hash is within `radius` of `hash`, sorted by
    /// ascending distance, excluding `exclude` when given.
    pub fn query_near(
        &self,
        hash: u64,
        algorithm: HashAlgorithmKind,
        radius: Distance,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Match>, IndexError> {
        let inner = self.inner.read().expect("similarity index lock poisoned");
        let Some(bucket) = inner.algorithms.get(&algorithm) else {
            return Ok(Vec::new());
        };
        Ok(bucket.search(Hamming(hash), radius, exclude))
    }

    pub fn stats(&self) -> IndexStats {
        let inner = self.inner.read().expect("similarity index lock poisoned");
        let count_by_algorithm = inner
            .algorithms
            .iter()
            .map(|(&algo, bucket)| (algo, bucket.entries.len()))
            .collect();

        let mean_pairwise_distance_sample = inner
            .algorithms
            .values()
            .map(|bucket| mean_pairwise_sample(&bucket.entries))
            .filter(|sample| sample.is_finite())
            .collect::<Vec<f64>>();
        let mean_pairwise_distance_sample = if mean_pairwise_distance_sample.is_empty() {
            0.0
        } else {
            mean_pairwise_distance_sample.iter().sum::<f64>()
                / mean_pairwise_distance_sample.len() as f64
        };

        IndexStats {
            count_by_algorithm,
            mean_pairwise_distance_sample,
        }
    }
}

impl Default for SimilarityIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean Hamming distance over up to the first 64 entries, a cheap estimate
/// rather than an expensive all-pairs scan over the full bucket.
fn mean_pairwise_sample(entries: &HashMap<Uuid, u64>) -> f64 {
    const SAMPLE_CAP: usize = 64;
    let sample: Vec<u64> = entries.values().take(SAMPLE_CAP).copied().collect();
    if sample.len() < 2 {
        return f64::NAN;
    }
    let mut total = 0u64;
    let mut pairs = 0u64;
    for i in 0..sample.len() {
        for j in (i + 1)..sample.len() {
            total += Hamming(sample[i]).distance_to(Hamming(sample[j])) as u64;
            pairs += 1;
        }
    }
    total as f64 / pairs as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn phash(algorithm: HashAlgorithmKind, hash: u64) -> PerceptualHash {
        PerceptualHash {
            algorithm,
            hash,
            width: 100,
            height: 100,
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn query_exact_finds_byte_identical_files() {
        let index = SimilarityIndex::new();
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let hash = [7u8; 32];

        index.add(a, Some(hash), &[]);
        index.add(b, Some(hash), &[]);

        let mut found = index.query_exact(&hash);
        found.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(found, expected);
    }

    #[test]
    fn query_near_respects_radius_and_algorithm() {
        let index = SimilarityIndex::new();
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);

        index.add(a, None, &[phash(HashAlgorithmKind::Difference, 0b0000)]);
        index.add(b, None, &[phash(HashAlgorithmKind::Difference, 0b1111)]);

        let close = index
            .query_near(0b0000, HashAlgorithmKind::Difference, 0, None)
            .unwrap();
        assert_eq!(close, vec![Match { file_id: a, distance: 0 }]);

        let wide = index
            .query_near(0b0000, HashAlgorithmKind::Difference, 4, None)
            .unwrap();
        assert_eq!(wide.len(), 2);
    }

    #[test]
    fn query_near_excludes_given_file() {
        let index = SimilarityIndex::new();
        let a = Uuid::from_u128(1);
        index.add(a, None, &[phash(HashAlgorithmKind::Perceptual, 42)]);

        let found = index
            .query_near(42, HashAlgorithmKind::Perceptual, 0, Some(a))
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn remove_clears_exact_and_near_lookups() {
        let index = SimilarityIndex::new();
        let a = Uuid::from_u128(1);
        let hash = [3u8; 32];
        index.add(a, Some(hash), &[phash(HashAlgorithmKind::Difference, 99)]);

        index.remove(a);

        assert!(index.query_exact(&hash).is_empty());
        assert!(index
            .query_near(99, HashAlgorithmKind::Difference, 0, None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn idempotent_add_leaves_single_entry() {
        let index = SimilarityIndex::new();
        let a = Uuid::from_u128(1);
        let hash = [9u8; 32];
        let hashes = [phash(HashAlgorithmKind::Difference, 5)];

        index.add(a, Some(hash), &hashes);
        index.add(a, Some(hash), &hashes);

        assert_eq!(index.query_exact(&hash), vec![a]);
        let stats = index.stats();
        assert_eq!(stats.count_by_algorithm[&HashAlgorithmKind::Difference], 1);
    }

    #[test]
    fn query_near_with_unknown_algorithm_returns_empty() {
        let index = SimilarityIndex::new();
        let found = index
            .query_near(0, HashAlgorithmKind::Perceptual, 5, None)
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn stats_counts_entries_per_algorithm() {
        let index = SimilarityIndex::new();
        index.add(
            Uuid::from_u128(1),
            None,
            &[phash(HashAlgorithmKind::Difference, 1)],
        );
        index.add(
            Uuid::from_u128(2),
            None,
            &[phash(HashAlgorithmKind::Perceptual, 2)],
        );

        let stats = index.stats();
        assert_eq!(stats.count_by_algorithm[&HashAlgorithmKind::Difference], 1);
        assert_eq!(stats.count_by_algorithm[&HashAlgorithmKind::Perceptual], 1);
    }
}
