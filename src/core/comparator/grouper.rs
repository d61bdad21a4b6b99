//! Groups files into duplicate clusters via an exact content-hash pass
//! followed by a near-duplicate pass over the perceptual similarity index.
//!
//! Generalizes the teacher's path-keyed Union-Find grouper to operate on
//! file ids and confidence scores instead of paths and ordinal match types.

use super::{DuplicateGroup, FileSignature, GrouperConfig, MatchResult, SIZE_RATIO_GATE};
use crate::core::hasher::ContentHash;
use crate::core::index::SimilarityIndex;
use crate::error::IndexError;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Union-Find over file ids, with path compression.
struct UnionFind {
    parent: HashMap<Uuid, Uuid>,
}

impl UnionFind {
    fn new(items: impl IntoIterator<Item = Uuid>) -> Self {
        let mut parent = HashMap::new();
        for item in items {
            parent.insert(item, item);
        }
        Self { parent }
    }

    fn find(&mut self, x: Uuid) -> Uuid {
        let p = *self.parent.get(&x).unwrap_or(&x);
        if p != x {
            let root = self.find(p);
            self.parent.insert(x, root);
            root
        } else {
            x
        }
    }

    fn union(&mut self, a: Uuid, b: Uuid) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            self.parent.insert(root_a, root_b);
        }
    }

    fn groups(&mut self) -> HashMap<Uuid, Vec<Uuid>> {
        let items: Vec<_> = self.parent.keys().copied().collect();
        let mut groups: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for item in items {
            let root = self.find(item);
            groups.entry(root).or_default().push(item);
        }
        groups
    }
}

/// Derive a group id deterministically from its members, so two scans of
/// identical input produce identical `DuplicateGroup` ids instead of a
/// fresh random id each run.
fn group_id(members: &[Uuid]) -> Uuid {
    let mut sorted: Vec<Uuid> = members.to_vec();
    sorted.sort();
    let bytes: Vec<u8> = sorted.iter().flat_map(|id| id.as_bytes().to_vec()).collect();
    Uuid::new_v5(&Uuid::NAMESPACE_OID, &bytes)
}

fn size_ratio_ok(a: u64, b: u64) -> bool {
    if a == 0 || b == 0 {
        return a == b;
    }
    let (small, large) = if a < b { (a, b) } else { (b, a) };
    SIZE_RATIO_GATE.contains(&(small as f64 / large as f64))
}

/// Fuses exact and near-duplicate evidence into confidence-scored groups.
pub struct Grouper;

impl Grouper {
    pub fn new() -> Self {
        Self
    }

    /// Run the full exact + near grouping algorithm over `files`, which must
    /// already be reflected in `index`.
    pub fn group(
        &self,
        files: &[FileSignature],
        index: &SimilarityIndex,
        config: &GrouperConfig,
    ) -> Result<Vec<DuplicateGroup>, IndexError> {
        let by_id: HashMap<Uuid, &FileSignature> = files.iter().map(|f| (f.id, f)).collect();

        let (exact_groups, exactly_grouped) = Self::exact_pass(files);

        let mut groups = exact_groups;

        if !config.exact_only {
            let near_groups = self.near_pass(files, &by_id, index, config, &exactly_grouped)?;
            groups.extend(near_groups);
        }

        groups.retain(|g| g.confidence >= config.confidence_floor);

        for group in &mut groups {
            group.representative = Self::pick_representative(&group.members, &by_id);
        }

        Ok(groups)
    }

    fn exact_pass(files: &[FileSignature]) -> (Vec<DuplicateGroup>, HashSet<Uuid>) {
        let mut buckets: HashMap<ContentHash, Vec<Uuid>> = HashMap::new();
        for file in files {
            if let Some(hash) = file.content_hash {
                buckets.entry(hash).or_default().push(file.id);
            }
        }

        let mut grouped = HashSet::new();
        let mut groups = Vec::new();
        for members in buckets.into_values() {
            if members.len() < 2 {
                continue;
            }
            grouped.extend(members.iter().copied());
            groups.push(DuplicateGroup {
                id: group_id(&members),
                representative: members[0],
                members,
                confidence: 1.0,
            });
        }
        (groups, grouped)
    }

    fn near_pass(
        &self,
        files: &[FileSignature],
        by_id: &HashMap<Uuid, &FileSignature>,
        index: &SimilarityIndex,
        config: &GrouperConfig,
        exactly_grouped: &HashSet<Uuid>,
    ) -> Result<Vec<DuplicateGroup>, IndexError> {
        let candidates: Vec<&FileSignature> = files
            .iter()
            .filter(|f| !exactly_grouped.contains(&f.id))
            .collect();

        // (lower id, higher id) -> weakest (largest) Hamming distance seen
        // across any matching algorithm, i.e. the pair's worst-case support.
        let mut edges: HashMap<(Uuid, Uuid), u32> = HashMap::new();

        for file in &candidates {
            for hash in &file.perceptual_hashes {
                let matches = index.query_near(hash.hash, hash.algorithm, config.near_radius, Some(file.id))?;
                for m in matches {
                    if exactly_grouped.contains(&m.file_id) {
                        continue;
                    }
                    let Some(other) = by_id.get(&m.file_id) else {
                        continue;
                    };
                    if !size_ratio_ok(file.size, other.size) {
                        continue;
                    }

                    let key = if file.id < m.file_id {
                        (file.id, m.file_id)
                    } else {
                        (m.file_id, file.id)
                    };
                    edges
                        .entry(key)
                        .and_modify(|d| *d = (*d).min(m.distance))
                        .or_insert(m.distance);
                }
            }
        }

        let ids: Vec<Uuid> = candidates.iter().map(|f| f.id).collect();
        let mut uf = UnionFind::new(ids);
        for &(a, b) in edges.keys() {
            uf.union(a, b);
        }

        // Track the weakest (lowest-confidence) edge touching each final
        // component root, conservative per spec.
        let mut min_confidence_by_root: HashMap<Uuid, f64> = HashMap::new();
        for (&(a, _b), &distance) in &edges {
            let root = uf.find(a);
            let confidence = edge_confidence(distance);
            min_confidence_by_root
                .entry(root)
                .and_modify(|c| *c = c.min(confidence))
                .or_insert(confidence);
        }

        let groups = uf
            .groups()
            .into_iter()
            .filter(|(_, members)| members.len() >= 2)
            .map(|(root, members)| DuplicateGroup {
                id: group_id(&members),
                representative: members[0],
                confidence: min_confidence_by_root.get(&root).copied().unwrap_or(0.0),
                members,
            })
            .collect();

        Ok(groups)
    }

    /// Largest dimensions first, then earliest created_at, then
    /// lexicographically smallest path.
    fn pick_representative(members: &[Uuid], by_id: &HashMap<Uuid, &FileSignature>) -> Uuid {
        members
            .iter()
            .copied()
            .min_by(|&a, &b| {
                let fa = by_id[&a];
                let fb = by_id[&b];
                let area_a = fa.width.unwrap_or(0) as u64 * fa.height.unwrap_or(0) as u64;
                let area_b = fb.width.unwrap_or(0) as u64 * fb.height.unwrap_or(0) as u64;
                area_b
                    .cmp(&area_a)
                    .then_with(|| fa.created_at.cmp(&fb.created_at))
                    .then_with(|| fa.path.cmp(&fb.path))
            })
            .expect("groups always have at least one member")
    }
}

impl Default for Grouper {
    fn default() -> Self {
        Self::new()
    }
}

fn edge_confidence(distance: u32) -> f64 {
    1.0 - (distance as f64 / crate::core::index::Hamming::BITS as f64)
}

/// Reconstruct the pairwise matches backing a group, for UI explanations.
pub fn explain_group(
    members: &[Uuid],
    by_id: &HashMap<Uuid, &FileSignature>,
    index: &SimilarityIndex,
    near_radius: u32,
) -> Vec<MatchResult> {
    let mut results = Vec::new();
    for &id in members {
        let Some(file) = by_id.get(&id) else { continue };
        for hash in &file.perceptual_hashes {
            if let Ok(matches) = index.query_near(hash.hash, hash.algorithm, near_radius, Some(id)) {
                for m in matches {
                    if members.contains(&m.file_id) {
                        results.push(MatchResult {
                            file_a: id,
                            file_b: m.file_id,
                            distance: m.distance,
                            confidence: edge_confidence(m.distance),
                        });
                    }
                }
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hasher::{HashAlgorithmKind, PerceptualHash};
    use chrono::Utc;
    use std::path::PathBuf;

    fn signature(
        id: Uuid,
        path: &str,
        size: u64,
        content_hash: Option<ContentHash>,
        hash: Option<u64>,
    ) -> FileSignature {
        FileSignature {
            id,
            path: PathBuf::from(path),
            size,
            width: Some(100),
            height: Some(100),
            created_at: Utc::now(),
            content_hash,
            perceptual_hashes: hash
                .map(|h| {
                    vec![PerceptualHash {
                        algorithm: HashAlgorithmKind::Difference,
                        hash: h,
                        width: 100,
                        height: 100,
                        computed_at: Utc::now(),
                    }]
                })
                .unwrap_or_default(),
        }
    }

    #[test]
    fn exact_pass_groups_byte_identical_files() {
        let index = SimilarityIndex::new();
        let a = signature(Uuid::new_v4(), "/a.jpg", 1000, Some([1u8; 32]), None);
        let b = signature(Uuid::new_v4(), "/b.jpg", 1000, Some([1u8; 32]), None);
        index.add(a.id, a.content_hash, &[]);
        index.add(b.id, b.content_hash, &[]);

        let groups = Grouper::new()
            .group(&[a, b], &index, &GrouperConfig::default())
            .unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].confidence, 1.0);
        assert_eq!(groups[0].members.len(), 2);
    }

    #[test]
    fn near_pass_groups_similar_hashes_within_radius() {
        let index = SimilarityIndex::new();
        let a = signature(Uuid::new_v4(), "/a.jpg", 1000, None, Some(0b0000_0000));
        let b = signature(Uuid::new_v4(), "/b.jpg", 1000, None, Some(0b0000_0011));
        index.add(a.id, None, &a.perceptual_hashes);
        index.add(b.id, None, &b.perceptual_hashes);

        let config = GrouperConfig {
            near_radius: 4,
            ..GrouperConfig::default()
        };
        let groups = Grouper::new().group(&[a, b], &index, &config).unwrap();

        assert_eq!(groups.len(), 1);
        assert!(groups[0].confidence > 0.9);
    }

    #[test]
    fn near_pass_rejects_mismatched_sizes() {
        let index = SimilarityIndex::new();
        let a = signature(Uuid::new_v4(), "/a.jpg", 10_000, None, Some(0));
        let b = signature(Uuid::new_v4(), "/b.jpg", 100, None, Some(0));
        index.add(a.id, None, &a.perceptual_hashes);
        index.add(b.id, None, &b.perceptual_hashes);

        let groups = Grouper::new()
            .group(&[a, b], &index, &GrouperConfig::default())
            .unwrap();

        assert!(groups.is_empty());
    }

    #[test]
    fn groups_below_confidence_floor_are_dropped() {
        let index = SimilarityIndex::new();
        let a = signature(Uuid::new_v4(), "/a.jpg", 1000, None, Some(0b0000_0000));
        let b = signature(Uuid::new_v4(), "/b.jpg", 1000, None, Some(0b1111_1111));
        index.add(a.id, None, &a.perceptual_hashes);
        index.add(b.id, None, &b.perceptual_hashes);

        let config = GrouperConfig {
            near_radius: 16,
            confidence_floor: 0.85,
            ..GrouperConfig::default()
        };
        let groups = Grouper::new().group(&[a, b], &index, &config).unwrap();

        assert!(groups.is_empty());
    }

    #[test]
    fn representative_prefers_largest_dimensions_then_path() {
        let index = SimilarityIndex::new();
        let mut a = signature(Uuid::new_v4(), "/z.jpg", 1000, Some([2u8; 32]), None);
        let mut b = signature(Uuid::new_v4(), "/a.jpg", 1000, Some([2u8; 32]), None);
        a.width = Some(50);
        a.height = Some(50);
        b.width = Some(200);
        b.height = Some(200);
        index.add(a.id, a.content_hash, &[]);
        index.add(b.id, b.content_hash, &[]);
        let b_id = b.id;

        let groups = Grouper::new()
            .group(&[a, b], &index, &GrouperConfig::default())
            .unwrap();

        assert_eq!(groups[0].representative, b_id);
    }

    #[test]
    fn exact_only_config_skips_near_pass() {
        let index = SimilarityIndex::new();
        let a = signature(Uuid::new_v4(), "/a.jpg", 1000, None, Some(0));
        let b = signature(Uuid::new_v4(), "/b.jpg", 1000, None, Some(1));
        index.add(a.id, None, &a.perceptual_hashes);
        index.add(b.id, None, &b.perceptual_hashes);

        let config = GrouperConfig {
            exact_only: true,
            ..GrouperConfig::default()
        };
        let groups = Grouper::new().group(&[a, b], &index, &config).unwrap();

        assert!(groups.is_empty());
    }
}
