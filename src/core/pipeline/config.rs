//! Tunables for [`super::ScanOrchestrator`].

use crate::core::comparator::{GrouperConfig, DEFAULT_CONFIDENCE_FLOOR};
use crate::core::index::DEFAULT_NEAR_RADIUS;

/// Queue capacities from spec.md §4.6's pipeline diagram.
pub const WALK_QUEUE_CAPACITY: usize = 1024;
pub const HASH_QUEUE_CAPACITY: usize = 512;

/// Emit a progress checkpoint at least this often, in item count or wall
/// time, whichever comes first.
pub const PROGRESS_CHECKPOINT_ITEMS: usize = 250;
pub const PROGRESS_CHECKPOINT_SECS: u64 = 1;

/// Configuration for one [`super::ScanOrchestrator::run`] invocation.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Number of concurrent hasher workers. `N = clamp(cpu_count, 1,
    /// 2*cpu_count)`; the default picks `cpu_count` and callers may raise
    /// it up to double that.
    pub concurrency: usize,
    /// Hamming radius the near pass searches within.
    pub near_radius: u32,
    /// Skip the near pass; report only byte-identical groups.
    pub exact_only: bool,
    /// Groups scoring below this confidence are dropped.
    pub confidence_floor: f64,
}

impl OrchestratorConfig {
    fn default_concurrency() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn grouper_config(&self) -> GrouperConfig {
        GrouperConfig {
            exact_only: self.exact_only,
            near_radius: self.near_radius,
            confidence_floor: self.confidence_floor,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: Self::default_concurrency(),
            near_radius: DEFAULT_NEAR_RADIUS as u32,
            exact_only: false,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_concurrency_is_at_least_one() {
        let config = OrchestratorConfig::default();
        assert!(config.concurrency >= 1);
    }

    #[test]
    fn grouper_config_carries_through() {
        let config = OrchestratorConfig {
            exact_only: true,
            near_radius: 3,
            confidence_floor: 0.9,
            ..OrchestratorConfig::default()
        };
        let grouper = config.grouper_config();
        assert!(grouper.exact_only);
        assert_eq!(grouper.near_radius, 3);
        assert_eq!(grouper.confidence_floor, 0.9);
    }
}
