//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external service traits,
//! allowing end-to-end tests of the scheduler and reconciler without a real
//! job service or object storage.
//!
//! # Example
//!
//! ```rust,ignore
//! use gtfs_batch_core::testing::{fixtures, MockCombinationSource, MockJobRunner};
//!
//! let runner = MockJobRunner::new();
//! let source = MockCombinationSource::with_combinations(vec![fixtures::key("1", "1", "A")]);
//!
//! // Configure mock behavior
//! runner.fail_starts_of(JobKind::ComputeB).await;
//! ```

mod mock_combination_source;
mod mock_job_runner;

pub use mock_combination_source::MockCombinationSource;
pub use mock_job_runner::{MockJobRunner, RecordedStart};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, Utc};

    use crate::combination::{Combination, CombinationKey, CombinationState};
    use crate::job_runner::JobHandle;

    /// Build a key, panicking on invalid input.
    pub fn key(enterprise: &str, contract: &str, version: &str) -> CombinationKey {
        CombinationKey::new(enterprise, contract, version).expect("valid fixture key")
    }

    /// `count` keys for one enterprise: `{enterprise}_1_A`, `{enterprise}_2_A`, ...
    pub fn keys(enterprise: &str, count: usize) -> Vec<CombinationKey> {
        (1..=count)
            .map(|i| key(enterprise, &i.to_string(), "A"))
            .collect()
    }

    /// A pending combination registered at `now`.
    pub fn pending(key: CombinationKey, now: DateTime<Utc>) -> Combination {
        Combination::new(key, now)
    }

    /// The two job handles of a processing combination.
    pub fn job_handles(combination: &Combination) -> Option<(JobHandle, JobHandle)> {
        match &combination.state {
            CombinationState::Processing { job_a, job_b, .. } => {
                Some((job_a.clone(), job_b.clone()))
            }
            _ => None,
        }
    }
}
