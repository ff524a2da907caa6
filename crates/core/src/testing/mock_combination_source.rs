//! Mock combination source for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::combination::CombinationKey;
use crate::discovery::{CombinationSource, DiscoveryError};

/// Mock implementation of the CombinationSource trait.
#[derive(Debug, Default)]
pub struct MockCombinationSource {
    combinations: Arc<RwLock<Vec<CombinationKey>>>,
    /// If set, the next listing will fail with this error.
    next_error: Arc<RwLock<Option<DiscoveryError>>>,
    calls: Arc<RwLock<u32>>,
}

impl MockCombinationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source that lists the given keys.
    pub fn with_combinations(combinations: Vec<CombinationKey>) -> Self {
        Self {
            combinations: Arc::new(RwLock::new(combinations)),
            ..Self::default()
        }
    }

    /// Replace the listed keys.
    pub async fn set_combinations(&self, combinations: Vec<CombinationKey>) {
        *self.combinations.write().await = combinations;
    }

    /// Make the next listing fail.
    pub async fn set_next_error(&self, error: DiscoveryError) {
        *self.next_error.write().await = Some(error);
    }

    /// Number of listings so far.
    pub async fn calls(&self) -> u32 {
        *self.calls.read().await
    }
}

#[async_trait]
impl CombinationSource for MockCombinationSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_combinations(&self) -> Result<Vec<CombinationKey>, DiscoveryError> {
        *self.calls.write().await += 1;

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let mut keys = self.combinations.read().await.clone();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}
