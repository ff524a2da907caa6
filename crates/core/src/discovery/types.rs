//! Types for combination discovery.

use async_trait::async_trait;
use thiserror::Error;

use crate::combination::CombinationKey;

/// Errors that can occur while listing combinations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid listing: {0}")]
    InvalidListing(String),

    #[error("Discovery is not configured")]
    NotConfigured,
}

/// A combination found under the seed prefix but missing some feed types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteCombination {
    pub key: CombinationKey,
    pub missing_types: Vec<String>,
}

/// Supplier of candidate combinations.
#[async_trait]
pub trait CombinationSource: Send + Sync {
    /// Returns the source name (for logging).
    fn name(&self) -> &str;

    /// List every complete combination, sorted and without duplicates.
    async fn list_combinations(&self) -> Result<Vec<CombinationKey>, DiscoveryError>;
}

/// Source used when discovery is disabled; registration then needs explicit units.
pub struct NoDiscovery;

#[async_trait]
impl CombinationSource for NoDiscovery {
    fn name(&self) -> &str {
        "none"
    }

    async fn list_combinations(&self) -> Result<Vec<CombinationKey>, DiscoveryError> {
        Err(DiscoveryError::NotConfigured)
    }
}
