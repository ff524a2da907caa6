//! Discovery from a combinations file produced by an earlier listing.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::combination::CombinationKey;

use super::{CombinationSource, DiscoveryError};

/// One entry of a combinations file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinationEntry {
    #[serde(rename = "P_EMPRESA", alias = "enterprise_id")]
    pub enterprise_id: String,
    #[serde(rename = "P_CONTR", alias = "contract_id")]
    pub contract_id: String,
    #[serde(rename = "P_VERSION", alias = "version_id")]
    pub version_id: String,
}

/// Combinations file layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinationsFile {
    pub combinations: Vec<CombinationEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl CombinationsFile {
    /// Build a file body from discovered keys.
    pub fn from_keys(keys: &[CombinationKey], bucket: Option<String>, region: Option<String>) -> Self {
        Self {
            combinations: keys
                .iter()
                .map(|k| CombinationEntry {
                    enterprise_id: k.enterprise_id.clone(),
                    contract_id: k.contract_id.clone(),
                    version_id: k.version_id.clone(),
                })
                .collect(),
            total: Some(keys.len()),
            timestamp: Some(Utc::now()),
            bucket,
            region,
        }
    }

    /// Valid keys, sorted and de-duplicated. Invalid entries are logged and dropped.
    pub fn keys(&self) -> Vec<CombinationKey> {
        let mut keys: Vec<CombinationKey> = self
            .combinations
            .iter()
            .filter_map(|entry| {
                match CombinationKey::new(
                    entry.enterprise_id.as_str(),
                    entry.contract_id.as_str(),
                    entry.version_id.as_str(),
                ) {
                    Ok(key) => Some(key),
                    Err(e) => {
                        warn!("Skipping combinations file entry: {}", e);
                        None
                    }
                }
            })
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

/// Reads combinations from a JSON file.
pub struct FileCombinationSource {
    path: PathBuf,
}

impl FileCombinationSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CombinationSource for FileCombinationSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn list_combinations(&self) -> Result<Vec<CombinationKey>, DiscoveryError> {
        let body = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            DiscoveryError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let file: CombinationsFile = serde_json::from_str(&body)
            .map_err(|e| DiscoveryError::InvalidListing(e.to_string()))?;
        Ok(file.keys())
    }
}
