//! Discovery over a local mirror of the raw-feed bucket.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use tokio::fs;
use tracing::{info, warn};

use crate::combination::CombinationKey;

use super::{CombinationSource, DiscoveryError, IncompleteCombination};

/// Feed type listed first; it has the fewest objects.
pub const SEED_FEED_TYPE: &str = "AGENCY";

static EXPLOTATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^explotation=(\d+)$").unwrap());
static CONTRACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^contract=(\d+)$").unwrap());
static VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^version=([^/]+)$").unwrap());

/// Lists combinations from a directory tree mirroring the bucket layout.
pub struct FsCombinationSource {
    root: PathBuf,
    required_types: Vec<String>,
}

impl FsCombinationSource {
    pub fn new(root: impl Into<PathBuf>, required_types: Vec<String>) -> Self {
        Self {
            root: root.into(),
            required_types: required_types
                .into_iter()
                .map(|t| t.to_ascii_uppercase())
                .collect(),
        }
    }

    /// Directory of one feed type for one combination.
    fn version_dir(&self, feed_type: &str, key: &CombinationKey) -> PathBuf {
        self.root
            .join("GTFS")
            .join(feed_type)
            .join(format!("explotation={}", key.enterprise_id))
            .join(format!("contract={}", key.contract_id))
            .join(format!("version={}", key.version_id))
    }

    async fn has_feed(&self, feed_type: &str, key: &CombinationKey) -> bool {
        let path = self
            .version_dir(feed_type, key)
            .join(format!("{}.txt", feed_type.to_ascii_lowercase()));
        match fs::metadata(&path).await {
            Ok(meta) => meta.is_file(),
            Err(_) => false,
        }
    }

    /// Subdirectories of `dir` whose name matches `pattern`, with the captured value.
    async fn matching_dirs(dir: &Path, pattern: &Regex) -> io::Result<Vec<(PathBuf, String)>> {
        let mut found = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(captures) = pattern.captures(name) {
                found.push((entry.path(), captures[1].to_string()));
            }
        }
        Ok(found)
    }

    /// Combinations that have the seed feed, complete or not.
    async fn seed_candidates(&self) -> Result<BTreeSet<CombinationKey>, DiscoveryError> {
        let seed_dir = self.root.join("GTFS").join(SEED_FEED_TYPE);
        let seed_is_dir = match fs::metadata(&seed_dir).await {
            Ok(meta) => meta.is_dir(),
            Err(_) => false,
        };
        if !seed_is_dir {
            warn!("No data found for {} under {}", SEED_FEED_TYPE, seed_dir.display());
            return Ok(BTreeSet::new());
        }

        let unavailable = |e: io::Error| DiscoveryError::Unavailable(e.to_string());
        let mut candidates = BTreeSet::new();

        for (explotation_dir, enterprise) in Self::matching_dirs(&seed_dir, &EXPLOTATION)
            .await
            .map_err(unavailable)?
        {
            for (contract_dir, contract) in Self::matching_dirs(&explotation_dir, &CONTRACT)
                .await
                .map_err(unavailable)?
            {
                for (_, version) in Self::matching_dirs(&contract_dir, &VERSION)
                    .await
                    .map_err(unavailable)?
                {
                    match CombinationKey::new(enterprise.as_str(), contract.as_str(), version) {
                        Ok(key) => {
                            if self.has_feed(SEED_FEED_TYPE, &key).await {
                                candidates.insert(key);
                            }
                        }
                        Err(e) => warn!("Skipping malformed prefix: {}", e),
                    }
                }
            }
        }

        Ok(candidates)
    }

    /// Split seed candidates into complete and incomplete combinations.
    pub async fn scan(
        &self,
    ) -> Result<(Vec<CombinationKey>, Vec<IncompleteCombination>), DiscoveryError> {
        let candidates = self.seed_candidates().await?;
        info!("Discovered {} potential combinations", candidates.len());

        let mut complete = Vec::new();
        let mut incomplete = Vec::new();

        for key in candidates {
            let mut missing_types = Vec::new();
            for feed_type in &self.required_types {
                if feed_type != SEED_FEED_TYPE && !self.has_feed(feed_type, &key).await {
                    missing_types.push(feed_type.clone());
                }
            }

            if missing_types.is_empty() {
                complete.push(key);
            } else {
                warn!(
                    "Incomplete combination {} (missing: {})",
                    key,
                    missing_types.join(", ")
                );
                incomplete.push(IncompleteCombination { key, missing_types });
            }
        }

        Ok((complete, incomplete))
    }
}

#[async_trait]
impl CombinationSource for FsCombinationSource {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn list_combinations(&self) -> Result<Vec<CombinationKey>, DiscoveryError> {
        let (complete, _) = self.scan().await?;
        info!("Discovery completed: {} valid combinations", complete.len());
        Ok(complete)
    }
}
