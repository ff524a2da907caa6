//! Work registry: turns discovered combinations into pending records.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::combination::{BatchStore, Combination, CombinationKey};
use crate::discovery::{CombinationSource, DiscoveryError};
use crate::metrics::REGISTRATIONS;

/// Outcome of one registration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSummary {
    /// Units offered for registration.
    pub discovered: u32,
    /// Newly inserted as pending.
    pub registered: u32,
    /// Already registered, left untouched.
    pub skipped: u32,
    /// Rejected because a key part was empty or malformed.
    pub invalid: u32,
    /// Store failures; re-running the pass retries them.
    pub errors: u32,
}

/// Discovers candidate combinations and registers them idempotently.
pub struct WorkRegistry {
    store: Arc<dyn BatchStore>,
    source: Arc<dyn CombinationSource>,
}

impl WorkRegistry {
    pub fn new(store: Arc<dyn BatchStore>, source: Arc<dyn CombinationSource>) -> Self {
        Self { store, source }
    }

    /// List candidate combinations from the configured source.
    pub async fn discover(&self) -> Result<Vec<CombinationKey>, DiscoveryError> {
        let keys = self.source.list_combinations().await?;
        info!(
            source = self.source.name(),
            count = keys.len(),
            "Discovered combinations"
        );
        Ok(keys)
    }

    /// Insert every unit not yet registered.
    ///
    /// Keys are normalized first (whitespace trimmed). Existing records are
    /// never modified, so this is safe to call with overlapping sets.
    pub fn register(&self, units: &[CombinationKey]) -> RegistrationSummary {
        let mut summary = RegistrationSummary {
            discovered: units.len() as u32,
            ..Default::default()
        };
        let now = Utc::now();

        for unit in units {
            let key = match CombinationKey::new(
                unit.enterprise_id.as_str(),
                unit.contract_id.as_str(),
                unit.version_id.as_str(),
            ) {
                Ok(key) => key,
                Err(e) => {
                    warn!(unit = ?unit, error = %e, "Skipping invalid combination");
                    summary.invalid += 1;
                    REGISTRATIONS.with_label_values(&["invalid"]).inc();
                    continue;
                }
            };

            match self.store.insert_if_absent(&Combination::new(key.clone(), now)) {
                Ok(true) => {
                    debug!(combination = %key, "Registered combination");
                    summary.registered += 1;
                    REGISTRATIONS.with_label_values(&["registered"]).inc();
                }
                Ok(false) => {
                    summary.skipped += 1;
                    REGISTRATIONS.with_label_values(&["skipped"]).inc();
                }
                Err(e) => {
                    warn!(combination = %key, error = %e, "Failed to register combination");
                    summary.errors += 1;
                    REGISTRATIONS.with_label_values(&["error"]).inc();
                }
            }
        }

        info!(
            discovered = summary.discovered,
            registered = summary.registered,
            skipped = summary.skipped,
            invalid = summary.invalid,
            errors = summary.errors,
            "Registration finished"
        );
        summary
    }

    /// Discover, then register everything found.
    pub async fn discover_and_register(&self) -> Result<RegistrationSummary, DiscoveryError> {
        let keys = self.discover().await?;
        Ok(self.register(&keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combination::{CombinationFilter, CombinationStore, SqliteCombinationStore};
    use crate::testing::{fixtures, MockCombinationSource};

    fn registry(source: MockCombinationSource) -> (Arc<SqliteCombinationStore>, WorkRegistry) {
        let store = Arc::new(SqliteCombinationStore::in_memory(5).unwrap());
        let registry = WorkRegistry::new(store.clone(), Arc::new(source));
        (store, registry)
    }

    #[test]
    fn test_register_is_idempotent() {
        let (store, registry) = registry(MockCombinationSource::new());

        let first = registry.register(&[fixtures::key("1", "1", "A"), fixtures::key("1", "1", "B")]);
        assert_eq!(first.registered, 2);
        assert_eq!(first.skipped, 0);

        let second = registry.register(&[fixtures::key("1", "1", "B"), fixtures::key("2", "1", "A")]);
        assert_eq!(second.discovered, 2);
        assert_eq!(second.registered, 1);
        assert_eq!(second.skipped, 1);

        assert_eq!(store.count(&CombinationFilter::new()).unwrap(), 3);
    }

    #[test]
    fn test_duplicates_within_one_call_are_skipped() {
        let (store, registry) = registry(MockCombinationSource::new());
        let key = fixtures::key("1", "1", "A");

        let summary = registry.register(&[key.clone(), key.clone(), key]);
        assert_eq!(summary.registered, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(store.count(&CombinationFilter::new()).unwrap(), 1);
    }

    #[test]
    fn test_invalid_units_are_counted_not_stored() {
        let (store, registry) = registry(MockCombinationSource::new());
        let bad = CombinationKey {
            enterprise_id: "".to_string(),
            contract_id: "1".to_string(),
            version_id: "A".to_string(),
        };
        let padded = CombinationKey {
            enterprise_id: " 7 ".to_string(),
            contract_id: "1".to_string(),
            version_id: "A".to_string(),
        };

        let summary = registry.register(&[bad, padded]);
        assert_eq!(summary.invalid, 1);
        assert_eq!(summary.registered, 1);
        assert!(store.get(&fixtures::key("7", "1", "A")).unwrap().is_some());
    }

    #[test]
    fn test_reregistration_does_not_touch_existing_state() {
        let (store, registry) = registry(MockCombinationSource::new());
        let key = fixtures::key("1", "1", "A");
        registry.register(&[key.clone()]);

        let now = Utc::now();
        store
            .update(&key, &|c| c.apply(crate::combination::Transition::Admit, now))
            .unwrap();

        let summary = registry.register(&[key.clone()]);
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            store.get(&key).unwrap().unwrap().status(),
            crate::combination::CombinationStatus::Preprocessing
        );
    }

    #[tokio::test]
    async fn test_discover_and_register() {
        let source = MockCombinationSource::with_combinations(fixtures::keys("1", 3));
        let (store, registry) = registry(source);

        let summary = registry.discover_and_register().await.unwrap();
        assert_eq!(summary.discovered, 3);
        assert_eq!(summary.registered, 3);
        assert_eq!(store.count(&CombinationFilter::new()).unwrap(), 3);

        let again = registry.discover_and_register().await.unwrap();
        assert_eq!(again.registered, 0);
        assert_eq!(again.skipped, 3);
    }

    #[tokio::test]
    async fn test_discovery_error_propagates() {
        let source = MockCombinationSource::new();
        source
            .set_next_error(DiscoveryError::Unavailable("bucket offline".to_string()))
            .await;
        let (_store, registry) = registry(source);

        assert!(matches!(
            registry.discover_and_register().await,
            Err(DiscoveryError::Unavailable(_))
        ));
    }
}
