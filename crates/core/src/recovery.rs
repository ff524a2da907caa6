//! Operator recovery of failed combinations.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::combination::{
    BatchStore, Combination, CombinationFilter, CombinationKey, CombinationStatus, StoreError,
    Transition,
};
use crate::metrics::RESETS;

/// Outcome of resetting every failed combination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetReport {
    /// Moved back to pending.
    pub reset: u32,
    /// Refused at the retry cap and moved to abandoned.
    pub abandoned: u32,
    /// Combinations that could not be updated.
    pub errors: u32,
}

/// Resets failed combinations back to pending.
///
/// With `max_retries` set, a combination that has already been reset that
/// many times is abandoned instead. Capacity is never touched: failed,
/// pending and abandoned combinations hold no slot.
pub struct Recovery {
    store: Arc<dyn BatchStore>,
    max_retries: Option<u32>,
}

impl Recovery {
    pub fn new(store: Arc<dyn BatchStore>, max_retries: Option<u32>) -> Self {
        Self { store, max_retries }
    }

    /// Reset one failed combination.
    pub fn reset(&self, key: &CombinationKey) -> Result<Combination, StoreError> {
        let now = Utc::now();
        let max_retries = self.max_retries;
        let combination = self
            .store
            .update(key, &|c| c.apply(Transition::Reset { max_retries }, now))?;

        match combination.status() {
            CombinationStatus::Abandoned => {
                warn!(combination = %key, retries = combination.retries, "Retry limit reached, abandoning combination");
                RESETS.with_label_values(&["abandoned"]).inc();
            }
            _ => {
                info!(combination = %key, retries = combination.retries, "Reset combination to pending");
                RESETS.with_label_values(&["reset"]).inc();
            }
        }
        Ok(combination)
    }

    /// Reset every combination that is failed right now.
    pub fn reset_failed(&self) -> Result<ResetReport, StoreError> {
        let failed = self.store.list(
            &CombinationFilter::new()
                .with_status(CombinationStatus::Failed)
                .unbounded(),
        )?;

        let mut report = ResetReport::default();
        for combination in failed {
            match self.reset(&combination.key) {
                Ok(c) if c.status() == CombinationStatus::Abandoned => report.abandoned += 1,
                Ok(_) => report.reset += 1,
                // Reset concurrently by someone else.
                Err(StoreError::Transition(_)) => {}
                Err(e) => {
                    warn!(combination = %combination.key, error = %e, "Failed to reset combination");
                    report.errors += 1;
                }
            }
        }

        info!(
            reset = report.reset,
            abandoned = report.abandoned,
            errors = report.errors,
            "Reset failed combinations"
        );
        Ok(report)
    }
}
