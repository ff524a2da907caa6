//! Read-only progress reporting over the combination records.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capacity::{CapacityLedger, CapacitySnapshot};
use crate::combination::{
    BatchStore, Combination, CombinationFilter, CombinationKey, CombinationState,
    CombinationStatus, FailureKind, StoreError,
};

/// Number of recently admitted combinations listed in a summary.
pub const RECENT_LIMIT: usize = 5;

/// Count of combinations per status. Always sums to the number of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub preprocessing: u64,
    pub preprocessed: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub abandoned: u64,
}

impl StatusCounts {
    pub fn record(&mut self, status: CombinationStatus) {
        *self.slot(status) += 1;
    }

    pub fn get(&self, status: CombinationStatus) -> u64 {
        match status {
            CombinationStatus::Pending => self.pending,
            CombinationStatus::Preprocessing => self.preprocessing,
            CombinationStatus::Preprocessed => self.preprocessed,
            CombinationStatus::Processing => self.processing,
            CombinationStatus::Completed => self.completed,
            CombinationStatus::Failed => self.failed,
            CombinationStatus::Abandoned => self.abandoned,
        }
    }

    pub fn total(&self) -> u64 {
        CombinationStatus::ALL.iter().map(|s| self.get(*s)).sum()
    }

    fn slot(&mut self, status: CombinationStatus) -> &mut u64 {
        match status {
            CombinationStatus::Pending => &mut self.pending,
            CombinationStatus::Preprocessing => &mut self.preprocessing,
            CombinationStatus::Preprocessed => &mut self.preprocessed,
            CombinationStatus::Processing => &mut self.processing,
            CombinationStatus::Completed => &mut self.completed,
            CombinationStatus::Failed => &mut self.failed,
            CombinationStatus::Abandoned => &mut self.abandoned,
        }
    }
}

/// Progress of one enterprise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterpriseSummary {
    pub total: u64,
    pub completed: u64,
    /// Failed or abandoned.
    pub failed: u64,
    /// Admitted and not yet finished (preprocessing, preprocessed or processing).
    pub processing: u64,
    pub pending: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedCombination {
    #[serde(flatten)]
    pub key: CombinationKey,
    pub failure: FailureKind,
    pub error: String,
    pub retries: u32,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentCombination {
    #[serde(flatten)]
    pub key: CombinationKey,
    pub status: CombinationStatus,
    pub admitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryStats {
    /// Sum of resets over all combinations.
    pub total_retries: u64,
    /// Combinations reset at least once.
    pub items_with_retries: u64,
    /// Highest reset count of any combination.
    pub max_retries: u32,
}

/// Aggregate progress view, recomputed from the records on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStatus {
    pub total: u64,
    pub by_status: StatusCounts,
    /// Completed share of all registered combinations, in percent (2 decimals).
    pub completion_percentage: f64,
    pub by_enterprise: BTreeMap<String, EnterpriseSummary>,
    pub failed: Vec<FailedCombination>,
    /// Most recently admitted combinations, newest first.
    pub recent: Vec<RecentCombination>,
    pub retry_stats: RetryStats,
    pub capacity: CapacitySnapshot,
    pub generated_at: DateTime<Utc>,
}

impl AggregateStatus {
    /// Build the aggregate from a full scan.
    pub fn from_combinations(
        combinations: &[Combination],
        capacity: CapacitySnapshot,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let mut by_status = StatusCounts::default();
        let mut by_enterprise: BTreeMap<String, EnterpriseSummary> = BTreeMap::new();
        let mut failed = Vec::new();
        let mut recent = Vec::new();
        let mut retry_stats = RetryStats::default();

        for combination in combinations {
            let status = combination.status();
            by_status.record(status);

            let enterprise = by_enterprise
                .entry(combination.key.enterprise_id.clone())
                .or_default();
            enterprise.total += 1;
            match status {
                CombinationStatus::Pending => enterprise.pending += 1,
                CombinationStatus::Completed => enterprise.completed += 1,
                CombinationStatus::Failed | CombinationStatus::Abandoned => enterprise.failed += 1,
                _ => enterprise.processing += 1,
            }

            if let CombinationState::Failed {
                failure,
                error,
                failed_at,
                ..
            } = &combination.state
            {
                failed.push(FailedCombination {
                    key: combination.key.clone(),
                    failure: *failure,
                    error: error.clone(),
                    retries: combination.retries,
                    failed_at: *failed_at,
                });
            }

            if let Some(admitted_at) = combination.state.admitted_at() {
                recent.push(RecentCombination {
                    key: combination.key.clone(),
                    status,
                    admitted_at,
                });
            }

            if combination.retries > 0 {
                retry_stats.total_retries += combination.retries as u64;
                retry_stats.items_with_retries += 1;
                retry_stats.max_retries = retry_stats.max_retries.max(combination.retries);
            }
        }

        recent.sort_by(|a, b| b.admitted_at.cmp(&a.admitted_at));
        recent.truncate(RECENT_LIMIT);

        let total = combinations.len() as u64;
        Self {
            total,
            completion_percentage: percentage(by_status.completed, total),
            by_status,
            by_enterprise,
            failed,
            recent,
            retry_stats,
            capacity,
            generated_at,
        }
    }

    /// Plain-text rendering for terminals.
    pub fn render_table(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "GTFS batch status at {}", self.generated_at.to_rfc3339());
        let _ = writeln!(
            out,
            "Capacity: {}/{} in use",
            self.capacity.in_use, self.capacity.max_concurrent
        );
        let _ = writeln!(
            out,
            "Completed: {}/{} ({:.2}%)",
            self.by_status.completed, self.total, self.completion_percentage
        );
        let _ = writeln!(out);

        let _ = writeln!(out, "{:<15} {:>8}", "STATUS", "COUNT");
        for status in CombinationStatus::ALL {
            let _ = writeln!(out, "{:<15} {:>8}", status.as_str(), self.by_status.get(status));
        }
        let _ = writeln!(out, "{:<15} {:>8}", "total", self.total);

        if !self.by_enterprise.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "{:<12} {:>8} {:>10} {:>8} {:>11} {:>8}",
                "ENTERPRISE", "TOTAL", "COMPLETED", "FAILED", "PROCESSING", "PENDING"
            );
            for (enterprise, summary) in &self.by_enterprise {
                let _ = writeln!(
                    out,
                    "{:<12} {:>8} {:>10} {:>8} {:>11} {:>8}",
                    enterprise,
                    summary.total,
                    summary.completed,
                    summary.failed,
                    summary.processing,
                    summary.pending
                );
            }
        }

        if !self.failed.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "FAILED");
            for failed in &self.failed {
                let _ = writeln!(
                    out,
                    "  {} [{}] retries={} {}",
                    failed.key,
                    failed.failure.as_str(),
                    failed.retries,
                    failed.error
                );
            }
        }

        out
    }
}

/// The single-document view of the whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDocument {
    /// Earliest admission, if anything was ever admitted.
    pub started_at: Option<DateTime<Utc>>,
    /// Latest change to any combination.
    pub last_updated: Option<DateTime<Utc>>,
    pub total: u64,
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub combinations: Vec<WorkUnitRecord>,
}

/// Flat record of one combination, with every field addressable by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkUnitRecord {
    #[serde(flatten)]
    pub key: CombinationKey,
    pub status: CombinationStatus,
    pub registered_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub retries: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_handle_a: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_handle_b: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl From<&Combination> for WorkUnitRecord {
    fn from(combination: &Combination) -> Self {
        let (job_handle_a, job_handle_b, started_at) = match &combination.state {
            CombinationState::Processing {
                job_a,
                job_b,
                jobs_started_at,
                ..
            } => (
                Some(job_a.to_string()),
                Some(job_b.to_string()),
                Some(*jobs_started_at),
            ),
            _ => (None, None, None),
        };

        Self {
            key: combination.key.clone(),
            status: combination.status(),
            registered_at: combination.registered_at,
            last_updated: combination.last_updated,
            retries: combination.retries,
            error: combination.state.error().map(str::to_string),
            execution_id: combination.state.execution_id().map(str::to_string),
            working_directory: combination.state.working_directory().map(str::to_string),
            job_handle_a,
            job_handle_b,
            started_at,
        }
    }
}

impl StatusDocument {
    pub fn from_combinations(combinations: &[Combination]) -> Self {
        let mut counts = StatusCounts::default();
        for combination in combinations {
            counts.record(combination.status());
        }

        Self {
            started_at: combinations
                .iter()
                .filter_map(|c| c.state.admitted_at())
                .min(),
            last_updated: combinations.iter().map(|c| c.last_updated).max(),
            total: combinations.len() as u64,
            counts,
            combinations: combinations.iter().map(WorkUnitRecord::from).collect(),
        }
    }
}

/// Builds summaries without ever writing to the store.
pub struct Reporter {
    store: Arc<dyn BatchStore>,
}

impl Reporter {
    pub fn new(store: Arc<dyn BatchStore>) -> Self {
        Self { store }
    }

    pub fn summarize(&self) -> Result<AggregateStatus, StoreError> {
        let combinations = self.store.list(&CombinationFilter::new().unbounded())?;
        let capacity = self.store.snapshot()?;
        Ok(AggregateStatus::from_combinations(
            &combinations,
            capacity,
            Utc::now(),
        ))
    }

    pub fn status_document(&self) -> Result<StatusDocument, StoreError> {
        let combinations = self.store.list(&CombinationFilter::new().unbounded())?;
        Ok(StatusDocument::from_combinations(&combinations))
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 * 10_000.0 / total as f64).round() / 100.0
}
