//! Scheduler: admits pending combinations under the capacity ceiling.
//!
//! Each tick:
//! 1. Lists pending combinations in registration order, at most `max_to_start`
//! 2. Admits each one with a single atomic update (pending -> preprocessing
//!    plus capacity acquire); stops at the first capacity rejection
//! 3. Runs preprocessing, then dispatches both compute jobs
//!
//! Any failure after admission fails the combination, which releases its slot
//! in the same update. Concurrent ticks (in this process or others sharing the
//! store) never over-admit: the ledger check happens inside the admission
//! transaction.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::combination::{
    BatchStore, CombinationFilter, CombinationKey, CombinationStatus, FailureKind, StoreError,
    Transition,
};
use crate::config::{JobsConfig, SchedulerConfig};
use crate::dispatch::{dispatch_compute_jobs, fail, DispatchOutcome};
use crate::job_runner::{timed_call, JobParameters, JobRunner, PreprocessOutcome};
use crate::metrics::{ADMISSIONS, TICK_DURATION};

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerTickReport {
    /// Combinations admitted in this tick.
    pub started: u32,
    /// Admitted combinations that failed during preprocessing or dispatch.
    pub failed: u32,
    /// The tick stopped because no capacity was left.
    pub capacity_exhausted: bool,
    /// Per-combination store errors; the next tick retries.
    pub errors: u32,
}

/// Result of trying to admit a single combination.
enum Admission {
    Admitted,
    CapacityExhausted,
    /// Another scheduler got there first.
    Lost,
}

pub struct Scheduler {
    store: Arc<dyn BatchStore>,
    runner: Arc<dyn JobRunner>,
    jobs: JobsConfig,
    call_timeout: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn BatchStore>,
        runner: Arc<dyn JobRunner>,
        config: &SchedulerConfig,
        jobs: JobsConfig,
    ) -> Self {
        Self {
            store,
            runner,
            jobs,
            call_timeout: Duration::from_secs(config.call_timeout_secs),
        }
    }

    /// Run one scheduling pass, starting at most `max_to_start` combinations.
    pub async fn tick(&self, max_to_start: u32) -> Result<SchedulerTickReport, StoreError> {
        let _timer = TICK_DURATION.with_label_values(&["scheduler"]).start_timer();
        let mut report = SchedulerTickReport::default();

        if max_to_start == 0 {
            return Ok(report);
        }

        let candidates = self.store.list(
            &CombinationFilter::new()
                .with_status(CombinationStatus::Pending)
                .with_limit(max_to_start as i64),
        )?;
        debug!(candidates = candidates.len(), "Scheduler tick");

        for candidate in candidates {
            if report.started >= max_to_start {
                break;
            }
            let key = candidate.key;

            match self.admit(&key) {
                Ok(Admission::Admitted) => report.started += 1,
                Ok(Admission::CapacityExhausted) => {
                    report.capacity_exhausted = true;
                    break;
                }
                Ok(Admission::Lost) => continue,
                Err(e) => {
                    error!(combination = %key, error = %e, "Failed to admit combination");
                    report.errors += 1;
                    continue;
                }
            }

            match self.run_admitted(&key).await {
                Ok(true) => {}
                Ok(false) => report.failed += 1,
                Err(e) => {
                    // The slot stays held until the stale sweep fails the orphan.
                    error!(combination = %key, error = %e, "Store error while running combination");
                    report.errors += 1;
                }
            }
        }

        info!(
            started = report.started,
            failed = report.failed,
            capacity_exhausted = report.capacity_exhausted,
            "Scheduler tick finished"
        );
        Ok(report)
    }

    fn admit(&self, key: &CombinationKey) -> Result<Admission, StoreError> {
        let now = Utc::now();
        match self.store.update(key, &|c| c.apply(Transition::Admit, now)) {
            Ok(_) => {
                info!(combination = %key, "Admitted combination");
                ADMISSIONS.with_label_values(&["admitted"]).inc();
                Ok(Admission::Admitted)
            }
            Err(StoreError::CapacityExhausted {
                in_use,
                max_concurrent,
            }) => {
                info!(in_use, max_concurrent, "No capacity left, stopping tick");
                ADMISSIONS.with_label_values(&["capacity_exhausted"]).inc();
                Ok(Admission::CapacityExhausted)
            }
            Err(StoreError::Transition(_))
            | Err(StoreError::Conflict(_))
            | Err(StoreError::NotFound(_)) => {
                debug!(combination = %key, "Combination no longer pending, skipping");
                ADMISSIONS.with_label_values(&["lost_race"]).inc();
                Ok(Admission::Lost)
            }
            Err(e) => Err(e),
        }
    }

    /// Preprocess and dispatch an admitted combination.
    /// Returns false if the combination ended up failed.
    async fn run_admitted(&self, key: &CombinationKey) -> Result<bool, StoreError> {
        let params = JobParameters::for_combination(key, self.jobs.bucket.as_deref());
        let outcome = timed_call(
            "preprocess",
            self.call_timeout,
            self.runner.preprocess(&params),
        )
        .await;

        let (execution_id, working_directory) = match outcome {
            Ok(PreprocessOutcome::Succeeded {
                execution_id,
                working_directory,
            }) => (execution_id, working_directory),
            Ok(PreprocessOutcome::Failed { message }) => {
                warn!(combination = %key, error = %message, "Preprocessing failed");
                self.fail_preprocess(key, &message)?;
                return Ok(false);
            }
            Err(e) => {
                warn!(combination = %key, error = %e, "Preprocessing call failed");
                self.fail_preprocess(key, &format!("preprocessing call failed: {}", e))?;
                return Ok(false);
            }
        };

        let now = Utc::now();
        let preprocessed = self.store.update(key, &|c| {
            c.apply(
                Transition::PreprocessSucceeded {
                    execution_id: execution_id.clone(),
                    working_directory: working_directory.clone(),
                },
                now,
            )
        });
        match preprocessed {
            Ok(_) => {
                info!(combination = %key, execution_id = %execution_id, "Preprocessing succeeded")
            }
            Err(StoreError::Transition(e)) => {
                // Failed by a sweep while preprocessing ran; nothing left to do.
                warn!(combination = %key, error = %e, "Combination moved on during preprocessing");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        let outcome = dispatch_compute_jobs(
            self.store.as_ref(),
            self.runner.as_ref(),
            &self.jobs,
            key,
            &execution_id,
            &working_directory,
            self.call_timeout,
        )
        .await?;

        Ok(matches!(outcome, DispatchOutcome::Dispatched(_)))
    }

    fn fail_preprocess(&self, key: &CombinationKey, error: &str) -> Result<(), StoreError> {
        match fail(self.store.as_ref(), key, FailureKind::Preprocess, error) {
            Ok(()) | Err(StoreError::Transition(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
