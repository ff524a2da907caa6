//! Reconciler: observes in-flight combinations and settles them.
//!
//! A tick makes four passes, in order:
//! 1. **Timeout**: processing combinations whose jobs started longer ago than
//!    `job_timeout_secs` are failed, whatever the Job Runner says
//! 2. **Stale**: preprocessing/preprocessed combinations admitted longer ago
//!    than `stale_after_secs` are failed (orphans of a crashed scheduler)
//! 3. **Resume**: preprocessed combinations left for `resume_after_secs` get
//!    their compute jobs dispatched
//! 4. **Poll**: up to `max_to_check` processing combinations are polled and
//!    completed or failed once both jobs are terminal
//!
//! Every write is conditional on the record still being in the state that was
//! observed, so a tick never overwrites a concurrent scheduler's progress.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::combination::{
    BatchStore, Combination, CombinationFilter, CombinationState, CombinationStatus,
    FailureKind, StoreError, Transition, TransitionError,
};
use crate::config::{JobsConfig, ReconcilerConfig};
use crate::dispatch::{cancel_best_effort, dispatch_compute_jobs, DispatchOutcome};
use crate::job_runner::{timed_call, JobHandle, JobRunner, JobStatus};
use crate::metrics::{TICK_DURATION, TIMEOUTS};

/// Outcome of one reconciler tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Both jobs succeeded.
    pub completed: u32,
    /// A job ended unsuccessfully, or a resumed dispatch failed.
    pub failed: u32,
    /// Polled and still running.
    pub still_running: u32,
    /// Failed by the timeout pass.
    pub timed_out: u32,
    /// Failed by the stale pass.
    pub stale: u32,
    /// Preprocessed combinations whose jobs were dispatched by this tick.
    pub resumed: u32,
    /// Poll or store errors; the combination is left for the next tick.
    pub errors: u32,
}

pub struct Reconciler {
    store: Arc<dyn BatchStore>,
    runner: Arc<dyn JobRunner>,
    jobs: JobsConfig,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn BatchStore>,
        runner: Arc<dyn JobRunner>,
        config: ReconcilerConfig,
        jobs: JobsConfig,
    ) -> Self {
        Self {
            store,
            runner,
            jobs,
            config,
        }
    }

    fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.config.call_timeout_secs)
    }

    /// Run one reconciliation pass, polling at most `max_to_check` combinations.
    pub async fn tick(&self, max_to_check: u32) -> Result<ReconcileReport, StoreError> {
        self.tick_at(Utc::now(), max_to_check).await
    }

    /// Like [`tick`](Self::tick), with thresholds evaluated against `now`.
    pub async fn tick_at(
        &self,
        now: DateTime<Utc>,
        max_to_check: u32,
    ) -> Result<ReconcileReport, StoreError> {
        let _timer = TICK_DURATION
            .with_label_values(&["reconciler"])
            .start_timer();
        let mut report = ReconcileReport::default();

        self.sweep_timeouts(now, &mut report).await?;
        self.sweep_stale(now, &mut report)?;
        self.resume_preprocessed(now, &mut report).await?;
        self.poll_processing(now, max_to_check, &mut report).await?;

        info!(
            completed = report.completed,
            failed = report.failed,
            still_running = report.still_running,
            timed_out = report.timed_out,
            stale = report.stale,
            resumed = report.resumed,
            errors = report.errors,
            "Reconciler tick finished"
        );
        Ok(report)
    }

    async fn sweep_timeouts(
        &self,
        now: DateTime<Utc>,
        report: &mut ReconcileReport,
    ) -> Result<(), StoreError> {
        let limit = threshold(self.config.job_timeout_secs);
        let processing = self.store.list(
            &CombinationFilter::new()
                .with_status(CombinationStatus::Processing)
                .unbounded(),
        )?;

        for combination in processing {
            let CombinationState::Processing {
                jobs_started_at,
                job_a,
                job_b,
                ..
            } = &combination.state
            else {
                continue;
            };
            if now - *jobs_started_at <= limit {
                continue;
            }

            let error = format!(
                "timeout: jobs running since {} exceeded the {}s limit",
                jobs_started_at.to_rfc3339(),
                self.config.job_timeout_secs
            );
            let result = self.store.update(&combination.key, &|current| {
                if !same_jobs(current, job_a, job_b) {
                    return Err(TransitionError::Superseded);
                }
                current.apply(
                    Transition::Fail {
                        failure: FailureKind::Timeout,
                        error: error.clone(),
                    },
                    now,
                )
            });

            match result {
                Ok(_) => {
                    warn!(combination = %combination.key, "Combination timed out");
                    TIMEOUTS.inc();
                    report.timed_out += 1;
                    cancel_best_effort(self.runner.as_ref(), job_a, self.call_timeout()).await;
                    cancel_best_effort(self.runner.as_ref(), job_b, self.call_timeout()).await;
                }
                Err(e) => self.record_store_error(&combination, e, report),
            }
        }
        Ok(())
    }

    fn sweep_stale(
        &self,
        now: DateTime<Utc>,
        report: &mut ReconcileReport,
    ) -> Result<(), StoreError> {
        let limit = threshold(self.config.stale_after_secs);
        let admitted = self.store.list(
            &CombinationFilter::new()
                .with_status(CombinationStatus::Preprocessing)
                .with_status(CombinationStatus::Preprocessed)
                .unbounded(),
        )?;

        for combination in admitted {
            let Some(admitted_at) = combination.state.admitted_at() else {
                continue;
            };
            if now - admitted_at <= limit {
                continue;
            }

            let observed = combination.status();
            let error = format!(
                "stale: admitted at {} and still {} after {}s",
                admitted_at.to_rfc3339(),
                observed,
                self.config.stale_after_secs
            );
            let result = self.store.update(&combination.key, &|current| {
                if current.status() != observed || current.state.admitted_at() != Some(admitted_at)
                {
                    return Err(TransitionError::Superseded);
                }
                current.apply(
                    Transition::Fail {
                        failure: FailureKind::Stale,
                        error: error.clone(),
                    },
                    now,
                )
            });

            match result {
                Ok(_) => {
                    warn!(combination = %combination.key, status = %observed, "Failed stale combination");
                    report.stale += 1;
                }
                Err(e) => self.record_store_error(&combination, e, report),
            }
        }
        Ok(())
    }

    async fn resume_preprocessed(
        &self,
        now: DateTime<Utc>,
        report: &mut ReconcileReport,
    ) -> Result<(), StoreError> {
        let limit = threshold(self.config.resume_after_secs);
        let preprocessed = self.store.list(
            &CombinationFilter::new()
                .with_status(CombinationStatus::Preprocessed)
                .unbounded(),
        )?;

        for combination in preprocessed {
            let CombinationState::Preprocessed {
                execution_id,
                working_directory,
                preprocessed_at,
                ..
            } = &combination.state
            else {
                continue;
            };
            if now - *preprocessed_at < limit {
                continue;
            }

            info!(combination = %combination.key, "Resuming preprocessed combination");
            let outcome = dispatch_compute_jobs(
                self.store.as_ref(),
                self.runner.as_ref(),
                &self.jobs,
                &combination.key,
                execution_id,
                working_directory,
                self.call_timeout(),
            )
            .await;

            match outcome {
                Ok(DispatchOutcome::Dispatched(_)) => report.resumed += 1,
                Ok(DispatchOutcome::Failed(_)) => report.failed += 1,
                Ok(DispatchOutcome::Superseded) => {}
                Err(e) => self.record_store_error(&combination, e, report),
            }
        }
        Ok(())
    }

    async fn poll_processing(
        &self,
        now: DateTime<Utc>,
        max_to_check: u32,
        report: &mut ReconcileReport,
    ) -> Result<(), StoreError> {
        if max_to_check == 0 {
            return Ok(());
        }

        let processing = self.store.list(
            &CombinationFilter::new()
                .with_status(CombinationStatus::Processing)
                .with_limit(max_to_check as i64),
        )?;

        for combination in processing {
            let CombinationState::Processing { job_a, job_b, .. } = &combination.state else {
                continue;
            };

            let (status_a, status_b) = match self.poll_pair(job_a, job_b).await {
                Ok(statuses) => statuses,
                Err(e) => {
                    warn!(combination = %combination.key, error = %e, "Failed to poll jobs");
                    report.errors += 1;
                    continue;
                }
            };

            let finished = status_a.is_terminal() && status_b.is_terminal();
            let transition = if finished {
                Transition::JobsFinished {
                    job_a_status: status_a,
                    job_b_status: status_b,
                }
            } else {
                Transition::ObserveJobs {
                    job_a_status: status_a,
                    job_b_status: status_b,
                }
            };

            let result = self.store.update(&combination.key, &|current| {
                if !same_jobs(current, job_a, job_b) {
                    return Err(TransitionError::Superseded);
                }
                current.apply(transition.clone(), now)
            });

            match result {
                Ok(updated) => match &updated.state {
                    CombinationState::Completed { .. } => {
                        info!(combination = %combination.key, "Combination completed");
                        report.completed += 1;
                    }
                    CombinationState::Failed { error, .. } => {
                        warn!(combination = %combination.key, error = %error, "Combination failed");
                        report.failed += 1;
                    }
                    _ => {
                        debug!(
                            combination = %combination.key,
                            job_a = %status_a,
                            job_b = %status_b,
                            "Jobs still running"
                        );
                        report.still_running += 1;
                    }
                },
                Err(e) => self.record_store_error(&combination, e, report),
            }
        }
        Ok(())
    }

    async fn poll_pair(
        &self,
        job_a: &JobHandle,
        job_b: &JobHandle,
    ) -> Result<(JobStatus, JobStatus), crate::job_runner::JobRunnerError> {
        let timeout = self.call_timeout();
        let (a, b) = join(
            timed_call("poll", timeout, self.runner.poll(job_a)),
            timed_call("poll", timeout, self.runner.poll(job_b)),
        )
        .await;
        Ok((a?, b?))
    }

    /// Lost races are expected; anything else counts as an error.
    fn record_store_error(
        &self,
        combination: &Combination,
        e: StoreError,
        report: &mut ReconcileReport,
    ) {
        match e {
            StoreError::Transition(_) | StoreError::Conflict(_) => {
                debug!(combination = %combination.key, "Combination changed concurrently, skipping");
            }
            e => {
                error!(combination = %combination.key, error = %e, "Failed to update combination");
                report.errors += 1;
            }
        }
    }
}

/// Converts a configured number of seconds, saturating instead of overflowing.
fn threshold(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// True while `combination` is still processing the given pair of jobs.
fn same_jobs(combination: &Combination, job_a: &JobHandle, job_b: &JobHandle) -> bool {
    matches!(
        &combination.state,
        CombinationState::Processing { job_a: a, job_b: b, .. } if a == job_a && b == job_b
    )
}
