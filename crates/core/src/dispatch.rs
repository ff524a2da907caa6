//! Starting the two compute jobs of a preprocessed combination.
//!
//! Used by the scheduler right after preprocessing and by the reconciler's
//! resume pass.

use std::time::Duration;

use chrono::Utc;
use futures::future::join;
use tracing::{info, warn};

use crate::combination::{
    BatchStore, Combination, CombinationKey, FailureKind, StoreError, Transition,
};
use crate::config::JobsConfig;
use crate::job_runner::{timed_call, JobHandle, JobKind, JobParameters, JobRunner};
use crate::metrics::DISPATCH_FAILURES;

/// What happened when dispatching a combination's compute jobs.
#[derive(Debug)]
pub(crate) enum DispatchOutcome {
    /// Both jobs started; the combination is now processing.
    Dispatched(Combination),
    /// A start failed; the combination was failed and its capacity released.
    Failed(String),
    /// Someone else moved the combination first; any jobs we started were cancelled.
    Superseded,
}

/// Start compute jobs A and B concurrently and record them.
///
/// When only one start succeeds, the started job is cancelled (best effort)
/// before the combination is failed, so no job keeps running unowned.
pub(crate) async fn dispatch_compute_jobs(
    store: &dyn BatchStore,
    runner: &dyn JobRunner,
    jobs: &JobsConfig,
    key: &CombinationKey,
    execution_id: &str,
    working_directory: &str,
    call_timeout: Duration,
) -> Result<DispatchOutcome, StoreError> {
    let params = JobParameters::for_combination(key, jobs.bucket.as_deref())
        .with_preprocess_output(execution_id, working_directory);

    let (job_a, job_b) = join(
        timed_call("start", call_timeout, runner.start(JobKind::ComputeA, &params)),
        timed_call("start", call_timeout, runner.start(JobKind::ComputeB, &params)),
    )
    .await;

    let (job_a, job_b) = match (job_a, job_b) {
        (Ok(a), Ok(b)) => (a, b),
        (a, b) => {
            let mut errors = Vec::new();
            for (kind, result) in [(JobKind::ComputeA, a), (JobKind::ComputeB, b)] {
                match result {
                    Ok(handle) => cancel_best_effort(runner, &handle, call_timeout).await,
                    Err(e) => {
                        DISPATCH_FAILURES.with_label_values(&[kind.as_str()]).inc();
                        errors.push(format!(
                            "failed to start {}: {}",
                            kind.job_name(jobs),
                            e
                        ));
                    }
                }
            }
            let error = errors.join("; ");
            warn!(combination = %key, error = %error, "Compute job dispatch failed");

            return match fail(store, key, FailureKind::Dispatch, &error) {
                Ok(()) => Ok(DispatchOutcome::Failed(error)),
                Err(StoreError::Transition(_)) => Ok(DispatchOutcome::Superseded),
                Err(e) => Err(e),
            };
        }
    };

    let now = Utc::now();
    let recorded = store.update(key, &|c| {
        c.apply(
            Transition::JobsDispatched {
                job_a: job_a.clone(),
                job_b: job_b.clone(),
            },
            now,
        )
    });

    match recorded {
        Ok(combination) => {
            info!(
                combination = %key,
                job_a = %job_a,
                job_b = %job_b,
                "Compute jobs dispatched"
            );
            Ok(DispatchOutcome::Dispatched(combination))
        }
        Err(e) => {
            // Nothing refers to these runs any more.
            cancel_best_effort(runner, &job_a, call_timeout).await;
            cancel_best_effort(runner, &job_b, call_timeout).await;
            match e {
                StoreError::Transition(_) | StoreError::Conflict(_) => {
                    info!(combination = %key, "Combination moved on before dispatch was recorded");
                    Ok(DispatchOutcome::Superseded)
                }
                e => Err(e),
            }
        }
    }
}

/// Move a capacity-holding combination to failed.
pub(crate) fn fail(
    store: &dyn BatchStore,
    key: &CombinationKey,
    failure: FailureKind,
    error: &str,
) -> Result<(), StoreError> {
    let now = Utc::now();
    store.update(key, &|c| {
        c.apply(
            Transition::Fail {
                failure,
                error: error.to_string(),
            },
            now,
        )
    })?;
    Ok(())
}

/// Ask the runner to stop a job, logging instead of failing.
pub(crate) async fn cancel_best_effort(
    runner: &dyn JobRunner,
    handle: &JobHandle,
    call_timeout: Duration,
) {
    match timed_call("cancel", call_timeout, runner.cancel(handle)).await {
        Ok(()) => info!(job = %handle, "Cancelled job"),
        Err(e) => warn!(job = %handle, error = %e, "Failed to cancel job"),
    }
}
