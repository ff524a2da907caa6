//! Mock Job Runner for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::JobsConfig;
use crate::job_runner::{
    JobHandle, JobKind, JobParameters, JobRunner, JobRunnerError, JobStatus, PreprocessOutcome,
};

/// A recorded job start for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedStart {
    pub kind: JobKind,
    pub handle: JobHandle,
    pub params: JobParameters,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Mock implementation of the JobRunner trait.
///
/// Provides controllable behavior for testing:
/// - Track preprocess calls and job starts for assertions
/// - Control job statuses reported by `poll`
/// - Simulate preprocessing failures, dispatch failures and slow or broken polls
///
/// Started jobs report `Running` until told otherwise. Handles carry the
/// default configured job names.
///
/// # Example
///
/// ```rust,ignore
/// let runner = MockJobRunner::new();
/// runner.fail_starts_of(JobKind::ComputeB).await;
///
/// // ... run a scheduler tick ...
///
/// let started = runner.started_jobs().await;
/// runner.set_status(&started[0].handle, JobStatus::Succeeded).await;
/// ```
#[derive(Debug)]
pub struct MockJobRunner {
    jobs: JobsConfig,
    /// Recorded preprocess calls.
    preprocess_calls: Arc<RwLock<Vec<JobParameters>>>,
    /// Recorded start calls.
    started: Arc<RwLock<Vec<RecordedStart>>>,
    /// Recorded cancel calls.
    cancelled: Arc<RwLock<Vec<JobHandle>>>,
    /// Current status by handle.
    statuses: Arc<RwLock<HashMap<JobHandle, JobStatus>>>,
    /// Overrides the default successful preprocess outcome.
    preprocess_outcome: Arc<RwLock<Option<PreprocessOutcome>>>,
    /// If set, the next preprocess call will fail with this error.
    next_preprocess_error: Arc<RwLock<Option<JobRunnerError>>>,
    /// Kinds whose start calls fail.
    failing_starts: Arc<RwLock<HashSet<JobKind>>>,
    /// When true, every poll fails.
    poll_failing: Arc<RwLock<bool>>,
    /// Artificial latency added to every poll.
    poll_delay: Arc<RwLock<Option<Duration>>>,
    /// Artificial latency added to every start, before the run exists.
    start_delay: Arc<RwLock<Option<Duration>>>,
    /// Counter for generating unique run ids.
    run_counter: Arc<RwLock<u32>>,
}

impl Default for MockJobRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockJobRunner {
    /// Create a new mock job runner.
    pub fn new() -> Self {
        Self {
            jobs: JobsConfig::default(),
            preprocess_calls: Arc::new(RwLock::new(Vec::new())),
            started: Arc::new(RwLock::new(Vec::new())),
            cancelled: Arc::new(RwLock::new(Vec::new())),
            statuses: Arc::new(RwLock::new(HashMap::new())),
            preprocess_outcome: Arc::new(RwLock::new(None)),
            next_preprocess_error: Arc::new(RwLock::new(None)),
            failing_starts: Arc::new(RwLock::new(HashSet::new())),
            poll_failing: Arc::new(RwLock::new(false)),
            poll_delay: Arc::new(RwLock::new(None)),
            start_delay: Arc::new(RwLock::new(None)),
            run_counter: Arc::new(RwLock::new(0)),
        }
    }

    /// Get all recorded preprocess calls.
    pub async fn preprocess_calls(&self) -> Vec<JobParameters> {
        self.preprocess_calls.read().await.clone()
    }

    /// Get all recorded job starts.
    pub async fn started_jobs(&self) -> Vec<RecordedStart> {
        self.started.read().await.clone()
    }

    /// Get recorded starts of one kind.
    pub async fn started_of(&self, kind: JobKind) -> Vec<RecordedStart> {
        self.started
            .read()
            .await
            .iter()
            .filter(|s| s.kind == kind)
            .cloned()
            .collect()
    }

    /// Get all handles passed to `cancel`.
    pub async fn cancelled_jobs(&self) -> Vec<JobHandle> {
        self.cancelled.read().await.clone()
    }

    /// Set the status `poll` reports for a handle.
    pub async fn set_status(&self, handle: &JobHandle, status: JobStatus) {
        self.statuses.write().await.insert(handle.clone(), status);
    }

    /// Set the status of every started job of one kind.
    pub async fn set_status_of_all(&self, kind: JobKind, status: JobStatus) {
        let started = self.started_of(kind).await;
        let mut statuses = self.statuses.write().await;
        for start in started {
            statuses.insert(start.handle, status);
        }
    }

    /// Make every following preprocess call return this outcome.
    pub async fn set_preprocess_outcome(&self, outcome: PreprocessOutcome) {
        *self.preprocess_outcome.write().await = Some(outcome);
    }

    /// Make the next preprocess call fail with an error.
    pub async fn set_next_preprocess_error(&self, error: JobRunnerError) {
        *self.next_preprocess_error.write().await = Some(error);
    }

    /// Make start calls of this kind fail.
    pub async fn fail_starts_of(&self, kind: JobKind) {
        self.failing_starts.write().await.insert(kind);
    }

    /// Make every poll fail (or succeed again).
    pub async fn set_poll_failing(&self, failing: bool) {
        *self.poll_failing.write().await = failing;
    }

    /// Delay every poll, e.g. to exceed a call timeout.
    pub async fn set_poll_delay(&self, delay: Option<Duration>) {
        *self.poll_delay.write().await = delay;
    }

    /// Delay every start, e.g. to hold a dispatch open while another writer acts.
    pub async fn set_start_delay(&self, delay: Option<Duration>) {
        *self.start_delay.write().await = delay;
    }

    async fn next_run_id(&self) -> String {
        let mut counter = self.run_counter.write().await;
        *counter += 1;
        format!("mockrun{:08x}", *counter)
    }
}

#[async_trait]
impl JobRunner for MockJobRunner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn preprocess(&self, params: &JobParameters) -> Result<PreprocessOutcome, JobRunnerError> {
        self.preprocess_calls.write().await.push(params.clone());

        if let Some(error) = self.next_preprocess_error.write().await.take() {
            return Err(error);
        }

        if let Some(outcome) = self.preprocess_outcome.read().await.clone() {
            return Ok(outcome);
        }

        let execution_id = format!("exec-{}", uuid::Uuid::new_v4());
        Ok(PreprocessOutcome::Succeeded {
            working_directory: format!("/tmp/gtfs/{}", execution_id),
            execution_id,
        })
    }

    async fn start(
        &self,
        kind: JobKind,
        params: &JobParameters,
    ) -> Result<JobHandle, JobRunnerError> {
        let delay = *self.start_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_starts.read().await.contains(&kind) {
            return Err(JobRunnerError::ApiError(format!(
                "mock start failure for {}",
                kind
            )));
        }

        let handle = JobHandle::new(kind.job_name(&self.jobs), self.next_run_id().await);
        self.statuses
            .write()
            .await
            .insert(handle.clone(), JobStatus::Running);
        self.started.write().await.push(RecordedStart {
            kind,
            handle: handle.clone(),
            params: params.clone(),
            timestamp: Utc::now(),
        });

        Ok(handle)
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, JobRunnerError> {
        let delay = *self.poll_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.poll_failing.read().await {
            return Err(JobRunnerError::ConnectionFailed(
                "mock poll failure".to_string(),
            ));
        }

        self.statuses
            .read()
            .await
            .get(handle)
            .copied()
            .ok_or_else(|| JobRunnerError::NotFound(handle.to_string()))
    }

    async fn cancel(&self, handle: &JobHandle) -> Result<(), JobRunnerError> {
        self.cancelled.write().await.push(handle.clone());
        let mut statuses = self.statuses.write().await;
        match statuses.get_mut(handle) {
            Some(status) => {
                *status = JobStatus::Stopped;
                Ok(())
            }
            None => Err(JobRunnerError::NotFound(handle.to_string())),
        }
    }
}
