//! Types for Job Runner operations.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::combination::CombinationKey;
use crate::config::JobsConfig;

/// Errors that can occur while talking to the Job Runner.
#[derive(Debug, Error)]
pub enum JobRunnerError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Job run not found: {0}")]
    NotFound(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timeout")]
    Timeout,
}

/// The three jobs run for every combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Synchronous preprocessing step, produces the working directory.
    Preprocess,
    /// First of the two parallel compute jobs.
    ComputeA,
    /// Second of the two parallel compute jobs.
    ComputeB,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Preprocess => "preprocess",
            JobKind::ComputeA => "compute_a",
            JobKind::ComputeB => "compute_b",
        }
    }

    /// Configured job name for this kind.
    pub fn job_name<'a>(&self, jobs: &'a JobsConfig) -> &'a str {
        match self {
            JobKind::Preprocess => &jobs.preprocess_job,
            JobKind::ComputeA => &jobs.compute_a_job,
            JobKind::ComputeB => &jobs.compute_b_job,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to a started job run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_name: String,
    pub run_id: String,
}

impl JobHandle {
    pub fn new(job_name: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            run_id: run_id.into(),
        }
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.job_name, self.run_id)
    }
}

/// Status of a job run as reported by the Job Runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
    Timeout,
    Stopped,
}

impl JobStatus {
    /// Returns true once no further progress will occur.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Succeeded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Timeout => "timeout",
            JobStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the synchronous preprocessing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PreprocessOutcome {
    Succeeded {
        execution_id: String,
        working_directory: String,
    },
    Failed {
        message: String,
    },
}

/// Parameters handed to every job of a combination.
///
/// Keys are stable names understood by the job service: `enterprise`,
/// `contract`, `version`, and once preprocessing is done `execution_id` and
/// `working_directory`. `bucket` is included when configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobParameters(BTreeMap<String, String>);

impl JobParameters {
    /// Parameters for the preprocessing call.
    pub fn for_combination(key: &CombinationKey, bucket: Option<&str>) -> Self {
        let mut params = BTreeMap::new();
        params.insert("enterprise".to_string(), key.enterprise_id.clone());
        params.insert("contract".to_string(), key.contract_id.clone());
        params.insert("version".to_string(), key.version_id.clone());
        if let Some(bucket) = bucket {
            params.insert("bucket".to_string(), bucket.to_string());
        }
        Self(params)
    }

    /// Parameters for the compute jobs, carrying the preprocessing output.
    pub fn with_preprocess_output(mut self, execution_id: &str, working_directory: &str) -> Self {
        self.0
            .insert("execution_id".to_string(), execution_id.to_string());
        self.0.insert(
            "working_directory".to_string(),
            working_directory.to_string(),
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

/// External compute service running preprocessing and the two compute jobs.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Returns the runner name (for logging).
    fn name(&self) -> &str;

    /// Run preprocessing to completion and return its output.
    async fn preprocess(&self, params: &JobParameters) -> Result<PreprocessOutcome, JobRunnerError>;

    /// Start a compute job and return its handle without waiting.
    async fn start(&self, kind: JobKind, params: &JobParameters)
        -> Result<JobHandle, JobRunnerError>;

    /// Query the current status of a started job.
    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, JobRunnerError>;

    /// Ask the runner to stop a job. Best effort: callers log and move on.
    async fn cancel(&self, handle: &JobHandle) -> Result<(), JobRunnerError>;
}
