//! HTTP Job Runner implementation.
//!
//! Talks JSON to a job service that fronts the compute cluster:
//!
//! - `POST /preprocess` runs preprocessing synchronously
//! - `POST /jobs/{job}/runs` starts a run and returns its id
//! - `GET /jobs/{job}/runs/{run_id}` reports the run state
//! - `POST /jobs/{job}/runs/{run_id}/cancel` stops a run

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{HttpJobRunnerConfig, JobsConfig};

use super::{JobHandle, JobKind, JobParameters, JobRunner, JobRunnerError, JobStatus, PreprocessOutcome};

/// Job service client.
pub struct HttpJobRunner {
    client: Client,
    config: HttpJobRunnerConfig,
    jobs: JobsConfig,
}

#[derive(Serialize)]
struct PreprocessRequest<'a> {
    job_name: &'a str,
    parameters: &'a JobParameters,
}

#[derive(Serialize)]
struct StartRunRequest<'a> {
    parameters: &'a JobParameters,
}

#[derive(Deserialize)]
struct StartRunResponse {
    run_id: String,
}

#[derive(Deserialize)]
struct RunStatusResponse {
    status: String,
}

impl HttpJobRunner {
    /// Create a new job service client.
    pub fn new(config: HttpJobRunnerConfig, jobs: JobsConfig) -> Result<Self, JobRunnerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| JobRunnerError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            jobs,
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn run_url(&self, handle: &JobHandle) -> String {
        format!(
            "{}/jobs/{}/runs/{}",
            self.base_url(),
            handle.job_name,
            handle.run_id
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, JobRunnerError> {
        let response = self.authorize(request).send().await.map_err(|e| {
            if e.is_timeout() {
                JobRunnerError::Timeout
            } else if e.is_connect() {
                JobRunnerError::ConnectionFailed(e.to_string())
            } else {
                JobRunnerError::ApiError(e.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(JobRunnerError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JobRunnerError::ApiError(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        Ok(response)
    }
}

/// Map a job service run state onto a `JobStatus`.
///
/// Accepts both the lowercase names used by this crate and the uppercase
/// run states reported by managed ETL services (`STARTING`, `ERROR`, ...).
pub(crate) fn parse_run_state(state: &str) -> Result<JobStatus, JobRunnerError> {
    match state.to_ascii_uppercase().as_str() {
        "RUNNING" | "STARTING" | "STOPPING" | "WAITING" | "PENDING" | "QUEUED" => {
            Ok(JobStatus::Running)
        }
        "SUCCEEDED" => Ok(JobStatus::Succeeded),
        "FAILED" | "ERROR" => Ok(JobStatus::Failed),
        "TIMEOUT" => Ok(JobStatus::Timeout),
        "STOPPED" => Ok(JobStatus::Stopped),
        other => Err(JobRunnerError::InvalidResponse(format!(
            "unknown run state: {}",
            other
        ))),
    }
}

#[async_trait]
impl JobRunner for HttpJobRunner {
    fn name(&self) -> &str {
        "http"
    }

    async fn preprocess(&self, params: &JobParameters) -> Result<PreprocessOutcome, JobRunnerError> {
        let url = format!("{}/preprocess", self.base_url());
        let body = PreprocessRequest {
            job_name: &self.jobs.preprocess_job,
            parameters: params,
        };

        let response = self
            .send(self.client.post(&url).json(&body), &self.jobs.preprocess_job)
            .await?;

        response
            .json::<PreprocessOutcome>()
            .await
            .map_err(|e| JobRunnerError::InvalidResponse(e.to_string()))
    }

    async fn start(
        &self,
        kind: JobKind,
        params: &JobParameters,
    ) -> Result<JobHandle, JobRunnerError> {
        let job_name = kind.job_name(&self.jobs);
        let url = format!("{}/jobs/{}/runs", self.base_url(), job_name);

        let response = self
            .send(
                self.client
                    .post(&url)
                    .json(&StartRunRequest { parameters: params }),
                job_name,
            )
            .await?;

        let started: StartRunResponse = response
            .json()
            .await
            .map_err(|e| JobRunnerError::InvalidResponse(e.to_string()))?;

        debug!("Started {} run {}", job_name, started.run_id);
        Ok(JobHandle::new(job_name, started.run_id))
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, JobRunnerError> {
        let response = self
            .send(self.client.get(self.run_url(handle)), &handle.to_string())
            .await?;

        let run: RunStatusResponse = response
            .json()
            .await
            .map_err(|e| JobRunnerError::InvalidResponse(e.to_string()))?;

        parse_run_state(&run.status)
    }

    async fn cancel(&self, handle: &JobHandle) -> Result<(), JobRunnerError> {
        let url = format!("{}/cancel", self.run_url(handle));
        self.send(self.client.post(&url), &handle.to_string())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combination::CombinationKey;

    fn runner(url: &str) -> HttpJobRunner {
        HttpJobRunner::new(
            HttpJobRunnerConfig {
                url: url.to_string(),
                api_key: None,
                timeout_secs: 2,
            },
            JobsConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let runner = runner("http://jobs.local:9400/");
        assert_eq!(runner.base_url(), "http://jobs.local:9400");
        let handle = JobHandle::new("macro-generator", "jr_1");
        assert_eq!(
            runner.run_url(&handle),
            "http://jobs.local:9400/jobs/macro-generator/runs/jr_1"
        );
    }

    #[test]
    fn test_parse_run_state() {
        assert_eq!(parse_run_state("running").unwrap(), JobStatus::Running);
        assert_eq!(parse_run_state("STARTING").unwrap(), JobStatus::Running);
        assert_eq!(parse_run_state("SUCCEEDED").unwrap(), JobStatus::Succeeded);
        assert_eq!(parse_run_state("ERROR").unwrap(), JobStatus::Failed);
        assert_eq!(parse_run_state("timeout").unwrap(), JobStatus::Timeout);
        assert_eq!(parse_run_state("STOPPED").unwrap(), JobStatus::Stopped);
        assert!(matches!(
            parse_run_state("exploded"),
            Err(JobRunnerError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service_reports_error() {
        // Port 9 (discard) is not expected to run an HTTP server.
        let runner = runner("http://127.0.0.1:9");
        let key = CombinationKey::new("1", "1", "A").unwrap();
        let result = runner
            .start(JobKind::ComputeA, &JobParameters::for_combination(&key, None))
            .await;
        assert!(result.is_err());
    }
}
