//! Bounded Job Runner calls.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::metrics::{JOB_RUNNER_CALLS, JOB_RUNNER_DURATION};

use super::JobRunnerError;

/// Run one Job Runner call, giving up after `limit`.
///
/// Records call duration and outcome under `operation`.
pub async fn timed_call<T, F>(
    operation: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, JobRunnerError>
where
    F: Future<Output = Result<T, JobRunnerError>>,
{
    let start = Instant::now();
    let result = match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(JobRunnerError::Timeout),
    };

    JOB_RUNNER_DURATION
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());
    let status = match &result {
        Ok(_) => "success",
        Err(JobRunnerError::Timeout) => "timeout",
        Err(_) => "error",
    };
    JOB_RUNNER_CALLS
        .with_label_values(&[operation, status])
        .inc();

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_completes_within_limit() {
        let result = timed_call("poll", Duration::from_secs(1), async {
            Ok::<_, JobRunnerError>(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_call_exceeding_limit_times_out() {
        let result = timed_call("poll", Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, JobRunnerError>(())
        })
        .await;
        assert!(matches!(result, Err(JobRunnerError::Timeout)));
    }
}
