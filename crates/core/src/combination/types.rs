//! Core combination data types and the state machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::job_runner::{JobHandle, JobStatus};

// ============================================================================
// Identity
// ============================================================================

/// A combination's required field was missing or malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid combination: {0}")]
pub struct InvalidCombination(pub String);

/// Composite key of a unit of work: one (enterprise, contract, version) tuple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CombinationKey {
    pub enterprise_id: String,
    pub contract_id: String,
    pub version_id: String,
}

impl CombinationKey {
    /// Build a key, trimming whitespace and rejecting empty or path-like parts.
    pub fn new(
        enterprise_id: impl Into<String>,
        contract_id: impl Into<String>,
        version_id: impl Into<String>,
    ) -> Result<Self, InvalidCombination> {
        let key = Self {
            enterprise_id: enterprise_id.into().trim().to_string(),
            contract_id: contract_id.into().trim().to_string(),
            version_id: version_id.into().trim().to_string(),
        };
        key.validate()?;
        Ok(key)
    }

    /// Check that every part is present and usable as an object-storage path segment.
    pub fn validate(&self) -> Result<(), InvalidCombination> {
        for (field, value) in [
            ("enterprise_id", &self.enterprise_id),
            ("contract_id", &self.contract_id),
            ("version_id", &self.version_id),
        ] {
            if value.trim().is_empty() {
                return Err(InvalidCombination(format!("{} is required", field)));
            }
            if value.contains('/') {
                return Err(InvalidCombination(format!(
                    "{} cannot contain '/': {}",
                    field, value
                )));
            }
        }
        Ok(())
    }

    /// Display identifier, `{enterprise}_{contract}_{version}`.
    pub fn id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.enterprise_id, self.contract_id, self.version_id
        )
    }
}

impl fmt::Display for CombinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.enterprise_id, self.contract_id, self.version_id
        )
    }
}

// ============================================================================
// Status and state
// ============================================================================

/// Status of a combination without its payload (for filtering and counting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationStatus {
    Pending,
    Preprocessing,
    Preprocessed,
    Processing,
    Completed,
    Failed,
    Abandoned,
}

impl CombinationStatus {
    pub const ALL: [CombinationStatus; 7] = [
        CombinationStatus::Pending,
        CombinationStatus::Preprocessing,
        CombinationStatus::Preprocessed,
        CombinationStatus::Processing,
        CombinationStatus::Completed,
        CombinationStatus::Failed,
        CombinationStatus::Abandoned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CombinationStatus::Pending => "pending",
            CombinationStatus::Preprocessing => "preprocessing",
            CombinationStatus::Preprocessed => "preprocessed",
            CombinationStatus::Processing => "processing",
            CombinationStatus::Completed => "completed",
            CombinationStatus::Failed => "failed",
            CombinationStatus::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for CombinationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CombinationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CombinationStatus::ALL
            .iter()
            .find(|status| status.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown status: {}", s))
    }
}

/// Why a combination ended up failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The preprocessing call failed or returned an error.
    Preprocess,
    /// One of the compute jobs could not be started.
    Dispatch,
    /// A compute job reached a non-successful terminal status.
    Jobs,
    /// Jobs ran longer than the timeout and were given up on.
    Timeout,
    /// Admitted but never progressed (orphaned by a crashed scheduler).
    Stale,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Preprocess => "preprocess",
            FailureKind::Dispatch => "dispatch",
            FailureKind::Jobs => "jobs",
            FailureKind::Timeout => "timeout",
            FailureKind::Stale => "stale",
        }
    }
}

/// Current state of a combination.
///
/// State machine flow:
/// ```text
/// Pending -> Preprocessing -> Preprocessed -> Processing -> Completed
///                 |                |              |
///                 +----------------+--------------+--> Failed --reset--> Pending
///                                                        |
///                                                        +--reset at retry cap--> Abandoned
/// ```
///
/// Preprocessing, Preprocessed and Processing hold one unit of capacity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CombinationState {
    /// Registered, waiting for admission.
    Pending,

    /// Admitted; the preprocessing call is in flight.
    Preprocessing { admitted_at: DateTime<Utc> },

    /// Preprocessing succeeded; compute jobs not yet dispatched.
    Preprocessed {
        admitted_at: DateTime<Utc>,
        execution_id: String,
        working_directory: String,
        preprocessed_at: DateTime<Utc>,
    },

    /// Both compute jobs dispatched and being monitored.
    Processing {
        admitted_at: DateTime<Utc>,
        execution_id: String,
        working_directory: String,
        job_a: JobHandle,
        job_b: JobHandle,
        jobs_started_at: DateTime<Utc>,
        /// Last status seen for job A.
        job_a_status: JobStatus,
        /// Last status seen for job B.
        job_b_status: JobStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_checked_at: Option<DateTime<Utc>>,
    },

    /// Both compute jobs succeeded (terminal).
    Completed {
        admitted_at: DateTime<Utc>,
        execution_id: String,
        working_directory: String,
        completed_at: DateTime<Utc>,
    },

    /// Something went wrong; recoverable through an explicit reset.
    Failed {
        failure: FailureKind,
        error: String,
        failed_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        admitted_at: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        execution_id: Option<String>,
    },

    /// Reset refused because the retry cap was reached (terminal).
    Abandoned {
        error: String,
        abandoned_at: DateTime<Utc>,
    },
}

impl CombinationState {
    pub fn status(&self) -> CombinationStatus {
        match self {
            CombinationState::Pending => CombinationStatus::Pending,
            CombinationState::Preprocessing { .. } => CombinationStatus::Preprocessing,
            CombinationState::Preprocessed { .. } => CombinationStatus::Preprocessed,
            CombinationState::Processing { .. } => CombinationStatus::Processing,
            CombinationState::Completed { .. } => CombinationStatus::Completed,
            CombinationState::Failed { .. } => CombinationStatus::Failed,
            CombinationState::Abandoned { .. } => CombinationStatus::Abandoned,
        }
    }

    /// Returns true if no further transitions happen without an operator.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CombinationState::Completed { .. }
                | CombinationState::Failed { .. }
                | CombinationState::Abandoned { .. }
        )
    }

    /// Returns true while the combination occupies a capacity slot.
    pub fn holds_capacity(&self) -> bool {
        matches!(
            self,
            CombinationState::Preprocessing { .. }
                | CombinationState::Preprocessed { .. }
                | CombinationState::Processing { .. }
        )
    }

    /// When capacity was acquired for the current (or last) run.
    pub fn admitted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            CombinationState::Preprocessing { admitted_at }
            | CombinationState::Preprocessed { admitted_at, .. }
            | CombinationState::Processing { admitted_at, .. }
            | CombinationState::Completed { admitted_at, .. } => Some(*admitted_at),
            CombinationState::Failed { admitted_at, .. } => *admitted_at,
            CombinationState::Pending | CombinationState::Abandoned { .. } => None,
        }
    }

    pub fn execution_id(&self) -> Option<&str> {
        match self {
            CombinationState::Preprocessed { execution_id, .. }
            | CombinationState::Processing { execution_id, .. }
            | CombinationState::Completed { execution_id, .. } => Some(execution_id),
            CombinationState::Failed { execution_id, .. } => execution_id.as_deref(),
            _ => None,
        }
    }

    pub fn working_directory(&self) -> Option<&str> {
        match self {
            CombinationState::Preprocessed {
                working_directory, ..
            }
            | CombinationState::Processing {
                working_directory, ..
            }
            | CombinationState::Completed {
                working_directory, ..
            } => Some(working_directory),
            _ => None,
        }
    }

    /// Error message of a failed or abandoned combination.
    pub fn error(&self) -> Option<&str> {
        match self {
            CombinationState::Failed { error, .. } | CombinationState::Abandoned { error, .. } => {
                Some(error)
            }
            _ => None,
        }
    }
}

// ============================================================================
// Record
// ============================================================================

/// A registered combination with its current state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Combination {
    #[serde(flatten)]
    pub key: CombinationKey,

    /// Current state.
    pub state: CombinationState,

    /// Number of operator resets so far.
    #[serde(default)]
    pub retries: u32,

    pub registered_at: DateTime<Utc>,

    /// Bumped by every transition.
    pub last_updated: DateTime<Utc>,
}

impl Combination {
    /// A freshly registered, pending combination.
    pub fn new(key: CombinationKey, now: DateTime<Utc>) -> Self {
        Self {
            key,
            state: CombinationState::Pending,
            retries: 0,
            registered_at: now,
            last_updated: now,
        }
    }

    pub fn status(&self) -> CombinationStatus {
        self.state.status()
    }

    pub fn holds_capacity(&self) -> bool {
        self.state.holds_capacity()
    }
}

// ============================================================================
// Transitions
// ============================================================================

/// A state change requested by the scheduler, reconciler or an operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// pending -> preprocessing (capacity acquired).
    Admit,
    /// preprocessing -> preprocessed.
    PreprocessSucceeded {
        execution_id: String,
        working_directory: String,
    },
    /// preprocessed -> processing.
    JobsDispatched { job_a: JobHandle, job_b: JobHandle },
    /// processing -> processing, recording the last statuses seen.
    ObserveJobs {
        job_a_status: JobStatus,
        job_b_status: JobStatus,
    },
    /// processing -> completed | failed, once both jobs are terminal.
    JobsFinished {
        job_a_status: JobStatus,
        job_b_status: JobStatus,
    },
    /// preprocessing | preprocessed | processing -> failed.
    Fail { failure: FailureKind, error: String },
    /// failed -> pending, or failed -> abandoned at the retry cap.
    Reset { max_retries: Option<u32> },
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Admit => "admit",
            Transition::PreprocessSucceeded { .. } => "preprocess_succeeded",
            Transition::JobsDispatched { .. } => "jobs_dispatched",
            Transition::ObserveJobs { .. } => "observe_jobs",
            Transition::JobsFinished { .. } => "jobs_finished",
            Transition::Fail { .. } => "fail",
            Transition::Reset { .. } => "reset",
        }
    }
}

/// A transition was attempted from a state that does not allow it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {transition} a combination in state {from}")]
    InvalidTransition {
        from: CombinationStatus,
        transition: &'static str,
    },

    #[error("jobs have not finished (A: {job_a_status}, B: {job_b_status})")]
    JobsNotFinished {
        job_a_status: JobStatus,
        job_b_status: JobStatus,
    },

    #[error("combination changed since it was observed")]
    Superseded,
}

impl Combination {
    /// Apply a transition, producing the next record.
    ///
    /// This is the only place where state edges are checked. Capacity is not
    /// touched here; the store derives it from `holds_capacity` on both sides.
    pub fn apply(
        &self,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Combination, TransitionError> {
        let invalid = |transition: &Transition| TransitionError::InvalidTransition {
            from: self.status(),
            transition: transition.name(),
        };

        let mut retries = self.retries;
        let state = match (&self.state, &transition) {
            (CombinationState::Pending, Transition::Admit) => {
                CombinationState::Preprocessing { admitted_at: now }
            }

            (
                CombinationState::Preprocessing { admitted_at },
                Transition::PreprocessSucceeded {
                    execution_id,
                    working_directory,
                },
            ) => CombinationState::Preprocessed {
                admitted_at: *admitted_at,
                execution_id: execution_id.clone(),
                working_directory: working_directory.clone(),
                preprocessed_at: now,
            },

            (
                CombinationState::Preprocessed {
                    admitted_at,
                    execution_id,
                    working_directory,
                    ..
                },
                Transition::JobsDispatched { job_a, job_b },
            ) => CombinationState::Processing {
                admitted_at: *admitted_at,
                execution_id: execution_id.clone(),
                working_directory: working_directory.clone(),
                job_a: job_a.clone(),
                job_b: job_b.clone(),
                jobs_started_at: now,
                job_a_status: JobStatus::Running,
                job_b_status: JobStatus::Running,
                last_checked_at: None,
            },

            (
                CombinationState::Processing { .. },
                Transition::ObserveJobs {
                    job_a_status: a,
                    job_b_status: b,
                },
            ) => {
                let mut state = self.state.clone();
                if let CombinationState::Processing {
                    job_a_status,
                    job_b_status,
                    last_checked_at,
                    ..
                } = &mut state
                {
                    *job_a_status = *a;
                    *job_b_status = *b;
                    *last_checked_at = Some(now);
                }
                state
            }

            (
                CombinationState::Processing {
                    admitted_at,
                    execution_id,
                    working_directory,
                    job_a,
                    job_b,
                    ..
                },
                Transition::JobsFinished {
                    job_a_status,
                    job_b_status,
                },
            ) => {
                if !job_a_status.is_terminal() || !job_b_status.is_terminal() {
                    return Err(TransitionError::JobsNotFinished {
                        job_a_status: *job_a_status,
                        job_b_status: *job_b_status,
                    });
                }
                if job_a_status.is_success() && job_b_status.is_success() {
                    CombinationState::Completed {
                        admitted_at: *admitted_at,
                        execution_id: execution_id.clone(),
                        working_directory: working_directory.clone(),
                        completed_at: now,
                    }
                } else {
                    CombinationState::Failed {
                        failure: FailureKind::Jobs,
                        error: format!(
                            "{}: {}, {}: {}",
                            job_a.job_name, job_a_status, job_b.job_name, job_b_status
                        ),
                        failed_at: now,
                        admitted_at: Some(*admitted_at),
                        execution_id: Some(execution_id.clone()),
                    }
                }
            }

            (state, Transition::Fail { failure, error }) if state.holds_capacity() => {
                CombinationState::Failed {
                    failure: *failure,
                    error: error.clone(),
                    failed_at: now,
                    admitted_at: state.admitted_at(),
                    execution_id: state.execution_id().map(str::to_string),
                }
            }

            (CombinationState::Failed { error, .. }, Transition::Reset { max_retries }) => {
                match max_retries {
                    Some(max) if self.retries >= *max => CombinationState::Abandoned {
                        error: format!(
                            "retry limit reached after {} retries; last error: {}",
                            self.retries, error
                        ),
                        abandoned_at: now,
                    },
                    _ => {
                        retries += 1;
                        CombinationState::Pending
                    }
                }
            }

            (_, transition) => return Err(invalid(transition)),
        };

        Ok(Combination {
            key: self.key.clone(),
            state,
            retries,
            registered_at: self.registered_at,
            last_updated: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn key() -> CombinationKey {
        CombinationKey::new("1", "1", "A").unwrap()
    }

    fn handle(job: &str) -> JobHandle {
        JobHandle::new(job, format!("{}-run", job))
    }

    /// Drive a fresh combination to processing.
    fn processing(now: DateTime<Utc>) -> Combination {
        Combination::new(key(), now)
            .apply(Transition::Admit, now)
            .unwrap()
            .apply(
                Transition::PreprocessSucceeded {
                    execution_id: "exec-1".to_string(),
                    working_directory: "/tmp/exec-1".to_string(),
                },
                now,
            )
            .unwrap()
            .apply(
                Transition::JobsDispatched {
                    job_a: handle("a"),
                    job_b: handle("b"),
                },
                now,
            )
            .unwrap()
    }

    #[test]
    fn test_key_validation() {
        assert!(CombinationKey::new("1", "2", "A").is_ok());
        assert!(CombinationKey::new("", "2", "A").is_err());
        assert!(CombinationKey::new("1", "  ", "A").is_err());
        assert!(CombinationKey::new("1", "2", "A/B").is_err());

        let key = CombinationKey::new(" 1 ", "2", "A").unwrap();
        assert_eq!(key.enterprise_id, "1");
        assert_eq!(key.id(), "1_2_A");
        assert_eq!(key.to_string(), "1_2_A");
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in CombinationStatus::ALL {
            assert_eq!(status.as_str().parse::<CombinationStatus>(), Ok(status));
        }
        assert!("running".parse::<CombinationStatus>().is_err());
    }

    #[test]
    fn test_happy_path_visits_every_state() {
        let now = Utc::now();
        let mut unit = Combination::new(key(), now);
        assert_eq!(unit.status(), CombinationStatus::Pending);
        assert!(!unit.holds_capacity());

        unit = unit.apply(Transition::Admit, now).unwrap();
        assert_eq!(unit.status(), CombinationStatus::Preprocessing);
        assert!(unit.holds_capacity());

        unit = unit
            .apply(
                Transition::PreprocessSucceeded {
                    execution_id: "exec-1".to_string(),
                    working_directory: "/tmp/exec-1".to_string(),
                },
                now,
            )
            .unwrap();
        assert_eq!(unit.status(), CombinationStatus::Preprocessed);
        assert_eq!(unit.state.execution_id(), Some("exec-1"));

        unit = unit
            .apply(
                Transition::JobsDispatched {
                    job_a: handle("a"),
                    job_b: handle("b"),
                },
                now,
            )
            .unwrap();
        assert_eq!(unit.status(), CombinationStatus::Processing);

        let done = now + Duration::minutes(30);
        unit = unit
            .apply(
                Transition::JobsFinished {
                    job_a_status: JobStatus::Succeeded,
                    job_b_status: JobStatus::Succeeded,
                },
                done,
            )
            .unwrap();
        assert_eq!(unit.status(), CombinationStatus::Completed);
        assert!(!unit.holds_capacity());
        assert_eq!(unit.last_updated, done);
        assert_eq!(unit.state.working_directory(), Some("/tmp/exec-1"));
    }

    #[test]
    fn test_cannot_skip_states() {
        let now = Utc::now();
        let pending = Combination::new(key(), now);

        let err = pending
            .apply(
                Transition::JobsDispatched {
                    job_a: handle("a"),
                    job_b: handle("b"),
                },
                now,
            )
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: CombinationStatus::Pending,
                transition: "jobs_dispatched",
            }
        );

        let preprocessing = pending.apply(Transition::Admit, now).unwrap();
        assert!(preprocessing.apply(Transition::Admit, now).is_err());
        assert!(preprocessing
            .apply(
                Transition::JobsFinished {
                    job_a_status: JobStatus::Succeeded,
                    job_b_status: JobStatus::Succeeded,
                },
                now,
            )
            .is_err());
    }

    #[test]
    fn test_pending_cannot_fail() {
        let now = Utc::now();
        let pending = Combination::new(key(), now);
        let result = pending.apply(
            Transition::Fail {
                failure: FailureKind::Timeout,
                error: "timeout".to_string(),
            },
            now,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_mixed_job_outcome_fails_with_both_statuses() {
        let now = Utc::now();
        let failed = processing(now)
            .apply(
                Transition::JobsFinished {
                    job_a_status: JobStatus::Succeeded,
                    job_b_status: JobStatus::Failed,
                },
                now,
            )
            .unwrap();

        match &failed.state {
            CombinationState::Failed {
                failure,
                error,
                execution_id,
                ..
            } => {
                assert_eq!(*failure, FailureKind::Jobs);
                assert_eq!(error, "a: succeeded, b: failed");
                assert_eq!(execution_id.as_deref(), Some("exec-1"));
            }
            other => panic!("expected failed, got {:?}", other),
        }
    }

    #[test]
    fn test_jobs_finished_requires_terminal_statuses() {
        let now = Utc::now();
        let err = processing(now)
            .apply(
                Transition::JobsFinished {
                    job_a_status: JobStatus::Succeeded,
                    job_b_status: JobStatus::Running,
                },
                now,
            )
            .unwrap_err();
        assert!(matches!(err, TransitionError::JobsNotFinished { .. }));
    }

    #[test]
    fn test_observe_jobs_keeps_processing() {
        let now = Utc::now();
        let later = now + Duration::minutes(5);
        let observed = processing(now)
            .apply(
                Transition::ObserveJobs {
                    job_a_status: JobStatus::Succeeded,
                    job_b_status: JobStatus::Running,
                },
                later,
            )
            .unwrap();

        match observed.state {
            CombinationState::Processing {
                job_a_status,
                job_b_status,
                last_checked_at,
                jobs_started_at,
                ..
            } => {
                assert_eq!(job_a_status, JobStatus::Succeeded);
                assert_eq!(job_b_status, JobStatus::Running);
                assert_eq!(last_checked_at, Some(later));
                assert_eq!(jobs_started_at, now);
            }
            other => panic!("expected processing, got {:?}", other),
        }
        assert_eq!(observed.last_updated, later);
    }

    #[test]
    fn test_reset_clears_error_and_counts_retry() {
        let now = Utc::now();
        let failed = processing(now)
            .apply(
                Transition::Fail {
                    failure: FailureKind::Timeout,
                    error: "timeout".to_string(),
                },
                now,
            )
            .unwrap();
        assert_eq!(failed.state.error(), Some("timeout"));

        let reset = failed
            .apply(Transition::Reset { max_retries: None }, now)
            .unwrap();
        assert_eq!(reset.state, CombinationState::Pending);
        assert_eq!(reset.retries, 1);
        assert_eq!(reset.state.error(), None);
    }

    #[test]
    fn test_reset_at_retry_cap_abandons() {
        let now = Utc::now();
        let mut failed = processing(now)
            .apply(
                Transition::Fail {
                    failure: FailureKind::Jobs,
                    error: "boom".to_string(),
                },
                now,
            )
            .unwrap();
        failed.retries = 2;

        let abandoned = failed
            .apply(Transition::Reset { max_retries: Some(2) }, now)
            .unwrap();
        assert_eq!(abandoned.status(), CombinationStatus::Abandoned);
        assert_eq!(abandoned.retries, 2);
        assert!(abandoned.state.error().unwrap().contains("boom"));
        assert!(abandoned.state.is_terminal());

        assert!(abandoned
            .apply(Transition::Reset { max_retries: None }, now)
            .is_err());
    }

    #[test]
    fn test_reset_only_from_failed() {
        let now = Utc::now();
        let result = processing(now).apply(Transition::Reset { max_retries: None }, now);
        assert!(result.is_err());
    }

    #[test]
    fn test_state_serialization_is_tagged() {
        let now = Utc::now();
        let unit = processing(now);
        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["enterprise_id"], "1");
        assert_eq!(json["state"]["type"], "processing");
        assert_eq!(json["state"]["job_a"]["job_name"], "a");
        assert_eq!(json["state"]["job_a_status"], "running");

        let parsed: Combination = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, unit);
    }
}
