pub mod capacity;
pub mod combination;
pub mod config;
mod dispatch;
pub mod discovery;
pub mod driver;
pub mod job_runner;
pub mod metrics;
pub mod reconciler;
pub mod recovery;
pub mod registry;
pub mod reporting;
pub mod scheduler;
pub mod testing;

pub use capacity::{CapacityLedger, CapacitySnapshot};
pub use combination::{
    BatchStore, Combination, CombinationFilter, CombinationKey, CombinationState,
    CombinationStatus, CombinationStore, FailureKind, SqliteCombinationStore, StoreError,
    Transition, TransitionError,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DiscoveryBackend,
    JobRunnerBackend, SanitizedConfig,
};
pub use discovery::{
    CombinationSource, DiscoveryError, FileCombinationSource, FsCombinationSource, NoDiscovery,
};
pub use driver::TickDriver;
pub use job_runner::{
    HttpJobRunner, JobHandle, JobKind, JobParameters, JobRunner, JobRunnerError, JobStatus,
    PreprocessOutcome,
};
pub use reconciler::{ReconcileReport, Reconciler};
pub use recovery::{Recovery, ResetReport};
pub use registry::{RegistrationSummary, WorkRegistry};
pub use reporting::{AggregateStatus, Reporter, StatusDocument};
pub use scheduler::{Scheduler, SchedulerTickReport};
