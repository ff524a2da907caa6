use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub capacity: CapacityConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub reconciler: ReconcilerConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub job_runner: JobRunnerConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("gtfs-batch.db")
}

/// Global concurrency ceiling.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CapacityConfig {
    /// Maximum number of combinations in flight at once (default: 5)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,
}

impl Default for CapacityConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_max_concurrent() -> u32 {
    5
}

/// Scheduler tick configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Default `max_to_start` when a tick is triggered without one (default: 1)
    #[serde(default = "default_max_to_start")]
    pub max_to_start: u32,
    /// Timeout for a single Job Runner call made by the scheduler (default: 900s).
    /// Preprocessing is synchronous and may take several minutes.
    #[serde(default = "default_scheduler_call_timeout")]
    pub call_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_to_start: default_max_to_start(),
            call_timeout_secs: default_scheduler_call_timeout(),
        }
    }
}

fn default_max_to_start() -> u32 {
    1
}

fn default_scheduler_call_timeout() -> u64 {
    900
}

/// Reconciler tick configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcilerConfig {
    /// Default `max_to_check` when a tick is triggered without one (default: 100)
    #[serde(default = "default_max_to_check")]
    pub max_to_check: u32,
    /// Processing units older than this are forced to failed (default: 4h)
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
    /// Preprocessing/preprocessed units older than this are orphans (default: 8h)
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
    /// Preprocessed units older than this get their compute jobs dispatched (default: 10m)
    #[serde(default = "default_resume_after")]
    pub resume_after_secs: u64,
    /// Timeout for a single status poll (default: 60s)
    #[serde(default = "default_reconciler_call_timeout")]
    pub call_timeout_secs: u64,
    /// Resets beyond this many retries abandon the unit instead (default: unlimited)
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_to_check: default_max_to_check(),
            job_timeout_secs: default_job_timeout(),
            stale_after_secs: default_stale_after(),
            resume_after_secs: default_resume_after(),
            call_timeout_secs: default_reconciler_call_timeout(),
            max_retries: None,
        }
    }
}

fn default_max_to_check() -> u32 {
    100
}

fn default_job_timeout() -> u64 {
    4 * 60 * 60
}

fn default_stale_after() -> u64 {
    8 * 60 * 60
}

fn default_resume_after() -> u64 {
    10 * 60
}

fn default_reconciler_call_timeout() -> u64 {
    60
}

/// Names and shared parameters of the jobs run for each combination.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    #[serde(default = "default_preprocess_job")]
    pub preprocess_job: String,
    #[serde(default = "default_compute_a_job")]
    pub compute_a_job: String,
    #[serde(default = "default_compute_b_job")]
    pub compute_b_job: String,
    /// Bucket holding the raw feeds, passed to every job
    #[serde(default)]
    pub bucket: Option<String>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            preprocess_job: default_preprocess_job(),
            compute_a_job: default_compute_a_job(),
            compute_b_job: default_compute_b_job(),
            bucket: None,
        }
    }
}

fn default_preprocess_job() -> String {
    "gtfs-preprocessor".to_string()
}

fn default_compute_a_job() -> String {
    "macro-generator".to_string()
}

fn default_compute_b_job() -> String {
    "macro-stops-generator".to_string()
}

/// Job Runner backend selection.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JobRunnerConfig {
    #[serde(default)]
    pub backend: JobRunnerBackend,
    /// Required when backend = "http"
    #[serde(default)]
    pub http: Option<HttpJobRunnerConfig>,
}

/// Available Job Runner backends
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobRunnerBackend {
    #[default]
    Http,
    /// In-process mock, for local dry runs
    Mock,
}

/// HTTP job service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpJobRunnerConfig {
    /// Job service base URL (e.g., "http://localhost:9400")
    pub url: String,
    /// Bearer token sent with every request
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u32,
}

fn default_http_timeout() -> u32 {
    30
}

/// Object-storage discovery configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub backend: DiscoveryBackend,
    /// Local mirror of the bucket (backend = "filesystem")
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    /// Static combinations list (backend = "file")
    #[serde(default)]
    pub combinations_file: Option<PathBuf>,
    /// Feed types every combination must provide
    #[serde(default = "default_required_types")]
    pub required_types: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            backend: DiscoveryBackend::default(),
            root: None,
            bucket: None,
            region: None,
            combinations_file: None,
            required_types: default_required_types(),
        }
    }
}

fn default_required_types() -> Vec<String> {
    ["AGENCY", "ROUTES", "TRIPS", "STOPS", "STOP_TIMES"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Available discovery backends
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryBackend {
    #[default]
    None,
    Filesystem,
    File,
}

/// Optional in-process periodic trigger for the ticks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriverConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_scheduler_interval")]
    pub scheduler_interval_ms: u64,
    #[serde(default = "default_reconciler_interval")]
    pub reconciler_interval_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scheduler_interval_ms: default_scheduler_interval(),
            reconciler_interval_ms: default_reconciler_interval(),
        }
    }
}

fn default_scheduler_interval() -> u64 {
    60_000
}

fn default_reconciler_interval() -> u64 {
    30_000
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub capacity: CapacityConfig,
    pub scheduler: SchedulerConfig,
    pub reconciler: ReconcilerConfig,
    pub jobs: JobsConfig,
    pub job_runner: SanitizedJobRunnerConfig,
    pub discovery: DiscoveryConfig,
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedJobRunnerConfig {
    pub backend: JobRunnerBackend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub api_key_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            capacity: config.capacity.clone(),
            scheduler: config.scheduler.clone(),
            reconciler: config.reconciler.clone(),
            jobs: config.jobs.clone(),
            job_runner: SanitizedJobRunnerConfig {
                backend: config.job_runner.backend,
                url: config.job_runner.http.as_ref().map(|h| h.url.clone()),
                api_key_configured: config
                    .job_runner
                    .http
                    .as_ref()
                    .is_some_and(|h| h.api_key.is_some()),
            },
            discovery: config.discovery.clone(),
            driver: config.driver.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, PathBuf::from("gtfs-batch.db"));
        assert_eq!(config.capacity.max_concurrent, 5);
        assert_eq!(config.scheduler.max_to_start, 1);
        assert_eq!(config.reconciler.job_timeout_secs, 14_400);
        assert_eq!(config.reconciler.stale_after_secs, 28_800);
        assert!(config.reconciler.max_retries.is_none());
        assert_eq!(config.discovery.backend, DiscoveryBackend::None);
        assert_eq!(config.discovery.required_types.len(), 5);
        assert!(!config.driver.enabled);
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[capacity]
max_concurrent = 2

[scheduler]
max_to_start = 3

[reconciler]
max_to_check = 10
max_retries = 4

[jobs]
bucket = "bronze"

[job_runner]
backend = "http"

[job_runner.http]
url = "http://localhost:9400"
api_key = "secret"

[discovery]
backend = "filesystem"
root = "/data/bronze"
required_types = ["AGENCY", "STOPS"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.capacity.max_concurrent, 2);
        assert_eq!(config.scheduler.max_to_start, 3);
        assert_eq!(config.reconciler.max_retries, Some(4));
        assert_eq!(config.jobs.bucket.as_deref(), Some("bronze"));
        let http = config.job_runner.http.unwrap();
        assert_eq!(http.url, "http://localhost:9400");
        assert_eq!(http.timeout_secs, 30);
        assert_eq!(config.discovery.backend, DiscoveryBackend::Filesystem);
        assert_eq!(config.discovery.required_types, vec!["AGENCY", "STOPS"]);
    }

    #[test]
    fn test_unknown_backend_fails() {
        let toml = r#"
[job_runner]
backend = "glue"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_sanitized_config_redacts_api_key() {
        let mut config = Config::default();
        config.job_runner.http = Some(HttpJobRunnerConfig {
            url: "http://jobs".to_string(),
            api_key: Some("super-secret".to_string()),
            timeout_secs: 30,
        });

        let sanitized = SanitizedConfig::from(&config);
        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("super-secret"));
        assert!(json.contains("\"api_key_configured\":true"));
        assert!(json.contains("http://jobs"));
    }
}
