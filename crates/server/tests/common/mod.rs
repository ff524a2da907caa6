//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock dependencies injected, so the full admission cycle can be driven
//! through the API without a job service or object storage.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use gtfs_batch_core::config::{CapacityConfig, DatabaseConfig, JobRunnerBackend, ServerConfig};
use gtfs_batch_core::testing::{MockCombinationSource, MockJobRunner};
use gtfs_batch_core::{BatchStore, Config, SqliteCombinationStore};

/// Re-export fixtures for test convenience
pub use gtfs_batch_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// Provides an in-process server with fully controllable mocks for:
/// - Job execution (MockJobRunner)
/// - Object-storage discovery (MockCombinationSource)
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_registration() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/registrations", json!({
///         "combinations": [{ "P_EMPRESA": "1", "P_CONTR": "10", "P_VERSION": "A" }]
///     })).await;
///
///     assert_eq!(response.body["registered"], 1);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock job runner - control preprocessing and job statuses
    pub runner: Arc<MockJobRunner>,
    /// Mock discovery source - configure listed combinations
    pub source: Arc<MockCombinationSource>,
    /// Store behind the router, for direct assertions
    pub store: Arc<dyn BatchStore>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    /// Raw body, for non-JSON responses
    pub text: String,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_capacity(5).await
    }

    /// Create a test fixture with the given concurrency ceiling.
    pub async fn with_capacity(max_concurrent: u32) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        // Create mocks
        let runner = Arc::new(MockJobRunner::new());
        let source = Arc::new(MockCombinationSource::new());

        // Create config
        let mut config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            capacity: CapacityConfig { max_concurrent },
            ..Default::default()
        };
        config.job_runner.backend = JobRunnerBackend::Mock;

        let store: Arc<dyn BatchStore> = Arc::new(
            SqliteCombinationStore::new(&db_path, max_concurrent)
                .expect("Failed to create combination store"),
        );

        // Create app state with mocks
        let state = Arc::new(gtfs_batch_server::state::AppState::new(
            config,
            Arc::clone(&store),
            Arc::clone(&runner) as Arc<dyn gtfs_batch_core::JobRunner>,
            Arc::clone(&source) as Arc<dyn gtfs_batch_core::CombinationSource>,
        ));

        // Create router
        let router = gtfs_batch_server::api::create_router(state);

        Self {
            router,
            runner,
            source,
            store,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        self.send(request).await
    }

    /// Register the given keys through the API.
    pub async fn register(&self, keys: &[gtfs_batch_core::CombinationKey]) -> TestResponse {
        let combinations: Vec<Value> = keys
            .iter()
            .map(|k| {
                serde_json::json!({
                    "enterprise_id": k.enterprise_id,
                    "contract_id": k.contract_id,
                    "version_id": k.version_id,
                })
            })
            .collect();
        self.post(
            "/api/v1/registrations",
            serde_json::json!({ "combinations": combinations }),
        )
        .await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status, $response.status, $response.text
        );
    };
}
