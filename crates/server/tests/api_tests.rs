//! API tests driving the admission cycle through the HTTP surface.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{fixtures, TestFixture};
use gtfs_batch_core::{CombinationKey, DiscoveryError, JobKind, JobStatus};

// =============================================================================
// Health and config
// =============================================================================

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/config").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["capacity"]["max_concurrent"], 5);
    assert_eq!(response.body["job_runner"]["backend"], "mock");
    assert_eq!(response.body["job_runner"]["api_key_configured"], false);
}

// =============================================================================
// Discovery and registration
// =============================================================================

#[tokio::test]
async fn test_register_explicit_units() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post(
            "/api/v1/registrations",
            json!({
                "combinations": [
                    { "P_EMPRESA": "1", "P_CONTR": "10", "P_VERSION": "A" },
                    { "enterprise_id": "1", "contract_id": "11", "version_id": "A" },
                    { "P_EMPRESA": "1", "P_CONTR": "10", "P_VERSION": "A" },
                    { "P_EMPRESA": " ", "P_CONTR": "12", "P_VERSION": "A" }
                ]
            }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["discovered"], 4);
    assert_eq!(response.body["registered"], 2);
    assert_eq!(response.body["skipped"], 1);
    assert_eq!(response.body["invalid"], 1);

    // Registering again changes nothing.
    let response = fixture.register(&[fixtures::key("1", "10", "A")]).await;
    assert_eq!(response.body["registered"], 0);
    assert_eq!(response.body["skipped"], 1);
}

#[tokio::test]
async fn test_register_without_body_discovers() {
    let fixture = TestFixture::new().await;
    fixture.source.set_combinations(fixtures::keys("7", 3)).await;

    let response = fixture.post_empty("/api/v1/registrations").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["discovered"], 3);
    assert_eq!(response.body["registered"], 3);
    assert_eq!(fixture.source.calls().await, 1);

    let response = fixture.get("/api/v1/combinations?status=pending").await;
    assert_eq!(response.body["total"], 3);
}

#[tokio::test]
async fn test_discovery_returns_combinations_file() {
    let fixture = TestFixture::new().await;
    fixture
        .source
        .set_combinations(vec![fixtures::key("2", "5", "B"), fixtures::key("1", "3", "A")])
        .await;

    let response = fixture.post_empty("/api/v1/discovery").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total"], 2);
    assert_eq!(response.body["combinations"][0]["P_EMPRESA"], "1");
    assert_eq!(response.body["combinations"][1]["P_VERSION"], "B");

    // Discovery alone registers nothing.
    let response = fixture.get("/api/v1/combinations").await;
    assert_eq!(response.body["total"], 0);
}

#[tokio::test]
async fn test_discovery_unavailable() {
    let fixture = TestFixture::new().await;
    fixture
        .source
        .set_next_error(DiscoveryError::Unavailable("bucket offline".to_string()))
        .await;

    let response = fixture.post_empty("/api/v1/registrations").await;
    assert_status!(response, StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("bucket offline"));
}

#[tokio::test]
async fn test_malformed_registration_body() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_raw("/api/v1/registrations", "{\"combinations\": [")
        .await;
    assert!(response.status.is_client_error());
}

// =============================================================================
// Ticks and capacity
// =============================================================================

#[tokio::test]
async fn test_scheduler_tick_respects_capacity() {
    let fixture = TestFixture::with_capacity(1).await;
    fixture.register(&fixtures::keys("1", 3)).await;

    let response = fixture
        .post("/api/v1/scheduler/tick", json!({ "max_to_start": 5 }))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["started"], 1);
    assert_eq!(response.body["capacity_exhausted"], true);

    let response = fixture.get("/api/v1/capacity").await;
    assert_eq!(response.body["in_use"], 1);
    assert_eq!(response.body["max_concurrent"], 1);
    assert_eq!(response.body["available"], 0);

    // Both compute jobs were started for the admitted unit.
    assert_eq!(fixture.runner.started_jobs().await.len(), 2);

    // A second tick admits nothing while the slot is held.
    let response = fixture.post_empty("/api/v1/scheduler/tick").await;
    assert_eq!(response.body["started"], 0);
}

#[tokio::test]
async fn test_full_cycle_through_api() {
    let fixture = TestFixture::with_capacity(1).await;
    let key = fixtures::key("1", "10", "A");
    fixture.register(&[key.clone()]).await;

    fixture.post_empty("/api/v1/scheduler/tick").await;

    let response = fixture.get("/api/v1/combinations/1/10/A").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["state"]["type"], "processing");
    assert_eq!(response.body["state"]["job_a"]["job_name"], "macro-generator");

    // Jobs still running: nothing changes.
    let response = fixture.post_empty("/api/v1/reconciler/tick").await;
    assert_eq!(response.body["still_running"], 1);

    fixture
        .runner
        .set_status_of_all(JobKind::ComputeA, JobStatus::Succeeded)
        .await;
    fixture
        .runner
        .set_status_of_all(JobKind::ComputeB, JobStatus::Succeeded)
        .await;

    let response = fixture
        .post("/api/v1/reconciler/tick", json!({ "max_to_check": 10 }))
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["completed"], 1);

    let response = fixture.get("/api/v1/combinations/1/10/A").await;
    assert_eq!(response.body["state"]["type"], "completed");

    let response = fixture.get("/api/v1/capacity").await;
    assert_eq!(response.body["in_use"], 0);
}

#[tokio::test]
async fn test_recount_capacity() {
    let fixture = TestFixture::new().await;
    fixture.register(&fixtures::keys("1", 2)).await;
    fixture
        .post("/api/v1/scheduler/tick", json!({ "max_to_start": 2 }))
        .await;

    let response = fixture.post_empty("/api/v1/capacity/recount").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["in_use"], 2);
    assert_eq!(response.body["available"], 3);
}

// =============================================================================
// Combinations and recovery
// =============================================================================

async fn fail_one(fixture: &TestFixture) -> CombinationKey {
    let key = fixtures::key("1", "10", "A");
    fixture.register(&[key.clone()]).await;
    fixture.runner.fail_starts_of(JobKind::ComputeB).await;

    let response = fixture.post_empty("/api/v1/scheduler/tick").await;
    assert_eq!(response.body["failed"], 1);
    key
}

#[tokio::test]
async fn test_reset_combination() {
    let fixture = TestFixture::new().await;
    fail_one(&fixture).await;

    let response = fixture.get("/api/v1/combinations?status=failed").await;
    assert_eq!(response.body["total"], 1);
    assert!(response.body["combinations"][0]["state"]["error"]
        .as_str()
        .unwrap()
        .contains("macro-stops-generator"));

    let response = fixture.post_empty("/api/v1/combinations/1/10/A/reset").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["state"]["type"], "pending");
    assert_eq!(response.body["retries"], 1);

    // Only failed combinations can be reset.
    let response = fixture.post_empty("/api/v1/combinations/1/10/A/reset").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reset_failed() {
    let fixture = TestFixture::new().await;
    fail_one(&fixture).await;

    let response = fixture.post_empty("/api/v1/reset-failed").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["reset"], 1);
    assert_eq!(response.body["abandoned"], 0);

    let response = fixture.get("/api/v1/combinations?status=pending").await;
    assert_eq!(response.body["total"], 1);
}

#[tokio::test]
async fn test_unknown_combination() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/combinations/9/9/Z").await;
    assert_status!(response, StatusCode::NOT_FOUND);

    let response = fixture.post_empty("/api/v1/combinations/9/9/Z/reset").await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_key_in_path() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/combinations/%20/9/Z").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_filters() {
    let fixture = TestFixture::new().await;
    fixture.register(&fixtures::keys("1", 3)).await;
    fixture.register(&fixtures::keys("2", 2)).await;

    let response = fixture.get("/api/v1/combinations?enterprise=2").await;
    assert_eq!(response.body["total"], 2);
    assert_eq!(response.body["combinations"][0]["enterprise_id"], "2");

    let response = fixture.get("/api/v1/combinations?limit=2&offset=1").await;
    assert_eq!(response.body["total"], 5);
    assert_eq!(response.body["combinations"].as_array().unwrap().len(), 2);
    assert_eq!(response.body["limit"], 2);
    assert_eq!(response.body["offset"], 1);

    let response = fixture.get("/api/v1/combinations?status=bogus").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Reporting
// =============================================================================

#[tokio::test]
async fn test_summary() {
    let fixture = TestFixture::with_capacity(1).await;
    fixture.register(&fixtures::keys("1", 3)).await;
    fixture.post_empty("/api/v1/scheduler/tick").await;

    let response = fixture.get("/api/v1/summary").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total"], 3);
    assert_eq!(response.body["by_status"]["pending"], 2);
    assert_eq!(response.body["by_status"]["processing"], 1);
    assert_eq!(response.body["by_enterprise"]["1"]["total"], 3);
    assert_eq!(response.body["capacity"]["in_use"], 1);

    let response = fixture.get("/api/v1/summary?format=table").await;
    assert_status!(response, StatusCode::OK);
    assert!(response.text.contains("Capacity: 1/1 in use"));

    let response = fixture.get("/api/v1/summary?format=yaml").await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status_document() {
    let fixture = TestFixture::new().await;
    fixture.register(&fixtures::keys("1", 2)).await;
    fixture.post_empty("/api/v1/scheduler/tick").await;

    let response = fixture.get("/api/v1/status-document").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total"], 2);
    assert_eq!(response.body["processing"], 1);
    assert_eq!(response.body["pending"], 1);

    let records = response.body["combinations"].as_array().unwrap();
    let processing = records
        .iter()
        .find(|r| r["status"] == "processing")
        .unwrap();
    assert!(processing["job_handle_a"]
        .as_str()
        .unwrap()
        .starts_with("macro-generator"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.register(&fixtures::keys("1", 1)).await;

    let response = fixture.get("/metrics").await;
    assert_status!(response, StatusCode::OK);
    assert!(response.text.contains("gtfs_batch_capacity_in_use"));
    assert!(response
        .text
        .contains("gtfs_batch_combinations_by_status{status=\"pending\"} 1"));
}
