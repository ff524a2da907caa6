//! Batch operations: discovery, registration, ticks and bulk reset.

use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;

use gtfs_batch_core::discovery::{CombinationEntry, CombinationsFile};
use gtfs_batch_core::{
    CombinationKey, ReconcileReport, RegistrationSummary, ResetReport, SchedulerTickReport,
};

use super::error::{discovery_error, store_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

/// Request body for registration.
///
/// Entries accept either the descriptive field names or the
/// `P_EMPRESA`/`P_CONTR`/`P_VERSION` layout of a combinations file.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub combinations: Vec<CombinationEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SchedulerTickRequest {
    #[serde(default)]
    pub max_to_start: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReconcilerTickRequest {
    #[serde(default)]
    pub max_to_check: Option<u32>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/discovery - List complete combinations in object storage
pub async fn discover(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CombinationsFile>, ApiError> {
    let keys = state.registry().discover().await.map_err(discovery_error)?;
    let discovery = &state.config().discovery;

    Ok(Json(CombinationsFile::from_keys(
        &keys,
        discovery.bucket.clone(),
        discovery.region.clone(),
    )))
}

/// POST /api/v1/registrations - Register units, or discover and register all
pub async fn register(
    State(state): State<Arc<AppState>>,
    body: Option<Json<RegisterRequest>>,
) -> Result<Json<RegistrationSummary>, ApiError> {
    let summary = match body {
        Some(Json(request)) => {
            // Keys are validated by the registry, which counts bad ones as invalid.
            let units: Vec<CombinationKey> = request
                .combinations
                .into_iter()
                .map(|entry| CombinationKey {
                    enterprise_id: entry.enterprise_id,
                    contract_id: entry.contract_id,
                    version_id: entry.version_id,
                })
                .collect();
            state.registry().register(&units)
        }
        None => state
            .registry()
            .discover_and_register()
            .await
            .map_err(discovery_error)?,
    };

    Ok(Json(summary))
}

/// POST /api/v1/scheduler/tick - Admit and dispatch pending combinations
pub async fn scheduler_tick(
    State(state): State<Arc<AppState>>,
    body: Option<Json<SchedulerTickRequest>>,
) -> Result<Json<SchedulerTickReport>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let max_to_start = request
        .max_to_start
        .unwrap_or(state.config().scheduler.max_to_start);

    let report = state
        .scheduler()
        .tick(max_to_start)
        .await
        .map_err(store_error)?;
    Ok(Json(report))
}

/// POST /api/v1/reconciler/tick - Poll in-flight combinations and sweep stuck ones
pub async fn reconciler_tick(
    State(state): State<Arc<AppState>>,
    body: Option<Json<ReconcilerTickRequest>>,
) -> Result<Json<ReconcileReport>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let max_to_check = request
        .max_to_check
        .unwrap_or(state.config().reconciler.max_to_check);

    let report = state
        .reconciler()
        .tick(max_to_check)
        .await
        .map_err(store_error)?;
    Ok(Json(report))
}

/// POST /api/v1/reset-failed - Reset every failed combination
pub async fn reset_failed(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResetReport>, ApiError> {
    let report = state.recovery().reset_failed().map_err(store_error)?;
    Ok(Json(report))
}
