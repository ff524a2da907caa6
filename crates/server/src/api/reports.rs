//! Aggregate status, persisted status document and capacity.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use gtfs_batch_core::{CapacityLedger, CapacitySnapshot, StatusDocument};

use super::error::{bad_request, store_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// "json" (default) or "table"
    pub format: Option<String>,
}

/// Ledger snapshot with the derived free slot count.
#[derive(Debug, Serialize)]
pub struct CapacityResponse {
    pub in_use: u32,
    pub max_concurrent: u32,
    pub available: u32,
}

impl From<CapacitySnapshot> for CapacityResponse {
    fn from(snapshot: CapacitySnapshot) -> Self {
        Self {
            in_use: snapshot.in_use,
            max_concurrent: snapshot.max_concurrent,
            available: snapshot.available(),
        }
    }
}

/// GET /api/v1/summary - Aggregate status over all combinations
pub async fn get_summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SummaryQuery>,
) -> Result<Response, ApiError> {
    let summary = state.reporter().summarize().map_err(store_error)?;

    match query.format.as_deref() {
        None | Some("json") => Ok(Json(summary).into_response()),
        Some("table") => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            summary.render_table(),
        )
            .into_response()),
        Some(other) => Err(bad_request(format!("Unknown format: {}", other))),
    }
}

/// GET /api/v1/status-document - Status document in its persisted layout
pub async fn get_status_document(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusDocument>, ApiError> {
    let document = state.reporter().status_document().map_err(store_error)?;
    Ok(Json(document))
}

/// GET /api/v1/capacity
pub async fn get_capacity(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CapacityResponse>, ApiError> {
    let snapshot = state.store().snapshot().map_err(store_error)?;
    Ok(Json(snapshot.into()))
}

/// POST /api/v1/capacity/recount - Recompute usage from the records
pub async fn recount_capacity(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CapacityResponse>, ApiError> {
    let snapshot = state.store().recount().map_err(store_error)?;
    Ok(Json(snapshot.into()))
}
