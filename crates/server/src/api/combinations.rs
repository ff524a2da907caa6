//! Combination lookup and per-unit reset.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use gtfs_batch_core::{
    Combination, CombinationFilter, CombinationKey, CombinationStatus, CombinationStore,
};

use super::error::{api_error, bad_request, store_error, ApiError};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

/// Query parameters for listing combinations.
#[derive(Debug, Deserialize)]
pub struct ListCombinationsQuery {
    pub status: Option<String>,
    pub enterprise: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for listing combinations.
#[derive(Debug, Serialize)]
pub struct CombinationListResponse {
    pub combinations: Vec<Combination>,
    pub total: u64,
    pub limit: i64,
    pub offset: i64,
}

fn parse_key(
    enterprise: String,
    contract: String,
    version: String,
) -> Result<CombinationKey, ApiError> {
    CombinationKey::new(enterprise, contract, version).map_err(|e| bad_request(e.to_string()))
}

/// GET /api/v1/combinations - List combinations
pub async fn list_combinations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListCombinationsQuery>,
) -> Result<Json<CombinationListResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let mut filter = CombinationFilter::new()
        .with_limit(limit)
        .with_offset(offset);
    if let Some(status) = query.status.as_deref() {
        let status: CombinationStatus = status.parse().map_err(bad_request)?;
        filter = filter.with_status(status);
    }
    if let Some(enterprise) = query.enterprise {
        filter = filter.with_enterprise(enterprise);
    }

    let combinations = state.store().list(&filter).map_err(store_error)?;
    let total = state.store().count(&filter).map_err(store_error)?;

    Ok(Json(CombinationListResponse {
        combinations,
        total,
        limit,
        offset,
    }))
}

/// GET /api/v1/combinations/{enterprise}/{contract}/{version} - Get one combination
pub async fn get_combination(
    State(state): State<Arc<AppState>>,
    Path((enterprise, contract, version)): Path<(String, String, String)>,
) -> Result<Json<Combination>, ApiError> {
    let key = parse_key(enterprise, contract, version)?;

    match state.store().get(&key).map_err(store_error)? {
        Some(combination) => Ok(Json(combination)),
        None => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Combination not found: {}", key),
        )),
    }
}

/// POST /api/v1/combinations/{enterprise}/{contract}/{version}/reset - Reset one failed combination
pub async fn reset_combination(
    State(state): State<Arc<AppState>>,
    Path((enterprise, contract, version)): Path<(String, String, String)>,
) -> Result<Json<Combination>, ApiError> {
    let key = parse_key(enterprise, contract, version)?;
    let combination = state.recovery().reset(&key).map_err(store_error)?;
    Ok(Json(combination))
}
