//! JSON error responses shared by the API handlers.

use axum::{http::StatusCode, Json};
use serde::Serialize;

use gtfs_batch_core::{DiscoveryError, StoreError};

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

pub fn bad_request(error: impl Into<String>) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, error)
}

impl From<StoreError> for ErrorResponse {
    fn from(e: StoreError) -> Self {
        Self {
            error: e.to_string(),
        }
    }
}

/// Map a store error onto its HTTP status.
pub fn store_error(e: StoreError) -> ApiError {
    let status = match &e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Transition(_) => StatusCode::BAD_REQUEST,
        StoreError::Conflict(_) | StoreError::CapacityExhausted { .. } => StatusCode::CONFLICT,
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(ErrorResponse::from(e)))
}

/// Map a discovery error onto its HTTP status.
pub fn discovery_error(e: DiscoveryError) -> ApiError {
    let status = match &e {
        DiscoveryError::NotConfigured => StatusCode::BAD_REQUEST,
        DiscoveryError::Unavailable(_) | DiscoveryError::InvalidListing(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    api_error(status, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gtfs_batch_core::{CombinationStatus, TransitionError};

    #[test]
    fn test_store_error_statuses() {
        assert_eq!(
            store_error(StoreError::NotFound("1/1/A".to_string())).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            store_error(StoreError::Conflict("1/1/A".to_string())).0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            store_error(StoreError::Unavailable("disk".to_string())).0,
            StatusCode::SERVICE_UNAVAILABLE
        );

        let (status, Json(body)) = store_error(StoreError::Transition(
            TransitionError::InvalidTransition {
                from: CombinationStatus::Pending,
                transition: "reset",
            },
        ));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("reset"));
    }

    #[test]
    fn test_discovery_error_statuses() {
        assert_eq!(
            discovery_error(DiscoveryError::NotConfigured).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            discovery_error(DiscoveryError::Unavailable("timeout".to_string())).0,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
