use axum::BoxError;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use oms_core::DomainError;
use oms_infra::{PlacementError, StoreError};

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn placement_error_to_response(err: PlacementError) -> axum::response::Response {
    match err {
        PlacementError::InvalidRequest(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_request", msg)
        }
        PlacementError::CustomerNotFound(id) => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "customer_not_found",
            format!("customer {id} does not exist"),
        ),
        PlacementError::ProductNotFound(id) => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "product_not_found",
            format!("product {id} does not exist"),
        ),
        PlacementError::InsufficientStock {
            product_id,
            requested,
            available,
        } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": format!(
                    "insufficient stock for product {product_id}: requested {requested}, available {available}"
                ),
                "product_id": product_id,
                "requested": requested,
                "available": available,
            })),
        )
            .into_response(),
        // Already logged by the workflow.
        PlacementError::Persistence(_) => persistence_failure(),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        other => {
            tracing::error!(error = %other, "store operation failed");
            persistence_failure()
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::Validation(msg) | DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_request", msg)
        }
    }
}

/// Turn an error raised by the middleware stack into a JSON response.
///
/// A timed-out request has its future dropped, which rolls back any unit of
/// work it held.
pub async fn middleware_error(err: BoxError) -> axum::response::Response {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::warn!("request timed out");
        json_error(
            StatusCode::REQUEST_TIMEOUT,
            "timeout",
            "the request did not complete in time; please retry",
        )
    } else {
        tracing::error!(error = %err, "unhandled middleware error");
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "the request could not be completed",
        )
    }
}

fn persistence_failure() -> axum::response::Response {
    json_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "persistence_failure",
        "the request could not be completed; please retry",
    )
}
