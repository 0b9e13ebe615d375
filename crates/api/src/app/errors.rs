use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use resellsync_events::RegistryError;
use resellsync_infra::{CreateError, StoreError, TransitionError};

/// Everything a handler can fail with, rendered as `{error, message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Create(#[from] CreateError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unavailable(String),
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        ApiError::Unavailable(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Transition(err) => transition_error_to_response(err),
            ApiError::Create(err) => create_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Unavailable(msg) => unavailable(msg),
        }
    }
}

pub fn transition_error_to_response(err: TransitionError) -> Response {
    let message = err.to_string();
    match err {
        TransitionError::IllegalTransition { .. } => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "illegal_transition",
            format!("this action is no longer valid: {message}"),
        ),
        TransitionError::UnknownEntity(_) => {
            json_error(StatusCode::NOT_FOUND, "unknown_entity", message)
        }
        TransitionError::VersionConflict { .. } => json_error(
            StatusCode::CONFLICT,
            "version_conflict",
            format!("someone else changed this first, refresh and retry ({message})"),
        ),
        TransitionError::StockUnderflow(_) => stock_underflow(message),
        TransitionError::Precondition(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "precondition_failed", message)
        }
        TransitionError::Unavailable(_) => unavailable(message),
    }
}

pub fn create_error_to_response(err: CreateError) -> Response {
    let message = err.to_string();
    match err {
        CreateError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        CreateError::Precondition(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "precondition_failed", message)
        }
        CreateError::UnknownEntity(_) => json_error(StatusCode::NOT_FOUND, "unknown_entity", message),
        CreateError::Unavailable(_) => unavailable(message),
    }
}

pub fn store_error_to_response(err: StoreError) -> Response {
    let message = err.to_string();
    match err {
        StoreError::UnknownEntity(_) => json_error(StatusCode::NOT_FOUND, "unknown_entity", message),
        StoreError::VersionConflict { .. } => {
            json_error(StatusCode::CONFLICT, "version_conflict", message)
        }
        StoreError::StockUnderflow(_) => stock_underflow(message),
        StoreError::Precondition(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "precondition_failed", message)
        }
        StoreError::Unavailable(_) => unavailable(message),
    }
}

fn stock_underflow(message: String) -> Response {
    error!(detail = %message, "stock underflow surfaced to client");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "stock_underflow", message)
}

fn unavailable(message: String) -> Response {
    json_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "unavailable",
        format!("temporary failure, retry: {message}"),
    )
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use resellsync_core::{EntityKey, EntityType, OrderId};

    #[test]
    fn transition_errors_map_to_documented_statuses() {
        let key = EntityKey::new(EntityType::Order, OrderId::new());
        let cases = [
            (
                TransitionError::IllegalTransition {
                    entity_type: EntityType::Shipment,
                    from: "processing".to_string(),
                    requested: "delivered".to_string(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (TransitionError::UnknownEntity(key), StatusCode::NOT_FOUND),
            (
                TransitionError::VersionConflict { expected: 0, actual: 1 },
                StatusCode::CONFLICT,
            ),
            (
                TransitionError::StockUnderflow("reseller".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                TransitionError::Precondition("stock quantity overflow".to_string()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                TransitionError::Unavailable("offline".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn create_errors_map_to_client_statuses() {
        assert_eq!(
            ApiError::from(CreateError::Validation("x".into())).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(CreateError::Precondition("x".into())).into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
