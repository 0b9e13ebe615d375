use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use uuid::Uuid;

use resellsync_core::ExpectedVersion;

use crate::app::dto::{self, TransitionRequest, TransitionResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::AdminContext;

/// POST /transitions
///
/// Body: `{entity_type, entity_id, action, expected_version}`. The response
/// is the commit acknowledgement; other sessions learn about it through the
/// push channel.
pub async fn request_transition(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(admin): Extension<AdminContext>,
    Json(body): Json<TransitionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entity_type = dto::parse_entity_type(&body.entity_type)?;
    let entity_id: Uuid = body
        .entity_id
        .trim()
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("invalid entity_id: {e}")))?;
    let action = body.action;
    let expected = ExpectedVersion(body.expected_version);
    let actor = admin.principal_id();

    let outcome = services
        .run(move |d| d.request_transition(entity_type, entity_id, &action, expected, actor))
        .await?;

    Ok((StatusCode::OK, Json(TransitionResponse::from(outcome))))
}
