use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use resellsync_core::{EntityType, ShipmentId};

use crate::app::dto::{self, CarrierStatusRequest};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::AdminContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_shipments))
        .route("/:id", get(get_shipment))
        .route("/:id/carrier-status", post(record_carrier_status))
}

pub async fn list_shipments(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    let shipments = services.run(|d| d.list(EntityType::Shipment)).await?;
    Ok(Json(shipments))
}

pub async fn get_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let shipment_id: ShipmentId = dto::parse_id(&id, "shipment id")?;
    let view = services.run(move |d| d.shipment(shipment_id)).await?;
    Ok(Json(view))
}

/// POST /shipments/:id/carrier-status
///
/// Stores the carrier's raw status text next to the shipment. The shipment's
/// own status and version are untouched.
pub async fn record_carrier_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(admin): Extension<AdminContext>,
    Path(id): Path<String>,
    Json(body): Json<CarrierStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let shipment_id: ShipmentId = dto::parse_id(&id, "shipment id")?;
    let actor = admin.principal_id();

    let report = services
        .run(move |d| d.record_carrier_status(shipment_id, &body.status_text, actor))
        .await?;
    Ok(Json(report))
}
