use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use resellsync_core::{EntityType, OrderId, ResellerId};
use resellsync_orders::NewOrderLine;
use resellsync_shipping::ShipmentDetails;

use crate::app::dto::{self, CreateShipmentRequest, PlaceOrderRequest};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::AdminContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(place_order).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/shipment", post(create_shipment).get(get_order_shipment))
}

pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(admin): Extension<AdminContext>,
    Json(body): Json<PlaceOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reseller_id: ResellerId = dto::parse_id(&body.reseller_id, "reseller_id")?;
    let lines = body
        .lines
        .iter()
        .map(|line| -> Result<NewOrderLine, ApiError> {
            Ok(NewOrderLine {
                product_id: dto::parse_id(&line.product_id, "product_id")?,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let notes = body.notes;
    let actor = admin.principal_id();

    let order = services
        .run(move |d| d.place_order(reseller_id, lines, notes, actor))
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = services.run(|d| d.list(EntityType::Order)).await?;
    Ok(Json(orders))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order_id: OrderId = dto::parse_id(&id, "order id")?;
    let order = services.run(move |d| d.order(order_id)).await?;
    Ok(Json(order))
}

/// POST /orders/:id/shipment
///
/// Only an approved order without a shipment qualifies.
pub async fn create_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(admin): Extension<AdminContext>,
    Path(id): Path<String>,
    Json(body): Json<CreateShipmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order_id: OrderId = dto::parse_id(&id, "order id")?;
    let details = ShipmentDetails {
        carrier: body.carrier,
        tracking_number: body.tracking_number,
        shipping_method: body.shipping_method,
        estimated_delivery: body.estimated_delivery,
    };
    let actor = admin.principal_id();

    let shipment = services
        .run(move |d| d.create_shipment(order_id, details, actor))
        .await?;

    Ok((StatusCode::CREATED, Json(shipment)))
}

pub async fn get_order_shipment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<axum::response::Response, ApiError> {
    let order_id: OrderId = dto::parse_id(&id, "order id")?;
    let shipment = services.run(move |d| d.shipment_for_order(order_id)).await?;

    Ok(match shipment {
        Some(shipment) => Json(shipment).into_response(),
        None => crate::app::errors::json_error(
            StatusCode::NOT_FOUND,
            "unknown_entity",
            format!("order {order_id} has no shipment"),
        ),
    })
}
