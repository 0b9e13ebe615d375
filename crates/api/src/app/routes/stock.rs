use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use resellsync_core::ProductId;

use crate::app::dto::{self, SetStockRequest, StockResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::AdminContext;

pub fn router() -> Router {
    Router::new().route("/:product_id", get(get_stock).put(set_stock))
}

pub async fn get_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let product_id: ProductId = dto::parse_id(&id, "product id")?;
    let cells = services.run(move |d| d.stock(product_id)).await?;
    Ok(Json(StockResponse::new(product_id, cells)))
}

/// PUT /stock/:product_id
///
/// Seeds one stock cell. Not a transition: no version, no event.
pub async fn set_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(admin): Extension<AdminContext>,
    Path(id): Path<String>,
    Json(body): Json<SetStockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product_id: ProductId = dto::parse_id(&id, "product id")?;
    let location = dto::parse_location(&body)?;
    let quantity = body.quantity;
    let actor = admin.principal_id();

    services
        .run(move |d| d.set_stock(product_id, location, quantity, actor))
        .await?;

    let cells = services.run(move |d| d.stock(product_id)).await?;
    Ok(Json(StockResponse::new(product_id, cells)))
}
