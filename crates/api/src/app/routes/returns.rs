use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use resellsync_core::{EntityType, OrderId, ProductId, ResellerId, ReturnId};

use crate::app::dto::{self, FileReturnRequest};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::AdminContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(file_return).get(list_returns))
        .route("/:id", get(get_return))
}

pub async fn file_return(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(admin): Extension<AdminContext>,
    Json(body): Json<FileReturnRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order_id: OrderId = dto::parse_id(&body.order_id, "order_id")?;
    let product_id: ProductId = dto::parse_id(&body.product_id, "product_id")?;
    let reseller_id: ResellerId = dto::parse_id(&body.reseller_id, "reseller_id")?;
    let quantity = body.quantity;
    let reason = body.reason;
    let actor = admin.principal_id();

    let request = services
        .run(move |d| d.file_return(order_id, product_id, reseller_id, quantity, reason, actor))
        .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_returns(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    let returns = services.run(|d| d.list(EntityType::ReturnRequest)).await?;
    Ok(Json(returns))
}

pub async fn get_return(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let return_id: ReturnId = dto::parse_id(&id, "return id")?;
    let request = services.run(move |d| d.return_request(return_id)).await?;
    Ok(Json(request))
}
