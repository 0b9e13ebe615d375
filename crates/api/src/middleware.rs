use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use resellsync_core::PrincipalId;

use crate::context::AdminContext;

/// Header naming the acting admin. Identification only; authentication is
/// handled upstream of this service.
pub const ADMIN_PRINCIPAL_HEADER: &str = "x-admin-principal";

pub async fn admin_principal_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let principal_id = extract_principal(req.headers())?;
    req.extensions_mut().insert(AdminContext::new(principal_id));
    Ok(next.run(req).await)
}

fn extract_principal(headers: &HeaderMap) -> Result<PrincipalId, StatusCode> {
    let header = headers
        .get(ADMIN_PRINCIPAL_HEADER)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let raw = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?.trim();
    if raw.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    raw.parse().map_err(|_| StatusCode::UNAUTHORIZED)
}
