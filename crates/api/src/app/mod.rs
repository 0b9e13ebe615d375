//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, dispatcher, broadcaster and pump wiring
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/response DTOs and parsing helpers
//! - `errors.rs`: consistent `{error, message}` responses

use std::io;
use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use resellsync_infra::AppConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: AppConfig) -> io::Result<(Router, Arc<AppServices>)> {
    let services = Arc::new(AppServices::build(config)?);
    Ok((router(services.clone()), services))
}

/// Router over already-wired services.
pub fn router(services: Arc<AppServices>) -> Router {
    // Protected routes: require an acting admin.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::admin_principal_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
