use axum::{
    routing::{get, post},
    Router,
};

pub mod orders;
pub mod returns;
pub mod shipments;
pub mod stock;
pub mod stream;
pub mod system;
pub mod transitions;

/// Router for all admin (principal-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/transitions", post(transitions::request_transition))
        .route("/admin/stream", get(stream::admin_stream))
        .route("/admin/events", get(stream::recent_events))
        .nest("/orders", orders::router())
        .nest("/shipments", shipments::router())
        .nest("/returns", returns::router())
        .nest("/stock", stock::router())
}
