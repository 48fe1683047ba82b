//! Route table.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/refresh", post(handlers::refresh))
        .route("/namespaces", get(handlers::namespaces))
        .route("/search", get(handlers::search))
        .route("/hierarchy", get(handlers::hierarchy))
        .route("/context/{id}", get(handlers::context))
        .route("/objects/{id}", get(handlers::object))
        .route("/objects/{id}/children", get(handlers::children))
        .route("/objects/{id}/parent", get(handlers::parent))
        .route("/objects/{id}/relationships", get(handlers::relationships))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
