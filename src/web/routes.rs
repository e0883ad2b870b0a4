use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// REST API per the pipeline's HTTP contract
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/query", post(handlers::api::query))
        .route("/history", get(handlers::api::history))
}
