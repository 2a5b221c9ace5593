use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use tower_http::cors::CorsLayer;

use crate::engine::Engine;
use crate::store::LatestView;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/latest", get(latest))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// The consumer read: every source's exported payload plus the computed
/// result. Safe to hit at any rate; it only takes the store lock for the copy.
async fn latest(State(state): State<AppState>) -> Json<LatestView> {
    Json(state.engine.latest_view())
}
