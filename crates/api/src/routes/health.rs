use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    /// `ok`, or `degraded` when the database cannot be reached.
    status: &'static str,
    version: &'static str,
    db_healthy: bool,
    /// Live WebSocket connections, authenticated or not.
    ws_connections: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = slotswap_db::health_check(&state.pool).await.is_ok();
    if !db_healthy {
        tracing::warn!("Health check could not reach the database");
    }

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        ws_connections: state.ws_manager.connection_count().await,
    })
}

/// Mounted at the root, outside `/api` and its authentication.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
