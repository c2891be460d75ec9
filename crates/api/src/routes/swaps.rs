//! Route definitions for the swap marketplace.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::swaps;
use crate::state::AppState;

/// Routes merged at the `/api` root.
///
/// ```text
/// GET    /swappable-slots                -> list_swappable
/// GET    /swap-requests                  -> list_requests
/// POST   /swap-request                   -> create_request
/// POST   /swap-response/{request_id}     -> respond
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/swappable-slots", get(swaps::list_swappable))
        .route("/swap-requests", get(swaps::list_requests))
        .route("/swap-request", post(swaps::create_request))
        .route("/swap-response/{request_id}", post(swaps::respond))
}
