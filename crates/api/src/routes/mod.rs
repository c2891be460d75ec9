pub mod health;
pub mod slots;
pub mod swaps;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                   WebSocket (token via query or message)
///
/// /swappable-slots                      marketplace listing
/// /swap-requests                        incoming + outgoing requests
/// /swap-request                         create (POST)
/// /swap-response/{request_id}           accept / reject (POST)
///
/// /events                               list, create own slots
/// /events/{id}                          get, patch, delete own slot
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(swaps::router())
        .nest("/events", slots::router())
}
