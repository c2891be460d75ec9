//! Route definitions for the `/events` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::slots;
use crate::state::AppState;

/// Routes mounted at `/events`.
///
/// ```text
/// GET    /          -> list
/// POST   /          -> create
/// GET    /{id}      -> get_by_id
/// PATCH  /{id}      -> update
/// DELETE /{id}      -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(slots::list).post(slots::create))
        .route(
            "/{id}",
            get(slots::get_by_id)
                .patch(slots::update)
                .delete(slots::delete),
        )
}
