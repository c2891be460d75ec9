//! Handlers for the `/events` resource: a user's own calendar slots.
//!
//! Slots owned by someone else are reported as missing. Slots frozen by a
//! pending swap request cannot be edited or deleted.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use slotswap_core::error::CoreError;
use slotswap_core::slot;
use slotswap_core::types::DbId;
use slotswap_db::models::slot::{CreateSlot, Slot, UpdateSlot};
use slotswap_db::repositories::SlotRepo;

use crate::error::{AppError, AppResult};
use crate::extract::AppJson;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound { entity: "Slot", id })
}

/// Load a slot owned by the caller or fail with 404.
async fn find_owned(state: &AppState, id: DbId, owner_id: DbId) -> AppResult<Slot> {
    SlotRepo::find_owned(&state.pool, id, owner_id)
        .await?
        .ok_or_else(|| not_found(id))
}

/// Explain why a guarded write touched no row: the slot either vanished
/// or was frozen after it was read.
async fn guarded_write_miss(state: &AppState, id: DbId, owner_id: DbId) -> AppError {
    match find_owned(state, id, owner_id).await {
        Ok(current) => match slot::ensure_mutable(current.status) {
            Err(conflict) => conflict.into(),
            Ok(()) => AppError::InternalError(format!("Guarded write on slot {id} matched no row")),
        },
        Err(err) => err,
    }
}

/// GET /api/events
pub async fn list(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Slot>>> {
    let slots = SlotRepo::list_by_owner(&state.pool, auth.user_id).await?;
    Ok(Json(slots))
}

/// POST /api/events
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(input): AppJson<CreateSlot>,
) -> AppResult<(StatusCode, Json<Slot>)> {
    slot::validate_title(&input.title)?;
    slot::validate_time_range(input.start_time, input.end_time)?;

    let created = SlotRepo::create(&state.pool, auth.user_id, &input).await?;
    tracing::debug!(slot_id = created.id, owner_id = auth.user_id, "Slot created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/events/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<Json<Slot>> {
    let found = find_owned(&state, id, auth.user_id).await?;
    Ok(Json(found))
}

/// PATCH /api/events/{id}
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
    AppJson(input): AppJson<UpdateSlot>,
) -> AppResult<Json<Slot>> {
    let current = find_owned(&state, id, auth.user_id).await?;
    slot::ensure_mutable(current.status)?;
    if let Some(requested) = input.status {
        slot::validate_owner_status_change(current.status, requested)?;
    }
    if let Some(title) = &input.title {
        slot::validate_title(title)?;
    }
    slot::validate_time_range(
        input.start_time.unwrap_or(current.start_time),
        input.end_time.unwrap_or(current.end_time),
    )?;

    match SlotRepo::update_unlocked(&state.pool, id, auth.user_id, &input).await? {
        Some(updated) => Ok(Json(updated)),
        None => Err(guarded_write_miss(&state, id, auth.user_id).await),
    }
}

/// DELETE /api/events/{id}
pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let current = find_owned(&state, id, auth.user_id).await?;
    slot::ensure_mutable(current.status)?;

    if SlotRepo::delete_unlocked(&state.pool, id, auth.user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(guarded_write_miss(&state, id, auth.user_id).await)
    }
}
