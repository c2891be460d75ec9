//! Handlers for the swap marketplace endpoints.
//!
//! Every state change goes through the [`NegotiationEngine`]; handlers only
//! validate the request shape and announce the committed result.
//!
//! [`NegotiationEngine`]: slotswap_db::NegotiationEngine

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use slotswap_core::error::CoreError;
use slotswap_core::swap::{SwapDecision, SwapStatus};
use slotswap_core::types::DbId;
use slotswap_db::models::slot::SwappableSlot;
use slotswap_db::models::swap_request::{
    CreateSwapRequest, SwapRequest, SwapRequestLists, SwapResponse,
};

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

/// Body returned after answering a request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapResponseResult {
    pub message: &'static str,
    pub request_id: DbId,
    pub status: SwapStatus,
}

/// GET /api/swappable-slots
pub async fn list_swappable(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<SwappableSlot>>> {
    let slots = state.engine.list_swappable(auth.user_id).await?;
    Ok(Json(slots))
}

/// GET /api/swap-requests
pub async fn list_requests(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<SwapRequestLists>> {
    let lists = state.engine.list_requests(auth.user_id).await?;
    Ok(Json(lists))
}

/// POST /api/swap-request
pub async fn create_request(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(input): AppJson<CreateSwapRequest>,
) -> AppResult<(StatusCode, Json<SwapRequest>)> {
    let (Some(my_slot_id), Some(their_slot_id)) = (input.my_slot_id, input.their_slot_id) else {
        return Err(CoreError::Validation("Both slot IDs required".to_string()).into());
    };

    let created = state
        .engine
        .create(auth.user_id, my_slot_id, their_slot_id)
        .await?;
    state.announce(&created.notices);

    Ok((StatusCode::CREATED, Json(created.value)))
}

/// POST /api/swap-response/{request_id}
pub async fn respond(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(request_id): Path<DbId>,
    AppJson(input): AppJson<SwapResponse>,
) -> AppResult<Json<SwapResponseResult>> {
    let accept = input
        .accept
        .ok_or_else(|| CoreError::Validation("accept must be a boolean".to_string()))?;
    let decision = SwapDecision::from(accept);

    let answered = state
        .engine
        .respond(request_id, auth.user_id, decision)
        .await?;
    state.announce(&answered.notices);

    let message = match decision {
        SwapDecision::Accept => "Swap accepted",
        SwapDecision::Reject => "Swap rejected",
    };
    Ok(Json(SwapResponseResult {
        message,
        request_id,
        status: answered.value.status,
    }))
}
