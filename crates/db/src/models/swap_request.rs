//! Swap request entity model and listing views.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use slotswap_core::swap::{RequestSnapshot, SwapStatus};
use slotswap_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `swap_requests` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SwapRequest {
    pub id: DbId,
    pub requester_id: DbId,
    pub responder_id: DbId,
    pub requester_slot_id: DbId,
    pub responder_slot_id: DbId,
    #[sqlx(try_from = "String")]
    pub status: SwapStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SwapRequest {
    /// The fields the respond checks look at.
    pub fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot {
            id: self.id,
            responder_id: self.responder_id,
            status: self.status,
        }
    }

    /// Both slot ids, requester's first.
    pub fn slot_ids(&self) -> [DbId; 2] {
        [self.requester_slot_id, self.responder_slot_id]
    }
}

/// A swap request joined with the names and titles a client displays.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SwapRequestView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub request: SwapRequest,
    pub requester_name: String,
    pub responder_name: String,
    pub requester_slot_title: String,
    pub responder_slot_title: String,
}

/// Both sides of a user's negotiations.
#[derive(Debug, Clone, Serialize)]
pub struct SwapRequestLists {
    /// Pending requests addressed to the user.
    pub incoming: Vec<SwapRequestView>,
    /// Every request the user has made, whatever its status.
    pub outgoing: Vec<SwapRequestView>,
}

/// Body of `POST /swap-request`.
///
/// Browsers post the ids straight from `<select>` values, so both fields
/// accept a JSON number or a numeric string. An empty string counts as
/// absent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSwapRequest {
    #[serde(default, deserialize_with = "slot_id")]
    pub my_slot_id: Option<DbId>,
    #[serde(default, deserialize_with = "slot_id")]
    pub their_slot_id: Option<DbId>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SlotIdRepr {
    Number(DbId),
    Text(String),
}

fn slot_id<'de, D>(deserializer: D) -> Result<Option<DbId>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<SlotIdRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(SlotIdRepr::Number(id)) => Ok(Some(id)),
        Some(SlotIdRepr::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.parse()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("invalid slot id '{text}'")))
        }
    }
}

/// Body of `POST /swap-response/{id}`.
#[derive(Debug, Deserialize)]
pub struct SwapResponse {
    pub accept: Option<bool>,
}
