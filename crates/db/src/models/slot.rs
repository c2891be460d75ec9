//! Calendar slot entity model and DTOs.

use serde::{Deserialize, Serialize};
use slotswap_core::slot::SlotStatus;
use slotswap_core::swap::SlotSnapshot;
use slotswap_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `slots` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Slot {
    pub id: DbId,
    pub owner_id: DbId,
    pub title: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    #[sqlx(try_from = "String")]
    pub status: SlotStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Slot {
    /// The fields the negotiation checks look at.
    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            id: self.id,
            owner_id: self.owner_id,
            status: self.status,
        }
    }
}

/// A marketplace listing: a swappable slot plus how to reach its owner.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SwappableSlot {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub slot: Slot,
    pub owner_name: String,
    pub owner_email: String,
}

/// DTO for creating a slot. New slots always start `BUSY`.
#[derive(Debug, Deserialize)]
pub struct CreateSlot {
    pub title: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
}

/// DTO for patching a slot. All fields are optional.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSlot {
    pub title: Option<String>,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub status: Option<SlotStatus>,
}
