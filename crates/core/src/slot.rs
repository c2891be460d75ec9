//! Calendar slot status vocabulary and the owner-facing mutation rules.
//!
//! A slot is `SWAP_PENDING` exactly while some pending swap request refers to
//! it. Only the negotiation engine moves a slot into or out of that state;
//! owners toggle between `BUSY` and `SWAPPABLE` through the CRUD boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/* --------------------------------------------------------------------------
   Status
   -------------------------------------------------------------------------- */

/// Lifecycle status of a calendar slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    /// Default state; the slot is not offered for exchange.
    Busy,
    /// Offered on the marketplace.
    Swappable,
    /// Engaged in a pending negotiation; frozen until it resolves.
    SwapPending,
}

/// All valid status names as stored in `slots.status`.
pub const VALID_SLOT_STATUSES: &[&str] = &["BUSY", "SWAPPABLE", "SWAP_PENDING"];

impl SlotStatus {
    /// Database and wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Busy => "BUSY",
            Self::Swappable => "SWAPPABLE",
            Self::SwapPending => "SWAP_PENDING",
        }
    }

    /// Whether the slot is held by a negotiation and must not be edited.
    pub const fn is_locked(self) -> bool {
        matches!(self, Self::SwapPending)
    }
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUSY" => Ok(Self::Busy),
            "SWAPPABLE" => Ok(Self::Swappable),
            "SWAP_PENDING" => Ok(Self::SwapPending),
            other => Err(CoreError::Validation(format!(
                "Invalid slot status '{other}'. Must be one of: {}",
                VALID_SLOT_STATUSES.join(", ")
            ))),
        }
    }
}

impl TryFrom<String> for SlotStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/* --------------------------------------------------------------------------
   Owner-facing rules
   -------------------------------------------------------------------------- */

/// Reject any edit or deletion of a slot that is locked in a negotiation.
pub fn ensure_mutable(current: SlotStatus) -> Result<(), CoreError> {
    if current.is_locked() {
        return Err(CoreError::Conflict(
            "Slot is part of a pending swap request and cannot be modified".to_string(),
        ));
    }
    Ok(())
}

/// Validate a status change requested by the slot's owner.
///
/// Owners may move between `BUSY` and `SWAPPABLE` freely. `SWAP_PENDING` is
/// entered and left only through swap requests.
pub fn validate_owner_status_change(
    current: SlotStatus,
    requested: SlotStatus,
) -> Result<(), CoreError> {
    ensure_mutable(current)?;
    if requested == SlotStatus::SwapPending {
        return Err(CoreError::Validation(
            "SWAP_PENDING can only be set by creating a swap request".to_string(),
        ));
    }
    Ok(())
}

/// Validate a slot title: present and not just whitespace.
pub fn validate_title(title: &str) -> Result<(), CoreError> {
    if title.trim().is_empty() {
        return Err(CoreError::Validation(
            "Slot title must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validate that a slot ends after it starts.
pub fn validate_time_range(start_time: Timestamp, end_time: Timestamp) -> Result<(), CoreError> {
    if end_time <= start_time {
        return Err(CoreError::Validation(
            "end_time must be after start_time".to_string(),
        ));
    }
    Ok(())
}
