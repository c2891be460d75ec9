//! Swap request state machine and negotiation preconditions.
//!
//! A swap request is born `PENDING` and ends in exactly one of the terminal
//! states `ACCEPTED` or `REJECTED`. The check functions here are pure: the
//! negotiation engine loads row snapshots under lock and hands them in, so the
//! same rules apply no matter which store sits underneath.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::slot::SlotStatus;
use crate::types::DbId;

/* --------------------------------------------------------------------------
   Status and decision
   -------------------------------------------------------------------------- */

/// Lifecycle status of a swap request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapStatus {
    Pending,
    Accepted,
    Rejected,
}

/// All valid status names as stored in `swap_requests.status`.
pub const VALID_SWAP_STATUSES: &[&str] = &["PENDING", "ACCEPTED", "REJECTED"];

impl SwapStatus {
    /// Database and wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
        }
    }

    /// `ACCEPTED` and `REJECTED` have no outgoing transitions.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Apply a responder's decision, yielding the next status.
    pub fn apply(self, decision: SwapDecision) -> Result<SwapStatus, SwapStatus> {
        match (self, decision) {
            (Self::Pending, SwapDecision::Accept) => Ok(Self::Accepted),
            (Self::Pending, SwapDecision::Reject) => Ok(Self::Rejected),
            (terminal, _) => Err(terminal),
        }
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwapStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "ACCEPTED" => Ok(Self::Accepted),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(CoreError::Validation(format!(
                "Invalid swap status '{other}'. Must be one of: {}",
                VALID_SWAP_STATUSES.join(", ")
            ))),
        }
    }
}

impl TryFrom<String> for SwapStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The responder's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDecision {
    Accept,
    Reject,
}

impl From<bool> for SwapDecision {
    fn from(accept: bool) -> Self {
        if accept {
            Self::Accept
        } else {
            Self::Reject
        }
    }
}

/* --------------------------------------------------------------------------
   Errors
   -------------------------------------------------------------------------- */

/// Why a slot cannot take part in a new swap request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidSlotReason {
    Missing,
    NotOwned,
    NotSwappable(SlotStatus),
}

impl fmt::Display for InvalidSlotReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("slot does not exist"),
            Self::NotOwned => f.write_str("slot does not belong to the requester"),
            Self::NotSwappable(status) => write!(f, "slot is {status}, not SWAPPABLE"),
        }
    }
}

/// Domain failures of the negotiation engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NegotiationError {
    #[error("Invalid slot {slot_id}: {reason}")]
    InvalidSlot {
        slot_id: DbId,
        reason: InvalidSlotReason,
    },

    #[error("Cannot swap a slot with another slot you own")]
    SelfSwap,

    #[error("A pending swap request already exists for slots {requester_slot_id} and {responder_slot_id}")]
    DuplicateRequest {
        requester_slot_id: DbId,
        responder_slot_id: DbId,
    },

    #[error("Swap request {request_id} not found")]
    NotFound { request_id: DbId },

    #[error("Swap request {request_id} is not addressed to this user")]
    Forbidden { request_id: DbId },

    #[error("Swap request {request_id} has already been {status}")]
    AlreadyProcessed { request_id: DbId, status: SwapStatus },
}

impl From<NegotiationError> for CoreError {
    fn from(err: NegotiationError) -> Self {
        match err {
            NegotiationError::InvalidSlot {
                slot_id,
                reason: InvalidSlotReason::Missing | InvalidSlotReason::NotOwned,
            } => CoreError::NotFound {
                entity: "Slot",
                id: slot_id,
            },
            NegotiationError::NotFound { request_id } => CoreError::NotFound {
                entity: "SwapRequest",
                id: request_id,
            },
            NegotiationError::Forbidden { .. } => CoreError::Forbidden(err.to_string()),
            NegotiationError::InvalidSlot { .. }
            | NegotiationError::SelfSwap
            | NegotiationError::DuplicateRequest { .. }
            | NegotiationError::AlreadyProcessed { .. } => CoreError::Conflict(err.to_string()),
        }
    }
}

/* --------------------------------------------------------------------------
   Preconditions
   -------------------------------------------------------------------------- */

/// The slot fields the negotiation checks depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub id: DbId,
    pub owner_id: DbId,
    pub status: SlotStatus,
}

/// The request fields the respond checks depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestSnapshot {
    pub id: DbId,
    pub responder_id: DbId,
    pub status: SwapStatus,
}

/// Check the preconditions of a new swap request.
///
/// `requester_slot` / `responder_slot` are `None` when the row does not exist.
/// On success returns the responder's user id (the owner of the target slot).
pub fn check_create(
    requester_id: DbId,
    requester_slot_id: DbId,
    requester_slot: Option<SlotSnapshot>,
    responder_slot_id: DbId,
    responder_slot: Option<SlotSnapshot>,
) -> Result<DbId, NegotiationError> {
    let mine = requester_slot.ok_or(NegotiationError::InvalidSlot {
        slot_id: requester_slot_id,
        reason: InvalidSlotReason::Missing,
    })?;
    if mine.owner_id != requester_id {
        return Err(NegotiationError::InvalidSlot {
            slot_id: requester_slot_id,
            reason: InvalidSlotReason::NotOwned,
        });
    }

    let theirs = responder_slot.ok_or(NegotiationError::InvalidSlot {
        slot_id: responder_slot_id,
        reason: InvalidSlotReason::Missing,
    })?;
    if theirs.owner_id == requester_id {
        return Err(NegotiationError::SelfSwap);
    }

    for slot in [mine, theirs] {
        if slot.status != SlotStatus::Swappable {
            return Err(NegotiationError::InvalidSlot {
                slot_id: slot.id,
                reason: InvalidSlotReason::NotSwappable(slot.status),
            });
        }
    }

    Ok(theirs.owner_id)
}

/// Check that `responder_id` may answer `request` and that it is still open.
pub fn check_respond(
    request: &RequestSnapshot,
    responder_id: DbId,
) -> Result<(), NegotiationError> {
    if request.responder_id != responder_id {
        return Err(NegotiationError::Forbidden {
            request_id: request.id,
        });
    }
    if request.status.is_terminal() {
        return Err(NegotiationError::AlreadyProcessed {
            request_id: request.id,
            status: request.status,
        });
    }
    Ok(())
}
