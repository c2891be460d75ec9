//! Outbound negotiation notices.
//!
//! The negotiation engine collects a [`SwapNotice`] for every user affected by
//! an operation. Notices are only handed to the notification gateway after the
//! transaction commits, so a rolled-back operation never announces anything.

use serde::Serialize;
use serde_json::json;

use crate::types::DbId;

/// Prefix used on the real-time channel (`swap_request_received`, ...).
pub const CHANNEL_EVENT_PREFIX: &str = "swap_";

/// The kinds of negotiation state change a user is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapEventKind {
    RequestReceived,
    RequestAccepted,
    RequestRejected,
}

impl SwapEventKind {
    /// Engine-level event name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RequestReceived => "request_received",
            Self::RequestAccepted => "request_accepted",
            Self::RequestRejected => "request_rejected",
        }
    }

    /// Event name pushed to clients over the real-time channel.
    pub const fn channel_event(self) -> &'static str {
        match self {
            Self::RequestReceived => "swap_request_received",
            Self::RequestAccepted => "swap_request_accepted",
            Self::RequestRejected => "swap_request_rejected",
        }
    }

    /// Human-readable message shown by the client.
    pub const fn message(self) -> &'static str {
        match self {
            Self::RequestReceived => "You have received a new swap request",
            Self::RequestAccepted => "Your swap request was accepted",
            Self::RequestRejected => "Your swap request was rejected",
        }
    }
}

/// A pending notification for one user about one swap request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapNotice {
    pub user_id: DbId,
    pub kind: SwapEventKind,
    pub request_id: DbId,
}

impl SwapNotice {
    pub fn new(user_id: DbId, kind: SwapEventKind, request_id: DbId) -> Self {
        Self {
            user_id,
            kind,
            request_id,
        }
    }

    /// Client payload: `{ "message": ..., "requestId": ... }`.
    pub fn payload(&self) -> serde_json::Value {
        json!({
            "message": self.kind.message(),
            "requestId": self.request_id,
        })
    }
}
