//! Notification gateway.
//!
//! Committed negotiation results are announced to the affected users through
//! a [`NotificationGateway`]. Delivery is fire-and-forget: a user with no
//! live connection simply misses the push and sees the change on their next
//! listing.

use slotswap_core::notice::SwapNotice;
use slotswap_core::types::DbId;

use crate::bus::{EventBus, PlatformEvent};

/// Sink for user-addressed real-time notifications.
pub trait NotificationGateway: Send + Sync {
    /// Queue `payload` under `event` for `user_id`. Never fails.
    fn notify(&self, user_id: DbId, event: &str, payload: serde_json::Value);
}

/// The bus is the production gateway: the API's notification router
/// subscribes to it and forwards addressed events to WebSocket clients.
impl NotificationGateway for EventBus {
    fn notify(&self, user_id: DbId, event: &str, payload: serde_json::Value) {
        self.publish(
            PlatformEvent::new(event)
                .with_target(user_id)
                .with_payload(payload),
        );
    }
}

/// Hand each notice to `gateway` under its channel event name.
pub fn dispatch_notices(gateway: &dyn NotificationGateway, notices: &[SwapNotice]) {
    for notice in notices {
        tracing::debug!(
            user_id = notice.user_id,
            request_id = notice.request_id,
            event = notice.kind.channel_event(),
            "Dispatching swap notice",
        );
        gateway.notify(
            notice.user_id,
            notice.kind.channel_event(),
            notice.payload(),
        );
    }
}
