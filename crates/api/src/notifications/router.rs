//! Event-to-WebSocket routing.
//!
//! [`NotificationRouter`] subscribes to the event bus and forwards each
//! user-addressed swap event to every live connection of that user as
//! `{"type": <event>, "data": <payload>}`. Users without a connection miss
//! the push; their next listing shows the change.

use std::sync::Arc;

use axum::extract::ws::Message;
use serde_json::json;
use slotswap_core::notice::CHANNEL_EVENT_PREFIX;
use slotswap_events::PlatformEvent;
use tokio::sync::broadcast;

use crate::ws::WsManager;

/// Routes bus events to user channels.
pub struct NotificationRouter {
    ws_manager: Arc<WsManager>,
}

impl NotificationRouter {
    /// Create a new router delivering through the given WebSocket manager.
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the main routing loop.
    ///
    /// The loop exits when the channel is closed (i.e. the
    /// [`EventBus`](slotswap_events::EventBus) is dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    self.route_event(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    /// Push a single event to its target user.
    ///
    /// Returns the number of connections reached. Unaddressed events and
    /// events outside the swap channel are ignored.
    pub async fn route_event(&self, event: &PlatformEvent) -> usize {
        let Some(user_id) = event.target_user_id else {
            return 0;
        };
        if !event.event_type.starts_with(CHANNEL_EVENT_PREFIX) {
            return 0;
        }

        let frame = json!({
            "type": event.event_type,
            "data": event.payload,
        });
        let delivered = self
            .ws_manager
            .send_to_user(user_id, Message::Text(frame.to_string().into()))
            .await;

        tracing::debug!(
            user_id,
            event_type = %event.event_type,
            delivered,
            "Routed swap notification",
        );
        delivered
    }
}
