//! Notification routing infrastructure.
//!
//! The [`NotificationRouter`] subscribes to the event bus and pushes swap
//! notifications to the addressed user's WebSocket connections.

pub mod router;

pub use router::NotificationRouter;
