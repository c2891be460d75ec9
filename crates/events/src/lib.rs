//! Slot swap event bus and notification gateway.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`PlatformEvent`] -- the event envelope carried on the bus.
//! - [`NotificationGateway`] -- the seam negotiation results are announced
//!   through once their transaction has committed.

pub mod bus;
pub mod gateway;

pub use bus::{EventBus, PlatformEvent};
pub use gateway::{dispatch_notices, NotificationGateway};
