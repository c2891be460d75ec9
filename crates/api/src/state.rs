use std::sync::Arc;

use slotswap_core::notice::SwapNotice;
use slotswap_db::NegotiationEngine;
use slotswap_events::EventBus;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: slotswap_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Event bus the notification router listens on.
    pub event_bus: Arc<EventBus>,
    /// Transactional swap negotiation over `pool`.
    pub engine: NegotiationEngine,
}

impl AppState {
    /// Assemble the state, building the negotiation engine over `pool`.
    pub fn new(
        pool: slotswap_db::DbPool,
        config: Arc<ServerConfig>,
        ws_manager: Arc<WsManager>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let engine = NegotiationEngine::new(pool.clone());
        Self {
            pool,
            config,
            ws_manager,
            event_bus,
            engine,
        }
    }

    /// Announce committed negotiation results to the affected users.
    pub fn announce(&self, notices: &[SwapNotice]) {
        slotswap_events::dispatch_notices(self.event_bus.as_ref(), notices);
    }
}
