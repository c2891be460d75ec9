use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use slotswap_core::types::DbId;

use crate::auth::jwt::JwtConfig;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use crate::ws::manager::WsManager;

/// Query string accepted on the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// Messages a client may send over the socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    /// Join the caller's notification channel.
    Authenticate { token: String },
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// A `?token=` on the upgrade joins the user's channel immediately; an
/// invalid one refuses the upgrade with 401. Without it the client must
/// send an `authenticate` message before it receives notifications.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
) -> AppResult<Response> {
    let user_id = params
        .token
        .as_deref()
        .map(|token| AuthUser::from_token(token, &state.config.jwt))
        .transpose()?
        .map(|auth| auth.user_id);

    let ws_manager = Arc::clone(&state.ws_manager);
    let jwt = state.config.jwt.clone();
    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, ws_manager, jwt, user_id))
        .into_response())
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Processes inbound messages on the current task.
///   4. Cleans up on disconnect.
async fn handle_socket(
    socket: WebSocket,
    ws_manager: Arc<WsManager>,
    jwt: JwtConfig,
    user_id: Option<DbId>,
) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id = ?user_id, "WebSocket connected");

    let mut rx = ws_manager.add(conn_id.clone(), user_id).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: process inbound messages.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(text)) => {
                handle_client_message(&ws_manager, &jwt, &conn_id, text.as_str()).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

/// Dispatch one inbound text frame and reply on the same connection.
async fn handle_client_message(ws_manager: &WsManager, jwt: &JwtConfig, conn_id: &str, text: &str) {
    let reply = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Authenticate { token }) => match AuthUser::from_token(&token, jwt) {
            Ok(auth) => {
                ws_manager.set_user(conn_id, auth.user_id).await;
                tracing::info!(conn_id, user_id = auth.user_id, "WebSocket joined user channel");
                json!({ "type": "authenticated", "data": { "userId": auth.user_id } })
            }
            Err(_) => json!({ "type": "error", "data": { "message": "Invalid or expired token" } }),
        },
        Err(e) => {
            tracing::debug!(conn_id, error = %e, "Unrecognised WebSocket message");
            json!({ "type": "error", "data": { "message": "Unrecognised message" } })
        }
    };

    ws_manager
        .send_to_connection(conn_id, Message::Text(reply.to_string().into()))
        .await;
}
