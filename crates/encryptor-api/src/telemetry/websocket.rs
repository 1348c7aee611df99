//! `GET /ws` upgrade handler: token auth, initial snapshot, then fan-out
//! from the shared [`ConnectionManager`](crate::telemetry::connection_manager::ConnectionManager)
//! until the client disconnects (§4.10 "WebSocket connect", "Auth").

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use encryptor_crypto::token::TokenType;
use serde::Deserialize;

use crate::state::AppState;
use crate::telemetry::{interface_poller, tunnel_poller};

/// WebSocket close code for policy violation (here: failed auth), per RFC 6455 §7.4.1.
const CLOSE_POLICY_VIOLATION: u16 = 1008;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// `GET /api/v1/ws?token=...`.
///
/// Auth happens *before* the upgrade completes its handshake logic in
/// [`handle_socket`]: a missing, empty, invalid, or non-access token closes
/// the socket with code 1008 before any snapshot frame is sent.
pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> Response {
    let user_id = query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .and_then(|t| state.tokens.verify(t, TokenType::Access).ok());

    match user_id {
        Some(user_id) => {
            ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
        }
        None => ws.on_upgrade(|socket| reject_socket(socket)),
    }
}

async fn reject_socket(mut socket: WebSocket) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: CLOSE_POLICY_VIOLATION,
            reason: "authentication required".into(),
        })))
        .await;
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, user_id: i64) {
    tracing::debug!(user_id, "websocket client connected");

    for event in tunnel_poller::snapshot_events(&state).await {
        if send_event(&mut socket, &event).await.is_err() {
            return;
        }
    }
    for event in interface_poller::snapshot_events(&state).await {
        if send_event(&mut socket, &event).await.is_err() {
            return;
        }
    }

    let (id, mut rx) = state.connections.connect();

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                match outgoing {
                    Some(message) => {
                        if socket.send(message).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // Inbound frames are read and discarded; this connection is
                        // publish-only from the server's perspective (§4.10).
                    }
                    Some(Err(_)) => break,
                }
            }
        }
    }

    state.connections.disconnect(id);
    tracing::debug!(user_id, "websocket client disconnected");
}

async fn send_event(socket: &mut WebSocket, event: &crate::telemetry::events::EventEnvelope) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(event).unwrap_or_default();
    socket.send(Message::Text(payload.into())).await
}
