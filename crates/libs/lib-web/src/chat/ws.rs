//! # Chat WebSocket Handler
//!
//! The persistent channel endpoint. Authenticates the upgrade via a bearer
//! token, then runs the event loop: `join` grants room membership and
//! starts the typing relay for that room, `typing` fans presence out to
//! the other member.
//!
//! Denied or malformed operations produce `error` events on the same
//! connection; the socket is never closed for an authorization failure, so
//! one bad room id does not tear down the caller's other rooms.

use super::access::{is_participant, resolve_participants, ParticipantSource};
use super::state::ChatAppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use lib_auth::token::decode_jwt;
use shared::dto::chat::{ErrorPayload, JoinedPayload, TypingBroadcast};
use shared::{ClientEvent, ServerEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// WebSocket upgrade handler for the chat channel.
///
/// **Route**: `GET /ws/chat`
///
/// The bearer token travels in the `Authorization` header of the upgrade
/// request. A missing or invalid token rejects the upgrade with 401; all
/// later failures are in-band `error` events.
pub async fn chat_ws(
    State(chat): State<Arc<ChatAppState>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = match bearer_token(&headers) {
        Some(token) => token,
        None => {
            debug!("chat upgrade rejected: missing bearer token");
            return (StatusCode::UNAUTHORIZED, "missing bearer token").into_response();
        }
    };

    let claims = match decode_jwt(token, &chat.config.jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "chat upgrade rejected: invalid token");
            return (StatusCode::UNAUTHORIZED, "invalid bearer token").into_response();
        }
    };

    let connection_id = Uuid::new_v4();
    info!(%connection_id, identity = %claims.sub, "chat channel connected");

    ws.on_upgrade(move |socket| handle_socket(socket, chat, claims.sub, connection_id))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Per-connection event loop.
///
/// A dedicated writer task owns the sink; the read loop and the per-room
/// relay tasks all feed it through one mpsc channel so server events never
/// interleave mid-frame.
async fn handle_socket(
    socket: WebSocket,
    chat: Arc<ChatAppState>,
    identity: String,
    connection_id: Uuid,
) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerEvent>();

    let writer = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "failed to serialize server event");
                    continue;
                }
            };
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // Relay tasks per joined room, keyed by conversation id.
    let mut joined: HashMap<String, JoinHandle<()>> = HashMap::new();

    while let Some(Ok(message)) = stream.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // Ping/pong handled by axum; binary frames are not part of
            // the protocol.
            _ => continue,
        };

        let event = match serde_json::from_str::<ClientEvent>(text.as_str()) {
            Ok(event) => event,
            Err(e) => {
                debug!(%connection_id, error = %e, "unparseable client event");
                send_error(&out_tx, "unrecognized event");
                continue;
            }
        };

        match event {
            ClientEvent::Join(payload) => {
                let Some(room) = payload.room_id() else {
                    send_error(&out_tx, "conversationId is required for join");
                    continue;
                };
                handle_join(&chat, &identity, connection_id, &room, &out_tx, &mut joined).await;
            }
            ClientEvent::Typing(payload) => {
                let Some(room) = payload.room_id() else {
                    send_error(&out_tx, "conversationId is required for typing");
                    continue;
                };
                handle_typing(&chat, &identity, &room, payload.is_typing, &out_tx).await;
            }
        }
    }

    for (_, relay) in joined.drain() {
        relay.abort();
    }
    writer.abort();
    info!(%connection_id, identity = %identity, "chat channel disconnected");
}

/// Authorize and execute a room join.
///
/// On the task-fallback path the conversation record is materialized here,
/// so a later store subscription finds it. Re-joins are idempotent: the
/// existing relay task is kept and `joined` is re-acknowledged.
async fn handle_join(
    chat: &Arc<ChatAppState>,
    identity: &str,
    connection_id: Uuid,
    room: &str,
    out_tx: &mpsc::UnboundedSender<ServerEvent>,
    joined: &mut HashMap<String, JoinHandle<()>>,
) {
    let resolved = match resolve_participants(chat.store.pool(), room).await {
        Ok(Some(resolved)) => resolved,
        Ok(None) => {
            send_error(out_tx, "Chat/Task not found for this id");
            return;
        }
        Err(e) => {
            warn!(%connection_id, room, error = %e, "participant resolution failed");
            send_error(out_tx, "Failed to join chat");
            return;
        }
    };

    if !is_participant(identity, &resolved) {
        warn!(%connection_id, identity, room, "join denied: not a participant");
        send_error(out_tx, "Not allowed for this chat");
        return;
    }

    if resolved.source == ParticipantSource::Task {
        if let Err(e) = chat
            .store
            .ensure_conversation(room, &resolved.participants, Some(room))
            .await
        {
            // The join still succeeds; the record gets another chance when
            // the first message is written.
            warn!(%connection_id, room, error = %e, "conversation materialization failed");
        }
    }

    if !joined.contains_key(room) {
        let mut room_rx = chat.room_sender(room).await.subscribe();
        let relay_tx = out_tx.clone();
        let self_id = identity.to_string();
        let relay = tokio::spawn(async move {
            while let Ok(event) = room_rx.recv().await {
                if event.sender_id == self_id {
                    continue;
                }
                if relay_tx.send(ServerEvent::Typing(event)).is_err() {
                    break;
                }
            }
        });
        joined.insert(room.to_string(), relay);
        debug!(%connection_id, identity, room, "joined room");
    }

    let _ = out_tx.send(ServerEvent::Joined(JoinedPayload {
        conversation_id: room.to_string(),
    }));
}

/// Authorize and relay a typing event.
///
/// Membership is re-checked on every event rather than trusting the join;
/// a revoked participant stops relaying immediately. Rejections go only to
/// the sender, never into the room.
async fn handle_typing(
    chat: &Arc<ChatAppState>,
    identity: &str,
    room: &str,
    is_typing: bool,
    out_tx: &mpsc::UnboundedSender<ServerEvent>,
) {
    let authorized = match resolve_participants(chat.store.pool(), room).await {
        Ok(Some(resolved)) => is_participant(identity, &resolved),
        Ok(None) => false,
        Err(e) => {
            warn!(room, error = %e, "typing authorization check failed");
            send_error(out_tx, "Failed to relay typing state");
            return;
        }
    };

    if !authorized {
        warn!(identity, room, "typing denied: not a participant");
        send_error(out_tx, "Not allowed for this chat");
        return;
    }

    chat.broadcast_typing(
        room,
        TypingBroadcast {
            sender_id: identity.to_string(),
            is_typing,
        },
    )
    .await;
}

fn send_error(out_tx: &mpsc::UnboundedSender<ServerEvent>, message: &str) {
    let _ = out_tx.send(ServerEvent::Error(ErrorPayload {
        message: message.to_string(),
    }));
}
