use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use parley_types::api::Claims;
use parley_types::events::{GatewayCommand, TypingPayload};
use parley_types::models::ConversationTarget;

use crate::dispatcher::Dispatcher;
use crate::typing::notify_typing;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Identity metadata carried on the upgrade request (`/gateway?userId=..`).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeQuery {
    pub user_id: Option<String>,
    pub token: Option<String>,
}

/// Work out who is on the other end of a handshake. A bearer token wins when
/// it decodes; otherwise the bare `userId` is taken as already vetted by the
/// auth layer. `None` means the connection stays unauthenticated.
pub fn resolve_identity(query: &HandshakeQuery, jwt_secret: &str) -> Option<Uuid> {
    use jsonwebtoken::{DecodingKey, Validation, decode};

    if let Some(token) = query.token.as_deref() {
        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(jwt_secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(data) => return Some(data.claims.sub),
            Err(e) => warn!("gateway token rejected: {}", e),
        }
    }

    query
        .user_id
        .as_deref()
        .and_then(|raw| raw.trim().parse::<Uuid>().ok())
}

/// Drive one WebSocket connection from handshake to teardown.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, user_id: Option<Uuid>) {
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut events) = dispatcher.connect(user_id).await;
    match user_id {
        Some(user_id) => info!("{} connected to gateway as {}", user_id, conn_id),
        None => info!("anonymous connection {} opened", conn_id),
    }

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward queued events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("could not encode {} event: {}", event.name(), e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let dispatcher_recv = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => handle_command(&dispatcher_recv, conn_id, user_id, cmd).await,
                    Err(e) => {
                        warn!(
                            "{} bad command: {} -- raw: {}",
                            conn_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.disconnect(conn_id).await;
    info!("connection {} closed", conn_id);
}

/// Apply one client command on behalf of connection `conn_id`.
pub async fn handle_command(
    dispatcher: &Dispatcher,
    conn_id: Uuid,
    user_id: Option<Uuid>,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::JoinGroup(group_id) => {
            info!("{} joining group room {}", conn_id, group_id);
            dispatcher.join_room(conn_id, group_id).await;
        }

        GatewayCommand::LeaveGroup(group_id) => {
            info!("{} leaving group room {}", conn_id, group_id);
            dispatcher.leave_room(conn_id, group_id).await;
        }

        GatewayCommand::Typing(payload) => {
            relay_typing(dispatcher, conn_id, user_id, payload, true).await;
        }

        GatewayCommand::StopTyping(payload) => {
            relay_typing(dispatcher, conn_id, user_id, payload, false).await;
        }
    }
}

async fn relay_typing(
    dispatcher: &Dispatcher,
    conn_id: Uuid,
    user_id: Option<Uuid>,
    payload: TypingPayload,
    started: bool,
) {
    let Some(sender_id) = user_id else {
        debug!("ignoring typing signal from anonymous connection {}", conn_id);
        return;
    };
    if payload.sender_id.is_some_and(|claimed| claimed != sender_id) {
        debug!("{} claimed another sender id; using its own", conn_id);
    }

    match ConversationTarget::from_parts(payload.receiver_id, payload.group_id) {
        Some(target) => {
            notify_typing(dispatcher, sender_id, Some(conn_id), target, started).await;
        }
        None => warn!("{} sent typing signal without a single target", conn_id),
    }
}
