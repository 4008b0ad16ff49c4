use std::sync::{Arc, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::{info, trace, warn};
use uuid::Uuid;

use torque_types::api::Claims;
use torque_types::events::{GatewayCommand, LedgerEvent};
use torque_types::session::Session;

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Which sales events a connection wants.
///
/// `Some(id)` means one employee's sales; `None` means every employee
/// (owner dashboards). Global events pass through regardless.
type Scope = Option<Uuid>;

/// Handle a single WebSocket connection: Identify handshake, then a
/// filtered relay of ledger events until the client goes away.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, jwt_secret: String) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: Wait for Identify command with JWT
    let Some(session) = wait_for_identify(&mut receiver, &jwt_secret).await else {
        warn!("WebSocket client failed to identify, closing");
        return;
    };

    info!(
        "{} ({}) connected to change feed",
        session.character_name, session.employee_id
    );

    // Step 2: Send Ready event
    let ready = LedgerEvent::Ready {
        employee_id: session.employee_id,
        character_name: session.character_name.clone(),
    };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    // Connections start scoped to their own sales; owners may widen via
    // Subscribe.
    let scope: Arc<RwLock<Scope>> = Arc::new(RwLock::new(Some(session.employee_id)));
    let send_scope = scope.clone();

    let mut broadcast_rx = dispatcher.subscribe();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };

                    if let Some(employee_id) = event.employee_scope() {
                        let wanted = *send_scope.read().unwrap();
                        if wanted.is_some_and(|scoped| scoped != employee_id) {
                            continue;
                        }
                    }

                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to serialize event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::SeqCst) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Client missed {} heartbeats, dropping", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Process commands from the client
    let recv_session = session.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let Ok(command) = serde_json::from_str::<GatewayCommand>(&text) else {
                        trace!("Ignoring unparseable gateway command");
                        continue;
                    };
                    if let GatewayCommand::Subscribe { employee_id } = command {
                        let allowed = recv_session.capabilities.can_see_all_sales
                            || employee_id == Some(recv_session.employee_id);
                        if allowed {
                            *scope.write().unwrap() = employee_id;
                        } else {
                            warn!(
                                "{} tried to subscribe outside their scope",
                                recv_session.character_name
                            );
                        }
                    }
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::SeqCst);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!(
        "{} ({}) disconnected from change feed",
        session.character_name, session.employee_id
    );
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<Session> {
    // Give the client one message to identify; anything else closes the
    // connection.
    let msg = tokio::time::timeout(Duration::from_secs(10), receiver.next())
        .await
        .ok()??
        .ok()?;

    let Message::Text(text) = msg else {
        return None;
    };
    let GatewayCommand::Identify { token } = serde_json::from_str(&text).ok()? else {
        return None;
    };

    let token_data = decode::<Claims>(
        &token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;

    Some(token_data.claims.into())
}
