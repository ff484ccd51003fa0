use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use termhub_core::config::{HEARTBEAT_INTERVAL_SECS, OBSERVER_TIMEOUT_SECS};
use termhub_store::Sender;
use tracing::{info, warn};

use crate::app::AppState;
use crate::ws::frames::InboundFrame;

/// Axum handler — upgrades HTTP to WebSocket at `/api/v1/ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_connection(socket, state))
}

/// Per-connection task. Registers one Broadcast Hub observer for the
/// lifetime of the socket and forwards in both directions until either
/// side closes or the keepalive times out.
async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let (observer_id, mut outbound_rx) = state.hub.register();
    info!(observer = %observer_id, "new WS observer registered");

    let (mut tx, mut rx) = socket.split();

    let mut heartbeat = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut awaiting_pong = false;
    let timeout = Duration::from_secs(OBSERVER_TIMEOUT_SECS);
    let mut pong_deadline = Box::pin(tokio::time::sleep(timeout));

    loop {
        tokio::select! {
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_inbound(&text, &observer_id, &state).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        awaiting_pong = false;
                        pong_deadline.as_mut().reset(tokio::time::Instant::now() + timeout);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(observer = %observer_id, error = %e, "WS read error");
                        break;
                    }
                    _ => {}
                }
            }

            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => {
                        let json = serde_json::to_string(&frame).unwrap_or_default();
                        if tx.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            _ = heartbeat.tick() => {
                if awaiting_pong {
                    warn!(observer = %observer_id, "missed pong, closing observer");
                    break;
                }
                if tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            _ = &mut pong_deadline, if awaiting_pong => {
                warn!(observer = %observer_id, "pong timeout, closing observer");
                break;
            }
        }
    }

    state.hub.unregister(&observer_id);
    info!(observer = %observer_id, "WS observer disconnected");
}

async fn handle_inbound(text: &str, observer_id: &termhub_core::ObserverId, state: &Arc<AppState>) {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(observer = %observer_id, error = %e, "malformed WS frame, ignoring");
            return;
        }
    };

    match frame.action.as_str() {
        "subscribe" | "selectSession" => {
            if let Some(session_id) = &frame.session_id {
                state.hub.subscribe(observer_id, session_id);
            }
        }
        "unsubscribe" => {
            state.hub.unsubscribe(observer_id);
        }
        "getMessages" => {
            if let Some(session_id) = &frame.session_id {
                state.hub.replay_messages(observer_id, session_id);
            }
        }
        "input" => {
            if let (Some(session_id), Some(input)) = (&frame.session_id, &frame.input) {
                if let Err(e) = state.orchestrator.send_input(session_id, input).await {
                    warn!(observer = %observer_id, error = %e, "input delivery failed");
                }
            }
        }
        "sendMessage" => {
            if let (Some(session_id), Some(input)) = (&frame.session_id, &frame.input) {
                if let Err(e) = state
                    .orchestrator
                    .send_message(session_id, input, Sender::User)
                    .await
                {
                    warn!(observer = %observer_id, error = %e, "sendMessage delivery failed");
                }
            }
        }
        "markAsRead" => {
            let message_id = frame.data.as_ref().and_then(|d| d.as_i64());
            if let (Some(session_id), Some(message_id)) = (&frame.session_id, message_id) {
                if let Err(e) = state.orchestrator.mark_as_read(session_id, message_id).await {
                    warn!(observer = %observer_id, error = %e, "markAsRead failed");
                }
            }
        }
        other => {
            warn!(observer = %observer_id, action = other, "unrecognised WS action");
        }
    }
}
