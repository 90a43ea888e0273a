//! WebSocket handlers for real-time updates
//!
//! Pushes a `dashboard_update` message to connected clients whenever the
//! poller publishes a new snapshot. Supports ping/pong for connection
//! keepalive.

use crate::dashboard::DashboardSnapshot;
use crate::state::SharedState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Interval between keepalive pings
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket message types for real-time communication
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum WebSocketMessage {
    /// New dashboard snapshot
    #[serde(rename = "dashboard_update")]
    DashboardUpdate {
        /// The snapshot
        snapshot: DashboardSnapshot,
    },
    /// Ping message for connection keepalive
    #[serde(rename = "ping")]
    Ping,
    /// Pong message responding to ping
    #[serde(rename = "pong")]
    Pong,
}

impl WebSocketMessage {
    fn into_text(self) -> Option<Message> {
        match serde_json::to_string(&self) {
            Ok(text) => Some(Message::Text(text)),
            Err(e) => {
                error!(error = %e, "Failed to serialize WebSocket message");
                None
            }
        }
    }
}

/// WebSocket upgrade handler
///
/// Sends the current snapshot on connect, then every new one.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> Response {
    let updates = state.poller.subscribe();
    ws.on_upgrade(|socket| handle_socket(socket, updates))
}

// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, mut updates: watch::Receiver<DashboardSnapshot>) {
    let (mut sender, mut receiver) = socket.split();

    info!("WebSocket client connected");

    // Send initial state
    let initial = WebSocketMessage::DashboardUpdate {
        snapshot: updates.borrow_and_update().clone(),
    };
    if let Some(msg) = initial.into_text() {
        if let Err(e) = sender.send(msg).await {
            error!(error = %e, "Failed to send initial snapshot");
            return;
        }
    }

    // Use a channel to send messages from the other tasks to the sender
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Message>();

    // Task to forward messages from channel to sender
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = sender.send(msg).await {
                debug!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    // Task to push snapshots and periodic pings
    let push_tx = tx.clone();
    let mut push_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);
        ping.tick().await;
        loop {
            let msg = tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = updates.borrow_and_update().clone();
                    WebSocketMessage::DashboardUpdate { snapshot }.into_text()
                }
                _ = ping.tick() => Some(Message::Ping(Vec::new())),
            };
            if let Some(msg) = msg {
                if push_tx.send(msg).is_err() {
                    break;
                }
            }
        }
    });

    // Receive messages
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<WebSocketMessage>(&text) {
                        Ok(WebSocketMessage::Ping) => {
                            if let Some(pong) = WebSocketMessage::Pong.into_text() {
                                if tx.send(pong).is_err() {
                                    break;
                                }
                            }
                        }
                        Ok(other) => warn!(message = ?other, "Received unhandled WebSocket message"),
                        Err(_) => debug!(len = text.len(), "Ignoring unparseable WebSocket message"),
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("WebSocket client disconnected");
                    break;
                }
                Ok(Message::Pong(_)) => {
                    // Client responded to ping
                }
                Err(e) => {
                    warn!(error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    // Wait for any task to complete
    tokio::select! {
        _ = &mut send_task => {
            push_task.abort();
            recv_task.abort();
        }
        _ = &mut push_task => {
            send_task.abort();
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
            push_task.abort();
        }
    }

    info!("WebSocket connection closed");
}
