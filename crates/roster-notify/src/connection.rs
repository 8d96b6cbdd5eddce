use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use roster_types::api::Claims;

use crate::notifier::Notifier;

/// Drive one notification WebSocket. The JWT was already validated at the
/// HTTP upgrade layer, so the socket goes straight into the live set.
///
/// Lifecycle: register a fresh connection handle, forward queued
/// notifications to the socket, unregister when the transport reports close
/// or error. A reconnecting client lands here again with a new handle.
pub async fn handle_socket(socket: WebSocket, notifier: Notifier, claims: Claims) {
    let conn_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel();
    notifier.register(conn_id, tx).await;

    info!(
        "{} (user {}) connected to notifications [{}]",
        claims.email, claims.sub, conn_id
    );

    let (mut sender, mut receiver) = socket.split();

    // Forward queued notifications -> client
    let mut send_task = tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            let text = match serde_json::to_string(&notification) {
                Ok(text) => text,
                Err(e) => {
                    warn!("failed to encode notification: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // The notification stream is one-way; client frames are drained so close
    // and ping are handled, everything else is ignored.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    debug!("ignoring client frame ({} bytes)", text.len());
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Whichever side ends first tears down the other.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    notifier.unregister(conn_id).await;
    info!(
        "{} (user {}) disconnected from notifications [{}]",
        claims.email, claims.sub, conn_id
    );
}
