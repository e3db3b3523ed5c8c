//! WebSocket observer endpoint
//!
//! Every connected socket is a hub subscriber. Ingested batches are forwarded
//! as JSON text frames; inbound frames other than Close are ignored. A socket
//! write that does not finish within the hub's send timeout ends the
//! connection.

use std::fmt::Display;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{Sink, SinkExt, Stream, StreamExt};

use super::AppState;
use crate::hub::ObserverHandle;

/// GET /ws/
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| observe(socket, state))
}

async fn observe(socket: WebSocket, state: AppState) {
    let hub = state.gateway.hub().clone();
    let mut observer = hub.subscribe();
    let (sender, receiver) = socket.split();

    let exit = forward(&mut observer, sender, receiver, hub.config().send_timeout).await;
    tracing::debug!(observer_id = observer.id(), ?exit, "WebSocket observer finished");

    hub.unsubscribe(observer.id());
}

/// Why a forwarding loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Closed,
    Pruned,
    SendFailed,
    SendTimedOut,
}

async fn forward<Tx, Rx>(
    observer: &mut ObserverHandle,
    mut sender: Tx,
    mut receiver: Rx,
    send_timeout: Duration,
) -> Exit
where
    Tx: Sink<Message> + Unpin,
    Tx::Error: Display,
    Rx: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let observer_id = observer.id();

    loop {
        tokio::select! {
            // Queued payloads go out before inbound frames are read
            biased;

            payload = observer.recv() => {
                let Some(payload) = payload else {
                    return Exit::Pruned;
                };
                let send = sender.send(Message::Text(payload.to_string()));
                match tokio::time::timeout(send_timeout, send).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::debug!(observer_id, error = %e, "WebSocket send failed");
                        return Exit::SendFailed;
                    }
                    Err(_) => {
                        tracing::warn!(observer_id, "WebSocket peer stopped reading, closing");
                        return Exit::SendTimedOut;
                    }
                }
            }
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Close(_))) | None => return Exit::Closed,
                    Some(Err(e)) => {
                        tracing::debug!(observer_id, error = %e, "WebSocket receive failed");
                        return Exit::Closed;
                    }
                    // keep-alive
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
