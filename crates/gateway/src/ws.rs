//! Live event streaming over WebSocket.
//!
//! `GET /ws/{session_id}` — the server pushes [`RunEvent`] JSON frames as
//! the loop executes. Client frames keep the connection alive and are not
//! otherwise interpreted. On disconnect the session's environment is torn
//! down; an in-flight run is *not* cancelled — only delivery stops.

use crate::SharedState;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info};

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, session_id, state))
}

async fn handle_ws_connection(socket: WebSocket, session_id: String, state: SharedState) {
    info!(session_id, "WebSocket connection established");

    let mut events_rx = state.events.attach(&session_id).await;
    let (mut sink, mut stream) = socket.split();

    // True when a newer observer replaced this one; its session state must
    // be left alone.
    let mut replaced = false;

    loop {
        tokio::select! {
            event = events_rx.recv() => {
                match event {
                    Some(event) => {
                        let json = serde_json::to_string(&event).unwrap_or_default();
                        if sink.send(WsMessage::Text(json.into())).await.is_err() {
                            break; // client gone; run continues unobserved
                        }
                    }
                    None => {
                        replaced = true;
                        break;
                    }
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {
                        // Keep-alive; client payloads are not interpreted.
                        debug!(session_id, "Ignoring client frame");
                    }
                }
            }
        }
    }

    if !replaced {
        state.events.detach(&session_id).await;
        // Disconnect ends the session: tear down its environment.
        // Teardown is best-effort and logged inside the manager.
        state.environments.destroy(&session_id).await;
    }

    info!(session_id, replaced, "WebSocket connection closed");
}
