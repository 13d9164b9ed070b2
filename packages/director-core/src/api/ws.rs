//! WebSocket handler streaming `scores`/`switch`/`narration` bus topics to
//! clients, grounded in this codebase's existing WebSocket broadcast handler:
//! subscribe to the broadcast channel, select against cancellation and the
//! client's own read half so a closed/erroring socket is noticed promptly.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::sink::SinkExt;
use futures::stream::StreamExt;
use serde::Serialize;

use crate::bus::BusEvent;
use crate::model::{CameraScore, Narration, SwitchDecision};

use super::AppState;

/// Outgoing wire format: `{"type":"SCORE"|"SWITCH"|"HOLD"|"NARRATION","payload":{...}}`.
#[derive(Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
enum WsOutgoing {
    Score(CameraScore),
    Switch(SwitchDecision),
    Hold(SwitchDecision),
    Narration(Narration),
}

impl From<BusEvent> for WsOutgoing {
    fn from(event: BusEvent) -> Self {
        match event {
            BusEvent::Score(score) => Self::Score(score),
            BusEvent::Switch(decision) => Self::Switch(decision),
            BusEvent::Hold(decision) => Self::Hold(decision),
            BusEvent::Narration(narration) => Self::Narration(narration),
        }
    }
}

impl WsOutgoing {
    fn to_message(&self) -> Option<Message> {
        serde_json::to_string(self).ok().map(|s| Message::Text(s.into()))
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Streams bus events to `socket` until the client disconnects or the
/// service's cancellation token fires.
async fn handle_ws(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut bus_rx = state.services.bus.subscribe();
    let cancel_token = state.services.cancel_token.clone();

    log::info!("ws client connected");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log::info!("ws client disconnected: service shutting down");
                break;
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => {
                        log::info!("ws client closed connection");
                        break;
                    }
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
            event = bus_rx.recv() => {
                match event {
                    Ok(event) => {
                        let outgoing = WsOutgoing::from(event);
                        if let Some(msg) = outgoing.to_message() {
                            if sender.send(msg).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("ws client lagged, skipped {skipped} bus events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}
