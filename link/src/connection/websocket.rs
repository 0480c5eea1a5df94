//! Default [`RealtimeDriver`] over a tokio-tungstenite WebSocket.
//!
//! Each `open` spawns one session task owning the socket. Outbound payloads
//! reach it through an unbounded channel; dropping that channel (on `close`
//! or on the next `open`) makes the session close the socket quietly.
//!
//! Inbound JSON messages are routed by their `room` field (notifications)
//! or, failing that, by `requestId` (responses).

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{protocol::frame::coding::CloseCode, Message},
};

use super::driver::{DriverEvent, DriverEventSender, RealtimeDriver};
use crate::error::{LiveLinkError, Result};

#[derive(Default)]
pub struct WebSocketDriver {
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

impl WebSocketDriver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RealtimeDriver for WebSocketDriver {
    fn open(&self, host: &str, port: u16, ssl: bool, events: DriverEventSender) {
        let scheme = if ssl { "wss" } else { "ws" };
        let url = format!("{}://{}:{}", scheme, host, port);
        let (tx, rx) = mpsc::unbounded_channel();
        // Replacing the sender ends any previous session
        *self.outbound.lock() = Some(tx);
        tokio::spawn(run_session(url, rx, events));
    }

    fn send(&self, payload: String) -> Result<()> {
        let outbound = self.outbound.lock();
        let Some(tx) = outbound.as_ref() else {
            return Err(LiveLinkError::NotConnected("WebSocket is not open".to_string()));
        };
        tx.send(Message::Text(payload.into()))
            .map_err(|_| LiveLinkError::WebSocketError("WebSocket session has ended".to_string()))
    }

    fn close(&self) {
        self.outbound.lock().take();
    }
}

async fn run_session(
    url: String,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    events: DriverEventSender,
) {
    debug!("[live-link] Opening WebSocket connection to {}", url);
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            let _ = events.send(DriverEvent::NetworkError(e.to_string()));
            return;
        },
    };
    info!("[live-link] WebSocket connected to {}", url);
    let _ = events.send(DriverEvent::Connected);

    let (mut sink, mut stream) = ws_stream.split();
    loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(message) => {
                    if let Err(e) = sink.send(message).await {
                        let _ = events.send(DriverEvent::NetworkError(e.to_string()));
                        return;
                    }
                },
                None => {
                    debug!("[live-link] Closing WebSocket connection to {}", url);
                    let _ = sink.close().await;
                    return;
                },
            },

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => route_text(text.as_str(), &events),
                Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                    Ok(text) => route_text(text, &events),
                    Err(e) => warn!("[live-link] Dropping non UTF-8 binary message: {}", e),
                },
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                },
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {},
                Some(Ok(Message::Close(frame))) => {
                    let event = match frame {
                        Some(frame) if frame.code == CloseCode::Normal => DriverEvent::Disconnected,
                        Some(frame) => DriverEvent::NetworkError(format!(
                            "connection closed ({}): {}",
                            u16::from(frame.code),
                            frame.reason.as_str()
                        )),
                        None => DriverEvent::NetworkError("connection closed".to_string()),
                    };
                    let _ = events.send(event);
                    return;
                },
                Some(Err(e)) => {
                    let _ = events.send(DriverEvent::NetworkError(e.to_string()));
                    return;
                },
                None => {
                    let _ = events.send(DriverEvent::NetworkError("WebSocket stream ended".to_string()));
                    return;
                },
            },
        }
    }
}

fn route_text(text: &str, events: &DriverEventSender) {
    let payload: JsonValue = match serde_json::from_str(text) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("[live-link] Failed to parse WS message: {}", e);
            return;
        },
    };
    match message_channel(&payload) {
        Some(channel) => {
            let _ = events.send(DriverEvent::Message { channel, payload });
        },
        None => debug!("[live-link] Dropping message without room or requestId"),
    }
}

fn message_channel(payload: &JsonValue) -> Option<String> {
    payload
        .get("room")
        .or_else(|| payload.get("requestId"))
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}
