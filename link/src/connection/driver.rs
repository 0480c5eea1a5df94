//! Transport driver seam.
//!
//! A driver owns the socket. The connection tells it when to open, what to
//! send and when to close; the driver reports back through [`DriverEvent`]s.

use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

use crate::error::Result;

/// Something that happened on the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    /// The socket is open and ready to carry requests.
    Connected,
    /// The socket was closed cleanly. No reconnection is attempted.
    Disconnected,
    /// The socket could not be opened or was lost.
    NetworkError(String),
    /// Inbound message. `channel` is either a notification channel or the
    /// request id of the query being answered.
    Message { channel: String, payload: JsonValue },
}

pub type DriverEventSender = mpsc::UnboundedSender<DriverEvent>;

/// Network transport used by [`RealtimeConnection`](super::RealtimeConnection).
pub trait RealtimeDriver: Send + Sync + 'static {
    /// Start opening a connection. Completion (or failure) is reported
    /// through `events`; events from a previous `open` must no longer be
    /// sent once this is called.
    fn open(&self, host: &str, port: u16, ssl: bool, events: DriverEventSender);

    /// Write a serialized request to the socket.
    fn send(&self, payload: String) -> Result<()>;

    /// Close the socket without reporting a network error.
    fn close(&self);
}
