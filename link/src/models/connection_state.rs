use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Never connected, or intentionally disconnected
    #[default]
    Idle,
    /// Driver is opening the socket
    Connecting,
    /// Socket open, requests are sent immediately
    Connected,
    /// Socket lost after a network error
    Offline,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Offline => "offline",
        };
        f.write_str(s)
    }
}
