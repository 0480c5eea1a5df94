use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default server port.
pub const DEFAULT_PORT: u16 = 7512;

/// How the offline queue is managed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfflineMode {
    /// The application starts/stops queuing and replays the queue itself
    #[default]
    Manual,
    /// Queue while disconnected and replay on (re)connect.
    /// Only effective together with `auto_reconnect`.
    Auto,
}

/// Connection-level options for the realtime client.
///
/// These options control:
/// - Which server to reach
/// - Automatic reconnection after network errors (fixed delay)
/// - Offline queuing and replay of requests issued while disconnected
///
/// Separate from [`RoomOptions`](super::RoomOptions) which control
/// individual subscriptions.
///
/// # Example
///
/// ```rust
/// use live_link::{ConnectionOptions, OfflineMode};
///
/// let options = ConnectionOptions::new("localhost")
///     .with_port(7512)
///     .with_auto_reconnect(true)
///     .with_reconnection_delay_ms(2000)
///     .with_offline_mode(OfflineMode::Auto);
/// assert!(options.auto_queue_enabled());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Server host name or IP
    pub host: String,

    /// Server port. Default: 7512
    #[serde(default = "default_port")]
    pub port: u16,

    /// Use a TLS socket (`wss://`). Default: false
    #[serde(default)]
    pub ssl: bool,

    /// Reconnect automatically after a network error. Default: true
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,

    /// Fixed delay between a network error and the next connection attempt.
    /// Default: 1000ms
    #[serde(default = "default_reconnection_delay_ms")]
    pub reconnection_delay_ms: u64,

    /// Offline queue management. Default: manual
    #[serde(default)]
    pub offline_mode: OfflineMode,

    /// Start queuing as soon as the connection is not ready. Default: false
    #[serde(default)]
    pub auto_queue: bool,

    /// Replay the offline queue once connected. Default: false
    #[serde(default)]
    pub auto_replay: bool,

    /// Renew every registered room after a reconnection. Default: true
    #[serde(default = "default_true")]
    pub auto_resubscribe: bool,

    /// Maximum age of a queued request in milliseconds; older requests are
    /// discarded. 0 disables the limit. Default: 120000ms
    #[serde(default = "default_queue_ttl_ms")]
    pub queue_ttl_ms: u64,

    /// Maximum number of queued requests; the oldest is discarded when full.
    /// 0 disables the limit. Default: 500
    #[serde(default = "default_queue_max_size")]
    pub queue_max_size: usize,

    /// Delay between two replayed requests. Default: 10ms
    #[serde(default = "default_replay_interval_ms")]
    pub replay_interval_ms: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

fn default_reconnection_delay_ms() -> u64 {
    1000
}

fn default_queue_ttl_ms() -> u64 {
    120_000
}

fn default_queue_max_size() -> usize {
    500
}

fn default_replay_interval_ms() -> u64 {
    10
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            ssl: false,
            auto_reconnect: true,
            reconnection_delay_ms: 1000,
            offline_mode: OfflineMode::Manual,
            auto_queue: false,
            auto_replay: false,
            auto_resubscribe: true,
            queue_ttl_ms: 120_000,
            queue_max_size: 500,
            replay_interval_ms: 10,
        }
    }
}

impl ConnectionOptions {
    /// Create options targeting `host` with every other value defaulted
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    /// Set whether to reconnect automatically after a network error
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the fixed reconnection delay (in milliseconds)
    pub fn with_reconnection_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnection_delay_ms = delay_ms;
        self
    }

    pub fn with_offline_mode(mut self, mode: OfflineMode) -> Self {
        self.offline_mode = mode;
        self
    }

    pub fn with_auto_queue(mut self, enabled: bool) -> Self {
        self.auto_queue = enabled;
        self
    }

    pub fn with_auto_replay(mut self, enabled: bool) -> Self {
        self.auto_replay = enabled;
        self
    }

    pub fn with_auto_resubscribe(mut self, enabled: bool) -> Self {
        self.auto_resubscribe = enabled;
        self
    }

    pub fn with_queue_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.queue_ttl_ms = ttl_ms;
        self
    }

    pub fn with_queue_max_size(mut self, max_size: usize) -> Self {
        self.queue_max_size = max_size;
        self
    }

    pub fn with_replay_interval_ms(mut self, interval_ms: u64) -> Self {
        self.replay_interval_ms = interval_ms;
        self
    }

    /// Whether queuing starts automatically when the connection is not ready
    pub fn auto_queue_enabled(&self) -> bool {
        self.auto_queue || (self.offline_mode == OfflineMode::Auto && self.auto_reconnect)
    }

    /// Whether the offline queue is replayed automatically once connected
    pub fn auto_replay_enabled(&self) -> bool {
        self.auto_replay || (self.offline_mode == OfflineMode::Auto && self.auto_reconnect)
    }

    pub fn reconnection_delay(&self) -> Duration {
        Duration::from_millis(self.reconnection_delay_ms)
    }

    pub fn replay_interval(&self) -> Duration {
        Duration::from_millis(self.replay_interval_ms)
    }

    /// Queue TTL, `None` when unlimited
    pub fn queue_ttl(&self) -> Option<Duration> {
        (self.queue_ttl_ms > 0).then(|| Duration::from_millis(self.queue_ttl_ms))
    }

    /// `ws://host:port` or `wss://host:port`
    pub fn ws_url(&self) -> String {
        let scheme = if self.ssl { "wss" } else { "ws" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}
