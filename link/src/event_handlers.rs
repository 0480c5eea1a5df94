//! Connection lifecycle event handlers.
//!
//! Provides callback-based hooks for monitoring the realtime connection:
//!
//! - [`on_connect`](EventHandlers::on_connect): first successful connection
//! - [`on_reconnect`](EventHandlers::on_reconnect): connection restored after a loss
//! - [`on_disconnect`](EventHandlers::on_disconnect): connection closed for good
//! - [`on_network_error`](EventHandlers::on_network_error): transport failure
//! - [`on_login_attempt`](EventHandlers::on_login_attempt): result of a login
//! - [`on_offline_queue_push`](EventHandlers::on_offline_queue_push) /
//!   [`on_offline_queue_pop`](EventHandlers::on_offline_queue_pop): offline queue activity
//! - [`on_discarded`](EventHandlers::on_discarded): request dropped while offline
//! - [`on_receive`](EventHandlers::on_receive) / [`on_send`](EventHandlers::on_send):
//!   optional debug hooks for raw traffic
//!
//! # Example
//!
//! ```rust
//! use live_link::EventHandlers;
//!
//! let handlers = EventHandlers::new()
//!     .on_connect(|| println!("Connected!"))
//!     .on_reconnect(|| println!("Back online, replaying queued requests"))
//!     .on_network_error(|error| eprintln!("Network error: {}", error));
//! assert!(handlers.has_any());
//! ```

use std::fmt;
use std::sync::Arc;

use crate::{error::TransportError, models::QueryRequest};

/// Outcome of a login request, passed to the `on_login_attempt` handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttempt {
    pub success: bool,
    /// Error message when the login failed
    pub error: Option<String>,
}

impl LoginAttempt {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Type alias for callbacks without arguments (connect, reconnect, disconnect).
pub type OnLifecycleCallback = Arc<dyn Fn() + Send + Sync>;

/// Type alias for the on_network_error callback.
pub type OnNetworkErrorCallback = Arc<dyn Fn(TransportError) + Send + Sync>;

/// Type alias for the on_login_attempt callback.
pub type OnLoginAttemptCallback = Arc<dyn Fn(LoginAttempt) + Send + Sync>;

/// Type alias for callbacks observing a single request (queue and discard events).
pub type OnRequestCallback = Arc<dyn Fn(&QueryRequest) + Send + Sync>;

/// Type alias for the raw traffic debug hooks.
pub type OnRawMessageCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Connection lifecycle event handlers.
///
/// All handlers are optional. Handlers are `Send + Sync` and are invoked
/// without any internal lock held, so they may call back into the client.
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub(crate) on_connect: Option<OnLifecycleCallback>,
    pub(crate) on_reconnect: Option<OnLifecycleCallback>,
    pub(crate) on_disconnect: Option<OnLifecycleCallback>,
    pub(crate) on_network_error: Option<OnNetworkErrorCallback>,
    pub(crate) on_login_attempt: Option<OnLoginAttemptCallback>,
    pub(crate) on_offline_queue_push: Option<OnRequestCallback>,
    pub(crate) on_offline_queue_pop: Option<OnRequestCallback>,
    pub(crate) on_discarded: Option<OnRequestCallback>,
    pub(crate) on_receive: Option<OnRawMessageCallback>,
    pub(crate) on_send: Option<OnRawMessageCallback>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_reconnect", &self.on_reconnect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_network_error", &self.on_network_error.is_some())
            .field("on_login_attempt", &self.on_login_attempt.is_some())
            .field("on_offline_queue_push", &self.on_offline_queue_push.is_some())
            .field("on_offline_queue_pop", &self.on_offline_queue_pop.is_some())
            .field("on_discarded", &self.on_discarded.is_some())
            .field("on_receive", &self.on_receive.is_some())
            .field("on_send", &self.on_send.is_some())
            .finish()
    }
}

impl EventHandlers {
    /// Create a new empty `EventHandlers` (no callbacks registered).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked on the first successful connection.
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked when the connection is restored after a
    /// previous successful connection. Queued requests are replayed right
    /// after it fires when auto-replay is enabled.
    pub fn on_reconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_reconnect = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked when the connection is closed and no
    /// reconnection is going to be attempted.
    pub fn on_disconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked on transport failures.
    ///
    /// # Example
    /// ```rust
    /// use live_link::EventHandlers;
    ///
    /// let handlers = EventHandlers::new()
    ///     .on_network_error(|err| eprintln!("{}:{} unreachable: {}", err.host, err.port, err.message));
    /// ```
    pub fn on_network_error(mut self, f: impl Fn(TransportError) + Send + Sync + 'static) -> Self {
        self.on_network_error = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked after every login request.
    pub fn on_login_attempt(mut self, f: impl Fn(LoginAttempt) + Send + Sync + 'static) -> Self {
        self.on_login_attempt = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked when a request enters the offline queue.
    pub fn on_offline_queue_push(
        mut self,
        f: impl Fn(&QueryRequest) + Send + Sync + 'static,
    ) -> Self {
        self.on_offline_queue_push = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked when a queued request is replayed.
    pub fn on_offline_queue_pop(
        mut self,
        f: impl Fn(&QueryRequest) + Send + Sync + 'static,
    ) -> Self {
        self.on_offline_queue_pop = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked when a request is dropped because the
    /// connection is down and the request could not be queued.
    pub fn on_discarded(mut self, f: impl Fn(&QueryRequest) + Send + Sync + 'static) -> Self {
        self.on_discarded = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked for every raw message received.
    ///
    /// This is a **debug/tracing hook**. Not needed for normal operation.
    pub fn on_receive(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_receive = Some(Arc::new(f));
        self
    }

    /// Register a callback invoked for every raw message sent.
    ///
    /// This is a **debug/tracing hook**. Not needed for normal operation.
    pub fn on_send(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_send = Some(Arc::new(f));
        self
    }

    /// Returns `true` if any handler is registered.
    pub fn has_any(&self) -> bool {
        self.on_connect.is_some()
            || self.on_reconnect.is_some()
            || self.on_disconnect.is_some()
            || self.on_network_error.is_some()
            || self.on_login_attempt.is_some()
            || self.on_offline_queue_push.is_some()
            || self.on_offline_queue_pop.is_some()
            || self.on_discarded.is_some()
            || self.on_receive.is_some()
            || self.on_send.is_some()
    }

    // ---------------------------------------------------------------
    // Internal dispatch helpers
    // ---------------------------------------------------------------

    pub(crate) fn emit_connect(&self) {
        if let Some(cb) = &self.on_connect {
            cb();
        }
    }

    pub(crate) fn emit_reconnect(&self) {
        if let Some(cb) = &self.on_reconnect {
            cb();
        }
    }

    pub(crate) fn emit_disconnect(&self) {
        if let Some(cb) = &self.on_disconnect {
            cb();
        }
    }

    pub(crate) fn emit_network_error(&self, error: TransportError) {
        if let Some(cb) = &self.on_network_error {
            cb(error);
        }
    }

    pub(crate) fn emit_login_attempt(&self, attempt: LoginAttempt) {
        if let Some(cb) = &self.on_login_attempt {
            cb(attempt);
        }
    }

    pub(crate) fn emit_offline_queue_push(&self, request: &QueryRequest) {
        if let Some(cb) = &self.on_offline_queue_push {
            cb(request);
        }
    }

    pub(crate) fn emit_offline_queue_pop(&self, request: &QueryRequest) {
        if let Some(cb) = &self.on_offline_queue_pop {
            cb(request);
        }
    }

    pub(crate) fn emit_discarded(&self, request: &QueryRequest) {
        if let Some(cb) = &self.on_discarded {
            cb(request);
        }
    }

    pub(crate) fn emit_receive(&self, raw: &str) {
        if let Some(cb) = &self.on_receive {
            cb(raw);
        }
    }

    pub(crate) fn emit_send(&self, raw: &str) {
        if let Some(cb) = &self.on_send {
            cb(raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_empty_handlers_emit_nothing() {
        let handlers = EventHandlers::new();
        assert!(!handlers.has_any());
        handlers.emit_connect();
        handlers.emit_disconnect();
        handlers.emit_network_error(TransportError::new("h", 1, "boom"));
    }

    #[test]
    fn test_lifecycle_callbacks_fire() {
        let connects = Arc::new(AtomicUsize::new(0));
        let reconnects = Arc::new(AtomicUsize::new(0));
        let c = connects.clone();
        let r = reconnects.clone();
        let handlers = EventHandlers::new()
            .on_connect(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .on_reconnect(move || {
                r.fetch_add(1, Ordering::SeqCst);
            });

        handlers.emit_connect();
        handlers.emit_reconnect();
        handlers.emit_reconnect();

        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(reconnects.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_debug_output_lists_registered_handlers() {
        let handlers = EventHandlers::new().on_login_attempt(|_| {});
        let debug = format!("{:?}", handlers);
        assert!(debug.contains("on_login_attempt: true"));
        assert!(debug.contains("on_connect: false"));
    }
}
