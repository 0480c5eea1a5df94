//! Channel demultiplexing and notification delivery.
//!
//! Inbound driver messages are keyed by channel. A channel is either a room
//! notification channel (any number of listeners) or the request id of a
//! query waiting for its response (exactly one one-shot waiter, which takes
//! priority).

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use tokio::sync::oneshot;

use super::registry::SubscriptionRegistry;
use super::room::NotificationCallback;
use crate::{
    error::LiveLinkError,
    models::{Notification, NotificationMessage, RoomOptions},
};

/// Listener bound to a notification channel.
pub type ChannelListener = Arc<dyn Fn(JsonValue) + Send + Sync>;

/// Handle returned by [`NotificationRouter::on`], used to detach the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct RouterInner {
    listeners: HashMap<String, Vec<(ListenerId, ChannelListener)>>,
    responses: HashMap<String, oneshot::Sender<JsonValue>>,
    next_id: u64,
}

/// Routes inbound messages to channel listeners and response waiters.
#[derive(Default)]
pub struct NotificationRouter {
    inner: Mutex<RouterInner>,
}

impl NotificationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `listener` to `channel`.
    pub fn on(&self, channel: &str, listener: ChannelListener) -> ListenerId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner
            .listeners
            .entry(channel.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    /// Detach a listener. Returns `false` if it was not bound.
    pub fn off(&self, channel: &str, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let Some(bound) = inner.listeners.get_mut(channel) else {
            return false;
        };
        let before = bound.len();
        bound.retain(|(listener_id, _)| *listener_id != id);
        let removed = bound.len() != before;
        if bound.is_empty() {
            inner.listeners.remove(channel);
        }
        removed
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        self.inner
            .lock()
            .listeners
            .get(channel)
            .map_or(0, Vec::len)
    }

    /// Register a one-shot waiter for the response to `request_id`.
    pub(crate) fn expect_response(&self, request_id: &str) -> oneshot::Receiver<JsonValue> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().responses.insert(request_id.to_string(), tx);
        rx
    }

    pub(crate) fn forget_response(&self, request_id: &str) {
        self.inner.lock().responses.remove(request_id);
    }

    /// Drop every response waiter; their receivers resolve with an error.
    pub(crate) fn cancel_responses(&self) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.responses.len();
        inner.responses.clear();
        count
    }

    /// Deliver `payload` received on `channel`.
    ///
    /// Listeners are invoked without the router lock held, so they may bind
    /// or detach listeners themselves. Returns `false` when nobody was
    /// interested in the channel.
    pub fn dispatch(&self, channel: &str, payload: JsonValue) -> bool {
        let listeners = {
            let mut inner = self.inner.lock();
            if let Some(waiter) = inner.responses.remove(channel) {
                drop(inner);
                let _ = waiter.send(payload);
                return true;
            }
            match inner.listeners.get(channel) {
                Some(bound) => bound.iter().map(|(_, l)| l.clone()).collect::<Vec<_>>(),
                None => Vec::new(),
            }
        };

        if listeners.is_empty() {
            debug!("[live-link] No listener for channel {}", channel);
            return false;
        }
        for listener in listeners {
            listener(payload.clone());
        }
        true
    }

    /// Remove every listener and response waiter.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.listeners.clear();
        inner.responses.clear();
    }
}

/// Per-room delivery switches, copied from the room options.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct NotifierSettings {
    pub subscribe_to_self: bool,
    pub listen_to_connections: bool,
    pub listen_to_disconnections: bool,
}

impl NotifierSettings {
    pub(crate) fn from_options(options: &RoomOptions) -> Self {
        Self {
            subscribe_to_self: options.subscribe_to_self,
            listen_to_connections: options.listen_to_connections,
            listen_to_disconnections: options.listen_to_disconnections,
        }
    }

    fn accepts_presence(&self, notification: &Notification) -> bool {
        match notification.action.as_deref() {
            Some("on") => self.listen_to_connections,
            Some("off") => self.listen_to_disconnections,
            _ => true,
        }
    }
}

/// Deliver one channel message to a room callback.
///
/// Errors are forwarded as-is. A notification echoing a request this client
/// issued itself is delivered only with `subscribe_to_self`, and consumes
/// the request history entry: when several local rooms share the channel,
/// only the first one to see the echo recognizes it as such.
pub(crate) fn deliver_notification(
    payload: JsonValue,
    settings: NotifierSettings,
    registry: &SubscriptionRegistry,
    callback: &NotificationCallback,
) {
    let message: NotificationMessage = match serde_json::from_value(payload) {
        Ok(message) => message,
        Err(e) => {
            callback(Err(LiveLinkError::from(e)));
            return;
        },
    };

    if let Some(error) = message.error {
        callback(Err(LiveLinkError::ServerError(error)));
        return;
    }

    let Some(notification) = message.result else {
        debug!("[live-link] Ignoring notification without result");
        return;
    };

    if notification.is_user_event() && !settings.accepts_presence(&notification) {
        return;
    }

    let is_echo = notification
        .request_id
        .as_deref()
        .is_some_and(|request_id| registry.consume_request(request_id));

    if !is_echo || settings.subscribe_to_self {
        callback(Ok(notification));
    }
}
