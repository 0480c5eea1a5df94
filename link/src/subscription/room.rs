//! Client-side handle of one filter-based subscription.
//!
//! A room has at most one subscribe-family request outstanding. Operations
//! requested while a subscription is in flight are queued and replayed in
//! call order once it settles; a failed subscription drops the queue.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

use log::{debug, warn};
use parking_lot::Mutex;
use serde_json::{json, Map, Value as JsonValue};
use tokio::sync::oneshot;
use uuid::Uuid;

use super::registry::RoomRelease;
use super::router::{deliver_notification, ChannelListener, ListenerId, NotifierSettings};
use super::SubscriptionContext;
use crate::{
    error::{LiveLinkError, Result},
    headers::{add_headers, set_headers},
    models::{Notification, QueryOptions, QueryRequest, QueryResponse, RoomOptions},
};

/// Receives the notifications (or errors) of a room.
pub type NotificationCallback = Arc<dyn Fn(Result<Notification>) + Send + Sync>;

/// Receives the result of a [`Room::count`] request.
pub type CountCallback = Box<dyn FnOnce(Result<u64>) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomStatus {
    /// Never subscribed, or the last subscription attempt failed.
    #[default]
    Idle,
    /// A subscribe request is in flight.
    Subscribing,
    /// Bound to a server room and receiving notifications.
    Active,
    Unsubscribed,
}

enum Deferred {
    Renew {
        filters: Option<JsonValue>,
        callback: Option<NotificationCallback>,
    },
    Unsubscribe,
    Count(CountCallback),
}

/// Binding removed from a room, to be released from the router and registry.
struct Detached {
    room_id: String,
    channel: Option<String>,
    binding: Option<ListenerId>,
}

struct RoomState {
    status: RoomStatus,
    room_id: Option<String>,
    channel: Option<String>,
    filters: JsonValue,
    headers: Map<String, JsonValue>,
    callback: Option<NotificationCallback>,
    binding: Option<ListenerId>,
    queue: VecDeque<Deferred>,
    /// Set while queued operations are being replayed
    draining: bool,
}

impl RoomState {
    /// Whether an operation must wait in the queue. Replayed operations only
    /// wait for an in-flight subscription; new ones also wait behind the
    /// operations being replayed.
    fn defers(&self, from_queue: bool) -> bool {
        self.status == RoomStatus::Subscribing || (self.draining && !from_queue)
    }

    fn detach(&mut self) -> Option<Detached> {
        let room_id = self.room_id.take()?;
        self.status = RoomStatus::Unsubscribed;
        Some(Detached {
            room_id,
            channel: self.channel.take(),
            binding: self.binding.take(),
        })
    }
}

struct RoomInner {
    id: String,
    index: String,
    collection: String,
    options: RoomOptions,
    settings: NotifierSettings,
    ctx: SubscriptionContext,
    state: Mutex<RoomState>,
}

/// A subscription on `index`/`collection`, matching documents against
/// `filters`.
///
/// Cloning a `Room` yields another handle on the same subscription. Methods
/// return `&Self` so calls can be chained:
///
/// ```rust,ignore
/// room.renew(Some(json!({"equals": {"status": "paid"}})), None)?
///     .count(|total| println!("{:?} subscribers", total));
/// ```
///
/// Requests are issued synchronously; waiting for their answers happens on
/// spawned tokio tasks, so rooms must be driven from within a tokio runtime.
#[derive(Clone)]
pub struct Room {
    inner: Arc<RoomInner>,
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Room")
            .field("id", &self.inner.id)
            .field("index", &self.inner.index)
            .field("collection", &self.inner.collection)
            .field("status", &state.status)
            .field("room_id", &state.room_id)
            .field("channel", &state.channel)
            .field("queued", &state.queue.len())
            .finish()
    }
}

impl Room {
    pub fn new(
        ctx: SubscriptionContext,
        index: impl Into<String>,
        collection: impl Into<String>,
        options: RoomOptions,
        headers: Map<String, JsonValue>,
    ) -> Self {
        let settings = NotifierSettings::from_options(&options);
        Self {
            inner: Arc::new(RoomInner {
                id: Uuid::new_v4().to_string(),
                index: index.into(),
                collection: collection.into(),
                options,
                settings,
                ctx,
                state: Mutex::new(RoomState {
                    status: RoomStatus::Idle,
                    room_id: None,
                    channel: None,
                    filters: json!({}),
                    headers,
                    callback: None,
                    binding: None,
                    queue: VecDeque::new(),
                    draining: false,
                }),
            }),
        }
    }

    /// Local identifier, unique per room object.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn index(&self) -> &str {
        &self.inner.index
    }

    pub fn collection(&self) -> &str {
        &self.inner.collection
    }

    pub fn options(&self) -> &RoomOptions {
        &self.inner.options
    }

    /// Server room id, set while the room is active.
    pub fn room_id(&self) -> Option<String> {
        self.inner.state.lock().room_id.clone()
    }

    /// Notification channel, set while the room is active.
    pub fn channel(&self) -> Option<String> {
        self.inner.state.lock().channel.clone()
    }

    pub fn filters(&self) -> JsonValue {
        self.inner.state.lock().filters.clone()
    }

    pub fn headers(&self) -> Map<String, JsonValue> {
        self.inner.state.lock().headers.clone()
    }

    pub fn status(&self) -> RoomStatus {
        self.inner.state.lock().status
    }

    pub fn is_subscribing(&self) -> bool {
        self.status() == RoomStatus::Subscribing
    }

    /// Number of operations waiting for the in-flight subscription.
    pub fn queued_operations(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Subscribe, or re-subscribe with new filters.
    ///
    /// Any existing binding is released first. `filters` replaces the current
    /// filters when given; `callback` replaces the notification callback when
    /// given, otherwise the previous one is kept. Returns a `UsageError` when
    /// the room has never been given a callback.
    ///
    /// While a subscription is in flight the call is queued and replayed once
    /// it settles.
    pub fn renew(
        &self,
        filters: Option<JsonValue>,
        callback: Option<NotificationCallback>,
    ) -> Result<&Self> {
        self.renew_inner(filters, callback, false)?;
        Ok(self)
    }

    /// Stop receiving notifications.
    ///
    /// Notifications stop immediately. The server is told to drop the
    /// subscription once no other local room shares it and no subscription
    /// of this client is in flight.
    pub fn unsubscribe(&self) -> &Self {
        self.unsubscribe_inner(false);
        self
    }

    /// Ask the server how many subscribers share this room.
    pub fn count<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(Result<u64>) + Send + 'static,
    {
        self.count_inner(Box::new(callback), false);
        self
    }

    /// [`count`](Self::count) as a future.
    pub async fn count_async(&self) -> Result<u64> {
        let (tx, rx) = oneshot::channel();
        self.count(move |result| {
            let _ = tx.send(result);
        });
        rx.await.map_err(|_| {
            LiveLinkError::SubscriptionError(
                "count dropped: the pending subscription failed".to_string(),
            )
        })?
    }

    /// Merge `content` into the room headers, or replace them when `replace`
    /// is set. Headers are copied into every request the room issues.
    pub fn set_headers(&self, content: JsonValue, replace: bool) -> Result<&Self> {
        set_headers(&mut self.inner.state.lock().headers, content, replace)?;
        Ok(self)
    }

    /// Returns `Ok(true)` when a subscribe request was issued, `Ok(false)`
    /// when the call was queued.
    fn renew_inner(
        &self,
        filters: Option<JsonValue>,
        callback: Option<NotificationCallback>,
        from_queue: bool,
    ) -> Result<bool> {
        let (detached, request) = {
            let mut state = self.inner.state.lock();
            if state.defers(from_queue) {
                debug!("[live-link] Room {} busy, queuing renew", self.inner.id);
                state.queue.push_back(Deferred::Renew { filters, callback });
                return Ok(false);
            }

            let Some(callback) = callback.or_else(|| state.callback.clone()) else {
                return Err(LiveLinkError::UsageError(
                    "renew requires a notification callback".to_string(),
                ));
            };

            let detached = state.detach();
            state.status = RoomStatus::Subscribing;
            state.callback = Some(callback);
            if let Some(filters) = filters {
                state.filters = filters;
            }
            (detached, self.subscribe_request(&state))
        };

        let ctx = &self.inner.ctx;
        match detached {
            Some(detached) => {
                self.unbind(&detached);
                let release = ctx.registry.release_into_pending(&detached.room_id, self);
                self.after_release(detached.room_id, release);
            },
            None => ctx.registry.add_pending(self),
        }
        let options = QueryOptions::new().with_metadata(self.inner.options.metadata.clone());
        let response = ctx.dispatcher.query(request, options);

        let room = self.clone();
        tokio::spawn(async move {
            let result = response.await;
            room.on_subscribe_response(result);
        });
        Ok(true)
    }

    fn subscribe_request(&self, state: &RoomState) -> QueryRequest {
        let options = &self.inner.options;
        let mut request = QueryRequest::new("subscribe", "on")
            .with_index(self.inner.index.clone())
            .with_collection(self.inner.collection.clone())
            .with_arg("scope", json!(options.scope.as_str()))
            .with_arg("state", json!(options.state.as_str()))
            .with_arg("users", json!(options.users.as_str()))
            .with_body(state.filters.clone());
        add_headers(&mut request, &state.headers);
        request
    }

    fn on_subscribe_response(&self, result: Result<QueryResponse>) {
        let outcome = result.and_then(|response| match (response.room_id(), response.channel()) {
            (Some(room_id), Some(channel)) => Ok((room_id.to_string(), channel.to_string())),
            _ => Err(LiveLinkError::InternalError(
                "subscribe response is missing roomId or channel".to_string(),
            )),
        });

        let ctx = &self.inner.ctx;
        match outcome {
            Ok((room_id, channel)) => {
                {
                    let mut state = self.inner.state.lock();
                    let weak = Arc::downgrade(&self.inner);
                    let bound_channel = channel.clone();
                    let listener: ChannelListener = Arc::new(move |payload| {
                        Room::notify(&weak, &bound_channel, payload);
                    });
                    state.binding = Some(ctx.router.on(&channel, listener));
                    state.room_id = Some(room_id.clone());
                    state.channel = Some(channel);
                    state.status = RoomStatus::Active;
                    state.draining = !state.queue.is_empty();
                }
                debug!("[live-link] Room {} subscribed to {}", self.inner.id, room_id);
                ctx.registry.settle_pending(&self.inner.id, Some((&room_id, self)));
                self.dequeue();
            },
            Err(e) => {
                ctx.registry.settle_pending(&self.inner.id, None);
                let (callback, dropped) = {
                    let mut state = self.inner.state.lock();
                    state.status = RoomStatus::Idle;
                    state.draining = false;
                    let dropped = state.queue.len();
                    state.queue.clear();
                    (state.callback.clone(), dropped)
                };
                warn!(
                    "[live-link] Subscription of room {} failed ({} queued operation(s) dropped): {}",
                    self.inner.id, dropped, e
                );
                if let Some(callback) = callback {
                    callback(Err(LiveLinkError::SubscriptionError(format!(
                        "Error during subscription: {}",
                        e
                    ))));
                }
            },
        }
    }

    /// Replay queued operations in call order until the queue is empty or a
    /// replayed renew puts the room back in flight.
    fn dequeue(&self) {
        loop {
            let next = {
                let mut state = self.inner.state.lock();
                if state.status == RoomStatus::Subscribing {
                    return;
                }
                match state.queue.pop_front() {
                    Some(operation) => operation,
                    None => {
                        state.draining = false;
                        return;
                    },
                }
            };

            match next {
                Deferred::Renew { filters, callback } => {
                    match self.renew_inner(filters, callback, true) {
                        Ok(true) => return,
                        Ok(false) => {},
                        Err(e) => warn!("[live-link] Queued renew of room {} failed: {}", self.inner.id, e),
                    }
                },
                Deferred::Unsubscribe => self.unsubscribe_inner(true),
                Deferred::Count(callback) => self.count_inner(callback, true),
            }
        }
    }

    fn unsubscribe_inner(&self, from_queue: bool) {
        let detached = {
            let mut state = self.inner.state.lock();
            if state.defers(from_queue) {
                debug!("[live-link] Room {} busy, queuing unsubscribe", self.inner.id);
                state.queue.push_back(Deferred::Unsubscribe);
                return;
            }
            state.detach()
        };

        if let Some(detached) = detached {
            self.release(detached);
        }
    }

    /// Forget the server-side state after the client dropped every
    /// subscription. Queued operations are discarded and the notification
    /// binding is removed; the callback and filters are kept so the room can
    /// be renewed later.
    pub(crate) fn reset(&self) {
        let (detached, dropped) = {
            let mut state = self.inner.state.lock();
            let dropped = state.queue.len();
            state.queue.clear();
            state.draining = false;
            let detached = state.detach();
            if detached.is_none() {
                state.status = RoomStatus::Idle;
            }
            (detached, dropped)
        };
        if let Some(detached) = &detached {
            self.unbind(detached);
        }
        debug!(
            "[live-link] Room {} reset ({} queued operation(s) dropped)",
            self.inner.id, dropped
        );
    }

    /// Drop a binding locally and, for the last local subscriber of the
    /// server room, tell the server.
    fn release(&self, detached: Detached) {
        self.unbind(&detached);
        let release = self.inner.ctx.registry.release(&detached.room_id, &self.inner.id);
        self.after_release(detached.room_id, release);
    }

    fn unbind(&self, detached: &Detached) {
        if let (Some(channel), Some(binding)) = (&detached.channel, detached.binding) {
            self.inner.ctx.router.off(channel, binding);
        }
    }

    fn after_release(&self, room_id: String, release: RoomRelease) {
        let ctx = &self.inner.ctx;
        match release {
            RoomRelease::NotRegistered => {
                debug!("[live-link] Room {} was not registered under {}", self.inner.id, room_id);
            },
            RoomRelease::Shared { remaining } => {
                debug!(
                    "[live-link] Room {} left {}, {} local subscriber(s) remain",
                    self.inner.id, room_id, remaining
                );
            },
            RoomRelease::Last { pending_empty } => {
                let request = self.unsubscribe_request(&room_id);
                if pending_empty {
                    send_unsubscribe(ctx, request);
                    return;
                }

                debug!(
                    "[live-link] Unsubscribe from {} waits for pending subscriptions",
                    room_id
                );
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    ctx.registry.wait_pending_drained().await;
                    if ctx.registry.contains_room(&room_id) {
                        debug!("[live-link] Room {} was subscribed again, keeping it", room_id);
                        return;
                    }
                    send_unsubscribe(&ctx, request);
                });
            },
        }
    }

    fn unsubscribe_request(&self, room_id: &str) -> QueryRequest {
        let mut request =
            QueryRequest::new("subscribe", "off").with_body(json!({ "roomId": room_id }));
        add_headers(&mut request, &self.inner.state.lock().headers);
        request
    }

    fn count_inner(&self, callback: CountCallback, from_queue: bool) {
        let request = {
            let mut state = self.inner.state.lock();
            if state.defers(from_queue) {
                debug!("[live-link] Room {} busy, queuing count", self.inner.id);
                state.queue.push_back(Deferred::Count(callback));
                return;
            }
            let mut request = QueryRequest::new("subscribe", "count")
                .with_body(json!({ "roomId": state.room_id }));
            add_headers(&mut request, &state.headers);
            request
        };

        let response = self.inner.ctx.dispatcher.query(request, QueryOptions::new());
        tokio::spawn(async move {
            let result = response.await.and_then(|response| {
                response.count().ok_or_else(|| {
                    LiveLinkError::InternalError("count response without a count".to_string())
                })
            });
            callback(result);
        });
    }

    fn notify(weak: &Weak<RoomInner>, channel: &str, payload: JsonValue) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let callback = {
            let state = inner.state.lock();
            // A listener detached while a message was being dispatched
            if state.binding.is_none() || state.channel.as_deref() != Some(channel) {
                return;
            }
            state.callback.clone()
        };
        if let Some(callback) = callback {
            deliver_notification(payload, inner.settings, &inner.ctx.registry, &callback);
        }
    }
}

fn send_unsubscribe(ctx: &SubscriptionContext, request: QueryRequest) {
    debug!("[live-link] Sending unsubscribe {:?}", request.body);
    let response = ctx.dispatcher.query(request, QueryOptions::new());
    tokio::spawn(async move {
        if let Err(e) = response.await {
            warn!("[live-link] Unsubscribe failed: {}", e);
        }
    });
}
