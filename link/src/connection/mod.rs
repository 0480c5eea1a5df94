//! Realtime connection management.
//!
//! This module contains:
//! - [`driver`]: the transport seam ([`RealtimeDriver`], [`DriverEvent`])
//! - [`websocket`]: the default WebSocket driver
//! - [`RealtimeConnection`]: the transport state machine. It reacts to
//!   driver events, reconnects after network errors, buffers requests while
//!   offline and correlates responses with the requests that caused them.

pub mod driver;
mod offline_queue;
pub mod websocket;

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::FutureExt;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub use driver::{DriverEvent, DriverEventSender, RealtimeDriver};
pub use websocket::WebSocketDriver;

use crate::{
    error::{LiveLinkError, TransportError},
    event_handlers::{EventHandlers, LoginAttempt},
    models::{ConnectionOptions, ConnectionState, QueryOptions, QueryRequest, QueryResponse},
    query::{QueryDispatcher, ResponseFuture},
    subscription::{NotificationRouter, SubscriptionRegistry},
};
use offline_queue::{OfflineQueue, QueuedRequest};

/// Request history entries older than this can no longer match an echo.
const REQUEST_HISTORY_MAX_AGE: Duration = Duration::from_secs(10);

const REQUEST_HISTORY_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Decides whether a request may enter the offline queue.
pub type QueueFilter = Arc<dyn Fn(&QueryRequest) -> bool + Send + Sync>;

#[derive(Default)]
struct ConnectionInner {
    state: ConnectionState,
    was_connected: bool,
    retrying: bool,
    stop_retrying_to_connect: bool,
    queuing: bool,
    jwt: Option<String>,
    pump: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
    replay: Option<JoinHandle<()>>,
    history_sweeper: Option<JoinHandle<()>>,
}

/// Transport state machine shared by the client and its rooms.
///
/// State changes are driven by the [`RealtimeDriver`] through
/// [`client_connected`](Self::client_connected),
/// [`client_disconnected`](Self::client_disconnected) and
/// [`client_network_error`](Self::client_network_error). A network error
/// schedules a single reconnection attempt after
/// `reconnection_delay_ms`; further errors while it is pending schedule
/// nothing.
pub struct RealtimeConnection {
    options: ConnectionOptions,
    driver: Arc<dyn RealtimeDriver>,
    handlers: EventHandlers,
    router: Arc<NotificationRouter>,
    registry: Arc<SubscriptionRegistry>,
    inner: Mutex<ConnectionInner>,
    queue: Mutex<OfflineQueue>,
    queue_filter: Mutex<Option<QueueFilter>>,
    weak_self: Weak<RealtimeConnection>,
}

impl RealtimeConnection {
    pub fn new(
        options: ConnectionOptions,
        driver: Arc<dyn RealtimeDriver>,
        handlers: EventHandlers,
        router: Arc<NotificationRouter>,
        registry: Arc<SubscriptionRegistry>,
    ) -> Arc<Self> {
        let queue = OfflineQueue::new(options.queue_ttl(), options.queue_max_size);
        Arc::new_cyclic(|weak_self| Self {
            options,
            driver,
            handlers,
            router,
            registry,
            inner: Mutex::new(ConnectionInner::default()),
            queue: Mutex::new(queue),
            queue_filter: Mutex::new(None),
            weak_self: weak_self.clone(),
        })
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Whether a reconnection attempt is scheduled.
    pub fn is_retrying(&self) -> bool {
        self.inner.lock().retrying
    }

    pub fn was_connected(&self) -> bool {
        self.inner.lock().was_connected
    }

    /// Ask the driver to open the connection.
    ///
    /// Returns immediately; the outcome arrives as a `connect` or
    /// `network_error` event.
    pub fn connect(&self) {
        let (tx, mut rx) = mpsc::unbounded_channel::<DriverEvent>();
        {
            let mut inner = self.inner.lock();
            inner.state = ConnectionState::Connecting;
            if self.options.auto_queue_enabled() {
                inner.queuing = true;
            }

            // Events of a previous driver session are dropped with its pump
            if let Some(pump) = inner.pump.take() {
                pump.abort();
            }
            let weak = self.weak_self.clone();
            inner.pump = Some(tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    let Some(connection) = weak.upgrade() else {
                        break;
                    };
                    connection.handle_driver_event(event);
                }
            }));

            if inner.history_sweeper.is_none() {
                inner.history_sweeper = Some(self.spawn_history_sweeper());
            }
        }

        info!("[live-link] Connecting to {}", self.options.ws_url());
        self.driver
            .open(&self.options.host, self.options.port, self.options.ssl, tx);
    }

    /// Close the connection for good: no reconnection is attempted, pending
    /// responses fail with `NotConnected`.
    pub fn disconnect(&self) {
        let (was_connected, tasks) = {
            let mut inner = self.inner.lock();
            inner.stop_retrying_to_connect = true;
            inner.retrying = false;
            let was_connected = inner.state == ConnectionState::Connected;
            inner.state = ConnectionState::Idle;
            let tasks = [
                inner.pump.take(),
                inner.reconnect_timer.take(),
                inner.replay.take(),
            ];
            (was_connected, tasks)
        };
        for task in tasks.into_iter().flatten() {
            task.abort();
        }

        self.driver.close();
        let cancelled = self.router.cancel_responses();
        info!(
            "[live-link] Disconnected ({} pending response(s) cancelled)",
            cancelled
        );
        if was_connected {
            self.handlers.emit_disconnect();
        }
    }

    fn handle_driver_event(&self, event: DriverEvent) {
        match event {
            DriverEvent::Connected => self.client_connected(),
            DriverEvent::Disconnected => self.client_disconnected(),
            DriverEvent::NetworkError(message) => self.client_network_error(&message),
            DriverEvent::Message { channel, payload } => {
                self.handlers.emit_receive(&payload.to_string());
                self.router.dispatch(&channel, payload);
            },
        }
    }

    /// The driver established the connection.
    pub fn client_connected(&self) {
        let reconnected = {
            let mut inner = self.inner.lock();
            inner.state = ConnectionState::Connected;
            let reconnected = inner.was_connected;
            inner.was_connected = true;
            inner.stop_retrying_to_connect = false;
            if self.options.auto_queue_enabled() {
                inner.queuing = false;
            }
            reconnected
        };

        if reconnected {
            info!("[live-link] Reconnected to {}:{}", self.options.host, self.options.port);
            self.handlers.emit_reconnect();
        } else {
            info!("[live-link] Connected to {}:{}", self.options.host, self.options.port);
            self.handlers.emit_connect();
        }

        if self.options.auto_replay_enabled() {
            self.play_queue();
        }
        if reconnected && self.options.auto_resubscribe {
            self.registry.renew_all();
        }
    }

    /// The driver closed the connection cleanly.
    pub fn client_disconnected(&self) {
        info!("[live-link] Connection closed by the server");
        self.handlers.emit_disconnect();
    }

    /// The driver failed to connect or lost the connection.
    pub fn client_network_error(&self, message: &str) {
        let schedule_reconnect = {
            let mut inner = self.inner.lock();
            inner.state = ConnectionState::Offline;
            if self.options.auto_queue_enabled() {
                inner.queuing = true;
            }
            let schedule = self.options.auto_reconnect
                && !inner.retrying
                && !inner.stop_retrying_to_connect;
            if schedule {
                inner.retrying = true;
            }
            schedule
        };

        self.router.cancel_responses();
        let error = TransportError::new(self.options.host.clone(), self.options.port, message);
        warn!("[live-link] {}", error);
        self.handlers.emit_network_error(error);

        if !schedule_reconnect {
            self.handlers.emit_disconnect();
            return;
        }

        let delay = self.options.reconnection_delay();
        debug!("[live-link] Reconnecting in {:?}", delay);
        let weak = self.weak_self.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(connection) = weak.upgrade() else {
                return;
            };
            connection.inner.lock().retrying = false;
            connection.connect();
        });
        self.inner.lock().reconnect_timer = Some(timer);
    }

    /// Buffer queuable requests instead of rejecting them while offline.
    pub fn start_queuing(&self) {
        self.inner.lock().queuing = true;
    }

    pub fn stop_queuing(&self) {
        self.inner.lock().queuing = false;
    }

    pub fn is_queuing(&self) -> bool {
        self.inner.lock().queuing
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Discard every buffered request. Their callers get `Discarded`.
    pub fn flush_queue(&self) -> usize {
        self.queue.lock().flush()
    }

    /// Restrict which requests may be buffered. `None` accepts all.
    pub fn set_queue_filter(&self, filter: Option<QueueFilter>) {
        *self.queue_filter.lock() = filter;
    }

    /// Send buffered requests in order, `replay_interval_ms` apart. Does
    /// nothing unless connected.
    pub fn play_queue(&self) {
        let Some(connection) = self.weak_self.upgrade() else {
            return;
        };
        let mut inner = self.inner.lock();
        if inner.state != ConnectionState::Connected {
            return;
        }
        if inner.replay.as_ref().is_some_and(|replay| !replay.is_finished()) {
            return;
        }
        inner.replay = Some(tokio::spawn(connection.replay_queue()));
    }

    async fn replay_queue(self: Arc<Self>) {
        let interval = self.options.replay_interval();
        loop {
            if !self.is_ready() {
                debug!("[live-link] Connection lost, pausing offline queue replay");
                return;
            }
            let next = self.queue.lock().pop_front();
            let Some(QueuedRequest {
                request, responder, ..
            }) = next
            else {
                return;
            };

            self.handlers.emit_offline_queue_pop(&request);
            let response = self.send_request(request);
            tokio::spawn(async move {
                let _ = responder.send(response.await);
            });
            tokio::time::sleep(interval).await;
        }
    }

    /// Token added as `jwt` to every outgoing request.
    pub fn set_jwt(&self, jwt: Option<String>) {
        self.inner.lock().jwt = jwt;
    }

    pub fn jwt(&self) -> Option<String> {
        self.inner.lock().jwt.clone()
    }

    pub(crate) fn emit_login_attempt(&self, attempt: LoginAttempt) {
        self.handlers.emit_login_attempt(attempt);
    }

    fn queue_accepts(&self, request: &QueryRequest) -> bool {
        self.queue_filter
            .lock()
            .as_ref()
            .map_or(true, |filter| filter(request))
    }

    fn send_request(&self, request: QueryRequest) -> ResponseFuture {
        let request_id = request.request_id.clone().unwrap_or_default();
        let payload = match serde_json::to_string(&request) {
            Ok(payload) => payload,
            Err(e) => return futures_util::future::ready(Err(LiveLinkError::from(e))).boxed(),
        };

        self.registry.record_request(&request_id);
        let response = self.router.expect_response(&request_id);
        self.handlers.emit_send(&payload);
        debug!(
            "[live-link] Sending {}/{} ({})",
            request.controller, request.action, request_id
        );
        if let Err(e) = self.driver.send(payload) {
            self.router.forget_response(&request_id);
            return futures_util::future::ready(Err(e)).boxed();
        }

        async move {
            let payload = response.await.map_err(|_| {
                LiveLinkError::NotConnected(
                    "connection lost before the response arrived".to_string(),
                )
            })?;
            let mut response: QueryResponse = serde_json::from_value(payload)?;
            match response.error.take() {
                Some(error) => Err(LiveLinkError::ServerError(error)),
                None => Ok(response),
            }
        }
        .boxed()
    }

    fn spawn_history_sweeper(&self) -> JoinHandle<()> {
        let registry = Arc::downgrade(&self.registry);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REQUEST_HISTORY_SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let pruned = registry.prune_request_history(REQUEST_HISTORY_MAX_AGE);
                if pruned > 0 {
                    debug!("[live-link] Pruned {} request history entries", pruned);
                }
            }
        })
    }
}

impl QueryDispatcher for RealtimeConnection {
    fn query(&self, mut request: QueryRequest, options: QueryOptions) -> ResponseFuture {
        if request.request_id.is_none() {
            request.request_id = Some(Uuid::new_v4().to_string());
        }
        if request.metadata.is_none() {
            request.metadata = options.metadata.clone();
        }

        let (connected, queuing, jwt) = {
            let inner = self.inner.lock();
            (
                inner.state == ConnectionState::Connected,
                inner.queuing,
                inner.jwt.clone(),
            )
        };
        if let Some(jwt) = jwt {
            request.args.entry("jwt").or_insert_with(|| json!(jwt));
        }

        if connected {
            return self.send_request(request);
        }

        if queuing && options.queuable && self.queue_accepts(&request) {
            debug!(
                "[live-link] Offline, queuing {}/{}",
                request.controller, request.action
            );
            self.handlers.emit_offline_queue_push(&request);
            let (tx, rx) = oneshot::channel();
            self.queue.lock().push(QueuedRequest::new(request, tx));
            return async move {
                rx.await.unwrap_or_else(|_| {
                    Err(LiveLinkError::NotConnected(
                        "offline queue was dropped".to_string(),
                    ))
                })
            }
            .boxed();
        }

        warn!(
            "[live-link] Discarding {}/{}: not connected",
            request.controller, request.action
        );
        self.handlers.emit_discarded(&request);
        let error = LiveLinkError::NotConnected(format!(
            "Unable to execute request {}/{}: not connected",
            request.controller, request.action
        ));
        futures_util::future::ready(Err(error)).boxed()
    }
}

impl Drop for RealtimeConnection {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        for task in [
            inner.pump.take(),
            inner.reconnect_timer.take(),
            inner.replay.take(),
            inner.history_sweeper.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}
