//! Main live-link client with builder pattern.
//!
//! The client owns the realtime connection, the subscription registry and
//! the notification router, and hands out [`Room`]s bound to them.

use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use serde_json::{json, Map, Value as JsonValue};

use crate::{
    connection::{QueueFilter, RealtimeConnection, RealtimeDriver, WebSocketDriver},
    error::{LiveLinkError, Result},
    event_handlers::{EventHandlers, LoginAttempt},
    headers::{add_headers, set_headers},
    models::{
        ConnectionOptions, ConnectionState, QueryOptions, QueryRequest, QueryResponse, RoomOptions,
    },
    query::QueryDispatcher,
    subscription::{
        NotificationCallback, NotificationRouter, Room, SubscriptionContext, SubscriptionRegistry,
    },
};

/// Main live-link client.
///
/// Use [`LiveLinkClientBuilder`] to construct instances with custom configuration.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use live_link::{LiveLinkClient, Notification, RoomOptions};
/// use serde_json::json;
///
/// # async fn example() -> live_link::Result<()> {
/// let client = LiveLinkClient::builder()
///     .host("localhost")
///     .port(7512)
///     .build()?;
/// client.connect();
///
/// let room = client.subscribe(
///     "shop",
///     "orders",
///     json!({"equals": {"status": "paid"}}),
///     RoomOptions::default(),
///     Arc::new(|notification: live_link::Result<Notification>| println!("{:?}", notification)),
/// )?;
/// println!("{} subscribers", room.count_async().await?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LiveLinkClient {
    connection: Arc<RealtimeConnection>,
    registry: Arc<SubscriptionRegistry>,
    router: Arc<NotificationRouter>,
    headers: Arc<Mutex<Map<String, JsonValue>>>,
}

impl LiveLinkClient {
    /// Create a new builder for configuring the client
    pub fn builder() -> LiveLinkClientBuilder {
        LiveLinkClientBuilder::new()
    }

    /// Open the connection. Progress is reported through the event handlers.
    pub fn connect(&self) {
        self.connection.connect();
    }

    /// Close the connection and forget every subscription.
    ///
    /// Rooms are reset: they lose their server room id and queued
    /// operations, keep their filters and callback, and must be renewed
    /// after the next `connect`.
    pub fn disconnect(&self) {
        self.connection.disconnect();
        let rooms = self.registry.clear();
        debug!("[live-link] Resetting {} room(s) after disconnect", rooms.len());
        for room in rooms {
            room.reset();
        }
        self.router.clear();
    }

    pub fn is_ready(&self) -> bool {
        self.connection.is_ready()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection(&self) -> &Arc<RealtimeConnection> {
        &self.connection
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &Arc<NotificationRouter> {
        &self.router
    }

    /// Execute a request, adding the client headers.
    ///
    /// Responses carrying an error resolve to [`LiveLinkError::ServerError`].
    pub async fn query(
        &self,
        mut request: QueryRequest,
        options: QueryOptions,
    ) -> Result<QueryResponse> {
        add_headers(&mut request, &self.headers.lock());
        self.connection.query(request, options).await
    }

    /// Create a room without subscribing it yet. Call [`Room::renew`] to
    /// subscribe.
    pub fn room(
        &self,
        index: impl Into<String>,
        collection: impl Into<String>,
        options: RoomOptions,
    ) -> Room {
        let dispatcher: Arc<dyn QueryDispatcher> = self.connection.clone();
        let ctx = SubscriptionContext::new(dispatcher, self.registry.clone(), self.router.clone());
        Room::new(ctx, index, collection, options, self.headers.lock().clone())
    }

    /// Create a room and subscribe it with `filters`.
    pub fn subscribe(
        &self,
        index: impl Into<String>,
        collection: impl Into<String>,
        filters: JsonValue,
        options: RoomOptions,
        callback: NotificationCallback,
    ) -> Result<Room> {
        let room = self.room(index, collection, options);
        room.renew(Some(filters), Some(callback))?;
        Ok(room)
    }

    /// Merge `content` into the client headers, or replace them when
    /// `replace` is set. Rooms created afterwards start with these headers.
    pub fn set_headers(&self, content: JsonValue, replace: bool) -> Result<()> {
        set_headers(&mut self.headers.lock(), content, replace)
    }

    pub fn headers(&self) -> Map<String, JsonValue> {
        self.headers.lock().clone()
    }

    /// Authenticate with `strategy` and keep the returned token for
    /// subsequent requests.
    ///
    /// Login requests are never queued. Every attempt fires the
    /// `login_attempt` event.
    pub async fn login(
        &self,
        strategy: &str,
        credentials: JsonValue,
        expires_in: Option<&str>,
    ) -> Result<String> {
        if strategy.is_empty() {
            return Err(LiveLinkError::UsageError("login: strategy is required".to_string()));
        }

        let mut request = QueryRequest::new("auth", "login")
            .with_arg("strategy", json!(strategy))
            .with_body(credentials);
        if let Some(expires_in) = expires_in {
            request = request.with_arg("expiresIn", json!(expires_in));
        }

        let outcome = self
            .query(request, QueryOptions::new().with_queuable(false))
            .await
            .and_then(|response| {
                response
                    .result
                    .get("jwt")
                    .and_then(JsonValue::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        LiveLinkError::InternalError("login response without a jwt".to_string())
                    })
            });

        match outcome {
            Ok(jwt) => {
                debug!("[live-link] Logged in with strategy '{}'", strategy);
                self.connection.set_jwt(Some(jwt.clone()));
                self.connection.emit_login_attempt(LoginAttempt::succeeded());
                Ok(jwt)
            },
            Err(e) => {
                self.connection.emit_login_attempt(LoginAttempt::failed(e.to_string()));
                Err(e)
            },
        }
    }

    /// Invalidate the current token on the server and forget it.
    pub async fn logout(&self) -> Result<()> {
        self.query(
            QueryRequest::new("auth", "logout"),
            QueryOptions::new().with_queuable(false),
        )
        .await?;
        self.connection.set_jwt(None);
        Ok(())
    }

    pub fn jwt(&self) -> Option<String> {
        self.connection.jwt()
    }
}

/// Builder for configuring [`LiveLinkClient`] instances.
pub struct LiveLinkClientBuilder {
    connection_options: ConnectionOptions,
    driver: Option<Arc<dyn RealtimeDriver>>,
    event_handlers: EventHandlers,
    headers: Map<String, JsonValue>,
    queue_filter: Option<QueueFilter>,
}

impl LiveLinkClientBuilder {
    fn new() -> Self {
        Self {
            connection_options: ConnectionOptions::default(),
            driver: None,
            event_handlers: EventHandlers::default(),
            headers: Map::new(),
            queue_filter: None,
        }
    }

    /// Set the server host name
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.connection_options.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.connection_options.port = port;
        self
    }

    /// Use `wss://` instead of `ws://`
    pub fn ssl(mut self, ssl: bool) -> Self {
        self.connection_options.ssl = ssl;
        self
    }

    /// Set connection options (reconnection, offline queue)
    ///
    /// Replaces any host/port/ssl set earlier on the builder.
    ///
    /// # Example
    ///
    /// ```rust
    /// use live_link::{ConnectionOptions, LiveLinkClient, OfflineMode};
    ///
    /// let client = LiveLinkClient::builder()
    ///     .connection_options(
    ///         ConnectionOptions::new("localhost")
    ///             .with_offline_mode(OfflineMode::Auto)
    ///             .with_reconnection_delay_ms(500),
    ///     )
    ///     .build()
    ///     .unwrap();
    /// assert!(!client.is_ready());
    /// ```
    pub fn connection_options(mut self, options: ConnectionOptions) -> Self {
        self.connection_options = options;
        self
    }

    /// Replace the default WebSocket transport
    pub fn driver(mut self, driver: Arc<dyn RealtimeDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    /// Set connection lifecycle event handlers
    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.event_handlers = handlers;
        self
    }

    /// Add a header copied into every request
    pub fn header(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.headers.insert(key.into(), value);
        self
    }

    pub fn headers(mut self, headers: Map<String, JsonValue>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Restrict which requests may enter the offline queue
    pub fn queue_filter(
        mut self,
        filter: impl Fn(&QueryRequest) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.queue_filter = Some(Arc::new(filter));
        self
    }

    /// Build the client
    pub fn build(self) -> Result<LiveLinkClient> {
        if self.connection_options.host.is_empty() {
            return Err(LiveLinkError::ConfigurationError("host is required".into()));
        }

        let driver = self
            .driver
            .unwrap_or_else(|| Arc::new(WebSocketDriver::new()) as Arc<dyn RealtimeDriver>);
        let registry = Arc::new(SubscriptionRegistry::new());
        let router = Arc::new(NotificationRouter::new());
        let connection = RealtimeConnection::new(
            self.connection_options,
            driver,
            self.event_handlers,
            router.clone(),
            registry.clone(),
        );
        connection.set_queue_filter(self.queue_filter);

        Ok(LiveLinkClient {
            connection,
            registry,
            router,
            headers: Arc::new(Mutex::new(self.headers)),
        })
    }
}
