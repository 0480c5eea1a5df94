//! # live-link
//!
//! Resilient real-time client core.
//!
//! live-link keeps a connection to a real-time server alive and lets
//! applications hold filter-based subscriptions ("rooms") over it:
//!
//! - **Connection**: a transport state machine with automatic reconnection
//!   after network errors and an offline queue replayed once connected again
//! - **Rooms**: subscriptions whose operations never race each other on the
//!   wire; anything requested while a subscription is in flight runs, in
//!   order, once it settles
//! - **Notifications**: routed by channel, with notifications caused by this
//!   client's own requests filtered out unless asked for
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use live_link::{EventHandlers, LiveLinkClient, Notification, RoomOptions};
//! use serde_json::json;
//!
//! # async fn example() -> live_link::Result<()> {
//! let client = LiveLinkClient::builder()
//!     .host("localhost")
//!     .event_handlers(
//!         EventHandlers::new()
//!             .on_reconnect(|| println!("back online"))
//!             .on_network_error(|e| eprintln!("{}", e)),
//!     )
//!     .build()?;
//! client.connect();
//!
//! let room = client.subscribe(
//!     "shop",
//!     "orders",
//!     json!({}),
//!     RoomOptions::default().with_subscribe_to_self(true),
//!     Arc::new(|notification: live_link::Result<Notification>| println!("{:?}", notification)),
//! )?;
//! room.unsubscribe();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod error;
pub mod event_handlers;
pub mod headers;
pub mod models;
pub mod query;
pub mod subscription;

pub use client::{LiveLinkClient, LiveLinkClientBuilder};
pub use connection::{
    DriverEvent, DriverEventSender, QueueFilter, RealtimeConnection, RealtimeDriver,
    WebSocketDriver,
};
pub use error::{LiveLinkError, Result, TransportError};
pub use event_handlers::{EventHandlers, LoginAttempt};
pub use models::{
    ConnectionOptions, ConnectionState, DocumentState, ErrorDetail, Notification,
    NotificationMessage, OfflineMode, QueryOptions, QueryRequest, QueryResponse, RoomOptions,
    Scope, UsersScope, DEFAULT_PORT,
};
pub use query::{QueryDispatcher, ResponseFuture};
pub use subscription::{
    CountCallback, NotificationCallback, NotificationRouter, Room, RoomRelease, RoomStatus,
    SubscriptionContext, SubscriptionRegistry,
};
