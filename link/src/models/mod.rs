//! Data models for live-link.
//!
//! Request/response descriptors, notifications, and the option structs
//! for connections and rooms.

pub mod connection_options;
pub mod connection_state;
pub mod error_detail;
pub mod notification;
pub mod query_options;
pub mod query_request;
pub mod query_response;
pub mod room_options;


pub use connection_options::{ConnectionOptions, OfflineMode, DEFAULT_PORT};
pub use connection_state::ConnectionState;
pub use error_detail::ErrorDetail;
pub use notification::{Notification, NotificationMessage};
pub use query_options::QueryOptions;
pub use query_request::QueryRequest;
pub use query_response::QueryResponse;
pub use room_options::{DocumentState, RoomOptions, Scope, UsersScope};
