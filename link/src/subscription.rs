//! Filter-based real-time subscriptions.
//!
//! A [`Room`] is the client-side handle of one subscription. Rooms share
//! three collaborators, bundled in a [`SubscriptionContext`]:
//!
//! - a [`QueryDispatcher`] to reach the server,
//! - the client-wide [`SubscriptionRegistry`] (rooms by server room id,
//!   rooms mid-subscribe, request history for self-notification dedup),
//! - the [`NotificationRouter`] delivering inbound channel messages.

use std::sync::Arc;

use crate::query::QueryDispatcher;

mod registry;
mod room;
mod router;

pub use registry::{RoomRelease, SubscriptionRegistry};
pub use room::{CountCallback, NotificationCallback, Room, RoomStatus};
pub use router::{ChannelListener, ListenerId, NotificationRouter};

/// Collaborators shared by every room of a client.
#[derive(Clone)]
pub struct SubscriptionContext {
    pub dispatcher: Arc<dyn QueryDispatcher>,
    pub registry: Arc<SubscriptionRegistry>,
    pub router: Arc<NotificationRouter>,
}

impl SubscriptionContext {
    pub fn new(
        dispatcher: Arc<dyn QueryDispatcher>,
        registry: Arc<SubscriptionRegistry>,
        router: Arc<NotificationRouter>,
    ) -> Self {
        Self {
            dispatcher,
            registry,
            router,
        }
    }
}
