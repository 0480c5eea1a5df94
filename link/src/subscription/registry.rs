//! Client-wide bookkeeping shared by every room.
//!
//! Tracks which local rooms are bound to which server room id, which rooms
//! have a subscription in flight, and the ids of requests this client issued
//! recently (used to recognize notifications caused by our own actions).

use std::collections::HashMap;
use std::time::Duration;

use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::room::Room;

/// Outcome of [`SubscriptionRegistry::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomRelease {
    /// The room was not registered under that server room id.
    NotRegistered,
    /// Other local rooms still share the server room.
    Shared { remaining: usize },
    /// The last local subscriber left. `pending_empty` tells whether a
    /// server-side unsubscribe may be sent right away.
    Last { pending_empty: bool },
}

#[derive(Default)]
struct RegistryInner {
    /// server room id -> local room id -> room
    rooms: HashMap<String, HashMap<String, Room>>,
    /// local room id -> room with a subscribe request in flight
    pending: HashMap<String, Room>,
    /// request id -> time the request was issued
    request_history: HashMap<String, Instant>,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: Mutex<RegistryInner>,
    pending_drained: Notify,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_pending(&self, room: &Room) {
        self.inner
            .lock()
            .pending
            .insert(room.id().to_string(), room.clone());
    }

    /// Resolve an in-flight subscription.
    ///
    /// On success the room is registered under its server room id before it
    /// leaves the pending set, so a concurrent release never observes a state
    /// where the room is in neither.
    pub(crate) fn settle_pending(&self, room_id: &str, registered: Option<(&str, &Room)>) {
        let drained = {
            let mut inner = self.inner.lock();
            if let Some((server_room_id, room)) = registered {
                inner
                    .rooms
                    .entry(server_room_id.to_string())
                    .or_default()
                    .insert(room_id.to_string(), room.clone());
            }
            inner.pending.remove(room_id);
            inner.pending.is_empty()
        };
        if drained {
            self.pending_drained.notify_waiters();
        }
    }

    /// Remove a local room from the server room it was bound to.
    pub(crate) fn release(&self, server_room_id: &str, room_id: &str) -> RoomRelease {
        release_locked(&mut self.inner.lock(), server_room_id, room_id)
    }

    /// Release `room` from `server_room_id` and mark it pending, under one
    /// lock. The returned `pending_empty` does not count `room` itself, and no
    /// concurrent release can observe the room in neither set.
    pub(crate) fn release_into_pending(&self, server_room_id: &str, room: &Room) -> RoomRelease {
        let mut inner = self.inner.lock();
        let release = release_locked(&mut inner, server_room_id, room.id());
        inner.pending.insert(room.id().to_string(), room.clone());
        release
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_pending(&self, room_id: &str) -> bool {
        self.inner.lock().pending.contains_key(room_id)
    }

    /// Number of distinct server rooms with at least one local subscriber.
    pub fn room_count(&self) -> usize {
        self.inner.lock().rooms.len()
    }

    /// Number of local rooms bound to `server_room_id`.
    pub fn subscribers(&self, server_room_id: &str) -> usize {
        self.inner
            .lock()
            .rooms
            .get(server_room_id)
            .map_or(0, HashMap::len)
    }

    pub fn contains_room(&self, server_room_id: &str) -> bool {
        self.inner.lock().rooms.contains_key(server_room_id)
    }

    /// Wait until no subscription is in flight.
    pub(crate) async fn wait_pending_drained(&self) {
        loop {
            let notified = self.pending_drained.notified();
            tokio::pin!(notified);
            // Register before checking so a drain between the check and the
            // await is not missed.
            notified.as_mut().enable();
            if self.inner.lock().pending.is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Remember that this client issued `request_id`.
    pub fn record_request(&self, request_id: &str) {
        self.inner
            .lock()
            .request_history
            .insert(request_id.to_string(), Instant::now());
    }

    /// Remove `request_id` from the history. Returns whether it was there.
    pub fn consume_request(&self, request_id: &str) -> bool {
        self.inner.lock().request_history.remove(request_id).is_some()
    }

    pub fn request_history_len(&self) -> usize {
        self.inner.lock().request_history.len()
    }

    /// Drop history entries older than `max_age`. Returns how many were dropped.
    pub(crate) fn prune_request_history(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let before = inner.request_history.len();
        inner
            .request_history
            .retain(|_, issued_at| now.duration_since(*issued_at) <= max_age);
        before - inner.request_history.len()
    }

    /// Snapshot of every registered room.
    pub fn rooms(&self) -> Vec<Room> {
        self.inner
            .lock()
            .rooms
            .values()
            .flat_map(|subscribers| subscribers.values().cloned())
            .collect()
    }

    /// Re-subscribe every registered room, e.g. after a reconnection.
    pub(crate) fn renew_all(&self) {
        let rooms = self.rooms();
        debug!("[live-link] Renewing {} subscription(s)", rooms.len());
        for room in rooms {
            if let Err(e) = room.renew(None, None) {
                warn!("[live-link] Failed to renew room {}: {}", room.id(), e);
            }
        }
    }

    /// Forget every room and in-flight subscription. Returns the rooms that
    /// were forgotten so the caller can reset them.
    pub(crate) fn clear(&self) -> Vec<Room> {
        let forgotten = {
            let mut inner = self.inner.lock();
            inner.request_history.clear();
            let mut forgotten: Vec<Room> = inner.pending.drain().map(|(_, room)| room).collect();
            forgotten.extend(
                inner
                    .rooms
                    .drain()
                    .flat_map(|(_, subscribers)| subscribers.into_values()),
            );
            forgotten
        };
        self.pending_drained.notify_waiters();
        forgotten
    }
}

fn release_locked(inner: &mut RegistryInner, server_room_id: &str, room_id: &str) -> RoomRelease {
    let Some(subscribers) = inner.rooms.get_mut(server_room_id) else {
        return RoomRelease::NotRegistered;
    };
    if subscribers.remove(room_id).is_none() {
        return RoomRelease::NotRegistered;
    }
    if !subscribers.is_empty() {
        return RoomRelease::Shared {
            remaining: subscribers.len(),
        };
    }
    inner.rooms.remove(server_room_id);
    RoomRelease::Last {
        pending_empty: inner.pending.is_empty(),
    }
}
