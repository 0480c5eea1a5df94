//! Requests buffered while the connection is down.

use std::collections::VecDeque;
use std::time::Duration;

use log::warn;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::{
    error::{LiveLinkError, Result},
    models::{QueryRequest, QueryResponse},
};

/// A buffered request and the channel its eventual response goes to.
pub(crate) struct QueuedRequest {
    pub request: QueryRequest,
    pub enqueued_at: Instant,
    pub responder: oneshot::Sender<Result<QueryResponse>>,
}

impl QueuedRequest {
    pub(crate) fn new(
        request: QueryRequest,
        responder: oneshot::Sender<Result<QueryResponse>>,
    ) -> Self {
        Self {
            request,
            enqueued_at: Instant::now(),
            responder,
        }
    }

    fn discard(self, reason: &str) {
        warn!(
            "[live-link] Discarding queued request {}/{} ({:?}): {}",
            self.request.controller, self.request.action, self.request.request_id, reason
        );
        let _ = self.responder.send(Err(LiveLinkError::Discarded(reason.to_string())));
    }
}

/// FIFO of [`QueuedRequest`]s bounded by age and size.
pub(crate) struct OfflineQueue {
    entries: VecDeque<QueuedRequest>,
    /// `None` keeps requests forever
    ttl: Option<Duration>,
    /// 0 means unbounded
    max_size: usize,
}

impl OfflineQueue {
    pub(crate) fn new(ttl: Option<Duration>, max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            ttl,
            max_size,
        }
    }

    /// Append `entry`, evicting expired entries and then the oldest ones
    /// beyond the size limit. Returns the number of evicted entries.
    pub(crate) fn push(&mut self, entry: QueuedRequest) -> usize {
        self.entries.push_back(entry);
        let mut evicted = self.evict_expired();
        if self.max_size > 0 {
            while self.entries.len() > self.max_size {
                if let Some(oldest) = self.entries.pop_front() {
                    oldest.discard("offline queue is full");
                    evicted += 1;
                }
            }
        }
        evicted
    }

    /// Oldest request that has not expired yet.
    pub(crate) fn pop_front(&mut self) -> Option<QueuedRequest> {
        self.evict_expired();
        self.entries.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every buffered request.
    pub(crate) fn flush(&mut self) -> usize {
        let count = self.entries.len();
        for entry in self.entries.drain(..) {
            entry.discard("offline queue flushed");
        }
        count
    }

    fn evict_expired(&mut self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let now = Instant::now();
        let mut evicted = 0;
        while let Some(front) = self.entries.front() {
            if now.duration_since(front.enqueued_at) <= ttl {
                break;
            }
            if let Some(expired) = self.entries.pop_front() {
                expired.discard("request expired in the offline queue");
                evicted += 1;
            }
        }
        evicted
    }
}
