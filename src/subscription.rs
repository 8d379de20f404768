//! Subscriber-facing subscription handle.

use std::sync::Arc;

use futures_util::stream::{self, Stream};
use tokio::sync::mpsc;

use crate::error::FeedError;
use crate::events::SseEvent;
use crate::feed::FeedInner;
use crate::queue::EventQueue;

/// A registered subscriber on an SSE feed.
///
/// Created by [`SseFeed::subscribe`](crate::SseFeed::subscribe). Exposes the
/// delivery stream ([`recv`](Self::recv)), the error stream
/// ([`recv_error`](Self::recv_error), at most one value ever), and an explicit
/// [`close`](Self::close). Dropping the handle unsubscribes, so an abandoned
/// subscription does not keep accumulating events.
#[derive(Debug)]
pub struct Subscription {
    id: String,
    event_type: String,
    queue: Arc<EventQueue>,
    error_rx: mpsc::Receiver<FeedError>,
    feed: Arc<FeedInner>,
}

impl Subscription {
    pub(crate) fn new(
        id: String,
        event_type: String,
        queue: Arc<EventQueue>,
        error_rx: mpsc::Receiver<FeedError>,
        feed: Arc<FeedInner>,
    ) -> Self {
        Self {
            id,
            event_type,
            queue,
            error_rx,
            feed,
        }
    }

    /// Receive the next event.
    ///
    /// Events arrive in the order they were parsed from the stream. Returns
    /// `None` once the subscription is closed and already-queued events have
    /// been drained.
    pub async fn recv(&mut self) -> Option<SseEvent> {
        self.queue.recv().await
    }

    /// Receive the fatal stream error, if one occurs.
    ///
    /// At most one value is ever produced. Returns `None` when the feed
    /// closed cleanly, or after the single error has been consumed.
    pub async fn recv_error(&mut self) -> Option<FeedError> {
        self.error_rx.recv().await
    }

    /// The event-type filter this subscription was created with. Empty means
    /// every event matches.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Opaque unique identifier of this subscription.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Events lost to this subscriber's overflow policy so far.
    pub fn dropped_events(&self) -> u64 {
        self.queue.dropped()
    }

    /// Unsubscribe from the feed. Other subscriptions and the feed itself are
    /// unaffected. Dropping the handle has the same effect.
    pub fn close(self) {
        // Drop performs the removal.
    }

    /// Convert into a lazy stream of events, finite once the subscription
    /// closes. Fatal errors are not observable through the stream; use
    /// [`recv_error`](Self::recv_error) before converting if they matter.
    pub fn into_stream(self) -> impl Stream<Item = SseEvent> {
        stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|event| (event, sub))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.feed.registry().remove(&self.id);
    }
}
