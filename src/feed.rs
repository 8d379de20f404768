//! Feed controller.
//!
//! An [`SseFeed`] owns one long-lived HTTP response and exactly one background
//! read task that parses the body into events and fans them out to matching
//! subscriptions. The feed is `Open` until the first of: an explicit
//! [`close`](SseFeed::close), the handle being dropped, or a fatal stream
//! error; the transition is one-way and performed by exactly one caller.

use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::FeedError;
use crate::events::SseEvent;
use crate::parser::{LineBuffer, SseParser};
use crate::queue::{EventQueue, OverflowPolicy, PushOutcome};
use crate::registry::{Registry, SubscriberEntry};
use crate::subscription::Subscription;

/// Configuration for an SSE feed connection.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Extra request headers. `Accept: text/event-stream` is added unless the
    /// caller set their own.
    pub headers: HeaderMap,
    /// Capacity of each subscriber's delivery queue.
    pub queue_capacity: usize,
    /// Default overflow policy for `subscribe`; `subscribe_with` overrides it
    /// per subscription.
    pub overflow: OverflowPolicy,
    /// Source of subscription ids. Must produce process-wide-unique strings.
    pub id_source: fn() -> String,
}

fn uuid_id() -> String {
    Uuid::new_v4().to_string()
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            queue_capacity: 100,
            overflow: OverflowPolicy::DropOldest,
            id_source: uuid_id,
        }
    }
}

/// Shared feed state: the registry (which also holds the closed flag) and the
/// stop signal for the read task.
#[derive(Debug)]
pub(crate) struct FeedInner {
    registry: Registry,
    stop_tx: watch::Sender<bool>,
    config: FeedConfig,
}

impl FeedInner {
    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Clean close. The winning caller signals the read task and drains every
    /// subscription; later callers are no-ops.
    fn close(&self) {
        if self.registry.shutdown(None) {
            info!("SSE feed closed");
            let _ = self.stop_tx.send(true);
        }
    }

    /// Fatal-error close. Delivers `err` to every subscriber's error channel
    /// before draining.
    fn fail(&self, err: FeedError) {
        warn!(error = %err, "SSE stream terminated");
        if self.registry.shutdown(Some(err)) {
            let _ = self.stop_tx.send(true);
        }
    }
}

/// Handle to a connected SSE feed.
///
/// Cloneable via subscriptions only; the handle itself owns the feed's
/// lifetime and closes it on drop.
#[derive(Debug)]
pub struct SseFeed {
    inner: Arc<FeedInner>,
}

impl SseFeed {
    /// Connect to an SSE endpoint with the default configuration.
    pub async fn connect(url: &str) -> Result<Self, FeedError> {
        Self::connect_with(url, FeedConfig::default()).await
    }

    /// Connect to an SSE endpoint.
    ///
    /// Performs a GET with the configured headers, requires a 200 response,
    /// and spawns the background read task. Any failure here returns
    /// synchronously; no feed is created.
    pub async fn connect_with(url: &str, config: FeedConfig) -> Result<Self, FeedError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| FeedError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let mut headers = config.headers.clone();
        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        }

        let response = Client::new()
            .get(parsed)
            .headers(headers)
            .send()
            .await
            .map_err(|e| FeedError::ConnectionFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(FeedError::UnexpectedStatus { status, message });
        }

        info!(%url, "SSE feed connected");

        let (stop_tx, stop_rx) = watch::channel(false);
        let inner = Arc::new(FeedInner {
            registry: Registry::new(),
            stop_tx,
            config,
        });

        tokio::spawn(run_read_loop(inner.clone(), response, stop_rx));

        Ok(Self { inner })
    }

    /// Register a subscriber with the feed's default overflow policy.
    ///
    /// An empty `event_type` matches every event; otherwise only events whose
    /// type equals `event_type` are delivered. Returns [`FeedError::Closed`]
    /// once the feed is closed.
    pub fn subscribe(&self, event_type: &str) -> Result<Subscription, FeedError> {
        self.subscribe_with(event_type, self.inner.config.overflow)
    }

    /// Register a subscriber with its own overflow policy.
    pub fn subscribe_with(
        &self,
        event_type: &str,
        policy: OverflowPolicy,
    ) -> Result<Subscription, FeedError> {
        let id = (self.inner.config.id_source)();
        let queue = Arc::new(EventQueue::new(self.inner.config.queue_capacity));
        let (error_tx, error_rx) = mpsc::channel(1);

        self.inner.registry.add(
            id.clone(),
            SubscriberEntry {
                event_type: event_type.to_string(),
                queue: queue.clone(),
                error_tx,
                policy,
            },
        )?;

        Ok(Subscription::new(
            id,
            event_type.to_string(),
            queue,
            error_rx,
            self.inner.clone(),
        ))
    }

    /// Whether the feed has closed (explicitly, by drop, or by a fatal
    /// stream error).
    pub fn is_closed(&self) -> bool {
        self.inner.registry.is_closed()
    }

    /// Close the feed: stop the read task and complete every subscription's
    /// delivery stream. Idempotent, and safe to call concurrently with the
    /// read task's own error path.
    pub fn close(&self) {
        self.inner.close();
    }
}

impl Drop for SseFeed {
    fn drop(&mut self) {
        self.inner.close();
    }
}

/// The feed's single background read task.
///
/// The parser and line buffer are locals here; the read task is their only
/// owner, so no lock guards them. Exiting the loop drops the response body,
/// which releases the connection.
async fn run_read_loop(
    inner: Arc<FeedInner>,
    response: reqwest::Response,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut body = response.bytes_stream();
    let mut lines = LineBuffer::new();
    let mut parser = SseParser::new();

    loop {
        tokio::select! {
            _ = stop_rx.changed() => {
                debug!("stop signal received, ending read loop");
                break;
            }
            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => {
                    for line in lines.push_chunk(&bytes) {
                        if let Some(event) = parser.feed_line(&line) {
                            dispatch(&inner, event).await;
                        }
                    }
                }
                Some(Err(e)) => {
                    inner.fail(FeedError::ConnectionLost {
                        message: e.to_string(),
                    });
                    break;
                }
                None => {
                    // Flush a final unterminated line before reporting EOF.
                    if let Some(line) = lines.take_remaining() {
                        if let Some(event) = parser.feed_line(&line) {
                            dispatch(&inner, event).await;
                        }
                    }
                    inner.fail(FeedError::StreamClosed);
                    break;
                }
            }
        }
    }
}

/// Deliver one event to every matching subscriber's queue.
///
/// Enqueueing happens outside the registry lock and never waits on one
/// subscriber for the sake of another; losses are resolved by each
/// subscriber's own overflow policy.
async fn dispatch(inner: &FeedInner, event: SseEvent) {
    debug!(id = %event.id, event_type = %event.event_type, "dispatching event");
    for (sub_id, queue, policy) in inner.registry.snapshot_matching(&event.event_type) {
        match queue.push(event.clone(), policy).await {
            PushOutcome::Queued => {}
            PushOutcome::Dropped => {
                warn!(
                    subscription = %sub_id,
                    event_type = %event.event_type,
                    "delivery queue full, event dropped"
                );
            }
            PushOutcome::Closed => {}
        }
    }
}
