//! Per-subscriber bounded delivery queue.
//!
//! Each subscription owns one `EventQueue`; the feed's read task is its only
//! producer and the subscription handle its only consumer. The queue never
//! blocks dispatch on another subscriber: when it is full, the subscriber's
//! [`OverflowPolicy`] decides which event to lose (or how long to wait for
//! space) and a drop counter records the loss.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

use crate::events::SseEvent;

/// What to do when a subscriber's queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the oldest queued event to make room; the subscriber keeps the
    /// most recent events.
    DropOldest,
    /// Discard the incoming event; the subscriber keeps the earliest events.
    DropNewest,
    /// Wait up to the given duration for the consumer to make room, then
    /// discard the incoming event.
    Block(Duration),
}

/// Outcome of a push, for dispatch logging.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    /// The event was queued.
    Queued,
    /// The event (or an older one, under `DropOldest`) was lost to overflow.
    Dropped,
    /// The queue is closed; the event was discarded silently.
    Closed,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<SseEvent>,
    closed: bool,
}

/// Bounded single-producer single-consumer event queue.
///
/// `close` wakes both sides; the consumer drains whatever is still queued and
/// then observes end-of-stream.
#[derive(Debug)]
pub(crate) struct EventQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    /// Signaled when an item is queued or the queue closes.
    consumer_wakeup: Notify,
    /// Signaled when an item is consumed or the queue closes.
    producer_wakeup: Notify,
    dropped: AtomicU64,
}

impl EventQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            capacity: capacity.max(1),
            consumer_wakeup: Notify::new(),
            producer_wakeup: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue an event, resolving overflow per `policy`.
    ///
    /// Never waits on anything except the queue's own consumer, and only
    /// under `Block`, bounded by that policy's timeout.
    pub(crate) async fn push(&self, event: SseEvent, policy: OverflowPolicy) -> PushOutcome {
        let deadline = match policy {
            OverflowPolicy::Block(timeout) => Some(tokio::time::Instant::now() + timeout),
            _ => None,
        };

        loop {
            // The wakeup future must exist before the state check so a
            // notify between unlock and await is not lost.
            let space = self.producer_wakeup.notified();
            {
                let mut state = self.state.lock().unwrap();
                if state.closed {
                    return PushOutcome::Closed;
                }
                if state.items.len() < self.capacity {
                    state.items.push_back(event);
                    self.consumer_wakeup.notify_one();
                    return PushOutcome::Queued;
                }
                match policy {
                    OverflowPolicy::DropOldest => {
                        state.items.pop_front();
                        state.items.push_back(event);
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        self.consumer_wakeup.notify_one();
                        return PushOutcome::Dropped;
                    }
                    OverflowPolicy::DropNewest => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        return PushOutcome::Dropped;
                    }
                    OverflowPolicy::Block(_) => {}
                }
            }

            let deadline = deadline.unwrap();
            if tokio::time::timeout_at(deadline, space).await.is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return PushOutcome::Dropped;
            }
        }
    }

    /// Receive the next event, waiting if the queue is empty.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub(crate) async fn recv(&self) -> Option<SseEvent> {
        loop {
            let available = self.consumer_wakeup.notified();
            {
                let mut state = self.state.lock().unwrap();
                if let Some(event) = state.items.pop_front() {
                    self.producer_wakeup.notify_one();
                    return Some(event);
                }
                if state.closed {
                    return None;
                }
            }
            available.await;
        }
    }

    /// Close the queue. Queued events remain receivable; further pushes are
    /// discarded. Idempotent.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.consumer_wakeup.notify_waiters();
        self.producer_wakeup.notify_waiters();
        // Stored permits for a waiter that arrives after the flag is set.
        self.consumer_wakeup.notify_one();
        self.producer_wakeup.notify_one();
    }

    /// Events lost to the overflow policy so far.
    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(n: u32) -> SseEvent {
        SseEvent::new(n.to_string(), "test", format!("payload-{}", n))
    }

    #[tokio::test]
    async fn test_push_recv_preserves_order() {
        let queue = EventQueue::new(4);
        for n in 0..3 {
            assert_eq!(
                queue.push(event(n), OverflowPolicy::DropOldest).await,
                PushOutcome::Queued
            );
        }
        for n in 0..3 {
            assert_eq!(queue.recv().await, Some(event(n)));
        }
    }

    #[tokio::test]
    async fn test_drop_oldest_keeps_most_recent() {
        let queue = EventQueue::new(2);
        for n in 0..5 {
            queue.push(event(n), OverflowPolicy::DropOldest).await;
        }
        assert_eq!(queue.recv().await, Some(event(3)));
        assert_eq!(queue.recv().await, Some(event(4)));
        assert_eq!(queue.dropped(), 3);
    }

    #[tokio::test]
    async fn test_drop_newest_keeps_earliest() {
        let queue = EventQueue::new(2);
        for n in 0..5 {
            queue.push(event(n), OverflowPolicy::DropNewest).await;
        }
        assert_eq!(queue.recv().await, Some(event(0)));
        assert_eq!(queue.recv().await, Some(event(1)));
        assert_eq!(queue.dropped(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_times_out_and_drops() {
        let queue = EventQueue::new(1);
        let policy = OverflowPolicy::Block(Duration::from_millis(50));
        assert_eq!(queue.push(event(0), policy).await, PushOutcome::Queued);
        assert_eq!(queue.push(event(1), policy).await, PushOutcome::Dropped);
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.recv().await, Some(event(0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_proceeds_when_consumer_makes_room() {
        let queue = std::sync::Arc::new(EventQueue::new(1));
        let policy = OverflowPolicy::Block(Duration::from_secs(5));
        queue.push(event(0), policy).await;

        let producer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.push(event(1), policy).await })
        };
        tokio::task::yield_now().await;

        assert_eq!(queue.recv().await, Some(event(0)));
        assert_eq!(producer.await.unwrap(), PushOutcome::Queued);
        assert_eq!(queue.recv().await, Some(event(1)));
        assert_eq!(queue.dropped(), 0);
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let queue = EventQueue::new(4);
        queue.push(event(0), OverflowPolicy::DropOldest).await;
        queue.push(event(1), OverflowPolicy::DropOldest).await;
        queue.close();
        assert_eq!(queue.recv().await, Some(event(0)));
        assert_eq!(queue.recv().await, Some(event(1)));
        assert_eq!(queue.recv().await, None);
        assert_eq!(queue.recv().await, None);
    }

    #[tokio::test]
    async fn test_push_after_close_discarded() {
        let queue = EventQueue::new(4);
        queue.close();
        assert_eq!(
            queue.push(event(0), OverflowPolicy::DropOldest).await,
            PushOutcome::Closed
        );
        assert_eq!(queue.recv().await, None);
    }

    #[tokio::test]
    async fn test_close_wakes_waiting_consumer() {
        let queue = std::sync::Arc::new(EventQueue::new(1));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.recv().await })
        };
        tokio::task::yield_now().await;
        queue.close();
        assert_eq!(consumer.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_capacity_clamped_to_one() {
        let queue = EventQueue::new(0);
        assert_eq!(
            queue.push(event(0), OverflowPolicy::DropNewest).await,
            PushOutcome::Queued
        );
    }
}
