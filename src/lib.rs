//! ssefeed - async Server-Sent Events client with filtered fan-out.
//!
//! Connect to an SSE endpoint, then register any number of independent
//! subscribers, each filtered by event type (or unfiltered). Each subscriber
//! gets its own bounded delivery queue with an explicit overflow policy, so a
//! slow consumer never stalls the stream or the other subscribers.
//!
//! ```ignore
//! use ssefeed::SseFeed;
//!
//! let feed = SseFeed::connect("https://example.com/events").await?;
//! let mut greetings = feed.subscribe("greeting")?;
//!
//! while let Some(event) = greetings.recv().await {
//!     println!("{}: {}", event.id, event.data);
//! }
//! if let Some(err) = greetings.recv_error().await {
//!     eprintln!("stream failed: {}", err);
//! }
//! ```
//!
//! Logging goes through the `tracing` facade; install whatever subscriber the
//! application wants. This crate never touches global logger state.

pub mod error;
pub mod events;
pub mod feed;
pub mod parser;
pub mod subscription;

mod queue;
mod registry;

/// Re-exported so callers can build [`FeedConfig`] headers against the same
/// `reqwest` version this crate links.
pub use reqwest;

pub use error::FeedError;
pub use events::SseEvent;
pub use feed::{FeedConfig, SseFeed};
pub use parser::{LineBuffer, SseParser};
pub use queue::OverflowPolicy;
pub use subscription::Subscription;
