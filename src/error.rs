//! Feed error types.
//!
//! Errors fall into three groups: connection establishment (returned
//! synchronously from `connect`, no feed is created), stream errors (fatal,
//! fanned out once to every subscriber's error channel), and subscribe-after-
//! close. Malformed protocol lines are never errors; the parser is permissive.

use thiserror::Error;

/// Errors produced by an SSE feed.
///
/// `Clone` so a single fatal stream error can be delivered to every
/// subscriber's error channel.
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// The URL passed to `connect` could not be parsed.
    #[error("invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// The HTTP request failed before a response was received.
    #[error("connection to {url} failed: {message}")]
    ConnectionFailed { url: String, message: String },

    /// The server answered with a status other than 200.
    #[error("server returned status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// The stream failed mid-read.
    #[error("stream connection lost: {message}")]
    ConnectionLost { message: String },

    /// The server ended the stream. Clean EOF is terminal for a feed that was
    /// never told to stop, so it surfaces on the error channel.
    #[error("stream closed by server")]
    StreamClosed,

    /// The feed is closed; no new subscriptions are accepted.
    #[error("feed is closed")]
    Closed,
}

impl FeedError {
    /// True for errors raised while establishing the connection, before any
    /// feed existed.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            FeedError::InvalidUrl { .. }
                | FeedError::ConnectionFailed { .. }
                | FeedError::UnexpectedStatus { .. }
        )
    }

    /// True for fatal errors on an established stream.
    pub fn is_stream_error(&self) -> bool {
        matches!(
            self,
            FeedError::ConnectionLost { .. } | FeedError::StreamClosed
        )
    }
}
