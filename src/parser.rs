//! SSE wire-format parsing.
//!
//! Two layers: `LineBuffer` reassembles raw transport chunks into complete
//! lines (chunk boundaries fall anywhere, including inside a `\r\n` pair or a
//! multi-byte character), and `SseParser` accumulates field lines into
//! complete events at each blank-line record terminator.
//!
//! Parsing is permissive: comments (lines starting with `:`) and unrecognized
//! field names are silently ignored, never errors.

use crate::events::SseEvent;

/// The event currently being assembled, between its first field line and the
/// blank line that terminates it.
#[derive(Debug, Default)]
struct PendingEvent {
    id: String,
    event_type: String,
    data: String,
}

impl PendingEvent {
    fn into_event(self) -> SseEvent {
        SseEvent {
            id: self.id,
            event_type: self.event_type,
            data: self.data,
        }
    }
}

/// Stateful line-at-a-time SSE parser.
///
/// Feed it each line (terminator already stripped); it returns a completed
/// [`SseEvent`] whenever a blank line closes a record in progress.
///
/// Recognized fields are `id`, `event`, and `data`. A repeated field within
/// one record overwrites the previous value, including repeated `data:` lines
/// (no multi-line concatenation). Field values are trimmed of leading and
/// trailing space characters only, not general whitespace.
#[derive(Debug, Default)]
pub struct SseParser {
    pending: Option<PendingEvent>,
}

impl SseParser {
    /// Create a parser with no record in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one line and return a completed event if this line closed a
    /// record.
    ///
    /// A blank line with no record in progress is a no-op (stray blank lines
    /// and heartbeats that carried no fields). A line with no colon is a field
    /// name with an empty value. Unknown field names are ignored but still
    /// start a record, so a record made only of unknown fields emits an
    /// all-empty event at its terminator.
    pub fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.pending.take().map(PendingEvent::into_event);
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value),
            None => (line, ""),
        };

        // Empty field name means a comment / keep-alive. Discard without
        // starting a record.
        if field.is_empty() {
            return None;
        }

        let value = value.trim_matches(' ');
        let pending = self.pending.get_or_insert_with(PendingEvent::default);
        match field {
            "id" => pending.id = value.to_string(),
            "event" => pending.event_type = value.to_string(),
            "data" => pending.data = value.to_string(),
            _ => {} // unrecognized field, ignored for forward compatibility
        }

        None
    }

    /// Discard any record in progress.
    pub fn reset(&mut self) {
        self.pending = None;
    }
}

/// Reassembles raw byte chunks into complete lines.
///
/// Splits on `\n`, strips one trailing `\r` per line, and holds a partial
/// line across chunk boundaries. Complete lines are decoded with
/// `from_utf8_lossy`; buffering bytes rather than text keeps a multi-byte
/// character split across chunks intact.
#[derive(Debug, Default)]
pub struct LineBuffer {
    partial: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completed, in order.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.partial.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Take the final unterminated line at end-of-stream, if any.
    pub fn take_remaining(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.partial);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}
