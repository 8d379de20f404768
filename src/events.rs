//! SSE event model.
//!
//! One `SseEvent` is produced per completed record on the wire. Events are
//! plain immutable values; dispatch clones them per subscriber, so a delivered
//! event is never shared or mutated after the fact.

use serde::{Deserialize, Serialize};

/// A single parsed Server-Sent Event.
///
/// Fields the record did not carry are empty strings. An empty `event_type`
/// is a valid (anonymous) event and matches only unfiltered subscribers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseEvent {
    /// Value of the last `id:` line in the record.
    pub id: String,
    /// Value of the last `event:` line in the record.
    #[serde(rename = "event")]
    pub event_type: String,
    /// Value of the last `data:` line in the record.
    pub data: String,
}

impl SseEvent {
    /// Construct an event from its three fields.
    pub fn new(
        id: impl Into<String>,
        event_type: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            data: data.into(),
        }
    }
}
