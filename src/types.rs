//! Core types for the broadcast engine.

use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for an event.
///
/// Assigned by the event log in arrival order and never reused, even after
/// the event has been evicted. Serialized as a string.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(pub u64);

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for EventId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        // A clock before the epoch is clamped rather than treated as fatal.
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Which output stream of the producer a line came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStream {
    #[default]
    Stdout,
    Stderr,
}

/// Where an event was read from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// A followed file.
    File(PathBuf),
    /// A socket listener port.
    Port(u16),
}

/// A single ingested log entry. Immutable once created.
#[derive(Clone, Debug, Serialize)]
pub struct Event {
    /// Unique identifier (assigned by the log).
    pub id: EventId,

    /// Producer stream.
    #[serde(rename = "log_type")]
    pub stream: LogStream,

    /// Raw line as received.
    pub content: String,

    /// Parsed form of `content`, present when the line was structured.
    pub json_content: Option<serde_json::Value>,

    /// Whether `json_content` is the authoritative payload.
    pub is_json: bool,

    /// Ingestion time (assigned by the log).
    #[serde(rename = "ts")]
    pub timestamp: Timestamp,

    pub origin: Option<Origin>,
}

/// Input for creating a new event (before id/timestamp assigned).
#[derive(Clone, Debug)]
pub struct EventInput {
    pub stream: LogStream,
    pub content: String,
    pub json_content: Option<serde_json::Value>,
    pub origin: Option<Origin>,
}

impl EventInput {
    /// Create an input from a raw line.
    ///
    /// Lines that parse as a JSON object or array keep the parsed value and
    /// are flagged as structured; anything else is plain text.
    pub fn line(content: impl Into<String>) -> Self {
        let content = content.into();
        let json_content = match serde_json::from_str::<serde_json::Value>(content.trim()) {
            Ok(value) if value.is_object() || value.is_array() => Some(value),
            _ => None,
        };
        Self {
            stream: LogStream::Stdout,
            content,
            json_content,
            origin: None,
        }
    }

    /// Create an input from an already structured payload.
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            stream: LogStream::Stdout,
            content: value.to_string(),
            json_content: Some(value),
            origin: None,
        }
    }

    /// Mark the line as coming from stderr (or any other stream).
    pub fn with_stream(mut self, stream: LogStream) -> Self {
        self.stream = stream;
        self
    }

    /// Attach an origin descriptor.
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn is_json(&self) -> bool {
        self.json_content.is_some()
    }

    /// Seal the input into an event.
    pub(crate) fn into_event(self, id: EventId, timestamp: Timestamp) -> Event {
        let is_json = self.is_json();
        Event {
            id,
            stream: self.stream,
            content: self.content,
            json_content: self.json_content,
            is_json,
            timestamp,
            origin: self.origin,
        }
    }
}

/// Process-wide ingestion statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastStats {
    /// Total events ever ingested (evicted ones included).
    pub count: u64,
    pub first_event_at: Option<Timestamp>,
    pub last_event_at: Option<Timestamp>,
}

impl BroadcastStats {
    pub(crate) fn record(&mut self, at: Timestamp) {
        if self.first_event_at.is_none() {
            self.first_event_at = Some(at);
        }
        self.count += 1;
        self.last_event_at = Some(at);
    }
}
