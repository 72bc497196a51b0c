//! Count-bounded, append-only event log.

use crate::types::{Event, EventId, EventInput, Timestamp};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Ordered store of the most recent events.
///
/// Insertion order, arrival order and id order are the same thing. When an
/// append would exceed `capacity` the oldest event is dropped first.
///
/// The log does no locking of its own; the broadcaster owns it behind a
/// lock so that appends have a single writer.
#[derive(Debug)]
pub struct EventLog {
    events: VecDeque<Arc<Event>>,

    capacity: usize,

    /// Next event ID to assign. Never rewinds, so evicted ids stay retired.
    next_id: u64,

    /// Number of events dropped to honour `capacity`.
    evicted: u64,
}

impl EventLog {
    /// Create an empty log holding at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            next_id: 1,
            evicted: 0,
        }
    }

    /// Append an event, assigning its id and timestamp.
    pub fn append(&mut self, input: EventInput) -> Arc<Event> {
        let id = EventId(self.next_id);
        self.next_id += 1;

        let event = Arc::new(input.into_event(id, Timestamp::now()));

        if self.events.len() == self.capacity {
            self.events.pop_front();
            if self.evicted == 0 {
                debug!(capacity = self.capacity, "Event log full, evicting oldest events");
            }
            self.evicted += 1;
        }
        self.events.push_back(Arc::clone(&event));

        event
    }

    /// Read up to `count` events starting at 1-based position `from`.
    ///
    /// With `include_from = false` the event at `from` itself is skipped and
    /// reading starts right after it. A `count` of zero means "to the end".
    /// Positions outside the log yield an empty result.
    pub fn slice(&self, from: usize, count: usize, include_from: bool) -> Vec<Arc<Event>> {
        if from == 0 || from > self.events.len() {
            return Vec::new();
        }

        let skip = if include_from { from - 1 } else { from };
        let limit = if count == 0 { usize::MAX } else { count };

        self.events.iter().skip(skip).take(limit).cloned().collect()
    }

    /// All events strictly after the event with `id`.
    ///
    /// An unknown (or evicted) id, or no id at all, is treated as "no
    /// watermark" and returns the whole log.
    pub fn since(&self, id: Option<EventId>) -> Vec<Arc<Event>> {
        let start = id
            .and_then(|id| self.events.iter().rposition(|e| e.id == id))
            .map(|pos| pos + 1)
            .unwrap_or(0);

        self.events.range(start..).cloned().collect()
    }

    /// Events at the given 0-based positions; positions past the end are skipped.
    pub fn peek_at(&self, indices: &[usize]) -> Vec<Arc<Event>> {
        indices
            .iter()
            .filter_map(|&idx| self.events.get(idx).cloned())
            .collect()
    }

    /// The most recent `n` events, oldest first.
    pub fn tail(&self, n: usize) -> Vec<Arc<Event>> {
        let start = self.events.len().saturating_sub(n);
        self.events.range(start..).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Iterate retained events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Event>> {
        self.events.iter()
    }
}
