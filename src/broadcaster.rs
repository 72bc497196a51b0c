//! Broadcaster tying the event log and the subscriber registry together.

use crate::config::BroadcastConfig;
use crate::error::Result;
use crate::events::EventLog;
use crate::intake::{self, IntakeHandle, Producer};
use crate::subscribers::{
    Connection, Delivery, DeliveryMode, FlushScheduler, Subscriber, SubscriberId,
    SubscriberSnapshot,
};
use crate::types::{BroadcastStats, Event, EventInput};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Fans ingested events out to every connected subscriber.
///
/// Provides a unified interface for:
/// - Ingesting events into the bounded log (single writer)
/// - Joining and closing subscribers
/// - Pausing, resuming and historical loads per subscriber
/// - Read-only log lookups and statistics
///
/// Administrative calls on an unknown subscriber id do nothing.
pub struct Broadcaster {
    config: BroadcastConfig,

    /// Event log. The write lock is held for the whole of an ingest,
    /// fan-out included, which serializes producers.
    log: RwLock<EventLog>,

    /// Connected subscribers by ID.
    subscribers: RwLock<HashMap<SubscriberId, Arc<Subscriber>>>,

    /// Counter for generating subscriber IDs.
    next_id: AtomicU64,

    /// Shared with every subscriber for the `status` field of batches.
    stats: Arc<RwLock<BroadcastStats>>,
}

impl Broadcaster {
    /// Create a broadcaster after validating `config`.
    pub fn new(config: BroadcastConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            log: RwLock::new(EventLog::new(config.max_event_count)),
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            stats: Arc::new(RwLock::new(BroadcastStats::default())),
            config,
        })
    }

    pub fn config(&self) -> &BroadcastConfig {
        &self.config
    }

    // --- Ingestion ---

    /// Append an event to the log and queue it for every following subscriber.
    ///
    /// Never waits on a delivery channel; only on each subscriber's
    /// short-held state lock.
    pub fn ingest(&self, input: EventInput) -> Arc<Event> {
        let mut log = self.log.write();
        let event = log.append(input);
        self.stats.write().record(event.timestamp);

        let subscribers = self.subscribers.read();
        let mut queued = 0;
        for subscriber in subscribers.values() {
            if subscriber.ingest(Arc::clone(&event)) {
                queued += 1;
            }
        }

        trace!(id = %event.id, queued, "Ingested event");
        event
    }

    /// Spawn the ingestion thread and return a producer handle for it.
    pub fn start_intake(self: &Arc<Self>) -> Result<(Producer, IntakeHandle)> {
        intake::spawn(Arc::clone(self), self.config.intake_capacity)
    }

    // --- Subscriber lifecycle ---

    /// Join with the configured tail length.
    pub fn join(&self) -> Result<Connection> {
        self.join_with_tail(self.config.join_tail_len)
    }

    /// Register a subscriber seeded with the last `tail_len` events.
    ///
    /// The first payload on the returned connection is `ClientJoined`; the
    /// tail follows on the next flush.
    pub fn join_with_tail(&self, tail_len: usize) -> Result<Connection> {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (subscriber, receiver) = Subscriber::new(id, &self.config, Arc::clone(&self.stats));
        let subscriber = Arc::new(subscriber);

        subscriber.try_send(Delivery::ClientJoined { client_id: id });

        let scheduler =
            FlushScheduler::spawn(Arc::clone(&subscriber), self.config.flush_interval())?;
        subscriber.attach_scheduler(scheduler);

        // Seeding and registering under the log lock leaves no gap and no
        // overlap between the tail and live traffic.
        let seeded = {
            let log = self.log.read();
            let tail = log.tail(tail_len);
            let seeded = tail.len();
            subscriber.seed(tail);
            self.subscribers.write().insert(id, subscriber);
            seeded
        };

        debug!(subscriber = %id, seeded, connected = self.connected(), "Subscriber joined");
        Ok(Connection { id, receiver })
    }

    /// Remove a subscriber and stop its flusher. Unknown ids are ignored.
    pub fn close(&self, id: SubscriberId) {
        let removed = self.subscribers.write().remove(&id);

        if let Some(subscriber) = removed {
            subscriber.close();
            debug!(subscriber = %id, connected = self.connected(), "Subscriber closed");
        }
    }

    /// Close every subscriber.
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.subscribers.write().drain().collect();
        for (_, subscriber) in &drained {
            subscriber.close();
        }
        if !drained.is_empty() {
            debug!(closed = drained.len(), "Broadcaster shut down");
        }
    }

    // --- Delivery control ---

    /// Stop live delivery and wait until the pending batch has been flushed.
    pub fn pause(&self, id: SubscriberId) {
        let Some(subscriber) = self.get(id) else {
            return;
        };

        subscriber.pause();
        subscriber.wait_for_drain();
        debug!(subscriber = %id, "Subscriber paused");
    }

    /// Return to live delivery.
    ///
    /// With `since_cursor`, every retained event after the subscriber's
    /// cursor is replayed first, closing the gap left by the pause. Without
    /// it, events ingested while stopped are skipped for good.
    pub fn resume(&self, id: SubscriberId, since_cursor: bool) {
        let Some(subscriber) = self.get(id) else {
            return;
        };

        let replayed = subscriber.replay(
            &self.log,
            |log, state| {
                // Already following: the live path holds everything after the cursor.
                if since_cursor && state.mode == DeliveryMode::Stopped {
                    log.since(state.cursor)
                } else {
                    Vec::new()
                }
            },
            Some(DeliveryMode::Following),
            true,
        );

        debug!(subscriber = %id, since_cursor, replayed, "Subscriber resumed");
    }

    /// Historical browse: deliver up to `count` events from 1-based
    /// position `start` (`count = 0` reads to the end).
    ///
    /// The subscriber is left stopped afterwards; the caller decides whether
    /// to resume. The cursor is not moved, so a later `resume(id, true)`
    /// still backfills live traffic from where it left off.
    pub fn load(&self, id: SubscriberId, start: usize, count: usize, include_start: bool) -> usize {
        let Some(subscriber) = self.get(id) else {
            return 0;
        };

        subscriber.pause();
        subscriber.wait_for_drain();

        let loaded = subscriber.replay(
            &self.log,
            |log, _| log.slice(start, count, include_start),
            None,
            false,
        );

        debug!(subscriber = %id, start, count, include_start, loaded, "Loaded history");
        loaded
    }

    /// Push an out-of-band payload (e.g. `Delivery::Init`) to one subscriber
    /// without waiting. Returns false if unknown, closed or the channel is full.
    pub fn send_to(&self, id: SubscriberId, delivery: Delivery) -> bool {
        self.get(id)
            .map(|subscriber| subscriber.try_send(delivery))
            .unwrap_or(false)
    }

    // --- Queries ---

    /// Events at the given 0-based log positions. Out-of-range positions are skipped.
    pub fn peek_log(&self, indices: &[usize]) -> Vec<Arc<Event>> {
        self.log.read().peek_at(indices)
    }

    pub fn stats(&self) -> BroadcastStats {
        *self.stats.read()
    }

    /// Number of connected subscribers.
    pub fn connected(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Events currently retained by the log.
    pub fn log_len(&self) -> usize {
        self.log.read().len()
    }

    /// Backlog of one subscriber. Grows without bound if its consumer stalls.
    pub fn pending_len(&self, id: SubscriberId) -> Option<usize> {
        self.get(id).map(|subscriber| subscriber.pending_len())
    }

    pub fn subscriber(&self, id: SubscriberId) -> Option<SubscriberSnapshot> {
        self.get(id).map(|subscriber| subscriber.snapshot())
    }

    fn get(&self, id: SubscriberId) -> Option<Arc<Subscriber>> {
        self.subscribers.read().get(&id).cloned()
    }
}

impl Drop for Broadcaster {
    fn drop(&mut self) {
        self.shutdown();
    }
}
