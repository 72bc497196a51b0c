//! Per-subscriber delivery state machine.

use crate::config::BroadcastConfig;
use crate::events::EventLog;
use crate::types::{BroadcastStats, Event, EventId};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::flush::FlushScheduler;
use super::types::{Delivery, DeliveryMode, SubscriberId, SubscriberSnapshot};

/// Mode, cursor and pending batch. Only touched under the subscriber's lock.
#[derive(Debug)]
pub(crate) struct SubscriberState {
    pub(crate) mode: DeliveryMode,
    /// Last live event handed to the delivery channel.
    pub(crate) cursor: Option<EventId>,
    pub(crate) pending: Vec<Arc<Event>>,
}

impl SubscriberState {
    fn new() -> Self {
        Self {
            mode: DeliveryMode::Stopped,
            cursor: None,
            pending: Vec::new(),
        }
    }

    /// Queue an event. Live traffic (`force = false`) is dropped while stopped.
    pub(crate) fn enqueue(&mut self, event: Arc<Event>, force: bool) -> bool {
        if !force && self.mode == DeliveryMode::Stopped {
            return false;
        }
        self.pending.push(event);
        true
    }

    /// Empty the pending batch, moving the cursor to its last event when
    /// the batch is live traffic.
    pub(crate) fn take_pending(&mut self, track_cursor: bool) -> Vec<Arc<Event>> {
        if track_cursor {
            if let Some(last) = self.pending.last() {
                self.cursor = Some(last.id);
            }
        }
        std::mem::take(&mut self.pending)
    }
}

/// One connected client.
///
/// Lock order is `flush_lock` -> event log -> `state`. The broadcaster's
/// ingest path takes the event log and then `state`, and never waits on a
/// delivery channel, so a slow consumer only ever stalls its own flusher.
pub(crate) struct Subscriber {
    id: SubscriberId,
    state: Mutex<SubscriberState>,
    /// Signalled whenever `pending` is emptied.
    drained: Condvar,
    /// Held for the whole of a flush, delivery included.
    flush_lock: Mutex<()>,
    sender: Sender<Delivery>,
    close_tx: Mutex<Option<Sender<()>>>,
    close_rx: Receiver<()>,
    closed: AtomicBool,
    disconnected: AtomicBool,
    scheduler: Mutex<Option<FlushScheduler>>,
    batch_size: usize,
    drain_poll: Duration,
    stats: Arc<RwLock<BroadcastStats>>,
}

impl Subscriber {
    /// Create a stopped subscriber and the receiving end of its channel.
    pub(crate) fn new(
        id: SubscriberId,
        config: &BroadcastConfig,
        stats: Arc<RwLock<BroadcastStats>>,
    ) -> (Self, Receiver<Delivery>) {
        let (sender, receiver) = bounded(config.delivery_capacity);
        let (close_tx, close_rx) = bounded(1);

        let subscriber = Self {
            id,
            state: Mutex::new(SubscriberState::new()),
            drained: Condvar::new(),
            flush_lock: Mutex::new(()),
            sender,
            close_tx: Mutex::new(Some(close_tx)),
            close_rx,
            closed: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
            scheduler: Mutex::new(None),
            batch_size: config.flush_batch_size.max(1),
            drain_poll: config.drain_poll_interval(),
            stats,
        };

        (subscriber, receiver)
    }

    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    /// Seed the pending batch with `events` and start following.
    pub(crate) fn seed(&self, events: Vec<Arc<Event>>) {
        let mut state = self.state.lock();
        for event in events {
            state.enqueue(event, true);
        }
        state.mode = DeliveryMode::Following;
    }

    /// Live fan-out entry point.
    pub(crate) fn ingest(&self, event: Arc<Event>) -> bool {
        self.state.lock().enqueue(event, false)
    }

    /// Stop accepting live traffic. Returns the previous mode.
    pub(crate) fn pause(&self) -> DeliveryMode {
        let mut state = self.state.lock();
        std::mem::replace(&mut state.mode, DeliveryMode::Stopped)
    }

    /// Block until the flusher has emptied `pending`, or the subscriber is closed.
    pub(crate) fn wait_for_drain(&self) {
        let mut state = self.state.lock();
        while !state.pending.is_empty() && !self.is_closed() {
            self.drained.wait_for(&mut state, self.drain_poll);
        }
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub(crate) fn snapshot(&self) -> SubscriberSnapshot {
        let state = self.state.lock();
        SubscriberSnapshot {
            id: self.id,
            mode: state.mode,
            cursor: state.cursor,
            pending: state.pending.len(),
        }
    }

    /// Flush live traffic. Called by the scheduler on every tick.
    pub(crate) fn flush_pending(&self) -> usize {
        let _inflight = self.flush_lock.lock();

        let batch = {
            let mut state = self.state.lock();
            if state.pending.is_empty() {
                return 0;
            }
            state.take_pending(true)
        };
        self.drained.notify_all();

        debug!(subscriber = %self.id, count = batch.len(), "Flushing buffer");
        self.deliver(batch)
    }

    /// Force-enqueue events chosen from the log, then flush immediately.
    ///
    /// `pick` runs with both the log and the subscriber locked, so no live
    /// event can slip between the read and a mode change. `mode`, if given,
    /// is applied under the same locks. With `track_cursor` the flushed
    /// events count as live traffic and move the cursor.
    pub(crate) fn replay<F>(
        &self,
        log: &RwLock<EventLog>,
        pick: F,
        mode: Option<DeliveryMode>,
        track_cursor: bool,
    ) -> usize
    where
        F: FnOnce(&EventLog, &SubscriberState) -> Vec<Arc<Event>>,
    {
        let _inflight = self.flush_lock.lock();

        let batch = {
            let log = log.read();
            let mut state = self.state.lock();
            for event in pick(&*log, &*state) {
                state.enqueue(event, true);
            }
            if let Some(mode) = mode {
                state.mode = mode;
            }
            state.take_pending(track_cursor)
        };
        self.drained.notify_all();

        self.deliver(batch)
    }

    /// Push a control payload without waiting. Returns false if the channel
    /// is full, disconnected or closed.
    pub(crate) fn try_send(&self, delivery: Delivery) -> bool {
        !self.is_closed() && self.sender.try_send(delivery).is_ok()
    }

    /// Send `batch` in chunks of at most `batch_size`, in order.
    fn deliver(&self, batch: Vec<Arc<Event>>) -> usize {
        let mut delivered = 0;
        for chunk in batch.chunks(self.batch_size) {
            let delivery = Delivery::LogBulk {
                messages: chunk.to_vec(),
                status: *self.stats.read(),
            };
            if !self.send(delivery) {
                break;
            }
            delivered += chunk.len();
        }
        delivered
    }

    /// Blocking send that gives up when the subscriber is closed.
    fn send(&self, delivery: Delivery) -> bool {
        if self.is_closed() {
            return false;
        }

        select! {
            send(self.sender, delivery) -> res => {
                if res.is_err() && !self.disconnected.swap(true, Ordering::Relaxed) {
                    debug!(subscriber = %self.id, "Delivery channel disconnected, dropping batches");
                }
                res.is_ok()
            }
            recv(self.close_rx) -> _ => {
                trace!(subscriber = %self.id, "Send abandoned on close");
                false
            }
        }
    }

    pub(crate) fn attach_scheduler(&self, scheduler: FlushScheduler) {
        *self.scheduler.lock() = Some(scheduler);
    }

    /// Receives only when the subscriber is closed (the sender is dropped).
    pub(crate) fn close_signal(&self) -> &Receiver<()> {
        &self.close_rx
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Signal the flusher to stop and wait for it to exit.
    pub(crate) fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.close_tx.lock().take();
        self.drained.notify_all();

        let scheduler = self.scheduler.lock().take();
        if let Some(scheduler) = scheduler {
            scheduler.join();
        }
    }
}
