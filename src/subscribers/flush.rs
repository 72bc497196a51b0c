//! Periodic flushing of a subscriber's pending batch.
//!
//! Events are delivered in bulk once per window instead of one at a time,
//! so a burst of log lines does not flood the browser with tiny messages.
//! Worst-case latency for a single event is one full window.

use crate::error::Result;
use crossbeam_channel::RecvTimeoutError;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use super::subscriber::Subscriber;

/// Owns the flush thread of one subscriber.
pub(crate) struct FlushScheduler {
    handle: JoinHandle<()>,
}

impl FlushScheduler {
    /// Start flushing `subscriber` every `period`.
    pub(crate) fn spawn(subscriber: Arc<Subscriber>, period: Duration) -> Result<Self> {
        let handle = thread::Builder::new()
            .name(format!("tailcast-flush-{}", subscriber.id().0))
            .spawn(move || run(subscriber, period))?;

        Ok(Self { handle })
    }

    /// Wait for the thread to exit. The close signal must already be sent.
    pub(crate) fn join(self) {
        if self.handle.thread().id() == thread::current().id() {
            return;
        }
        if self.handle.join().is_err() {
            warn!("Flush thread panicked");
        }
    }
}

fn run(subscriber: Arc<Subscriber>, period: Duration) {
    loop {
        // Sleeps one window; wakes early only when the close sender is dropped.
        match subscriber.close_signal().recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!(subscriber = %subscriber.id(), "Received close signal, quitting");
                return;
            }
        }

        if subscriber.pending_len() == 0 {
            continue;
        }
        subscriber.flush_pending();
    }
}
