//! Producer side: a bounded queue drained by one ingestion thread.
//!
//! Producers (stdin readers, file followers, socket listeners) hold a
//! cloneable [`Producer`] and never touch the broadcaster directly.

use crate::broadcaster::Broadcaster;
use crate::error::{BroadcastError, Result};
use crate::types::EventInput;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Cloneable submission handle.
#[derive(Clone)]
pub struct Producer {
    sender: Sender<EventInput>,
}

impl Producer {
    /// Queue an event, blocking while the intake queue is full.
    pub fn submit(&self, input: EventInput) -> Result<()> {
        self.sender
            .send(input)
            .map_err(|_| BroadcastError::IntakeClosed)
    }

    /// Queue a raw line.
    pub fn submit_line(&self, line: impl Into<String>) -> Result<()> {
        self.submit(EventInput::line(line))
    }
}

/// Owns the ingestion thread.
pub struct IntakeHandle {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<u64>>,
}

impl IntakeHandle {
    /// Ask the thread to stop. Events still queued are discarded.
    pub fn stop(&mut self) {
        self.stop_tx.take();
    }

    /// Wait for the thread to exit, returning how many events it ingested.
    ///
    /// Exits on its own once every `Producer` is dropped.
    pub fn join(mut self) -> u64 {
        self.wait()
    }

    fn wait(&mut self) -> u64 {
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(ingested)) => ingested,
            Some(Err(_)) => {
                warn!("Intake thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for IntakeHandle {
    fn drop(&mut self) {
        self.stop();
        self.wait();
    }
}

pub(crate) fn spawn(
    broadcaster: Arc<Broadcaster>,
    capacity: usize,
) -> Result<(Producer, IntakeHandle)> {
    let (sender, receiver) = bounded(capacity);
    let (stop_tx, stop_rx) = bounded(1);

    let handle = thread::Builder::new()
        .name("tailcast-intake".into())
        .spawn(move || run(broadcaster, receiver, stop_rx))?;

    Ok((
        Producer { sender },
        IntakeHandle {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        },
    ))
}

fn run(broadcaster: Arc<Broadcaster>, inputs: Receiver<EventInput>, stop: Receiver<()>) -> u64 {
    debug!("Intake started");
    let mut ingested = 0u64;

    loop {
        select! {
            recv(inputs) -> input => match input {
                Ok(input) => {
                    broadcaster.ingest(input);
                    ingested += 1;
                }
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        }
    }

    debug!(ingested, "Intake stopped");
    ingested
}
