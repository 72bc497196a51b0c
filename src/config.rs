//! Broadcaster configuration.

use crate::error::{BroadcastError, Result};
use serde::Deserialize;
use std::time::Duration;

/// Tuning knobs for the broadcaster.
///
/// # Example
///
/// ```toml
/// [broadcast]
/// flush_interval_ms = 100
/// flush_batch_size = 1000
/// max_event_count = 100000
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Bulk window: how often each subscriber's pending batch is flushed.
    /// Default: 100
    pub flush_interval_ms: u64,

    /// Max events per delivered batch.
    /// Default: 1000
    pub flush_batch_size: usize,

    /// Event log capacity. Oldest events are evicted beyond this.
    /// Default: 100_000
    pub max_event_count: usize,

    /// Tail length replayed to a subscriber on join.
    /// Default: 1000
    pub join_tail_len: usize,

    /// Bounded capacity of each delivery channel, in payloads.
    /// Default: 2500
    pub delivery_capacity: usize,

    /// Bounded capacity of the producer queue.
    /// Default: 1000
    pub intake_capacity: usize,

    /// Re-check interval while waiting for a pending batch to drain.
    /// Default: 5
    pub drain_poll_interval_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 100,
            flush_batch_size: 1000,
            max_event_count: 100_000,
            join_tail_len: 1000,
            delivery_capacity: 2500,
            intake_capacity: 1000,
            drain_poll_interval_ms: 5,
        }
    }
}

impl BroadcastConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }

    /// Check that every knob is usable.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("flush_interval_ms", self.flush_interval_ms == 0),
            ("flush_batch_size", self.flush_batch_size == 0),
            ("max_event_count", self.max_event_count == 0),
            ("delivery_capacity", self.delivery_capacity == 0),
            ("intake_capacity", self.intake_capacity == 0),
            ("drain_poll_interval_ms", self.drain_poll_interval_ms == 0),
        ];

        match checks.iter().find(|(_, zero)| *zero) {
            Some((name, _)) => Err(BroadcastError::InvalidConfig(format!(
                "{name} must be greater than zero"
            ))),
            None => Ok(()),
        }
    }
}
