//! Bounded event history.
//!
//! Events live in a count-bounded FIFO log that is the single source of
//! truth for join tails, historical loads and resume backfill.

mod log;

pub use log::EventLog;
