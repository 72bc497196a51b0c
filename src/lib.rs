//! # Tailcast
//!
//! An in-memory broadcast engine for log streams. Events from any number of
//! producers are kept in one bounded, ordered log and fanned out in real
//! time to independently paced subscribers (browser sessions).
//!
//! ## Core Concepts
//!
//! - **Events**: Immutable log entries with an id assigned in arrival order
//! - **Event log**: Count-bounded FIFO history, the source of truth for replay
//! - **Subscribers**: Per-client delivery that batches, pauses and catches up
//! - **Broadcaster**: Single intake point and owner of the subscriber registry
//!
//! ## Example
//!
//! ```ignore
//! use tailcast::{BroadcastConfig, Broadcaster, Delivery, EventInput};
//!
//! let broadcaster = Arc::new(Broadcaster::new(BroadcastConfig::default())?);
//! let (producer, _intake) = broadcaster.start_intake()?;
//!
//! let connection = broadcaster.join()?;
//! producer.submit(EventInput::line(r#"{"level":"info","msg":"ready"}"#))?;
//!
//! // Browse history, then go back to live delivery without losing anything
//! broadcaster.load(connection.id, 1, 100, true);
//! broadcaster.resume(connection.id, true);
//! ```

pub mod broadcaster;
pub mod config;
pub mod error;
pub mod events;
pub mod intake;
pub mod subscribers;
pub mod types;

// Re-exports
pub use broadcaster::Broadcaster;
pub use config::BroadcastConfig;
pub use error::{BroadcastError, Result};
pub use events::EventLog;
pub use intake::{IntakeHandle, Producer};
pub use subscribers::{
    Connection, Delivery, DeliveryMode, InitPayload, SubscriberId, SubscriberSnapshot,
};
pub use types::*;
