//! Per-client delivery.
//!
//! Each subscriber has:
//! - A delivery mode (following live traffic, or stopped)
//! - A pending batch and a cursor marking the last live event delivered
//! - A bounded delivery channel to the transport
//! - Its own flush thread that drains the pending batch once per window
//!
//! # Example
//!
//! ```ignore
//! let connection = broadcaster.join()?;
//!
//! for delivery in connection.iter() {
//!     match delivery {
//!         Delivery::ClientJoined { client_id } => println!("joined as {}", client_id),
//!         Delivery::LogBulk { messages, .. } => println!("{} events", messages.len()),
//!         Delivery::Init(_) => {}
//!     }
//! }
//! ```

mod flush;
mod subscriber;
mod types;

pub(crate) use subscriber::Subscriber;
pub(crate) use flush::FlushScheduler;
pub use types::{
    Connection, Delivery, DeliveryMode, InitPayload, SubscriberId, SubscriberSnapshot,
};
