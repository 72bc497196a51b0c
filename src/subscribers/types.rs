//! Subscriber-facing types: identities, modes and outbound payloads.

use crate::error::Result;
use crate::types::{BroadcastStats, Event, EventId};
use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Unique identifier for a subscriber. Opaque to the transport.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({})", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

impl Serialize for SubscriberId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Whether a subscriber accepts live traffic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Live events are queued for delivery.
    Following,
    /// Live events are dropped; only explicit replays are queued.
    Stopped,
}

/// Connection-time settings handed to the UI.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    pub analytics_enabled: bool,
    pub auth_required: bool,
    pub config_str: String,
}

/// A payload on a subscriber's delivery channel.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum Delivery {
    /// Sent once by the host when the connection opens.
    Init(InitPayload),

    /// A batch of events in log order, with a stats snapshot.
    LogBulk {
        messages: Vec<Arc<Event>>,
        status: BroadcastStats,
    },

    /// First payload on every new channel.
    ClientJoined { client_id: SubscriberId },
}

impl Delivery {
    /// Events carried by this payload (empty for control payloads).
    pub fn events(&self) -> &[Arc<Event>] {
        match self {
            Delivery::LogBulk { messages, .. } => messages,
            _ => &[],
        }
    }

    /// Encode for the wire.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Point-in-time view of one subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriberSnapshot {
    pub id: SubscriberId,
    pub mode: DeliveryMode,
    /// Id of the last live event handed to the channel.
    pub cursor: Option<EventId>,
    /// Events waiting for the next flush.
    pub pending: usize,
}

/// Consumer end of a subscription, handed to the transport.
pub struct Connection {
    pub id: SubscriberId,
    /// Channel to receive payloads. Disconnects once the subscriber is closed.
    pub receiver: Receiver<Delivery>,
}

impl Connection {
    /// Receive the next payload (blocking).
    pub fn recv(&self) -> std::result::Result<Delivery, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a payload (non-blocking).
    pub fn try_recv(&self) -> std::result::Result<Delivery, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<Delivery, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Blocking iterator that ends when the subscriber is closed.
    pub fn iter(&self) -> crossbeam_channel::Iter<'_, Delivery> {
        self.receiver.iter()
    }
}
