//! In-process publish/subscribe bus.
//!
//! Connectors publish their effects here and worker loops read external
//! reports from it. A real transport bridges topics off-process.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default number of messages buffered per subscriber.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// One message on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    pub payload: serde_json::Value,
}

/// Cloneable handle to a broadcast channel of [`BusMessage`]s.
#[derive(Debug, Clone)]
pub struct ActionBus {
    tx: broadcast::Sender<BusMessage>,
}

impl ActionBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a message. Returns how many subscribers received it.
    ///
    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, topic: impl Into<String>, payload: serde_json::Value) -> usize {
        let message = BusMessage {
            topic: topic.into(),
            payload,
        };
        self.tx.send(message).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ActionBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}
