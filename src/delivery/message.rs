//! Messages and publish options.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Identifier assigned by [`DeliveryQueue::publish`](super::DeliveryQueue::publish).
pub type MessageId = Uuid;

/// A message owned by the delivery queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeliveryMessage {
    pub id: MessageId,
    pub payload: Value,
    /// Failed attempts so far.
    pub retry_count: u32,
    pub attributes: BTreeMap<String, String>,
}

impl DeliveryMessage {
    /// Delivery attempt this message is on (1-based).
    pub fn attempt(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// Options for one publish call.
///
/// # Example
/// ```
/// use plugvisor::PublishOptions;
///
/// let opts = PublishOptions::new()
///     .with_dedupe_key("invoice-42")
///     .with_priority(5)
///     .with_attribute("tenant", "acme");
/// assert_eq!(opts.priority, Some(5));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Publishes sharing a key within the dedupe window collapse into one message.
    pub dedupe_key: Option<String>,
    /// Recorded as the `priority` attribute; delivery stays FIFO.
    pub priority: Option<i32>,
    pub attributes: BTreeMap<String, String>,
}

impl PublishOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dedupe_key(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = Some(key.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
