//! `processQueue` trigger: order messages from `orders-queue`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::queue::{ProcessingError, QueuedMessage};

pub const ORDERS_QUEUE: &str = "orders-queue";

/// Order message body, e.g. `{"orderId": "12345", "status": "pending"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// What to do with a message that has no `orderId`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum MalformedMessagePolicy {
    /// Log and complete the message.
    #[default]
    Drop,
    /// Reject the message so it lands in the poison queue.
    DeadLetter,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown malformed-message policy '{0}' (expected 'drop' or 'dead-letter')")]
pub struct UnknownPolicy(String);

impl FromStr for MalformedMessagePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "dead-letter" | "dead_letter" | "deadletter" => Ok(Self::DeadLetter),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

/// Result of handling one order message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    Processed { order_id: String },
    Dropped,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderProcessor {
    policy: MalformedMessagePolicy,
}

impl OrderProcessor {
    pub fn new(policy: MalformedMessagePolicy) -> Self {
        Self { policy }
    }

    /// Handle one message payload.
    ///
    /// Decoding is lenient: any JSON value is accepted, and a payload without a
    /// usable `orderId` (including non-object payloads) follows the
    /// malformed-message policy. String and numeric ids are both accepted.
    pub fn process(&self, payload: &Value) -> Result<OrderOutcome, ProcessingError> {
        info!(payload = %payload, "queue trigger processed message");

        let Some(order_id) = order_id(payload) else {
            error!("invalid message: missing orderId");
            return match self.policy {
                MalformedMessagePolicy::Drop => Ok(OrderOutcome::Dropped),
                MalformedMessagePolicy::DeadLetter => {
                    Err(ProcessingError::Permanent("missing orderId".to_string()))
                }
            };
        };

        info!(order_id = %order_id, "processing order");
        info!(
            order_id = %order_id,
            status = payload.get("status").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
            "order status"
        );
        if payload.get("data").is_none_or(Value::is_null) {
            warn!(order_id = %order_id, "order message carries no data");
        }
        info!(order_id = %order_id, "order processed successfully");

        Ok(OrderOutcome::Processed { order_id })
    }

    /// Adapter for [`crate::queue::QueueConsumer`].
    pub fn handle(&self, message: &QueuedMessage) -> Result<(), ProcessingError> {
        self.process(&message.payload).map(|_| ())
    }
}

/// `orderId` as text. Empty strings, zero, and other types count as absent.
fn order_id(payload: &Value) -> Option<String> {
    match payload.get("orderId")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}
