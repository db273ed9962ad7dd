//! Queued message types and redelivery policy.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivery state of a queued message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Waiting for its first delivery
    Pending,
    /// Handed to a consumer
    Processing,
    /// Handler succeeded
    Completed,
    /// Handler failed; redelivered once visible again
    Failed { error: String, attempt: u32 },
    /// Moved to the poison queue
    DeadLettered { error: String, attempts: u32 },
}

impl DeliveryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Completed | DeliveryStatus::DeadLettered { .. }
        )
    }
}

/// Delay growth between redeliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay every time
    Fixed,
    /// base * 2^(attempt - 1)
    #[default]
    Exponential,
    /// base * attempt
    Linear,
}

/// Redelivery policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total deliveries before a message is poisoned (minimum 1).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::Exponential,
        }
    }
}

impl RetryPolicy {
    /// One delivery, no redelivery.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            strategy: BackoffStrategy::Fixed,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay before redelivering after failed attempt `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempt),
        };

        delay.min(self.max_delay)
    }

    /// Whether a message that has been delivered `attempt` times may be delivered again.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }
}

/// A message sitting in a queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: MessageId,
    /// Queue the message was sent to
    pub queue: String,
    pub payload: serde_json::Value,
    pub status: DeliveryStatus,
    pub retry_policy: RetryPolicy,
    /// Number of times the message has been handed to a consumer
    pub dequeue_count: u32,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Hidden from consumers until this instant (redelivery backoff)
    pub visible_at: Option<DateTime<Utc>>,
    pub history: Vec<DeliveryAttempt>,
}

/// Record of one delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
}

impl QueuedMessage {
    pub fn new(queue: impl Into<String>, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: MessageId::new(),
            queue: queue.into(),
            payload,
            status: DeliveryStatus::Pending,
            retry_policy: RetryPolicy::default(),
            dequeue_count: 0,
            inserted_at: now,
            updated_at: now,
            visible_at: None,
            history: Vec::new(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        self.visible_at.is_none_or(|at| now >= at)
    }

    pub fn mark_processing(&mut self) {
        self.status = DeliveryStatus::Processing;
        self.dequeue_count += 1;
        self.updated_at = Utc::now();
    }

    pub fn mark_completed(&mut self, started_at: DateTime<Utc>) {
        let now = Utc::now();
        self.status = DeliveryStatus::Completed;
        self.updated_at = now;
        self.record(started_at, now, None);
    }

    /// Record a failed delivery and schedule a redelivery, or poison the
    /// message once the policy is exhausted.
    pub fn mark_failed(&mut self, error: String, started_at: DateTime<Utc>) {
        let now = Utc::now();
        self.updated_at = now;
        self.record(started_at, now, Some(error.clone()));

        if self.retry_policy.should_retry(self.dequeue_count) {
            let delay = self.retry_policy.delay_for_attempt(self.dequeue_count);
            self.visible_at = Some(now + chrono::Duration::from_std(delay).unwrap_or_default());
            self.status = DeliveryStatus::Failed {
                error,
                attempt: self.dequeue_count,
            };
        } else {
            self.status = DeliveryStatus::DeadLettered {
                error,
                attempts: self.dequeue_count,
            };
        }
    }

    /// Record a failure that must not be redelivered.
    pub fn mark_rejected(&mut self, error: String, started_at: DateTime<Utc>) {
        let now = Utc::now();
        self.updated_at = now;
        self.record(started_at, now, Some(error.clone()));
        self.status = DeliveryStatus::DeadLettered {
            error,
            attempts: self.dequeue_count,
        };
    }

    fn record(&mut self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>, error: Option<String>) {
        self.history.push(DeliveryAttempt {
            attempt: self.dequeue_count,
            started_at,
            finished_at,
            success: error.is_none(),
            error,
        });
    }
}

/// Entry in a poison queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub message: QueuedMessage,
    pub dead_lettered_at: DateTime<Utc>,
    pub reason: String,
}

impl DeadLetterEntry {
    pub fn new(message: QueuedMessage, reason: String) -> Self {
        Self {
            message,
            dead_lettered_at: Utc::now(),
            reason,
        }
    }
}

/// Name of the poison queue paired with `queue`.
pub fn poison_queue_name(queue: &str) -> String {
    format!("{queue}-poison")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
            strategy: BackoffStrategy::Exponential,
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(64), Duration::from_millis(500));
    }

    #[test]
    fn linear_and_fixed_backoff() {
        let linear = RetryPolicy {
            strategy: BackoffStrategy::Linear,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(linear.delay_for_attempt(3), Duration::from_millis(300));

        let fixed = RetryPolicy::fixed(3, Duration::from_millis(250));
        assert_eq!(fixed.delay_for_attempt(1), Duration::from_millis(250));
        assert_eq!(fixed.delay_for_attempt(3), Duration::from_millis(250));
    }

    #[test]
    fn should_retry_counts_total_deliveries() {
        let policy = RetryPolicy::default().with_max_attempts(3);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));

        let zero = RetryPolicy::default().with_max_attempts(0);
        assert!(!zero.should_retry(1));
    }

    #[test]
    fn failed_delivery_backs_off_then_poisons() {
        let mut msg = QueuedMessage::new("orders-queue", serde_json::json!({}))
            .with_retry_policy(RetryPolicy::fixed(2, Duration::from_secs(30)));

        msg.mark_processing();
        msg.mark_failed("boom".to_string(), Utc::now());
        assert!(matches!(msg.status, DeliveryStatus::Failed { attempt: 1, .. }));
        assert!(!msg.is_visible(Utc::now()));

        msg.mark_processing();
        msg.mark_failed("boom again".to_string(), Utc::now());
        assert!(matches!(msg.status, DeliveryStatus::DeadLettered { attempts: 2, .. }));
        assert_eq!(msg.history.len(), 2);
        assert!(msg.history.iter().all(|a| !a.success));
    }

    #[test]
    fn rejection_skips_redelivery() {
        let mut msg = QueuedMessage::new("orders-queue", serde_json::json!({}));
        msg.mark_processing();
        msg.mark_rejected("malformed".to_string(), Utc::now());
        assert!(msg.status.is_terminal());
    }

    #[test]
    fn poison_queue_naming() {
        assert_eq!(poison_queue_name("orders-queue"), "orders-queue-poison");
    }
}
