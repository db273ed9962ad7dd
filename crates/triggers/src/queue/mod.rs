//! Storage-queue trigger runtime.
//!
//! ## Delivery contract
//!
//! - At-least-once: a handler may see the same message more than once
//! - A failed delivery is retried after backoff, up to the retry policy's limit
//! - Messages that exhaust their deliveries move to `<queue>-poison`
//! - Handlers can reject a message outright, skipping the remaining retries
//!
//! ## Components
//!
//! - `QueuedMessage`: payload plus delivery bookkeeping
//! - `QueueStore`: storage for one queue and its poison queue
//! - `QueueConsumer`: runs a handler per message, applying the contract above

pub mod consumer;
pub mod store;
pub mod types;

pub use consumer::{
    ConsumerConfig, ConsumerHandle, ConsumerStats, DeliveryOutcome, MessageHandler,
    ProcessingError, QueueConsumer,
};
pub use store::{InMemoryQueue, QueueError, QueueStats, QueueStore};
pub use types::{
    poison_queue_name, BackoffStrategy, DeadLetterEntry, DeliveryStatus, MessageId,
    QueuedMessage, RetryPolicy,
};
