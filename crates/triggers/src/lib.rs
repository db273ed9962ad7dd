//! Non-HTTP triggers: the order queue consumer and the timer functions.

pub mod orders;
pub mod queue;
pub mod tasks;
pub mod timer;
pub mod worker;

pub use orders::{MalformedMessagePolicy, OrderOutcome, OrderProcessor, QueueMessage, ORDERS_QUEUE};
pub use worker::WorkerHandle;
