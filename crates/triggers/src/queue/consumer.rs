//! Queue consumer with redelivery and poison-queue handling.

use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::worker::WorkerHandle;

use super::store::{QueueError, QueueStore};
use super::types::{DeliveryStatus, QueuedMessage};

/// Failure returned by a message handler.
///
/// `Transient` failures are redelivered until the retry policy is exhausted.
/// `Permanent` failures go straight to the poison queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcessingError {
    #[error("processing failed: {0}")]
    Transient(String),
    #[error("message rejected: {0}")]
    Permanent(String),
}

/// Message handler function type.
pub type MessageHandler = Box<dyn Fn(&QueuedMessage) -> Result<(), ProcessingError> + Send + Sync>;

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Completed,
    /// Will be redelivered after backoff
    Retrying { attempt: u32 },
    DeadLettered { attempts: u32 },
}

/// Consumer configuration.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// How often to poll an empty queue
    pub poll_interval: Duration,
    /// Thread name / log label
    pub name: String,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            name: "queue-consumer".to_string(),
        }
    }
}

impl ConsumerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Consumer runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ConsumerStats {
    pub deliveries: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub dead_lettered: u64,
    pub uptime_secs: u64,
}

/// Handle to a running consumer.
#[derive(Debug)]
pub struct ConsumerHandle {
    worker: WorkerHandle,
    stats: Arc<Mutex<ConsumerStats>>,
}

impl ConsumerHandle {
    /// Request graceful shutdown and wait for the consumer to stop.
    pub fn shutdown(self) {
        self.worker.shutdown();
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Pulls messages from a queue store and runs a handler on each.
///
/// Delivery is at-least-once: a handler error leaves the message in the
/// queue for redelivery, and after the last permitted delivery the message is
/// moved to the poison queue.
pub struct QueueConsumer<S: QueueStore> {
    store: S,
    handler: MessageHandler,
}

impl<S: QueueStore + 'static> QueueConsumer<S> {
    pub fn new<F>(store: S, handler: F) -> Self
    where
        F: Fn(&QueuedMessage) -> Result<(), ProcessingError> + Send + Sync + 'static,
    {
        Self {
            store,
            handler: Box::new(handler),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Receive and handle at most one message.
    ///
    /// Returns `Ok(None)` when no message is visible.
    pub fn poll_once(&self) -> Result<Option<DeliveryOutcome>, QueueError> {
        match self.store.receive_next()? {
            Some(mut message) => self.deliver(&mut message).map(Some),
            None => Ok(None),
        }
    }

    /// Run the handler on a claimed message and record the result.
    pub fn deliver(&self, message: &mut QueuedMessage) -> Result<DeliveryOutcome, QueueError> {
        let started = Utc::now();

        match (self.handler)(message) {
            Ok(()) => {
                message.mark_completed(started);
                self.store.complete(message.id)?;
                debug!(queue = %message.queue, message_id = %message.id, "message completed");
                Ok(DeliveryOutcome::Completed)
            }
            Err(err) => {
                match &err {
                    ProcessingError::Transient(_) => message.mark_failed(err.to_string(), started),
                    ProcessingError::Permanent(_) => message.mark_rejected(err.to_string(), started),
                }

                if let DeliveryStatus::DeadLettered { attempts, .. } = message.status {
                    warn!(
                        queue = %message.queue,
                        message_id = %message.id,
                        attempts,
                        error = %err,
                        "message moved to poison queue"
                    );
                    self.store.dead_letter(message.clone(), err.to_string())?;
                    return Ok(DeliveryOutcome::DeadLettered { attempts });
                }

                self.store.update(message)?;
                warn!(
                    queue = %message.queue,
                    message_id = %message.id,
                    attempt = message.dequeue_count,
                    error = %err,
                    "message processing failed; will be redelivered"
                );
                Ok(DeliveryOutcome::Retrying {
                    attempt: message.dequeue_count,
                })
            }
        }
    }

    /// Spawn the consumer loop on a background thread.
    pub fn spawn(self, config: ConsumerConfig) -> std::io::Result<ConsumerHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(ConsumerStats::default()));
        let loop_stats = stats.clone();

        let join = thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || consumer_loop(self, config, shutdown_rx, loop_stats))?;

        Ok(ConsumerHandle {
            worker: WorkerHandle::new(shutdown_tx, join),
            stats,
        })
    }
}

fn consumer_loop<S: QueueStore + 'static>(
    consumer: QueueConsumer<S>,
    config: ConsumerConfig,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<ConsumerStats>>,
) {
    info!(consumer = %config.name, queue = %consumer.store.name(), "queue consumer started");
    let start_time = Instant::now();

    loop {
        let idle = match consumer.poll_once() {
            Ok(Some(outcome)) => {
                let mut s = stats.lock().unwrap_or_else(PoisonError::into_inner);
                s.deliveries += 1;
                match outcome {
                    DeliveryOutcome::Completed => s.succeeded += 1,
                    DeliveryOutcome::Retrying { .. } => s.failed += 1,
                    DeliveryOutcome::DeadLettered { .. } => {
                        s.failed += 1;
                        s.dead_lettered += 1;
                    }
                }
                false
            }
            Ok(None) => true,
            Err(e) => {
                error!(consumer = %config.name, error = %e, "failed to receive message");
                true
            }
        };

        stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .uptime_secs = start_time.elapsed().as_secs();

        // Sleep only when there was nothing to do; wake early on shutdown.
        let wait = if idle { config.poll_interval } else { Duration::ZERO };
        match shutdown_rx.recv_timeout(wait) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
    }

    info!(consumer = %config.name, "queue consumer stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::json;

    use super::*;
    use crate::queue::store::InMemoryQueue;
    use crate::queue::types::RetryPolicy;

    fn queue() -> Arc<InMemoryQueue> {
        InMemoryQueue::arc("orders-queue")
    }

    #[test]
    fn successful_delivery_completes_message() {
        let store = queue();
        let consumer = QueueConsumer::new(store.clone(), |_msg| Ok(()));
        let id = store.send_payload(json!({"orderId": "1"})).unwrap();

        assert_eq!(consumer.poll_once().unwrap(), Some(DeliveryOutcome::Completed));
        assert!(store.get(id).unwrap().is_none());
        assert_eq!(consumer.poll_once().unwrap(), None);
    }

    #[test]
    fn transient_failures_redeliver_then_poison() {
        let store = queue();
        let consumer = QueueConsumer::new(store.clone(), |_msg| {
            Err(ProcessingError::Transient("downstream unavailable".to_string()))
        });
        let message = QueuedMessage::new("orders-queue", json!({}))
            .with_retry_policy(RetryPolicy::fixed(3, Duration::ZERO));
        let id = store.send(message).unwrap();

        assert_eq!(
            consumer.poll_once().unwrap(),
            Some(DeliveryOutcome::Retrying { attempt: 1 })
        );
        assert_eq!(
            consumer.poll_once().unwrap(),
            Some(DeliveryOutcome::Retrying { attempt: 2 })
        );
        assert_eq!(
            consumer.poll_once().unwrap(),
            Some(DeliveryOutcome::DeadLettered { attempts: 3 })
        );

        let dls = store.list_dead_letters(10).unwrap();
        assert_eq!(dls.len(), 1);
        assert_eq!(dls[0].message.id, id);
        assert_eq!(dls[0].message.history.len(), 3);
    }

    #[test]
    fn permanent_failure_skips_retries() {
        let store = queue();
        let consumer = QueueConsumer::new(store.clone(), |_msg| {
            Err(ProcessingError::Permanent("missing orderId".to_string()))
        });
        store.send_payload(json!({})).unwrap();

        assert_eq!(
            consumer.poll_once().unwrap(),
            Some(DeliveryOutcome::DeadLettered { attempts: 1 })
        );
        assert_eq!(store.stats().unwrap().dead_lettered, 1);
    }

    #[test]
    fn backoff_hides_message_until_visible() {
        let store = queue();
        let consumer = QueueConsumer::new(store.clone(), |_msg| {
            Err(ProcessingError::Transient("later".to_string()))
        });
        let message = QueuedMessage::new("orders-queue", json!({}))
            .with_retry_policy(RetryPolicy::fixed(5, Duration::from_secs(60)));
        store.send(message).unwrap();

        assert!(matches!(
            consumer.poll_once().unwrap(),
            Some(DeliveryOutcome::Retrying { .. })
        ));
        assert_eq!(consumer.poll_once().unwrap(), None);
        assert_eq!(store.stats().unwrap().retrying, 1);
    }

    #[test]
    fn spawned_consumer_drains_queue_and_stops() {
        let store = queue();
        let handled = Arc::new(AtomicU32::new(0));
        let counter = handled.clone();
        let consumer = QueueConsumer::new(store.clone(), move |_msg| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        for i in 0..3 {
            store.send_payload(json!({"orderId": i.to_string()})).unwrap();
        }

        let handle = consumer
            .spawn(ConsumerConfig::default().with_poll_interval(Duration::from_millis(5)))
            .unwrap();

        for _ in 0..200 {
            if handle.stats().succeeded == 3 {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(handled.load(Ordering::SeqCst), 3);
        assert_eq!(handle.stats().succeeded, 3);
        handle.shutdown();
    }
}
