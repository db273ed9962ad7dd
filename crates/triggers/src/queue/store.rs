//! Queue storage implementations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use super::types::{
    poison_queue_name, DeadLetterEntry, DeliveryStatus, MessageId, QueuedMessage, RetryPolicy,
};

/// Storage for one named queue and its poison queue.
pub trait QueueStore: Send + Sync {
    fn name(&self) -> &str;

    /// Add a message to the queue.
    fn send(&self, message: QueuedMessage) -> Result<MessageId, QueueError>;

    fn get(&self, id: MessageId) -> Result<Option<QueuedMessage>, QueueError>;

    /// Persist a message's delivery state.
    fn update(&self, message: &QueuedMessage) -> Result<(), QueueError>;

    /// Claim the oldest visible message, marking it as processing.
    /// Returns None if nothing is ready.
    fn receive_next(&self) -> Result<Option<QueuedMessage>, QueueError>;

    /// Remove a successfully handled message.
    fn complete(&self, id: MessageId) -> Result<(), QueueError>;

    /// Move a message to the poison queue.
    fn dead_letter(&self, message: QueuedMessage, reason: String) -> Result<(), QueueError>;

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, QueueError>;

    /// Move a poisoned message back to the main queue with a fresh delivery count.
    fn requeue_dead_letter(&self, id: MessageId) -> Result<QueuedMessage, QueueError>;

    fn delete_dead_letter(&self, id: MessageId) -> Result<(), QueueError>;

    fn stats(&self) -> Result<QueueStats, QueueError>;
}

/// Queue store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("message not found: {0}")]
    NotFound(MessageId),
    #[error("message already exists: {0}")]
    AlreadyExists(MessageId),
    #[error("message {id} belongs to queue '{actual}', not '{expected}'")]
    WrongQueue {
        id: MessageId,
        expected: String,
        actual: String,
    },
    #[error("storage error: {0}")]
    Storage(String),
}

/// Queue depth by delivery state.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    /// Failed at least once, waiting for redelivery
    pub retrying: usize,
    pub completed: u64,
    pub dead_lettered: usize,
}

/// In-memory queue for tests/dev.
#[derive(Debug)]
pub struct InMemoryQueue {
    name: String,
    poison_name: String,
    default_policy: RetryPolicy,
    messages: RwLock<HashMap<MessageId, QueuedMessage>>,
    dead_letters: RwLock<HashMap<MessageId, DeadLetterEntry>>,
    completed: RwLock<u64>,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            poison_name: poison_queue_name(&name),
            name,
            default_policy: RetryPolicy::default(),
            messages: RwLock::new(HashMap::new()),
            dead_letters: RwLock::new(HashMap::new()),
            completed: RwLock::new(0),
        }
    }

    pub fn arc(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    /// Retry policy applied by [`InMemoryQueue::send_payload`].
    pub fn with_default_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn poison_queue(&self) -> &str {
        &self.poison_name
    }

    /// Wrap a payload and send it with the queue's default retry policy.
    pub fn send_payload(&self, payload: serde_json::Value) -> Result<MessageId, QueueError> {
        self.send(
            QueuedMessage::new(self.name.clone(), payload)
                .with_retry_policy(self.default_policy.clone()),
        )
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, QueueError> {
    lock.read()
        .map_err(|_| QueueError::Storage("queue lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, QueueError> {
    lock.write()
        .map_err(|_| QueueError::Storage("queue lock poisoned".to_string()))
}

impl QueueStore for InMemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, message: QueuedMessage) -> Result<MessageId, QueueError> {
        if message.queue != self.name {
            return Err(QueueError::WrongQueue {
                id: message.id,
                expected: self.name.clone(),
                actual: message.queue,
            });
        }

        let mut messages = write(&self.messages)?;
        if messages.contains_key(&message.id) {
            return Err(QueueError::AlreadyExists(message.id));
        }
        let id = message.id;
        messages.insert(id, message);
        Ok(id)
    }

    fn get(&self, id: MessageId) -> Result<Option<QueuedMessage>, QueueError> {
        Ok(read(&self.messages)?.get(&id).cloned())
    }

    fn update(&self, message: &QueuedMessage) -> Result<(), QueueError> {
        let mut messages = write(&self.messages)?;
        let slot = messages
            .get_mut(&message.id)
            .ok_or(QueueError::NotFound(message.id))?;
        *slot = message.clone();
        Ok(())
    }

    fn receive_next(&self) -> Result<Option<QueuedMessage>, QueueError> {
        let mut messages = write(&self.messages)?;
        let now = Utc::now();

        // Oldest first (FIFO by insertion time).
        let next = messages
            .values()
            .filter(|m| {
                matches!(m.status, DeliveryStatus::Pending | DeliveryStatus::Failed { .. })
                    && m.is_visible(now)
            })
            .min_by_key(|m| (m.inserted_at, m.id.0))
            .map(|m| m.id);

        Ok(next.and_then(|id| {
            messages.get_mut(&id).map(|m| {
                m.mark_processing();
                m.clone()
            })
        }))
    }

    fn complete(&self, id: MessageId) -> Result<(), QueueError> {
        write(&self.messages)?
            .remove(&id)
            .ok_or(QueueError::NotFound(id))?;
        *write(&self.completed)? += 1;
        Ok(())
    }

    fn dead_letter(&self, mut message: QueuedMessage, reason: String) -> Result<(), QueueError> {
        let mut messages = write(&self.messages)?;
        let mut dls = write(&self.dead_letters)?;

        message.status = DeliveryStatus::DeadLettered {
            error: reason.clone(),
            attempts: message.dequeue_count,
        };
        message.updated_at = Utc::now();

        messages.remove(&message.id);
        dls.insert(message.id, DeadLetterEntry::new(message, reason));
        Ok(())
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, QueueError> {
        let dls = read(&self.dead_letters)?;
        let mut result: Vec<_> = dls.values().cloned().collect();
        result.sort_by_key(|e| e.dead_lettered_at);
        result.truncate(limit);
        Ok(result)
    }

    fn requeue_dead_letter(&self, id: MessageId) -> Result<QueuedMessage, QueueError> {
        let mut messages = write(&self.messages)?;
        let mut dls = write(&self.dead_letters)?;

        let entry = dls.remove(&id).ok_or(QueueError::NotFound(id))?;

        let mut message = entry.message;
        message.status = DeliveryStatus::Pending;
        message.dequeue_count = 0;
        message.visible_at = None;
        message.updated_at = Utc::now();
        message.history.clear();

        messages.insert(message.id, message.clone());
        Ok(message)
    }

    fn delete_dead_letter(&self, id: MessageId) -> Result<(), QueueError> {
        write(&self.dead_letters)?
            .remove(&id)
            .map(|_| ())
            .ok_or(QueueError::NotFound(id))
    }

    fn stats(&self) -> Result<QueueStats, QueueError> {
        let messages = read(&self.messages)?;
        let dls = read(&self.dead_letters)?;

        let mut stats = QueueStats {
            completed: *read(&self.completed)?,
            dead_lettered: dls.len(),
            ..Default::default()
        };

        for message in messages.values() {
            match &message.status {
                DeliveryStatus::Pending => stats.pending += 1,
                DeliveryStatus::Processing => stats.processing += 1,
                DeliveryStatus::Failed { .. } => stats.retrying += 1,
                DeliveryStatus::Completed => {}
                DeliveryStatus::DeadLettered { .. } => stats.dead_lettered += 1,
            }
        }

        Ok(stats)
    }
}

impl<S> QueueStore for Arc<S>
where
    S: QueueStore + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn send(&self, message: QueuedMessage) -> Result<MessageId, QueueError> {
        (**self).send(message)
    }

    fn get(&self, id: MessageId) -> Result<Option<QueuedMessage>, QueueError> {
        (**self).get(id)
    }

    fn update(&self, message: &QueuedMessage) -> Result<(), QueueError> {
        (**self).update(message)
    }

    fn receive_next(&self) -> Result<Option<QueuedMessage>, QueueError> {
        (**self).receive_next()
    }

    fn complete(&self, id: MessageId) -> Result<(), QueueError> {
        (**self).complete(id)
    }

    fn dead_letter(&self, message: QueuedMessage, reason: String) -> Result<(), QueueError> {
        (**self).dead_letter(message, reason)
    }

    fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, QueueError> {
        (**self).list_dead_letters(limit)
    }

    fn requeue_dead_letter(&self, id: MessageId) -> Result<QueuedMessage, QueueError> {
        (**self).requeue_dead_letter(id)
    }

    fn delete_dead_letter(&self, id: MessageId) -> Result<(), QueueError> {
        (**self).delete_dead_letter(id)
    }

    fn stats(&self) -> Result<QueueStats, QueueError> {
        (**self).stats()
    }
}
