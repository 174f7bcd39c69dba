//! In-process queue.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{InboundMessage, QueueError, QueueSource, ResponseChannel};

#[derive(Debug, Default)]
struct MemoryState {
    pending: VecDeque<InboundMessage>,
    in_flight: Vec<InboundMessage>,
    deleted: Vec<String>,
    sent: Vec<String>,
    next_id: u64,
}

/// FIFO queue held in memory.
///
/// Clones share state, so a test can keep one handle while the listener owns
/// another. Received messages stay in flight until deleted; every deletion
/// and every published body is recorded for inspection.
#[derive(Debug, Clone)]
pub struct MemoryQueue {
    name: Arc<str>,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            state: Arc::default(),
        }
    }

    /// Enqueues a message with `body` and returns its identifier.
    pub fn push(&self, body: impl Into<String>) -> String {
        self.push_body(Some(body.into()))
    }

    /// Enqueues a message, possibly without a body, and returns its
    /// identifier.
    pub fn push_body(&self, body: Option<String>) -> String {
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("{}-{}", self.name, state.next_id);
        state.pending.push_back(InboundMessage::new(id.clone(), body));
        id
    }

    /// Bodies published through [`ResponseChannel::send`], oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Identifiers acknowledged through [`QueueSource::delete`].
    #[must_use]
    pub fn deleted(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    /// Number of messages not yet received.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl QueueSource for MemoryQueue {
    fn receive(&self, max: usize) -> Result<Vec<InboundMessage>, QueueError> {
        let mut state = self.lock();
        let count = max.min(state.pending.len());
        let batch: Vec<InboundMessage> = state.pending.drain(..count).collect();
        state.in_flight.extend(batch.iter().cloned());
        Ok(batch)
    }

    fn delete(&self, message: &InboundMessage) -> Result<(), QueueError> {
        let mut state = self.lock();
        let position = state
            .in_flight
            .iter()
            .position(|candidate| candidate.id() == message.id())
            .ok_or_else(|| QueueError::Delete {
                queue: self.name.to_string(),
                message_id: message.id().to_owned(),
                reason: String::from("message is not in flight"),
            })?;
        state.in_flight.remove(position);
        state.deleted.push(message.id().to_owned());
        Ok(())
    }
}

impl ResponseChannel for MemoryQueue {
    fn send(&self, body: &str) -> Result<(), QueueError> {
        self.lock().sent.push(body.to_owned());
        Ok(())
    }
}
