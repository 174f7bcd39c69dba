//! Queue collaborators.
//!
//! The listener consumes requests from a [`QueueSource`] and publishes
//! responses through a [`ResponseChannel`]. Two transports ship with the
//! crate: [`MemoryQueue`] for embedding and tests, and [`SpoolQueue`], which
//! maps each queue onto a directory below the configured endpoint.

use std::io;
use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;

use bang_config::Config;

mod memory;
mod spool;

pub use memory::MemoryQueue;
pub use spool::SpoolQueue;

/// One message taken from the inbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    id: String,
    body: Option<String>,
}

impl InboundMessage {
    /// Creates a message with the transport's identifier and body text.
    #[must_use]
    pub fn new(id: impl Into<String>, body: Option<String>) -> Self {
        Self {
            id: id.into(),
            body,
        }
    }

    /// Transport identifier used to acknowledge the message.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Body text, absent when the transport delivered none.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

/// Source of inbound requests.
pub trait QueueSource: Send {
    /// Returns up to `max` pending messages; an empty batch is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Receive`] when the transport cannot be read.
    fn receive(&self, max: usize) -> Result<Vec<InboundMessage>, QueueError>;

    /// Acknowledges `message` so it is never delivered again.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Delete`] when the acknowledgement fails.
    fn delete(&self, message: &InboundMessage) -> Result<(), QueueError>;
}

/// Destination for serialized responses.
pub trait ResponseChannel: Send + Sync {
    /// Publishes one response body.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Send`] when the body cannot be published.
    fn send(&self, body: &str) -> Result<(), QueueError>;
}

/// Errors raised by queue transports.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// A required queue does not exist.
    #[error("queue '{name}' does not exist at {location}")]
    MissingQueue {
        /// Queue name.
        name: String,
        /// Where the transport looked for it.
        location: Utf8PathBuf,
    },

    /// Pending messages could not be read.
    #[error("failed to receive from queue '{queue}': {source}")]
    Receive {
        /// Queue name.
        queue: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// A message could not be acknowledged.
    #[error("failed to delete message '{message_id}' from queue '{queue}': {reason}")]
    Delete {
        /// Queue name.
        queue: String,
        /// Identifier of the message.
        message_id: String,
        /// Description of the failure.
        reason: String,
    },

    /// A response could not be published.
    #[error("failed to send to queue '{queue}': {source}")]
    Send {
        /// Queue name.
        queue: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

/// The two queues a listener talks to.
pub struct QueuePair {
    /// Inbound request queue.
    pub source: Box<dyn QueueSource>,
    /// Outbound response queue.
    pub responses: Arc<dyn ResponseChannel>,
}

impl QueuePair {
    /// Pairs a request source with a response channel.
    #[must_use]
    pub fn new(source: Box<dyn QueueSource>, responses: Arc<dyn ResponseChannel>) -> Self {
        Self { source, responses }
    }
}

/// Opens the queues named by the configuration.
pub trait QueueConnector {
    /// Connects to the job and response queues.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::MissingQueue`] when either queue does not exist.
    fn connect(&self, config: &Config) -> Result<QueuePair, QueueError>;
}

/// Connector for the directory-backed spool transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct SpoolConnector;

impl QueueConnector for SpoolConnector {
    fn connect(&self, config: &Config) -> Result<QueuePair, QueueError> {
        let requests = SpoolQueue::open(config.endpoint(), config.job_queue_name())?;
        let responses = SpoolQueue::open(config.endpoint(), config.response_queue_name())?;
        Ok(QueuePair::new(Box::new(requests), Arc::new(responses)))
    }
}
