//! Error types for request decoding and response encoding.
//!
//! Decode failures are part of normal operation: each variant maps to one
//! failure response and carries whatever identity could be recovered from the
//! message before decoding stopped.

use thiserror::Error;

/// Placeholder identity used when a field could not be recovered.
pub const UNKNOWN: &str = "unknown";

/// Reasons an inbound message does not yield a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// No message handle was supplied.
    #[error("no message was received")]
    NoMessage,

    /// The message has no body text.
    #[error("message must have a message body")]
    EmptyBody,

    /// The body does not name exactly one job.
    #[error("unable to get job name from request message: {reason}")]
    MissingJobName {
        /// Why no job name could be read.
        reason: String,
    },

    /// The job name maps to nothing.
    #[error("request for job '{job_name}' carries no request data")]
    MissingData {
        /// Job named by the message.
        job_name: String,
    },

    /// The request data exists but does not have the expected shape.
    #[error("request for job '{job_name}' is malformed: {reason}")]
    MalformedRequest {
        /// Job named by the message.
        job_name: String,
        /// Description of the problem.
        reason: String,
    },
}

impl DecodeError {
    /// Creates a missing job name error.
    pub fn missing_job_name(reason: impl Into<String>) -> Self {
        Self::MissingJobName {
            reason: reason.into(),
        }
    }

    /// Creates a malformed request error.
    pub fn malformed(job_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRequest {
            job_name: job_name.into(),
            reason: reason.into(),
        }
    }

    /// The `(job_name, request_id)` pair to report the failure under.
    #[must_use]
    pub fn identity(&self) -> (&str, &str) {
        match self {
            Self::MissingData { job_name } | Self::MalformedRequest { job_name, .. } => {
                (job_name.as_str(), UNKNOWN)
            }
            Self::NoMessage | Self::EmptyBody | Self::MissingJobName { .. } => (UNKNOWN, UNKNOWN),
        }
    }
}

/// A response could not be rendered as YAML.
#[derive(Debug, Clone, Error)]
#[error("failed to serialize response: {message}")]
pub struct SerializeError {
    message: String,
}

impl SerializeError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A response body could not be read back.
#[derive(Debug, Clone, Error)]
#[error("failed to parse response: {message}")]
pub struct ResponseParseError {
    message: String,
}

impl ResponseParseError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
