//! Request decoding, response encoding and job coordination.
//!
//! The dispatch pipeline turns one inbound message into a sequence of
//! [`Response`]s: [`decode`] validates the message, the job catalog resolves
//! the named job, and the [`ExecutionCoordinator`] runs it while streaming
//! progress. Every failure along the way becomes a `failure` response rather
//! than an error returned to the polling loop.

mod coordinator;
mod errors;
mod request;
mod response;

pub use coordinator::{ExecutionCoordinator, STARTED_MESSAGE, SUCCESS_MESSAGE, failure_message};
pub use errors::{DecodeError, ResponseParseError, SerializeError, UNKNOWN};
pub use request::{Request, decode, decode_body};
pub use response::{Response, ResponseState};

pub(crate) use response::publish;

/// Message of the failure response sent when a job has no catalog entry.
pub const JOB_MISSING_MESSAGE: &str = "Job definition is missing.";

/// Failure text for a message that could not be decoded.
#[must_use]
pub fn invalid_message(error: &DecodeError) -> String {
    format!("Invalid Message: {error}")
}
