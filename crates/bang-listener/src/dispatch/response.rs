//! Response records and their wire format.
//!
//! Every response is a single YAML document, opened by an explicit `---`,
//! holding a mapping with exactly four keys in a fixed order:
//!
//! ```yaml
//! ---
//! name: nightly_rebuild
//! request_id: 8f0c2a
//! result: working
//! message: |-
//!   converging web.yml
//! ```
//!
//! `message` is always written as a literal block so multi-line progress
//! output survives verbatim, even when the message is a single line.
//! Consumers depend on this layout.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_saphyr::LitStr;
use tracing::{debug, error, warn};

use crate::queue::ResponseChannel;

use super::errors::{ResponseParseError, SerializeError};

const RESPONSE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch::response");

/// Explicit document start every response body opens with.
const DOCUMENT_START: &str = "---\n";

/// Phase of a request reported by a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseState {
    /// The request was accepted and the job is about to run.
    Started,
    /// The job reported progress.
    Working,
    /// The job finished successfully.
    Success,
    /// The request or its job failed.
    Failure,
}

impl ResponseState {
    /// Wire token of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Working => "working",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for ResponseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status event for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    job_name: String,
    request_id: String,
    state: ResponseState,
    message: String,
}

#[derive(Serialize)]
struct WireResponse<'a> {
    name: &'a str,
    request_id: &'a str,
    result: ResponseState,
    message: LitStr<'a>,
}

#[derive(Deserialize)]
struct ParsedResponse {
    name: String,
    request_id: String,
    result: ResponseState,
    #[serde(default)]
    message: Option<String>,
}

impl Response {
    /// Builds a response.
    #[must_use]
    pub fn build(
        job_name: impl Into<String>,
        request_id: impl Into<String>,
        state: ResponseState,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            request_id: request_id.into(),
            state,
            message: message.into(),
        }
    }

    /// Job the response is about.
    #[must_use]
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Correlation identifier of the request.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Reported phase.
    #[must_use]
    pub const fn state(&self) -> ResponseState {
        self.state
    }

    /// Free-form message text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Renders the response in its wire format.
    ///
    /// # Errors
    ///
    /// Returns [`SerializeError`] when the YAML encoder fails.
    pub fn serialize(&self) -> Result<String, SerializeError> {
        let wire = WireResponse {
            name: &self.job_name,
            request_id: &self.request_id,
            result: self.state,
            message: LitStr(&self.message),
        };
        let body =
            serde_saphyr::to_string(&wire).map_err(|err| SerializeError::new(err.to_string()))?;
        if body.starts_with(DOCUMENT_START) {
            Ok(body)
        } else {
            Ok(format!("{DOCUMENT_START}{body}"))
        }
    }

    /// Reads a response back from its wire format.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseParseError`] when `text` is not a response document.
    pub fn parse(text: &str) -> Result<Self, ResponseParseError> {
        let parsed: ParsedResponse =
            serde_saphyr::from_str(text).map_err(|err| ResponseParseError::new(err.to_string()))?;
        Ok(Self {
            job_name: parsed.name,
            request_id: parsed.request_id,
            state: parsed.result,
            message: parsed.message.unwrap_or_default(),
        })
    }
}

/// Serializes `response` and sends it, logging rather than propagating
/// failures.
pub(crate) fn publish(channel: &dyn ResponseChannel, response: &Response) {
    let body = match response.serialize() {
        Ok(body) => body,
        Err(err) => {
            error!(
                target: RESPONSE_TARGET,
                job = response.job_name(),
                request_id = response.request_id(),
                state = %response.state(),
                error = %err,
                "response could not be serialized"
            );
            return;
        }
    };
    match channel.send(&body) {
        Ok(()) => debug!(
            target: RESPONSE_TARGET,
            job = response.job_name(),
            request_id = response.request_id(),
            state = %response.state(),
            "response sent"
        ),
        Err(err) => warn!(
            target: RESPONSE_TARGET,
            job = response.job_name(),
            request_id = response.request_id(),
            state = %response.state(),
            error = %err,
            "response could not be sent"
        ),
    }
}
