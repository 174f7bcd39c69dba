//! Decoding inbound messages into requests.
//!
//! A request body is a single YAML document with one top-level key naming
//! the job:
//!
//! ```yaml
//! nightly_rebuild:
//!   request_id: 8f0c2a
//!   parameters:
//!     - fast
//!     - skip-tests
//! ```
//!
//! Decoding happens in two steps. The body is first parsed into a generic
//! document, which is then checked against the request shape so every
//! failure maps onto exactly one [`DecodeError`] variant.

use serde_json::{Map, Value};

use crate::queue::InboundMessage;

use super::errors::DecodeError;

const REQUEST_ID_KEY: &str = "request_id";
const PARAMETERS_KEY: &str = "parameters";

/// A decoded job request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    job_name: String,
    request_id: String,
    parameters: Option<Vec<String>>,
}

impl Request {
    #[cfg(test)]
    pub(crate) fn new(
        job_name: impl Into<String>,
        request_id: impl Into<String>,
        parameters: Option<Vec<String>>,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            request_id: request_id.into(),
            parameters,
        }
    }

    /// Job named by the request.
    #[must_use]
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Caller-chosen correlation identifier.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Parameters in the order supplied, absent when the request has none.
    #[must_use]
    pub fn parameters(&self) -> Option<&[String]> {
        self.parameters.as_deref()
    }

    /// Splits the request into `(job_name, request_id, parameters)`.
    #[must_use]
    pub fn into_parts(self) -> (String, String, Option<Vec<String>>) {
        (self.job_name, self.request_id, self.parameters)
    }
}

/// Decodes a possibly absent inbound message.
///
/// # Errors
///
/// Returns [`DecodeError::NoMessage`] when `message` is `None`,
/// [`DecodeError::EmptyBody`] when it carries no text, and the errors of
/// [`decode_body`] otherwise.
pub fn decode(message: Option<&InboundMessage>) -> Result<Request, DecodeError> {
    let message = message.ok_or(DecodeError::NoMessage)?;
    let body = message
        .body()
        .filter(|body| !body.is_empty())
        .ok_or(DecodeError::EmptyBody)?;
    decode_body(body)
}

/// Decodes request body text.
///
/// # Errors
///
/// Returns [`DecodeError::MissingJobName`] when the body is not a mapping
/// with exactly one key, [`DecodeError::MissingData`] when that key maps to
/// nothing and [`DecodeError::MalformedRequest`] when the request data lacks
/// a usable `request_id` or carries invalid parameters.
pub fn decode_body(body: &str) -> Result<Request, DecodeError> {
    if body.is_empty() {
        return Err(DecodeError::EmptyBody);
    }
    let document: Value = serde_saphyr::from_str(body)
        .map_err(|error| DecodeError::missing_job_name(error.to_string()))?;
    let (job_name, data) = single_entry(document)?;
    let data = match data {
        Value::Null => return Err(DecodeError::MissingData { job_name }),
        Value::Object(data) => data,
        _ => return Err(DecodeError::malformed(job_name, "request data must be a mapping")),
    };
    let request_id = request_id(&job_name, &data)?;
    let parameters = parameters(&job_name, &data)?;
    Ok(Request {
        job_name,
        request_id,
        parameters,
    })
}

fn single_entry(document: Value) -> Result<(String, Value), DecodeError> {
    let Value::Object(mapping) = document else {
        return Err(DecodeError::missing_job_name("message is not a mapping"));
    };
    if mapping.len() != 1 {
        return Err(DecodeError::missing_job_name(format!(
            "expected exactly one top-level key, found {}",
            mapping.len()
        )));
    }
    let (job_name, data) = mapping
        .into_iter()
        .next()
        .ok_or_else(|| DecodeError::missing_job_name("message is empty"))?;
    if job_name.trim().is_empty() {
        return Err(DecodeError::missing_job_name("job name is blank"));
    }
    Ok((job_name, data))
}

fn request_id(job_name: &str, data: &Map<String, Value>) -> Result<String, DecodeError> {
    match data.get(REQUEST_ID_KEY) {
        None | Some(Value::Null) => Err(DecodeError::malformed(job_name, "request_id is missing")),
        Some(value) => scalar_text(value)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                DecodeError::malformed(job_name, "request_id must be a non-empty scalar")
            }),
    }
}

fn parameters(
    job_name: &str,
    data: &Map<String, Value>,
) -> Result<Option<Vec<String>>, DecodeError> {
    match data.get(PARAMETERS_KEY) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(scalar_text)
            .collect::<Option<Vec<_>>>()
            .map(Some)
            .ok_or_else(|| DecodeError::malformed(job_name, "parameters must be scalars")),
        Some(_) => Err(DecodeError::malformed(
            job_name,
            "parameters must be a sequence",
        )),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
