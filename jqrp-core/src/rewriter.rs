//! Result rewrite policy.
//!
//! Turns the outputs of one evaluation into the body that replaces the
//! upstream response. A successful rewrite always yields a JSON array or
//! object; a lone scalar result is refused because on the wire it could not
//! be told apart from an untransformed response.

use bytes::Bytes;
use http::StatusCode;
use serde_json::Value;

use crate::error::RewriteError;

/// Status of every successful rewrite.
pub const REWRITE_STATUS: StatusCode = StatusCode::NON_AUTHORITATIVE_INFORMATION;

/// A rewritten response body and its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub body: Bytes,
    pub status: StatusCode,
}

impl Rewrite {
    fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            status: REWRITE_STATUS,
        }
    }

    /// Exact byte length of the new body.
    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}

/// Apply the rewrite decision table to `results`.
///
/// `fallback` is written verbatim when there are no results; callers pass the
/// empty literal matching the upstream root shape.
pub fn rewrite(results: &[Value], fallback: &'static [u8]) -> Result<Rewrite, RewriteError> {
    match results {
        [] => Ok(Rewrite::new(Bytes::from_static(fallback))),
        [single] => match single {
            Value::Array(_) | Value::Object(_) => Ok(Rewrite::new(serde_json::to_vec(single)?)),
            scalar => Err(RewriteError::IllegalQueryResult {
                kind: scalar_kind(scalar),
            }),
        },
        many => Ok(Rewrite::new(serde_json::to_vec(many)?)),
    }
}

fn scalar_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
