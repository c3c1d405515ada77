//! Error types for the query transformation pipeline.
//!
//! Each stage of the pipeline has its own error enum so that a failure is
//! classified exactly once, where it is detected. The proxy layer maps these
//! onto HTTP status codes.

use std::time::Duration;
use thiserror::Error;

/// The query text could not be turned into a runnable program.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Query failed to compile: {reason}")]
pub struct CompileError {
    pub reason: String,
}

impl CompileError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Failures of [`BoundedEvaluator::evaluate`](crate::BoundedEvaluator::evaluate).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The program ran but signalled a failure value. Results collected
    /// before the failure are discarded.
    #[error("Query evaluation failed: {reason}")]
    Failed { reason: String },

    #[error("Query evaluation timed out after {deadline:?}")]
    Timeout { deadline: Duration },

    /// The execution unit died without reporting (panic or runtime shutdown).
    #[error("Query evaluation aborted: {reason}")]
    Aborted { reason: String },
}

impl EvaluationError {
    /// True when the root cause is the query itself (compile or runtime
    /// failure), as opposed to the deadline or the host.
    pub fn is_query_fault(&self) -> bool {
        matches!(self, Self::Compile(_) | Self::Failed { .. })
    }
}

/// Failures of [`decode_single_root`](crate::decode_single_root).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed JSON: {reason}")]
    Malformed { reason: String },

    #[error("Root type is primitive")]
    PrimitiveRoot,

    #[error("Multiple roots")]
    MultipleRoots,
}

/// Failures of [`rewrite`](crate::rewrite).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RewriteError {
    /// A single result that has no standalone JSON representation as a
    /// rewritten body (`null`, string, number or boolean).
    #[error("Query resulted in {kind} type")]
    IllegalQueryResult { kind: &'static str },

    #[error("Failed to encode query result: {reason}")]
    Encoding { reason: String },
}

impl From<serde_json::Error> for RewriteError {
    fn from(err: serde_json::Error) -> Self {
        RewriteError::Encoding {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_fault_classification() {
        assert!(EvaluationError::from(CompileError::new("bad")).is_query_fault());
        assert!(EvaluationError::Failed {
            reason: "boom".to_string()
        }
        .is_query_fault());
        assert!(!EvaluationError::Timeout {
            deadline: Duration::from_millis(5)
        }
        .is_query_fault());
        assert!(!EvaluationError::Aborted {
            reason: "panic".to_string()
        }
        .is_query_fault());
    }

    #[test]
    fn test_compile_error_is_transparent() {
        let err = EvaluationError::from(CompileError::new("unexpected token"));
        assert_eq!(err.to_string(), "Query failed to compile: unexpected token");
    }

    #[test]
    fn test_illegal_result_display() {
        let err = RewriteError::IllegalQueryResult { kind: "null" };
        assert_eq!(err.to_string(), "Query resulted in null type");
    }
}
