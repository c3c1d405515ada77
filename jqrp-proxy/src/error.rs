//! Error Types for the jqrp proxy
//!
//! Every failure on the response path is classified exactly once into an
//! [`ErrorCode`], which decides the status sent to the client. Failed
//! responses carry no body: the client only learns the status.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use jqrp_core::{DecodeError, EvaluationError, RewriteError};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Failure categories of the transformation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Query failed to compile or signalled a failure while running
    InvalidQuery,

    /// Query evaluation exceeded the configured deadline
    EvaluationTimeout,

    /// Query produced a single null or scalar result
    IllegalQueryResult,

    /// Upstream body was not a single array- or object-rooted document
    InvalidResponseBody,

    /// Upstream Content-Type was not application/json
    IllegalResponseType,

    /// Anything else, including transport failures
    Internal,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidQuery => StatusCode::BAD_REQUEST,
            ErrorCode::EvaluationTimeout => StatusCode::REQUEST_TIMEOUT,
            ErrorCode::IllegalQueryResult => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::InvalidResponseBody | ErrorCode::IllegalResponseType => {
                StatusCode::BAD_GATEWAY
            }
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidQuery => "Invalid query",
            ErrorCode::EvaluationTimeout => "Query evaluation timed out",
            ErrorCode::IllegalQueryResult => "Illegal query result",
            ErrorCode::InvalidResponseBody => "Invalid response body",
            ErrorCode::IllegalResponseType => "Illegal response type",
            ErrorCode::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// PROXY ERROR STRUCT
// ============================================================================

/// A classified pipeline failure. The message is for logs only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyError {
    pub code: ErrorCode,
    pub message: String,
}

/// Result type for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;

impl ProxyError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create an error with the code's default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidQuery, message)
    }

    pub fn evaluation_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EvaluationTimeout, message)
    }

    pub fn illegal_query_result(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IllegalQueryResult, message)
    }

    pub fn invalid_response_body(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidResponseBody, message)
    }

    pub fn illegal_response_type(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IllegalResponseType, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ProxyError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Status only, empty body.
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_LENGTH, "0")],
            Body::empty(),
        )
            .into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM PIPELINE ERRORS
// ============================================================================

impl From<EvaluationError> for ProxyError {
    fn from(err: EvaluationError) -> Self {
        if err.is_query_fault() {
            return ProxyError::invalid_query(err.to_string());
        }
        match err {
            EvaluationError::Timeout { .. } => ProxyError::evaluation_timeout(err.to_string()),
            _ => ProxyError::internal_error(err.to_string()),
        }
    }
}

impl From<DecodeError> for ProxyError {
    fn from(err: DecodeError) -> Self {
        ProxyError::invalid_response_body(err.to_string())
    }
}

impl From<RewriteError> for ProxyError {
    fn from(err: RewriteError) -> Self {
        match err {
            RewriteError::IllegalQueryResult { .. } => {
                ProxyError::illegal_query_result(err.to_string())
            }
            RewriteError::Encoding { .. } => ProxyError::internal_error(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        ProxyError::internal_error(format!("Upstream request failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jqrp_core::CompileError;
    use std::time::Duration;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidQuery.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::EvaluationTimeout.status_code(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            ErrorCode::IllegalQueryResult.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ErrorCode::InvalidResponseBody.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorCode::IllegalResponseType.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorCode::Internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_evaluation_error_classification() {
        let err = ProxyError::from(EvaluationError::from(CompileError::new("bad")));
        assert_eq!(err.code, ErrorCode::InvalidQuery);

        let err = ProxyError::from(EvaluationError::Failed {
            reason: "cannot index".to_string(),
        });
        assert_eq!(err.code, ErrorCode::InvalidQuery);

        let err = ProxyError::from(EvaluationError::Timeout {
            deadline: Duration::from_millis(10),
        });
        assert_eq!(err.code, ErrorCode::EvaluationTimeout);

        let err = ProxyError::from(EvaluationError::Aborted {
            reason: "panic".to_string(),
        });
        assert_eq!(err.code, ErrorCode::Internal);
    }

    #[test]
    fn test_decode_and_rewrite_classification() {
        for decode in [
            DecodeError::MultipleRoots,
            DecodeError::PrimitiveRoot,
            DecodeError::Malformed {
                reason: "EOF".to_string(),
            },
        ] {
            assert_eq!(ProxyError::from(decode).code, ErrorCode::InvalidResponseBody);
        }

        let err = ProxyError::from(RewriteError::IllegalQueryResult { kind: "null" });
        assert_eq!(err.code, ErrorCode::IllegalQueryResult);
        assert_eq!(err.message, "Query resulted in null type");
    }

    #[test]
    fn test_into_response_has_empty_body() {
        let response = ProxyError::from_code(ErrorCode::IllegalResponseType).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            response.headers().get(header::CONTENT_LENGTH).unwrap(),
            "0"
        );
    }
}
