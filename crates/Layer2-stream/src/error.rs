//! Stream-specific error types
//!
//! StreamError는 스트리밍 연결/읽기 에러를 관리합니다.
//! herd_foundation::Error와의 변환을 지원합니다.

use herd_foundation::Error as FoundationError;
use thiserror::Error;

/// Errors delivered to a sink's `on_error`
///
/// Every variant is terminal for the session that produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Request could not be built (bad header name/value, bad URL)
    #[error("Invalid stream request: {0}")]
    InvalidRequest(String),

    /// Connection could not be established
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Server answered with a non-success status
    #[error("Stream connection failed with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Reading the body failed mid-stream
    #[error("Stream read failed: {0}")]
    Read(String),
}

impl StreamError {
    pub fn from_http_status(status: u16, body: &str) -> Self {
        StreamError::Status {
            status,
            body: body.to_string(),
        }
    }

    /// HTTP status code, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            StreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            StreamError::InvalidRequest(err.to_string())
        } else if err.is_body() || err.is_decode() {
            StreamError::Read(err.to_string())
        } else {
            StreamError::Connect(err.to_string())
        }
    }
}

// ============================================================================
// herd_foundation::Error 변환
// ============================================================================

impl From<StreamError> for FoundationError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::InvalidRequest(msg) => FoundationError::Config(msg),
            StreamError::Connect(msg) => FoundationError::Http(msg),
            StreamError::Status { .. } => FoundationError::Http(err.to_string()),
            StreamError::Read(msg) => FoundationError::Stream(msg),
        }
    }
}
