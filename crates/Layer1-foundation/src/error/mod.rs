//! Error types for herd
//!
//! 레이어 공통 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// herd 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 캐시 키 관련
    // ========================================================================
    /// A payload could not be represented as JSON (non-string map keys,
    /// non-finite floats, a failing `Serialize` impl). This is a caller bug.
    #[error("Payload is not JSON-representable: {0}")]
    Serialization(String),

    // ========================================================================
    // 네트워크 관련
    // ========================================================================
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Stream error: {0}")]
    Stream(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 사용자에게 보여줄 수 있는 에러인지 확인
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Http(_) | Error::Stream(_))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Serialization("key must be a string".to_string());
        assert_eq!(
            err.to_string(),
            "Payload is not JSON-representable: key must be a string"
        );
        assert!(!err.is_user_facing());
        assert!(Error::Stream("reset".into()).is_user_facing());
    }

    #[test]
    fn test_from_str() {
        let err: Error = "boom".into();
        assert!(matches!(err, Error::Internal(ref m) if m == "boom"));
    }
}
