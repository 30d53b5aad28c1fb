//! 流式解码错误

use crate::backends::BackendError;
use thiserror::Error;

/// 流式解码过程中的错误
#[derive(Error, Debug, Clone)]
pub enum StreamError {
    /// 帧内容无法解析（协议不匹配）
    #[error("解码错误: {0}")]
    Decode(String),

    /// 上游流本身报告的错误
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl StreamError {
    pub fn decode(msg: impl Into<String>) -> Self {
        StreamError::Decode(msg.into())
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, StreamError::Decode(_))
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::BackendErrorKind;

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{broken").unwrap_err();
        let err: StreamError = json_err.into();
        assert!(err.is_decode());
    }

    #[test]
    fn test_backend_error_is_transparent() {
        let backend = BackendError::new(BackendErrorKind::Network, "connection reset");
        let err: StreamError = backend.into();
        assert!(!err.is_decode());
        assert_eq!(err.to_string(), "Network: connection reset");
    }
}
