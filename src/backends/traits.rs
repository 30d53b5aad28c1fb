//! 后端调用层 Trait 定义
//!
//! 定义模型运行时的调用接口。
//! 后端层只负责 HTTP 请求/响应和 event-stream 拆帧，不包含 Prompt 构建和文本解码。

use crate::models::{FlowRequest, InvokeAgentInput, OptimizePromptRequest};
use crate::stream::events::AgentStreamEvent;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// 字节流类型
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BackendError>> + Send>>;

/// Agent Runtime 事件流类型
pub type AgentEventStream =
    Pin<Box<dyn Stream<Item = Result<AgentStreamEvent, BackendError>> + Send>>;

/// 后端调用结果
pub type BackendResult<T> = Result<T, BackendError>;

/// 后端错误类型
///
/// 对上层是不透明的：调用方只通过 `providers::classify` 判断错误类别。
#[derive(Debug, Clone, PartialEq)]
pub struct BackendError {
    /// 错误类型
    pub kind: BackendErrorKind,
    /// 服务端返回的错误码（例如 `ThrottlingException`）
    pub code: Option<String>,
    /// 错误消息
    pub message: String,
    /// HTTP 状态码（如果有）
    pub status_code: Option<u16>,
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.code, self.status_code) {
            (Some(code), Some(status)) => {
                write!(f, "{} ({} {}): {}", self.kind, status, code, self.message)
            }
            (Some(code), None) => write!(f, "{} ({}): {}", self.kind, code, self.message),
            (None, Some(status)) => write!(f, "{} ({}): {}", self.kind, status, self.message),
            (None, None) => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for BackendError {}

/// 后端错误类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// 认证错误
    Authentication,
    /// 网络错误
    Network,
    /// 请求超时（包括流空闲超时）
    Timeout,
    /// 服务端错误
    Server,
    /// 请求格式错误
    BadRequest,
    /// 速率限制
    RateLimited,
    /// 流中途报告的服务异常
    Service,
    /// 响应体无法拆帧
    Decode,
    /// 其他错误
    Other,
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Authentication => "Authentication",
            Self::Network => "Network",
            Self::Timeout => "Timeout",
            Self::Server => "Server",
            Self::BadRequest => "BadRequest",
            Self::RateLimited => "RateLimited",
            Self::Service => "Service",
            Self::Decode => "Decode",
            Self::Other => "Other",
        };
        f.write_str(name)
    }
}

impl BackendError {
    /// 创建新的后端错误
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            status_code: None,
        }
    }

    /// 带 HTTP 状态码创建错误
    pub fn with_status(kind: BackendErrorKind, message: impl Into<String>, status: u16) -> Self {
        Self {
            status_code: Some(status),
            ..Self::new(kind, message)
        }
    }

    /// 附加服务端错误码
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// 从 HTTP 状态码推断错误类型
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => BackendErrorKind::Authentication,
            400 | 404 | 422 => BackendErrorKind::BadRequest,
            408 => BackendErrorKind::Timeout,
            429 => BackendErrorKind::RateLimited,
            500..=599 => BackendErrorKind::Server,
            _ => BackendErrorKind::Other,
        };
        Self::with_status(kind, message, status)
    }

    /// 从 reqwest 错误转换
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            BackendErrorKind::Timeout
        } else if err.is_decode() {
            BackendErrorKind::Decode
        } else {
            BackendErrorKind::Network
        };
        match err.status() {
            Some(status) => Self::with_status(kind, err.to_string(), status.as_u16()),
            None => Self::new(kind, err.to_string()),
        }
    }
}

/// SageMaker Runtime 后端
#[async_trait]
pub trait SageMakerRuntime: Send + Sync {
    /// 非流式调用端点
    ///
    /// # 返回
    ///
    /// 响应的原始字节
    async fn invoke_endpoint(&self, endpoint: &str, body: Bytes) -> BackendResult<Bytes>;

    /// 流式调用端点
    ///
    /// # 返回
    ///
    /// `PayloadPart` 负载组成的字节流，流中的服务异常以 `Err` 项给出
    async fn invoke_endpoint_stream(&self, endpoint: &str, body: Bytes)
        -> BackendResult<ByteStream>;

    /// 获取后端名称
    fn name(&self) -> &str {
        "sagemaker"
    }
}

/// Bedrock Agent Runtime 后端
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// 调用 Flow，返回事件流
    async fn invoke_flow(&self, request: &FlowRequest) -> BackendResult<AgentEventStream>;

    /// 调用 OptimizePrompt，返回事件流
    async fn optimize_prompt(
        &self,
        request: &OptimizePromptRequest,
    ) -> BackendResult<AgentEventStream>;

    /// 调用 Agent（开启追踪），返回事件流
    async fn invoke_agent(&self, input: &InvokeAgentInput) -> BackendResult<AgentEventStream>;

    /// 获取后端名称
    fn name(&self) -> &str {
        "bedrock-agent-runtime"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::new(BackendErrorKind::Network, "connection refused");
        assert_eq!(format!("{}", err), "Network: connection refused");

        let err = BackendError::with_status(BackendErrorKind::Server, "internal error", 500);
        assert_eq!(format!("{}", err), "Server (500): internal error");

        let err = BackendError::from_status(400, "bad input").with_code("ValidationException");
        assert_eq!(
            format!("{}", err),
            "BadRequest (400 ValidationException): bad input"
        );

        let err = BackendError::new(BackendErrorKind::Service, "boom").with_code("ModelStreamError");
        assert_eq!(format!("{}", err), "Service (ModelStreamError): boom");
    }

    #[test]
    fn test_backend_error_from_status() {
        let err = BackendError::from_status(401, "unauthorized");
        assert_eq!(err.kind, BackendErrorKind::Authentication);
        assert_eq!(err.status_code, Some(401));

        let err = BackendError::from_status(429, "too many requests");
        assert_eq!(err.kind, BackendErrorKind::RateLimited);

        let err = BackendError::from_status(422, "unprocessable");
        assert_eq!(err.kind, BackendErrorKind::BadRequest);

        let err = BackendError::from_status(503, "service unavailable");
        assert_eq!(err.kind, BackendErrorKind::Server);

        let err = BackendError::from_status(302, "redirect");
        assert_eq!(err.kind, BackendErrorKind::Other);
        assert!(err.code.is_none());
    }
}
