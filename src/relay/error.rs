//! 中继错误类型
//!
//! 定义在产生任何 token 之前就终止请求的错误

use crate::prompt::PromptError;
use crate::providers::InvocationError;
use thiserror::Error;

/// 请求体无法解析时返回给调用方的消息
pub const MALFORMED_REQUEST_MESSAGE: &str = "An error occurred processing your request";

/// 中继错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    /// 请求体结构非法
    #[error("请求体解析失败: {0}")]
    MalformedRequest(String),

    /// 适配器返回的请求级错误
    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

impl RelayError {
    /// 获取对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::MalformedRequest(_) => 400,
            RelayError::Invocation(InvocationError::Prompt(PromptError::UnknownModel { .. })) => {
                500
            }
            RelayError::Invocation(InvocationError::Prompt(_)) => 422,
            RelayError::Invocation(InvocationError::InvalidResponse(_)) => 502,
            RelayError::Invocation(InvocationError::UnknownAgent { .. }) => 404,
            RelayError::Invocation(InvocationError::EmptyConversation) => 400,
        }
    }

    /// 获取错误类型字符串
    pub fn error_type(&self) -> &'static str {
        match self {
            RelayError::MalformedRequest(_) => "malformed_request",
            RelayError::Invocation(InvocationError::Prompt(PromptError::UnknownModel { .. })) => {
                "unknown_model"
            }
            RelayError::Invocation(InvocationError::Prompt(PromptError::InvalidRole { .. })) => {
                "invalid_role"
            }
            RelayError::Invocation(InvocationError::Prompt(PromptError::InvalidTemplate {
                ..
            })) => "invalid_template",
            RelayError::Invocation(InvocationError::InvalidResponse(_)) => "invalid_response",
            RelayError::Invocation(InvocationError::UnknownAgent { .. }) => "unknown_agent",
            RelayError::Invocation(InvocationError::EmptyConversation) => "empty_conversation",
        }
    }

    /// 面向调用方的消息，不包含内部细节
    pub fn user_message(&self) -> String {
        match self {
            RelayError::MalformedRequest(_) => MALFORMED_REQUEST_MESSAGE.to_string(),
            RelayError::Invocation(e) => e.user_message(),
        }
    }

    /// 转换为 JSON 错误响应 `{"error": "..."}`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.user_message() })
    }

    /// 记录带上下文的错误日志
    pub fn log_with_context(&self, request_id: &str, adapter: &str) {
        tracing::warn!(
            request_id = %request_id,
            adapter = %adapter,
            error_type = %self.error_type(),
            error_message = %self,
            "[RELAY] 请求被拒绝"
        );
    }
}
