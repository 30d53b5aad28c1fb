//! Provider 错误分类与回退消息
//!
//! 上游故障不会以错误形式返回给调用方，而是映射为一条面向用户的回退 token。

use crate::backends::{BackendError, BackendErrorKind};
use crate::prompt::PromptError;
use crate::stream::StreamError;
use thiserror::Error;

/// 上游故障类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// 限流
    Throttled,
    /// 配额耗尽
    QuotaExceeded,
    /// 请求校验失败
    ValidationFailed,
    /// 依赖的模型不可用（未开通访问权限）
    DependencyFailed,
    /// 响应无法解码
    Decode,
    /// 其他故障
    Unknown,
}

impl FaultKind {
    /// 是否按"服务繁忙"处理
    pub fn is_overload(&self) -> bool {
        matches!(self, FaultKind::Throttled | FaultKind::QuotaExceeded)
    }
}

const THROTTLE_CODES: [&str; 4] = [
    "throttlingexception",
    "toomanyrequestsexception",
    "throttledexception",
    "requestlimitexceeded",
];
const QUOTA_CODES: [&str; 2] = ["servicequotaexceededexception", "quotaexceededexception"];
const DEPENDENCY_CODE: &str = "dependencyfailedexception";
const VALIDATION_CODES: [&str; 3] = [
    "validationexception",
    "validationerror",
    "invalidrequestexception",
];

/// 对后端错误分类
///
/// 依次依据错误码、HTTP 状态码、错误消息判断。
pub fn classify(err: &BackendError) -> FaultKind {
    if let Some(code) = &err.code {
        let code = code.to_ascii_lowercase();
        if THROTTLE_CODES.contains(&code.as_str()) {
            return FaultKind::Throttled;
        }
        if QUOTA_CODES.contains(&code.as_str()) {
            return FaultKind::QuotaExceeded;
        }
        if VALIDATION_CODES.contains(&code.as_str()) {
            return FaultKind::ValidationFailed;
        }
        if code == DEPENDENCY_CODE {
            return FaultKind::DependencyFailed;
        }
    }

    match err.status_code {
        Some(429) => return FaultKind::Throttled,
        Some(424) => return FaultKind::DependencyFailed,
        Some(400) | Some(422) => return FaultKind::ValidationFailed,
        _ => {}
    }

    let message = err.message.to_ascii_lowercase();
    if message.contains("throttl")
        || message.contains("rate exceeded")
        || message.contains("too many requests")
    {
        return FaultKind::Throttled;
    }
    if message.contains("quota") {
        return FaultKind::QuotaExceeded;
    }

    match err.kind {
        BackendErrorKind::RateLimited => FaultKind::Throttled,
        BackendErrorKind::Decode => FaultKind::Decode,
        _ => FaultKind::Unknown,
    }
}

/// 对流错误分类
pub fn classify_stream_error(err: &StreamError) -> FaultKind {
    match err {
        StreamError::Decode(_) => FaultKind::Decode,
        StreamError::Backend(backend) => classify(backend),
    }
}

/// 面向用户的错误详情：`<错误码>: <消息>`
pub fn fault_detail(err: &StreamError) -> String {
    match err {
        StreamError::Backend(BackendError {
            code: Some(code),
            message,
            ..
        }) => format!("{}: {}", code, message),
        StreamError::Backend(backend) => backend.message.clone(),
        StreamError::Decode(message) => message.clone(),
    }
}

pub const OVERLOAD_MESSAGE: &str =
    "The server is currently experiencing high access. Please try again later.";
pub const GENERIC_MESSAGE: &str = "An error occurred. Please try again later.";
pub const REPORT_MESSAGE: &str =
    "An error occurred. Please report the following error to the administrator.";

/// 模型未开通时的提示，附带控制台 Model Access 页面链接
pub fn model_access_message(region: &str) -> String {
    format!(
        "The selected model is not enabled. Please enable the model in the \
         [Bedrock console Model Access screen](https://{region}.console.aws.amazon.com/bedrock/home?region={region}#/modelaccess).",
        region = region
    )
}

/// 适配器的回退消息集合
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackMessages {
    /// 校验失败消息前缀，后接 `\n {detail}`
    pub validation_prefix: &'static str,
    /// 是否以 JSON 字符串形式输出
    pub json_encoded: bool,
    /// 其他故障是否附带错误详情，供管理员排查
    pub report_detail: bool,
    /// 设置后，模型未开通时提示对应区域的 Model Access 页面
    pub model_access_region: Option<String>,
}

impl FallbackMessages {
    /// Flow / SageMaker
    pub const STANDARD: Self = Self {
        validation_prefix: "Format error.",
        json_encoded: false,
        report_detail: false,
        model_access_region: None,
    };

    /// OptimizePrompt
    pub const OPTIMIZE_PROMPT: Self = Self {
        validation_prefix: "The usage limit has been exceeded or the request is invalid. ",
        json_encoded: true,
        report_detail: false,
        model_access_region: None,
    };

    /// InvokeAgent
    pub fn agent(region: impl Into<String>) -> Self {
        Self {
            validation_prefix: "",
            json_encoded: false,
            report_detail: true,
            model_access_region: Some(region.into()),
        }
    }

    /// 生成回退消息
    pub fn message(&self, fault: FaultKind, detail: &str) -> String {
        let text = match (fault, &self.model_access_region) {
            (FaultKind::Throttled | FaultKind::QuotaExceeded, _) => OVERLOAD_MESSAGE.to_string(),
            (FaultKind::DependencyFailed, Some(region)) => model_access_message(region),
            _ if self.report_detail => format!("{}\n{}", REPORT_MESSAGE, detail),
            (FaultKind::ValidationFailed, _) => {
                format!("{}\n {}", self.validation_prefix, detail)
            }
            _ => GENERIC_MESSAGE.to_string(),
        };
        if self.json_encoded {
            serde_json::Value::String(text).to_string()
        } else {
            text
        }
    }
}

/// 调用错误
///
/// 只有请求级致命错误才以 `Err` 返回，上游故障已转为回退 token。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvocationError {
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// 非流式调用的响应无法解析
    #[error("响应格式错误: {0}")]
    InvalidResponse(String),

    /// `modelId` 不在 Agent 映射中
    #[error("Agent not found: {model}")]
    UnknownAgent { model: String },

    /// 对话中没有消息
    #[error("No messages to send")]
    EmptyConversation,
}

impl InvocationError {
    /// 面向用户的错误消息
    pub fn user_message(&self) -> String {
        match self {
            InvocationError::Prompt(e) => e.to_string(),
            InvocationError::InvalidResponse(_) => GENERIC_MESSAGE.to_string(),
            InvocationError::UnknownAgent { .. } | InvocationError::EmptyConversation => {
                self.to_string()
            }
        }
    }
}
