//! Invocation Adapter Trait 定义
//!
//! 统一的调用接口：请求 → 惰性 token 流。

use crate::logger::sanitize_log_message;
use crate::models::Token;
use crate::providers::error::{
    classify_stream_error, fault_detail, FallbackMessages, FaultKind, InvocationError,
};
use crate::stream::{DecodedTokenStream, StreamError};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::pin::Pin;

/// 输出 token 流
///
/// 上游故障已转换为回退 token，流本身不再携带错误。
pub type TokenStream = Pin<Box<dyn Stream<Item = Token> + Send>>;

/// 调用适配器
#[async_trait]
pub trait InvocationAdapter: Send + Sync {
    /// 入站请求类型
    type Request: DeserializeOwned + Send + 'static;

    /// 适配器名称（用于日志）
    fn name(&self) -> &'static str;

    /// 流式调用
    ///
    /// 仅在产生任何输出前就能确定的请求级错误（模型未知、角色非法、模板非法）返回 `Err`。
    async fn invoke_stream(&self, request: Self::Request) -> Result<TokenStream, InvocationError>;

    /// 非流式调用，默认拼接整个 token 流
    async fn invoke(&self, request: Self::Request) -> Result<String, InvocationError> {
        let tokens: Vec<Token> = self.invoke_stream(request).await?.collect().await;
        Ok(tokens.concat())
    }
}

/// token 的输出形态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenShape {
    /// 每个 token 之后追加的文本
    pub token_suffix: &'static str,
    /// 正常结束后追加的 token
    pub completion: Option<&'static str>,
}

impl TokenShape {
    pub const PLAIN: Self = Self {
        token_suffix: "",
        completion: None,
    };
}

/// 将可能以错误结束的解码流转换为输出 token 流
///
/// 遇到第一个错误时记录日志，输出一个回退 token 后结束。
pub fn with_fallback(
    decoded: DecodedTokenStream,
    fallback: FallbackMessages,
    shape: TokenShape,
    adapter: &'static str,
) -> TokenStream {
    Box::pin(async_stream::stream! {
        let mut decoded = decoded;

        while let Some(item) = decoded.next().await {
            match item {
                Ok(token) => {
                    if shape.token_suffix.is_empty() {
                        yield token;
                    } else {
                        yield format!("{}{}", token, shape.token_suffix);
                    }
                }
                Err(err) => {
                    yield fallback_token(&err, &fallback, adapter);
                    return;
                }
            }
        }

        if let Some(completion) = shape.completion {
            yield completion.to_string();
        }
    })
}

/// 上游调用在建立流之前失败
pub fn failed_stream(
    err: StreamError,
    fallback: FallbackMessages,
    adapter: &'static str,
) -> TokenStream {
    let token = fallback_token(&err, &fallback, adapter);
    Box::pin(futures::stream::once(async move { token }))
}

/// 记录故障并生成回退 token
fn fallback_token(err: &StreamError, fallback: &FallbackMessages, adapter: &'static str) -> Token {
    let fault = classify_stream_error(err);
    let detail = fault_detail(err);

    match fault {
        FaultKind::Throttled | FaultKind::QuotaExceeded => {
            tracing::warn!(adapter, ?fault, "[PROVIDER] 上游繁忙");
        }
        FaultKind::DependencyFailed => {
            tracing::warn!(
                adapter,
                detail = %sanitize_log_message(&detail),
                "[PROVIDER] 依赖的模型不可用"
            );
        }
        FaultKind::ValidationFailed => {
            tracing::warn!(
                adapter,
                detail = %sanitize_log_message(&detail),
                "[PROVIDER] 请求校验失败"
            );
        }
        FaultKind::Decode | FaultKind::Unknown => {
            tracing::error!(
                adapter,
                ?fault,
                error = %sanitize_log_message(&err.to_string()),
                "[PROVIDER] 上游调用失败"
            );
        }
    }

    fallback.message(fault, &detail)
}
