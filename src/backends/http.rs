//! HTTP 后端公共逻辑
//!
//! 错误响应解析和 event-stream 响应体拆帧，供各运行时客户端共用。

use super::signing::RequestAuth;
use super::traits::{BackendError, BackendErrorKind};
use crate::stream::event_stream::{EventMessage, EventStreamDecoder};
use futures::{Stream, StreamExt};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

/// AWS 错误类型响应头
const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

/// 运行时端点配置
#[derive(Debug, Clone)]
pub struct RuntimeEndpoint {
    /// 基础 URL，不含结尾的 `/`
    pub base_url: String,
    pub auth: RequestAuth,
    /// 非流式请求的总超时，流式请求等待响应头的超时
    pub request_timeout: Option<Duration>,
}

/// 响应体的读取方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// 一次读完，超时覆盖整个请求
    Buffered,
    /// 逐块读取，超时只覆盖响应头，响应体由流空闲超时约束
    Streaming,
}

impl RuntimeEndpoint {
    pub fn new(base_url: impl Into<String>, auth: RequestAuth) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            request_timeout: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// 拼接请求 URL
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 认证并发送请求，非 2xx 响应转换为 `BackendError`
    pub async fn send(
        &self,
        client: &Client,
        builder: RequestBuilder,
        mode: ResponseMode,
    ) -> Result<Response, BackendError> {
        let builder = match (mode, self.request_timeout) {
            (ResponseMode::Buffered, Some(timeout)) => builder.timeout(timeout),
            _ => builder,
        };
        let mut request = builder.build().map_err(BackendError::from_reqwest)?;
        self.auth.apply(&mut request).await?;

        let response = match (mode, self.request_timeout) {
            (ResponseMode::Streaming, Some(timeout)) => {
                tokio::time::timeout(timeout, client.execute(request))
                    .await
                    .map_err(|_| {
                        BackendError::new(
                            BackendErrorKind::Timeout,
                            format!("等待响应头超时 ({}ms)", timeout.as_millis()),
                        )
                    })?
            }
            _ => client.execute(request).await,
        };
        check_status(response.map_err(BackendError::from_reqwest)?).await
    }
}

/// 非 2xx 响应转换为 `BackendError`
pub async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let header_code = response
        .headers()
        .get(ERROR_TYPE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();
    Err(error_from_body(status.as_u16(), header_code.as_deref(), &body))
}

/// 由错误响应构造 `BackendError`
///
/// 错误码优先取 `x-amzn-errortype` 头，其次取响应体的 `__type` / `code`。
pub fn error_from_body(status: u16, header_code: Option<&str>, body: &str) -> BackendError {
    let json: Option<Value> = serde_json::from_str(body).ok();

    let body_code = json.as_ref().and_then(|v| {
        v.get("__type")
            .or_else(|| v.get("code"))
            .or_else(|| v.get("Code"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
    });
    let message = json
        .as_ref()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("Message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string());

    let mut error = BackendError::from_status(status, message);
    error.code = header_code
        .map(str::to_string)
        .or(body_code)
        .map(|code| normalize_error_code(&code));
    error
}

/// 去掉错误码的命名空间和附加信息
///
/// `com.amazon.coral#ThrottlingException` 和
/// `ValidationException:http://internal.amazon.com/...` 都归一为裸错误码。
pub fn normalize_error_code(code: &str) -> String {
    let code = code.rsplit('#').next().unwrap_or(code);
    let code = code.split(':').next().unwrap_or(code);
    code.trim().to_string()
}

/// 将 event-stream 响应体拆分为消息流
pub fn event_messages(response: Response) -> impl Stream<Item = Result<EventMessage, BackendError>> {
    async_stream::stream! {
        let mut decoder = EventStreamDecoder::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(BackendError::from_reqwest(e));
                    return;
                }
            };
            match decoder.push(&chunk) {
                Ok(messages) => {
                    for message in messages {
                        yield Ok(message);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        if let Err(e) = decoder.finish() {
            yield Err(e);
        }
    }
}

/// 解析事件负载为 JSON
pub fn payload_json(message: &EventMessage) -> Result<Value, BackendError> {
    if message.payload.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(&message.payload).map_err(|e| {
        BackendError::new(
            BackendErrorKind::Decode,
            format!("事件负载不是合法 JSON: {}", e),
        )
    })
}
