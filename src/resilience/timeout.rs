//! 超时控制实现
//!
//! 提供请求超时配置和流式响应空闲超时功能

use crate::backends::{BackendError, BackendErrorKind};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 超时配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// 请求超时（毫秒），0 表示无超时
    /// 非流式请求覆盖整个请求；流式请求只覆盖等待响应头，响应体由空闲超时约束
    pub request_timeout_ms: u64,
    /// 流式响应空闲超时（毫秒），0 表示无超时
    /// 当流式响应中两个 chunk 之间的间隔超过此值时触发超时
    pub stream_idle_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 300_000,
            stream_idle_timeout_ms: 60_000,
        }
    }
}

impl TimeoutConfig {
    pub fn new(request_timeout_ms: u64, stream_idle_timeout_ms: u64) -> Self {
        Self {
            request_timeout_ms,
            stream_idle_timeout_ms,
        }
    }

    /// 创建无超时的配置
    pub fn no_timeout() -> Self {
        Self::new(0, 0)
    }

    /// 获取请求超时 Duration
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    /// 获取流式空闲超时 Duration
    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        (self.stream_idle_timeout_ms > 0)
            .then(|| Duration::from_millis(self.stream_idle_timeout_ms))
    }
}

/// 超时错误
#[derive(Debug, Clone, PartialEq)]
pub enum TimeoutError {
    /// 流式响应空闲超时
    StreamIdleTimeout { timeout_ms: u64 },
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutError::StreamIdleTimeout { timeout_ms } => {
                write!(f, "流式响应空闲超时: 超过 {}ms 未收到数据", timeout_ms)
            }
        }
    }
}

impl std::error::Error for TimeoutError {}

impl From<TimeoutError> for BackendError {
    fn from(err: TimeoutError) -> Self {
        BackendError::new(BackendErrorKind::Timeout, err.to_string())
    }
}

/// 为后端流加上空闲超时
///
/// 两次产出之间超过 `idle_timeout` 时输出一个 `Timeout` 错误并结束，
/// 同时丢弃内部流以释放连接。`None` 时原样透传。
pub fn with_idle_timeout<S, T>(
    stream: S,
    idle_timeout: Option<Duration>,
) -> impl Stream<Item = Result<T, BackendError>>
where
    S: Stream<Item = Result<T, BackendError>> + Send + 'static,
    T: Send + 'static,
{
    async_stream::stream! {
        let mut stream = std::pin::pin!(stream);

        loop {
            let next = match idle_timeout {
                Some(timeout) => match tokio::time::timeout(timeout, stream.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        let err = TimeoutError::StreamIdleTimeout {
                            timeout_ms: timeout.as_millis() as u64,
                        };
                        tracing::warn!("[TIMEOUT] {}", err);
                        yield Err(err.into());
                        return;
                    }
                },
                None => stream.next().await,
            };

            match next {
                Some(item) => yield item,
                None => return,
            }
        }
    }
}
