//! 中继处理器
//!
//! 状态机：`Init → Streaming → Closed`
//!
//! - `Init`: 解析请求体，调用适配器获取 token 流；失败时写入 `{"error": ...}` 并关闭
//! - `Streaming`: 逐个写出 token，同时监听调用方断开
//! - `Closed`: 输出端在任何路径上都恰好关闭一次（包括 panic 和任务取消时的 Drop）

use super::error::RelayError;
use super::sink::ResponseSink;
use crate::providers::{InvocationAdapter, TokenStream};
use bytes::Bytes;
use futures::StreamExt;

/// 中继状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Init,
    Streaming,
    Closed,
}

/// 中继结果
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    /// token 流正常结束
    Completed { tokens: usize },
    /// 在输出 token 之前被拒绝
    Rejected(RelayError),
    /// 调用方中途断开
    Disconnected { tokens: usize },
}

enum Step {
    Next(Option<String>),
    Disconnected,
}

/// 单个请求的中继
pub struct Relay<S: ResponseSink> {
    sink: S,
    state: RelayState,
    request_id: String,
}

impl<S: ResponseSink> Relay<S> {
    pub fn new(sink: S, request_id: impl Into<String>) -> Self {
        Self {
            sink,
            state: RelayState::Init,
            request_id: request_id.into(),
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// 执行一次完整的中继
    pub async fn run<A>(mut self, adapter: &A, body: &[u8]) -> RelayOutcome
    where
        A: InvocationAdapter + ?Sized,
    {
        let request: A::Request = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                return self
                    .reject(RelayError::MalformedRequest(e.to_string()), adapter.name())
                    .await
            }
        };

        let tokens = match adapter.invoke_stream(request).await {
            Ok(tokens) => tokens,
            Err(e) => return self.reject(e.into(), adapter.name()).await,
        };

        self.state = RelayState::Streaming;
        let outcome = self.stream(tokens).await;
        self.close();

        match &outcome {
            RelayOutcome::Completed { tokens } => tracing::info!(
                request_id = %self.request_id,
                adapter = adapter.name(),
                tokens,
                "[RELAY] 完成"
            ),
            RelayOutcome::Disconnected { tokens } => tracing::info!(
                request_id = %self.request_id,
                adapter = adapter.name(),
                tokens,
                "[RELAY] 调用方已断开，停止读取上游"
            ),
            RelayOutcome::Rejected(_) => {}
        }
        outcome
    }

    /// 写出 token 直到流结束或调用方断开
    async fn stream(&mut self, mut tokens: TokenStream) -> RelayOutcome {
        let mut written = 0;

        loop {
            let step = tokio::select! {
                biased;
                _ = self.sink.closed() => Step::Disconnected,
                next = tokens.next() => Step::Next(next),
            };

            match step {
                Step::Next(Some(token)) => {
                    if token.is_empty() {
                        continue;
                    }
                    if self.sink.write(Bytes::from(token)).await.is_err() {
                        return RelayOutcome::Disconnected { tokens: written };
                    }
                    written += 1;
                }
                Step::Next(None) => return RelayOutcome::Completed { tokens: written },
                Step::Disconnected => return RelayOutcome::Disconnected { tokens: written },
            }
        }
    }

    /// 写入错误 JSON 并关闭
    async fn reject(&mut self, err: RelayError, adapter: &str) -> RelayOutcome {
        err.log_with_context(&self.request_id, adapter);
        let _ = self
            .sink
            .write(Bytes::from(err.to_json().to_string()))
            .await;
        self.close();
        RelayOutcome::Rejected(err)
    }

    /// 关闭输出端（幂等）
    fn close(&mut self) {
        if self.state != RelayState::Closed {
            self.sink.close();
            self.state = RelayState::Closed;
        }
    }
}

impl<S: ResponseSink> Drop for Relay<S> {
    fn drop(&mut self) {
        if self.state != RelayState::Closed {
            tracing::warn!(
                request_id = %self.request_id,
                state = ?self.state,
                "[RELAY] 中继被中断，关闭输出端"
            );
            self.close();
        }
    }
}
