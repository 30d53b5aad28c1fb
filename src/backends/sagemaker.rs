//! SageMaker Runtime HTTP 后端
//!
//! - `POST /endpoints/{name}/invocations`
//! - `POST /endpoints/{name}/invocations-response-stream`

use super::http::{self, ResponseMode, RuntimeEndpoint};
use super::traits::{BackendError, BackendErrorKind, BackendResult, ByteStream, SageMakerRuntime};
use crate::stream::event_stream::EventMessage;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;

/// 流式负载事件
const PAYLOAD_PART: &str = "PayloadPart";
/// 流中途可能出现的异常事件
const STREAM_ERROR_EVENTS: [&str; 2] = ["ModelStreamError", "InternalStreamFailure"];

/// 基于 reqwest 的 SageMaker Runtime 客户端
#[derive(Debug, Clone)]
pub struct HttpSageMakerRuntime {
    client: Client,
    endpoint: RuntimeEndpoint,
}

impl HttpSageMakerRuntime {
    pub fn new(client: Client, endpoint: RuntimeEndpoint) -> Self {
        Self { client, endpoint }
    }

    fn invocation_url(&self, endpoint_name: &str, stream: bool) -> String {
        let action = if stream {
            "invocations-response-stream"
        } else {
            "invocations"
        };
        self.endpoint.url(&format!(
            "/endpoints/{}/{}",
            urlencoding::encode(endpoint_name),
            action
        ))
    }
}

#[async_trait]
impl SageMakerRuntime for HttpSageMakerRuntime {
    async fn invoke_endpoint(&self, endpoint: &str, body: Bytes) -> BackendResult<Bytes> {
        let builder = self
            .client
            .post(self.invocation_url(endpoint, false))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(body);
        let response = self
            .endpoint
            .send(&self.client, builder, ResponseMode::Buffered)
            .await?;
        response.bytes().await.map_err(BackendError::from_reqwest)
    }

    async fn invoke_endpoint_stream(
        &self,
        endpoint: &str,
        body: Bytes,
    ) -> BackendResult<ByteStream> {
        let builder = self
            .client
            .post(self.invocation_url(endpoint, true))
            .header("Content-Type", "application/json")
            .header("X-Amzn-SageMaker-Accept", "application/json")
            .body(body);
        let response = self
            .endpoint
            .send(&self.client, builder, ResponseMode::Streaming)
            .await?;
        tracing::debug!("[SAGEMAKER] 流式响应已建立: endpoint={}", endpoint);
        Ok(payload_parts(http::event_messages(response)))
    }
}

/// 从 event-stream 消息中提取 `PayloadPart` 负载
///
/// 异常消息产生一个 `Err` 后结束，其他事件忽略。
pub fn payload_parts<S>(messages: S) -> ByteStream
where
    S: Stream<Item = Result<EventMessage, BackendError>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut messages = std::pin::pin!(messages);

        while let Some(message) = messages.next().await {
            let message = match message {
                Ok(message) => message,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            if message.is_exception() {
                yield Err(message.to_backend_error());
                return;
            }

            match message.event_type() {
                Some(PAYLOAD_PART) => yield Ok(message.payload),
                Some(event) if STREAM_ERROR_EVENTS.contains(&event) => {
                    let mut err = message.to_backend_error();
                    err.kind = BackendErrorKind::Service;
                    err.code = Some(event.to_string());
                    yield Err(err);
                    return;
                }
                other => {
                    tracing::debug!("[SAGEMAKER] 忽略事件: {:?}", other);
                }
            }
        }
    })
}
