//! Bedrock Agent Runtime HTTP 后端
//!
//! - `POST /flows/{flowIdentifier}/aliases/{flowAliasIdentifier}`
//! - `POST /optimize-prompt`
//! - `POST /agents/{agentId}/agentAliases/{agentAliasId}/sessions/{sessionId}/text`

use super::http::{self, ResponseMode, RuntimeEndpoint};
use super::traits::{AgentEventStream, AgentRuntime, BackendError, BackendResult};
use crate::models::{FlowRequest, InvokeAgentInput, OptimizePromptRequest};
use crate::stream::event_stream::EventMessage;
use crate::stream::events::AgentStreamEvent;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};

/// Flow 输入节点名称
pub const FLOW_INPUT_NODE: &str = "FlowInputNode";
/// Flow 输入节点的输出名称
pub const FLOW_INPUT_OUTPUT_NAME: &str = "document";

/// 基于 reqwest 的 Agent Runtime 客户端
#[derive(Debug, Clone)]
pub struct HttpAgentRuntime {
    client: Client,
    endpoint: RuntimeEndpoint,
}

impl HttpAgentRuntime {
    pub fn new(client: Client, endpoint: RuntimeEndpoint) -> Self {
        Self { client, endpoint }
    }

    async fn post_stream(&self, path: &str, body: Value) -> BackendResult<AgentEventStream> {
        let builder = self
            .client
            .post(self.endpoint.url(path))
            .header("Content-Type", "application/json")
            .header("Accept", "application/vnd.amazon.eventstream")
            .json(&body);
        let response = self
            .endpoint
            .send(&self.client, builder, ResponseMode::Streaming)
            .await?;
        Ok(agent_events(http::event_messages(response)))
    }
}

/// InvokeFlow 请求体
pub fn flow_request_body(request: &FlowRequest) -> Value {
    json!({
        "inputs": [{
            "nodeName": FLOW_INPUT_NODE,
            "nodeOutputName": FLOW_INPUT_OUTPUT_NAME,
            "content": {"document": request.document},
        }]
    })
}

/// OptimizePrompt 请求体
pub fn optimize_prompt_body(request: &OptimizePromptRequest) -> Value {
    json!({
        "input": {"textPrompt": {"text": request.prompt}},
        "targetModelId": request.target_model_id,
    })
}

/// InvokeAgent 请求体
pub fn invoke_agent_body(input: &InvokeAgentInput) -> Value {
    json!({
        "inputText": input.input_text,
        "enableTrace": true,
    })
}

/// InvokeAgent 请求路径
pub fn invoke_agent_path(input: &InvokeAgentInput) -> String {
    format!(
        "/agents/{}/agentAliases/{}/sessions/{}/text",
        urlencoding::encode(&input.agent_id),
        urlencoding::encode(&input.agent_alias_id),
        urlencoding::encode(&input.session_id)
    )
}

#[async_trait]
impl AgentRuntime for HttpAgentRuntime {
    async fn invoke_flow(&self, request: &FlowRequest) -> BackendResult<AgentEventStream> {
        let path = format!(
            "/flows/{}/aliases/{}",
            urlencoding::encode(&request.flow_identifier),
            urlencoding::encode(&request.flow_alias_identifier)
        );
        tracing::debug!("[AGENT] InvokeFlow: {}", path);
        self.post_stream(&path, flow_request_body(request)).await
    }

    async fn optimize_prompt(
        &self,
        request: &OptimizePromptRequest,
    ) -> BackendResult<AgentEventStream> {
        tracing::debug!(
            "[AGENT] OptimizePrompt: target_model_id={}",
            request.target_model_id
        );
        self.post_stream("/optimize-prompt", optimize_prompt_body(request))
            .await
    }

    async fn invoke_agent(&self, input: &InvokeAgentInput) -> BackendResult<AgentEventStream> {
        let path = invoke_agent_path(input);
        tracing::debug!("[AGENT] InvokeAgent: {}", path);
        self.post_stream(&path, invoke_agent_body(input)).await
    }
}

/// 将 event-stream 消息转换为 Agent 事件
///
/// 异常消息产生一个 `Err` 后结束。
pub fn agent_events<S>(messages: S) -> AgentEventStream
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

            let Some(event_type) = message.event_type() else {
                continue;
            };
            match http::payload_json(&message)
                .and_then(|payload| AgentStreamEvent::from_payload(event_type, &payload))
            {
                Ok(event) => yield Ok(event),
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    })
}
