//! Bedrock Flow 适配器
//!
//! 每个输出文档后追加换行，Flow 正常结束后再输出一个换行。

use crate::backends::AgentRuntime;
use crate::models::FlowRequest;
use crate::providers::error::{FallbackMessages, InvocationError};
use crate::providers::traits::{
    failed_stream, with_fallback, InvocationAdapter, TokenShape, TokenStream,
};
use crate::stream::{agent_token_stream, PipelineConfig, StreamError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const ADAPTER: &str = "flow";

const FLOW_SHAPE: TokenShape = TokenShape {
    token_suffix: "\n",
    completion: Some("\n"),
};

/// Bedrock Flow 适配器
pub struct FlowAdapter {
    runtime: Arc<dyn AgentRuntime>,
    idle_timeout: Option<Duration>,
}

impl FlowAdapter {
    pub fn new(runtime: Arc<dyn AgentRuntime>) -> Self {
        Self {
            runtime,
            idle_timeout: None,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

#[async_trait]
impl InvocationAdapter for FlowAdapter {
    type Request = FlowRequest;

    fn name(&self) -> &'static str {
        ADAPTER
    }

    async fn invoke_stream(&self, request: FlowRequest) -> Result<TokenStream, InvocationError> {
        let fallback = FallbackMessages::STANDARD;
        match self.runtime.invoke_flow(&request).await {
            Ok(events) => {
                let config = PipelineConfig::default().with_idle_timeout(self.idle_timeout);
                Ok(with_fallback(
                    agent_token_stream(events, &config),
                    fallback,
                    FLOW_SHAPE,
                    ADAPTER,
                ))
            }
            Err(e) => Ok(failed_stream(StreamError::Backend(e), fallback, ADAPTER)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{AgentEventStream, BackendError, BackendResult};
    use crate::models::{InvokeAgentInput, OptimizePromptRequest};
    use crate::providers::error::{GENERIC_MESSAGE, OVERLOAD_MESSAGE};
    use crate::stream::AgentStreamEvent;
    use futures::StreamExt;
    use serde_json::json;

    struct MockAgent {
        events: Vec<Result<AgentStreamEvent, BackendError>>,
        connect_error: Option<BackendError>,
    }

    #[async_trait]
    impl AgentRuntime for MockAgent {
        async fn invoke_flow(&self, _request: &FlowRequest) -> BackendResult<AgentEventStream> {
            if let Some(err) = &self.connect_error {
                return Err(err.clone());
            }
            Ok(Box::pin(futures::stream::iter(self.events.clone())))
        }

        async fn optimize_prompt(
            &self,
            _request: &OptimizePromptRequest,
        ) -> BackendResult<AgentEventStream> {
            unreachable!("flow adapter never optimizes prompts")
        }

        async fn invoke_agent(&self, _input: &InvokeAgentInput) -> BackendResult<AgentEventStream> {
            unreachable!("flow adapter never invokes agents")
        }
    }

    fn flow_request() -> FlowRequest {
        FlowRequest {
            flow_identifier: "FLOW".to_string(),
            flow_alias_identifier: "ALIAS".to_string(),
            document: json!("question"),
        }
    }

    async fn run(agent: MockAgent) -> Vec<String> {
        FlowAdapter::new(Arc::new(agent))
            .invoke_stream(flow_request())
            .await
            .unwrap()
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_flow_tokens_with_newlines() {
        let tokens = run(MockAgent {
            events: vec![
                Ok(AgentStreamEvent::flow_text("first")),
                Ok(AgentStreamEvent::FlowTrace(json!({"trace": 1}))),
                Ok(AgentStreamEvent::flow_text("second")),
                Ok(AgentStreamEvent::flow_success()),
                Ok(AgentStreamEvent::flow_text("ignored")),
            ],
            connect_error: None,
        })
        .await;
        assert_eq!(tokens, vec!["first\n", "second\n", "\n"]);
    }

    #[tokio::test]
    async fn test_flow_stream_ends_without_completion() {
        let tokens = run(MockAgent {
            events: vec![Ok(AgentStreamEvent::flow_text("only"))],
            connect_error: None,
        })
        .await;
        assert_eq!(tokens, vec!["only\n", "\n"]);
    }

    #[tokio::test]
    async fn test_flow_validation_fault() {
        let tokens = run(MockAgent {
            events: Vec::new(),
            connect_error: Some(
                BackendError::from_status(400, "Flow input is invalid")
                    .with_code("ValidationException"),
            ),
        })
        .await;
        assert_eq!(
            tokens,
            vec!["Format error.\n ValidationException: Flow input is invalid"]
        );
    }

    #[tokio::test]
    async fn test_flow_quota_fault_midstream() {
        let tokens = run(MockAgent {
            events: vec![
                Ok(AgentStreamEvent::flow_text("partial")),
                Err(BackendError::new(
                    crate::backends::BackendErrorKind::Service,
                    "quota",
                )
                .with_code("serviceQuotaExceededException")),
            ],
            connect_error: None,
        })
        .await;
        assert_eq!(tokens, vec!["partial\n".to_string(), OVERLOAD_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_flow_unknown_fault() {
        let tokens = run(MockAgent {
            events: vec![Err(BackendError::new(
                crate::backends::BackendErrorKind::Network,
                "connection reset",
            ))],
            connect_error: None,
        })
        .await;
        assert_eq!(tokens, vec![GENERIC_MESSAGE]);
    }
}
