//! Bedrock OptimizePrompt 适配器
//!
//! 回退消息以 JSON 字符串形式输出，与前端对 OptimizePrompt 响应的解析方式一致。

use crate::backends::AgentRuntime;
use crate::models::OptimizePromptRequest;
use crate::providers::error::{FallbackMessages, InvocationError};
use crate::providers::traits::{
    failed_stream, with_fallback, InvocationAdapter, TokenShape, TokenStream,
};
use crate::stream::{agent_token_stream, PipelineConfig, StreamError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const ADAPTER: &str = "optimize-prompt";

/// Bedrock OptimizePrompt 适配器
pub struct OptimizePromptAdapter {
    runtime: Arc<dyn AgentRuntime>,
    idle_timeout: Option<Duration>,
}

impl OptimizePromptAdapter {
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
impl InvocationAdapter for OptimizePromptAdapter {
    type Request = OptimizePromptRequest;

    fn name(&self) -> &'static str {
        ADAPTER
    }

    async fn invoke_stream(
        &self,
        request: OptimizePromptRequest,
    ) -> Result<TokenStream, InvocationError> {
        let fallback = FallbackMessages::OPTIMIZE_PROMPT;
        match self.runtime.optimize_prompt(&request).await {
            Ok(events) => {
                let config = PipelineConfig::default().with_idle_timeout(self.idle_timeout);
                Ok(with_fallback(
                    agent_token_stream(events, &config),
                    fallback,
                    TokenShape::PLAIN,
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
    use crate::models::{FlowRequest, InvokeAgentInput};
    use crate::stream::AgentStreamEvent;
    use futures::StreamExt;

    struct MockAgent {
        result: Result<Vec<Result<AgentStreamEvent, BackendError>>, BackendError>,
    }

    #[async_trait]
    impl AgentRuntime for MockAgent {
        async fn invoke_flow(&self, _request: &FlowRequest) -> BackendResult<AgentEventStream> {
            unreachable!("optimize adapter never invokes flows")
        }

        async fn optimize_prompt(
            &self,
            _request: &OptimizePromptRequest,
        ) -> BackendResult<AgentEventStream> {
            let events = self.result.clone()?;
            Ok(Box::pin(futures::stream::iter(events)))
        }

        async fn invoke_agent(&self, _input: &InvokeAgentInput) -> BackendResult<AgentEventStream> {
            unreachable!("optimize adapter never invokes agents")
        }
    }

    async fn run(agent: MockAgent) -> Vec<String> {
        OptimizePromptAdapter::new(Arc::new(agent))
            .invoke_stream(OptimizePromptRequest {
                target_model_id: "anthropic.claude-3-haiku-20240307-v1:0".to_string(),
                prompt: "write a poem".to_string(),
            })
            .await
            .unwrap()
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_optimized_text_is_emitted() {
        let tokens = run(MockAgent {
            result: Ok(vec![
                Ok(AgentStreamEvent::AnalyzePrompt {
                    message: Some("analysis".to_string()),
                }),
                Ok(AgentStreamEvent::OptimizedPrompt {
                    text: Some("Write a sonnet about the sea.".to_string()),
                }),
            ]),
        })
        .await;
        assert_eq!(tokens, vec!["Write a sonnet about the sea."]);
    }

    #[tokio::test]
    async fn test_throttle_fallback_is_json_encoded() {
        let tokens = run(MockAgent {
            result: Err(BackendError::from_status(429, "Too many requests")),
        })
        .await;
        assert_eq!(
            tokens,
            vec!["\"The server is currently experiencing high access. Please try again later.\""]
        );
    }

    #[tokio::test]
    async fn test_validation_fallback_is_json_encoded() {
        let tokens = run(MockAgent {
            result: Err(BackendError::from_status(400, "bad model").with_code("ValidationException")),
        })
        .await;
        let decoded: String = serde_json::from_str(&tokens[0]).unwrap();
        assert_eq!(
            decoded,
            "The usage limit has been exceeded or the request is invalid. \n ValidationException: bad model"
        );
    }

    #[tokio::test]
    async fn test_default_invoke_concatenates() {
        let adapter = OptimizePromptAdapter::new(Arc::new(MockAgent {
            result: Ok(vec![
                Ok(AgentStreamEvent::OptimizedPrompt {
                    text: Some("a".to_string()),
                }),
                Ok(AgentStreamEvent::OptimizedPrompt {
                    text: Some("b".to_string()),
                }),
            ]),
        }));
        let text = adapter
            .invoke(OptimizePromptRequest {
                target_model_id: "m".to_string(),
                prompt: "p".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(text, "ab");
    }
}
