//! Bedrock Agent 适配器
//!
//! `modelId` 经 Agent 映射解析为 Agent ID 和别名，最后一条消息作为输入。
//! 回答片段带知识库脚注，编排追踪（思考过程、工具调用）与回答交错输出。

use crate::backends::AgentRuntime;
use crate::models::{AgentRequest, AgentTarget, InvokeAgentInput};
use crate::providers::error::{FallbackMessages, InvocationError};
use crate::providers::traits::{
    failed_stream, with_fallback, InvocationAdapter, TokenShape, TokenStream,
};
use crate::stream::{agent_token_stream, PipelineConfig, StreamError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const ADAPTER: &str = "agent";

/// Bedrock Agent 适配器
pub struct AgentAdapter {
    runtime: Arc<dyn AgentRuntime>,
    agents: BTreeMap<String, AgentTarget>,
    region: String,
    idle_timeout: Option<Duration>,
}

impl AgentAdapter {
    pub fn new(
        runtime: Arc<dyn AgentRuntime>,
        agents: BTreeMap<String, AgentTarget>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            agents,
            region: region.into(),
            idle_timeout: None,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// 解析调用参数，未提供会话 ID 时生成一个
    pub fn resolve(&self, request: &AgentRequest) -> Result<InvokeAgentInput, InvocationError> {
        let target =
            self.agents
                .get(&request.model_id)
                .ok_or_else(|| InvocationError::UnknownAgent {
                    model: request.model_id.clone(),
                })?;
        let last = request
            .messages
            .last()
            .ok_or(InvocationError::EmptyConversation)?;

        Ok(InvokeAgentInput {
            agent_id: target.agent_id.clone(),
            agent_alias_id: target.alias_id.clone(),
            session_id: request
                .session_id
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            input_text: last.content.clone(),
        })
    }
}

#[async_trait]
impl InvocationAdapter for AgentAdapter {
    type Request = AgentRequest;

    fn name(&self) -> &'static str {
        ADAPTER
    }

    async fn invoke_stream(&self, request: AgentRequest) -> Result<TokenStream, InvocationError> {
        let input = self.resolve(&request)?;
        tracing::info!(
            model_id = %request.model_id,
            session_id = %input.session_id,
            "[AGENT] InvokeAgent"
        );

        let fallback = FallbackMessages::agent(self.region.clone());
        match self.runtime.invoke_agent(&input).await {
            Ok(events) => {
                let config = PipelineConfig::default()
                    .with_idle_timeout(self.idle_timeout)
                    .with_region(self.region.clone());
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
