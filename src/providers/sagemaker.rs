//! SageMaker 聊天适配器
//!
//! 用模板构建 Prompt，以 TGI 参数调用端点，流式路径经过行缓冲解码和 EOS 过滤。

use crate::backends::SageMakerRuntime;
use crate::models::{Message, PredictRequest, PromptTemplate};
use crate::prompt::{self, PromptError};
use crate::providers::error::{FallbackMessages, InvocationError};
use crate::providers::traits::{
    failed_stream, with_fallback, InvocationAdapter, TokenShape, TokenStream,
};
use crate::stream::{sse_token_stream, PipelineConfig, StreamError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const ADAPTER: &str = "sagemaker";

/// TGI 生成参数
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TgiParameters {
    pub max_new_tokens: u32,
    pub return_full_text: bool,
    pub do_sample: bool,
    pub temperature: f32,
}

impl Default for TgiParameters {
    fn default() -> Self {
        Self {
            max_new_tokens: 512,
            return_full_text: false,
            do_sample: true,
            temperature: 0.3,
        }
    }
}

/// TGI 请求体
#[derive(Debug, Serialize)]
struct TgiRequest<'a> {
    inputs: &'a str,
    parameters: &'a TgiParameters,
    stream: bool,
}

/// SageMaker 聊天适配器
pub struct SageMakerAdapter {
    runtime: Arc<dyn SageMakerRuntime>,
    endpoint_name: String,
    /// 用于选择内置模板的模型名
    model: String,
    template_override: Option<PromptTemplate>,
    parameters: TgiParameters,
    idle_timeout: Option<Duration>,
}

impl SageMakerAdapter {
    pub fn new(
        runtime: Arc<dyn SageMakerRuntime>,
        endpoint_name: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            endpoint_name: endpoint_name.into(),
            model: model.into(),
            template_override: None,
            parameters: TgiParameters::default(),
            idle_timeout: None,
        }
    }

    /// 使用自定义模板替代内置模板
    pub fn with_template(mut self, template: Option<PromptTemplate>) -> Self {
        self.template_override = template;
        self
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// 当前生效的模板
    pub fn template(&self) -> Result<&PromptTemplate, PromptError> {
        match &self.template_override {
            Some(template) => Ok(template),
            None => prompt::lookup(&self.model),
        }
    }

    /// 构建请求体
    pub fn request_body(&self, messages: &[Message], stream: bool) -> Result<Bytes, InvocationError> {
        let template = self.template()?;
        let prompt = prompt::build(messages, template)?;
        tracing::debug!(
            "[SAGEMAKER] endpoint={} prompt_len={}",
            self.endpoint_name,
            prompt.len()
        );

        let body = TgiRequest {
            inputs: &prompt,
            parameters: &self.parameters,
            stream,
        };
        serde_json::to_vec(&body)
            .map(Bytes::from)
            .map_err(|e| InvocationError::InvalidResponse(e.to_string()))
    }
}

/// 解析非流式响应 `[{"generated_text": ...}]`
pub fn parse_generated_text(body: &[u8]) -> Result<String, InvocationError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| InvocationError::InvalidResponse(e.to_string()))?;
    value
        .pointer("/0/generated_text")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| InvocationError::InvalidResponse("缺少 generated_text".to_string()))
}

#[async_trait]
impl InvocationAdapter for SageMakerAdapter {
    type Request = PredictRequest;

    fn name(&self) -> &'static str {
        ADAPTER
    }

    async fn invoke_stream(&self, request: PredictRequest) -> Result<TokenStream, InvocationError> {
        let template = self.template()?;
        let body = self.request_body(&request.messages, true)?;
        let fallback = FallbackMessages::STANDARD;

        match self
            .runtime
            .invoke_endpoint_stream(&self.endpoint_name, body)
            .await
        {
            Ok(bytes) => {
                let config = PipelineConfig::new(template.eos_token.clone())
                    .with_idle_timeout(self.idle_timeout);
                Ok(with_fallback(
                    sse_token_stream(bytes, &config),
                    fallback,
                    TokenShape::PLAIN,
                    ADAPTER,
                ))
            }
            Err(e) => Ok(failed_stream(StreamError::Backend(e), fallback, ADAPTER)),
        }
    }

    async fn invoke(&self, request: PredictRequest) -> Result<String, InvocationError> {
        let body = self.request_body(&request.messages, false)?;

        match self.runtime.invoke_endpoint(&self.endpoint_name, body).await {
            Ok(response) => parse_generated_text(&response),
            Err(e) => {
                let tokens: Vec<String> =
                    failed_stream(StreamError::Backend(e), FallbackMessages::STANDARD, ADAPTER)
                        .collect()
                        .await;
                Ok(tokens.concat())
            }
        }
    }
}
