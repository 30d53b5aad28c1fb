//! HTTP 服务
//!
//! 路由：
//! - `POST /predict/stream`: SageMaker 流式聊天
//! - `POST /predict`: SageMaker 非流式聊天
//! - `POST /flows/invoke`: Bedrock Flow
//! - `POST /prompts/optimize`: Bedrock OptimizePrompt
//! - `POST /agents/invoke`: Bedrock Agent
//! - `GET /health`: 健康检查

pub mod handlers;

use crate::backends::{
    default_credentials_provider, AgentRuntime, ClientFactory, ClientFactoryError,
    HttpAgentRuntime, HttpSageMakerRuntime, RequestAuth, RuntimeEndpoint, SageMakerRuntime,
    SigV4Signer, AGENT_RUNTIME_SIGNING_NAME, SAGEMAKER_SIGNING_NAME,
};
use crate::config::{AwsConfig, Config};
use crate::providers::{AgentAdapter, FlowAdapter, OptimizePromptAdapter, SageMakerAdapter};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;

/// 应用状态
///
/// 适配器本身无可变状态，请求之间只共享只读的 `Arc`。
#[derive(Clone)]
pub struct AppState {
    pub sagemaker: Arc<SageMakerAdapter>,
    pub flow: Arc<FlowAdapter>,
    pub optimize: Arc<OptimizePromptAdapter>,
    pub agent: Arc<AgentAdapter>,
    /// 请求体大小上限（字节）
    pub body_limit_bytes: usize,
}

impl AppState {
    /// 使用给定的运行时组装适配器
    pub fn new(
        config: &Config,
        sagemaker: Arc<dyn SageMakerRuntime>,
        agent: Arc<dyn AgentRuntime>,
    ) -> Self {
        let idle_timeout = config.stream.stream_idle_timeout();

        let sagemaker_adapter = SageMakerAdapter::new(
            sagemaker,
            config.sagemaker.endpoint_name.clone(),
            config.sagemaker.template_model(),
        )
        .with_template(config.sagemaker.prompt_template.clone())
        .with_idle_timeout(idle_timeout);

        let agent_adapter = AgentAdapter::new(
            agent.clone(),
            config.agents.clone(),
            config.aws.region.clone(),
        )
        .with_idle_timeout(idle_timeout);

        Self {
            sagemaker: Arc::new(sagemaker_adapter),
            flow: Arc::new(FlowAdapter::new(agent.clone()).with_idle_timeout(idle_timeout)),
            optimize: Arc::new(
                OptimizePromptAdapter::new(agent.clone()).with_idle_timeout(idle_timeout),
            ),
            agent: Arc::new(agent_adapter),
            body_limit_bytes: config.server.body_limit_bytes,
        }
    }

    /// 按配置创建 HTTP 运行时并组装适配器
    pub async fn from_config(config: &Config) -> Result<Self, ClientFactoryError> {
        let client = ClientFactory::new()
            .with_proxy(config.aws.proxy.clone())
            .with_connect_timeout(Duration::from_secs(config.aws.connect_timeout_secs))
            .create_client()?;

        let (sagemaker_auth, agent_auth) = request_auth(&config.aws).await?;
        let request_timeout = config.stream.request_timeout();

        let sagemaker = HttpSageMakerRuntime::new(
            client.clone(),
            RuntimeEndpoint::new(config.aws.sagemaker_url(), sagemaker_auth)
                .with_request_timeout(request_timeout),
        );
        let agent = HttpAgentRuntime::new(
            client,
            RuntimeEndpoint::new(config.aws.agent_runtime_url(), agent_auth)
                .with_request_timeout(request_timeout),
        );

        tracing::info!(
            "[SERVER] SageMaker 端点: {} ({}), Agent Runtime: {}, Agent 映射 {} 项",
            config.sagemaker.endpoint_name,
            config.aws.sagemaker_url(),
            config.aws.agent_runtime_url(),
            config.agents.len()
        );

        Ok(Self::new(config, Arc::new(sagemaker), Arc::new(agent)))
    }
}

/// 选择认证方式：Bearer Token 优先，其次 SigV4 签名，都关闭时不附加认证
///
/// 返回 SageMaker Runtime 与 Agent Runtime 各自使用的认证。
async fn request_auth(aws: &AwsConfig) -> Result<(RequestAuth, RequestAuth), ClientFactoryError> {
    if let Some(token) = aws.bearer_token.clone().filter(|t| !t.is_empty()) {
        tracing::info!("[SERVER] 认证方式: Bearer Token");
        return Ok((RequestAuth::Bearer(token.clone()), RequestAuth::Bearer(token)));
    }
    if !aws.sign_requests {
        tracing::warn!("[SERVER] 已关闭 SigV4 签名，端点需由签名代理提供");
        return Ok((RequestAuth::None, RequestAuth::None));
    }

    let provider = default_credentials_provider(&aws.region)
        .await
        .ok_or_else(|| ClientFactoryError::Credentials("默认凭证链不可用".to_string()))?;
    tracing::info!("[SERVER] 认证方式: SigV4 (region={})", aws.region);

    let signer = |service| {
        RequestAuth::SigV4(Arc::new(SigV4Signer::new(
            provider.clone(),
            aws.region.clone(),
            service,
        )))
    };
    Ok((
        signer(SAGEMAKER_SIGNING_NAME),
        signer(AGENT_RUNTIME_SIGNING_NAME),
    ))
}

/// 构建路由
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.body_limit_bytes;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/predict", post(handlers::predict))
        .route("/predict/stream", post(handlers::predict_stream))
        .route("/flows/invoke", post(handlers::invoke_flow))
        .route("/prompts/optimize", post(handlers::optimize_prompt))
        .route("/agents/invoke", post(handlers::invoke_agent))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
