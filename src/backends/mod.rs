//! 后端调用层
//!
//! 提供与模型运行时服务的 HTTP 通信能力。
//! 后端层只负责 HTTP 请求/响应和 event-stream 拆帧，不包含 Prompt 构建和文本解码。
//!
//! # 架构设计
//!
//! ```text
//! backends/
//! ├── traits.rs          # SageMakerRuntime / AgentRuntime trait、BackendError
//! ├── client.rs          # reqwest 客户端工厂
//! ├── signing.rs         # SigV4 签名 / Bearer Token
//! ├── http.rs            # 发送与超时、错误响应解析、event-stream 响应体拆帧
//! ├── sagemaker.rs       # SageMaker Runtime
//! └── agent_runtime.rs   # Bedrock Agent Runtime (Flow / OptimizePrompt)
//! ```
//!
//! # 认证
//!
//! 默认用 AWS 默认凭证链做 SigV4 签名；配置了 Bearer Token 时以
//! `Authorization: Bearer` 发送；关闭签名时要求 `*_endpoint_url` 指向负责签名的代理。

pub mod agent_runtime;
pub mod client;
pub mod http;
pub mod sagemaker;
pub mod signing;
pub mod traits;

// 重新导出核心类型
pub use agent_runtime::HttpAgentRuntime;
pub use client::{ClientFactory, ClientFactoryError};
pub use http::{ResponseMode, RuntimeEndpoint};
pub use sagemaker::HttpSageMakerRuntime;
pub use signing::{
    default_credentials_provider, RequestAuth, SigV4Signer, AGENT_RUNTIME_SIGNING_NAME,
    SAGEMAKER_SIGNING_NAME,
};
pub use traits::{
    AgentEventStream, AgentRuntime, BackendError, BackendErrorKind, BackendResult, ByteStream,
    SageMakerRuntime,
};
