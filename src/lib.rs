//! genai-relay
//!
//! 把聊天消息渲染为模型专用 Prompt，调用托管模型端点（SageMaker / Bedrock Agent Runtime），
//! 解码流式响应并逐 token 转发给调用方。

pub mod backends;
pub mod config;
pub mod logger;
pub mod models;
pub mod prompt;
pub mod providers;
pub mod relay;
pub mod resilience;
pub mod server;
pub mod stream;

pub use config::Config;
pub use server::{build_router, AppState};
