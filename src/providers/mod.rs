//! Invocation Adapter 模块
//!
//! 每个适配器把一种入站请求转换为上游调用，并输出惰性 token 流：
//! - `sagemaker`: SageMaker 实时端点（TGI）
//! - `flow`: Bedrock Agent Flow
//! - `optimize_prompt`: Bedrock Agent OptimizePrompt
//! - `agent`: Bedrock Agent（InvokeAgent）

pub mod agent;
pub mod error;
pub mod flow;
pub mod optimize_prompt;
pub mod sagemaker;
pub mod traits;

pub use error::{
    classify, classify_stream_error, FallbackMessages, FaultKind, InvocationError,
    GENERIC_MESSAGE, OVERLOAD_MESSAGE, REPORT_MESSAGE,
};
pub use agent::AgentAdapter;
pub use flow::FlowAdapter;
pub use optimize_prompt::OptimizePromptAdapter;
pub use sagemaker::{SageMakerAdapter, TgiParameters};
pub use traits::{InvocationAdapter, TokenStream};
