//! 数据模型

mod message;
mod prompt_template;
mod request;

pub use message::{Message, Role, UnknownRole};
pub use prompt_template::{PromptTemplate, PLACEHOLDER};
pub use request::{
    AgentRequest, AgentTarget, FlowRequest, InvokeAgentInput, OptimizePromptRequest,
    PredictRequest,
};

/// 解码后的输出文本单元
pub type Token = String;
