//! 入站请求模型
//!
//! 每个适配器对应一种请求体，字段名与前端协议保持一致（camelCase）。

use crate::models::Message;
use serde::{Deserialize, Serialize};

/// SageMaker 聊天请求
///
/// 模型名和模板由配置提供，请求体只携带消息列表。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    pub messages: Vec<Message>,
}

/// Bedrock Flow 调用请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRequest {
    pub flow_identifier: String,
    pub flow_alias_identifier: String,
    /// 任意 JSON 文档，原样传给 Flow 输入节点
    pub document: serde_json::Value,
}

/// Bedrock OptimizePrompt 请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizePromptRequest {
    pub target_model_id: String,
    pub prompt: String,
}

/// Bedrock Agent 对话请求
///
/// `modelId` 通过配置的 Agent 映射解析为 Agent ID 和别名；
/// 未提供 `sessionId` 时由服务端生成。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRequest {
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub messages: Vec<Message>,
}

/// Agent 映射目标（配置项）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTarget {
    #[serde(alias = "agentId")]
    pub agent_id: String,
    #[serde(alias = "aliasId")]
    pub alias_id: String,
}

/// InvokeAgent 调用参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeAgentInput {
    pub agent_id: String,
    pub agent_alias_id: String,
    pub session_id: String,
    /// 最后一条消息的内容
    pub input_text: String,
}
