//! Prompt 构建错误

use crate::models::Role;
use thiserror::Error;

/// Prompt 相关错误
///
/// 这些错误对请求是致命的，在产生任何输出之前直接返回给调用方。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    /// 没有与模型匹配的模板
    #[error("Invalid model name: {model}")]
    UnknownModel { model: String },

    /// 消息角色不在 system/user/assistant 之内
    #[error("Invalid message role: {role}")]
    InvalidRole { role: String },

    /// 模板的角色片段占位符数量不为 1
    #[error("Invalid prompt template: {role} fragment must contain exactly one placeholder")]
    InvalidTemplate { role: Role },
}
