//! Prompt 模板模型
//!
//! 模板由一组文本片段组成：前缀、后缀、连接符、各角色包装片段和 EOS 标记。
//! 角色片段中必须恰好包含一个 `{}` 占位符。

use crate::models::Role;
use serde::{Deserialize, Serialize};

/// 角色片段中的占位符
pub const PLACEHOLDER: &str = "{}";

/// Prompt 模板
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub join: String,
    pub user: String,
    pub assistant: String,
    pub system: String,
    /// 结束标记，空字符串表示不过滤
    #[serde(default, alias = "eosToken")]
    pub eos_token: String,
}

impl PromptTemplate {
    /// 获取角色对应的包装片段
    pub fn fragment(&self, role: Role) -> &str {
        match role {
            Role::User => &self.user,
            Role::Assistant => &self.assistant,
            Role::System => &self.system,
        }
    }

    /// 检查每个角色片段是否恰好包含一个占位符
    ///
    /// 返回第一个不合法的角色
    pub fn invalid_fragment(&self) -> Option<Role> {
        [Role::System, Role::User, Role::Assistant]
            .into_iter()
            .find(|role| self.fragment(*role).matches(PLACEHOLDER).count() != 1)
    }

    /// Claude（Text Completions）模板
    pub fn claude() -> Self {
        Self {
            prefix: String::new(),
            suffix: "\n\nAssistant: ".to_string(),
            join: "\n\n".to_string(),
            user: "Human: {}".to_string(),
            assistant: "Assistant: {}".to_string(),
            system: "\n\nHuman: {}\n\nAssistant: コンテキストを理解しました。".to_string(),
            eos_token: String::new(),
        }
    }

    /// Llama 2 Chat 模板
    pub fn llama2() -> Self {
        Self {
            prefix: "[INST] ".to_string(),
            suffix: " [/INST]".to_string(),
            join: String::new(),
            user: "{}".to_string(),
            assistant: " [/INST] {}</s><s>[INST] ".to_string(),
            system: "<<SYS>>\n{}\n<</SYS>>\n\n".to_string(),
            eos_token: "</s>".to_string(),
        }
    }

    /// rinna bilingual 模板
    pub fn bilingual_rinna() -> Self {
        Self {
            prefix: String::new(),
            suffix: "システム: ".to_string(),
            join: "\n".to_string(),
            user: "ユーザー: {}".to_string(),
            assistant: "システム: {}".to_string(),
            system: "システム: {}".to_string(),
            eos_token: "</s>".to_string(),
        }
    }

    /// rinna 模板（使用 `<NL>` 作为换行）
    pub fn rinna() -> Self {
        Self {
            join: "<NL>".to_string(),
            ..Self::bilingual_rinna()
        }
    }
}
