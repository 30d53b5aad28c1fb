//! 对话消息模型
//!
//! 消息按轮次顺序排列，角色在线上格式中保留原始文本，
//! 由 Prompt 构建器负责校验角色是否合法。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 无法识别的角色文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// 单条对话消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// 角色（原始文本）
    pub role: String,
    /// 消息内容
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System.as_str(), content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User.as_str(), content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant.as_str(), content)
    }

    /// 解析消息角色
    pub fn role(&self) -> Result<Role, UnknownRole> {
        self.role.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("system".parse::<Role>(), Ok(Role::System));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert_eq!("assistant".parse::<Role>(), Ok(Role::Assistant));
        assert_eq!(
            "tool".parse::<Role>(),
            Err(UnknownRole("tool".to_string()))
        );
        // 大小写敏感
        assert!("User".parse::<Role>().is_err());
    }

    #[test]
    fn test_message_deserialize_keeps_unknown_role() {
        let msg: Message = serde_json::from_str(r#"{"role":"robot","content":"beep"}"#).unwrap();
        assert_eq!(msg.role, "robot");
        assert!(msg.role().is_err());
    }

    #[test]
    fn test_message_constructors() {
        assert_eq!(Message::user("hi").role(), Ok(Role::User));
        assert_eq!(Message::system("ctx").role(), Ok(Role::System));
        assert_eq!(Message::assistant("ok").content, "ok");
    }
}
