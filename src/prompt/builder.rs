//! Prompt 构建器
//!
//! 将有序的消息列表按模板折叠为单个 Prompt 字符串：
//! `prefix + join(fragments) + suffix`，每个片段由角色包装片段替换占位符得到。

use crate::models::{Message, PromptTemplate, PLACEHOLDER};
use crate::prompt::PromptError;

/// 构建 Prompt
///
/// 输出只依赖输入，相同输入总是得到相同结果。
pub fn build(messages: &[Message], template: &PromptTemplate) -> Result<String, PromptError> {
    let fragments = render_fragments(messages, template)?;

    let mut prompt = String::with_capacity(
        template.prefix.len()
            + template.suffix.len()
            + fragments.iter().map(String::len).sum::<usize>()
            + template.join.len() * fragments.len().saturating_sub(1),
    );
    prompt.push_str(&template.prefix);
    prompt.push_str(&fragments.join(&template.join));
    prompt.push_str(&template.suffix);
    Ok(prompt)
}

/// 渲染每条消息对应的片段（顺序与输入一致）
pub fn render_fragments(
    messages: &[Message],
    template: &PromptTemplate,
) -> Result<Vec<String>, PromptError> {
    messages
        .iter()
        .map(|message| {
            let role = message.role().map_err(|e| PromptError::InvalidRole { role: e.0 })?;
            Ok(template
                .fragment(role)
                .replacen(PLACEHOLDER, &message.content, 1))
        })
        .collect()
}

/// 校验模板（用于配置提供的自定义模板）
pub fn validate_template(template: &PromptTemplate) -> Result<(), PromptError> {
    match template.invalid_fragment() {
        Some(role) => Err(PromptError::InvalidTemplate { role }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_build_claude_single_user_message() {
        let prompt = build(&[Message::user("hi")], &PromptTemplate::claude()).unwrap();
        assert_eq!(prompt, "Human: hi\n\nAssistant: ");
    }

    #[test]
    fn test_build_claude_with_system_acknowledgment() {
        let messages = vec![Message::system("be brief"), Message::user("hi")];
        let prompt = build(&messages, &PromptTemplate::claude()).unwrap();
        assert_eq!(
            prompt,
            "\n\nHuman: be brief\n\nAssistant: コンテキストを理解しました。\n\nHuman: hi\n\nAssistant: "
        );
    }

    #[test]
    fn test_build_llama2_conversation() {
        let messages = vec![
            Message::system("sys"),
            Message::user("q1"),
            Message::assistant("a1"),
            Message::user("q2"),
        ];
        let prompt = build(&messages, &PromptTemplate::llama2()).unwrap();
        assert_eq!(
            prompt,
            "[INST] <<SYS>>\nsys\n<</SYS>>\n\nq1 [/INST] a1</s><s>[INST] q2 [/INST]"
        );
    }

    #[test]
    fn test_build_rinna_uses_nl_join() {
        let messages = vec![Message::user("こんにちは"), Message::assistant("はい")];
        let prompt = build(&messages, &PromptTemplate::rinna()).unwrap();
        assert_eq!(prompt, "ユーザー: こんにちは<NL>システム: はいシステム: ");
    }

    #[test]
    fn test_build_empty_messages() {
        let prompt = build(&[], &PromptTemplate::llama2()).unwrap();
        assert_eq!(prompt, "[INST]  [/INST]");
    }

    #[test]
    fn test_build_invalid_role() {
        let messages = vec![Message::user("ok"), Message::new("tool", "x")];
        assert_eq!(
            build(&messages, &PromptTemplate::claude()),
            Err(PromptError::InvalidRole {
                role: "tool".to_string()
            })
        );
    }

    #[test]
    fn test_placeholder_in_content_is_not_substituted_again() {
        let prompt = build(&[Message::user("{} literal")], &PromptTemplate::claude()).unwrap();
        assert_eq!(prompt, "Human: {} literal\n\nAssistant: ");
    }

    #[test]
    fn test_validate_template() {
        assert!(validate_template(&PromptTemplate::claude()).is_ok());

        let mut broken = PromptTemplate::claude();
        broken.system = "no placeholder".to_string();
        assert_eq!(
            validate_template(&broken),
            Err(PromptError::InvalidTemplate { role: Role::System })
        );
    }
}
