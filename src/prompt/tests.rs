//! Prompt 构建属性测试
//!
//! 使用 proptest 进行属性测试

use crate::models::{Message, PromptTemplate};
use crate::prompt::{build, render_fragments};
use proptest::prelude::*;

fn arb_role() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("system"), Just("user"), Just("assistant")]
}

fn arb_message() -> impl Strategy<Value = Message> {
    (arb_role(), "[a-zA-Z0-9 あ-ん\\n]{0,16}")
        .prop_map(|(role, content)| Message::new(role, content))
}

fn arb_template() -> impl Strategy<Value = PromptTemplate> {
    prop_oneof![
        Just(PromptTemplate::claude()),
        Just(PromptTemplate::llama2()),
        Just(PromptTemplate::bilingual_rinna()),
        Just(PromptTemplate::rinna()),
    ]
}

proptest! {
    /// 任意消息序列构建的 Prompt 都以 prefix 开头、以 suffix 结尾
    #[test]
    fn prop_prompt_wrapped_by_prefix_and_suffix(
        messages in prop::collection::vec(arb_message(), 0..8),
        template in arb_template()
    ) {
        let prompt = build(&messages, &template).unwrap();
        prop_assert!(prompt.starts_with(&template.prefix));
        prop_assert!(prompt.ends_with(&template.suffix));
    }

    /// 片段数量等于消息数量，且顺序与消息一致
    #[test]
    fn prop_fragments_follow_message_order(
        messages in prop::collection::vec(arb_message(), 0..8),
        template in arb_template()
    ) {
        let fragments = render_fragments(&messages, &template).unwrap();
        prop_assert_eq!(fragments.len(), messages.len());

        for (fragment, message) in fragments.iter().zip(&messages) {
            let role = message.role().unwrap();
            let expected = template.fragment(role).replacen("{}", &message.content, 1);
            prop_assert_eq!(fragment, &expected);
        }

        let expected = format!(
            "{}{}{}",
            template.prefix,
            fragments.join(&template.join),
            template.suffix
        );
        prop_assert_eq!(build(&messages, &template).unwrap(), expected);
    }

    /// 相同输入总是得到相同输出
    #[test]
    fn prop_build_is_deterministic(
        messages in prop::collection::vec(arb_message(), 0..8),
        template in arb_template()
    ) {
        prop_assert_eq!(build(&messages, &template), build(&messages, &template));
    }
}
