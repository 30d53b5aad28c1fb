//! Prompt 模板注册表
//!
//! 按模型标识符选择模板。匹配规则按顺序求值：
//! 1. 精确匹配已知的 Claude 模型名
//! 2. 包含匹配模型家族标记（`llama-2`、`bilingual-rinna`）
//! 3. 精确匹配 `rinna`
//!
//! 未命中时返回 `UnknownModel`，不会静默回退到默认模板。

use crate::models::PromptTemplate;
use crate::prompt::PromptError;
use once_cell::sync::Lazy;

/// 模板匹配规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchRule {
    /// 精确匹配
    Exact(&'static str),
    /// 包含匹配
    Contains(&'static str),
}

impl MatchRule {
    pub fn matches(&self, model: &str) -> bool {
        match self {
            MatchRule::Exact(name) => model == *name,
            MatchRule::Contains(marker) => model.contains(marker),
        }
    }
}

/// 注册表条目
#[derive(Debug, Clone)]
pub struct TemplateEntry {
    pub name: &'static str,
    pub rules: Vec<MatchRule>,
    pub template: PromptTemplate,
}

/// 模板注册表（只读）
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    entries: Vec<TemplateEntry>,
}

impl TemplateRegistry {
    /// 内置模板，条目顺序即匹配优先级
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                TemplateEntry {
                    name: "claude",
                    rules: vec![
                        MatchRule::Exact("anthropic.claude-v2"),
                        MatchRule::Exact("anthropic.claude-instant-v1"),
                    ],
                    template: PromptTemplate::claude(),
                },
                TemplateEntry {
                    name: "llama2",
                    rules: vec![MatchRule::Contains("llama-2")],
                    template: PromptTemplate::llama2(),
                },
                TemplateEntry {
                    name: "bilingual-rinna",
                    rules: vec![MatchRule::Contains("bilingual-rinna")],
                    template: PromptTemplate::bilingual_rinna(),
                },
                TemplateEntry {
                    name: "rinna",
                    rules: vec![MatchRule::Exact("rinna")],
                    template: PromptTemplate::rinna(),
                },
            ],
        }
    }

    /// 查找模型对应的模板
    pub fn lookup(&self, model: &str) -> Result<&PromptTemplate, PromptError> {
        self.entry_for(model)
            .map(|entry| &entry.template)
            .ok_or_else(|| PromptError::UnknownModel {
                model: model.to_string(),
            })
    }

    /// 查找命中的条目
    pub fn entry_for(&self, model: &str) -> Option<&TemplateEntry> {
        self.entries
            .iter()
            .find(|entry| entry.rules.iter().any(|rule| rule.matches(model)))
    }

    pub fn entries(&self) -> &[TemplateEntry] {
        &self.entries
    }
}

static REGISTRY: Lazy<TemplateRegistry> = Lazy::new(TemplateRegistry::builtin);

/// 在进程级内置注册表中查找模板
pub fn lookup(model: &str) -> Result<&'static PromptTemplate, PromptError> {
    REGISTRY.lookup(model)
}
