//! Prompt 模板层
//!
//! - `registry`: 模型标识符到模板的只读映射
//! - `builder`: 将消息列表折叠为模型可用的 Prompt

mod builder;
mod error;
pub mod registry;

pub use builder::{build, render_fragments, validate_template};
pub use error::PromptError;
pub use registry::{lookup, MatchRule, TemplateRegistry};

#[cfg(test)]
mod tests;
