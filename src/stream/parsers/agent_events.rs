//! Agent Runtime 事件迭代解码器
//!
//! 内容事件产出 token，`SUCCESS` 完成事件立即结束迭代，其他事件忽略。
//! Agent 回答片段和编排追踪渲染为 Markdown 文本后输出。

use crate::backends::AgentEventStream;
use crate::models::Token;
use crate::stream::error::StreamError;
use crate::stream::events::{AgentStreamEvent, COMPLETION_SUCCESS};
use crate::stream::parsers::agent_render::{render_chunk, render_trace};
use futures::{Stream, StreamExt};
use serde_json::Value;

/// 单个事件的处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum EventAction {
    /// 输出一个 token
    Emit(Token),
    /// 结束迭代
    Stop,
    /// 忽略
    Skip,
}

/// 判定单个事件的处理方式
///
/// `region` 用于把知识库引用的 S3 URI 转换为链接。
pub fn classify_event(event: &AgentStreamEvent, region: &str) -> EventAction {
    match event {
        AgentStreamEvent::FlowOutput { document, .. } => match document_text(document) {
            Some(text) => EventAction::Emit(text),
            None => EventAction::Skip,
        },
        AgentStreamEvent::OptimizedPrompt {
            text: Some(text), ..
        } if !text.is_empty() => EventAction::Emit(text.clone()),
        AgentStreamEvent::FlowCompletion { completion_reason }
            if completion_reason == COMPLETION_SUCCESS =>
        {
            EventAction::Stop
        }
        AgentStreamEvent::AgentChunk { text, citations } => {
            let body = render_chunk(text, citations, region);
            if body.is_empty() {
                EventAction::Skip
            } else {
                EventAction::Emit(body)
            }
        }
        AgentStreamEvent::AgentTrace {
            orchestration: Some(trace),
        } => {
            let text = render_trace(trace, region);
            if text.is_empty() {
                EventAction::Skip
            } else {
                EventAction::Emit(format!("{}\n", text))
            }
        }
        _ => EventAction::Skip,
    }
}

/// Flow 文档转文本
///
/// 只输出真值文档：null、false、0、空字符串视为无内容；
/// 字符串直接使用，其他 JSON 值（含空对象、空数组）输出紧凑 JSON。
fn document_text(document: &Value) -> Option<String> {
    match document {
        Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// 将 Agent 事件流解码为 token 流
pub fn decode_agent_events(
    events: AgentEventStream,
    region: String,
) -> impl Stream<Item = Result<Token, StreamError>> {
    async_stream::stream! {
        let mut events = events;

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    yield Err(StreamError::Backend(e));
                    return;
                }
            };
            match classify_event(&event, &region) {
                EventAction::Emit(token) => yield Ok(token),
                EventAction::Stop => return,
                EventAction::Skip => {
                    tracing::trace!("[STREAM] 忽略事件: {:?}", event);
                }
            }
        }
    }
}
