//! Agent Runtime 流事件类型
//!
//! Bedrock Agent Runtime 的流式响应由一系列结构化事件组成，
//! 每个事件的类型由 event-stream 消息头 `:event-type` 给出，负载为 JSON。
//! 后端层负责把消息解析为 `AgentStreamEvent`，解码器只关心其中少数几种。

use crate::backends::{BackendError, BackendErrorKind};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Flow 完成原因：成功
pub const COMPLETION_SUCCESS: &str = "SUCCESS";

/// Agent Runtime 流事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentStreamEvent {
    /// Flow 输出节点产出的文档
    FlowOutput {
        node_name: Option<String>,
        document: Value,
    },

    /// Flow 完成事件
    FlowCompletion { completion_reason: String },

    /// Flow 追踪事件（不产生输出）
    FlowTrace(Value),

    /// 优化后的 Prompt 文本
    OptimizedPrompt { text: Option<String> },

    /// Prompt 分析结果（当前不转发给调用方）
    AnalyzePrompt { message: Option<String> },

    /// Agent 回答片段，附带知识库引用
    AgentChunk {
        text: String,
        citations: Vec<Citation>,
    },

    /// Agent 编排追踪，其他类型的追踪为 `None`
    AgentTrace { orchestration: Option<Value> },

    /// Agent 生成的文件（不转发）
    AgentFiles { names: Vec<String> },

    /// 未知事件类型
    Unknown { event_type: String },
}

/// 知识库引用
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 被引用文本片段的结束位置（字符）
    pub span_end: Option<usize>,
    pub references: Vec<RetrievedReference>,
}

/// 引用的文档
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievedReference {
    /// `s3://bucket/key`
    pub uri: Option<String>,
    pub page_number: Option<String>,
}

/// 知识库文档页码元数据
pub const PAGE_NUMBER_METADATA: &str = "x-amz-bedrock-kb-document-page-number";

impl RetrievedReference {
    /// 由 `retrievedReferences` 数组元素构造
    pub fn from_value(value: &Value) -> Self {
        Self {
            uri: value
                .pointer("/location/s3Location/uri")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            page_number: value
                .get("metadata")
                .and_then(|m| m.get(PAGE_NUMBER_METADATA))
                .and_then(page_number_text),
        }
    }
}

/// 页码可能是数字或字符串，0 和空串视为无页码
pub fn page_number_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(page) if page == 0.0 => None,
            Some(page) if page.fract() == 0.0 => Some(format!("{}", page as i64)),
            _ => Some(n.to_string()),
        },
        _ => None,
    }
}

fn citations(payload: &Value) -> Vec<Citation> {
    let Some(items) = payload
        .pointer("/attribution/citations")
        .and_then(|v| v.as_array())
    else {
        return Vec::new();
    };

    items
        .iter()
        .map(|citation| Citation {
            span_end: citation
                .pointer("/generatedResponsePart/textResponsePart/span/end")
                .and_then(|v| v.as_u64())
                .map(|end| end as usize),
            references: citation
                .get("retrievedReferences")
                .and_then(|v| v.as_array())
                .map(|refs| refs.iter().map(RetrievedReference::from_value).collect())
                .unwrap_or_default(),
        })
        .collect()
}

/// 解码 `chunk` 事件的 base64 `bytes`
fn chunk_text(payload: &Value) -> Result<String, BackendError> {
    let Some(encoded) = payload.get("bytes").and_then(|v| v.as_str()) else {
        return Ok(String::new());
    };
    let bytes = BASE64.decode(encoded).map_err(|e| {
        BackendError::new(
            BackendErrorKind::Decode,
            format!("chunk 负载不是合法 base64: {}", e),
        )
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

impl AgentStreamEvent {
    /// 由事件类型和 JSON 负载构造事件
    ///
    /// 负载缺少预期字段时按空值处理，未知事件类型保留类型名。
    /// 只有 `chunk` 的 base64 内容非法时返回错误。
    pub fn from_payload(event_type: &str, payload: &Value) -> Result<Self, BackendError> {
        let event = match event_type {
            "flowOutputEvent" => AgentStreamEvent::FlowOutput {
                node_name: payload
                    .get("nodeName")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                document: payload
                    .pointer("/content/document")
                    .cloned()
                    .unwrap_or(Value::Null),
            },
            "flowCompletionEvent" => AgentStreamEvent::FlowCompletion {
                completion_reason: payload
                    .get("completionReason")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
            },
            "flowTraceEvent" => AgentStreamEvent::FlowTrace(payload.clone()),
            "optimizedPromptEvent" => AgentStreamEvent::OptimizedPrompt {
                text: payload
                    .pointer("/optimizedPrompt/textPrompt/text")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            },
            "analyzePromptEvent" => AgentStreamEvent::AnalyzePrompt {
                message: payload
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            },
            "chunk" => AgentStreamEvent::AgentChunk {
                text: chunk_text(payload)?,
                citations: citations(payload),
            },
            "trace" => AgentStreamEvent::AgentTrace {
                orchestration: payload.pointer("/trace/orchestrationTrace").cloned(),
            },
            "files" => AgentStreamEvent::AgentFiles {
                names: payload
                    .get("files")
                    .and_then(|v| v.as_array())
                    .map(|files| {
                        files
                            .iter()
                            .filter_map(|f| f.get("name").and_then(|n| n.as_str()))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            other => AgentStreamEvent::Unknown {
                event_type: other.to_string(),
            },
        };
        Ok(event)
    }

    /// 便捷构造：Flow 文本输出
    pub fn flow_text(text: impl Into<String>) -> Self {
        AgentStreamEvent::FlowOutput {
            node_name: None,
            document: Value::String(text.into()),
        }
    }

    /// 便捷构造：Flow 成功完成
    pub fn flow_success() -> Self {
        AgentStreamEvent::FlowCompletion {
            completion_reason: COMPLETION_SUCCESS.to_string(),
        }
    }
}
