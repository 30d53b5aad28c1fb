//! 流式数据解码器
//!
//! 将后端输出解码为文本 token。
//!
//! # 支持的格式
//!
//! - 行缓冲 SSE (`data:{"token":{"text":...}}`)，用于 SageMaker TGI 容器
//! - Agent Runtime 事件 (Flow / OptimizePrompt / InvokeAgent)

pub mod agent_events;
pub mod agent_render;
pub mod sse_lines;

pub use agent_events::{classify_event, decode_agent_events, EventAction};
pub use agent_render::{render_chunk, render_trace, s3_uri_to_url};
pub use sse_lines::{decode_sse_lines, SseLineDecoder};
