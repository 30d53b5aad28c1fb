//! 流式处理层
//!
//! 提供统一的流式数据处理能力，包括：
//! - AWS event-stream 二进制拆帧 (event_stream)
//! - Agent Runtime 事件类型定义 (events)
//! - 后端流格式解码 (parsers)
//! - EOS 过滤 (filter)
//!
//! # 架构设计
//!
//! ```text
//! 后端响应体 ──> [EventStreamDecoder] ──> PayloadPart 字节 ──> [SseLineDecoder] ──┐
//!                                    └──> AgentStreamEvent ──> [事件解码] ────────┴─> [EosFilter] ──> Token
//! ```

pub mod error;
pub mod event_stream;
pub mod events;
pub mod filter;
pub mod parsers;
pub mod pipeline;

// 重新导出核心类型
pub use error::StreamError;
pub use event_stream::{EventMessage, EventStreamDecoder};
pub use events::AgentStreamEvent;
pub use filter::EosFilter;
pub use parsers::{decode_agent_events, decode_sse_lines, SseLineDecoder};
pub use pipeline::{agent_token_stream, sse_token_stream, DecodedTokenStream, PipelineConfig};
