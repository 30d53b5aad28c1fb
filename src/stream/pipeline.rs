//! 统一流处理管道
//!
//! 封装完整的流式处理流程：后端流 → 空闲超时 → 解码 → EOS 过滤
//!
//! # 使用示例
//!
//! ```ignore
//! use genai_relay_lib::stream::pipeline::{sse_token_stream, PipelineConfig};
//!
//! let config = PipelineConfig::new("</s>");
//! let tokens = sse_token_stream(byte_stream, &config);
//! ```

use crate::backends::{AgentEventStream, ByteStream};
use crate::models::Token;
use crate::resilience::with_idle_timeout;
use crate::stream::error::StreamError;
use crate::stream::filter::EosFilter;
use crate::stream::parsers::{decode_agent_events, decode_sse_lines};
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;

/// 解码后的 token 流（可能以错误结束）
pub type DecodedTokenStream = Pin<Box<dyn Stream<Item = Result<Token, StreamError>> + Send>>;

/// 流处理管道配置
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// EOS 标记，空字符串表示不过滤
    pub eos: String,
    /// 后端流空闲超时
    pub idle_timeout: Option<Duration>,
    /// 生成 S3 链接使用的区域
    pub region: String,
}

impl PipelineConfig {
    pub fn new(eos: impl Into<String>) -> Self {
        Self {
            eos: eos.into(),
            idle_timeout: None,
            region: String::new(),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    fn filter(&self) -> EosFilter {
        EosFilter::new(self.eos.clone())
    }
}

/// SSE 字节流 → token 流
pub fn sse_token_stream(bytes: ByteStream, config: &PipelineConfig) -> DecodedTokenStream {
    let bytes: ByteStream = Box::pin(with_idle_timeout(bytes, config.idle_timeout));
    Box::pin(config.filter().filter_stream(decode_sse_lines(bytes)))
}

/// Agent 事件流 → token 流
pub fn agent_token_stream(events: AgentEventStream, config: &PipelineConfig) -> DecodedTokenStream {
    let events: AgentEventStream = Box::pin(with_idle_timeout(events, config.idle_timeout));
    Box::pin(
        config
            .filter()
            .filter_stream(decode_agent_events(events, config.region.clone())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::BackendError;
    use crate::stream::events::AgentStreamEvent;
    use bytes::Bytes;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_sse_pipeline_filters_eos() {
        let chunks: Vec<Result<Bytes, BackendError>> = vec![
            Ok(Bytes::from_static(b"data:{\"token\":{\"text\":\"Hi\"}}\n")),
            Ok(Bytes::from_static(b"data:{\"token\":{\"text\":\"</s>\"}}\n")),
        ];
        let tokens: Vec<_> = sse_token_stream(
            Box::pin(futures::stream::iter(chunks)),
            &PipelineConfig::new("</s>"),
        )
        .map(|t| t.unwrap())
        .collect()
        .await;
        assert_eq!(tokens, vec!["Hi"]);
    }

    #[tokio::test]
    async fn test_sse_pipeline_idle_timeout() {
        let chunks = futures::stream::iter(vec![Ok::<Bytes, BackendError>(Bytes::from_static(
            b"data:{\"token\":{\"text\":\"a\"}}\n",
        ))])
        .chain(futures::stream::pending());
        let config = PipelineConfig::default().with_idle_timeout(Some(Duration::from_millis(20)));

        let out: Vec<_> = sse_token_stream(Box::pin(chunks), &config).collect().await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "a");
        assert!(matches!(out[1], Err(StreamError::Backend(_))));
    }

    #[tokio::test]
    async fn test_agent_pipeline() {
        let events: Vec<Result<AgentStreamEvent, BackendError>> = vec![
            Ok(AgentStreamEvent::flow_text("x")),
            Ok(AgentStreamEvent::flow_success()),
        ];
        let tokens: Vec<_> = agent_token_stream(
            Box::pin(futures::stream::iter(events)),
            &PipelineConfig::default(),
        )
        .map(|t| t.unwrap())
        .collect()
        .await;
        assert_eq!(tokens, vec!["x"]);
    }
}
