//! 响应输出端
//!
//! 中继把 token 写入 `ResponseSink`。HTTP 服务使用基于 mpsc 的 `ChannelSink`，
//! 接收端作为响应体；接收端被丢弃即表示调用方断开。

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::convert::Infallible;
use tokio::sync::mpsc;

/// 输出端已关闭（调用方断开或已调用 `close`）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkClosed;

impl std::fmt::Display for SinkClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "response sink closed")
    }
}

impl std::error::Error for SinkClosed {}

/// 响应输出端
#[async_trait]
pub trait ResponseSink: Send + Sync {
    /// 写入一个 chunk
    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkClosed>;

    /// 调用方断开时完成
    async fn closed(&self);

    /// 结束响应
    fn close(&mut self);
}

/// 基于 mpsc 通道的输出端
#[derive(Debug)]
pub struct ChannelSink {
    tx: Option<mpsc::Sender<Bytes>>,
}

impl ChannelSink {
    /// 创建输出端和对应的接收端
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx: Some(tx) }, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    async fn write(&mut self, chunk: Bytes) -> Result<(), SinkClosed> {
        match &self.tx {
            Some(tx) => tx.send(chunk).await.map_err(|_| SinkClosed),
            None => Err(SinkClosed),
        }
    }

    async fn closed(&self) {
        if let Some(tx) = &self.tx {
            tx.closed().await;
        }
    }

    fn close(&mut self) {
        self.tx.take();
    }
}

/// 将接收端转换为响应体流
pub fn body_stream(
    mut rx: mpsc::Receiver<Bytes>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    async_stream::stream! {
        while let Some(chunk) = rx.recv().await {
            yield Ok(chunk);
        }
    }
}
