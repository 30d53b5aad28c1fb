//! EOS 标记过滤
//!
//! 含有 EOS 标记的 token 整个丢弃（不做截断），错误原样透传。

use crate::models::Token;
use crate::stream::error::StreamError;
use futures::{Stream, StreamExt};

/// EOS 过滤器
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EosFilter {
    eos: String,
}

impl EosFilter {
    pub fn new(eos: impl Into<String>) -> Self {
        Self { eos: eos.into() }
    }

    /// EOS 为空时过滤器为恒等变换
    pub fn is_identity(&self) -> bool {
        self.eos.is_empty()
    }

    /// token 是否保留
    pub fn keeps(&self, token: &str) -> bool {
        self.is_identity() || !token.contains(&self.eos)
    }

    /// 过滤 token 列表
    pub fn apply<I>(&self, tokens: I) -> Vec<Token>
    where
        I: IntoIterator<Item = Token>,
    {
        tokens.into_iter().filter(|t| self.keeps(t)).collect()
    }

    /// 过滤 token 流
    pub fn filter_stream<S>(self, tokens: S) -> impl Stream<Item = Result<Token, StreamError>>
    where
        S: Stream<Item = Result<Token, StreamError>>,
    {
        tokens.filter(move |item| {
            let keep = match item {
                Ok(token) => self.keeps(token),
                Err(_) => true,
            };
            futures::future::ready(keep)
        })
    }
}
