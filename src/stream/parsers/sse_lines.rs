//! 行缓冲 SSE 解码器
//!
//! SageMaker 上的 TGI 容器以 `data:{"token":{"text":"..."}}\n` 的形式输出 token，
//! 但一行可能被拆分到多个 `PayloadPart` 中。解码器把字节追加到缓冲区，
//! 仅当缓冲区以换行结尾时才整体解析，然后清空缓冲区。

use crate::backends::ByteStream;
use crate::models::Token;
use crate::stream::error::StreamError;
use futures::{Stream, StreamExt};
use serde_json::Value;

/// SSE 数据行前缀
pub const DATA_PREFIX: &str = "data:";

/// 行缓冲 SSE 解码器
///
/// 每次调用持有独立实例，缓冲区存放原始字节，
/// 跨 chunk 拆开的多字节字符会在换行到达后完整解码。
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: Vec<u8>,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尚未解析的字节数
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// 追加一个 chunk
    ///
    /// 缓冲区不以换行结尾时返回空列表。否则按行解析，
    /// 每个 `data:` 行产生一个 token；遇到第一个错误后不再继续，
    /// 结果列表以该错误结尾。
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Token, StreamError>> {
        self.buffer.extend_from_slice(chunk);
        if self.buffer.last() != Some(&b'\n') {
            return Vec::new();
        }

        let buffer = std::mem::take(&mut self.buffer);
        let text = match String::from_utf8(buffer) {
            Ok(text) => text,
            Err(e) => return vec![Err(StreamError::decode(format!("非 UTF-8 数据: {}", e)))],
        };

        let mut tokens = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            let Some(data) = line.strip_prefix(DATA_PREFIX) else {
                continue;
            };
            match parse_data(data) {
                Ok(token) => tokens.push(Ok(token)),
                Err(e) => {
                    tokens.push(Err(e));
                    break;
                }
            }
        }
        tokens
    }

    /// 流结束，返回被丢弃的未终结字节数
    pub fn finish(&mut self) -> usize {
        let remaining = self.buffer.len();
        self.buffer.clear();
        remaining
    }
}

/// 解析 `data:` 之后的 JSON
///
/// `token.text` 缺失或为 null 时返回空 token。
fn parse_data(data: &str) -> Result<Token, StreamError> {
    let value: Value = serde_json::from_str(data.trim())?;
    Ok(value
        .pointer("/token/text")
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string())
}

/// 将字节流解码为 token 流
///
/// 上游错误和解码错误都作为最后一项输出。
pub fn decode_sse_lines(bytes: ByteStream) -> impl Stream<Item = Result<Token, StreamError>> {
    async_stream::stream! {
        let mut decoder = SseLineDecoder::new();
        let mut bytes = bytes;

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(StreamError::Backend(e));
                    return;
                }
            };
            for token in decoder.push(&chunk) {
                let failed = token.is_err();
                yield token;
                if failed {
                    return;
                }
            }
        }

        let discarded = decoder.finish();
        if discarded > 0 {
            tracing::warn!("[STREAM] 流结束时丢弃未以换行结尾的 {} 字节", discarded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{BackendError, BackendErrorKind};
    use bytes::Bytes;

    fn tokens(results: Vec<Result<Token, StreamError>>) -> Vec<Token> {
        results.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut decoder = SseLineDecoder::new();
        assert!(decoder.push(b"data:{\"tok").is_empty());
        assert!(decoder.push(b"en\":{\"text\":\"He").is_empty());
        let out = tokens(decoder.push(b"llo\"}}\n"));
        assert_eq!(out, vec!["Hello"]);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_multiple_lines_in_one_flush() {
        let mut decoder = SseLineDecoder::new();
        let out = tokens(decoder.push(
            b"data:{\"token\":{\"text\":\"a\"}}\n\ndata: {\"token\":{\"text\":\"b\"}}\n",
        ));
        assert_eq!(out, vec!["a", "b"]);
    }

    #[test]
    fn test_non_data_lines_are_ignored() {
        let mut decoder = SseLineDecoder::new();
        let out = tokens(decoder.push(b"event: ping\n: comment\n  data:{\"token\":{\"text\":\"x\"}}\n"));
        assert_eq!(out, vec!["x"]);
    }

    #[test]
    fn test_missing_or_null_text_is_empty_token() {
        let mut decoder = SseLineDecoder::new();
        let out = tokens(decoder.push(
            b"data:{\"token\":{\"text\":null}}\ndata:{\"generated_text\":\"done\"}\n",
        ));
        assert_eq!(out, vec!["", ""]);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let line = "data:{\"token\":{\"text\":\"こんにちは\"}}\n".as_bytes();
        let split = line.iter().position(|b| *b >= 0x80).unwrap() + 1;

        let mut decoder = SseLineDecoder::new();
        assert!(decoder.push(&line[..split]).is_empty());
        assert_eq!(tokens(decoder.push(&line[split..])), vec!["こんにちは"]);
    }

    #[test]
    fn test_invalid_json_stops_batch() {
        let mut decoder = SseLineDecoder::new();
        let out = decoder.push(
            b"data:{\"token\":{\"text\":\"ok\"}}\ndata:{broken\ndata:{\"token\":{\"text\":\"no\"}}\n",
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap(), "ok");
        assert!(out[1].as_ref().unwrap_err().is_decode());
    }

    #[test]
    fn test_finish_discards_remainder() {
        let mut decoder = SseLineDecoder::new();
        decoder.push(b"data:{\"token\"");
        assert_eq!(decoder.finish(), 13);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[tokio::test]
    async fn test_decode_sse_lines_stream() {
        let chunks: Vec<Result<Bytes, BackendError>> = vec![
            Ok(Bytes::from_static(b"data:{\"token\":{\"text\":\"Hel")),
            Ok(Bytes::from_static(b"lo\"}}\n")),
            Ok(Bytes::from_static(b"data:{\"token\":{\"text\":\" world\"}}\n")),
            Ok(Bytes::from_static(b"data:{\"token\"")),
        ];
        let stream: ByteStream = Box::pin(futures::stream::iter(chunks));
        let out: Vec<_> = decode_sse_lines(stream).collect().await;
        assert_eq!(tokens(out), vec!["Hello", " world"]);
    }

    #[tokio::test]
    async fn test_decode_sse_lines_backend_error() {
        let chunks: Vec<Result<Bytes, BackendError>> = vec![
            Ok(Bytes::from_static(b"data:{\"token\":{\"text\":\"a\"}}\n")),
            Err(BackendError::new(BackendErrorKind::Service, "model crashed")),
            Ok(Bytes::from_static(b"data:{\"token\":{\"text\":\"b\"}}\n")),
        ];
        let stream: ByteStream = Box::pin(futures::stream::iter(chunks));
        let out: Vec<_> = decode_sse_lines(stream).collect().await;
        assert_eq!(out.len(), 2);
        assert!(matches!(out[1], Err(StreamError::Backend(_))));
    }
}
