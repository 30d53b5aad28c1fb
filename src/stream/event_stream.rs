//! AWS Event Stream 二进制帧解析
//!
//! SageMaker 和 Bedrock Agent Runtime 的流式响应体都使用
//! `application/vnd.amazon.eventstream` 编码。每条消息的布局：
//!
//! ```text
//! | total_len u32 | headers_len u32 | prelude_crc u32 | headers | payload | message_crc u32 |
//! ```
//!
//! 一条消息可能被拆分到多个 HTTP chunk 中，解析器会缓存不完整的尾部，
//! 直到整条消息到齐后再输出。CRC 不做校验。

use crate::backends::{BackendError, BackendErrorKind};
use bytes::{Buf, Bytes, BytesMut};

/// 前导部分长度（total_len + headers_len + prelude_crc）
const PRELUDE_LEN: usize = 12;
/// 消息尾部 CRC 长度
const MESSAGE_CRC_LEN: usize = 4;
/// 单条消息最大长度（16MB）
pub const MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

/// 消息头的值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Bytes(Bytes),
    String(String),
    Timestamp(i64),
    Uuid([u8; 16]),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// 一条完整的 event-stream 消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    pub headers: Vec<(String, HeaderValue)>,
    pub payload: Bytes,
}

impl EventMessage {
    /// 按名称获取字符串类型的消息头
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| value.as_str())
    }

    /// `:message-type`（event / exception / error）
    pub fn message_type(&self) -> Option<&str> {
        self.header_str(":message-type")
    }

    /// `:event-type`
    pub fn event_type(&self) -> Option<&str> {
        self.header_str(":event-type")
    }

    /// `:exception-type`
    pub fn exception_type(&self) -> Option<&str> {
        self.header_str(":exception-type")
    }

    /// 是否为异常消息
    pub fn is_exception(&self) -> bool {
        matches!(self.message_type(), Some("exception") | Some("error"))
    }

    /// 将异常消息转换为后端错误
    ///
    /// 错误码取自 `:exception-type` 或 `:error-code`，
    /// 描述取自 JSON 负载中的 `message`/`Message`，否则为负载原文。
    pub fn to_backend_error(&self) -> BackendError {
        let code = self
            .exception_type()
            .or_else(|| self.header_str(":error-code"))
            .map(str::to_string);
        let message = self
            .header_str(":error-message")
            .map(str::to_string)
            .unwrap_or_else(|| payload_message(&self.payload));
        let mut error = BackendError::new(BackendErrorKind::Service, message);
        error.code = code;
        error
    }
}

/// 从错误负载中提取描述文本
fn payload_message(payload: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(payload)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("Message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| String::from_utf8_lossy(payload).into_owned())
}

/// 增量 event-stream 解析器
///
/// 每个请求持有独立实例。
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: BytesMut,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已缓存但尚未构成完整消息的字节数
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// 追加字节并取出所有已完整的消息
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<EventMessage>, BackendError> {
        self.buffer.extend_from_slice(bytes);

        let mut messages = Vec::new();
        while self.buffer.len() >= PRELUDE_LEN {
            let total_len = u32::from_be_bytes([
                self.buffer[0],
                self.buffer[1],
                self.buffer[2],
                self.buffer[3],
            ]) as usize;

            if total_len < PRELUDE_LEN + MESSAGE_CRC_LEN || total_len > MAX_MESSAGE_LEN {
                return Err(frame_error(format!("非法的消息长度: {}", total_len)));
            }
            if self.buffer.len() < total_len {
                break;
            }

            let frame = self.buffer.split_to(total_len).freeze();
            messages.push(parse_message(frame)?);
        }
        Ok(messages)
    }

    /// 流结束时检查残留数据
    pub fn finish(&self) -> Result<(), BackendError> {
        if self.buffer.is_empty() {
            Ok(())
        } else {
            Err(frame_error(format!(
                "流在消息中途结束，残留 {} 字节",
                self.buffer.len()
            )))
        }
    }
}

fn frame_error(message: String) -> BackendError {
    BackendError::new(BackendErrorKind::Decode, message)
}

/// 解析一条完整消息
fn parse_message(mut frame: Bytes) -> Result<EventMessage, BackendError> {
    let total_len = frame.get_u32() as usize;
    let headers_len = frame.get_u32() as usize;
    let _prelude_crc = frame.get_u32();

    let body_len = total_len - PRELUDE_LEN - MESSAGE_CRC_LEN;
    if headers_len > body_len {
        return Err(frame_error(format!(
            "消息头长度 {} 超出消息体长度 {}",
            headers_len, body_len
        )));
    }

    let headers = parse_headers(frame.split_to(headers_len))?;
    let payload = frame.split_to(body_len - headers_len);
    Ok(EventMessage { headers, payload })
}

fn parse_headers(mut buf: Bytes) -> Result<Vec<(String, HeaderValue)>, BackendError> {
    let mut headers = Vec::new();
    while buf.has_remaining() {
        let name_len = buf.get_u8() as usize;
        ensure_remaining(&buf, name_len + 1)?;
        let name = String::from_utf8(buf.split_to(name_len).to_vec())
            .map_err(|e| frame_error(format!("消息头名称不是 UTF-8: {}", e)))?;
        let value = parse_header_value(&mut buf)?;
        headers.push((name, value));
    }
    Ok(headers)
}

fn parse_header_value(buf: &mut Bytes) -> Result<HeaderValue, BackendError> {
    let value_type = buf.get_u8();
    let value = match value_type {
        0 => HeaderValue::Bool(true),
        1 => HeaderValue::Bool(false),
        2 => {
            ensure_remaining(buf, 1)?;
            HeaderValue::Byte(buf.get_i8())
        }
        3 => {
            ensure_remaining(buf, 2)?;
            HeaderValue::Short(buf.get_i16())
        }
        4 => {
            ensure_remaining(buf, 4)?;
            HeaderValue::Int(buf.get_i32())
        }
        5 => {
            ensure_remaining(buf, 8)?;
            HeaderValue::Long(buf.get_i64())
        }
        6 => HeaderValue::Bytes(read_length_prefixed(buf)?),
        7 => {
            let raw = read_length_prefixed(buf)?;
            HeaderValue::String(
                String::from_utf8(raw.to_vec())
                    .map_err(|e| frame_error(format!("消息头值不是 UTF-8: {}", e)))?,
            )
        }
        8 => {
            ensure_remaining(buf, 8)?;
            HeaderValue::Timestamp(buf.get_i64())
        }
        9 => {
            ensure_remaining(buf, 16)?;
            let mut uuid = [0u8; 16];
            buf.copy_to_slice(&mut uuid);
            HeaderValue::Uuid(uuid)
        }
        other => return Err(frame_error(format!("未知的消息头类型: {}", other))),
    };
    Ok(value)
}

fn read_length_prefixed(buf: &mut Bytes) -> Result<Bytes, BackendError> {
    ensure_remaining(buf, 2)?;
    let len = buf.get_u16() as usize;
    ensure_remaining(buf, len)?;
    Ok(buf.split_to(len))
}

fn ensure_remaining(buf: &Bytes, needed: usize) -> Result<(), BackendError> {
    if buf.remaining() < needed {
        Err(frame_error(format!(
            "消息头被截断: 需要 {} 字节，剩余 {}",
            needed,
            buf.remaining()
        )))
    } else {
        Ok(())
    }
}

/// 编码一条消息（仅字符串消息头），CRC 字段填 0
///
/// 用于测试和本地模拟上游。
pub fn encode_message(headers: &[(&str, &str)], payload: &[u8]) -> Vec<u8> {
    let mut header_bytes = Vec::new();
    for (name, value) in headers {
        header_bytes.push(name.len() as u8);
        header_bytes.extend_from_slice(name.as_bytes());
        header_bytes.push(7);
        header_bytes.extend_from_slice(&(value.len() as u16).to_be_bytes());
        header_bytes.extend_from_slice(value.as_bytes());
    }

    let total_len = PRELUDE_LEN + header_bytes.len() + payload.len() + MESSAGE_CRC_LEN;
    let mut out = Vec::with_capacity(total_len);
    out.extend_from_slice(&(total_len as u32).to_be_bytes());
    out.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(payload);
    out.extend_from_slice(&0u32.to_be_bytes());
    out
}

/// 编码一条 `:message-type = event` 消息
pub fn encode_event(event_type: &str, payload: &[u8]) -> Vec<u8> {
    encode_message(
        &[
            (":message-type", "event"),
            (":event-type", event_type),
            (":content-type", "application/json"),
        ],
        payload,
    )
}
