//! 中继层
//!
//! 把适配器输出的 token 流写到调用方的响应流。

mod error;
mod handler;
pub mod sink;

pub use error::{RelayError, MALFORMED_REQUEST_MESSAGE};
pub use handler::{Relay, RelayOutcome, RelayState};
pub use sink::{body_stream, ChannelSink, ResponseSink, SinkClosed};
