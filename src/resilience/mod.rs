//! 容错机制模块
//!
//! 提供超时控制功能。上游调用不做重试。

mod timeout;

pub use timeout::{with_idle_timeout, TimeoutConfig, TimeoutError};
