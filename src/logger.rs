//! 日志管理模块
use crate::config::LoggingConfig;
use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

/// 本地时间格式 `2024-01-01 12:00:00.000`
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// 解析日志级别，无法识别时回退到 INFO
pub fn parse_level(level: &str) -> Level {
    Level::from_str(level.trim()).unwrap_or(Level::INFO)
}

/// 安装全局 tracing subscriber
///
/// 重复调用时保留已有的 subscriber。
pub fn init(config: &LoggingConfig) {
    let result = tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_max_level(parse_level(&config.level))
        .with_ansi(config.ansi)
        .with_target(false)
        .try_init();

    if result.is_ok() {
        tracing::info!("[LOGGER] 日志级别: {}", parse_level(&config.level));
    }
}

static SANITIZE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        // Bearer token
        (r"Bearer\s+[A-Za-z0-9._~+/=-]+", "Bearer ***"),
        // AWS Access Key ID
        (r"\b(?:AKIA|ASIA)[A-Z0-9]{16}\b", "AKIA***"),
        // AWS 签名
        (r"Signature=[0-9a-f]{64}", "Signature=***"),
        // 通用 token
        (r#"token["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#, "token: ***"),
        (
            r#"[Aa]uthorization["']?\s*[:=]\s*["']?[A-Za-z0-9._\s-]+"#,
            "authorization: ***",
        ),
        (
            r#"secret[_-]?(?:access[_-]?)?key["']?\s*[:=]\s*["']?[A-Za-z0-9/+=._-]+"#,
            "secret_key: ***",
        ),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// 日志脱敏
///
/// 上游返回的错误详情可能回显请求头，写日志前统一经过这里。
pub fn sanitize_log_message(message: &str) -> String {
    let mut sanitized = message.to_string();
    for (re, replacement) in SANITIZE_PATTERNS.iter() {
        sanitized = re.replace_all(&sanitized, *replacement).to_string();
    }
    sanitized
}
