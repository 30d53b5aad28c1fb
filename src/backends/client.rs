//! HTTP 客户端工厂
//!
//! 创建访问模型运行时的 reqwest 客户端，统一设置连接超时和代理。
//! 客户端不设置总超时：流式响应可能持续很久，请求超时由 `RuntimeEndpoint` 按读取方式施加。
//! 支持 http、https 代理协议。

use reqwest::{Client, Proxy};
use std::time::Duration;
use thiserror::Error;

/// 代理协议类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyProtocol {
    /// HTTP 代理
    Http,
    /// HTTPS 代理
    Https,
}

impl ProxyProtocol {
    /// 从 URL 字符串解析代理协议
    pub fn from_url(url: &str) -> Option<Self> {
        let url_lower = url.to_lowercase();
        if url_lower.starts_with("http://") {
            Some(ProxyProtocol::Http)
        } else if url_lower.starts_with("https://") {
            Some(ProxyProtocol::Https)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Https => "https",
        }
    }
}

/// 客户端工厂错误
#[derive(Debug, Error)]
pub enum ClientFactoryError {
    /// 无效的代理 URL
    #[error("无效的代理 URL: {0}")]
    InvalidUrl(String),

    /// 不支持的代理协议
    #[error("不支持的代理协议: {0}")]
    UnsupportedProtocol(String),

    /// 代理配置错误
    #[error("代理配置错误: {0}")]
    ProxyConfig(String),

    /// 客户端构建错误
    #[error("客户端构建错误: {0}")]
    Build(String),

    /// AWS 凭证加载失败
    #[error("AWS 凭证加载失败: {0}")]
    Credentials(String),
}

/// HTTP 客户端工厂
#[derive(Debug, Clone)]
pub struct ClientFactory {
    proxy: Option<String>,
    connect_timeout: Duration,
}

impl Default for ClientFactory {
    fn default() -> Self {
        Self {
            proxy: None,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置代理
    pub fn with_proxy(mut self, proxy_url: Option<String>) -> Self {
        self.proxy = proxy_url.filter(|url| !url.trim().is_empty());
        self
    }

    /// 设置连接超时时间
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// 解析代理 URL 并返回协议类型
    pub fn parse_proxy_url(url: &str) -> Result<ProxyProtocol, ClientFactoryError> {
        if url.trim().is_empty() {
            return Err(ClientFactoryError::InvalidUrl(
                "代理 URL 不能为空".to_string(),
            ));
        }

        ProxyProtocol::from_url(url)
            .ok_or_else(|| ClientFactoryError::UnsupportedProtocol(url.to_string()))
    }

    /// 创建 HTTP 客户端
    pub fn create_client(&self) -> Result<Client, ClientFactoryError> {
        let mut builder = Client::builder().connect_timeout(self.connect_timeout);

        if let Some(url) = &self.proxy {
            Self::parse_proxy_url(url)?;
            let proxy = Proxy::all(url.as_str())
                .map_err(|e| ClientFactoryError::ProxyConfig(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| ClientFactoryError::Build(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_protocol_from_url() {
        assert_eq!(
            ProxyProtocol::from_url("HTTP://proxy.example.com:8080"),
            Some(ProxyProtocol::Http)
        );
        assert_eq!(
            ProxyProtocol::from_url("https://secure-proxy.example.com:443"),
            Some(ProxyProtocol::Https)
        );
        assert_eq!(ProxyProtocol::from_url("socks5://127.0.0.1:1080"), None);
        assert_eq!(ProxyProtocol::from_url("invalid-url"), None);
    }

    #[test]
    fn test_parse_proxy_url_invalid() {
        assert!(matches!(
            ClientFactory::parse_proxy_url("   "),
            Err(ClientFactoryError::InvalidUrl(_))
        ));
        assert!(matches!(
            ClientFactory::parse_proxy_url("ftp://proxy:21"),
            Err(ClientFactoryError::UnsupportedProtocol(_))
        ));
    }

    #[test]
    fn test_blank_proxy_is_ignored() {
        let factory = ClientFactory::new().with_proxy(Some("  ".to_string()));
        assert!(factory.proxy().is_none());
    }

    #[test]
    fn test_create_client() {
        assert!(ClientFactory::new().create_client().is_ok());

        let factory = ClientFactory::new()
            .with_proxy(Some("http://127.0.0.1:8080".to_string()))
            .with_connect_timeout(Duration::from_secs(5));
        assert!(factory.create_client().is_ok());

        let factory = ClientFactory::new().with_proxy(Some("socks5://127.0.0.1:1080".to_string()));
        assert!(matches!(
            factory.create_client(),
            Err(ClientFactoryError::UnsupportedProtocol(_))
        ));
    }
}
