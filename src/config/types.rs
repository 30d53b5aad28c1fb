//! 配置类型定义

use crate::models::{AgentTarget, PromptTemplate};
use crate::resilience::TimeoutConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub aws: AwsConfig,
    pub sagemaker: SageMakerConfig,
    /// 上游请求与流空闲超时
    pub stream: TimeoutConfig,
    pub logging: LoggingConfig,
    /// Agent 映射：请求中的 `modelId` → Agent ID 与别名
    pub agents: BTreeMap<String, AgentTarget>,
}


/// HTTP 服务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 请求体大小上限（字节）
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            body_limit_bytes: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// AWS 访问配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub region: String,
    /// SageMaker Runtime 端点，未设置时按区域推导
    pub sagemaker_endpoint_url: Option<String>,
    /// Bedrock Agent Runtime 端点，未设置时按区域推导
    pub agent_runtime_endpoint_url: Option<String>,
    /// Bearer Token，设置后代替 SigV4 签名
    pub bearer_token: Option<String>,
    /// 是否用默认凭证链做 SigV4 签名，关闭时要求端点由签名代理提供
    pub sign_requests: bool,
    /// HTTP(S) 代理
    pub proxy: Option<String>,
    pub connect_timeout_secs: u64,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            sagemaker_endpoint_url: None,
            agent_runtime_endpoint_url: None,
            bearer_token: None,
            sign_requests: true,
            proxy: None,
            connect_timeout_secs: 30,
        }
    }
}

impl AwsConfig {
    pub fn sagemaker_url(&self) -> String {
        self.sagemaker_endpoint_url
            .clone()
            .unwrap_or_else(|| format!("https://runtime.sagemaker.{}.amazonaws.com", self.region))
    }

    pub fn agent_runtime_url(&self) -> String {
        self.agent_runtime_endpoint_url.clone().unwrap_or_else(|| {
            format!("https://bedrock-agent-runtime.{}.amazonaws.com", self.region)
        })
    }
}

/// SageMaker 聊天配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SageMakerConfig {
    /// 端点名称
    pub endpoint_name: String,
    /// 用于选择模板的模型名，未设置时使用端点名称
    pub model_name: Option<String>,
    /// 自定义模板，设置后优先于内置模板
    pub prompt_template: Option<PromptTemplate>,
}

impl SageMakerConfig {
    /// 选择模板使用的模型名
    pub fn template_model(&self) -> &str {
        self.model_name.as_deref().unwrap_or(&self.endpoint_name)
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或 EnvFilter 指令
    pub level: String,
    /// 是否输出 ANSI 颜色
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}
