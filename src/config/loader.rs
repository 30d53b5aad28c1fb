//! YAML 配置加载
//!
//! 加载顺序：配置文件 → 环境变量覆盖 → 校验。

use super::path_utils::expand_tilde;
use super::types::Config;
use crate::models::{AgentTarget, PromptTemplate};
use crate::prompt::{validate_template, PromptError};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "GENAI_RELAY_CONFIG";

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML 解析错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("环境变量 {name} 无效: {reason}")]
    InvalidEnv { name: &'static str, reason: String },

    #[error("配置校验失败: {0}")]
    Validation(String),

    #[error(transparent)]
    Template(#[from] PromptError),
}

/// 默认配置文件路径：`~/.genai-relay/config.yaml`
pub fn default_config_path() -> PathBuf {
    expand_tilde("~/.genai-relay/config.yaml")
}

/// 确定配置文件路径
///
/// 优先级：命令行参数 > `GENAI_RELAY_CONFIG` > 默认路径
pub fn resolve_config_path(cli_arg: Option<&str>, env_value: Option<&str>) -> PathBuf {
    cli_arg
        .or(env_value)
        .filter(|p| !p.trim().is_empty())
        .map(expand_tilde)
        .unwrap_or_else(default_config_path)
}

/// 解析 YAML 文本
pub fn parse_yaml(content: &str) -> Result<Config, ConfigError> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// 从文件加载配置，文件不存在时返回默认配置
pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_yaml(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("[CONFIG] 配置文件不存在，使用默认配置: {}", path.display());
            Ok(Config::default())
        }
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// 用环境变量覆盖配置
pub fn apply_env_overrides(
    config: &mut Config,
    env: &HashMap<String, String>,
) -> Result<(), ConfigError> {
    let get = |name: &str| env.get(name).filter(|v| !v.trim().is_empty());

    if let Some(region) = get("MODEL_REGION") {
        config.aws.region = region.clone();
    }
    if let Some(model) = get("MODEL_NAME") {
        config.sagemaker.endpoint_name = model.clone();
    }
    if let Some(template) = get("PROMPT_TEMPLATE") {
        let template: PromptTemplate =
            serde_json::from_str(template).map_err(|e| ConfigError::InvalidEnv {
                name: "PROMPT_TEMPLATE",
                reason: e.to_string(),
            })?;
        config.sagemaker.prompt_template = Some(template);
    }
    if let Some(agents) = get("AGENT_MAP") {
        let agents: BTreeMap<String, AgentTarget> =
            serde_json::from_str(agents).map_err(|e| ConfigError::InvalidEnv {
                name: "AGENT_MAP",
                reason: e.to_string(),
            })?;
        config.agents = agents;
    }
    if let Some(token) = get("AWS_BEARER_TOKEN_BEDROCK") {
        config.aws.bearer_token = Some(token.clone());
    }
    if let Some(host) = get("RELAY_HOST") {
        config.server.host = host.clone();
    }
    if let Some(port) = get("RELAY_PORT") {
        config.server.port = port.parse().map_err(|e| ConfigError::InvalidEnv {
            name: "RELAY_PORT",
            reason: format!("{}", e),
        })?;
    }
    if let Some(level) = get("RELAY_LOG_LEVEL") {
        config.logging.level = level.clone();
    }
    Ok(())
}

/// 校验配置
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.aws.region.trim().is_empty() {
        return Err(ConfigError::Validation("aws.region 不能为空".to_string()));
    }
    if config.server.body_limit_bytes == 0 {
        return Err(ConfigError::Validation(
            "server.body_limit_bytes 必须大于 0".to_string(),
        ));
    }
    for url in [
        &config.aws.sagemaker_endpoint_url,
        &config.aws.agent_runtime_endpoint_url,
    ]
    .into_iter()
    .flatten()
    {
        url::Url::parse(url)
            .map_err(|e| ConfigError::Validation(format!("无效的端点 URL {}: {}", url, e)))?;
    }
    if let Some(template) = &config.sagemaker.prompt_template {
        validate_template(template)?;
    }
    Ok(())
}

/// 完整加载流程
pub fn load_config(path: &Path, env: &HashMap<String, String>) -> Result<Config, ConfigError> {
    let mut config = load_file(path)?;
    apply_env_overrides(&mut config, env)?;
    validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.yaml"), &HashMap::new()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
server:
  port: 8080
aws:
  region: ap-northeast-1
  agent_runtime_endpoint_url: http://127.0.0.1:9000
sagemaker:
  endpoint_name: rinna-endpoint
  model_name: rinna
stream:
  stream_idle_timeout_ms: 0
agents:
  search-agent:
    agent_id: AGENT2
    alias_id: TSTALIASID
"#
        )
        .unwrap();

        let config = load_config(file.path(), &HashMap::new()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.aws.region, "ap-northeast-1");
        assert_eq!(config.aws.agent_runtime_url(), "http://127.0.0.1:9000");
        assert_eq!(config.sagemaker.template_model(), "rinna");
        assert!(config.stream.stream_idle_timeout().is_none());
        assert!(config.aws.sign_requests);
        assert_eq!(config.agents["search-agent"].alias_id, "TSTALIASID");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            &env(&[
                ("MODEL_REGION", "eu-west-1"),
                ("MODEL_NAME", "llama-2-13b"),
                ("AWS_BEARER_TOKEN_BEDROCK", "abc"),
                ("RELAY_PORT", "9001"),
                ("RELAY_LOG_LEVEL", "debug"),
                ("RELAY_HOST", ""),
            ]),
        )
        .unwrap();

        assert_eq!(config.aws.region, "eu-west-1");
        assert_eq!(config.sagemaker.endpoint_name, "llama-2-13b");
        assert_eq!(config.aws.bearer_token.as_deref(), Some("abc"));
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_prompt_template_env() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            &env(&[(
                "PROMPT_TEMPLATE",
                r#"{"prefix":"","suffix":"A:","join":"\n","user":"U: {}","assistant":"A: {}","system":"S: {}","eosToken":"<eos>"}"#,
            )]),
        )
        .unwrap();
        let template = config.sagemaker.prompt_template.unwrap();
        assert_eq!(template.eos_token, "<eos>");
        assert_eq!(template.user, "U: {}");
    }

    #[test]
    fn test_agent_map_env() {
        let mut config = Config::default();
        apply_env_overrides(
            &mut config,
            &env(&[(
                "AGENT_MAP",
                r#"{"code-interpreter":{"agentId":"AGENT1","aliasId":"ALIAS1"}}"#,
            )]),
        )
        .unwrap();
        assert_eq!(
            config.agents.get("code-interpreter"),
            Some(&AgentTarget {
                agent_id: "AGENT1".to_string(),
                alias_id: "ALIAS1".to_string(),
            })
        );

        let err = apply_env_overrides(&mut config, &env(&[("AGENT_MAP", "[1]")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: "AGENT_MAP", .. }));
    }

    #[test]
    fn test_invalid_env_values() {
        let mut config = Config::default();
        let err = apply_env_overrides(&mut config, &env(&[("RELAY_PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { name: "RELAY_PORT", .. }));

        let err =
            apply_env_overrides(&mut config, &env(&[("PROMPT_TEMPLATE", "{nope")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                name: "PROMPT_TEMPLATE",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_bad_template_and_url() {
        let mut config = Config::default();
        config.sagemaker.prompt_template = Some(PromptTemplate {
            user: "no placeholder".to_string(),
            ..PromptTemplate::claude()
        });
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Template(PromptError::InvalidTemplate { .. }))
        ));

        let mut config = Config::default();
        config.aws.sagemaker_endpoint_url = Some("not a url".to_string());
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            parse_yaml("server: [unclosed"),
            Err(ConfigError::Yaml(_))
        ));
        assert_eq!(parse_yaml("  \n").unwrap(), Config::default());
    }

    #[test]
    fn test_resolve_config_path() {
        assert_eq!(
            resolve_config_path(Some("/etc/relay.yaml"), Some("/tmp/other.yaml")),
            PathBuf::from("/etc/relay.yaml")
        );
        assert_eq!(
            resolve_config_path(None, Some("/tmp/other.yaml")),
            PathBuf::from("/tmp/other.yaml")
        );
        assert_eq!(resolve_config_path(None, None), default_config_path());
    }
}
