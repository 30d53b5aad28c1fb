//! 配置管理模块
//!
//! 提供 YAML 配置文件加载和环境变量覆盖

mod loader;
mod path_utils;
mod types;

pub use loader::{
    apply_env_overrides, default_config_path, load_config, load_file, parse_yaml,
    resolve_config_path, validate, ConfigError, CONFIG_PATH_ENV,
};
pub use path_utils::expand_tilde;
pub use types::{AwsConfig, Config, LoggingConfig, SageMakerConfig, ServerConfig};
