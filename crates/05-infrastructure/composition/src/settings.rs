//! 注册表配置
//!
//! 配置按以下顺序叠加，后者覆盖前者：
//!
//! 1. 内置默认值
//! 2. 可选的 TOML / JSON 配置文件
//! 3. `REGISTRY__` 前缀的环境变量，例如 `REGISTRY__MODE=clustered`、`REGISTRY__LOGGING__LEVEL=debug`

use crate::logging::LoggingConfig;
use infrastructure_common::{require_non_empty, ConfigError, ConfigValidator, Configurable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "REGISTRY";

/// 环境变量层级分隔符
pub const ENV_SEPARATOR: &str = "__";

/// 注册表运行模式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryMode {
    /// 单进程部署
    #[default]
    Local,
    /// 基于复制缓存的集群部署
    Clustered,
}

/// 日志配置段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// 日志级别
    pub level: String,
    /// 是否使用 JSON 格式
    pub json: bool,
    /// 是否显示文件名与行号
    pub show_location: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            show_location: false,
        }
    }
}

impl LoggingSettings {
    /// 转换为日志初始化配置
    pub fn to_logging_config(&self) -> Result<LoggingConfig, ConfigError> {
        let level = self
            .level
            .parse::<tracing::Level>()
            .map_err(|_| ConfigError::ValidationError {
                message: format!("无效的日志级别: {}", self.level),
            })?;

        Ok(LoggingConfig {
            level,
            show_file: self.show_location,
            show_line_number: self.show_location,
            json_format: self.json,
            ..LoggingConfig::default()
        })
    }
}

/// 注册表配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// 运行模式
    pub mode: RegistryMode,
    /// 缓存容器名称，本地模式下作为组名
    pub container: String,
    /// 缓存名称
    pub cache: String,
    /// 本节点名称
    pub node: String,
    /// 日志配置
    pub logging: LoggingSettings,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            mode: RegistryMode::Local,
            container: "server".to_string(),
            cache: "registry".to_string(),
            node: "node-1".to_string(),
            logging: LoggingSettings::default(),
        }
    }
}

impl RegistrySettings {
    /// 从可选配置文件与进程环境变量加载配置
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None)
    }

    /// 从可选配置文件与指定的环境变量集合加载配置
    ///
    /// `env` 为 `None` 时读取进程环境变量。
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            debug!("加载注册表配置文件: {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .source(env),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| ConfigError::ParseError {
                source: Box::new(e),
            })?;

        settings.validate()?;
        info!(
            "注册表配置已加载: mode={:?}, container={}, cache={}, node={}",
            settings.mode, settings.container, settings.cache, settings.node
        );
        Ok(settings)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        SettingsValidator.validate(self)
    }

    /// 工厂名称，与集群注册表工厂的命名一致
    pub fn factory_name(&self) -> String {
        format!("{}/{}", self.container, self.cache)
    }
}

/// 注册表配置校验器
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsValidator;

impl ConfigValidator<RegistrySettings> for SettingsValidator {
    fn validate(&self, config: &RegistrySettings) -> Result<(), ConfigError> {
        require_non_empty("container", &config.container)?;
        require_non_empty("cache", &config.cache)?;
        require_non_empty("node", &config.node)?;
        config.logging.to_logging_config()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "RegistrySettingsValidator"
    }
}

impl Configurable for RegistrySettings {
    type Config = Self;

    fn configure(&mut self, config: Self::Config) -> Result<(), ConfigError> {
        config.validate()?;
        *self = config;
        Ok(())
    }

    fn get_config_path() -> &'static str {
        "registry"
    }
}
