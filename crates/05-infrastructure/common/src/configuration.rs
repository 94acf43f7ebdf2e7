//! 配置相关的基础接口定义

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

/// 可配置组件 trait
///
/// 需要配置的组件必须实现此 trait
pub trait Configurable: Send + Sync {
    /// 配置类型
    type Config: for<'de> Deserialize<'de> + Serialize + Clone + Send + Sync + 'static;

    /// 应用配置
    fn configure(&mut self, config: Self::Config) -> Result<(), ConfigError>;

    /// 获取配置路径
    fn get_config_path() -> &'static str;

    /// 获取默认配置
    fn default_config() -> Self::Config
    where
        Self::Config: Default,
    {
        Self::Config::default()
    }
}

/// 配置验证器 trait
pub trait ConfigValidator<T>: Send + Sync {
    /// 验证配置
    fn validate(&self, config: &T) -> Result<(), ConfigError>;

    /// 获取验证器名称
    fn name(&self) -> &'static str;
}

/// 校验必填的名称字段
pub fn require_non_empty(field_name: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            message: format!("必需字段为空: {}", field_name),
        });
    }
    Ok(())
}
