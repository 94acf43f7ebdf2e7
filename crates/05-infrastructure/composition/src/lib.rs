//! # 注册表组合层
//!
//! 负责把配置、日志与注册表实现组合成可运行的注册表服务。
//!
//! ## 主要功能
//!
//! - **配置加载**: 从配置文件与 `REGISTRY__` 环境变量加载 [`RegistrySettings`]
//! - **日志初始化**: 通过 [`LoggingConfig`] 初始化 `tracing` 订阅者
//! - **工厂组装**: [`RegistryInfrastructureBuilder`] 按运行模式选择本地或集群注册表工厂
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use registry_abstractions::StaticEntryProvider;
//! use registry_composition::{RegistryInfrastructureBuilder, RegistrySettings};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = RegistrySettings::load(None)?;
//!     let factory = RegistryInfrastructureBuilder::<String, String>::new(settings)
//!         .with_configured_logging()?
//!         .build()?;
//!
//!     let registry = factory.create_registry(Arc::new(StaticEntryProvider::new(
//!         "node-1-role".to_string(),
//!         "primary".to_string(),
//!     )))?;
//!     println!("集群记录: {:?}", registry.entries());
//!     registry.close();
//!
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod logging;
pub mod settings;

#[cfg(test)]
mod tests;

// 重新导出主要类型
pub use builder::RegistryInfrastructureBuilder;
pub use logging::LoggingConfig;
pub use settings::{LoggingSettings, RegistryMode, RegistrySettings, SettingsValidator};

// 重新导出错误类型
pub use infrastructure_common::InfrastructureError;
