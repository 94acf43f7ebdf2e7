//! # Infrastructure Common
//!
//! 集群注册表基础设施的公共 traits 和错误类型。
//!
//! ## 核心组件
//!
//! - [`RegistryError`] / [`CacheError`] - 注册表与复制缓存错误
//! - [`Configurable`] - 可配置组件 trait
//! - [`Lifecycle`] - 组件生命周期管理

pub mod configuration;
pub mod errors;
pub mod lifecycle;

pub use configuration::*;
pub use errors::*;
pub use lifecycle::*;
