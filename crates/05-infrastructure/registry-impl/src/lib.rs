//! # Registry Implementation
//!
//! 集群注册表的具体实现。
//!
//! ## 核心组件
//!
//! - [`CacheRegistry`] / [`CacheRegistryFactory`] - 基于复制缓存的集群注册表
//! - [`LocalRegistry`] / [`LocalRegistryFactory`] - 单进程部署下的注册表
//! - [`FunctionalRegistryFactory`] - 单实例激活槽位
//! - [`ListenerSet`] - 监听器集合与隔离分发
//! - [`InMemoryCluster`] - 进程内复制缓存，用于演示与测试
//! - [`RegistryService`] - 生命周期适配

pub mod cache_registry;
pub mod consistent_hash;
pub mod functional;
pub mod listeners;
pub mod local;
pub mod memory;
pub mod service;

pub use cache_registry::*;
pub use consistent_hash::*;
pub use functional::*;
pub use listeners::*;
pub use local::*;
pub use memory::*;
pub use service::*;
