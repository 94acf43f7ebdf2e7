//! # Registry Abstractions
//!
//! 集群注册表抽象层：每个节点向复制缓存发布一条 `(key, value)` 记录，
//! 所有节点都可以读取并订阅整个集群的记录变化。
//!
//! ## 对外接口
//!
//! - [`Registry`] - 注册表句柄
//! - [`RegistryListener`] - 注册表监听器
//! - [`RegistryFactory`] - 注册表工厂
//! - [`RegistryEntryProvider`] - 本地记录提供者
//!
//! ## 协作方接口
//!
//! - [`ReplicatedCache`] / [`CacheListener`] - 复制缓存及其事件订阅
//! - [`Batcher`] / [`Batch`] - 作用域批处理
//! - [`Group`] / [`NodeFactory`] - 集群成员视图
//! - [`ConsistentHash`] - 一致性哈希

pub mod batch;
pub mod cache;
pub mod factory;
pub mod group;
pub mod provider;
pub mod registry;

pub use batch::*;
pub use cache::*;
pub use factory::*;
pub use group::*;
pub use provider::*;
pub use registry::*;
