//! 注册表工厂抽象接口

use crate::provider::RegistryEntryProvider;
use crate::registry::{Registry, RegistryKey, RegistryValue};
use infrastructure_common::RegistryError;
use std::sync::Arc;

/// 注册表工厂 trait
///
/// 每个工厂实例在任意时刻最多只有一个活动注册表。
pub trait RegistryFactory<K: RegistryKey, V: RegistryValue>: Send + Sync {
    /// 工厂名称
    fn name(&self) -> &str;

    /// 创建注册表
    ///
    /// 前一个注册表尚未关闭时返回 [`RegistryError::AlreadyActive`]。
    fn create_registry(
        &self,
        provider: Arc<dyn RegistryEntryProvider<K, V>>,
    ) -> Result<Arc<dyn Registry<K, V>>, RegistryError>;

    /// 是否存在活动注册表
    fn is_active(&self) -> bool;
}
