//! 注册表记录提供者

use crate::registry::RegistryEntry;

/// 注册表记录提供者 trait
///
/// 由安装注册表的子系统实现，提供本节点要发布的记录。
pub trait RegistryEntryProvider<K, V>: Send + Sync {
    /// 记录键，返回 `None` 表示本节点不发布记录
    fn key(&self) -> Option<K>;

    /// 记录值
    fn value(&self) -> V;

    /// 组合为记录
    fn entry(&self) -> Option<RegistryEntry<K, V>> {
        self.key().map(|key| RegistryEntry::new(key, self.value()))
    }
}

/// 固定记录提供者
#[derive(Debug, Clone)]
pub struct StaticEntryProvider<K, V> {
    key: Option<K>,
    value: V,
}

impl<K, V> StaticEntryProvider<K, V> {
    /// 发布固定记录
    pub fn new(key: K, value: V) -> Self {
        Self {
            key: Some(key),
            value,
        }
    }

    /// 不发布记录
    pub fn abstain(value: V) -> Self {
        Self { key: None, value }
    }
}

impl<K, V> RegistryEntryProvider<K, V> for StaticEntryProvider<K, V>
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn key(&self) -> Option<K> {
        self.key.clone()
    }

    fn value(&self) -> V {
        self.value.clone()
    }
}
