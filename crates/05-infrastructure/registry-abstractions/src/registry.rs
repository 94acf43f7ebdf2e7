//! 注册表抽象接口

use crate::group::{Group, Node};
use infrastructure_common::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// 注册表键约束
pub trait RegistryKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> RegistryKey for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// 注册表值约束
pub trait RegistryValue: Clone + Debug + Send + Sync + 'static {}

impl<T> RegistryValue for T where T: Clone + Debug + Send + Sync + 'static {}

/// 注册表记录
///
/// 由单个集群节点发布的不可变 `(key, value)` 对。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry<K, V> {
    key: K,
    value: V,
}

impl<K, V> RegistryEntry<K, V> {
    /// 创建新记录
    pub fn new(key: K, value: V) -> Self {
        Self { key, value }
    }

    /// 记录键
    pub fn key(&self) -> &K {
        &self.key
    }

    /// 记录值
    pub fn value(&self) -> &V {
        &self.value
    }

    /// 拆分为键值对
    pub fn into_pair(self) -> (K, V) {
        (self.key, self.value)
    }
}

impl<K: RegistryKey, V: RegistryValue> RegistryEntry<K, V> {
    /// 包装为单元素映射，用于批量通知
    pub fn to_singleton_map(&self) -> HashMap<K, V> {
        HashMap::from([(self.key.clone(), self.value.clone())])
    }
}

/// 注册表监听器 trait
///
/// 每个回调都接收受影响记录的映射，以便一次拓扑变更清理多个节点时批量通知。
/// 所有方法都有空的默认实现。
pub trait RegistryListener<K, V>: Send + Sync {
    /// 新增记录
    fn added_entries(&self, _added: &HashMap<K, V>) {}

    /// 更新记录
    fn updated_entries(&self, _updated: &HashMap<K, V>) {}

    /// 移除记录
    fn removed_entries(&self, _removed: &HashMap<K, V>) {}
}

/// 监听器注册句柄
///
/// 调用 [`ListenerRegistration::close`] 注销监听器；丢弃句柄不会注销。
pub struct ListenerRegistration {
    unregister: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerRegistration {
    /// 创建新的注册句柄
    pub fn new(unregister: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unregister: Some(Box::new(unregister)),
        }
    }

    /// 不执行任何操作的注册句柄
    pub fn noop() -> Self {
        Self { unregister: None }
    }

    /// 注销监听器
    pub fn close(mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

impl Debug for ListenerRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("noop", &self.unregister.is_none())
            .finish()
    }
}

/// 注册表 trait
///
/// 表示本节点发布的记录，同时提供对所有节点记录的读访问和监听器订阅。
pub trait Registry<K: RegistryKey, V: RegistryValue>: Send + Sync {
    /// 注册表所属的集群组
    fn group(&self) -> Arc<dyn Group>;

    /// 集群内所有已发布记录的快照
    fn entries(&self) -> HashMap<K, V>;

    /// 指定节点发布的记录
    fn entry(&self, node: &Node) -> Option<RegistryEntry<K, V>>;

    /// 重新计算并发布本地记录
    ///
    /// 提供者返回空键时不发布，返回 `None`。
    fn local_entry(&self) -> Result<Option<RegistryEntry<K, V>>, RegistryError>;

    /// 添加监听器
    fn add_listener(&self, listener: Arc<dyn RegistryListener<K, V>>) -> ListenerRegistration;

    /// 移除监听器
    fn remove_listener(&self, listener: &Arc<dyn RegistryListener<K, V>>);

    /// 关闭注册表，移除本地记录并释放工厂
    fn close(&self);
}
