//! 非集群注册表实现
//!
//! 单进程部署下只有一个节点，不存在远程事件，监听器永远不会被触发。

use crate::functional::{CloseTask, FunctionalRegistryFactory};
use infrastructure_common::RegistryError;
use parking_lot::{Mutex, RwLock};
use registry_abstractions::{
    Group, ListenerRegistration, Node, Registry, RegistryEntry, RegistryEntryProvider,
    RegistryFactory, RegistryKey, RegistryListener, RegistryValue,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 本地集群组
#[derive(Debug, Clone)]
pub struct LocalGroup {
    name: String,
    node: Node,
}

impl LocalGroup {
    /// 创建本地组
    pub fn new(name: impl Into<String>, node: Node) -> Self {
        Self {
            name: name.into(),
            node,
        }
    }
}

impl Group for LocalGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn local_node(&self) -> Node {
        self.node.clone()
    }
}

/// 本地注册表
pub struct LocalRegistry<K, V> {
    group: Arc<dyn Group>,
    provider: Arc<dyn RegistryEntryProvider<K, V>>,
    entry: RwLock<Option<RegistryEntry<K, V>>>,
    close_task: Mutex<Option<CloseTask>>,
}

impl<K: RegistryKey, V: RegistryValue> LocalRegistry<K, V> {
    /// 创建本地注册表
    pub fn new(
        group: Arc<dyn Group>,
        provider: Arc<dyn RegistryEntryProvider<K, V>>,
        close_task: CloseTask,
    ) -> Self {
        let entry = provider.entry();
        Self {
            group,
            provider,
            entry: RwLock::new(entry),
            close_task: Mutex::new(Some(close_task)),
        }
    }
}

impl<K: RegistryKey, V: RegistryValue> Registry<K, V> for LocalRegistry<K, V> {
    fn group(&self) -> Arc<dyn Group> {
        self.group.clone()
    }

    fn entries(&self) -> HashMap<K, V> {
        self.entry
            .read()
            .as_ref()
            .map(RegistryEntry::to_singleton_map)
            .unwrap_or_default()
    }

    fn entry(&self, _node: &Node) -> Option<RegistryEntry<K, V>> {
        self.entry.read().clone()
    }

    fn local_entry(&self) -> Result<Option<RegistryEntry<K, V>>, RegistryError> {
        let entry = self.provider.entry();
        *self.entry.write() = entry.clone();
        Ok(entry)
    }

    fn add_listener(&self, _listener: Arc<dyn RegistryListener<K, V>>) -> ListenerRegistration {
        ListenerRegistration::noop()
    }

    fn remove_listener(&self, _listener: &Arc<dyn RegistryListener<K, V>>) {}

    fn close(&self) {
        *self.entry.write() = None;
        match self.close_task.lock().take() {
            Some(close_task) => close_task(),
            None => debug!("本地注册表已关闭: {}", self.group.name()),
        }
    }
}

/// 本地注册表工厂
pub struct LocalRegistryFactory<K, V> {
    inner: FunctionalRegistryFactory<K, V>,
}

impl<K: RegistryKey, V: RegistryValue> LocalRegistryFactory<K, V> {
    /// 创建本地注册表工厂
    pub fn new(name: impl Into<String>, group: Arc<dyn Group>) -> Self {
        let inner = FunctionalRegistryFactory::new(name, move |provider, close_task| {
            let registry: Arc<dyn Registry<K, V>> =
                Arc::new(LocalRegistry::new(group.clone(), provider, close_task));
            Ok(registry)
        });
        Self { inner }
    }
}

impl<K: RegistryKey, V: RegistryValue> RegistryFactory<K, V> for LocalRegistryFactory<K, V> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn create_registry(
        &self,
        provider: Arc<dyn RegistryEntryProvider<K, V>>,
    ) -> Result<Arc<dyn Registry<K, V>>, RegistryError> {
        self.inner.create_registry(provider)
    }

    fn is_active(&self) -> bool {
        self.inner.is_active()
    }
}
