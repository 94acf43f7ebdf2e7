//! 基于复制缓存的集群注册表
//!
//! 每个节点以自己的 [`Node`] 为键向复制缓存写入一条记录。
//! 拓扑变更后，离开节点的记录由其在新一致性哈希下的主拥有者负责清理，
//! 远程的记录变更则转换为注册表监听器通知。

use crate::functional::{CloseTask, FunctionalRegistryFactory};
use crate::listeners::{ListenerSet, NotificationContext, NotificationType};
use infrastructure_common::{CacheError, RegistryError};
use parking_lot::Mutex;
use registry_abstractions::{
    execute_in_batch, Address, Batcher, CacheEntryEvent, CacheEntryEventType, CacheListener, Flag,
    Flags, Group, ListenerId, ListenerRegistration, Node, NodeFactory, Registry, RegistryEntry,
    RegistryEntryProvider, RegistryFactory, RegistryKey, RegistryListener, RegistryValue,
    ReplicatedCache, TopologyChangedEvent,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info};

/// 集群注册表配置
pub struct CacheRegistryConfig<K, V> {
    /// 复制缓存
    pub cache: Arc<dyn ReplicatedCache<K, V>>,
    /// 批处理器
    pub batcher: Arc<dyn Batcher>,
    /// 本地集群组
    pub group: Arc<dyn Group>,
    /// 地址到节点的映射
    pub node_factory: Arc<dyn NodeFactory>,
}

impl<K, V> Clone for CacheRegistryConfig<K, V> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            batcher: self.batcher.clone(),
            group: self.group.clone(),
            node_factory: self.node_factory.clone(),
        }
    }
}

/// 注册表核心状态，同时作为缓存监听器
struct RegistryCore<K, V> {
    config: CacheRegistryConfig<K, V>,
    provider: Arc<dyn RegistryEntryProvider<K, V>>,
    listeners: Arc<ListenerSet<K, V>>,
}

impl<K: RegistryKey, V: RegistryValue> RegistryCore<K, V> {
    fn context(&self) -> NotificationContext<'_> {
        NotificationContext {
            container: self.config.cache.container_name(),
            cache: self.config.cache.cache_name(),
        }
    }

    fn publish_local_entry(&self) -> Result<Option<RegistryEntry<K, V>>, RegistryError> {
        let Some(entry) = self.provider.entry() else {
            debug!(
                container = self.config.cache.container_name(),
                cache = self.config.cache.cache_name(),
                "注册表记录提供者未返回键，本节点不发布记录"
            );
            return Ok(None);
        };

        let node = self.config.group.local_node();
        let cache = &self.config.cache;
        execute_in_batch(self.config.batcher.as_ref(), || {
            cache
                .put(node, entry.clone(), Flags::from(Flag::IgnoreReturnValues))
                .map(|_| ())
        })?;

        Ok(Some(entry))
    }

    fn remove_local_entry(&self) -> Result<(), CacheError> {
        let node = self.config.group.local_node();
        let cache = &self.config.cache;
        execute_in_batch(self.config.batcher.as_ref(), || {
            cache
                .remove(&node, Flags::from(Flag::IgnoreReturnValues))
                .map(|_| ())
        })
    }

    /// 离开成员中由本节点负责清理的节点
    fn departed_nodes(&self, event: &TopologyChangedEvent) -> Vec<Node> {
        let local_address = self.config.cache.local_address();
        let remaining: HashSet<Address> = event.end.members().into_iter().collect();

        event
            .start
            .members()
            .into_iter()
            .filter(|address| !remaining.contains(address))
            .filter(|address| {
                event.end.locate_primary_owner(address).as_ref() == Some(&local_address)
            })
            .map(|address| self.config.node_factory.create_node(&address))
            .collect()
    }

    fn remove_departed(&self, nodes: &[Node]) -> Result<HashMap<K, V>, CacheError> {
        let cache = &self.config.cache;
        execute_in_batch(self.config.batcher.as_ref(), || {
            let mut removed = HashMap::new();
            for node in nodes {
                if let Some(entry) = cache.remove(node, Flags::from(Flag::ForceSynchronous))? {
                    let (key, value) = entry.into_pair();
                    removed.insert(key, value);
                }
            }
            Ok(removed)
        })
    }

    fn on_entry_event(&self, event: &CacheEntryEvent<K, V>, notification: NotificationType) {
        // 忽略本地写入与提交前事件
        if event.origin_local || event.pre {
            return;
        }

        let entry = match event.event_type {
            CacheEntryEventType::Removed => event.old_value.as_ref(),
            CacheEntryEventType::Created | CacheEntryEventType::Modified => event.value.as_ref(),
        };

        if let Some(entry) = entry {
            debug!(
                container = self.config.cache.container_name(),
                cache = self.config.cache.cache_name(),
                node = %event.node,
                "收到远程注册表事件: {}",
                event.event_type
            );
            self.listeners
                .notify(notification, &entry.to_singleton_map(), self.context());
        }
    }
}

impl<K: RegistryKey, V: RegistryValue> CacheListener<K, V> for RegistryCore<K, V> {
    fn on_topology_changed(&self, event: &TopologyChangedEvent) {
        if event.pre {
            return;
        }

        let nodes = self.departed_nodes(event);
        if nodes.is_empty() {
            return;
        }

        match self.remove_departed(&nodes) {
            Ok(removed) if !removed.is_empty() => {
                info!(
                    container = self.config.cache.container_name(),
                    cache = self.config.cache.cache_name(),
                    topology_id = event.topology_id,
                    "清理离开节点的注册表记录: {:?}",
                    nodes
                );
                self.listeners
                    .notify(NotificationType::Removed, &removed, self.context());
            }
            Ok(_) => debug!(
                container = self.config.cache.container_name(),
                cache = self.config.cache.cache_name(),
                "离开节点没有注册表记录: {:?}",
                nodes
            ),
            Err(e) => error!(
                container = self.config.cache.container_name(),
                cache = self.config.cache.cache_name(),
                topology_id = event.topology_id,
                nodes = ?nodes,
                "清理离开节点的注册表记录失败: {}",
                e
            ),
        }
    }

    fn on_entry_created(&self, event: &CacheEntryEvent<K, V>) {
        self.on_entry_event(event, NotificationType::Added);
    }

    fn on_entry_modified(&self, event: &CacheEntryEvent<K, V>) {
        self.on_entry_event(event, NotificationType::Updated);
    }

    fn on_entry_removed(&self, event: &CacheEntryEvent<K, V>) {
        self.on_entry_event(event, NotificationType::Removed);
    }
}

/// 集群注册表
pub struct CacheRegistry<K, V> {
    core: Arc<RegistryCore<K, V>>,
    listener_id: Mutex<Option<ListenerId>>,
    close_task: Mutex<Option<CloseTask>>,
}

impl<K: RegistryKey, V: RegistryValue> CacheRegistry<K, V> {
    /// 创建集群注册表
    ///
    /// 先发布本地记录，再订阅缓存事件。本地记录写入失败时返回错误。
    pub fn new(
        config: CacheRegistryConfig<K, V>,
        provider: Arc<dyn RegistryEntryProvider<K, V>>,
        close_task: CloseTask,
    ) -> Result<Self, RegistryError> {
        let core = Arc::new(RegistryCore {
            config,
            provider,
            listeners: Arc::new(ListenerSet::new()),
        });

        core.publish_local_entry()?;
        let listener_id = core.config.cache.add_listener(core.clone());

        info!(
            container = core.config.cache.container_name(),
            cache = core.config.cache.cache_name(),
            "集群注册表已启动: {}",
            core.config.group.local_node()
        );

        Ok(Self {
            core,
            listener_id: Mutex::new(Some(listener_id)),
            close_task: Mutex::new(Some(close_task)),
        })
    }

    /// 已注册的监听器数量
    pub fn listener_count(&self) -> usize {
        self.core.listeners.len()
    }
}

impl<K: RegistryKey, V: RegistryValue> Registry<K, V> for CacheRegistry<K, V> {
    fn group(&self) -> Arc<dyn Group> {
        self.core.config.group.clone()
    }

    fn entries(&self) -> HashMap<K, V> {
        self.core
            .config
            .cache
            .values()
            .into_iter()
            .map(RegistryEntry::into_pair)
            .collect()
    }

    fn entry(&self, node: &Node) -> Option<RegistryEntry<K, V>> {
        self.core.config.cache.get(node)
    }

    fn local_entry(&self) -> Result<Option<RegistryEntry<K, V>>, RegistryError> {
        // 关闭后不再发布记录
        if self.close_task.lock().is_none() {
            return Ok(None);
        }
        self.core.publish_local_entry()
    }

    fn add_listener(&self, listener: Arc<dyn RegistryListener<K, V>>) -> ListenerRegistration {
        self.core.listeners.add(listener)
    }

    fn remove_listener(&self, listener: &Arc<dyn RegistryListener<K, V>>) {
        self.core.listeners.remove(listener);
    }

    fn close(&self) {
        let Some(close_task) = self.close_task.lock().take() else {
            debug!(
                container = self.core.config.cache.container_name(),
                cache = self.core.config.cache.cache_name(),
                "集群注册表已关闭"
            );
            return;
        };

        if let Some(listener_id) = self.listener_id.lock().take() {
            self.core.config.cache.remove_listener(listener_id);
        }
        self.core.listeners.clear();

        if let Err(e) = self.core.remove_local_entry() {
            error!(
                container = self.core.config.cache.container_name(),
                cache = self.core.config.cache.cache_name(),
                node = %self.core.config.group.local_node(),
                "移除本地注册表记录失败: {}",
                e
            );
        }

        close_task();
        info!(
            container = self.core.config.cache.container_name(),
            cache = self.core.config.cache.cache_name(),
            "集群注册表已关闭: {}",
            self.core.config.group.local_node()
        );
    }
}

/// 集群注册表工厂
pub struct CacheRegistryFactory<K, V> {
    inner: FunctionalRegistryFactory<K, V>,
}

impl<K: RegistryKey, V: RegistryValue> CacheRegistryFactory<K, V> {
    /// 创建集群注册表工厂，工厂名称取 `容器/缓存`
    pub fn new(config: CacheRegistryConfig<K, V>) -> Self {
        let name = format!(
            "{}/{}",
            config.cache.container_name(),
            config.cache.cache_name()
        );
        let inner = FunctionalRegistryFactory::new(name, move |provider, close_task| {
            let registry: Arc<dyn Registry<K, V>> =
                Arc::new(CacheRegistry::new(config.clone(), provider, close_task)?);
            Ok(registry)
        });
        Self { inner }
    }
}

impl<K: RegistryKey, V: RegistryValue> RegistryFactory<K, V> for CacheRegistryFactory<K, V> {
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
