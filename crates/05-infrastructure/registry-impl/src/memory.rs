//! 进程内复制缓存
//!
//! 在单个进程内模拟多个集群成员共享的一张复制表，用于演示与集成测试。
//! 每个成员通过 [`InMemoryCluster::join`] 获得自己的 [`InMemoryCache`] 句柄，
//! 写入对所有成员可见，并向每个成员投递提交前/提交后的记录事件。
//! 批处理中的写入先暂存，提交时一次性生效，丢弃时不留痕迹。
//! 离开的成员不再收到事件，其记录保留在表中，直到被新的主拥有者清理。

use crate::cache_registry::CacheRegistryConfig;
use crate::consistent_hash::HashRingConsistentHash;
use dashmap::DashMap;
use infrastructure_common::CacheError;
use parking_lot::{Mutex, RwLock};
use registry_abstractions::{
    Address, Batch, BatchContext, Batcher, CacheEntryEvent, CacheEntryEventType, CacheListener,
    ConsistentHash, Flag, Flags, Group, ListenerId, Node, NodeFactory, RegistryEntry, RegistryKey,
    RegistryValue, ReplicatedCache, TopologyChangedEvent,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, info, warn};

type CacheListeners<K, V> = RwLock<Vec<(ListenerId, Arc<dyn CacheListener<K, V>>)>>;

/// 暂存的写入
enum PendingWrite<K, V> {
    Put(Node, RegistryEntry<K, V>),
    Remove(Node),
}

impl<K, V> PendingWrite<K, V> {
    fn node(&self) -> &Node {
        match self {
            Self::Put(node, _) | Self::Remove(node) => node,
        }
    }
}

/// 某个线程上打开的批处理
struct Journal<K, V> {
    depth: usize,
    rollback_only: bool,
    writes: Vec<PendingWrite<K, V>>,
}

impl<K: RegistryKey, V: RegistryValue> Journal<K, V> {
    fn new() -> Self {
        Self {
            depth: 0,
            rollback_only: false,
            writes: Vec::new(),
        }
    }

    /// 批处理内对该行的最后一次写入，未写过时返回 `None`
    fn staged(&self, node: &Node) -> Option<Option<RegistryEntry<K, V>>> {
        self.writes
            .iter()
            .rev()
            .find(|write| write.node() == node)
            .map(|write| match write {
                PendingWrite::Put(_, entry) => Some(entry.clone()),
                PendingWrite::Remove(_) => None,
            })
    }
}

/// 单个成员的事件订阅与统计
struct Member<K, V> {
    node: Node,
    address: Address,
    listeners: CacheListeners<K, V>,
    failing: AtomicBool,
    removals: AtomicUsize,
    commits: AtomicUsize,
    discards: AtomicUsize,
    batches: Mutex<HashMap<ThreadId, Journal<K, V>>>,
}

impl<K, V> Member<K, V> {
    fn listeners(&self) -> Vec<Arc<dyn CacheListener<K, V>>> {
        self.listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }
}

/// 当前成员视图
struct View<K, V> {
    members: Vec<Arc<Member<K, V>>>,
    hash: Arc<dyn ConsistentHash>,
}

struct ClusterShared<K, V> {
    container: String,
    cache: String,
    rows: RwLock<HashMap<Node, RegistryEntry<K, V>>>,
    view: RwLock<View<K, V>>,
    nodes: DashMap<Address, Node>,
    topology_id: AtomicU64,
}

impl<K: RegistryKey, V: RegistryValue> ClusterShared<K, V> {
    fn members(&self) -> Vec<Arc<Member<K, V>>> {
        self.view.read().members.clone()
    }

    fn dispatch_entry_event(
        &self,
        origin: &Arc<Member<K, V>>,
        event_type: CacheEntryEventType,
        node: &Node,
        value: Option<RegistryEntry<K, V>>,
        old_value: Option<RegistryEntry<K, V>>,
    ) {
        for pre in [true, false] {
            for member in self.members() {
                let event = CacheEntryEvent {
                    event_type,
                    node: node.clone(),
                    value: value.clone(),
                    old_value: old_value.clone(),
                    origin_local: Arc::ptr_eq(&member, origin),
                    pre,
                };
                for listener in member.listeners() {
                    match event_type {
                        CacheEntryEventType::Created => listener.on_entry_created(&event),
                        CacheEntryEventType::Modified => listener.on_entry_modified(&event),
                        CacheEntryEventType::Removed => listener.on_entry_removed(&event),
                    }
                }
            }
        }
    }

    /// 在一次写锁内写入所有行，再逐个投递记录事件
    ///
    /// 返回每个写入覆盖的旧值。
    fn apply(
        &self,
        origin: &Arc<Member<K, V>>,
        writes: Vec<PendingWrite<K, V>>,
    ) -> Vec<Option<RegistryEntry<K, V>>> {
        let mut events = Vec::with_capacity(writes.len());
        let mut old_values = Vec::with_capacity(writes.len());
        {
            let mut rows = self.rows.write();
            for write in writes {
                match write {
                    PendingWrite::Put(node, entry) => {
                        let old_value = rows.insert(node.clone(), entry.clone());
                        let event_type = if old_value.is_some() {
                            CacheEntryEventType::Modified
                        } else {
                            CacheEntryEventType::Created
                        };
                        events.push((event_type, node, Some(entry), old_value.clone()));
                        old_values.push(old_value);
                    }
                    PendingWrite::Remove(node) => {
                        let old_value = rows.remove(&node);
                        if let Some(old) = &old_value {
                            events.push((
                                CacheEntryEventType::Removed,
                                node,
                                None,
                                Some(old.clone()),
                            ));
                        }
                        old_values.push(old_value);
                    }
                }
            }
        }

        for (event_type, node, value, old_value) in events {
            self.dispatch_entry_event(origin, event_type, &node, value, old_value);
        }
        old_values
    }

    /// 在视图写锁内根据当前成员计算并安装新视图，然后向新视图中的成员投递拓扑事件
    fn change_view<F>(&self, next: F)
    where
        F: FnOnce(&[Arc<Member<K, V>>]) -> (Vec<Arc<Member<K, V>>>, Arc<dyn ConsistentHash>),
    {
        let (start, hash, members, topology_id) = {
            let mut view = self.view.write();
            let (members, hash) = next(view.members.as_slice());
            let start = std::mem::replace(&mut view.hash, hash.clone());
            view.members = members.clone();
            let topology_id = self.topology_id.fetch_add(1, Ordering::SeqCst) + 1;
            (start, hash, members, topology_id)
        };

        info!(
            container = %self.container,
            cache = %self.cache,
            topology_id,
            "集群视图变更: {:?}",
            hash.members()
        );

        for pre in [true, false] {
            let event = TopologyChangedEvent {
                pre,
                topology_id,
                start: start.clone(),
                end: hash.clone(),
            };
            for member in &members {
                for listener in member.listeners() {
                    listener.on_topology_changed(&event);
                }
            }
        }
    }
}

/// 进程内复制缓存集群
pub struct InMemoryCluster<K, V> {
    shared: Arc<ClusterShared<K, V>>,
}

impl<K, V> Clone for InMemoryCluster<K, V> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<K: RegistryKey, V: RegistryValue> InMemoryCluster<K, V> {
    /// 创建空集群
    pub fn new(container: impl Into<String>, cache: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(ClusterShared {
                container: container.into(),
                cache: cache.into(),
                rows: RwLock::new(HashMap::new()),
                view: RwLock::new(View {
                    members: Vec::new(),
                    hash: Arc::new(HashRingConsistentHash::new(Vec::new())),
                }),
                nodes: DashMap::new(),
                topology_id: AtomicU64::new(0),
            }),
        }
    }

    /// 新成员加入集群，视图使用哈希环一致性哈希
    pub fn join(&self, node: Node, address: Address) -> Arc<InMemoryCache<K, V>> {
        self.shared.nodes.insert(address.clone(), node.clone());

        let member = Arc::new(Member {
            node,
            address,
            listeners: RwLock::new(Vec::new()),
            failing: AtomicBool::new(false),
            removals: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
            discards: AtomicUsize::new(0),
            batches: Mutex::new(HashMap::new()),
        });

        self.shared.change_view(|current| {
            let mut members = current.to_vec();
            members.push(member.clone());
            let hash = hash_ring(&members);
            (members, hash)
        });

        Arc::new(InMemoryCache {
            shared: self.shared.clone(),
            member,
        })
    }

    /// 成员离开集群，视图使用哈希环一致性哈希
    pub fn leave(&self, departed: &[Address]) {
        self.shared.change_view(|current| {
            let members = remaining(current, departed);
            let hash = hash_ring(&members);
            (members, hash)
        });
    }

    /// 成员离开集群，并使用指定的一致性哈希作为新视图
    ///
    /// 新哈希的成员列表应与剩余成员一致。
    pub fn change_topology(&self, departed: &[Address], hash: Arc<dyn ConsistentHash>) {
        self.shared
            .change_view(|current| (remaining(current, departed), hash));
    }

    /// 当前视图的一致性哈希
    pub fn consistent_hash(&self) -> Arc<dyn ConsistentHash> {
        self.shared.view.read().hash.clone()
    }

    /// 表中所有行
    pub fn rows(&self) -> HashMap<Node, RegistryEntry<K, V>> {
        self.shared.rows.read().clone()
    }

    /// 当前拓扑编号
    pub fn topology_id(&self) -> u64 {
        self.shared.topology_id.load(Ordering::SeqCst)
    }
}

fn remaining<K, V>(members: &[Arc<Member<K, V>>], departed: &[Address]) -> Vec<Arc<Member<K, V>>> {
    members
        .iter()
        .filter(|member| !departed.contains(&member.address))
        .cloned()
        .collect()
}

fn hash_ring<K, V>(members: &[Arc<Member<K, V>>]) -> Arc<dyn ConsistentHash> {
    Arc::new(HashRingConsistentHash::new(
        members.iter().map(|member| member.address.clone()),
    ))
}

impl<K: RegistryKey, V: RegistryValue> NodeFactory for InMemoryCluster<K, V> {
    fn create_node(&self, address: &Address) -> Node {
        self.shared
            .nodes
            .get(address)
            .map(|node| node.value().clone())
            .unwrap_or_else(|| Node::new(address.as_str()))
    }
}

/// 单个成员的复制缓存句柄
pub struct InMemoryCache<K, V> {
    shared: Arc<ClusterShared<K, V>>,
    member: Arc<Member<K, V>>,
}

impl<K: RegistryKey, V: RegistryValue> InMemoryCache<K, V> {
    /// 让后续写入以复制失败结束
    pub fn inject_failures(&self, failing: bool) {
        self.member.failing.store(failing, Ordering::SeqCst);
    }

    /// 本成员发起的移除次数
    pub fn removal_count(&self) -> usize {
        self.member.removals.load(Ordering::SeqCst)
    }

    /// 已提交的批处理数量
    pub fn committed_batches(&self) -> usize {
        self.member.commits.load(Ordering::SeqCst)
    }

    /// 已丢弃的批处理数量
    pub fn discarded_batches(&self) -> usize {
        self.member.discards.load(Ordering::SeqCst)
    }

    /// 已订阅的缓存监听器数量
    pub fn listener_count(&self) -> usize {
        self.member.listeners.read().len()
    }

    /// 本成员的集群组
    pub fn group(&self) -> Arc<dyn Group> {
        Arc::new(InMemoryGroup {
            name: self.shared.container.clone(),
            node: self.member.node.clone(),
        })
    }

    /// 构建集群注册表配置
    pub fn registry_config(self: &Arc<Self>) -> CacheRegistryConfig<K, V> {
        CacheRegistryConfig {
            cache: self.clone(),
            batcher: self.clone(),
            group: self.group(),
            node_factory: Arc::new(InMemoryCluster {
                shared: self.shared.clone(),
            }),
        }
    }

    fn check_available(&self, operation: &str) -> Result<(), CacheError> {
        if self.member.failing.load(Ordering::SeqCst) {
            warn!(
                container = %self.shared.container,
                cache = %self.shared.cache,
                "注入的复制失败: {} @ {}",
                operation,
                self.member.address
            );
            return Err(CacheError::replication_failed(
                &self.shared.container,
                &self.shared.cache,
                format!("{} 复制失败", operation),
            ));
        }
        Ok(())
    }

    /// 当前线程打开了批处理时暂存写入，否则立即写入
    fn write(&self, write: PendingWrite<K, V>) -> Option<RegistryEntry<K, V>> {
        {
            let mut batches = self.member.batches.lock();
            if let Some(journal) = batches.get_mut(&thread::current().id()) {
                let old_value = journal
                    .staged(write.node())
                    .unwrap_or_else(|| self.shared.rows.read().get(write.node()).cloned());
                journal.writes.push(write);
                return old_value;
            }
        }
        self.shared
            .apply(&self.member, vec![write])
            .pop()
            .flatten()
    }
}

impl<K: RegistryKey, V: RegistryValue> ReplicatedCache<K, V> for InMemoryCache<K, V> {
    fn container_name(&self) -> &str {
        &self.shared.container
    }

    fn cache_name(&self) -> &str {
        &self.shared.cache
    }

    fn local_address(&self) -> Address {
        self.member.address.clone()
    }

    fn get(&self, node: &Node) -> Option<RegistryEntry<K, V>> {
        self.shared.rows.read().get(node).cloned()
    }

    fn put(
        &self,
        node: Node,
        entry: RegistryEntry<K, V>,
        flags: Flags,
    ) -> Result<Option<RegistryEntry<K, V>>, CacheError> {
        self.check_available("put")?;

        let old_value = self.write(PendingWrite::Put(node, entry));
        if flags.contains(Flag::IgnoreReturnValues) {
            Ok(None)
        } else {
            Ok(old_value)
        }
    }

    fn remove(&self, node: &Node, flags: Flags) -> Result<Option<RegistryEntry<K, V>>, CacheError> {
        self.check_available("remove")?;
        self.member.removals.fetch_add(1, Ordering::SeqCst);
        debug!(
            container = %self.shared.container,
            cache = %self.shared.cache,
            synchronous = flags.contains(Flag::ForceSynchronous),
            "移除缓存行: {}",
            node
        );

        let old_value = self.write(PendingWrite::Remove(node.clone()));
        if flags.contains(Flag::IgnoreReturnValues) {
            Ok(None)
        } else {
            Ok(old_value)
        }
    }

    fn values(&self) -> Vec<RegistryEntry<K, V>> {
        self.shared.rows.read().values().cloned().collect()
    }

    fn add_listener(&self, listener: Arc<dyn CacheListener<K, V>>) -> ListenerId {
        let id = ListenerId::new();
        self.member.listeners.write().push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.member
            .listeners
            .write()
            .retain(|(existing, _)| *existing != id);
    }
}

/// 进程内批处理上下文
///
/// 批处理绑定创建它的线程。期间本成员在该线程上的写入只进入暂存区，
/// 提交时一次性写入共享表并投递事件。嵌套的批处理只有最外层生效，
/// 内层丢弃会让外层提交失败。
struct InMemoryBatch<K, V> {
    shared: Arc<ClusterShared<K, V>>,
    member: Arc<Member<K, V>>,
    thread: ThreadId,
}

impl<K: RegistryKey, V: RegistryValue> InMemoryBatch<K, V> {
    /// 结束一层批处理，最外层返回暂存区
    fn finish(&self, rollback: bool) -> Option<Journal<K, V>> {
        let mut batches = self.member.batches.lock();
        let journal = batches.get_mut(&self.thread)?;
        journal.depth -= 1;
        journal.rollback_only |= rollback;
        if journal.depth > 0 {
            return None;
        }
        batches.remove(&self.thread)
    }
}

impl<K: RegistryKey, V: RegistryValue> BatchContext for InMemoryBatch<K, V> {
    fn commit(&mut self) -> Result<(), CacheError> {
        let Some(journal) = self.finish(false) else {
            return Ok(());
        };

        if journal.rollback_only || self.member.failing.load(Ordering::SeqCst) {
            self.member.discards.fetch_add(1, Ordering::SeqCst);
            warn!(
                container = %self.shared.container,
                cache = %self.shared.cache,
                "批处理提交失败，回滚 {} 个写入: {}",
                journal.writes.len(),
                self.member.address
            );
            return Err(CacheError::batch_failed(
                &self.shared.container,
                &self.shared.cache,
                format!("{} 个写入已回滚", journal.writes.len()),
            ));
        }

        self.shared.apply(&self.member, journal.writes);
        self.member.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn discard(&mut self) {
        if let Some(journal) = self.finish(true) {
            self.member.discards.fetch_add(1, Ordering::SeqCst);
            debug!(
                container = %self.shared.container,
                cache = %self.shared.cache,
                "丢弃批处理中的 {} 个写入",
                journal.writes.len()
            );
        }
    }
}

impl<K: RegistryKey, V: RegistryValue> Batcher for InMemoryCache<K, V> {
    fn create_batch(&self) -> Result<Batch, CacheError> {
        let thread = thread::current().id();
        self.member
            .batches
            .lock()
            .entry(thread)
            .or_insert_with(Journal::new)
            .depth += 1;

        Ok(Batch::new(Box::new(InMemoryBatch {
            shared: self.shared.clone(),
            member: self.member.clone(),
            thread,
        })))
    }
}

/// 进程内集群组
#[derive(Debug, Clone)]
pub struct InMemoryGroup {
    name: String,
    node: Node,
}

impl Group for InMemoryGroup {
    fn name(&self) -> &str {
        &self.name
    }

    fn local_node(&self) -> Node {
        self.node.clone()
    }
}
