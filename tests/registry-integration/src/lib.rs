//! 集群注册表集成测试的公共夹具

use parking_lot::Mutex;
use registry_abstractions::{
    Address, ConsistentHash, Node, Registry, RegistryEntryProvider, RegistryFactory,
    RegistryListener, StaticEntryProvider,
};
use registry_impl::{CacheRegistryFactory, InMemoryCache, InMemoryCluster};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 测试使用的记录映射
pub type Entries = HashMap<String, String>;

/// 集群中的一个测试成员
pub struct Member {
    pub node: Node,
    pub address: Address,
    pub cache: Arc<InMemoryCache<String, String>>,
    pub factory: Arc<CacheRegistryFactory<String, String>>,
}

impl Member {
    /// 以固定记录创建注册表
    pub fn start(&self, key: &str, value: &str) -> Arc<dyn Registry<String, String>> {
        self.start_with(Arc::new(StaticEntryProvider::new(
            key.to_string(),
            value.to_string(),
        )))
        .expect("registry should start")
    }

    /// 以指定提供者创建注册表
    pub fn start_with(
        &self,
        provider: Arc<dyn RegistryEntryProvider<String, String>>,
    ) -> Result<Arc<dyn Registry<String, String>>, infrastructure_common::RegistryError> {
        self.factory.create_registry(provider)
    }
}

/// 以 `name:7600` 为地址加入集群
pub fn join(cluster: &InMemoryCluster<String, String>, name: &str) -> Member {
    let node = Node::new(name);
    let address = Address::new(format!("{name}:7600"));
    let cache = cluster.join(node.clone(), address.clone());
    let factory = Arc::new(CacheRegistryFactory::new(cache.registry_config()));
    Member {
        node,
        address,
        cache,
        factory,
    }
}

/// 新建集群
pub fn cluster() -> InMemoryCluster<String, String> {
    InMemoryCluster::new("server", "registry")
}

/// 所有键都归属同一个成员的一致性哈希
#[derive(Debug)]
pub struct FixedOwnerHash {
    members: Vec<Address>,
    owner: Address,
}

impl FixedOwnerHash {
    pub fn new(members: &[&Member], owner: &Member) -> Arc<Self> {
        Arc::new(Self {
            members: members.iter().map(|m| m.address.clone()).collect(),
            owner: owner.address.clone(),
        })
    }
}

impl ConsistentHash for FixedOwnerHash {
    fn members(&self) -> Vec<Address> {
        self.members.clone()
    }

    fn locate_primary_owner(&self, _key: &Address) -> Option<Address> {
        Some(self.owner.clone())
    }
}

/// 记录所有通知的监听器
#[derive(Default)]
pub struct RecordingListener {
    added: Mutex<Vec<Entries>>,
    updated: Mutex<Vec<Entries>>,
    removed: Mutex<Vec<Entries>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn added(&self) -> Vec<Entries> {
        self.added.lock().clone()
    }

    pub fn updated(&self) -> Vec<Entries> {
        self.updated.lock().clone()
    }

    pub fn removed(&self) -> Vec<Entries> {
        self.removed.lock().clone()
    }

    pub fn total(&self) -> usize {
        self.added.lock().len() + self.updated.lock().len() + self.removed.lock().len()
    }
}

impl RegistryListener<String, String> for RecordingListener {
    fn added_entries(&self, added: &Entries) {
        self.added.lock().push(added.clone());
    }

    fn updated_entries(&self, updated: &Entries) {
        self.updated.lock().push(updated.clone());
    }

    fn removed_entries(&self, removed: &Entries) {
        self.removed.lock().push(removed.clone());
    }
}

/// 每次通知都 panic 的监听器
#[derive(Default)]
pub struct PanickingListener {
    pub calls: AtomicUsize,
}

impl RegistryListener<String, String> for PanickingListener {
    fn added_entries(&self, _added: &Entries) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("listener rejected added entries");
    }

    fn removed_entries(&self, _removed: &Entries) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("listener rejected removed entries");
    }
}

/// 每次调用返回新版本值的提供者
pub struct VersionedProvider {
    key: String,
    version: AtomicUsize,
}

impl VersionedProvider {
    pub fn new(key: &str) -> Arc<Self> {
        Arc::new(Self {
            key: key.to_string(),
            version: AtomicUsize::new(0),
        })
    }
}

impl RegistryEntryProvider<String, String> for VersionedProvider {
    fn key(&self) -> Option<String> {
        Some(self.key.clone())
    }

    fn value(&self) -> String {
        format!("v{}", self.version.fetch_add(1, Ordering::SeqCst))
    }
}

/// 构造单条记录映射
pub fn entries(key: &str, value: &str) -> Entries {
    HashMap::from([(key.to_string(), value.to_string())])
}
