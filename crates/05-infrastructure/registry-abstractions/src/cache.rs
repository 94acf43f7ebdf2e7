//! 复制缓存协作方接口
//!
//! 注册表本身不实现复制协议，而是依赖一个以 [`Node`] 为键的复制缓存。
//! 缓存的事件回调以显式 trait 方法的形式投递给 [`CacheListener`]。

use crate::group::{Address, Node};
use crate::registry::{RegistryEntry, RegistryKey, RegistryValue};
use infrastructure_common::CacheError;
use std::fmt;
use std::sync::Arc;

/// 缓存写入标志
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// 不需要返回旧值，允许缓存跳过远程读取
    IgnoreReturnValues,
    /// 强制同步复制
    ForceSynchronous,
}

/// 写入标志集合
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    ignore_return_values: bool,
    force_synchronous: bool,
}

impl Flags {
    /// 空标志集合
    pub fn none() -> Self {
        Self::default()
    }

    /// 添加标志
    pub fn with(mut self, flag: Flag) -> Self {
        match flag {
            Flag::IgnoreReturnValues => self.ignore_return_values = true,
            Flag::ForceSynchronous => self.force_synchronous = true,
        }
        self
    }

    /// 是否包含指定标志
    pub fn contains(&self, flag: Flag) -> bool {
        match flag {
            Flag::IgnoreReturnValues => self.ignore_return_values,
            Flag::ForceSynchronous => self.force_synchronous,
        }
    }
}

impl From<Flag> for Flags {
    fn from(flag: Flag) -> Self {
        Self::none().with(flag)
    }
}

/// 一致性哈希 trait
pub trait ConsistentHash: Send + Sync + fmt::Debug {
    /// 哈希覆盖的成员
    fn members(&self) -> Vec<Address>;

    /// 定位指定键的主拥有者，没有成员时返回 `None`
    fn locate_primary_owner(&self, key: &Address) -> Option<Address>;
}

/// 缓存监听器标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(uuid::Uuid);

impl ListenerId {
    /// 生成新的监听器标识
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 缓存记录事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEntryEventType {
    /// 记录创建
    Created,
    /// 记录修改
    Modified,
    /// 记录移除
    Removed,
}

impl fmt::Display for CacheEntryEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "CACHE_ENTRY_CREATED",
            Self::Modified => "CACHE_ENTRY_MODIFIED",
            Self::Removed => "CACHE_ENTRY_REMOVED",
        };
        f.write_str(name)
    }
}

/// 缓存记录事件
#[derive(Debug, Clone)]
pub struct CacheEntryEvent<K, V> {
    /// 事件类型
    pub event_type: CacheEntryEventType,
    /// 发生变化的行
    pub node: Node,
    /// 新值（移除事件为空）
    pub value: Option<RegistryEntry<K, V>>,
    /// 旧值（创建事件为空）
    pub old_value: Option<RegistryEntry<K, V>>,
    /// 写入是否源自接收事件的本节点
    pub origin_local: bool,
    /// 是否为提交前事件
    pub pre: bool,
}

/// 拓扑变更事件
#[derive(Debug, Clone)]
pub struct TopologyChangedEvent {
    /// 是否为变更前事件
    pub pre: bool,
    /// 拓扑编号
    pub topology_id: u64,
    /// 变更前的一致性哈希
    pub start: Arc<dyn ConsistentHash>,
    /// 变更后的一致性哈希
    pub end: Arc<dyn ConsistentHash>,
}

/// 缓存监听器 trait
///
/// 由缓存的通知线程调用，实现方不得 panic 到调用方，也不得无限阻塞。
pub trait CacheListener<K, V>: Send + Sync {
    /// 拓扑变更
    fn on_topology_changed(&self, event: &TopologyChangedEvent);

    /// 记录创建
    fn on_entry_created(&self, event: &CacheEntryEvent<K, V>);

    /// 记录修改
    fn on_entry_modified(&self, event: &CacheEntryEvent<K, V>);

    /// 记录移除
    fn on_entry_removed(&self, event: &CacheEntryEvent<K, V>);
}

/// 复制缓存 trait
///
/// 以节点为键，保存每个节点发布的注册表记录。
pub trait ReplicatedCache<K: RegistryKey, V: RegistryValue>: Send + Sync {
    /// 缓存容器名称
    fn container_name(&self) -> &str;

    /// 缓存名称
    fn cache_name(&self) -> &str;

    /// 本节点的传输层地址
    fn local_address(&self) -> Address;

    /// 读取指定节点的记录
    fn get(&self, node: &Node) -> Option<RegistryEntry<K, V>>;

    /// 写入记录，带 [`Flag::IgnoreReturnValues`] 时总是返回 `None`
    fn put(
        &self,
        node: Node,
        entry: RegistryEntry<K, V>,
        flags: Flags,
    ) -> Result<Option<RegistryEntry<K, V>>, CacheError>;

    /// 移除记录并返回旧值
    fn remove(&self, node: &Node, flags: Flags) -> Result<Option<RegistryEntry<K, V>>, CacheError>;

    /// 所有记录
    fn values(&self) -> Vec<RegistryEntry<K, V>>;

    /// 订阅缓存事件
    fn add_listener(&self, listener: Arc<dyn CacheListener<K, V>>) -> ListenerId;

    /// 取消订阅
    fn remove_listener(&self, id: ListenerId);
}
