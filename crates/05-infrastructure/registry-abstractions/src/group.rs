//! 集群成员身份抽象

use serde::{Deserialize, Serialize};
use std::fmt;

/// 传输层地址
///
/// 节点在当前视图中的通信地址，节点重启后可能变化。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// 创建新地址
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// 地址字符串
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 集群节点的稳定逻辑身份
///
/// 与 [`Address`] 不同，节点名称在成员视图变化前后保持不变，
/// 复制缓存中的每一行都以节点作为键。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Node {
    name: String,
}

impl Node {
    /// 创建新节点
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// 节点名称
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// 集群组 trait
///
/// 提供本地成员身份的访问。
pub trait Group: Send + Sync {
    /// 组名称
    fn name(&self) -> &str;

    /// 本地节点
    fn local_node(&self) -> Node;
}

/// 节点工厂 trait
///
/// 将传输层地址映射为逻辑节点身份。
pub trait NodeFactory: Send + Sync {
    /// 根据地址创建节点
    fn create_node(&self, address: &Address) -> Node;
}
