//! 哈希环一致性哈希

use registry_abstractions::{Address, ConsistentHash};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// 哈希环一致性哈希
///
/// 每个成员按地址哈希落在环上，键的主拥有者是顺时针方向的第一个成员。
/// 同一进程内所有成员计算出的归属一致。
#[derive(Debug, Clone)]
pub struct HashRingConsistentHash {
    members: Vec<Address>,
    ring: Vec<(u64, Address)>,
}

impl HashRingConsistentHash {
    /// 根据成员列表构建哈希环
    pub fn new(members: impl IntoIterator<Item = Address>) -> Self {
        let members: Vec<Address> = members.into_iter().collect();
        let mut ring: Vec<(u64, Address)> = members
            .iter()
            .map(|address| (position(address), address.clone()))
            .collect();
        ring.sort();
        Self { members, ring }
    }
}

fn position(address: &Address) -> u64 {
    let mut hasher = DefaultHasher::new();
    address.hash(&mut hasher);
    hasher.finish()
}

impl ConsistentHash for HashRingConsistentHash {
    fn members(&self) -> Vec<Address> {
        self.members.clone()
    }

    fn locate_primary_owner(&self, key: &Address) -> Option<Address> {
        let target = position(key);
        self.ring
            .iter()
            .find(|(point, _)| *point >= target)
            .or_else(|| self.ring.first())
            .map(|(_, address)| address.clone())
    }
}
