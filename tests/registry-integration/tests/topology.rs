//! 成员离开后的注册表清理集成测试

use parking_lot::Mutex;
use registry_abstractions::{
    ConsistentHash, RegistryEntryProvider, RegistryListener, StaticEntryProvider,
};
use registry_impl::InMemoryCache;
use registry_integration_tests::{
    cluster, entries, join, Entries, FixedOwnerHash, RecordingListener,
};
use std::sync::Arc;

/// 收到第一次移除通知后让指定成员的复制开始失败
struct FailAfterFirstRemoval {
    target: Arc<InMemoryCache<String, String>>,
    removed: Mutex<Vec<Entries>>,
}

impl RegistryListener<String, String> for FailAfterFirstRemoval {
    fn removed_entries(&self, removed: &Entries) {
        self.target.inject_failures(true);
        self.removed.lock().push(removed.clone());
    }
}

#[test]
fn test_primary_owner_removes_departed_entry() {
    let cluster = cluster();
    let a = join(&cluster, "node-a");
    let b = join(&cluster, "node-b");
    let c = join(&cluster, "node-c");

    let registry_a = a.start("a-role", "primary");
    let registry_b = b.start("b-role", "backup");
    let registry_c = c.start("c-role", "backup");

    let listener_a = RecordingListener::new();
    let listener_b = RecordingListener::new();
    let listener_c = RecordingListener::new();
    let _a = registry_a.add_listener(listener_a.clone());
    let _b = registry_b.add_listener(listener_b.clone());
    let _c = registry_c.add_listener(listener_c.clone());

    let commits_before = a.cache.committed_batches();
    cluster.change_topology(&[b.address.clone()], FixedOwnerHash::new(&[&a, &c], &a));

    // 只有主拥有者执行移除，提交前拓扑事件被忽略
    assert_eq!(a.cache.removal_count(), 1);
    assert_eq!(c.cache.removal_count(), 0);
    assert_eq!(a.cache.committed_batches(), commits_before + 1);

    assert_eq!(listener_a.removed(), vec![entries("b-role", "backup")]);
    assert_eq!(listener_c.removed(), vec![entries("b-role", "backup")]);
    assert_eq!(listener_b.total(), 0);

    assert!(!cluster.rows().contains_key(&b.node));
    assert_eq!(registry_a.entries().len(), 2);
    assert_eq!(registry_c.entries().len(), 2);
}

#[test]
fn test_multiple_departures_are_notified_in_one_batch() {
    let cluster = cluster();
    let a = join(&cluster, "node-a");
    let b = join(&cluster, "node-b");
    let c = join(&cluster, "node-c");
    let d = join(&cluster, "node-d");

    let registry_a = a.start("a-role", "primary");
    let _registry_b = b.start("b-role", "backup");
    let _registry_c = c.start("c-role", "backup");
    let registry_d = d.start("d-role", "backup");

    let listener_a = RecordingListener::new();
    let listener_d = RecordingListener::new();
    let _a = registry_a.add_listener(listener_a.clone());
    let _d = registry_d.add_listener(listener_d.clone());

    cluster.change_topology(
        &[b.address.clone(), c.address.clone()],
        FixedOwnerHash::new(&[&a, &d], &a),
    );

    let mut expected = entries("b-role", "backup");
    expected.extend(entries("c-role", "backup"));
    assert_eq!(listener_a.removed(), vec![expected]);

    // 其他成员逐行收到远程移除事件
    let removed_at_d = listener_d.removed();
    assert_eq!(removed_at_d.len(), 2);
    assert!(removed_at_d.contains(&entries("b-role", "backup")));
    assert!(removed_at_d.contains(&entries("c-role", "backup")));

    assert_eq!(a.cache.removal_count(), 2);
    assert_eq!(d.cache.removal_count(), 0);
    assert_eq!(registry_a.entries().len(), 2);
}

#[test]
fn test_hash_ring_assigns_exactly_one_cleaner() {
    let cluster = cluster();
    let members = ["node-a", "node-b", "node-c", "node-d"].map(|name| join(&cluster, name));

    let mut listeners = Vec::new();
    let mut registries = Vec::new();
    for member in &members {
        let registry = member.start(&format!("{}-role", member.node.name()), "up");
        let listener = RecordingListener::new();
        let registration = registry.add_listener(listener.clone());
        listeners.push((member.node.clone(), listener));
        registries.push((registry, registration));
    }

    let departed = &members[1];
    cluster.leave(&[departed.address.clone()]);

    let owner = cluster
        .consistent_hash()
        .locate_primary_owner(&departed.address)
        .unwrap();
    let survivors: Vec<_> = members
        .iter()
        .filter(|member| member.address != departed.address)
        .collect();

    let total: usize = survivors.iter().map(|m| m.cache.removal_count()).sum();
    assert_eq!(total, 1);
    for member in &survivors {
        let expected = usize::from(member.address == owner);
        assert_eq!(member.cache.removal_count(), expected);
    }

    // 每个存活成员恰好收到一次移除通知
    for (node, listener) in &listeners {
        if *node == departed.node {
            assert!(listener.removed().is_empty());
        } else {
            assert_eq!(listener.removed(), vec![entries("node-b-role", "up")]);
        }
    }
}

#[test]
fn test_failed_cleanup_is_logged_without_notification() {
    let cluster = cluster();
    let a = join(&cluster, "node-a");
    let b = join(&cluster, "node-b");
    let c = join(&cluster, "node-c");

    let registry_a = a.start("a-role", "primary");
    let _registry_b = b.start("b-role", "backup");
    let registry_c = c.start("c-role", "backup");

    let listener_a = RecordingListener::new();
    let listener_c = RecordingListener::new();
    let _a = registry_a.add_listener(listener_a.clone());
    let _c = registry_c.add_listener(listener_c.clone());

    let discards_before = a.cache.discarded_batches();
    a.cache.inject_failures(true);
    cluster.change_topology(&[b.address.clone()], FixedOwnerHash::new(&[&a, &c], &a));

    assert_eq!(listener_a.total(), 0);
    assert_eq!(listener_c.total(), 0);
    assert_eq!(a.cache.discarded_batches(), discards_before + 1);
    assert!(cluster.rows().contains_key(&b.node));
    assert_eq!(c.cache.removal_count(), 0);
}

#[test]
fn test_departed_node_without_entry_produces_no_notification() {
    let cluster = cluster();
    let a = join(&cluster, "node-a");
    let b = join(&cluster, "node-b");

    let registry_a = a.start("a-role", "primary");
    let provider: Arc<dyn RegistryEntryProvider<String, String>> =
        Arc::new(StaticEntryProvider::abstain("unused".to_string()));
    let _registry_b = b.start_with(provider).unwrap();

    let listener_a = RecordingListener::new();
    let _a = registry_a.add_listener(listener_a.clone());

    cluster.change_topology(&[b.address.clone()], FixedOwnerHash::new(&[&a], &a));

    assert_eq!(a.cache.removal_count(), 1);
    assert_eq!(listener_a.total(), 0);
    assert_eq!(registry_a.entries(), entries("a-role", "primary"));
}

#[test]
fn test_joining_member_triggers_no_cleanup() {
    let cluster = cluster();
    let a = join(&cluster, "node-a");
    let registry_a = a.start("a-role", "primary");
    let listener_a = RecordingListener::new();
    let _a = registry_a.add_listener(listener_a.clone());

    let b = join(&cluster, "node-b");
    let _registry_b = b.start("b-role", "backup");

    assert_eq!(a.cache.removal_count(), 0);
    assert_eq!(listener_a.added(), vec![entries("b-role", "backup")]);
    assert!(listener_a.removed().is_empty());
}

#[test]
fn test_cleanup_batch_is_applied_as_a_whole() {
    let cluster = cluster();
    let a = join(&cluster, "node-a");
    let b = join(&cluster, "node-b");
    let c = join(&cluster, "node-c");
    let d = join(&cluster, "node-d");

    let registry_a = a.start("a-role", "primary");
    let _registry_b = b.start("b-role", "x");
    let _registry_c = c.start("c-role", "y");
    let registry_d = d.start("d-role", "backup");

    let listener_a = RecordingListener::new();
    let listener_d = Arc::new(FailAfterFirstRemoval {
        target: a.cache.clone(),
        removed: Mutex::new(Vec::new()),
    });
    let _a = registry_a.add_listener(listener_a.clone());
    let _d = registry_d.add_listener(listener_d.clone());

    cluster.change_topology(
        &[b.address.clone(), c.address.clone()],
        FixedOwnerHash::new(&[&a, &d], &a),
    );

    // 复制在投递途中开始失败，已提交的批处理不受影响
    let mut expected = entries("b-role", "x");
    expected.extend(entries("c-role", "y"));
    assert_eq!(listener_a.removed(), vec![expected]);
    assert_eq!(listener_d.removed.lock().len(), 2);

    let rows = cluster.rows();
    assert_eq!(rows.len(), 2);
    assert!(rows.contains_key(&a.node));
    assert!(rows.contains_key(&d.node));
    assert_eq!(registry_a.entries(), registry_d.entries());
}
