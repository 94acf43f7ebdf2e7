//! 集群注册表发布、订阅与关闭的集成测试

use infrastructure_common::RegistryError;
use registry_abstractions::{RegistryFactory, RegistryListener, StaticEntryProvider};
use registry_integration_tests::{
    cluster, entries, join, PanickingListener, RecordingListener, VersionedProvider,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[test]
fn test_factory_allows_single_active_registry() {
    let cluster = cluster();
    let a = join(&cluster, "node-1");

    let registry = a.start("node-1-role", "primary");
    assert!(a.factory.is_active());
    assert_eq!(a.factory.name(), "server/registry");

    let error = a
        .start_with(Arc::new(StaticEntryProvider::new(
            "node-1-role".to_string(),
            "backup".to_string(),
        )))
        .err()
        .unwrap();
    assert!(error.is_already_active());

    registry.close();
    assert!(!a.factory.is_active());

    let reopened = a.start("node-1-role", "backup");
    assert_eq!(
        reopened.entries().get("node-1-role").map(String::as_str),
        Some("backup")
    );
}

#[test]
fn test_publish_and_close_are_seen_by_remote_nodes() {
    let cluster = cluster();
    let a = join(&cluster, "node-1");
    let b = join(&cluster, "node-2");

    let remote = b.start("node-2-role", "backup");
    let remote_listener = RecordingListener::new();
    let _registration = remote.add_listener(remote_listener.clone());

    let registry = a.start("node-1-role", "primary");
    let local_listener = RecordingListener::new();
    let _local_registration = registry.add_listener(local_listener.clone());

    // 每次写入只通知一次，提交前事件被忽略
    assert_eq!(remote_listener.added(), vec![entries("node-1-role", "primary")]);
    assert_eq!(remote.entries().get("node-1-role").map(String::as_str), Some("primary"));
    assert_eq!(registry.entries().len(), 2);
    assert_eq!(
        registry.entry(&b.node).map(|entry| entry.value().clone()),
        Some("backup".to_string())
    );

    registry.close();

    assert_eq!(remote_listener.removed(), vec![entries("node-1-role", "primary")]);
    assert!(!remote.entries().contains_key("node-1-role"));
    assert!(!cluster.rows().contains_key(&a.node));
    // 本地关闭不会通知本地监听器
    assert_eq!(local_listener.total(), 0);
}

#[test]
fn test_local_writes_do_not_notify_local_listeners() {
    let cluster = cluster();
    let a = join(&cluster, "node-1");
    let b = join(&cluster, "node-2");

    let registry = a.start_with(VersionedProvider::new("node-1-role")).unwrap();
    let remote = b.start("node-2-role", "backup");

    let local_listener = RecordingListener::new();
    let remote_listener = RecordingListener::new();
    let _local = registry.add_listener(local_listener.clone());
    let _remote = remote.add_listener(remote_listener.clone());

    let entry = registry.local_entry().unwrap().unwrap();
    assert_eq!(entry.value(), "v1");

    assert_eq!(local_listener.total(), 0);
    assert_eq!(remote_listener.updated(), vec![entries("node-1-role", "v1")]);
    assert_eq!(remote_listener.added().len(), 0);
}

#[test]
fn test_remote_modifications_fan_out_to_every_listener() {
    let cluster = cluster();
    let a = join(&cluster, "node-1");
    let b = join(&cluster, "node-2");
    let c = join(&cluster, "node-3");

    let registry_a = a.start("node-1-role", "primary");
    let registry_c = c.start("node-3-role", "backup");
    let listener_a = RecordingListener::new();
    let listener_c = RecordingListener::new();
    let _a = registry_a.add_listener(listener_a.clone());
    let _c = registry_c.add_listener(listener_c.clone());

    let registry_b = b.start_with(VersionedProvider::new("node-2-role")).unwrap();
    registry_b.local_entry().unwrap();
    registry_b.close();

    for listener in [&listener_a, &listener_c] {
        assert_eq!(listener.added(), vec![entries("node-2-role", "v0")]);
        assert_eq!(listener.updated(), vec![entries("node-2-role", "v1")]);
        assert_eq!(listener.removed(), vec![entries("node-2-role", "v1")]);
    }
}

#[test]
fn test_panicking_listener_does_not_block_others() {
    let cluster = cluster();
    let a = join(&cluster, "node-1");
    let b = join(&cluster, "node-2");

    let registry = a.start("node-1-role", "primary");
    let panicking = Arc::new(PanickingListener::default());
    let recording = RecordingListener::new();
    let _first = registry.add_listener(panicking.clone());
    let _second = registry.add_listener(recording.clone());

    let remote = b.start("node-2-role", "backup");
    remote.close();

    assert_eq!(panicking.calls.load(Ordering::SeqCst), 2);
    assert_eq!(recording.added(), vec![entries("node-2-role", "backup")]);
    assert_eq!(recording.removed(), vec![entries("node-2-role", "backup")]);
}

#[test]
fn test_listener_registration_close_and_remove() {
    let cluster = cluster();
    let a = join(&cluster, "node-1");
    let b = join(&cluster, "node-2");

    let registry = a.start("node-1-role", "primary");
    let by_handle = RecordingListener::new();
    let by_reference = RecordingListener::new();
    let registration = registry.add_listener(by_handle.clone());
    let reference: Arc<dyn RegistryListener<String, String>> = by_reference.clone();
    let _kept = registry.add_listener(reference.clone());

    registration.close();
    registry.remove_listener(&reference);

    let remote = b.start("node-2-role", "backup");
    remote.close();

    assert_eq!(by_handle.total(), 0);
    assert_eq!(by_reference.total(), 0);
}

#[test]
fn test_closed_registry_stops_notifying() {
    let cluster = cluster();
    let a = join(&cluster, "node-1");
    let b = join(&cluster, "node-2");

    let registry = a.start("node-1-role", "primary");
    let listener = RecordingListener::new();
    let _registration = registry.add_listener(listener.clone());
    registry.close();
    assert_eq!(a.cache.listener_count(), 0);

    let _remote = b.start("node-2-role", "backup");
    assert_eq!(listener.total(), 0);

    // 重复关闭只记录日志
    registry.close();
    assert!(!a.factory.is_active());
}

#[test]
fn test_abstaining_provider_publishes_nothing() {
    let cluster = cluster();
    let a = join(&cluster, "node-1");
    let b = join(&cluster, "node-2");

    let remote = b.start("node-2-role", "backup");
    let remote_listener = RecordingListener::new();
    let _registration = remote.add_listener(remote_listener.clone());

    let registry = a
        .start_with(Arc::new(StaticEntryProvider::abstain("unused".to_string())))
        .unwrap();

    assert!(registry.local_entry().unwrap().is_none());
    assert!(!cluster.rows().contains_key(&a.node));
    assert_eq!(remote_listener.total(), 0);
    // 不发布记录的节点仍能读取整个集群
    assert_eq!(registry.entries(), entries("node-2-role", "backup"));

    registry.close();
    assert_eq!(remote_listener.total(), 0);
}

#[test]
fn test_failed_publish_releases_factory() {
    let cluster = cluster();
    let a = join(&cluster, "node-1");

    a.cache.inject_failures(true);
    let error = a
        .start_with(Arc::new(StaticEntryProvider::new(
            "node-1-role".to_string(),
            "primary".to_string(),
        )))
        .err()
        .unwrap();
    assert!(matches!(error, RegistryError::Cache { .. }));
    assert!(!a.factory.is_active());
    assert_eq!(a.cache.discarded_batches(), 1);
    assert_eq!(a.cache.listener_count(), 0);

    a.cache.inject_failures(false);
    let registry = a.start("node-1-role", "primary");
    assert_eq!(registry.entries().len(), 1);
}

#[test]
fn test_failed_close_still_releases_factory() {
    let cluster = cluster();
    let a = join(&cluster, "node-1");

    let registry = a.start("node-1-role", "primary");
    a.cache.inject_failures(true);
    registry.close();

    assert!(!a.factory.is_active());
    assert!(cluster.rows().contains_key(&a.node));
}

#[test]
fn test_failed_local_entry_is_returned() {
    let cluster = cluster();
    let a = join(&cluster, "node-1");

    let registry = a.start("node-1-role", "primary");
    a.cache.inject_failures(true);
    assert!(registry.local_entry().is_err());
}

#[test]
fn test_local_entry_after_close_does_not_republish() {
    let cluster = cluster();
    let a = join(&cluster, "node-1");
    let b = join(&cluster, "node-2");

    let registry = a.start_with(VersionedProvider::new("node-1-role")).unwrap();
    let _remote = b.start("node-2-role", "backup");
    registry.close();
    assert!(!cluster.rows().contains_key(&a.node));

    assert!(registry.local_entry().unwrap().is_none());
    assert!(!cluster.rows().contains_key(&a.node));
    assert!(!a.factory.is_active());
}
