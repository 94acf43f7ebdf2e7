//! 注册表监听器集合与通知分发

use parking_lot::RwLock;
use registry_abstractions::{ListenerRegistration, RegistryKey, RegistryListener, RegistryValue};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    /// 新增
    Added,
    /// 更新
    Updated,
    /// 移除
    Removed,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Added => "added",
            Self::Updated => "updated",
            Self::Removed => "removed",
        };
        f.write_str(name)
    }
}

/// 通知上下文，仅用于日志
#[derive(Debug, Clone, Copy)]
pub struct NotificationContext<'a> {
    /// 缓存容器名称
    pub container: &'a str,
    /// 缓存名称
    pub cache: &'a str,
}

/// 并发监听器集合
///
/// 迭代时先复制快照，回调内部可以安全地添加或移除监听器。
/// 同一事件按注册顺序依次投递，单个监听器 panic 不影响其他监听器。
pub struct ListenerSet<K, V> {
    listeners: RwLock<Vec<Arc<dyn RegistryListener<K, V>>>>,
}

impl<K: RegistryKey, V: RegistryValue> ListenerSet<K, V> {
    /// 创建空集合
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// 添加监听器，返回可注销的句柄
    pub fn add(self: &Arc<Self>, listener: Arc<dyn RegistryListener<K, V>>) -> ListenerRegistration {
        self.listeners.write().push(listener.clone());

        let set: Weak<Self> = Arc::downgrade(self);
        ListenerRegistration::new(move || {
            if let Some(set) = set.upgrade() {
                set.remove(&listener);
            }
        })
    }

    /// 移除监听器
    pub fn remove(&self, listener: &Arc<dyn RegistryListener<K, V>>) {
        self.listeners
            .write()
            .retain(|existing| !same_instance(existing, listener));
    }

    /// 清空所有监听器
    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    /// 监听器数量
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// 向所有监听器分发通知
    pub fn notify(
        &self,
        notification: NotificationType,
        entries: &HashMap<K, V>,
        context: NotificationContext<'_>,
    ) {
        let snapshot: Vec<_> = self.listeners.read().clone();
        debug!(
            container = context.container,
            cache = context.cache,
            "分发注册表通知: {} 条 {} 记录 -> {} 个监听器",
            entries.len(),
            notification,
            snapshot.len()
        );

        for listener in snapshot {
            let result = panic::catch_unwind(AssertUnwindSafe(|| match notification {
                NotificationType::Added => listener.added_entries(entries),
                NotificationType::Updated => listener.updated_entries(entries),
                NotificationType::Removed => listener.removed_entries(entries),
            }));

            if let Err(payload) = result {
                error!(
                    container = context.container,
                    cache = context.cache,
                    event = %notification,
                    entries = ?entries,
                    "注册表监听器处理通知失败: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

impl<K: RegistryKey, V: RegistryValue> Default for ListenerSet<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// 比较两个 trait 对象是否指向同一实例
fn same_instance<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知错误".to_string()
    }
}
