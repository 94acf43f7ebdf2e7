//! 函数式注册表工厂
//!
//! 所有注册表工厂共用的单实例原语：一个激活槽位加一个构造闭包。

use infrastructure_common::RegistryError;
use parking_lot::Mutex;
use registry_abstractions::{
    Registry, RegistryEntryProvider, RegistryFactory, RegistryKey, RegistryValue,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 注册表关闭时执行的回调
pub type CloseTask = Box<dyn FnOnce() + Send>;

/// 注册表构造函数类型
pub type RegistryConstructor<K, V> = Box<
    dyn Fn(
            Arc<dyn RegistryEntryProvider<K, V>>,
            CloseTask,
        ) -> Result<Arc<dyn Registry<K, V>>, RegistryError>
        + Send
        + Sync,
>;

/// 激活槽位，保存当前激活的代号
type Slot = Arc<Mutex<Option<u64>>>;

/// 已占用的激活槽位
///
/// 由 [`FunctionalRegistryFactory::try_activate`] 返回。
/// 槽位只会通过 [`ActivationSlot::release`] 或关闭回调释放，丢弃本结构不会释放。
pub struct ActivationSlot<K, V> {
    factory: String,
    slot: Slot,
    generation: u64,
    provider: Arc<dyn RegistryEntryProvider<K, V>>,
}

impl<K: RegistryKey, V: RegistryValue> ActivationSlot<K, V> {
    /// 占用槽位的提供者
    pub fn provider(&self) -> &Arc<dyn RegistryEntryProvider<K, V>> {
        &self.provider
    }

    /// 本次激活的代号
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 生成释放槽位的关闭回调
    pub fn close_task(&self) -> CloseTask {
        let factory = self.factory.clone();
        let slot = self.slot.clone();
        let generation = self.generation;
        Box::new(move || release_slot(&factory, &slot, generation))
    }

    /// 立即释放槽位
    pub fn release(self) {
        release_slot(&self.factory, &self.slot, self.generation);
    }
}

fn release_slot(factory: &str, slot: &Mutex<Option<u64>>, generation: u64) {
    let mut guard = slot.lock();
    // 只释放本次激活占用的槽位
    if *guard == Some(generation) {
        *guard = None;
        debug!("注册表工厂槽位已释放: {}, 代号: {}", factory, generation);
    } else {
        warn!("注册表工厂槽位已被其他注册表占用，跳过释放: {}", factory);
    }
}

/// 函数式注册表工厂
///
/// 同一时刻最多只有一个活动注册表，注册表关闭后才能再次创建。
pub struct FunctionalRegistryFactory<K, V> {
    name: String,
    slot: Slot,
    generations: AtomicU64,
    constructor: RegistryConstructor<K, V>,
}

impl<K: RegistryKey, V: RegistryValue> FunctionalRegistryFactory<K, V> {
    /// 创建新的工厂
    pub fn new<F>(name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(
                Arc<dyn RegistryEntryProvider<K, V>>,
                CloseTask,
            ) -> Result<Arc<dyn Registry<K, V>>, RegistryError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            slot: Arc::new(Mutex::new(None)),
            generations: AtomicU64::new(0),
            constructor: Box::new(constructor),
        }
    }

    /// 尝试占用激活槽位
    pub fn try_activate(
        &self,
        provider: Arc<dyn RegistryEntryProvider<K, V>>,
    ) -> Result<ActivationSlot<K, V>, RegistryError> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            warn!("注册表工厂已存在活动注册表: {}", self.name);
            return Err(RegistryError::already_active(&self.name));
        }
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        *slot = Some(generation);

        Ok(ActivationSlot {
            factory: self.name.clone(),
            slot: self.slot.clone(),
            generation,
            provider,
        })
    }
}

impl<K: RegistryKey, V: RegistryValue> RegistryFactory<K, V> for FunctionalRegistryFactory<K, V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_registry(
        &self,
        provider: Arc<dyn RegistryEntryProvider<K, V>>,
    ) -> Result<Arc<dyn Registry<K, V>>, RegistryError> {
        let activation = self.try_activate(provider)?;

        match (self.constructor)(activation.provider().clone(), activation.close_task()) {
            Ok(registry) => {
                info!("创建注册表: {}", self.name);
                Ok(registry)
            }
            Err(e) => {
                warn!("注册表构造失败，释放工厂槽位: {}, 原因: {}", self.name, e);
                activation.release();
                Err(e)
            }
        }
    }

    fn is_active(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<K, V> std::fmt::Debug for FunctionalRegistryFactory<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionalRegistryFactory")
            .field("name", &self.name)
            .field("active", &self.slot.lock().is_some())
            .field("constructor", &"<function>")
            .finish()
    }
}
