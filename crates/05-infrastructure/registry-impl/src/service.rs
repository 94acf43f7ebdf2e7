//! 注册表服务
//!
//! 把注册表的创建与关闭挂到组件生命周期上：启动时从工厂创建注册表，停止时关闭它。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use infrastructure_common::{Lifecycle, LifecycleError, LifecycleState};
use registry_abstractions::{
    Registry, RegistryEntryProvider, RegistryFactory, RegistryKey, RegistryValue,
};
use std::sync::Arc;
use tracing::{error, info};

/// 注册表服务
pub struct RegistryService<K, V> {
    name: String,
    factory: Arc<dyn RegistryFactory<K, V>>,
    provider: Arc<dyn RegistryEntryProvider<K, V>>,
    registry: Option<Arc<dyn Registry<K, V>>>,
    state: LifecycleState,
    started_at: Option<DateTime<Utc>>,
}

impl<K: RegistryKey, V: RegistryValue> RegistryService<K, V> {
    /// 创建注册表服务
    pub fn new(
        name: impl Into<String>,
        factory: Arc<dyn RegistryFactory<K, V>>,
        provider: Arc<dyn RegistryEntryProvider<K, V>>,
    ) -> Self {
        Self {
            name: name.into(),
            factory,
            provider,
            registry: None,
            state: LifecycleState::Uninitialized,
            started_at: None,
        }
    }

    /// 服务名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 运行中的注册表
    pub fn registry(&self) -> Option<Arc<dyn Registry<K, V>>> {
        self.registry.clone()
    }

    /// 最近一次启动时间
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }
}

#[async_trait]
impl<K: RegistryKey, V: RegistryValue> Lifecycle for RegistryService<K, V> {
    async fn on_start(&mut self) -> Result<(), LifecycleError> {
        if !self.can_start() {
            return Err(LifecycleError::InvalidStartState {
                service: self.name.clone(),
                state: self.state.to_string(),
            });
        }

        self.state = LifecycleState::Initializing;
        match self.factory.create_registry(self.provider.clone()) {
            Ok(registry) => {
                self.registry = Some(registry);
                self.state = LifecycleState::Running;
                self.started_at = Some(Utc::now());
                info!("注册表服务已启动: {} ({})", self.name, self.factory.name());
                Ok(())
            }
            Err(e) => {
                self.state = LifecycleState::Error;
                error!("注册表服务启动失败: {}, 原因: {}", self.name, e);
                Err(LifecycleError::StartFailed {
                    service: self.name.clone(),
                    source: e,
                })
            }
        }
    }

    async fn on_stop(&mut self) -> Result<(), LifecycleError> {
        if !self.can_stop() {
            return Err(LifecycleError::InvalidStopState {
                service: self.name.clone(),
                state: self.state.to_string(),
            });
        }

        self.state = LifecycleState::Stopping;
        if let Some(registry) = self.registry.take() {
            registry.close();
        }
        self.state = LifecycleState::Stopped;

        let uptime = self
            .started_at
            .map(|started| Utc::now() - started)
            .map(|elapsed| elapsed.num_milliseconds())
            .unwrap_or_default();
        info!("注册表服务已停止: {}, 运行 {}ms", self.name, uptime);
        Ok(())
    }

    fn get_lifecycle_state(&self) -> LifecycleState {
        self.state
    }
}
