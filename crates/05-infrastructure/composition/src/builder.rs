//! 注册表基础设施构建器

use crate::logging::LoggingConfig;
use crate::settings::{RegistryMode, RegistrySettings};
use infrastructure_common::InfrastructureError;
use registry_abstractions::{
    Node, RegistryEntryProvider, RegistryFactory, RegistryKey, RegistryValue,
};
use registry_impl::{
    CacheRegistryConfig, CacheRegistryFactory, LocalGroup, LocalRegistryFactory, RegistryService,
};
use std::sync::Arc;
use tracing::{info, warn};

/// 注册表基础设施构建器
///
/// 根据配置选择本地或集群注册表工厂。集群模式需要通过
/// [`RegistryInfrastructureBuilder::with_cache`] 提供复制缓存。
pub struct RegistryInfrastructureBuilder<K, V> {
    /// 注册表配置
    settings: RegistrySettings,
    /// 集群模式使用的缓存协作方
    cache_config: Option<CacheRegistryConfig<K, V>>,
    /// 是否启用日志初始化
    logging_enabled: bool,
    /// 日志配置
    logging_config: LoggingConfig,
}

impl<K: RegistryKey, V: RegistryValue> RegistryInfrastructureBuilder<K, V> {
    /// 以指定配置创建构建器
    pub fn new(settings: RegistrySettings) -> Self {
        Self {
            settings,
            cache_config: None,
            logging_enabled: false, // 默认不启用日志初始化
            logging_config: LoggingConfig::default(),
        }
    }

    /// 提供集群模式使用的复制缓存
    pub fn with_cache(mut self, config: CacheRegistryConfig<K, V>) -> Self {
        self.cache_config = Some(config);
        self
    }

    /// 配置日志
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging_config = config;
        self.logging_enabled = true;
        self
    }

    /// 使用配置文件中的日志配置
    pub fn with_configured_logging(self) -> Result<Self, InfrastructureError> {
        let config = self.settings.logging.to_logging_config()?;
        Ok(self.with_logging(config))
    }

    /// 构建注册表工厂
    pub fn build(self) -> Result<Arc<dyn RegistryFactory<K, V>>, InfrastructureError> {
        // 只有在明确配置了日志时才初始化日志
        if self.logging_enabled {
            self.logging_config.init()?;
        }

        self.settings.validate()?;
        info!("开始构建注册表基础设施: {:?}", self.settings.mode);

        let factory: Arc<dyn RegistryFactory<K, V>> = match self.settings.mode {
            RegistryMode::Local => {
                if self.cache_config.is_some() {
                    warn!("本地模式忽略已提供的复制缓存: {}", self.settings.factory_name());
                }
                let group = Arc::new(LocalGroup::new(
                    self.settings.container.clone(),
                    Node::new(self.settings.node.clone()),
                ));
                Arc::new(LocalRegistryFactory::new(
                    self.settings.factory_name(),
                    group,
                ))
            }
            RegistryMode::Clustered => {
                let config =
                    self.cache_config
                        .ok_or_else(|| InfrastructureError::BootstrapFailed {
                            message: format!(
                                "集群模式缺少复制缓存: {}",
                                self.settings.factory_name()
                            ),
                        })?;

                let configured = (config.cache.container_name(), config.cache.cache_name());
                if configured != (self.settings.container.as_str(), self.settings.cache.as_str()) {
                    warn!(
                        "复制缓存与配置不一致: {}/{} != {}",
                        configured.0,
                        configured.1,
                        self.settings.factory_name()
                    );
                }
                Arc::new(CacheRegistryFactory::new(config))
            }
        };

        info!("注册表基础设施构建完成: {}", factory.name());
        Ok(factory)
    }

    /// 构建注册表服务
    pub fn build_service(
        self,
        name: impl Into<String>,
        provider: Arc<dyn RegistryEntryProvider<K, V>>,
    ) -> Result<RegistryService<K, V>, InfrastructureError> {
        let factory = self.build()?;
        Ok(RegistryService::new(name, factory, provider))
    }
}
