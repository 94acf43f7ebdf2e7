//! 错误类型定义

use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置解析失败: {source}")]
    ParseError {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

/// 复制缓存错误类型
///
/// 由缓存协作方返回，注册表在同步调用路径上向调用方传播，
/// 在事件驱动路径上记录日志后吞掉。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("缓存复制失败: {container}/{cache}, 原因: {message}")]
    ReplicationFailed {
        container: String,
        cache: String,
        message: String,
    },

    #[error("批处理提交失败: {container}/{cache}, 原因: {message}")]
    BatchFailed {
        container: String,
        cache: String,
        message: String,
    },
}

impl CacheError {
    /// 创建复制失败错误
    pub fn replication_failed(
        container: impl Into<String>,
        cache: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ReplicationFailed {
            container: container.into(),
            cache: cache.into(),
            message: message.into(),
        }
    }

    /// 创建批处理失败错误
    pub fn batch_failed(
        container: impl Into<String>,
        cache: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::BatchFailed {
            container: container.into(),
            cache: cache.into(),
            message: message.into(),
        }
    }
}

/// 注册表错误类型
#[derive(Error, Debug)]
pub enum RegistryError {
    /// 同一个工厂在前一个注册表关闭之前再次创建注册表。
    ///
    /// 属于调用方契约违规，不应自动重试。
    #[error("注册表已激活: {factory}")]
    AlreadyActive { factory: String },

    #[error("注册表缓存操作失败: {source}")]
    Cache {
        #[from]
        source: CacheError,
    },
}

impl RegistryError {
    /// 创建已激活错误
    pub fn already_active(factory: impl Into<String>) -> Self {
        Self::AlreadyActive {
            factory: factory.into(),
        }
    }

    /// 是否为重复创建的契约违规
    pub fn is_already_active(&self) -> bool {
        matches!(self, Self::AlreadyActive { .. })
    }
}

/// 生命周期管理错误类型
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("服务状态不允许启动: {service}, 当前状态: {state}")]
    InvalidStartState { service: String, state: String },

    #[error("服务状态不允许停止: {service}, 当前状态: {state}")]
    InvalidStopState { service: String, state: String },

    #[error("服务启动失败: {service}, 原因: {source}")]
    StartFailed {
        service: String,
        source: RegistryError,
    },
}

/// 基础设施错误类型
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("配置错误: {source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },

    #[error("注册表错误: {source}")]
    RegistryError {
        #[from]
        source: RegistryError,
    },

    #[error("生命周期错误: {source}")]
    LifecycleError {
        #[from]
        source: LifecycleError,
    },

    #[error("基础设施启动失败: {message}")]
    BootstrapFailed { message: String },
}
