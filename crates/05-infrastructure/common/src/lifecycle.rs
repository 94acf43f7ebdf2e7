//! 组件生命周期管理

use crate::errors::LifecycleError;
use async_trait::async_trait;
use std::fmt;

/// 组件生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// 未初始化
    Uninitialized,
    /// 初始化中
    Initializing,
    /// 运行中
    Running,
    /// 停止中
    Stopping,
    /// 已停止
    Stopped,
    /// 错误状态
    Error,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// 组件生命周期管理 trait
///
/// 容器在启动时调用 `on_start`，在关闭时调用 `on_stop`。
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// 组件启动
    async fn on_start(&mut self) -> Result<(), LifecycleError>;

    /// 组件停止
    async fn on_stop(&mut self) -> Result<(), LifecycleError>;

    /// 获取生命周期状态
    fn get_lifecycle_state(&self) -> LifecycleState;

    /// 是否可以启动
    fn can_start(&self) -> bool {
        matches!(
            self.get_lifecycle_state(),
            LifecycleState::Uninitialized | LifecycleState::Stopped | LifecycleState::Error
        )
    }

    /// 是否可以停止
    fn can_stop(&self) -> bool {
        matches!(self.get_lifecycle_state(), LifecycleState::Running)
    }
}
