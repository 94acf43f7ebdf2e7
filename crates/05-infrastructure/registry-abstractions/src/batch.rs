//! 作用域批处理抽象
//!
//! 批处理包裹一次或多次缓存写入，要么整体提交，要么整体丢弃。
//! [`Batch`] 在析构时自动丢弃未提交的批处理。

use infrastructure_common::CacheError;

/// 批处理上下文 trait
///
/// 由缓存实现提供，[`Batch`] 负责保证恰好调用一次 `commit` 或 `discard`。
pub trait BatchContext: Send {
    /// 提交批处理
    fn commit(&mut self) -> Result<(), CacheError>;

    /// 丢弃批处理
    fn discard(&mut self);
}

/// 作用域批处理
pub struct Batch {
    context: Option<Box<dyn BatchContext>>,
}

impl Batch {
    /// 创建新的批处理
    pub fn new(context: Box<dyn BatchContext>) -> Self {
        Self {
            context: Some(context),
        }
    }

    /// 提交批处理
    pub fn commit(mut self) -> Result<(), CacheError> {
        match self.context.take() {
            Some(mut context) => context.commit(),
            None => Ok(()),
        }
    }

    /// 显式丢弃批处理
    pub fn discard(mut self) {
        if let Some(mut context) = self.context.take() {
            context.discard();
        }
    }
}

impl Drop for Batch {
    fn drop(&mut self) {
        if let Some(mut context) = self.context.take() {
            context.discard();
        }
    }
}

impl std::fmt::Debug for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("active", &self.context.is_some())
            .finish()
    }
}

/// 批处理器 trait
pub trait Batcher: Send + Sync {
    /// 开启新的批处理
    fn create_batch(&self) -> Result<Batch, CacheError>;
}

/// 在批处理中执行操作
///
/// 操作成功则提交，失败则丢弃批处理并返回错误。
pub fn execute_in_batch<T, F>(batcher: &dyn Batcher, action: F) -> Result<T, CacheError>
where
    F: FnOnce() -> Result<T, CacheError>,
{
    let batch = batcher.create_batch()?;
    let result = action()?;
    batch.commit()?;
    Ok(result)
}
