//! Block handler capability

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::context::{BlockExecutionContext, BlockOutputs};
use super::error::BlockError;

#[cfg(test)]
use mockall::automock;

/// Executable behavior registered for a block type.
///
/// The engine treats a handler as an opaque asynchronous operation: it only
/// observes success with an output mapping, or failure. Handlers run on their
/// own task, so they own their arguments.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BlockHandler: Send + Sync {
    async fn execute(
        &self,
        context: BlockExecutionContext,
        config: Value,
    ) -> Result<BlockOutputs, BlockError>;
}

/// Handler backed by an async closure
pub struct FnBlockHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> BlockHandler for FnBlockHandler<F>
where
    F: Fn(BlockExecutionContext, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<BlockOutputs, BlockError>> + Send,
{
    async fn execute(
        &self,
        context: BlockExecutionContext,
        config: Value,
    ) -> Result<BlockOutputs, BlockError> {
        (self.f)(context, config).await
    }
}

/// Wrap an async closure as a shareable handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn BlockHandler>
where
    F: Fn(BlockExecutionContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<BlockOutputs, BlockError>> + Send + 'static,
{
    Arc::new(FnBlockHandler { f })
}
