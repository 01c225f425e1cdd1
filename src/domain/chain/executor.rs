//! Chain executor trait

use async_trait::async_trait;

use crate::domain::block::{BlockChain, BlockChainExecutionResult, ExecutionContext};

/// Runs a block chain to completion.
///
/// Implementations never fail outright: every outcome, including timeouts
/// and unregistered block types, is reported through the returned result.
#[async_trait]
pub trait ChainExecutor: Send + Sync + std::fmt::Debug {
    async fn execute_chain(
        &self,
        chain: &BlockChain,
        context: &ExecutionContext,
    ) -> BlockChainExecutionResult;
}
