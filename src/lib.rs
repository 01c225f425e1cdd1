//! PMP Block Engine
//!
//! Runs declarative chains of typed, pluggable blocks:
//! - Registry of block types (definition + handler) looked up by type key
//! - `${...}` template references threading outputs into later inputs
//! - Sequential steps and concurrently executed parallel batches
//! - Per-block and whole-chain timeouts
//! - Fail-fast or continue error strategies with fallback outputs

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{
    BlockChain, BlockChainExecutionResult, BlockDefinition, BlockError, BlockHandler,
    BlockInstance, BlockRegistry, ChainExecutor, ExecutionContext,
};
pub use infrastructure::BlockExecutionEngine;

use infrastructure::register_builtin_blocks;

/// Create a registry holding the built-in blocks enabled by `config`
pub fn create_registry(config: &AppConfig) -> anyhow::Result<BlockRegistry> {
    let registry = BlockRegistry::new();
    register_builtin_blocks(&registry, config)?;
    Ok(registry)
}

/// Create an engine over the built-in blocks
pub fn create_engine(config: &AppConfig) -> anyhow::Result<BlockExecutionEngine> {
    Ok(BlockExecutionEngine::new(create_registry(config)?))
}
