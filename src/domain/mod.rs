//! Domain layer - Block model, template resolution and chain execution contract

pub mod block;
pub mod chain;
pub mod template;

pub use block::{
    BlockChain, BlockChainExecutionResult, BlockDefinition, BlockError, BlockErrorHandler,
    BlockExecutionContext, BlockExecutionResult, BlockHandler, BlockInstance, BlockOutputs,
    BlockOutputsMap, BlockRegistry, ChainOutputs, ErrorHandling, ErrorStrategy, ExecutionContext,
};
pub use chain::{ChainExecutor, ExecutionPlan};
pub use template::TemplateResolver;
