//! Block domain module
//!
//! Blocks are typed, pluggable units of work (a database call, an HTTP
//! call, ...). This module holds the declarative chain model, the handler
//! capability, the result records and the registry that maps a block type
//! key to its definition and handler.

mod chain;
mod context;
mod definition;
mod error;
mod handler;
mod registry;
mod result;

pub use chain::{BlockChain, BlockErrorHandler, BlockInstance, ErrorHandling, ErrorStrategy};
pub use context::{BlockExecutionContext, BlockOutputs, BlockOutputsMap, ExecutionContext};
pub use definition::{BlockDefinition, BlockFunction, BlockPort};
pub use error::BlockError;
pub use handler::{BlockHandler, FnBlockHandler, handler_fn};
pub use registry::BlockRegistry;
pub use result::{BlockChainExecutionResult, BlockExecutionResult, ChainOutputs, fallback_outputs};

#[cfg(test)]
pub use handler::MockBlockHandler;
