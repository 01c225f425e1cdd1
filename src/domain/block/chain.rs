//! Block chain entities
//!
//! A [`BlockChain`] is the declarative, caller-supplied description of one
//! run: an ordered list of [`BlockInstance`]s plus the chain-level policy
//! (timeout and error strategy). The engine never mutates or stores it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::BlockError;

/// Per-block error handling override
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlockErrorHandler {
    /// Follow the chain's strategy
    #[default]
    Continue,

    /// Any failure of this block halts the chain, whatever the chain strategy
    Fail,
}

/// Chain-level error strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorStrategy {
    /// Record failures and keep executing
    #[default]
    Continue,

    /// Halt on the first failure
    FailFast,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ErrorHandling {
    #[serde(default)]
    pub strategy: ErrorStrategy,
}

/// One step in a chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockInstance {
    /// Unique within the chain; key under which outputs are published
    pub id: String,

    /// Dispatch key into the registry
    pub block_type: String,

    /// Block-specific parameters, passed to the handler untouched
    #[serde(default = "empty_object")]
    pub config: Value,

    /// Input bindings; string leaves may be template references
    #[serde(default)]
    pub inputs: Map<String, Value>,

    /// Timeout in milliseconds, overrides the definition's default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub parallel: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_handler: Option<BlockErrorHandler>,

    /// Substituted into the outputs as `{ "result": fallback }` on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Value>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl BlockInstance {
    pub fn new(id: impl Into<String>, block_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            block_type: block_type.into(),
            config: empty_object(),
            inputs: Map::new(),
            timeout: None,
            parallel: false,
            error_handler: None,
            fallback: None,
        }
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(name.into(), value);
        self
    }

    pub fn with_inputs(mut self, inputs: Map<String, Value>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_error_handler(mut self, handler: BlockErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn with_fallback(mut self, fallback: Value) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Whether this block's own override forces fail-fast
    pub fn forces_fail_fast(&self) -> bool {
        self.error_handler == Some(BlockErrorHandler::Fail)
    }
}

/// Declarative chain of blocks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockChain {
    pub id: String,

    #[serde(default)]
    pub blocks: Vec<BlockInstance>,

    /// Whole-chain timeout in milliseconds, measured from chain start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_handling: Option<ErrorHandling>,
}

impl BlockChain {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            blocks: Vec::new(),
            timeout: None,
            error_handling: None,
        }
    }

    pub fn with_block(mut self, block: BlockInstance) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    pub fn with_strategy(mut self, strategy: ErrorStrategy) -> Self {
        self.error_handling = Some(ErrorHandling { strategy });
        self
    }

    /// Effective error strategy (continue unless declared otherwise)
    pub fn strategy(&self) -> ErrorStrategy {
        self.error_handling
            .as_ref()
            .map(|h| h.strategy)
            .unwrap_or_default()
    }

    pub fn is_fail_fast(&self) -> bool {
        self.strategy() == ErrorStrategy::FailFast
    }

    /// Number of declared blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Structural validation for callers that want it before running.
    ///
    /// The engine does not call this: a chain with duplicate ids still runs
    /// and the last writer wins in the output map.
    pub fn validate(&self) -> Result<(), BlockError> {
        if self.id.trim().is_empty() {
            return Err(BlockError::validation("Chain ID cannot be empty"));
        }

        let mut seen = HashSet::new();

        for (index, block) in self.blocks.iter().enumerate() {
            if block.id.trim().is_empty() {
                return Err(BlockError::validation(format!(
                    "Block at index {} has an empty id",
                    index
                )));
            }

            if block.block_type.trim().is_empty() {
                return Err(BlockError::validation(format!(
                    "Block '{}' has an empty blockType",
                    block.id
                )));
            }

            if !seen.insert(block.id.as_str()) {
                return Err(BlockError::validation(format!(
                    "Duplicate block id '{}' in chain '{}'",
                    block.id, self.id
                )));
            }
        }

        Ok(())
    }
}
