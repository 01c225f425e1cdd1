//! Block error types

use thiserror::Error;

/// Errors that can occur while registering, resolving or executing blocks
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BlockError {
    #[error("Block type not registered: {0}")]
    UnregisteredBlockType(String),

    #[error("Invalid block config: {0}")]
    InvalidConfig(String),

    #[error("Block handler failed: {0}")]
    Handler(String),

    #[error("Block '{block_id}' timed out after {timeout_ms}ms")]
    BlockTimeout { block_id: String, timeout_ms: u64 },

    #[error("Chain '{chain_id}' timed out after {timeout_ms}ms")]
    ChainTimeout { chain_id: String, timeout_ms: u64 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BlockError {
    pub fn unregistered(block_type: impl Into<String>) -> Self {
        Self::UnregisteredBlockType(block_type.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }

    pub fn block_timeout(block_id: impl Into<String>, timeout_ms: u64) -> Self {
        Self::BlockTimeout {
            block_id: block_id.into(),
            timeout_ms,
        }
    }

    pub fn chain_timeout(chain_id: impl Into<String>, timeout_ms: u64) -> Self {
        Self::ChainTimeout {
            chain_id: chain_id.into(),
            timeout_ms,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error came from a deadline rather than from the work itself
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::BlockTimeout { .. } | Self::ChainTimeout { .. })
    }
}
