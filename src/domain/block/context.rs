//! Execution contexts
//!
//! [`ExecutionContext`] is the ambient data a caller supplies for one chain
//! run (query/path params, environment, user, request body).
//! [`BlockExecutionContext`] is what a single handler invocation sees: its
//! resolved inputs, the ambient data, and a read-only snapshot of every block
//! output published before it became eligible to run.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Output mapping produced by one block
pub type BlockOutputs = Map<String, Value>;

/// Outputs accumulated during a run, keyed by block id
pub type BlockOutputsMap = HashMap<String, BlockOutputs>;

/// Ambient data for a chain run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Request parameters, referenced as `${params.<name>}`
    #[serde(default)]
    pub params: Map<String, Value>,

    /// Environment values, referenced as `${env.<name>}`
    #[serde(default)]
    pub env: Map<String, Value>,

    /// Authenticated user, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,

    /// Request body, referenced as `${body.<dotted.path>}`
    #[serde(default)]
    pub request_body: Value,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn with_env_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), Value::String(value.into()));
        self
    }

    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in vars {
            self.env.insert(name.into(), Value::String(value.into()));
        }
        self
    }

    pub fn with_user(mut self, user: Value) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_request_body(mut self, body: Value) -> Self {
        self.request_body = body;
        self
    }
}

/// Context handed to a block handler for one invocation
#[derive(Debug, Clone)]
pub struct BlockExecutionContext {
    /// Inputs after template resolution
    pub inputs: Map<String, Value>,

    /// Outputs of blocks that completed before this block became eligible
    pub block_outputs: Arc<BlockOutputsMap>,

    pub block_id: String,
    pub block_type: String,
    pub chain_id: String,

    /// Position of the block in the chain's declared block list
    pub current_block_index: usize,
    pub total_blocks: usize,

    pub executed_at: DateTime<Utc>,

    ambient: Arc<ExecutionContext>,
}

impl BlockExecutionContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        inputs: Map<String, Value>,
        ambient: Arc<ExecutionContext>,
        block_outputs: Arc<BlockOutputsMap>,
        block_id: impl Into<String>,
        block_type: impl Into<String>,
        chain_id: impl Into<String>,
        current_block_index: usize,
        total_blocks: usize,
    ) -> Self {
        Self {
            inputs,
            block_outputs,
            block_id: block_id.into(),
            block_type: block_type.into(),
            chain_id: chain_id.into(),
            current_block_index,
            total_blocks,
            executed_at: Utc::now(),
            ambient,
        }
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.ambient.params
    }

    pub fn env(&self) -> &Map<String, Value> {
        &self.ambient.env
    }

    pub fn user(&self) -> Option<&Value> {
        self.ambient.user.as_ref()
    }

    pub fn request_body(&self) -> &Value {
        &self.ambient.request_body
    }

    /// Get a resolved input by name
    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }

    /// Get one output of a previously executed block
    pub fn block_output(&self, block_id: &str, name: &str) -> Option<&Value> {
        self.block_outputs.get(block_id)?.get(name)
    }
}
