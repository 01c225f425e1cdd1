//! Execution result records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::chain::{BlockChain, BlockInstance};
use super::context::{BlockOutputs, BlockOutputsMap};
use super::error::BlockError;

/// Outcome of one block invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockExecutionResult {
    pub block_id: String,
    pub block_type: String,
    pub success: bool,

    /// Handler outputs, or the fallback-derived mapping on failure
    pub outputs: BlockOutputs,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Duration in milliseconds; 0 for failures
    pub duration: u64,

    pub timestamp: DateTime<Utc>,
}

impl BlockExecutionResult {
    pub fn success(block: &BlockInstance, outputs: BlockOutputs, duration_ms: u64) -> Self {
        Self {
            block_id: block.id.clone(),
            block_type: block.block_type.clone(),
            success: true,
            outputs,
            error: None,
            duration: duration_ms,
            timestamp: Utc::now(),
        }
    }

    /// Failed invocation. Outputs are `{ "result": fallback }` when the block
    /// declares a fallback, empty otherwise.
    pub fn failure(block: &BlockInstance, error: &BlockError) -> Self {
        Self {
            block_id: block.id.clone(),
            block_type: block.block_type.clone(),
            success: false,
            outputs: fallback_outputs(block.fallback.as_ref()),
            error: Some(error.to_string()),
            duration: 0,
            timestamp: Utc::now(),
        }
    }
}

/// Build the output mapping substituted for a failed block
pub fn fallback_outputs(fallback: Option<&Value>) -> BlockOutputs {
    let mut outputs = BlockOutputs::new();

    if let Some(value) = fallback {
        outputs.insert("result".to_string(), value.clone());
    }

    outputs
}

/// Aggregated chain outputs, `{ "blocks": { <id>: <outputs> } }`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChainOutputs {
    pub blocks: Map<String, Value>,
}

impl ChainOutputs {
    /// Entry for every declared block, in declaration order; blocks that never
    /// ran report an empty mapping.
    pub fn aggregate(chain: &BlockChain, block_outputs: &BlockOutputsMap) -> Self {
        let mut blocks = Map::new();

        for block in &chain.blocks {
            let outputs = block_outputs.get(&block.id).cloned().unwrap_or_default();
            blocks.insert(block.id.clone(), Value::Object(outputs));
        }

        Self { blocks }
    }

    /// Outputs of one block
    pub fn block(&self, block_id: &str) -> Option<&BlockOutputs> {
        self.blocks.get(block_id)?.as_object()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Outcome of a chain run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockChainExecutionResult {
    pub chain_id: String,

    /// False as soon as any block failed, whether or not execution continued
    pub success: bool,

    /// One entry per executed block, in execution order
    pub results: Vec<BlockExecutionResult>,

    pub outputs: ChainOutputs,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Total duration in milliseconds
    pub total_duration: u64,

    pub timestamp: DateTime<Utc>,
}

impl BlockChainExecutionResult {
    /// Get the result of a block by id
    pub fn result(&self, block_id: &str) -> Option<&BlockExecutionResult> {
        self.results.iter().find(|r| r.block_id == block_id)
    }

    /// Results of blocks that failed
    pub fn failed_results(&self) -> impl Iterator<Item = &BlockExecutionResult> {
        self.results.iter().filter(|r| !r.success)
    }
}
