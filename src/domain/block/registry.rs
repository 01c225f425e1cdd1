//! Block registry
//!
//! Catalog mapping a block type key to its (definition, handler) pair. The
//! registry is an explicit object handed to the engine rather than process
//! state, so independent runs and tests can each own one.
//!
//! Registration is expected at startup; reads are safe from any number of
//! concurrent chain runs. Cloning shares the underlying catalog.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use super::definition::BlockDefinition;
use super::handler::BlockHandler;

#[derive(Clone)]
struct RegisteredBlock {
    definition: BlockDefinition,
    handler: Arc<dyn BlockHandler>,
}

#[derive(Default)]
struct RegistryInner {
    entries: HashMap<String, RegisteredBlock>,
    /// Type keys in first-registration order
    order: Vec<String>,
}

/// Thread-safe catalog of block types
#[derive(Clone, Default)]
pub struct BlockRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl std::fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockRegistry")
            .field("block_types", &self.list_block_types())
            .finish()
    }
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a block type. A later registration for the same type replaces
    /// the earlier one but keeps its listing position.
    pub fn register(
        &self,
        block_type: impl Into<String>,
        definition: BlockDefinition,
        handler: Arc<dyn BlockHandler>,
    ) {
        let block_type = block_type.into();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let entry = RegisteredBlock {
            definition,
            handler,
        };

        if inner.entries.insert(block_type.clone(), entry).is_some() {
            warn!(block_type = %block_type, "Replacing existing block registration");
        } else {
            debug!(block_type = %block_type, "Registered block type");
            inner.order.push(block_type);
        }
    }

    /// Get the definition registered for a type
    pub fn get_definition(&self, block_type: &str) -> Option<BlockDefinition> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .get(block_type)
            .map(|entry| entry.definition.clone())
    }

    /// Get the handler registered for a type
    pub fn get_handler(&self, block_type: &str) -> Option<Arc<dyn BlockHandler>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .get(block_type)
            .map(|entry| entry.handler.clone())
    }

    /// Get definition and handler in one lookup
    pub fn get(&self, block_type: &str) -> Option<(BlockDefinition, Arc<dyn BlockHandler>)> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .get(block_type)
            .map(|entry| (entry.definition.clone(), entry.handler.clone()))
    }

    pub fn has(&self, block_type: &str) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.entries.contains_key(block_type)
    }

    /// All registered definitions, in registration order
    pub fn list_blocks(&self) -> Vec<BlockDefinition> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .order
            .iter()
            .filter_map(|key| inner.entries.get(key))
            .map(|entry| entry.definition.clone())
            .collect()
    }

    /// All registered type keys, in registration order
    pub fn list_block_types(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.order.clone()
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
