//! Block type definitions
//!
//! A [`BlockDefinition`] is the static metadata registered alongside a handler.
//! It describes the block type's config template, its declared inputs and
//! outputs, the sub-operations it supports and an optional default timeout.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared input or output of a block type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockPort {
    /// Port name (key in the inputs/outputs mapping)
    pub name: String,

    /// Informal type name ("string", "number", "array", ...)
    #[serde(rename = "type")]
    pub port_type: String,

    /// Whether the port must be provided
    #[serde(default)]
    pub required: bool,

    /// Default value when not provided
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl BlockPort {
    /// Create an optional port
    pub fn new(name: impl Into<String>, port_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port_type: port_type.into(),
            required: false,
            default: None,
            description: None,
        }
    }

    /// Create a required port
    pub fn required(name: impl Into<String>, port_type: impl Into<String>) -> Self {
        Self {
            required: true,
            ..Self::new(name, port_type)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Sub-operation supported by a block type (e.g. `select` on a database block)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockFunction {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl BlockFunction {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
        }
    }
}

/// Static metadata for a block type. Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlockDefinition {
    /// Definition identifier
    pub id: String,

    /// Dispatch key used by block instances (`blockType`)
    #[serde(rename = "type")]
    pub block_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Config template documenting the accepted config shape
    #[serde(default)]
    pub config: Value,

    #[serde(default)]
    pub inputs: Vec<BlockPort>,

    #[serde(default)]
    pub outputs: Vec<BlockPort>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functions: Option<Vec<BlockFunction>>,

    /// Default timeout in milliseconds for every instance of this type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl BlockDefinition {
    /// Create a definition whose id equals its type key
    pub fn new(block_type: impl Into<String>) -> Self {
        let block_type = block_type.into();

        Self {
            id: block_type.clone(),
            block_type,
            description: None,
            config: Value::Object(Default::default()),
            inputs: Vec::new(),
            outputs: Vec::new(),
            functions: None,
            timeout: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_input(mut self, port: BlockPort) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: BlockPort) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn with_function(mut self, function: BlockFunction) -> Self {
        self.functions.get_or_insert_with(Vec::new).push(function);
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    /// Check whether the type supports the named sub-operation.
    /// Types that declare no functions accept any name.
    pub fn supports_function(&self, name: &str) -> bool {
        match &self.functions {
            Some(functions) => functions.iter().any(|f| f.name == name),
            None => true,
        }
    }
}
