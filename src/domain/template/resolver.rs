//! Template reference parsing and resolution
//!
//! A string input is a template reference only when the whole string is one
//! of:
//! - `${blocks.<blockId>.<outputName>}` - output of an earlier block
//! - `${params.<name>}` - request parameter
//! - `${env.<name>}` - environment value
//! - `${body.<dotted.path>}` - request body field, nested paths allowed
//!
//! Patterns are tried in that order. Anything else, including a reference
//! embedded in a longer string, is returned verbatim. Unresolvable references
//! yield "undefined" (`None`) rather than an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::domain::block::{BlockOutputsMap, ExecutionContext};

/// `${blocks.<blockId>.<outputName>}`
static BLOCK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\{blocks\.([^.}]+)\.([^}]+)\}$").unwrap());

/// `${params.<name>}`
static PARAMS_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\{params\.([^}]+)\}$").unwrap());

/// `${env.<name>}`
static ENV_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\$\{env\.([^}]+)\}$").unwrap());

/// `${body.<path>}`
static BODY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\$\{body\.([^}]+)\}$").unwrap());

/// A parsed template reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    Block { block_id: String, output: String },
    Param(String),
    Env(String),
    Body(String),
}

impl TemplateRef {
    /// Parse a full-string template reference
    pub fn parse(template: &str) -> Option<Self> {
        if let Some(caps) = BLOCK_PATTERN.captures(template) {
            return Some(Self::Block {
                block_id: caps[1].to_string(),
                output: caps[2].to_string(),
            });
        }

        if let Some(caps) = PARAMS_PATTERN.captures(template) {
            return Some(Self::Param(caps[1].to_string()));
        }

        if let Some(caps) = ENV_PATTERN.captures(template) {
            return Some(Self::Env(caps[1].to_string()));
        }

        BODY_PATTERN
            .captures(template)
            .map(|caps| Self::Body(caps[1].to_string()))
    }

    /// Resolve against accumulated outputs and the ambient context.
    /// `None` means the reference points at nothing.
    pub fn resolve(
        &self,
        block_outputs: &BlockOutputsMap,
        context: &ExecutionContext,
    ) -> Option<Value> {
        match self {
            Self::Block { block_id, output } => block_outputs.get(block_id)?.get(output).cloned(),
            Self::Param(name) => context.params.get(name).cloned(),
            Self::Env(name) => context.env.get(name).cloned(),
            Self::Body(path) => get_path(&context.request_body, path).cloned(),
        }
    }

    /// Id of the block this reference reads from, if any
    pub fn block_id(&self) -> Option<&str> {
        match self {
            Self::Block { block_id, .. } => Some(block_id),
            _ => None,
        }
    }
}

/// Resolves block input values for one block invocation
#[derive(Debug, Clone, Copy)]
pub struct TemplateResolver<'a> {
    block_outputs: &'a BlockOutputsMap,
    context: &'a ExecutionContext,
}

impl<'a> TemplateResolver<'a> {
    pub fn new(block_outputs: &'a BlockOutputsMap, context: &'a ExecutionContext) -> Self {
        Self {
            block_outputs,
            context,
        }
    }

    /// Resolve a value.
    ///
    /// Objects are rebuilt key by key in their original order. Arrays and
    /// non-string scalars pass through untouched; array elements are never
    /// resolved. Unresolvable references become `null`.
    pub fn resolve(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => self.resolve_string(s).unwrap_or(Value::Null),
            Value::Object(map) => Value::Object(self.resolve_object(map)),
            _ => value.clone(),
        }
    }

    /// Resolve every entry of an object
    pub fn resolve_object(&self, map: &Map<String, Value>) -> Map<String, Value> {
        map.iter()
            .map(|(key, value)| (key.clone(), self.resolve(value)))
            .collect()
    }

    /// Resolve a single string.
    ///
    /// A string that is not a template reference comes back verbatim; `None`
    /// means a reference that resolves to nothing.
    pub fn resolve_string(&self, value: &str) -> Option<Value> {
        match TemplateRef::parse(value) {
            Some(reference) => reference.resolve(self.block_outputs, self.context),
            None => Some(Value::String(value.to_string())),
        }
    }
}

/// Resolve a single string against outputs and context
pub fn resolve_reference(
    value: &str,
    block_outputs: &BlockOutputsMap,
    context: &ExecutionContext,
) -> Option<Value> {
    TemplateResolver::new(block_outputs, context).resolve_string(value)
}

/// Resolve an arbitrary value against outputs and context
pub fn resolve_value(
    value: &Value,
    block_outputs: &BlockOutputsMap,
    context: &ExecutionContext,
) -> Value {
    TemplateResolver::new(block_outputs, context).resolve(value)
}

/// Resolve a block's declared inputs
pub fn resolve_inputs(
    inputs: &Map<String, Value>,
    block_outputs: &BlockOutputsMap,
    context: &ExecutionContext,
) -> Map<String, Value> {
    TemplateResolver::new(block_outputs, context).resolve_object(inputs)
}

/// Extract a value by dotted path; numeric segments index into arrays
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;

    for part in path.split('.') {
        current = match current {
            Value::Object(obj) => obj.get(part)?,
            Value::Array(arr) => arr.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Check whether a string is a full template reference
pub fn is_template(value: &str) -> bool {
    TemplateRef::parse(value).is_some()
}
