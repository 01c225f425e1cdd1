//! Template resolution for block inputs
//!
//! Block inputs may bind to earlier block outputs or to the ambient request
//! data using whole-string references:
//! - `${blocks.<blockId>.<outputName>}`
//! - `${params.<name>}`
//! - `${env.<name>}`
//! - `${body.<dotted.path>}`

mod resolver;

pub use resolver::{
    TemplateRef, TemplateResolver, get_path, is_template, resolve_inputs, resolve_reference,
    resolve_value,
};
