//! Infrastructure layer - Engine, built-in blocks and ambient services

pub mod blocks;
pub mod engine;
pub mod logging;
pub mod observability;

pub use blocks::register_builtin_blocks;
pub use engine::BlockExecutionEngine;
