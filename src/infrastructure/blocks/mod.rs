//! Built-in block adapters

pub mod database;
pub mod http;

use std::sync::Arc;

use tracing::info;

use crate::config::AppConfig;
use crate::domain::block::{BlockError, BlockRegistry};

pub use database::{DatabaseBlock, DATABASE_BLOCK_TYPE};
pub use http::{HttpBlock, HTTP_BLOCK_TYPE};

/// Register the built-in block types.
///
/// `http` is always available; `database` only when `database.url` is set.
pub fn register_builtin_blocks(
    registry: &BlockRegistry,
    config: &AppConfig,
) -> Result<(), BlockError> {
    registry.register(
        HTTP_BLOCK_TYPE,
        HttpBlock::definition(),
        Arc::new(HttpBlock::new(&config.http)?),
    );

    if config.database.url.is_some() {
        registry.register(
            DATABASE_BLOCK_TYPE,
            DatabaseBlock::definition(),
            Arc::new(DatabaseBlock::connect_lazy(&config.database)?),
        );
    } else {
        info!("database.url not set, database block disabled");
    }

    Ok(())
}
