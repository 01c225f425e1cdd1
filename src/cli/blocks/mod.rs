//! Blocks command - prints the registered block definitions

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Print every registered definition as JSON
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);

    let registry = crate::create_registry(&config)?;

    println!("{}", serde_json::to_string_pretty(&registry.list_blocks())?);

    Ok(())
}
