//! Run command - executes a block chain from JSON files

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::info;

use crate::config::AppConfig;
use crate::domain::block::{BlockChain, ExecutionContext};
use crate::domain::chain::ChainExecutor;
use crate::infrastructure::logging;
use crate::infrastructure::observability::{init_metrics, MetricsConfig};
use crate::infrastructure::BlockExecutionEngine;

/// Arguments for the run command
#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Chain definition (JSON)
    #[arg(long)]
    pub chain: PathBuf,

    /// Request parameters (JSON object)
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// Request body (JSON)
    #[arg(long)]
    pub body: Option<PathBuf>,

    /// Authenticated user (JSON)
    #[arg(long)]
    pub user: Option<PathBuf>,

    /// Environment value exposed as `${env.KEY}`
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Expose the process environment as `${env.*}`
    #[arg(long)]
    pub inherit_env: bool,

    /// Print Prometheus metrics to stderr after the run
    #[arg(long)]
    pub print_metrics: bool,
}

/// Run a chain and print its result; exits with status 1 when it failed
pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);

    let metrics = init_metrics(&MetricsConfig {
        enabled: config.metrics.enabled || args.print_metrics,
    });

    let chain: BlockChain = read_json(&args.chain)?;
    chain
        .validate()
        .with_context(|| format!("Invalid chain in {}", args.chain.display()))?;

    let context = build_context(&args)?;
    let engine = BlockExecutionEngine::new(crate::create_registry(&config)?);

    info!(chain_id = %chain.id, "Running chain from {}", args.chain.display());

    let result = engine.execute_chain(&chain, &context).await;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if args.print_metrics {
        if let Some(metrics) = metrics {
            eprintln!("{}", metrics.render());
        }
    }

    if !result.success {
        std::process::exit(1);
    }

    Ok(())
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Assemble the ambient context from the command arguments
fn build_context(args: &RunArgs) -> anyhow::Result<ExecutionContext> {
    let mut context = ExecutionContext::new();

    if let Some(path) = &args.params {
        let params: Map<String, Value> = read_json(path)?;
        context = context.with_params(params);
    }

    if let Some(path) = &args.body {
        context = context.with_request_body(read_json(path)?);
    }

    if let Some(path) = &args.user {
        context = context.with_user(read_json(path)?);
    }

    if args.inherit_env {
        context = context.with_env(std::env::vars());
    }

    Ok(context.with_env(args.env.iter().cloned()))
}
