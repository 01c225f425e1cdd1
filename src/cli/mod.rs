//! CLI module for the PMP Block Engine
//!
//! Subcommands:
//! - `run`: execute a block chain and print the result
//! - `blocks`: list the registered block types

pub mod blocks;
pub mod run;

use clap::{Parser, Subcommand};

/// PMP Block Engine - Run declarative chains of pluggable blocks
#[derive(Parser)]
#[command(name = "pmp-block-engine")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Execute a block chain
    Run(run::RunArgs),

    /// List registered block definitions
    Blocks,
}
