//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "overseer")]
#[command(about = "Dependency-aware process supervisor", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start all defined processes and supervise them until interrupted
    Run(RunArgs),

    /// Validate process definitions and show the computed start order
    Check(CheckArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the process definitions file
    #[arg(short, long, default_value = "overseer.yaml", env = "OVERSEER_CONFIG")]
    pub config: PathBuf,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Path to the process definitions file
    #[arg(short, long, default_value = "overseer.yaml", env = "OVERSEER_CONFIG")]
    pub config: PathBuf,
}
