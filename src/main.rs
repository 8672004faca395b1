//! Overseer CLI entry point.

use clap::Parser;

use overseer::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Run(args) => overseer::cli::commands::run::execute(args, cli.json).await,
        Commands::Check(args) => overseer::cli::commands::check::execute(&args, cli.json),
    };

    std::process::exit(code);
}
