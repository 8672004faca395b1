//! `overseer run`: load definitions, start everything, supervise until
//! interrupted, then shut down gracefully.

use std::sync::Arc;
use tracing::{error, info};

use crate::cli::types::RunArgs;
use crate::cli::{display, EXIT_CONFIG_INVALID, EXIT_OK, EXIT_PROCESS_FAILED};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging;
use crate::services::{SpecRegistry, Supervisor};

pub async fn execute(args: RunArgs, json: bool) -> i32 {
    let config = match ConfigLoader::load_from_file(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configuration error: {err:#}");
            return EXIT_CONFIG_INVALID;
        }
    };

    logging::init(&config.logging);

    let registry = match SpecRegistry::load(config.processes.clone()) {
        Ok(registry) => Arc::new(registry),
        Err(err) => {
            error!(error = %err, "Invalid process definitions");
            eprintln!("Configuration error: {err}");
            return EXIT_CONFIG_INVALID;
        }
    };

    let (supervisor, handle) = Supervisor::new(registry, config);
    let run_task = tokio::spawn(supervisor.run());

    if let Err(err) = handle.start_all().await {
        error!(error = %err, "Failed to start processes");
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Interrupt received, shutting down"),
        Err(err) => error!(error = %err, "Failed to listen for interrupt; shutting down"),
    }

    if let Err(err) = handle.stop_all().await {
        error!(error = %err, "Stop request failed");
    }

    let outcome = match run_task.await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(error = %err, "Supervisor task panicked");
            return EXIT_PROCESS_FAILED;
        }
    };

    // The outcome carries the settled snapshot, so the final table shows
    // stopped/failed states, not the last pre-shutdown view.
    if json {
        match serde_json::to_string_pretty(&outcome.snapshot) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => error!(error = %err, "Failed to render snapshot"),
        }
    } else {
        println!("{}", display::status_table(&outcome.snapshot));
    }

    if outcome.clean() {
        EXIT_OK
    } else {
        eprintln!("Permanently failed: {}", outcome.failed.join(", "));
        EXIT_PROCESS_FAILED
    }
}
