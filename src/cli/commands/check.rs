//! `overseer check`: validate definitions and print the start order.

use serde_json::json;

use crate::cli::types::CheckArgs;
use crate::cli::{display, EXIT_CONFIG_INVALID, EXIT_OK};
use crate::infrastructure::config::ConfigLoader;
use crate::services::{DependencyScheduler, SpecRegistry};

pub fn execute(args: &CheckArgs, json_output: bool) -> i32 {
    let config = match ConfigLoader::load_from_file(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configuration error: {err:#}");
            return EXIT_CONFIG_INVALID;
        }
    };

    let registry = match SpecRegistry::load(config.processes) {
        Ok(registry) => registry,
        Err(err) => {
            eprintln!("Configuration error: {err}");
            return EXIT_CONFIG_INVALID;
        }
    };

    let scheduler = DependencyScheduler::new(&registry);
    let order = scheduler.start_order();

    if json_output {
        let payload = json!({
            "valid": true,
            "processes": registry.len(),
            "start_order": order,
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => {
                eprintln!("Failed to render output: {err}");
                return EXIT_CONFIG_INVALID;
            }
        }
    } else {
        println!("{}", display::spec_table(&order, registry.iter()));
        println!("Start order: {}", order.join(" -> "));
    }

    EXIT_OK
}
