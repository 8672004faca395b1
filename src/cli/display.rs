//! Table rendering for status output.

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use crate::domain::models::{ProcessSpec, SupervisorSnapshot};

/// Render a status snapshot as a table.
pub fn status_table(snapshot: &SupervisorSnapshot) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "name", "state", "pid", "uptime", "failures", "health", "last exit",
        ]);

    for process in &snapshot.processes {
        table.add_row(vec![
            Cell::new(&process.name),
            Cell::new(process.state),
            Cell::new(process.pid.map_or_else(|| "-".to_string(), |p| p.to_string())),
            Cell::new(
                process
                    .uptime_secs
                    .map_or_else(|| "-".to_string(), |s| format!("{s}s")),
            ),
            Cell::new(process.failure_count),
            Cell::new(process.health),
            Cell::new(
                process
                    .last_exit
                    .map_or_else(|| "-".to_string(), |e| e.to_string()),
            ),
        ]);
    }

    table
}

/// Render validated definitions with their start order position.
pub fn spec_table<'a>(order: &[String], specs: impl Iterator<Item = &'a ProcessSpec>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "name", "command", "depends on", "health check"]);

    for spec in specs {
        let position = order
            .iter()
            .position(|n| n == &spec.name)
            .map_or_else(|| "-".to_string(), |i| (i + 1).to_string());
        table.add_row(vec![
            Cell::new(position),
            Cell::new(&spec.name),
            Cell::new(format!("{} {}", spec.command, spec.args.join(" "))),
            Cell::new(if spec.depends_on.is_empty() {
                "-".to_string()
            } else {
                spec.depends_on.join(", ")
            }),
            Cell::new(spec.health.as_ref().map_or("none", |_| "yes")),
        ]);
    }

    table
}
