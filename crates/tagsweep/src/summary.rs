//! Report writing and summary display
//!
//! Writes the per-resource step reports to a JSON file and prints a
//! summary table to stdout.

use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use tracing::info;

use crate::config::TeardownConfig;
use crate::orchestrator::ResourceReport;

/// (resources, steps, failed steps)
fn totals(reports: &[ResourceReport]) -> (usize, usize, usize) {
    let steps = reports.iter().map(|r| r.steps.len()).sum();
    let failed = reports
        .iter()
        .flat_map(|r| &r.steps)
        .filter(|s| !s.is_success())
        .count();
    (reports.len(), steps, failed)
}

fn report_document(
    config: &TeardownConfig,
    reports: &[ResourceReport],
    written_at: DateTime<Utc>,
) -> serde_json::Value {
    let (resources, steps, failed) = totals(reports);

    serde_json::json!({
        "tag_key": config.target.tag_key,
        "tag_value": config.target.tag_value,
        "region": config.region(),
        "dry_run": config.dry_run(),
        "written_at": written_at.to_rfc3339(),
        "success": failed == 0,
        "totals": {
            "resources": resources,
            "steps": steps,
            "failed_steps": failed,
        },
        "resources": reports,
    })
}

/// Write reports to the configured output file, if any
pub fn write_report(config: &TeardownConfig, reports: &[ResourceReport]) -> Result<()> {
    if let Some(output_path) = &config.flags.output {
        let output = report_document(config, reports, Utc::now());
        std::fs::write(output_path, serde_json::to_string_pretty(&output)?)?;
        info!(path = %output_path, "Report written");
    }

    Ok(())
}

/// Print one row per step to stdout
pub fn print_summary(reports: &[ResourceReport], dry_run: bool) {
    if reports.is_empty() {
        println!("\nNo tagged resources to tear down.");
        return;
    }

    let title = if dry_run { "Teardown Plan (dry run)" } else { "Teardown Results" };
    println!("\n=== {title} ===\n");

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Kind"),
            Cell::new("Result"),
            Cell::new("Step"),
            Cell::new("Error"),
        ]);

    for report in reports {
        for step in &report.steps {
            let result = if step.is_success() { "ok" } else { "FAILED" };
            let error = step
                .error
                .as_ref()
                .map(|e| format!("{}: {}", e.code, e.message))
                .unwrap_or_else(|| "-".to_string());

            table.add_row(vec![
                Cell::new(report.kind),
                Cell::new(result),
                Cell::new(&step.message),
                Cell::new(&error),
            ]);
        }
    }

    println!("{table}");

    let (resources, steps, failed) = totals(reports);
    println!("\n{resources} resource(s), {steps} step(s), {failed} failed");
}
