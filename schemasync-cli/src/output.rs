//! Terminal output formatting for all schemasync commands.
//! Uses comfy-table for tabular output and colored for
//! severity-aware terminal styling.

use colored::Colorize;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};

use schemasync_core::commands::apply::ApplyReport;
use schemasync_core::commands::info::InfoReport;
use schemasync_core::commands::plan::PlanReport;
use schemasync_core::commands::validate::ValidateReport;
use schemasync_core::commands::verify::VerifyReport;

/// Print a plan's three buckets as a banner-delimited preview, same grouping
/// `MigrationPlan::render_text` uses but with per-statement coloring: green
/// for additive statements, red for `DROP`, yellow for everything else.
pub fn print_plan_report(report: &PlanReport) {
    let migration = &report.plan.migration;

    if migration.is_empty() {
        println!("{}", "No changes. Declared schema matches the live database.".green().bold());
        return;
    }

    println!(
        "{}",
        format!("{} change(s) detected:", report.plan.changeset.changes.len())
            .yellow()
            .bold()
    );
    println!();

    for (banner, bucket) in [
        ("transactional", &migration.transactional),
        ("concurrent", &migration.concurrent),
        ("deferred", &migration.deferred),
    ] {
        if bucket.is_empty() {
            continue;
        }
        println!("{}", format!("-- {}", banner).bold());
        for stmt in bucket {
            println!("  {}", color_statement(&stmt.sql));
        }
        println!();
    }

    if !report.plan.is_additive_only() {
        println!(
            "{}",
            "This plan contains destructive changes. Run 'apply' with --allow-destructive."
                .red()
                .bold()
        );
    }
}

fn color_statement(sql: &str) -> colored::ColoredString {
    if sql.starts_with("DROP") {
        sql.red()
    } else if sql.starts_with("CREATE") || sql.starts_with("ALTER TABLE") && sql.contains("ADD") {
        sql.green()
    } else {
        sql.yellow()
    }
}

/// Print an apply report summary.
pub fn print_apply_report(report: &ApplyReport) {
    let total = report.transactional_statements + report.concurrent_statements + report.deferred_statements;
    if total == 0 {
        println!("{}", "Nothing to apply. Schema is already up to date.".green());
        return;
    }

    println!(
        "{}",
        format!(
            "Applied {} statement(s) (execution time {}ms)",
            total, report.total_time_ms
        )
        .green()
        .bold()
    );
    println!(
        "  {} transactional, {} concurrent, {} deferred",
        report.transactional_statements, report.concurrent_statements, report.deferred_statements
    );
}

/// Print a validate report with colored violation list.
pub fn print_validate_report(report: &ValidateReport) {
    if report.valid {
        println!("{}", "Schema is valid for the target provider.".green().bold());
        return;
    }

    println!(
        "{}",
        format!("Schema is invalid: {} violation(s)", report.violations.len())
            .red()
            .bold()
    );
    for v in &report.violations {
        println!("  {} {}", "✗".red(), v);
    }
}

/// Print a verify report, including the residual diff when the round-trip isn't clean.
pub fn print_verify_report(report: &VerifyReport) {
    if report.round_trip_clean {
        println!(
            "{}",
            "Round-trip verified: applying the declared schema and reading it back matches exactly."
                .green()
                .bold()
        );
        return;
    }

    println!(
        "{}",
        format!(
            "Round-trip FAILED: {} residual difference(s) after apply + introspect.",
            report.residual.changes.len()
        )
        .red()
        .bold()
    );
    for change in &report.residual.changes {
        println!("  {} {:?}", "!".yellow(), change);
    }
}

/// Print resolved configuration and the target provider's feature matrix as a table.
pub fn print_info_report(report: &InfoReport) {
    println!("{}", format!("Provider: {}", report.provider).bold());
    println!("Schema name: {}", report.schema_name);
    println!("Schema paths: {}", report.schema_paths.join(", "));
    println!(
        "Planner: allow_destructive={}, allow_concurrent_index={}",
        report.allow_destructive, report.allow_concurrent_index
    );
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![Cell::new("Feature"), Cell::new("Supported")]);

    let m = &report.feature_matrix;
    for (name, supported) in [
        ("schemas", m.schemas),
        ("sequences", m.sequences),
        ("enums", m.enums),
        ("extensions", m.extensions),
        ("concurrent indexes", m.concurrent_indexes),
        ("advisory locks", m.advisory_locks),
        ("stored functions", m.stored_functions),
        ("stored procedures", m.stored_procedures),
        ("materialized views", m.materialized_views),
    ] {
        let cell = if supported {
            "yes".green().to_string()
        } else {
            "no".dimmed().to_string()
        };
        table.add_row(vec![Cell::new(name), Cell::new(cell)]);
    }

    println!("{table}");
}
