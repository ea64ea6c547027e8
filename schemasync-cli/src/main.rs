//! CLI entry point for the schemasync schema synchronization tool.
//! Provides clap-based command routing for the plan/apply/validate/verify/info
//! subcommands, exit code mapping based on error type, and PostgreSQL/SQLite dispatch.

mod output;

use std::process;

use clap::{Parser, Subcommand};
use colored::Colorize;

use schemasync_core::config::{CliOverrides, SchemaSyncConfig};
use schemasync_core::error::SchemaSyncError;
use schemasync_core::SchemaSync;

/// Print a report as JSON (when `--json` is active) or via a terminal formatter.
macro_rules! print_report {
    ($report:expr, $json:expr, $printer:path) => {
        if $json {
            println!(
                "{}",
                serde_json::to_string_pretty(&$report).expect("JSON serialization failed")
            );
        } else {
            $printer(&$report);
        }
    };
}

/// Top-level CLI definition with global flags and subcommand dispatch.
#[derive(Parser)]
#[command(
    name = "schemasync",
    about = "Declarative schema synchronization for PostgreSQL and SQLite",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file path
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Database URL (overrides config)
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Declared-schema SQL files or globs, comma-separated (overrides config)
    #[arg(long, value_name = "PATHS")]
    schema_paths: Option<String>,

    /// Target schema name, PostgreSQL only (overrides config)
    #[arg(long, value_name = "SCHEMA")]
    schema_name: Option<String>,

    /// Number of retries when connecting to the database
    #[arg(long, value_name = "N")]
    connect_retries: Option<u32>,

    /// SSL/TLS mode: disable, prefer, require
    #[arg(long, value_name = "MODE")]
    ssl_mode: Option<String>,

    /// Connection timeout in seconds (default: 30, 0 = no timeout)
    #[arg(long, value_name = "SECS")]
    connect_timeout: Option<u32>,

    /// Statement timeout in seconds (default: 0 = no limit)
    #[arg(long, value_name = "SECS")]
    statement_timeout: Option<u32>,

    /// TCP keepalive interval in seconds (0 to disable)
    #[arg(long, value_name = "SECS")]
    keepalive: Option<u32>,

    /// Allow apply to run plans that contain destructive changes
    #[arg(long, global = true)]
    allow_destructive: bool,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable verbose/debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// All available schemasync subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Compare the declared schema against the live database and print the resulting plan
    Plan,

    /// Build a plan, then execute it against the live database
    Apply,

    /// Validate the declared schema against the target provider's feature matrix
    Validate,

    /// Apply the declared schema to a scratch target and diff it back against itself
    Verify,

    /// Show resolved configuration and the target provider's feature matrix
    Info,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.json {
        "error"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    env_logger::Builder::new()
        .parse_env(env_logger::Env::default().default_filter_or(filter))
        .format_target(false)
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli).await {
        print_error(&e);
        process::exit(exit_code(&e));
    }
}

/// Map error types to differentiated exit codes.
fn exit_code(error: &SchemaSyncError) -> i32 {
    match error {
        SchemaSyncError::ConfigError(_) => 2,
        SchemaSyncError::ParserError { .. } => 2,
        SchemaSyncError::TomlError(_) => 2,
        SchemaSyncError::ValidationError { .. } => 3,
        SchemaSyncError::ValidationFailed(_) => 3,
        SchemaSyncError::IntrospectionError { .. } => 4,
        SchemaSyncError::IntrospectionAborted(_) => 4,
        SchemaSyncError::ConnectionLost { .. } => 4,
        SchemaSyncError::DatabaseError(_) => 4,
        SchemaSyncError::SqliteError(_) => 4,
        SchemaSyncError::MigrationError { .. } => 5,
        SchemaSyncError::LockError(_) => 6,
        SchemaSyncError::DiffError(_) => 1,
        SchemaSyncError::IoError(_) => 1,
    }
}

/// Build configuration and dispatch the chosen subcommand.
async fn run(cli: Cli) -> Result<(), SchemaSyncError> {
    let json_output = cli.json;
    let quiet = cli.quiet;

    let overrides = CliOverrides {
        url: cli.url,
        schema_paths: cli
            .schema_paths
            .map(|p| p.split(',').map(|s| s.trim().to_string()).collect()),
        schema_name: cli.schema_name,
        connect_retries: cli.connect_retries,
        ssl_mode: cli.ssl_mode,
        connect_timeout: cli.connect_timeout,
        statement_timeout: cli.statement_timeout,
        keepalive: cli.keepalive,
        allow_destructive: if cli.allow_destructive { Some(true) } else { None },
    };

    let config = SchemaSyncConfig::load(cli.config.as_deref(), &overrides)?;
    let sync = SchemaSync::new(config);

    match cli.command {
        Commands::Plan => {
            let report = sync.plan().await?;
            print_report!(report, json_output, output::print_plan_report);
        }
        Commands::Apply => {
            let report = sync.apply().await?;
            if !quiet || json_output {
                print_report!(report, json_output, output::print_apply_report);
            }
        }
        Commands::Validate => {
            let report = sync.validate()?;
            print_report!(report, json_output, output::print_validate_report);
        }
        Commands::Verify => {
            let report = sync.verify().await?;
            print_report!(report, json_output, output::print_verify_report);
        }
        Commands::Info => {
            let report = sync.info();
            print_report!(report, json_output, output::print_info_report);
        }
    }

    Ok(())
}

/// Print a formatted error message with actionable hints to stderr.
fn print_error(error: &SchemaSyncError) {
    eprintln!("{} {}", "ERROR:".red().bold(), error);

    match error {
        SchemaSyncError::ConfigError(_) => {
            eprintln!(
                "{}",
                "Hint: Check your schemasync.toml or set SCHEMASYNC_DATABASE_URL environment variable."
                    .dimmed()
            );
        }
        SchemaSyncError::ParserError { .. } => {
            eprintln!(
                "{}",
                "Hint: Check the declared schema SQL for syntax errors or unsupported statements."
                    .dimmed()
            );
        }
        SchemaSyncError::ValidationError { .. } | SchemaSyncError::ValidationFailed(_) => {
            eprintln!(
                "{}",
                "Hint: Run 'schemasync validate' for the full violation list, or switch provider."
                    .dimmed()
            );
        }
        SchemaSyncError::IntrospectionError { .. } | SchemaSyncError::IntrospectionAborted(_) => {
            eprintln!(
                "{}",
                "Hint: Verify the configured schema/database exists and the connection has catalog read access."
                    .dimmed()
            );
        }
        SchemaSyncError::MigrationError { .. } => {
            eprintln!(
                "{}",
                "Hint: Fix the offending statement in the declared schema and re-run 'schemasync plan'."
                    .dimmed()
            );
        }
        SchemaSyncError::LockError(_) => {
            eprintln!(
                "{}",
                "Hint: Another apply may be running against this schema. Wait and retry.".dimmed()
            );
        }
        SchemaSyncError::ConnectionLost { .. } | SchemaSyncError::DatabaseError(_) | SchemaSyncError::SqliteError(_) => {
            eprintln!(
                "{}",
                "Hint: Verify the database is running and connection details are correct.".dimmed()
            );
        }
        SchemaSyncError::TomlError(_) => {
            eprintln!("{}", "Hint: Check schemasync.toml for TOML syntax errors.".dimmed());
        }
        SchemaSyncError::DiffError(_) | SchemaSyncError::IoError(_) => {}
    }
}
