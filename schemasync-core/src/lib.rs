//! Declarative schema synchronization: compare a declared SQL schema against
//! a live PostgreSQL or SQLite database and produce (then optionally apply)
//! the `MigrationPlan` that reconciles them. There is no migration-file
//! history — the declared schema text is the single source of truth, and
//! drift is found by diffing two `SchemaModel`s rather than replaying a
//! versioned sequence of changes.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use schemasync_core::config::SchemaSyncConfig;
//! use schemasync_core::SchemaSync;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SchemaSyncConfig::load(None, &Default::default())?;
//! let sync = SchemaSync::new(config);
//! let report = sync.plan().await?;
//! println!("{} changes", report.plan.changeset.changes.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`model`] — the dialect-neutral `SchemaModel` and its entity types
//! - [`canon`] — canonicalization rules shared by the parser and introspector
//! - [`parser`] — turns declared SQL text into a `SchemaModel`
//! - [`introspect`] — reads a live database's catalog into a `SchemaModel`
//! - [`diff`] — compares two `SchemaModel`s into a `ChangeSet`
//! - [`plan`] — orders and renders a `ChangeSet` into a `MigrationPlan`
//! - [`provider`] — PostgreSQL/SQLite feature-matrix dispatch and validation
//! - [`config`] — configuration loading (TOML, env vars, CLI overrides)
//! - [`db`] — database connections, TLS, advisory locks
//! - [`commands`] — `plan`/`apply`/`validate`/`verify`/`info` command implementations
//! - [`error`] — error types

pub mod canon;
pub mod commands;
pub mod config;
pub mod db;
pub mod diff;
pub mod error;
pub mod expr;
pub mod introspect;
pub mod model;
pub mod parser;
pub mod plan;
pub mod provider;

pub use commands::apply::ApplyReport;
pub use commands::info::InfoReport;
pub use commands::plan::PlanReport;
pub use commands::validate::ValidateReport;
pub use commands::verify::VerifyReport;
pub use config::CliOverrides;

use config::SchemaSyncConfig;
use error::Result;

/// Main entry point for the schemasync library.
///
/// Create a `SchemaSync` instance with a config and use its methods to run
/// the `plan`/`apply`/`validate`/`verify`/`info` operations programmatically.
/// Unlike a connection-pool wrapper, `SchemaSync` doesn't hold an open
/// connection between calls — each operation connects, does its work, and
/// disconnects, since schema sync runs are infrequent and short-lived.
pub struct SchemaSync {
    pub config: SchemaSyncConfig,
}

impl SchemaSync {
    pub fn new(config: SchemaSyncConfig) -> Self {
        Self { config }
    }

    /// Compare the declared schema against the live database and build a plan.
    pub async fn plan(&self) -> Result<PlanReport> {
        commands::plan::execute(&self.config).await
    }

    /// Build a plan, then execute it against the live database.
    pub async fn apply(&self) -> Result<ApplyReport> {
        let report = self.plan().await?;
        commands::apply::execute(&self.config, &report.plan).await
    }

    /// Validate the declared schema against the target provider's feature matrix.
    /// Requires no database connection.
    pub fn validate(&self) -> Result<ValidateReport> {
        commands::validate::execute(&self.config)
    }

    /// Apply the declared schema to a scratch target and diff it back against
    /// itself, as a self-check of the round-trip property.
    pub async fn verify(&self) -> Result<VerifyReport> {
        commands::verify::execute(&self.config).await
    }

    /// Resolved configuration and the target provider's feature matrix.
    pub fn info(&self) -> InfoReport {
        commands::info::execute(&self.config)
    }
}
