//! Apply a migration plan to the live database.

use serde::Serialize;

use crate::config::SchemaSyncConfig;
use crate::db;
use crate::error::{Result, SchemaSyncError};
use crate::plan::Plan;
use crate::provider::Provider;

/// Report returned after an apply run.
#[derive(Debug, Serialize)]
pub struct ApplyReport {
    /// Number of statements executed in the transactional bucket.
    pub transactional_statements: usize,
    /// Number of statements executed in the concurrent bucket.
    pub concurrent_statements: usize,
    /// Number of statements executed in the deferred (post-migration) bucket.
    pub deferred_statements: usize,
    /// Total execution time across all three buckets in milliseconds.
    pub total_time_ms: i32,
}

/// Apply `plan`'s `MigrationPlan` to the database identified by `config`.
///
/// Refuses to run when the plan contains a destructive change and
/// `config.planner.allow_destructive` is false. PostgreSQL runs take an
/// advisory lock scoped to the schema name for the duration of the apply so
/// two concurrent `apply` invocations against the same schema serialize
/// instead of racing.
pub async fn execute(config: &SchemaSyncConfig, plan: &Plan) -> Result<ApplyReport> {
    if !plan.is_additive_only() && !config.planner.allow_destructive {
        return Err(SchemaSyncError::ValidationError {
            code: "E-APPLY-001".to_string(),
            message: "plan contains destructive changes; re-run with --allow-destructive".to_string(),
            object: None,
            suggestion: Some("review the plan output, then pass --allow-destructive".to_string()),
        });
    }

    match config.provider() {
        Provider::Postgres => apply_postgres(config, plan).await,
        Provider::Sqlite => apply_sqlite(config, plan).await,
    }
}

async fn apply_postgres(config: &SchemaSyncConfig, plan: &Plan) -> Result<ApplyReport> {
    let conn_string = config.connection_string()?;
    let client = db::connect_with_full_config(
        &conn_string,
        &config.database.ssl_mode,
        config.database.connect_retries,
        config.database.connect_timeout_secs,
        config.database.statement_timeout_secs,
        config.database.keepalive_secs,
    )
    .await?;

    let lock_name = format!("schemasync:{}", config.schema_name);
    db::acquire_advisory_lock(&client, &lock_name).await?;

    let result = run_postgres_buckets(&client, &plan.migration).await;

    if let Err(e) = db::release_advisory_lock(&client, &lock_name).await {
        log::warn!("Failed to release advisory lock: {}", e);
    }

    result
}

async fn run_postgres_buckets(client: &tokio_postgres::Client, migration: &crate::plan::MigrationPlan) -> Result<ApplyReport> {
    let mut total_ms = 0;

    if !migration.transactional.is_empty() {
        let sql: String = migration.transactional.iter().map(|s| s.sql.clone()).collect::<Vec<_>>().join("\n");
        total_ms += db::execute_in_transaction(client, &sql).await?;
    }

    for stmt in &migration.concurrent {
        total_ms += db::execute_raw(client, &stmt.sql).await?;
    }

    if !migration.deferred.is_empty() {
        let sql: String = migration.deferred.iter().map(|s| s.sql.clone()).collect::<Vec<_>>().join("\n");
        total_ms += db::execute_in_transaction(client, &sql).await?;
    }

    Ok(ApplyReport {
        transactional_statements: migration.transactional.len(),
        concurrent_statements: migration.concurrent.len(),
        deferred_statements: migration.deferred.len(),
        total_time_ms: total_ms,
    })
}

async fn apply_sqlite(config: &SchemaSyncConfig, plan: &Plan) -> Result<ApplyReport> {
    let path = config.database.url.clone().unwrap_or_default();
    let client = db::SqliteClient::open(&path)?;
    let migration = &plan.migration;
    let mut total_ms = 0;

    if !migration.transactional.is_empty() {
        let sql: String = migration.transactional.iter().map(|s| s.sql.clone()).collect::<Vec<_>>().join("\n");
        total_ms += client.execute_in_transaction(&sql).await?;
    }
    // SQLite has no notion of "outside a transaction" DDL or deferred constraint
    // validation; concurrent/deferred statements run as ordinary batches in order.
    for stmt in &migration.concurrent {
        total_ms += client.batch_execute(&stmt.sql).await?;
    }
    if !migration.deferred.is_empty() {
        let sql: String = migration.deferred.iter().map(|s| s.sql.clone()).collect::<Vec<_>>().join("\n");
        total_ms += client.batch_execute(&sql).await?;
    }

    Ok(ApplyReport {
        transactional_statements: migration.transactional.len(),
        concurrent_statements: migration.concurrent.len(),
        deferred_statements: migration.deferred.len(),
        total_time_ms: total_ms,
    })
}
