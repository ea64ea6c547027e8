//! Self-check the round-trip property: apply the declared schema to a throwaway
//! target, introspect it back, and diff against the declared model. A clean
//! verify run means `plan` + `apply` against a fresh database would produce
//! exactly the declared schema with no leftover discrepancy.

use serde::Serialize;

use crate::commands::plan::load_declared_schema;
use crate::config::SchemaSyncConfig;
use crate::db;
use crate::diff::{compute_diff, ChangeSet};
use crate::error::Result;
use crate::model::SchemaModel;
use crate::plan::render::render_plan as render_migration_plan;
use crate::provider::Provider;

/// Outcome of a verify run.
#[derive(Debug, Serialize)]
pub struct VerifyReport {
    /// True when applying the declared schema to an empty database and
    /// reading it back reproduces it exactly.
    pub round_trip_clean: bool,
    /// The residual diff, if any, between declared and apply-then-introspect.
    pub residual: ChangeSet,
}

pub async fn execute(config: &SchemaSyncConfig) -> Result<VerifyReport> {
    let declared = load_declared_schema(&config.schema_paths)?;

    let provider = config.provider();
    let reintrospected = match provider {
        Provider::Sqlite => verify_sqlite(&declared).await?,
        Provider::Postgres => verify_postgres(config, &declared).await?,
    };

    let residual = compute_diff(&declared, &reintrospected, provider);
    Ok(VerifyReport { round_trip_clean: residual.is_empty(), residual })
}

async fn verify_sqlite(declared: &SchemaModel) -> Result<SchemaModel> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("verify.sqlite3");
    let client = db::SqliteClient::open(path.to_str().unwrap())?;

    let empty = SchemaModel::new();
    let migration = render_migration_plan(&compute_diff(declared, &empty, Provider::Sqlite), Provider::Sqlite);
    for bucket in [&migration.transactional, &migration.concurrent, &migration.deferred] {
        if bucket.is_empty() {
            continue;
        }
        let sql: String = bucket.iter().map(|s| s.sql.clone()).collect::<Vec<_>>().join("\n");
        client.batch_execute(&sql).await?;
    }

    let conn = rusqlite::Connection::open(&path)?;
    crate::introspect::sqlite::introspect_sqlite(&conn)
}

async fn verify_postgres(config: &SchemaSyncConfig, declared: &SchemaModel) -> Result<SchemaModel> {
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

    let scratch_schema = format!("schemasync_verify_{}", std::process::id());
    let create_schema_sql = format!("CREATE SCHEMA {};", db::quote_ident(&scratch_schema));
    client.batch_execute(&create_schema_sql).await?;

    let result = run_postgres_verify(&client, declared, &scratch_schema).await;

    let drop_schema_sql = format!("DROP SCHEMA {} CASCADE;", db::quote_ident(&scratch_schema));
    if let Err(e) = client.batch_execute(&drop_schema_sql).await {
        log::warn!("Failed to drop scratch verify schema {}: {}", scratch_schema, e);
    }

    result
}

async fn run_postgres_verify(client: &tokio_postgres::Client, declared: &SchemaModel, scratch_schema: &str) -> Result<SchemaModel> {
    client.batch_execute(&format!("SET search_path TO {};", db::quote_ident(scratch_schema))).await?;

    let empty = SchemaModel::new();
    let migration = render_migration_plan(&compute_diff(declared, &empty, Provider::Postgres), Provider::Postgres);
    if !migration.transactional.is_empty() {
        let sql: String = migration.transactional.iter().map(|s| s.sql.clone()).collect::<Vec<_>>().join("\n");
        db::execute_in_transaction(client, &sql).await?;
    }
    for stmt in &migration.concurrent {
        db::execute_raw(client, &stmt.sql).await?;
    }
    if !migration.deferred.is_empty() {
        let sql: String = migration.deferred.iter().map(|s| s.sql.clone()).collect::<Vec<_>>().join("\n");
        db::execute_in_transaction(client, &sql).await?;
    }

    crate::introspect::postgres::introspect_postgres(client, scratch_schema).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_verify_sqlite_round_trip_clean_for_simple_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);").unwrap();
        let mut config = SchemaSyncConfig::default();
        config.schema_paths = vec![file.path().to_str().unwrap().to_string()];
        config.database.url = Some("/tmp/doesnotmatter.sqlite3".to_string());

        let report = execute(&config).await.unwrap();
        assert!(report.round_trip_clean, "residual: {:?}", report.residual);
    }
}
