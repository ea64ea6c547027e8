//! Validate a declared schema against a provider's feature matrix.
//!
//! Requires no database connection — this only checks that the declared
//! schema's constructs are expressible by the target provider.

use serde::Serialize;

use crate::commands::plan::load_declared_schema;
use crate::config::SchemaSyncConfig;
use crate::error::{Result, SchemaSyncError};
use crate::provider;

/// Outcome of a validate run.
#[derive(Debug, Serialize)]
pub struct ValidateReport {
    pub valid: bool,
    /// Human-readable violation messages, empty when `valid` is true.
    pub violations: Vec<String>,
}

pub fn execute(config: &SchemaSyncConfig) -> Result<ValidateReport> {
    let declared = load_declared_schema(&config.schema_paths)?;
    let provider = config.provider();

    match provider::validate_schema(&declared, provider) {
        Ok(()) => Ok(ValidateReport { valid: true, violations: Vec::new() }),
        Err(SchemaSyncError::ValidationFailed(violations)) => {
            Ok(ValidateReport { valid: false, violations: violations.iter().map(|v| v.to_string()).collect() })
        }
        Err(e) => Err(e),
    }
}
