//! Print the resolved configuration and the target provider's feature matrix.

use serde::Serialize;

use crate::config::SchemaSyncConfig;
use crate::provider::FeatureMatrix;

#[derive(Debug, Serialize)]
pub struct InfoReport {
    pub provider: String,
    pub schema_paths: Vec<String>,
    pub schema_name: String,
    pub allow_destructive: bool,
    pub allow_concurrent_index: bool,
    pub feature_matrix: FeatureMatrixReport,
}

#[derive(Debug, Serialize)]
pub struct FeatureMatrixReport {
    pub schemas: bool,
    pub sequences: bool,
    pub enums: bool,
    pub extensions: bool,
    pub concurrent_indexes: bool,
    pub advisory_locks: bool,
    pub stored_functions: bool,
    pub stored_procedures: bool,
    pub materialized_views: bool,
}

impl From<&FeatureMatrix> for FeatureMatrixReport {
    fn from(m: &FeatureMatrix) -> Self {
        Self {
            schemas: m.schemas,
            sequences: m.sequences,
            enums: m.enums,
            extensions: m.extensions,
            concurrent_indexes: m.concurrent_indexes,
            advisory_locks: m.advisory_locks,
            stored_functions: m.stored_functions,
            stored_procedures: m.stored_procedures,
            materialized_views: m.materialized_views,
        }
    }
}

pub fn execute(config: &SchemaSyncConfig) -> InfoReport {
    let provider = config.provider();
    let matrix = provider.feature_matrix();
    InfoReport {
        provider: provider.to_string(),
        schema_paths: config.schema_paths.clone(),
        schema_name: config.schema_name.clone(),
        allow_destructive: config.planner.allow_destructive,
        allow_concurrent_index: config.planner.allow_concurrent_index,
        feature_matrix: FeatureMatrixReport::from(&matrix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_reports_postgres_feature_matrix() {
        let mut config = SchemaSyncConfig::default();
        config.database.url = Some("postgres://localhost/db".to_string());
        let report = execute(&config);
        assert_eq!(report.provider, "postgres");
        assert!(report.feature_matrix.sequences);
    }

    #[test]
    fn test_info_reports_sqlite_feature_matrix() {
        let mut config = SchemaSyncConfig::default();
        config.database.url = Some("/tmp/a.sqlite3".to_string());
        let report = execute(&config);
        assert_eq!(report.provider, "sqlite");
        assert!(!report.feature_matrix.sequences);
    }
}
