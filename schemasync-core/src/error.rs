//! Error types for schema synchronization operations.

use thiserror::Error;

/// Extract the full error message from a tokio_postgres::Error,
/// including the underlying DbError details that Display hides.
pub fn format_db_error(e: &tokio_postgres::Error) -> String {
    // The source chain contains the actual DbError with message/detail/hint
    if let Some(db_err) = e.as_db_error() {
        let mut msg = db_err.message().to_string();
        if let Some(detail) = db_err.detail() {
            msg.push_str(&format!("\n  Detail: {}", detail));
        }
        if let Some(hint) = db_err.hint() {
            msg.push_str(&format!("\n  Hint: {}", hint));
        }
        if let Some(position) = db_err.position() {
            msg.push_str(&format!("\n  Position: {:?}", position));
        }
        return msg;
    }
    // Fallback: walk the source chain
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(s) = source {
        msg.push_str(&format!(": {}", s));
        source = s.source();
    }
    // Append connection-loss context when the connection is closed
    if e.is_closed() {
        msg.push_str("\n  Note: The database connection was closed unexpectedly. This may indicate a network issue or server restart.");
    }
    msg
}

/// Where in declared-SQL text a parser error occurred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: Option<usize>,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}", line),
            None => write!(f, "unknown location"),
        }
    }
}

/// Kind of declared-SQL parser failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserErrorKind {
    SyntaxError,
    UnsupportedStatement,
    InvalidEnumType,
    AmbiguousConstraint,
}

impl std::fmt::Display for ParserErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParserErrorKind::SyntaxError => "syntax error",
            ParserErrorKind::UnsupportedStatement => "unsupported statement",
            ParserErrorKind::InvalidEnumType => "invalid enum type",
            ParserErrorKind::AmbiguousConstraint => "ambiguous constraint",
        };
        write!(f, "{}", s)
    }
}

/// All error types that schema synchronization operations can produce.
#[derive(Error, Debug)]
pub enum SchemaSyncError {
    /// Invalid or missing configuration (TOML parse errors, missing required fields, etc.).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Declared SQL failed to parse, or used an unsupported/explicitly-rejected statement.
    #[error("Parser error ({kind}) at {location}: {message}")]
    ParserError {
        kind: ParserErrorKind,
        message: String,
        location: SourceLocation,
    },

    /// A declared schema uses a feature the target provider's feature matrix does not support.
    #[error("Validation error [{code}]{}: {message}{}",
        object.as_ref().map(|o| format!(" ({})", o)).unwrap_or_default(),
        suggestion.as_ref().map(|s| format!(" — {}", s)).unwrap_or_default())]
    ValidationError {
        code: String,
        message: String,
        object: Option<String>,
        suggestion: Option<String>,
    },

    /// One or more validation violations were collected; reported together, not fail-fast.
    #[error("Validation failed with {} violation(s):\n{}", .0.len(), format_violations(.0))]
    ValidationFailed(Vec<SchemaSyncError>),

    /// A catalog query failed while introspecting a single entity kind from the live database.
    #[error("Introspection error while reading {entity}: {reason}")]
    IntrospectionError { entity: String, reason: String },

    /// Catalog discovery itself failed (not a single entity kind) — introspection aborted.
    #[error("Introspection aborted: {0}")]
    IntrospectionAborted(String),

    /// An internal invariant was violated while computing a schema diff.
    ///
    /// The diff engine is a pure function over immutable input; this should never be
    /// observed in practice and indicates a programmer error.
    #[error("Internal diff error: {0}")]
    DiffError(String),

    /// A DDL statement failed during plan execution. Carries the offending statement verbatim.
    #[error("Migration failed while executing:\n{statement}\nReason: {reason}")]
    MigrationError { statement: String, reason: String },

    /// Could not acquire the cross-session advisory lock used to serialize migration runs.
    #[error("Failed to acquire advisory lock: {0}")]
    LockError(String),

    /// The database connection was lost during an operation.
    #[error("Connection lost during {operation}: {detail}")]
    ConnectionLost { operation: String, detail: String },

    /// A PostgreSQL query or connection operation failed.
    #[error("Database error: {}", format_db_error(.0))]
    DatabaseError(#[from] tokio_postgres::Error),

    /// A SQLite query or connection operation failed.
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A filesystem I/O operation failed (reading the schema file, config, etc.).
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML configuration file failed to parse.
    #[error("Config file parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

fn format_violations(violations: &[SchemaSyncError]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convenience type alias for `Result<T, SchemaSyncError>`.
pub type Result<T> = std::result::Result<T, SchemaSyncError>;

impl SchemaSyncError {
    pub fn parser(kind: ParserErrorKind, message: impl Into<String>, line: Option<usize>) -> Self {
        SchemaSyncError::ParserError {
            kind,
            message: message.into(),
            location: SourceLocation { line },
        }
    }

    pub fn validation(
        code: impl Into<String>,
        message: impl Into<String>,
        object: Option<String>,
        suggestion: Option<String>,
    ) -> Self {
        SchemaSyncError::ValidationError {
            code: code.into(),
            message: message.into(),
            object,
            suggestion,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_error_display() {
        let err = SchemaSyncError::parser(ParserErrorKind::SyntaxError, "unexpected token", Some(12));
        let s = err.to_string();
        assert!(s.contains("syntax error"));
        assert!(s.contains("line 12"));
        assert!(s.contains("unexpected token"));
    }

    #[test]
    fn test_validation_error_display_with_object_and_suggestion() {
        let err = SchemaSyncError::validation(
            "E-SEQ-001",
            "sequences are not supported",
            Some("users_id_seq".to_string()),
            Some("drop the sequence or switch provider".to_string()),
        );
        let s = err.to_string();
        assert!(s.contains("E-SEQ-001"));
        assert!(s.contains("users_id_seq"));
        assert!(s.contains("drop the sequence"));
    }

    #[test]
    fn test_validation_failed_lists_all_violations() {
        let err = SchemaSyncError::ValidationFailed(vec![
            SchemaSyncError::validation("E-1", "first", None, None),
            SchemaSyncError::validation("E-2", "second", None, None),
        ]);
        let s = err.to_string();
        assert!(s.contains("2 violation"));
        assert!(s.contains("E-1"));
        assert!(s.contains("E-2"));
    }
}
