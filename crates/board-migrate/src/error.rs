//! Error types for the migration library.

use thiserror::Error;

/// Main error type for schema and data migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (bad env file, missing fields, conflicting flags)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Table or column name outside the allowed character class, or reserved
    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    /// Board table already exists on the database
    #[error("Table {0} already exists")]
    DuplicateTable(String),

    /// Table missing on the side that was expected to have it
    #[error("Table {0} does not exist")]
    TableNotFound(String),

    /// Source and target share no column names
    #[error("Table {0} has no columns in common between source and target")]
    NoCommonColumns(String),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Connection dropped or became unusable while running a statement
    #[error("Connection lost ({context}): {message}")]
    ConnectionLost { context: String, message: String },

    /// Statement failed on the database
    #[error("Query failed ({context}): {message}")]
    Query { context: String, message: String },

    /// Data transfer failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// DDL or versioned schema migration failed
    #[error("Schema migration failed: {0}")]
    Schema(String),

    /// Accumulated row and table errors went past the configured ceiling
    #[error("Too many errors ({count} > {max}), migration aborted")]
    ErrorCeilingExceeded { count: usize, max: usize },

    /// PostgreSQL driver error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// MySQL or SQLite driver error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Query error
    pub fn query(context: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Query {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a ConnectionLost error
    pub fn connection_lost(context: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::ConnectionLost {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidIdentifier error
    pub fn invalid_identifier(name: impl Into<String>, reason: impl Into<String>) -> Self {
        MigrateError::InvalidIdentifier {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error ends the whole run rather than a single table or row.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            MigrateError::NoCommonColumns(_)
                | MigrateError::TableNotFound(_)
                | MigrateError::DuplicateTable(_)
                | MigrateError::Transfer { .. }
                | MigrateError::Query { .. }
        )
    }

    /// Scope a statement failure to `table` as a [`MigrateError::Transfer`].
    /// Fatal errors are returned unchanged.
    pub fn for_table(self, table: &str, action: impl std::fmt::Display) -> Self {
        if self.is_fatal() {
            self
        } else {
            MigrateError::transfer(table, format!("{}: {}", action, self))
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

impl From<deadpool_postgres::PoolError> for MigrateError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        MigrateError::pool(err, "acquiring PostgreSQL connection")
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_scoped_errors_are_not_fatal() {
        assert!(!MigrateError::NoCommonColumns("users".into()).is_fatal());
        assert!(!MigrateError::TableNotFound("board_free".into()).is_fatal());
        assert!(!MigrateError::transfer("users", "insert failed").is_fatal());
    }

    #[test]
    fn test_run_scoped_errors_are_fatal() {
        assert!(MigrateError::Config("bad".into()).is_fatal());
        assert!(MigrateError::invalid_identifier("a b", "space").is_fatal());
        assert!(MigrateError::ErrorCeilingExceeded { count: 11, max: 10 }.is_fatal());
        assert!(MigrateError::pool("refused", "connecting").is_fatal());
        assert!(MigrateError::connection_lost("SELECT 1", "connection closed").is_fatal());
    }

    #[test]
    fn test_for_table_keeps_fatal_errors() {
        let lost = MigrateError::connection_lost("INSERT INTO users", "connection closed")
            .for_table("users", "inserting row 3");
        assert!(matches!(lost, MigrateError::ConnectionLost { .. }));

        let failed = MigrateError::query("INSERT INTO users", "NOT NULL constraint failed")
            .for_table("users", "inserting row 3");
        match failed {
            MigrateError::Transfer { table, message } => {
                assert_eq!(table, "users");
                assert!(message.starts_with("inserting row 3: Query failed"));
            }
            other => panic!("expected transfer error, got {other:?}"),
        }
    }

    #[test]
    fn test_format_detailed_includes_message() {
        let err = MigrateError::ErrorCeilingExceeded { count: 11, max: 10 };
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: Too many errors (11 > 10)"));
    }

    #[test]
    fn test_io_error_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.env");
        let err: MigrateError = io.into();
        assert!(err.to_string().contains("missing.env"));
    }
}
