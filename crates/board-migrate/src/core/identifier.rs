//! Centralized identifier validation and quoting for SQL injection prevention.
//!
//! Board tables and their columns are named at runtime by operators, and SQL has
//! no parameter binding for identifiers. Every path that interpolates a table or
//! column name into DDL or DML must pass it through this module first:
//!
//! 1. Validate the name against a strict character class
//! 2. Reject reserved system column names for new fields
//! 3. Apply dialect-specific quoting (double quotes or backticks)

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{MigrateError, Result};

/// Maximum identifier length (MySQL's 64-character limit is the tightest).
const MAX_IDENTIFIER_LENGTH: usize = 64;

static TABLE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid table name pattern"));

static COLUMN_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("valid column name pattern"));

/// Columns every board table carries. Field descriptors may not reuse them.
pub const SYSTEM_COLUMNS: &[&str] = &[
    "id",
    "title",
    "content",
    "user_id",
    "view_count",
    "created_at",
    "updated_at",
];

/// Denormalized counters maintained by the aggregate recount pass.
pub const COUNTER_COLUMNS: &[&str] = &["comment_count", "like_count", "dislike_count"];

/// Returns true if `name` is acceptable as a table name: `[A-Za-z0-9_-]+`.
pub fn is_valid_table_name(name: &str) -> bool {
    name.len() <= MAX_IDENTIFIER_LENGTH && TABLE_NAME_RE.is_match(name)
}

/// Returns true if `name` is acceptable as a column name: `[A-Za-z0-9_]+`.
pub fn is_valid_column_name(name: &str) -> bool {
    name.len() <= MAX_IDENTIFIER_LENGTH && COLUMN_NAME_RE.is_match(name)
}

/// Returns true if `name` collides with a system or counter column.
pub fn is_reserved_column(name: &str) -> bool {
    SYSTEM_COLUMNS
        .iter()
        .chain(COUNTER_COLUMNS)
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// Validate a table name.
///
/// # Errors
///
/// Returns `MigrateError::InvalidIdentifier` with a descriptive reason.
pub fn validate_table_name(name: &str) -> Result<()> {
    check_shape(name)?;
    if !is_valid_table_name(name) {
        return Err(MigrateError::invalid_identifier(
            name,
            "table names may only contain letters, digits, '_' and '-'",
        ));
    }
    Ok(())
}

/// Validate a column name that already exists (SELECT, DROP COLUMN, MODIFY).
pub fn validate_column_name(name: &str) -> Result<()> {
    check_shape(name)?;
    if !is_valid_column_name(name) {
        return Err(MigrateError::invalid_identifier(
            name,
            "column names may only contain letters, digits and '_'",
        ));
    }
    Ok(())
}

/// Validate a column name for a new field (CREATE TABLE, ADD COLUMN).
pub fn validate_new_column(name: &str) -> Result<()> {
    validate_column_name(name)?;
    if is_reserved_column(name) {
        return Err(MigrateError::invalid_identifier(
            name,
            "name is reserved for a system column",
        ));
    }
    Ok(())
}

/// Validate a column about to be dropped. System and counter columns stay.
pub fn validate_droppable_column(name: &str) -> Result<()> {
    validate_column_name(name)?;
    if is_reserved_column(name) {
        return Err(MigrateError::invalid_identifier(
            name,
            "system columns cannot be dropped",
        ));
    }
    Ok(())
}

fn check_shape(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::invalid_identifier(
            name,
            "identifier cannot be empty",
        ));
    }
    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::invalid_identifier(
            name,
            format!(
                "identifier exceeds maximum length of {} bytes (got {})",
                MAX_IDENTIFIER_LENGTH,
                name.len()
            ),
        ));
    }
    Ok(())
}

/// Quote a PostgreSQL or SQLite identifier.
///
/// Escapes double quotes by doubling them and wraps in double quotes.
pub fn quote_double(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a MySQL identifier using backticks.
pub fn quote_backtick(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Render a string as a single-quoted SQL literal, doubling embedded quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Table names
    // =========================================================================

    #[test]
    fn test_table_name_accepts_safe_names() {
        assert!(is_valid_table_name("board_free"));
        assert!(is_valid_table_name("board-notice"));
        assert!(is_valid_table_name("Board2024"));
    }

    #[test]
    fn test_table_name_rejects_unsafe_characters() {
        for name in [
            "",
            "board free",
            "board;drop",
            "board\"x",
            "board`x",
            "board.x",
            "board'x",
            "보드",
            "board\0",
        ] {
            assert!(!is_valid_table_name(name), "{name:?} should be rejected");
            assert!(validate_table_name(name).is_err());
        }
    }

    #[test]
    fn test_table_name_rejects_too_long() {
        let name = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert!(validate_table_name(&name).is_err());
        assert!(validate_table_name(&"a".repeat(MAX_IDENTIFIER_LENGTH)).is_ok());
    }

    // =========================================================================
    // Column names
    // =========================================================================

    #[test]
    fn test_column_name_rejects_hyphen() {
        assert!(is_valid_column_name("due_date"));
        assert!(!is_valid_column_name("due-date"));
        assert!(validate_column_name("due-date").is_err());
    }

    #[test]
    fn test_new_column_rejects_reserved_names() {
        for name in SYSTEM_COLUMNS.iter().chain(COUNTER_COLUMNS) {
            assert!(validate_new_column(name).is_err(), "{name} is reserved");
        }
        assert!(validate_new_column("ID").is_err());
        assert!(validate_new_column("Created_At").is_err());
    }

    #[test]
    fn test_existing_column_allows_reserved_names() {
        assert!(validate_column_name("id").is_ok());
        assert!(validate_column_name("created_at").is_ok());
    }

    #[test]
    fn test_dropping_reserved_columns_is_rejected() {
        for name in ["id", "TITLE", "created_at", "comment_count"] {
            let err = validate_droppable_column(name).unwrap_err();
            assert!(err.to_string().contains("cannot be dropped"), "{name}");
        }
        assert!(validate_droppable_column("phone").is_ok());
        assert!(validate_droppable_column("pho ne").is_err());
    }

    #[test]
    fn test_invalid_identifier_error_names_the_input() {
        let err = validate_new_column("title").unwrap_err();
        assert!(err.to_string().contains("'title'"));
    }

    // =========================================================================
    // Quoting
    // =========================================================================

    #[test]
    fn test_quote_double_escapes() {
        assert_eq!(quote_double("users"), "\"users\"");
        assert_eq!(quote_double("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_quote_backtick_escapes() {
        assert_eq!(quote_backtick("users"), "`users`");
        assert_eq!(quote_backtick("a`b"), "`a``b`");
    }

    #[test]
    fn test_quote_literal_doubles_single_quotes() {
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(quote_literal("'; DROP TABLE users; --"), "'''; DROP TABLE users; --'");
    }
}
