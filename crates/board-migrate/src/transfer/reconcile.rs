//! Column reconciliation between independently introspected tables.

use crate::core::schema::ColumnInfo;
use crate::core::traits::Dialect;
use crate::error::{MigrateError, Result};

/// A column present on both sides.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonColumn {
    pub source: ColumnInfo,
    pub target: ColumnInfo,
}

/// Columns both sides share, in source order, with names quoted per side.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub common: Vec<CommonColumn>,
    pub source_names: Vec<String>,
    pub target_names: Vec<String>,
}

impl Reconciled {
    pub fn len(&self) -> usize {
        self.common.len()
    }

    pub fn is_empty(&self) -> bool {
        self.common.is_empty()
    }

    /// Index of a common column by name, ignoring ASCII case.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.common
            .iter()
            .position(|c| c.source.name.eq_ignore_ascii_case(name))
    }
}

/// Match `source` and `target` columns by case-insensitive name.
///
/// # Errors
///
/// `NoCommonColumns` when the tables share no column.
pub fn reconcile<S: Dialect + ?Sized, T: Dialect + ?Sized>(
    table: &str,
    source: &[ColumnInfo],
    target: &[ColumnInfo],
    source_dialect: &S,
    target_dialect: &T,
) -> Result<Reconciled> {
    let common: Vec<CommonColumn> = source
        .iter()
        .filter_map(|src| {
            target
                .iter()
                .find(|tgt| tgt.name.eq_ignore_ascii_case(&src.name))
                .map(|tgt| CommonColumn {
                    source: src.clone(),
                    target: tgt.clone(),
                })
        })
        .collect();

    if common.is_empty() {
        return Err(MigrateError::NoCommonColumns(table.to_string()));
    }

    Ok(Reconciled {
        source_names: common
            .iter()
            .map(|c| source_dialect.quote_ident(&c.source.name))
            .collect(),
        target_names: common
            .iter()
            .map(|c| target_dialect.quote_ident(&c.target.name))
            .collect(),
        common,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{MysqlDialect, PostgresDialect};

    fn cols(names: &[&str]) -> Vec<ColumnInfo> {
        names
            .iter()
            .map(|n| ColumnInfo::new(*n, "text", true))
            .collect()
    }

    #[test]
    fn test_reconcile_ignores_case() {
        let upper = reconcile(
            "users",
            &cols(&["ID", "Name"]),
            &cols(&["id", "name"]),
            &PostgresDialect::new(),
            &PostgresDialect::new(),
        )
        .unwrap();
        let lower = reconcile(
            "users",
            &cols(&["id", "name"]),
            &cols(&["ID", "NAME"]),
            &PostgresDialect::new(),
            &PostgresDialect::new(),
        )
        .unwrap();
        assert_eq!(upper.len(), 2);
        assert_eq!(lower.len(), 2);
    }

    #[test]
    fn test_reconcile_follows_source_order_and_quotes_per_side() {
        let result = reconcile(
            "posts",
            &cols(&["title", "legacy_flag", "id"]),
            &cols(&["id", "title", "extra"]),
            &MysqlDialect::new(),
            &PostgresDialect::new(),
        )
        .unwrap();
        assert_eq!(result.source_names, vec!["`title`", "`id`"]);
        assert_eq!(result.target_names, vec!["\"title\"", "\"id\""]);
        assert_eq!(result.position("ID"), Some(1));
    }

    #[test]
    fn test_reconcile_without_overlap_is_table_error() {
        let err = reconcile(
            "posts",
            &cols(&["a"]),
            &cols(&["b"]),
            &PostgresDialect::new(),
            &PostgresDialect::new(),
        )
        .unwrap_err();
        assert!(matches!(err, MigrateError::NoCommonColumns(ref t) if t == "posts"));
        assert!(!err.is_fatal());
    }
}
