//! Board table schema engine.
//!
//! Creates, alters, drops and introspects the per-board dynamic tables on any
//! supported engine. All SQL text comes from [`ddl`] and the session's dialect;
//! nothing here branches on the engine.

pub mod ddl;
pub mod migrator;

use tracing::{debug, info, warn};

use crate::core::identifier::{
    is_reserved_column, validate_droppable_column, validate_new_column, validate_table_name,
};
use crate::core::schema::{Board, BoardField, ColumnInfo};
use crate::core::traits::{Dialect, Session};
use crate::dialect::typemap::field_type_from_native;
use crate::error::{MigrateError, Result};

pub use migrator::{MigrationStatus, Migrator};

/// Schema operations over one session.
pub struct BoardSchema<'a> {
    session: &'a mut dyn Session,
}

impl<'a> BoardSchema<'a> {
    pub fn new(session: &'a mut dyn Session) -> Self {
        Self { session }
    }

    pub async fn table_exists(&mut self, table: &str) -> Result<bool> {
        validate_table_name(table)?;
        let sql = self.session.dialect().table_exists_query(table);
        Ok(self.session.query_i64(&sql).await?.unwrap_or(0) > 0)
    }

    /// Physical columns of `table` in ordinal order.
    ///
    /// # Errors
    ///
    /// `TableNotFound` when the table does not exist.
    pub async fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        if !self.table_exists(table).await? {
            return Err(MigrateError::TableNotFound(table.to_string()));
        }
        let sql = self.session.dialect().list_columns_query(table);
        let rows = self.session.query(&sql).await?;
        let dialect = self.session.dialect();
        rows.iter().map(|row| dialect.column_from_row(row)).collect()
    }

    /// Create the dynamic table for `board`.
    ///
    /// # Errors
    ///
    /// `InvalidIdentifier` for an unsafe table or field name (nothing is
    /// executed), `DuplicateTable` when the table already exists.
    pub async fn create_board_table(&mut self, board: &Board, fields: &[BoardField]) -> Result<()> {
        let sql = ddl::create_table_sql(self.session.dialect(), &board.table_name, fields)?;

        if self.table_exists(&board.table_name).await? {
            return Err(MigrateError::DuplicateTable(board.table_name.clone()));
        }

        self.session.execute(&sql).await?;
        info!(
            "Created board table {} ({} fields)",
            board.table_name,
            fields.len()
        );
        Ok(())
    }

    /// Add, modify and drop columns of a board table in one transaction.
    ///
    /// Operations run in that order. If any statement fails the transaction
    /// is rolled back and the error returned.
    pub async fn alter_board_table(
        &mut self,
        board: &Board,
        add: &[BoardField],
        modify: &[BoardField],
        drop: &[String],
    ) -> Result<()> {
        let table = board.table_name.as_str();
        validate_table_name(table)?;
        for field in add.iter().chain(modify) {
            validate_new_column(&field.column_name)?;
        }
        for column in drop {
            validate_droppable_column(column)?;
        }

        self.session.begin().await?;
        match self.apply_alterations(table, add, modify, drop).await {
            Ok(()) => {
                self.session.commit().await?;
                info!(
                    "Altered board table {}: {} added, {} modified, {} dropped",
                    table,
                    add.len(),
                    modify.len(),
                    drop.len()
                );
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = self.session.rollback().await {
                    warn!("Rollback of {} alteration failed: {}", table, rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn apply_alterations(
        &mut self,
        table: &str,
        add: &[BoardField],
        modify: &[BoardField],
        drop: &[String],
    ) -> Result<()> {
        for field in add {
            let sql = ddl::add_column_sql(self.session.dialect(), table, field)?;
            self.session.execute(&sql).await?;
        }

        let mut rebuild = Vec::new();
        for field in modify {
            match ddl::modify_column_sql(self.session.dialect(), table, field)? {
                Some(statements) => {
                    for sql in statements {
                        self.session.execute(&sql).await?;
                    }
                }
                None => rebuild.push(field.clone()),
            }
        }
        if !rebuild.is_empty() {
            let current = self.columns(table).await?;
            for field in &rebuild {
                if !current.iter().any(|c| c.name.eq_ignore_ascii_case(&field.column_name)) {
                    return Err(MigrateError::Schema(format!(
                        "cannot modify missing column {}.{}",
                        table, field.column_name
                    )));
                }
            }
            debug!("Rebuilding {} to modify {} columns", table, rebuild.len());
            for sql in ddl::rebuild_table_sql(self.session.dialect(), table, &current, &rebuild)? {
                self.session.execute(&sql).await?;
            }
        }

        for column in drop {
            let sql = ddl::drop_column_sql(self.session.dialect(), table, column)?;
            self.session.execute(&sql).await?;
        }
        Ok(())
    }

    /// Drop a board table. Dropping a missing table succeeds.
    pub async fn drop_board_table(&mut self, table: &str) -> Result<()> {
        validate_table_name(table)?;
        let sql = self.session.dialect().drop_table_statement(table, false);
        self.session.execute(&sql).await?;
        info!("Dropped board table {}", table);
        Ok(())
    }

    /// Reconstruct the field list of a board table from the catalog.
    ///
    /// System and counter columns are left out. Types come back through the
    /// lossy reverse mapping; `required` mirrors `NOT NULL`.
    pub async fn board_table_schema(&mut self, table: &str) -> Result<Vec<BoardField>> {
        let columns = self.columns(table).await?;
        Ok(columns
            .into_iter()
            .filter(|c| !is_reserved_column(&c.name))
            .enumerate()
            .map(|(idx, c)| {
                BoardField::new(c.name.clone(), field_type_from_native(&c.data_type))
                    .required(!c.nullable)
                    .sort_order(idx as i32)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::FieldType;
    use crate::drivers::{DialectImpl, SqliteDialect};
    use crate::core::traits::Row;
    use async_trait::async_trait;

    /// Session that records statements and fails on a chosen one.
    struct ScriptedSession {
        dialect: DialectImpl,
        executed: Vec<String>,
        fail_on: Option<String>,
        exists: bool,
    }

    impl ScriptedSession {
        fn new(exists: bool) -> Self {
            Self {
                dialect: DialectImpl::Sqlite(SqliteDialect::new()),
                executed: Vec::new(),
                fail_on: None,
                exists,
            }
        }
    }

    #[async_trait]
    impl Session for ScriptedSession {
        fn dialect(&self) -> &DialectImpl {
            &self.dialect
        }

        async fn execute(&mut self, sql: &str) -> Result<u64> {
            self.executed.push(sql.to_string());
            match &self.fail_on {
                Some(needle) if sql.contains(needle.as_str()) => {
                    Err(MigrateError::query(sql, "scripted failure"))
                }
                _ => Ok(0),
            }
        }

        async fn query(&mut self, _sql: &str) -> Result<Vec<Row>> {
            let columns: std::sync::Arc<[String]> = vec!["count".to_string()].into();
            let count = crate::core::value::SqlValue::Int(i64::from(self.exists));
            Ok(vec![Row::new(columns, vec![count])])
        }
    }

    #[tokio::test]
    async fn test_create_rejects_existing_table() {
        let mut session = ScriptedSession::new(true);
        let board = Board::new(1, "free", "board_free");
        let err = BoardSchema::new(&mut session)
            .create_board_table(&board, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::DuplicateTable(ref t) if t == "board_free"));
        assert!(session.executed.is_empty());
    }

    #[tokio::test]
    async fn test_create_validates_before_touching_database() {
        let mut session = ScriptedSession::new(false);
        let board = Board::new(1, "free", "board free");
        let err = BoardSchema::new(&mut session)
            .create_board_table(&board, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::InvalidIdentifier { .. }));
        assert!(session.executed.is_empty());
    }

    #[tokio::test]
    async fn test_alter_rolls_back_on_failure() {
        let mut session = ScriptedSession::new(true);
        session.fail_on = Some("DROP COLUMN".to_string());
        let board = Board::new(1, "free", "board_free");
        let add = vec![BoardField::new("phone", FieldType::Text)];

        let result = BoardSchema::new(&mut session)
            .alter_board_table(&board, &add, &[], &["location".to_string()])
            .await;

        assert!(result.is_err());
        assert_eq!(session.executed.first().map(String::as_str), Some("BEGIN"));
        assert_eq!(session.executed.last().map(String::as_str), Some("ROLLBACK"));
        assert!(!session.executed.iter().any(|s| s == "COMMIT"));
    }

    #[tokio::test]
    async fn test_alter_rejects_reserved_add_without_begin() {
        let mut session = ScriptedSession::new(true);
        let board = Board::new(1, "free", "board_free");
        let add = vec![BoardField::new("created_at", FieldType::Date)];

        let result = BoardSchema::new(&mut session)
            .alter_board_table(&board, &add, &[], &[])
            .await;

        assert!(matches!(result, Err(MigrateError::InvalidIdentifier { .. })));
        assert!(session.executed.is_empty());
    }

    #[tokio::test]
    async fn test_alter_refuses_to_drop_system_columns() {
        let mut session = ScriptedSession::new(true);
        let board = Board::new(1, "free", "board_free");

        for column in ["id", "title", "created_at"] {
            let result = BoardSchema::new(&mut session)
                .alter_board_table(&board, &[], &[], &[column.to_string()])
                .await;
            assert!(
                matches!(result, Err(MigrateError::InvalidIdentifier { ref name, .. }) if name == column),
                "{column} should be refused"
            );
        }
        assert!(session.executed.is_empty());
    }
}
