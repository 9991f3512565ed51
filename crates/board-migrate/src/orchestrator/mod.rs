//! Migration orchestrator - main workflow coordinator.
//!
//! Drives one data migration run through its phases on a single source and a
//! single target session. Table- and row-scoped failures land in the
//! [`ErrorLedger`]; anything else ends the run.

pub mod maintenance;
pub mod pools;
pub mod report;

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{validate_options, Config, DatabaseConfig, MigrationOptions};
use crate::core::identifier::validate_table_name;
use crate::core::schema::{Board, BoardField, BoardType, FieldType};
use crate::core::traits::{Dialect, Row, Session};
use crate::core::value::DeclaredType;
use crate::error::{MigrateError, Result};
use crate::schema::{BoardSchema, Migrator};
use crate::transfer::encoder::coerce_bool;
use crate::transfer::{BatchCopier, FIXED_TABLES};

pub use pools::{ensure_database_exists, ConnectionPair, PoolImpl};
pub use report::{ErrorLedger, MigrationReport, RunError, RunPhase, RunStatus, TableOutcome};

/// Migration orchestrator.
pub struct Orchestrator {
    source: DatabaseConfig,
    target: DatabaseConfig,
    options: MigrationOptions,
}

/// Mutable state of one run.
struct RunState {
    ledger: ErrorLedger,
    tables: Vec<TableOutcome>,
}

impl Orchestrator {
    /// Create a new orchestrator.
    ///
    /// # Errors
    ///
    /// `Config` for identical source and target or conflicting flags.
    pub fn new(
        source: DatabaseConfig,
        target: DatabaseConfig,
        options: MigrationOptions,
    ) -> Result<Self> {
        if source.same_database(&target) {
            return Err(MigrateError::Config(
                "source and target cannot be the same database".into(),
            ));
        }
        validate_options(&options)?;
        Ok(Self {
            source,
            target,
            options,
        })
    }

    /// Orchestrator for a loaded configuration, which must name a target.
    pub fn from_config(config: &Config) -> Result<Self> {
        let target = config
            .target
            .clone()
            .ok_or_else(|| MigrateError::Config("data migration requires a target".into()))?;
        Self::new(config.source.clone(), target, config.migration.clone())
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    /// Run the migration.
    ///
    /// Returns a report for completed and aborted runs alike; only fatal
    /// errors (connection, pool, schema migration) come back as `Err`.
    pub async fn run(&self) -> Result<MigrationReport> {
        let started_at = Utc::now();
        enter(RunPhase::Connecting);
        let pair = ConnectionPair::open(&self.source, &self.target).await?;

        let mut state = RunState {
            ledger: ErrorLedger::new(self.options.max_errors),
            tables: Vec::new(),
        };
        let result = match (pair.source.session().await, pair.target.session().await) {
            (Ok(mut source), Ok(mut target)) => {
                self.run_phases(&mut *source, &mut *target, &mut state).await
            }
            (Err(e), _) | (_, Err(e)) => Err(e),
        };
        pair.close().await;

        let (status, abort_reason) = match result {
            Ok(()) => (RunStatus::Completed, None),
            Err(e @ MigrateError::ErrorCeilingExceeded { .. }) => {
                warn!("{}", e);
                (RunStatus::Aborted, Some(e.to_string()))
            }
            Err(e) => return Err(e),
        };

        enter(RunPhase::Report);
        let completed_at = Utc::now();
        let report = MigrationReport {
            status,
            source: self.source.describe(),
            target: self.target.describe(),
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            rows_written: state.tables.iter().map(|t| t.rows_written).sum(),
            rows_skipped: state.tables.iter().map(|t| t.rows_skipped).sum(),
            tables: state.tables,
            errors: state.ledger.into_errors(),
            abort_reason,
        };

        info!(
            "Migration {}: {} tables, {} rows in {:.1}s, {} errors",
            match report.status {
                RunStatus::Completed => "completed",
                RunStatus::Aborted => "aborted",
            },
            report.tables.len(),
            report.rows_written,
            report.duration_seconds,
            report.errors.len()
        );
        Ok(report)
    }

    async fn run_phases(
        &self,
        source: &mut dyn Session,
        target: &mut dyn Session,
        state: &mut RunState,
    ) -> Result<()> {
        if !self.options.data_only {
            enter(RunPhase::SchemaSync);
            let applied = Migrator::new(&mut *target)?.up().await?;
            info!("Applied {} schema migrations on target", applied);
            if self.options.schema_only {
                return Ok(());
            }
        }

        enter(RunPhase::DisableFk);
        debug!(
            "Foreign key checks are suspended per table on the {} target session",
            target.dialect().name()
        );

        if !self.options.dynamic_only {
            enter(RunPhase::CopyFixedTables);
            self.copy_fixed_tables(source, target, state).await?;
        }

        if !self.options.basic_only {
            enter(RunPhase::CopyDynamicTables);
            self.copy_dynamic_tables(source, target, state).await?;
        }

        let boards = match list_boards(target, true).await {
            Ok(boards) => boards,
            Err(e) => {
                warn!("Failed to list target boards: {}", e);
                Vec::new()
            }
        };

        enter(RunPhase::RecomputeAggregates);
        maintenance::recompute_aggregates(target, &boards).await;

        enter(RunPhase::ResetSequences);
        let tables: Vec<String> = FIXED_TABLES
            .iter()
            .map(|t| t.to_string())
            .chain(boards.iter().map(|b| b.table_name.clone()))
            .collect();
        maintenance::reset_sequences(target, &tables).await;
        Ok(())
    }

    async fn copy_fixed_tables(
        &self,
        source: &mut dyn Session,
        target: &mut dyn Session,
        state: &mut RunState,
    ) -> Result<()> {
        let none = HashMap::new();
        for table in FIXED_TABLES {
            if self.options.is_skipped(table) {
                info!("{}: skipped by configuration", table);
                continue;
            }
            self.copy_one(source, target, table, &none, state).await?;
        }
        Ok(())
    }

    async fn copy_dynamic_tables(
        &self,
        source: &mut dyn Session,
        target: &mut dyn Session,
        state: &mut RunState,
    ) -> Result<()> {
        let boards = list_boards(source, self.options.include_inactive)
            .await
            .map_err(|e| e.for_table("boards", "listing boards"));
        let boards = match boards {
            Ok(boards) => boards,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("{}", e);
                state.ledger.record(Some("boards"), e.to_string());
                return state.ledger.check();
            }
        };
        info!("Found {} boards to migrate", boards.len());

        for board in &boards {
            let table = board.table_name.as_str();
            if self.options.is_skipped(table) {
                info!("{}: skipped by configuration", table);
                continue;
            }
            if let Err(e) = validate_table_name(table) {
                warn!("Board {}: {}", board.id, e);
                state.ledger.record(Some(table), e.to_string());
                state.ledger.check()?;
                continue;
            }

            let fields = match board_fields(source, board.id).await {
                Ok(fields) => fields,
                Err(e) => {
                    self.table_failed(table, e, state)?;
                    continue;
                }
            };
            if let Err(e) = ensure_board_table(target, board, &fields).await {
                self.table_failed(table, e, state)?;
                continue;
            }

            let declared: HashMap<String, DeclaredType> = fields
                .iter()
                .filter(|f| f.field_type == FieldType::Checkbox)
                .map(|f| (f.column_name.clone(), DeclaredType::Boolean))
                .collect();
            self.copy_one(source, target, table, &declared, state).await?;
        }
        Ok(())
    }

    async fn copy_one(
        &self,
        source: &mut dyn Session,
        target: &mut dyn Session,
        table: &str,
        declared: &HashMap<String, DeclaredType>,
        state: &mut RunState,
    ) -> Result<()> {
        let mut outcome = TableOutcome::new(table);
        let result = BatchCopier::new(source, target, &self.options)
            .copy_table(table, declared, &mut state.ledger, &mut outcome)
            .await;
        state.tables.push(outcome);

        match result {
            Ok(()) => state.ledger.check(),
            Err(e) => self.table_failed(table, e, state),
        }
    }

    /// Record a table-scoped error, or pass a fatal one through.
    fn table_failed(&self, table: &str, err: MigrateError, state: &mut RunState) -> Result<()> {
        if err.is_fatal() {
            return Err(err);
        }
        warn!("{}: {}", table, err);
        state.ledger.record(Some(table), err.to_string());
        state.ledger.check()
    }
}

fn enter(phase: RunPhase) {
    info!(phase = %phase, "Phase: {}", phase);
}

/// Boards in id order, optionally only the active ones.
async fn list_boards(session: &mut dyn Session, include_inactive: bool) -> Result<Vec<Board>> {
    let dialect = session.dialect();
    let mut sql = format!(
        "SELECT {} FROM {}",
        ["id", "name", "slug", "board_type", "table_name", "active"]
            .iter()
            .map(|c| dialect.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", "),
        dialect.quote_ident("boards")
    );
    if !include_inactive {
        sql.push_str(&format!(
            " WHERE {} = {}",
            dialect.quote_ident("active"),
            dialect.boolean_literal(true)
        ));
    }
    sql.push_str(&format!(" ORDER BY {}", dialect.quote_ident("id")));

    let rows = session.query(&sql).await?;
    Ok(rows.iter().filter_map(board_from_row).collect())
}

fn board_from_row(row: &Row) -> Option<Board> {
    let id = row.int("id")?;
    let mut board = Board::new(id, row.text("name").unwrap_or_default(), row.text("table_name")?);
    board.slug = row.text("slug").unwrap_or_default();
    board.board_type = BoardType::parse(&row.text("board_type").unwrap_or_default());
    board.active = row.get_named("active").and_then(coerce_bool).unwrap_or(true);
    Some(board)
}

/// Field definitions of one source board ordered by `sort_order`.
async fn board_fields(session: &mut dyn Session, board_id: i64) -> Result<Vec<BoardField>> {
    let dialect = session.dialect();
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = {} ORDER BY {}, {}",
        [
            "id",
            "name",
            "column_name",
            "display_name",
            "field_type",
            "required",
            "sort_order",
        ]
        .iter()
        .map(|c| dialect.quote_ident(c))
        .collect::<Vec<_>>()
        .join(", "),
        dialect.quote_ident("board_fields"),
        dialect.quote_ident("board_id"),
        board_id,
        dialect.quote_ident("sort_order"),
        dialect.quote_ident("id")
    );

    let rows = session.query(&sql).await?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let column = row.text("column_name")?;
            let mut field = BoardField::new(
                column.clone(),
                FieldType::parse(&row.text("field_type").unwrap_or_default()),
            )
            .required(row.get_named("required").and_then(coerce_bool).unwrap_or(false))
            .sort_order(row.int("sort_order").unwrap_or(0) as i32);
            field.id = row.int("id").unwrap_or(0);
            field.board_id = board_id;
            field.name = row.text("name").unwrap_or_else(|| column.clone());
            field.display_name = row.text("display_name").unwrap_or(column);
            Some(field)
        })
        .collect())
}

/// Create the target board table from its field definitions when missing.
async fn ensure_board_table(
    target: &mut dyn Session,
    board: &Board,
    fields: &[BoardField],
) -> Result<()> {
    let mut schema = BoardSchema::new(target);
    if schema.table_exists(&board.table_name).await? {
        return Ok(());
    }
    info!(
        "{}: creating target table with {} fields",
        board.table_name,
        fields.len()
    );
    schema.create_board_table(board, fields).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Driver;
    use crate::core::value::SqlValue;
    use std::sync::Arc;

    #[test]
    fn test_rejects_same_database() {
        let source = DatabaseConfig::sqlite("/tmp/board.db");
        let target = DatabaseConfig::sqlite("/tmp/board.db");
        let err = Orchestrator::new(source, target, MigrationOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, MigrateError::Config(_)));
    }

    #[test]
    fn test_rejects_conflicting_scope_flags() {
        let options = MigrationOptions {
            dynamic_only: true,
            basic_only: true,
            ..MigrationOptions::default()
        };
        let result = Orchestrator::new(
            DatabaseConfig::new(Driver::Mysql),
            DatabaseConfig::sqlite("/tmp/new.db"),
            options,
        );
        assert!(matches!(result, Err(MigrateError::Config(_))));
    }

    #[test]
    fn test_from_config_requires_target() {
        let config = Config {
            source: DatabaseConfig::sqlite("/tmp/a.db"),
            target: None,
            migration: MigrationOptions::default(),
        };
        assert!(Orchestrator::from_config(&config).is_err());
    }

    #[test]
    fn test_board_from_row_reads_mixed_boolean_storage() {
        let columns: Arc<[String]> = ["id", "name", "slug", "board_type", "table_name", "active"]
            .iter()
            .map(|c| c.to_string())
            .collect();
        let row = Row::new(
            columns,
            vec![
                SqlValue::Int(7),
                "Q&A".into(),
                "qna".into(),
                "qna".into(),
                "board_qna".into(),
                SqlValue::Int(0),
            ],
        );
        let board = board_from_row(&row).unwrap();
        assert_eq!(board.id, 7);
        assert_eq!(board.board_type, BoardType::Qna);
        assert_eq!(board.table_name, "board_qna");
        assert!(!board.active);
    }
}
