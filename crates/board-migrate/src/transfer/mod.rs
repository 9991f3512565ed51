//! Batched table copy between two sessions on possibly different engines.
//!
//! Rows are paged from the source with `ORDER BY key LIMIT n OFFSET m` and
//! written to the target one literal-embedded `INSERT` at a time. A failing
//! row is recorded in the [`ErrorLedger`] and the copy moves on; inside a
//! transaction the batch is rolled back and the rows already written in it
//! are replayed on a fresh transaction.

pub mod encoder;
pub mod policy;
pub mod reconcile;

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::MigrationOptions;
use crate::core::identifier::validate_table_name;
use crate::core::traits::{Dialect, Row, Session};
use crate::core::value::{DeclaredType, SqlValue};
use crate::error::{MigrateError, Result};
use crate::orchestrator::report::{ErrorLedger, TableOutcome};
use crate::schema::BoardSchema;

pub use encoder::{ColumnHint, ValueEncoder};
pub use policy::{TablePolicy, FIXED_TABLES};
pub use reconcile::{reconcile, CommonColumn, Reconciled};

/// Copies tables from `source` to `target` under one set of options.
pub struct BatchCopier<'a> {
    source: &'a mut dyn Session,
    target: &'a mut dyn Session,
    options: &'a MigrationOptions,
}

/// Everything needed to turn one source row into one target `INSERT`.
struct InsertPlan {
    table: String,
    reconciled: Reconciled,
    policy: TablePolicy,
    /// Index of the `id` column among the common columns.
    id_index: Option<usize>,
    /// Expression replacing the copied id, when ids are regenerated.
    next_id: Option<String>,
}

impl InsertPlan {
    fn new<D: Dialect + ?Sized>(
        table: &str,
        reconciled: Reconciled,
        policy: TablePolicy,
        target_dialect: &D,
    ) -> Self {
        let id_index = reconciled.position("id");
        let next_id = if policy.regenerate_id {
            target_dialect.next_id_expression(table)
        } else {
            None
        };
        Self {
            table: table.to_string(),
            reconciled,
            policy,
            id_index,
            next_id,
        }
    }

    /// The `id` column is left out entirely when ids are regenerated and the
    /// target assigns them implicitly.
    fn omits_id(&self, idx: usize) -> bool {
        self.policy.regenerate_id && self.next_id.is_none() && Some(idx) == self.id_index
    }

    fn hint(&self, idx: usize) -> ColumnHint<'_> {
        let target = &self.reconciled.common[idx].target;
        ColumnHint::new(
            &target.name,
            self.policy.declared_type(&target.name),
            &target.data_type,
        )
    }

    fn insert_sql<D: Dialect + ?Sized>(
        &self,
        target_dialect: &D,
        encoder: &ValueEncoder<'_>,
        row: &Row,
    ) -> String {
        let mut columns = Vec::with_capacity(self.reconciled.len());
        let mut values = Vec::with_capacity(self.reconciled.len());

        for (idx, name) in self.reconciled.target_names.iter().enumerate() {
            if self.omits_id(idx) {
                continue;
            }
            columns.push(name.as_str());
            match (&self.next_id, Some(idx) == self.id_index) {
                (Some(expr), true) => values.push(expr.clone()),
                _ => {
                    let value = row.get(idx).unwrap_or(&SqlValue::Null);
                    values.push(encoder.encode(value, &self.hint(idx)));
                }
            }
        }

        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            target_dialect.quote_ident(&self.table),
            columns.join(", "),
            values.join(", ")
        )
    }

    /// `SELECT 1` check for an existing target row with the same id.
    fn exists_sql<D: Dialect + ?Sized>(
        &self,
        target_dialect: &D,
        encoder: &ValueEncoder<'_>,
        row: &Row,
    ) -> Option<String> {
        let idx = self.id_index?;
        let value = row.get(idx).filter(|v| !v.is_null())?;
        Some(format!(
            "SELECT 1 FROM {} WHERE {} = {}",
            target_dialect.quote_ident(&self.table),
            self.reconciled.target_names[idx],
            encoder.encode(value, &self.hint(idx))
        ))
    }

    fn select_sql<D: Dialect + ?Sized>(&self, source_dialect: &D) -> String {
        let common: Vec<String> = self
            .reconciled
            .common
            .iter()
            .map(|c| c.source.name.clone())
            .collect();
        let order: Vec<String> = self
            .policy
            .order_key(&common)
            .iter()
            .map(|k| source_dialect.quote_ident(k))
            .collect();

        format!(
            "SELECT {} FROM {} ORDER BY {}",
            self.reconciled.source_names.join(", "),
            source_dialect.quote_ident(&self.table),
            order.join(", ")
        )
    }
}

/// Transaction state of the batch being written.
struct Batch {
    in_transaction: bool,
    /// Statements applied in the open transaction, replayed after a rollback.
    applied: Vec<String>,
}

impl<'a> BatchCopier<'a> {
    pub fn new(
        source: &'a mut dyn Session,
        target: &'a mut dyn Session,
        options: &'a MigrationOptions,
    ) -> Self {
        Self {
            source,
            target,
            options,
        }
    }

    /// Copy every row of `table`.
    ///
    /// `extra_declared` adds column types the registry does not know (board
    /// checkbox fields). Counts in `outcome` are updated as rows are written,
    /// so partial progress survives an abort.
    ///
    /// # Errors
    ///
    /// Table-scoped errors (`TableNotFound`, `NoCommonColumns`, a failed page
    /// query) end this table only. `ErrorCeilingExceeded` ends the run.
    pub async fn copy_table(
        &mut self,
        table: &str,
        extra_declared: &HashMap<String, DeclaredType>,
        ledger: &mut ErrorLedger,
        outcome: &mut TableOutcome,
    ) -> Result<()> {
        validate_table_name(table)?;
        let start = Instant::now();

        let source_cols = BoardSchema::new(&mut *self.source).columns(table).await?;
        let count_sql = format!(
            "SELECT COUNT(*) FROM {}",
            self.source.dialect().quote_ident(table)
        );
        let total = self
            .source
            .query_i64(&count_sql)
            .await
            .map_err(|e| e.for_table(table, "counting rows"))?
            .unwrap_or(0);
        if total == 0 {
            info!("{}: source is empty, skipping", table);
            return Ok(());
        }

        let target_cols = BoardSchema::new(&mut *self.target).columns(table).await?;
        let reconciled = reconcile(
            table,
            &source_cols,
            &target_cols,
            self.source.dialect(),
            self.target.dialect(),
        )?;
        if reconciled.len() < source_cols.len() {
            debug!(
                "{}: copying {} of {} source columns",
                table,
                reconciled.len(),
                source_cols.len()
            );
        }

        let policy = TablePolicy::for_table(table).with_declared(extra_declared);
        let plan = InsertPlan::new(table, reconciled, policy, self.target.dialect());

        self.toggle_target_foreign_keys(false).await;
        let result = self.copy_rows(&plan, total, ledger, outcome).await;
        self.toggle_target_foreign_keys(true).await;

        info!(
            "{}: {} read, {} written, {} skipped, {} errors in {:.2}s",
            table,
            outcome.rows_read,
            outcome.rows_written,
            outcome.rows_skipped,
            outcome.errors,
            start.elapsed().as_secs_f64()
        );
        result
    }

    async fn toggle_target_foreign_keys(&mut self, enable: bool) {
        let sql = self.target.dialect().toggle_foreign_keys(enable);
        if let Err(e) = self.target.execute(&sql).await {
            warn!("Failed to set foreign key checks to {}: {}", enable, e);
        }
    }

    async fn copy_rows(
        &mut self,
        plan: &InsertPlan,
        total: i64,
        ledger: &mut ErrorLedger,
        outcome: &mut TableOutcome,
    ) -> Result<()> {
        let table = plan.table.as_str();
        if plan.policy.clean_first {
            let sql = format!("DELETE FROM {}", self.target.dialect().quote_ident(table));
            let deleted = self
                .target
                .execute(&sql)
                .await
                .map_err(|e| e.for_table(table, "clearing target"))?;
            debug!("{}: cleared {} target rows", table, deleted);
        }

        let use_transaction = plan.policy.use_transaction(total, self.options);
        let batch_size = self.options.batch_size.max(1);
        let base_select = plan.select_sql(self.source.dialect());
        debug!(
            "{}: {} rows, batch {}, transactions {}",
            table, total, batch_size, use_transaction
        );

        let mut offset = 0usize;
        loop {
            let sql = format!("{} LIMIT {} OFFSET {}", base_select, batch_size, offset);
            let page = self
                .source
                .query(&sql)
                .await
                .map_err(|e| e.for_table(table, format!("reading rows at offset {}", offset)))?;
            if page.is_empty() {
                break;
            }
            outcome.rows_read += page.len() as u64;

            self.write_batch(plan, &page, offset, use_transaction, ledger, outcome)
                .await?;

            if page.len() < batch_size {
                break;
            }
            offset += batch_size;
        }
        Ok(())
    }

    /// Write one page, inside a transaction when `use_transaction` is set.
    ///
    /// Any error leaves the target outside a transaction: the open batch is
    /// committed when the error ceiling stops the run and rolled back
    /// otherwise, with its rows taken back out of `outcome.rows_written`.
    async fn write_batch(
        &mut self,
        plan: &InsertPlan,
        page: &[Row],
        offset: usize,
        use_transaction: bool,
        ledger: &mut ErrorLedger,
        outcome: &mut TableOutcome,
    ) -> Result<()> {
        let table = plan.table.as_str();
        let mut batch = Batch {
            in_transaction: use_transaction,
            applied: Vec::new(),
        };
        if !batch.in_transaction {
            return self
                .write_rows(plan, page, offset, &mut batch, ledger, outcome)
                .await;
        }

        self.target
            .begin()
            .await
            .map_err(|e| e.for_table(table, format!("opening batch at offset {}", offset)))?;

        let result = self
            .write_rows(plan, page, offset, &mut batch, ledger, outcome)
            .await;
        match result {
            Ok(()) => match self.target.commit().await {
                Ok(()) => Ok(()),
                Err(e) => {
                    self.abandon_batch(table, &batch, outcome).await;
                    Err(e.for_table(table, format!("committing batch at offset {}", offset)))
                }
            },
            Err(abort @ MigrateError::ErrorCeilingExceeded { .. }) => {
                if let Err(e) = self.target.commit().await {
                    warn!("{}: commit before abort failed: {}", table, e);
                    self.abandon_batch(table, &batch, outcome).await;
                }
                Err(abort)
            }
            Err(e) => {
                self.abandon_batch(table, &batch, outcome).await;
                Err(e)
            }
        }
    }

    async fn write_rows(
        &mut self,
        plan: &InsertPlan,
        page: &[Row],
        offset: usize,
        batch: &mut Batch,
        ledger: &mut ErrorLedger,
        outcome: &mut TableOutcome,
    ) -> Result<()> {
        let table = plan.table.as_str();
        let dialect = self.target.dialect().clone();
        let encoder = ValueEncoder::new(&dialect, table, self.options.decode_base64);

        for (i, row) in page.iter().enumerate() {
            if plan.policy.skip_existing {
                if let Some(check) = plan.exists_sql(&dialect, &encoder, row) {
                    match self.target.query(&check).await {
                        Ok(rows) if !rows.is_empty() => {
                            outcome.rows_skipped += 1;
                            continue;
                        }
                        Ok(_) => {}
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            debug!("{}: existence check failed, inserting: {}", table, e);
                            // PostgreSQL aborts the open transaction on any failed statement.
                            if batch.in_transaction {
                                self.recover_batch(table, &batch.applied).await?;
                            }
                        }
                    }
                }
            }

            let insert = plan.insert_sql(&dialect, &encoder, row);
            match self.target.execute(&insert).await {
                Ok(_) => {
                    outcome.rows_written += 1;
                    if batch.in_transaction {
                        batch.applied.push(insert);
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    let position = offset + i;
                    warn!("{}: row {} failed: {}", table, position, e);
                    outcome.errors += 1;
                    ledger.record(Some(table), format!("row {}: {}", position, e));

                    if batch.in_transaction {
                        self.recover_batch(table, &batch.applied).await?;
                    }
                    ledger.check()?;
                }
            }
        }
        Ok(())
    }

    /// Roll back the failed transaction and replay the rows that preceded the
    /// failure on a fresh one.
    async fn recover_batch(&mut self, table: &str, applied: &[String]) -> Result<()> {
        if let Err(e) = self.target.rollback().await {
            warn!("{}: rollback after row error failed: {}", table, e);
        }
        self.target
            .begin()
            .await
            .map_err(|e| e.for_table(table, "reopening batch after row error"))?;
        for sql in applied {
            self.target
                .execute(sql)
                .await
                .map_err(|e| e.for_table(table, "replaying batch after row error"))?;
        }
        if !applied.is_empty() {
            debug!("{}: replayed {} rows after rollback", table, applied.len());
        }
        Ok(())
    }

    /// Roll back whatever is open and un-count the rows the batch had applied.
    async fn abandon_batch(&mut self, table: &str, batch: &Batch, outcome: &mut TableOutcome) {
        if let Err(e) = self.target.rollback().await {
            warn!("{}: rollback of abandoned batch failed: {}", table, e);
        }
        let lost = batch.applied.len() as u64;
        outcome.rows_written = outcome.rows_written.saturating_sub(lost);
        if lost > 0 {
            warn!("{}: {} rows of the abandoned batch were rolled back", table, lost);
        }
    }
}
