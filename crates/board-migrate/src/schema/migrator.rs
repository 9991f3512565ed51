//! Versioned schema migrations for the fixed tables.
//!
//! Migration files are embedded per engine and use the goose layout:
//! `-- +goose Up` / `-- +goose Down` sections, with
//! `-- +goose StatementBegin` / `StatementEnd` around statements that contain
//! semicolons of their own (trigger and function bodies). Applied versions are
//! recorded in `goose_db_version`.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Driver;
use crate::core::traits::{Dialect, Session};
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};

/// Table recording applied versions.
pub const VERSION_TABLE: &str = "goose_db_version";

const POSTGRES_MIGRATIONS: &[(&str, &str)] = &[
    (
        "00001_create_core_tables.sql",
        include_str!("../../migrations/postgres/00001_create_core_tables.sql"),
    ),
    (
        "00002_create_content_tables.sql",
        include_str!("../../migrations/postgres/00002_create_content_tables.sql"),
    ),
    (
        "00003_touch_updated_at.sql",
        include_str!("../../migrations/postgres/00003_touch_updated_at.sql"),
    ),
];

const MYSQL_MIGRATIONS: &[(&str, &str)] = &[
    (
        "00001_create_core_tables.sql",
        include_str!("../../migrations/mysql/00001_create_core_tables.sql"),
    ),
    (
        "00002_create_content_tables.sql",
        include_str!("../../migrations/mysql/00002_create_content_tables.sql"),
    ),
    (
        "00003_add_lookup_indexes.sql",
        include_str!("../../migrations/mysql/00003_add_lookup_indexes.sql"),
    ),
];

const SQLITE_MIGRATIONS: &[(&str, &str)] = &[
    (
        "00001_create_core_tables.sql",
        include_str!("../../migrations/sqlite/00001_create_core_tables.sql"),
    ),
    (
        "00002_create_content_tables.sql",
        include_str!("../../migrations/sqlite/00002_create_content_tables.sql"),
    ),
    (
        "00003_touch_updated_at.sql",
        include_str!("../../migrations/sqlite/00003_touch_updated_at.sql"),
    ),
];

/// One parsed migration file.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationFile {
    pub version: i64,
    pub name: String,
    pub up: Vec<String>,
    pub down: Vec<String>,
}

/// Applied state of one migration version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationStatus {
    pub version: i64,
    pub name: String,
    pub applied: bool,
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Up,
    Down,
}

/// Parse a goose-format SQL file. The version is the numeric file name prefix.
pub fn parse_migration(name: &str, content: &str) -> Result<MigrationFile> {
    let version = name
        .split('_')
        .next()
        .and_then(|prefix| prefix.parse::<i64>().ok())
        .ok_or_else(|| {
            MigrateError::Schema(format!("migration file {name} has no numeric version prefix"))
        })?;

    let mut up = Vec::new();
    let mut down = Vec::new();
    let mut section = Section::None;
    let mut in_block = false;
    let mut buffer = String::new();

    let flush = |buffer: &mut String, section: Section, up: &mut Vec<String>, down: &mut Vec<String>| {
        let stmt = buffer.trim();
        let stmt = stmt.strip_suffix(';').unwrap_or(stmt).trim();
        if !stmt.is_empty() {
            match section {
                Section::Up => up.push(stmt.to_string()),
                Section::Down => down.push(stmt.to_string()),
                Section::None => {}
            }
        }
        buffer.clear();
    };

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(annotation) = trimmed.strip_prefix("-- +goose") {
            match annotation.trim() {
                "Up" => {
                    flush(&mut buffer, section, &mut up, &mut down);
                    section = Section::Up;
                }
                "Down" => {
                    flush(&mut buffer, section, &mut up, &mut down);
                    section = Section::Down;
                }
                "StatementBegin" => {
                    flush(&mut buffer, section, &mut up, &mut down);
                    in_block = true;
                }
                "StatementEnd" => {
                    // block bodies keep their inner semicolons
                    let stmt = buffer.trim().to_string();
                    if !stmt.is_empty() {
                        match section {
                            Section::Up => up.push(stmt),
                            Section::Down => down.push(stmt),
                            Section::None => {}
                        }
                    }
                    buffer.clear();
                    in_block = false;
                }
                other => {
                    return Err(MigrateError::Schema(format!(
                        "{name}: unknown goose annotation '{other}'"
                    )))
                }
            }
            continue;
        }

        if !in_block && (trimmed.is_empty() || trimmed.starts_with("--")) {
            continue;
        }

        buffer.push_str(line);
        buffer.push('\n');

        if !in_block && trimmed.ends_with(';') {
            flush(&mut buffer, section, &mut up, &mut down);
        }
    }
    if in_block {
        return Err(MigrateError::Schema(format!(
            "{name}: StatementBegin without StatementEnd"
        )));
    }
    flush(&mut buffer, section, &mut up, &mut down);

    if up.is_empty() {
        return Err(MigrateError::Schema(format!("{name}: no Up statements")));
    }

    Ok(MigrationFile {
        version,
        name: name.to_string(),
        up,
        down,
    })
}

/// Embedded migrations for an engine, ordered by version.
pub fn embedded_migrations(driver: Driver) -> Result<Vec<MigrationFile>> {
    let files = match driver {
        Driver::Postgres => POSTGRES_MIGRATIONS,
        Driver::Mysql => MYSQL_MIGRATIONS,
        Driver::Sqlite => SQLITE_MIGRATIONS,
    };
    let mut migrations = files
        .iter()
        .map(|(name, content)| parse_migration(name, content))
        .collect::<Result<Vec<_>>>()?;
    migrations.sort_by_key(|m| m.version);
    Ok(migrations)
}

/// Applies embedded migrations over one session.
pub struct Migrator<'a> {
    session: &'a mut dyn Session,
    migrations: Vec<MigrationFile>,
}

impl<'a> Migrator<'a> {
    pub fn new(session: &'a mut dyn Session) -> Result<Self> {
        let migrations = embedded_migrations(session.dialect().driver())?;
        Ok(Self {
            session,
            migrations,
        })
    }

    pub fn migrations(&self) -> &[MigrationFile] {
        &self.migrations
    }

    async fn ensure_version_table(&mut self) -> Result<()> {
        let dialect = self.session.dialect();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({} {}, {} BIGINT NOT NULL, {} BOOLEAN NOT NULL, {} TIMESTAMP DEFAULT CURRENT_TIMESTAMP)",
            dialect.quote_ident(VERSION_TABLE),
            dialect.quote_ident("id"),
            dialect.auto_increment_clause(),
            dialect.quote_ident("version_id"),
            dialect.quote_ident("is_applied"),
            dialect.quote_ident("tstamp"),
        );
        self.session.execute(&sql).await?;
        Ok(())
    }

    async fn applied_versions(&mut self) -> Result<BTreeSet<i64>> {
        self.ensure_version_table().await?;
        let dialect = self.session.dialect();
        let sql = format!(
            "SELECT version_id FROM {} WHERE is_applied = {}",
            dialect.quote_ident(VERSION_TABLE),
            dialect.boolean_literal(true)
        );
        let rows = self.session.query(&sql).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get(0).and_then(SqlValue::as_i64))
            .collect())
    }

    /// Run `statements` and `bookkeeping` in one transaction.
    async fn run_in_transaction(&mut self, label: &str, statements: &[String], bookkeeping: String) -> Result<()> {
        self.session.begin().await?;
        for sql in statements.iter().chain(std::iter::once(&bookkeeping)) {
            if let Err(e) = self.session.execute(sql).await {
                if let Err(rollback_err) = self.session.rollback().await {
                    warn!("Rollback of {} failed: {}", label, rollback_err);
                }
                return Err(MigrateError::Schema(format!("{label}: {e}")));
            }
        }
        self.session.commit().await
    }

    /// Apply every pending migration. Returns how many were applied.
    pub async fn up(&mut self) -> Result<usize> {
        let applied = self.applied_versions().await?;
        let pending: Vec<MigrationFile> = self
            .migrations
            .iter()
            .filter(|m| !applied.contains(&m.version))
            .cloned()
            .collect();

        for migration in &pending {
            info!("Applying migration {}", migration.name);
            let record = {
                let dialect = self.session.dialect();
                format!(
                    "INSERT INTO {} (version_id, is_applied) VALUES ({}, {})",
                    dialect.quote_ident(VERSION_TABLE),
                    migration.version,
                    dialect.boolean_literal(true)
                )
            };
            self.run_in_transaction(&migration.name, &migration.up, record)
                .await?;
        }

        if pending.is_empty() {
            info!("Schema is up to date");
        }
        Ok(pending.len())
    }

    /// Roll back the most recently applied migration, if any.
    pub async fn down(&mut self) -> Result<Option<i64>> {
        let applied = self.applied_versions().await?;
        let Some(latest) = applied.iter().next_back().copied() else {
            info!("No migrations to roll back");
            return Ok(None);
        };
        let migration = self
            .migrations
            .iter()
            .find(|m| m.version == latest)
            .cloned()
            .ok_or_else(|| {
                MigrateError::Schema(format!("applied version {latest} has no migration file"))
            })?;

        info!("Rolling back migration {}", migration.name);
        let record = format!(
            "DELETE FROM {} WHERE version_id = {}",
            self.session.dialect().quote_ident(VERSION_TABLE),
            latest
        );
        self.run_in_transaction(&migration.name, &migration.down, record)
            .await?;
        Ok(Some(latest))
    }

    pub async fn status(&mut self) -> Result<Vec<MigrationStatus>> {
        let applied = self.applied_versions().await?;
        Ok(self
            .migrations
            .iter()
            .map(|m| MigrationStatus {
                version: m.version,
                name: m.name.clone(),
                applied: applied.contains(&m.version),
            })
            .collect())
    }

    /// Drop every table, forget applied versions and re-apply all migrations.
    pub async fn purge(&mut self) -> Result<usize> {
        let tables: Vec<String> = {
            let sql = self.session.dialect().list_tables_query();
            self.session
                .query(&sql)
                .await?
                .iter()
                .filter_map(|row| row.get(0).and_then(SqlValue::to_text))
                .filter(|t| t != VERSION_TABLE && !t.starts_with("sqlite_"))
                .collect()
        };

        let fk_off = self.session.dialect().toggle_foreign_keys(false);
        self.session.execute(&fk_off).await?;

        let mut dropped = Ok(());
        for table in &tables {
            let sql = self.session.dialect().drop_table_statement(table, true);
            if let Err(e) = self.session.execute(&sql).await {
                dropped = Err(MigrateError::Schema(format!("dropping {table}: {e}")));
                break;
            }
            debug!("Dropped table {}", table);
        }

        let fk_on = self.session.dialect().toggle_foreign_keys(true);
        self.session.execute(&fk_on).await?;
        dropped?;
        info!("Dropped {} tables", tables.len());

        let drop_versions = self
            .session
            .dialect()
            .drop_table_statement(VERSION_TABLE, false);
        if let Err(e) = self.session.execute(&drop_versions).await {
            warn!("Dropping {} failed: {}", VERSION_TABLE, e);
        }

        self.up().await
    }
}
