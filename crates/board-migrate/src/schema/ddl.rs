//! DDL generation for board tables.
//!
//! Every builder validates the identifiers it interpolates, so a caller can
//! only obtain SQL text for names that passed [`crate::core::identifier`].

use crate::core::identifier::{
    validate_column_name, validate_droppable_column, validate_new_column, validate_table_name,
};
use crate::core::schema::{BoardField, ColumnInfo};
use crate::core::traits::Dialect;
use crate::dialect::typemap::column_definition;
use crate::error::Result;

/// Suffix of the scratch table used while rebuilding a table in place.
const REBUILD_SUFFIX: &str = "__rebuild";

/// System columns that precede a board's own fields.
fn leading_columns<D: Dialect + ?Sized>(dialect: &D) -> Vec<String> {
    vec![
        format!("{} {}", dialect.quote_ident("id"), dialect.auto_increment_clause()),
        format!("{} VARCHAR(200) NOT NULL", dialect.quote_ident("title")),
        format!("{} {} NOT NULL", dialect.quote_ident("content"), dialect.long_text_type()),
        format!("{} INTEGER NOT NULL", dialect.quote_ident("user_id")),
        format!("{} INTEGER NOT NULL DEFAULT 0", dialect.quote_ident("view_count")),
        format!("{} INTEGER NOT NULL DEFAULT 0", dialect.quote_ident("comment_count")),
        format!("{} INTEGER NOT NULL DEFAULT 0", dialect.quote_ident("like_count")),
        format!("{} INTEGER NOT NULL DEFAULT 0", dialect.quote_ident("dislike_count")),
    ]
}

fn trailing_columns<D: Dialect + ?Sized>(dialect: &D) -> Vec<String> {
    ["created_at", "updated_at"]
        .iter()
        .map(|c| {
            format!(
                "{} TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP",
                dialect.quote_ident(c)
            )
        })
        .collect()
}

/// `CREATE TABLE` for a board: system columns, then fields by `sort_order`,
/// then timestamps.
pub fn create_table_sql<D: Dialect + ?Sized>(
    dialect: &D,
    table: &str,
    fields: &[BoardField],
) -> Result<String> {
    validate_table_name(table)?;
    for field in fields {
        validate_new_column(&field.column_name)?;
    }

    let mut ordered: Vec<&BoardField> = fields.iter().collect();
    ordered.sort_by_key(|f| f.sort_order);

    let mut columns = leading_columns(dialect);
    columns.extend(ordered.into_iter().map(|f| column_definition(dialect, f)));
    columns.extend(trailing_columns(dialect));

    Ok(format!(
        "CREATE TABLE {} ({})",
        dialect.quote_ident(table),
        columns.join(", ")
    ))
}

pub fn add_column_sql<D: Dialect + ?Sized>(
    dialect: &D,
    table: &str,
    field: &BoardField,
) -> Result<String> {
    validate_table_name(table)?;
    validate_new_column(&field.column_name)?;
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {}",
        dialect.quote_ident(table),
        column_definition(dialect, field)
    ))
}

pub fn drop_column_sql<D: Dialect + ?Sized>(dialect: &D, table: &str, column: &str) -> Result<String> {
    validate_table_name(table)?;
    validate_droppable_column(column)?;
    Ok(format!(
        "ALTER TABLE {} DROP COLUMN {}",
        dialect.quote_ident(table),
        dialect.quote_ident(column)
    ))
}

/// In-place column modification, or `None` when the dialect needs a rebuild.
pub fn modify_column_sql<D: Dialect + ?Sized>(
    dialect: &D,
    table: &str,
    field: &BoardField,
) -> Result<Option<Vec<String>>> {
    validate_table_name(table)?;
    validate_new_column(&field.column_name)?;
    Ok(dialect.modify_column_statements(table, field))
}

/// Definition of an existing column as reported by introspection.
fn existing_column_definition<D: Dialect + ?Sized>(dialect: &D, column: &ColumnInfo) -> String {
    if column.primary_key && column.name.eq_ignore_ascii_case("id") {
        return format!("{} {}", dialect.quote_ident(&column.name), dialect.auto_increment_clause());
    }

    let mut def = format!("{} {}", dialect.quote_ident(&column.name), column.data_type);
    if !column.nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        def.push_str(" DEFAULT ");
        def.push_str(default);
    }
    def
}

/// Statements recreating `table` with `modified` fields swapped in, keeping
/// every column's position and copying all rows across.
///
/// Used for engines without `ALTER COLUMN`; the caller runs them inside the
/// surrounding transaction.
pub fn rebuild_table_sql<D: Dialect + ?Sized>(
    dialect: &D,
    table: &str,
    current: &[ColumnInfo],
    modified: &[BoardField],
) -> Result<Vec<String>> {
    validate_table_name(table)?;
    for field in modified {
        validate_new_column(&field.column_name)?;
    }
    for column in current {
        validate_column_name(&column.name)?;
    }

    let scratch = format!("{table}{REBUILD_SUFFIX}");
    let definitions: Vec<String> = current
        .iter()
        .map(|col| {
            match modified
                .iter()
                .find(|f| f.column_name.eq_ignore_ascii_case(&col.name))
            {
                Some(field) => column_definition(dialect, field),
                None => existing_column_definition(dialect, col),
            }
        })
        .collect();
    let names: Vec<String> = current.iter().map(|c| dialect.quote_ident(&c.name)).collect();
    let names = names.join(", ");

    Ok(vec![
        format!(
            "CREATE TABLE {} ({})",
            dialect.quote_ident(&scratch),
            definitions.join(", ")
        ),
        format!(
            "INSERT INTO {} ({names}) SELECT {names} FROM {}",
            dialect.quote_ident(&scratch),
            dialect.quote_ident(table)
        ),
        format!("DROP TABLE {}", dialect.quote_ident(table)),
        format!(
            "ALTER TABLE {} RENAME TO {}",
            dialect.quote_ident(&scratch),
            dialect.quote_ident(table)
        ),
    ])
}
