//! Field-type mapping between abstract board fields and native column types.
//!
//! The forward direction is exact and used for DDL. The reverse direction is
//! lossy: `select` and `file` both come back as `text`, and any native type
//! the mapper does not recognize is reported as `text` as well.

use crate::core::schema::{BoardField, FieldType};
use crate::core::traits::Dialect;

/// Native type shared by all supported engines for a field type.
pub fn standard_column_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Text | FieldType::File => "VARCHAR(255)",
        FieldType::Textarea => "TEXT",
        FieldType::Number => "INTEGER",
        FieldType::Date => "DATE",
        FieldType::Select => "VARCHAR(100)",
        FieldType::Checkbox => "BOOLEAN",
    }
}

/// Full column definition for a board field: quoted name, native type,
/// boolean default and `NOT NULL` when required.
pub fn column_definition<D: Dialect + ?Sized>(dialect: &D, field: &BoardField) -> String {
    let mut def = format!(
        "{} {}",
        dialect.quote_ident(&field.column_name),
        dialect.column_type(field.field_type)
    );
    if field.field_type == FieldType::Checkbox {
        def.push_str(" DEFAULT ");
        def.push_str(dialect.boolean_default());
    }
    if field.required {
        def.push_str(" NOT NULL");
    }
    def
}

/// Reverse-map an introspected native type to a field type.
pub fn field_type_from_native(native: &str) -> FieldType {
    let lower = native.trim().to_ascii_lowercase();

    // tinyint(1) is MySQL's BOOLEAN; any other width is a number
    if lower.starts_with("tinyint(1)") {
        return FieldType::Checkbox;
    }

    let base = lower.split('(').next().unwrap_or("").trim();
    let base = base.strip_suffix(" unsigned").unwrap_or(base);

    match base {
        "varchar" | "character varying" | "char" | "character" | "nvarchar" => FieldType::Text,
        "text" | "tinytext" | "mediumtext" | "longtext" => FieldType::Textarea,
        "integer" | "int" | "int2" | "int4" | "int8" | "bigint" | "smallint" | "mediumint"
        | "tinyint" => FieldType::Number,
        "date" => FieldType::Date,
        "boolean" | "bool" => FieldType::Checkbox,
        _ => FieldType::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{MysqlDialect, PostgresDialect, SqliteDialect};

    // =========================================================================
    // Forward mapping
    // =========================================================================

    #[test]
    fn test_standard_column_types() {
        assert_eq!(standard_column_type(FieldType::Text), "VARCHAR(255)");
        assert_eq!(standard_column_type(FieldType::Textarea), "TEXT");
        assert_eq!(standard_column_type(FieldType::Number), "INTEGER");
        assert_eq!(standard_column_type(FieldType::Date), "DATE");
        assert_eq!(standard_column_type(FieldType::Select), "VARCHAR(100)");
        assert_eq!(standard_column_type(FieldType::Checkbox), "BOOLEAN");
        assert_eq!(standard_column_type(FieldType::File), "VARCHAR(255)");
    }

    #[test]
    fn test_checkbox_default_per_dialect() {
        let field = BoardField::new("is_urgent", FieldType::Checkbox);
        assert_eq!(
            column_definition(&PostgresDialect::new(), &field),
            "\"is_urgent\" BOOLEAN DEFAULT FALSE"
        );
        assert_eq!(
            column_definition(&MysqlDialect::new(), &field),
            "`is_urgent` BOOLEAN DEFAULT FALSE"
        );
        assert_eq!(
            column_definition(&SqliteDialect::new(), &field),
            "\"is_urgent\" BOOLEAN DEFAULT 0"
        );
    }

    #[test]
    fn test_required_appends_not_null() {
        let field = BoardField::new("due_date", FieldType::Date).required(true);
        assert_eq!(
            column_definition(&PostgresDialect::new(), &field),
            "\"due_date\" DATE NOT NULL"
        );
        let flag = BoardField::new("pinned", FieldType::Checkbox).required(true);
        assert_eq!(
            column_definition(&SqliteDialect::new(), &flag),
            "\"pinned\" BOOLEAN DEFAULT 0 NOT NULL"
        );
    }

    // =========================================================================
    // Reverse mapping
    // =========================================================================

    #[test]
    fn test_reverse_postgres_names() {
        assert_eq!(field_type_from_native("character varying"), FieldType::Text);
        assert_eq!(field_type_from_native("text"), FieldType::Textarea);
        assert_eq!(field_type_from_native("integer"), FieldType::Number);
        assert_eq!(field_type_from_native("date"), FieldType::Date);
        assert_eq!(field_type_from_native("boolean"), FieldType::Checkbox);
    }

    #[test]
    fn test_reverse_mysql_names() {
        assert_eq!(field_type_from_native("varchar(100)"), FieldType::Text);
        assert_eq!(field_type_from_native("mediumtext"), FieldType::Textarea);
        assert_eq!(field_type_from_native("int(11)"), FieldType::Number);
        assert_eq!(field_type_from_native("int unsigned"), FieldType::Number);
        assert_eq!(field_type_from_native("tinyint(1)"), FieldType::Checkbox);
        assert_eq!(field_type_from_native("tinyint(4)"), FieldType::Number);
    }

    #[test]
    fn test_reverse_unknown_is_text() {
        assert_eq!(field_type_from_native("jsonb"), FieldType::Text);
        assert_eq!(field_type_from_native("timestamp without time zone"), FieldType::Text);
        assert_eq!(field_type_from_native(""), FieldType::Text);
    }
}
