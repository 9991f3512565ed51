//! SQL literal encoding for literal-embedded INSERTs.
//!
//! Rows are copied between engines whose drivers disagree on placeholder
//! syntax, so each value is rendered as a literal for the target dialect.
//! Encoding never fails: an unrecognized shape degrades to a quoted string.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::core::traits::Dialect;
use crate::core::value::{DeclaredType, SqlValue};
use crate::drivers::DialectImpl;
use crate::transfer::policy::is_boolean_column;

/// Canonical rendering of timestamps on every target.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Naive formats tried before RFC 3339, in order.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// What is known about the column a value is written to.
#[derive(Debug, Clone, Copy)]
pub struct ColumnHint<'a> {
    pub name: &'a str,
    pub declared: DeclaredType,
    /// Target native type as introspected.
    pub native_type: &'a str,
}

impl<'a> ColumnHint<'a> {
    pub fn new(name: &'a str, declared: DeclaredType, native_type: &'a str) -> Self {
        Self {
            name,
            declared,
            native_type,
        }
    }

    fn is_boolean(&self) -> bool {
        let native = self.native_type.to_ascii_lowercase();
        native.contains("bool")
            || native.starts_with("tinyint(1)")
            || is_boolean_column(self.name)
            || self.declared == DeclaredType::Boolean
    }

    fn is_timestamp(&self) -> bool {
        let native = self.native_type.to_ascii_lowercase();
        self.declared == DeclaredType::Timestamp
            || native.contains("timestamp")
            || native.contains("datetime")
    }
}

/// Encodes values for one target table.
pub struct ValueEncoder<'a> {
    dialect: &'a DialectImpl,
    table: &'a str,
    decode_base64: bool,
}

impl<'a> ValueEncoder<'a> {
    pub fn new(dialect: &'a DialectImpl, table: &'a str, decode_base64: bool) -> Self {
        Self {
            dialect,
            table,
            decode_base64,
        }
    }

    /// Render `value` as a literal for the column described by `hint`.
    pub fn encode(&self, value: &SqlValue, hint: &ColumnHint<'_>) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }

        if hint.is_boolean() {
            if let Some(b) = coerce_bool(value) {
                return self.dialect.boolean_literal(b).to_string();
            }
        }

        if hint.is_timestamp() {
            if let Some(literal) = self.encode_timestamp(value, hint) {
                return literal;
            }
        }

        self.encode_by_kind(value, hint)
    }

    fn encode_timestamp(&self, value: &SqlValue, hint: &ColumnHint<'_>) -> Option<String> {
        let text = match value {
            SqlValue::DateTime(dt) => return Some(self.quote(&dt.format(TIMESTAMP_FORMAT).to_string())),
            SqlValue::DateTimeTz(dt) => {
                return Some(self.quote(&dt.format(TIMESTAMP_FORMAT).to_string()))
            }
            SqlValue::Date(d) => return Some(self.quote(&format!("{} 00:00:00", d.format("%Y-%m-%d")))),
            SqlValue::Text(s) => s.clone(),
            SqlValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            _ => return None,
        };

        match parse_timestamp(&text) {
            Some(ts) => Some(self.quote(&ts.format(TIMESTAMP_FORMAT).to_string())),
            None => {
                debug!(
                    "{}.{}: unparsed timestamp passed through as text",
                    self.table, hint.name
                );
                Some(self.quote(&text))
            }
        }
    }

    fn encode_by_kind(&self, value: &SqlValue, hint: &ColumnHint<'_>) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => self.dialect.boolean_literal(*b).to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) if f.is_finite() => f.to_string(),
            SqlValue::Float(f) => self.quote(&f.to_string()),
            SqlValue::Decimal(d) => d.to_string(),
            SqlValue::Text(s) => self.encode_text(s, hint),
            SqlValue::Bytes(b) => self.encode_text(&String::from_utf8_lossy(b), hint),
            SqlValue::Uuid(u) => self.quote(&u.to_string()),
            SqlValue::Date(d) => self.quote(&d.format("%Y-%m-%d").to_string()),
            SqlValue::Time(t) => self.quote(&t.format("%H:%M:%S").to_string()),
            SqlValue::DateTime(dt) => self.quote(&dt.format(TIMESTAMP_FORMAT).to_string()),
            SqlValue::DateTimeTz(dt) => self.quote(&dt.format(TIMESTAMP_FORMAT).to_string()),
        }
    }

    fn encode_text(&self, text: &str, hint: &ColumnHint<'_>) -> String {
        if self.decode_base64 {
            if let Some(decoded) = decode_base64_text(text) {
                debug!(
                    "{}.{}: decoded base64 value ({} -> {} bytes)",
                    self.table,
                    hint.name,
                    text.len(),
                    decoded.len()
                );
                return self.quote(&decoded);
            }
        }
        self.quote(text)
    }

    fn quote(&self, text: &str) -> String {
        self.dialect.string_literal(text)
    }
}

/// Interpret a scanned value as a boolean. `None` for shapes that carry no
/// truth value (dates, uuids).
pub fn coerce_bool(value: &SqlValue) -> Option<bool> {
    match value {
        SqlValue::Bool(b) => Some(*b),
        SqlValue::Int(i) => Some(*i != 0),
        SqlValue::Float(f) => Some(*f != 0.0),
        SqlValue::Decimal(d) => Some(!d.is_zero()),
        SqlValue::Text(s) => Some(text_truth(s)),
        SqlValue::Bytes(b) => Some(text_truth(&String::from_utf8_lossy(b))),
        _ => None,
    }
}

fn text_truth(text: &str) -> bool {
    let lower = text.trim().to_ascii_lowercase();
    match lower.as_str() {
        "true" | "t" | "y" | "yes" | "on" | "1" => true,
        "false" | "f" | "n" | "no" | "off" | "0" | "" => false,
        other => other.parse::<f64>().map(|n| n != 0.0).unwrap_or(false),
    }
}

/// Parse a timestamp string with the accepted formats, normalizing offsets to UTC.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).naive_utc())
        })
}

/// Decode `text` when it looks like padded standard base64 of UTF-8 text.
fn decode_base64_text(text: &str) -> Option<String> {
    if text.len() < 4 || text.len() % 4 != 0 || !text.ends_with('=') {
        return None;
    }
    if !text
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
    {
        return None;
    }
    let bytes = STANDARD.decode(text).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;
    if decoded
        .chars()
        .any(|c| c.is_control() && !c.is_whitespace())
    {
        return None;
    }
    Some(decoded)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::*;
    use crate::drivers::{MysqlDialect, PostgresDialect, SqliteDialect};

    fn pg() -> DialectImpl {
        DialectImpl::Postgres(PostgresDialect::new())
    }

    fn lite() -> DialectImpl {
        DialectImpl::Sqlite(SqliteDialect::new())
    }

    fn text_hint(name: &str) -> ColumnHint<'_> {
        ColumnHint::new(name, DeclaredType::Other, "character varying")
    }

    // =========================================================================
    // Booleans
    // =========================================================================

    #[test]
    fn test_boolean_representations_agree() {
        let dialect = pg();
        let encoder = ValueEncoder::new(&dialect, "boards", false);
        let hint = ColumnHint::new("is_urgent", DeclaredType::Boolean, "integer");

        for truthy in [
            SqlValue::Int(1),
            SqlValue::from("true"),
            SqlValue::from("t"),
            SqlValue::from("y"),
            SqlValue::from("YES"),
            SqlValue::Bool(true),
        ] {
            assert_eq!(encoder.encode(&truthy, &hint), "TRUE", "{truthy:?}");
        }
        for falsy in [
            SqlValue::Int(0),
            SqlValue::from("false"),
            SqlValue::from("f"),
            SqlValue::from("n"),
            SqlValue::Bool(false),
        ] {
            assert_eq!(encoder.encode(&falsy, &hint), "FALSE", "{falsy:?}");
        }
    }

    #[test]
    fn test_boolean_detected_from_native_type_and_allow_list() {
        let dialect = lite();
        let encoder = ValueEncoder::new(&dialect, "users", false);

        let native = ColumnHint::new("flag", DeclaredType::Other, "boolean");
        assert_eq!(encoder.encode(&SqlValue::from("true"), &native), "1");

        let allow_listed = ColumnHint::new("is_private", DeclaredType::Other, "INTEGER");
        assert_eq!(encoder.encode(&SqlValue::Bool(false), &allow_listed), "0");

        let mysql = DialectImpl::Mysql(MysqlDialect::new());
        let encoder = ValueEncoder::new(&mysql, "users", false);
        let tinyint = ColumnHint::new("flag", DeclaredType::Other, "tinyint(1)");
        assert_eq!(encoder.encode(&SqlValue::from("yes"), &tinyint), "1");
    }

    // =========================================================================
    // Timestamps
    // =========================================================================

    #[test]
    fn test_timestamp_formats_normalize() {
        let dialect = pg();
        let encoder = ValueEncoder::new(&dialect, "users", false);
        let hint = ColumnHint::new("created_at", DeclaredType::Timestamp, "text");

        for input in [
            "2024-03-01 10:20:30",
            "2024-03-01T10:20:30",
            "2024-03-01T10:20:30Z",
            "2024-03-01T10:20:30.123456Z",
            "2024-03-01T19:20:30+09:00",
        ] {
            assert_eq!(
                encoder.encode(&SqlValue::from(input), &hint),
                "'2024-03-01 10:20:30'",
                "{input}"
            );
        }
    }

    #[test]
    fn test_unparseable_timestamp_passes_through() {
        let dialect = pg();
        let encoder = ValueEncoder::new(&dialect, "users", false);
        let hint = ColumnHint::new("created_at", DeclaredType::Timestamp, "timestamp without time zone");
        assert_eq!(encoder.encode(&SqlValue::from("yesterday"), &hint), "'yesterday'");
    }

    #[test]
    fn test_native_datetime_values() {
        let dialect = lite();
        let encoder = ValueEncoder::new(&dialect, "comments", false);
        let dt = NaiveDate::from_ymd_opt(2023, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 58)
            .unwrap();
        let hint = ColumnHint::new("created_at", DeclaredType::Timestamp, "TIMESTAMP");
        assert_eq!(encoder.encode(&SqlValue::DateTime(dt), &hint), "'2023-12-31 23:59:58'");
        assert_eq!(
            encoder.encode(&SqlValue::DateTime(dt), &text_hint("note")),
            "'2023-12-31 23:59:58'"
        );
    }

    // =========================================================================
    // Fallback by kind
    // =========================================================================

    #[test]
    fn test_strings_are_escaped() {
        let dialect = pg();
        let encoder = ValueEncoder::new(&dialect, "comments", false);
        assert_eq!(
            encoder.encode(&SqlValue::from("it's"), &text_hint("content")),
            "'it''s'"
        );
        assert_eq!(encoder.encode(&SqlValue::Null, &text_hint("content")), "NULL");
        assert_eq!(
            encoder.encode(&SqlValue::Bytes(b"raw bytes".to_vec()), &text_hint("content")),
            "'raw bytes'"
        );
    }

    #[test]
    fn test_numbers_are_unquoted() {
        let dialect = pg();
        let encoder = ValueEncoder::new(&dialect, "comments", false);
        let hint = ColumnHint::new("post_id", DeclaredType::Other, "integer");
        assert_eq!(encoder.encode(&SqlValue::Int(42), &hint), "42");
        assert_eq!(encoder.encode(&SqlValue::Float(1.5), &hint), "1.5");
        assert_eq!(
            encoder.encode(&SqlValue::Decimal(Decimal::new(1234, 2)), &hint),
            "12.34"
        );
        assert_eq!(encoder.encode(&SqlValue::Float(f64::NAN), &hint), "'NaN'");
    }

    // =========================================================================
    // Base64
    // =========================================================================

    #[test]
    fn test_base64_is_opt_in() {
        let dialect = pg();
        let encoded = SqlValue::from("aGVsbG8gd29ybGQ=");

        let off = ValueEncoder::new(&dialect, "comments", false);
        assert_eq!(off.encode(&encoded, &text_hint("content")), "'aGVsbG8gd29ybGQ='");

        let on = ValueEncoder::new(&dialect, "comments", true);
        assert_eq!(on.encode(&encoded, &text_hint("content")), "'hello world'");
    }

    #[test]
    fn test_base64_candidates_are_strict() {
        assert_eq!(decode_base64_text("aGVsbG8gd29ybGQ="), Some("hello world".to_string()));
        // no padding
        assert_eq!(decode_base64_text("dGVzdA"), None);
        assert_eq!(decode_base64_text("abcd"), None);
        // not a multiple of four
        assert_eq!(decode_base64_text("abc=="), None);
        // decodes to non-UTF-8
        assert_eq!(decode_base64_text("//79/A=="), None);
    }
}
