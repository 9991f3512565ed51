//! Per-table copy policy and the column type registry of the fixed tables.

use std::collections::HashMap;

use crate::config::MigrationOptions;
use crate::core::value::DeclaredType;

/// Fixed-schema tables in copy order (parents before children).
pub const FIXED_TABLES: &[&str] = &[
    "users",
    "boards",
    "board_fields",
    "board_managers",
    "comments",
    "attachments",
    "qna_answers",
    "qna_question_votes",
    "qna_answer_votes",
    "post_votes",
    "referrer_stats",
    "system_settings",
];

/// Column names treated as boolean regardless of how either side stores them.
pub const BOOLEAN_COLUMNS: &[&str] = &[
    "is_private",
    "is_image",
    "active",
    "comments_enabled",
    "allow_anonymous",
    "votes_enabled",
    "required",
    "sortable",
    "searchable",
];

/// Append-only analytics tables: never cleared, never copied in a transaction.
const HIGH_TRAFFIC_TABLES: &[&str] = &["referrer_stats"];

/// Tables whose existing target rows are kept, so re-runs skip them by id.
const IDENTITY_TABLES: &[&str] = &["users"];

/// Tables whose ids are drawn from the target sequence instead of copied.
const REGENERATED_ID_TABLES: &[&str] = &["referrer_stats"];

/// Tables excluded from identity resynchronization.
const NO_SEQUENCE_TABLES: &[&str] = &["goose_db_version", "referrer_stats", "board_managers"];

const TIMESTAMP_COLUMNS: &[&str] = &["created_at", "updated_at"];

/// Timestamp columns beyond `created_at`/`updated_at`, per fixed table.
fn extra_timestamps(table: &str) -> &'static [&'static str] {
    match table {
        "users" => &["approval_due", "token_invalidated_at"],
        "referrer_stats" => &["visit_time"],
        _ => &[],
    }
}

/// Boolean columns per fixed table.
fn booleans(table: &str) -> &'static [&'static str] {
    match table {
        "users" => &["active"],
        "boards" => &["active", "comments_enabled", "allow_anonymous", "votes_enabled"],
        "board_fields" => &["required", "sortable", "searchable"],
        "attachments" => &["is_image"],
        _ => &[],
    }
}

/// Natural two-column key for tables without an `id`.
fn composite_key(table: &str) -> Option<&'static [&'static str]> {
    match table {
        "board_managers" => Some(&["board_id", "user_id"]),
        _ => None,
    }
}

fn contains(list: &[&str], table: &str) -> bool {
    list.iter().any(|t| t.eq_ignore_ascii_case(table))
}

pub fn is_boolean_column(column: &str) -> bool {
    contains(BOOLEAN_COLUMNS, column)
}

pub fn needs_sequence_reset(table: &str) -> bool {
    !contains(NO_SEQUENCE_TABLES, table)
}

/// How one table is copied.
#[derive(Debug, Clone, Default)]
pub struct TablePolicy {
    pub table: String,
    /// `DELETE` target rows before copying.
    pub clean_first: bool,
    /// Skip source rows whose `id` already exists on the target.
    pub skip_existing: bool,
    /// Replace the copied `id` with a fresh target sequence value.
    pub regenerate_id: bool,
    pub high_traffic: bool,
    pub composite_key: Option<&'static [&'static str]>,
    /// Declared types keyed by lowercase column name.
    pub declared: HashMap<String, DeclaredType>,
}

impl TablePolicy {
    /// Policy for `table`, with the registry types of fixed tables and
    /// `created_at`/`updated_at` as timestamps everywhere.
    pub fn for_table(table: &str) -> Self {
        let lower = table.to_ascii_lowercase();
        let mut declared = HashMap::new();
        for col in TIMESTAMP_COLUMNS.iter().chain(extra_timestamps(&lower)) {
            declared.insert(col.to_string(), DeclaredType::Timestamp);
        }
        for col in booleans(&lower) {
            declared.insert(col.to_string(), DeclaredType::Boolean);
        }

        Self {
            table: table.to_string(),
            clean_first: !contains(HIGH_TRAFFIC_TABLES, table),
            skip_existing: contains(IDENTITY_TABLES, table),
            regenerate_id: contains(REGENERATED_ID_TABLES, table),
            high_traffic: contains(HIGH_TRAFFIC_TABLES, table),
            composite_key: composite_key(&lower),
            declared,
        }
    }

    /// Declare additional column types (board checkbox fields).
    pub fn with_declared(mut self, extra: &HashMap<String, DeclaredType>) -> Self {
        for (col, ty) in extra {
            self.declared.insert(col.to_ascii_lowercase(), *ty);
        }
        self
    }

    pub fn declared_type(&self, column: &str) -> DeclaredType {
        self.declared
            .get(&column.to_ascii_lowercase())
            .copied()
            .unwrap_or_default()
    }

    /// Whether batches of this table run inside a transaction.
    pub fn use_transaction(&self, total_rows: i64, options: &MigrationOptions) -> bool {
        options.use_transactions
            && total_rows <= options.transaction_row_threshold
            && !self.high_traffic
    }

    /// Paging key among the columns both sides share.
    pub fn order_key(&self, common: &[String]) -> Vec<String> {
        let has = |name: &str| common.iter().find(|c| c.eq_ignore_ascii_case(name)).cloned();

        if let Some(key) = self.composite_key {
            let cols: Vec<String> = key.iter().filter_map(|k| has(k)).collect();
            if cols.len() == key.len() {
                return cols;
            }
        }
        if let Some(id) = has("id") {
            return vec![id];
        }
        common.first().cloned().into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_referrer_stats_policy() {
        let policy = TablePolicy::for_table("referrer_stats");
        assert!(!policy.clean_first);
        assert!(policy.regenerate_id);
        assert!(!policy.use_transaction(10, &MigrationOptions::default()));
        assert_eq!(policy.declared_type("visit_time"), DeclaredType::Timestamp);
        assert!(!needs_sequence_reset("referrer_stats"));
    }

    #[test]
    fn test_users_policy() {
        let policy = TablePolicy::for_table("users");
        assert!(policy.clean_first);
        assert!(policy.skip_existing);
        assert_eq!(policy.declared_type("ACTIVE"), DeclaredType::Boolean);
        assert_eq!(policy.declared_type("approval_due"), DeclaredType::Timestamp);
        assert_eq!(policy.declared_type("username"), DeclaredType::Other);
    }

    #[test]
    fn test_transaction_threshold() {
        let options = MigrationOptions::default();
        let policy = TablePolicy::for_table("comments");
        assert!(policy.use_transaction(10_000, &options));
        assert!(!policy.use_transaction(10_001, &options));

        let disabled = MigrationOptions {
            use_transactions: false,
            ..MigrationOptions::default()
        };
        assert!(!policy.use_transaction(5, &disabled));
    }

    #[test]
    fn test_order_keys() {
        let managers = TablePolicy::for_table("board_managers");
        assert_eq!(
            managers.order_key(&names(&["board_id", "user_id", "created_at"])),
            names(&["board_id", "user_id"])
        );

        let comments = TablePolicy::for_table("comments");
        assert_eq!(comments.order_key(&names(&["ID", "content"])), names(&["ID"]));

        let keyless = TablePolicy::for_table("tags");
        assert_eq!(keyless.order_key(&names(&["name", "slug"])), names(&["name"]));
    }

    #[test]
    fn test_board_checkbox_fields_are_declared() {
        let mut extra = HashMap::new();
        extra.insert("Is_Urgent".to_string(), DeclaredType::Boolean);
        let policy = TablePolicy::for_table("board_free").with_declared(&extra);
        assert_eq!(policy.declared_type("is_urgent"), DeclaredType::Boolean);
        assert_eq!(policy.declared_type("created_at"), DeclaredType::Timestamp);
    }

    #[test]
    fn test_fixed_table_order_starts_with_parents() {
        assert_eq!(FIXED_TABLES[0], "users");
        assert_eq!(FIXED_TABLES[1], "boards");
        assert_eq!(FIXED_TABLES.len(), 12);
        assert!(needs_sequence_reset("users"));
        assert!(!needs_sequence_reset("board_managers"));
    }
}
