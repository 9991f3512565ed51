//! Board, field and column metadata shared by the schema engine and the copier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of board, which decides which aggregates apply to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardType {
    #[default]
    Normal,
    Gallery,
    Qna,
}

impl BoardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoardType::Normal => "normal",
            BoardType::Gallery => "gallery",
            BoardType::Qna => "qna",
        }
    }

    /// Parse a stored board type. Unknown values fall back to `Normal`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "gallery" => BoardType::Gallery,
            "qna" => BoardType::Qna,
            _ => BoardType::Normal,
        }
    }
}

impl fmt::Display for BoardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Abstract type of a board field; dialects map it to a native column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Number,
    Date,
    Select,
    Checkbox,
    File,
}

impl FieldType {
    pub const ALL: [FieldType; 7] = [
        FieldType::Text,
        FieldType::Textarea,
        FieldType::Number,
        FieldType::Date,
        FieldType::Select,
        FieldType::Checkbox,
        FieldType::File,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Select => "select",
            FieldType::Checkbox => "checkbox",
            FieldType::File => "file",
        }
    }

    /// Parse a stored field type. Unknown values are treated as plain text.
    pub fn parse(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        FieldType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown field type '{}'", s))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logical forum that owns one dynamic table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub board_type: BoardType,
    pub table_name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub comments_enabled: bool,
    #[serde(default)]
    pub allow_anonymous: bool,
    #[serde(default = "default_true")]
    pub votes_enabled: bool,
}

impl Board {
    /// Minimal board for schema operations that only need the table name.
    pub fn new(id: i64, name: impl Into<String>, table_name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            slug: name.clone(),
            name,
            description: String::new(),
            board_type: BoardType::Normal,
            table_name: table_name.into(),
            active: true,
            comments_enabled: true,
            allow_anonymous: false,
            votes_enabled: true,
        }
    }

    pub fn with_type(mut self, board_type: BoardType) -> Self {
        self.board_type = board_type;
        self
    }
}

/// One user-defined column on a board's dynamic table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardField {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub board_id: i64,
    pub name: String,
    pub column_name: String,
    #[serde(default)]
    pub display_name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub options: String,
    #[serde(default)]
    pub sort_order: i32,
}

impl BoardField {
    pub fn new(column_name: impl Into<String>, field_type: FieldType) -> Self {
        let column_name = column_name.into();
        Self {
            id: 0,
            board_id: 0,
            name: column_name.clone(),
            display_name: column_name.clone(),
            column_name,
            field_type,
            required: false,
            sortable: false,
            searchable: false,
            options: String::new(),
            sort_order: 0,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }
}

/// Column metadata introspected from a physical table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Native type as reported by the engine, e.g. `character varying`, `tinyint(1)`.
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default: None,
            primary_key: false,
        }
    }
}

fn default_true() -> bool {
    true
}
