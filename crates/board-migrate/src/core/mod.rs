//! Core abstractions shared by the schema engine and the data copier.
//!
//! - [`identifier`]: table/column name validation and quoting
//! - [`schema`]: board, field and column metadata
//! - [`value`]: engine-neutral scanned values
//! - [`traits`]: the `Dialect` strategy and the `Session` connection trait
//!
//! Driver modules (`drivers/postgres`, `drivers/mysql`, `drivers/sqlite`)
//! implement these traits; everything above them is engine-agnostic.

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{Board, BoardField, BoardType, ColumnInfo, FieldType};
pub use traits::{Dialect, Row, SequenceStrategy, Session};
pub use value::{DeclaredType, SqlValue};
