//! Dialect utilities shared by every engine.
//!
//! The per-engine strategies live under `drivers/`; this module holds the
//! field-type mapper they all build on and re-exports the dispatch enum.
//!
//! ```rust,ignore
//! let dialect = DialectImpl::from_driver(Driver::Mysql);
//! let def = column_definition(&dialect, &field); // "`is_urgent` BOOLEAN DEFAULT FALSE"
//! ```

pub mod typemap;

pub use crate::drivers::DialectImpl;
pub use typemap::{column_definition, field_type_from_native, standard_column_type};
