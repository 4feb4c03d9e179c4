//! Core types shared by the converter, the SQLite source and the executor.
//!
//! - [`schema`]: table, column and constraint definitions parsed from DDL
//! - [`value`]: literal values carried into generated INSERT statements
//! - [`identifier`]: SQLite/Oracle identifier quoting and case folding

pub mod identifier;
pub mod schema;
pub mod value;

pub use schema::{ColumnDefinition, ColumnReference, ForeignKey, TableConstraint, TableDefinition};
pub use value::SqlValue;
