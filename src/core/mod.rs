//! Core database types and traits
//!
//! This module provides the building blocks the mapper is assembled from:
//! error types, the database trait, values, statements and their builders,
//! configuration, and transaction handling.

pub mod config;
pub mod database;
pub mod database_types;
pub mod error;
pub mod query_builder;
pub mod statement;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use config::{ConnectionSettings, JsonConfig};
pub use database::{ConnectionBuilder, Database};
pub use database_types::{DatabaseType, PlaceholderStyle};
pub use error::{DatabaseError, Result};
pub use query_builder::{DeleteBuilder, InsertBuilder, SelectBuilder, UpdateBuilder};
pub use statement::{Param, Statement};
pub use transaction::TransactionGuard;
pub use value::{DatabaseResult, DatabaseRow, DatabaseValue};
