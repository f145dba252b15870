//! # Rust Record Mapper
//!
//! A small object-relational mapper: plain Rust structs are declared as
//! records, and a [`Mapper`](orm::Mapper) selects, inserts, updates and
//! deletes them against SQLite or PostgreSQL.
//!
//! ## Features
//!
//! - **Declared records**: the [`record!`] macro builds a field table for a struct
//! - **Statement synthesis**: INSERT/UPDATE/DELETE built from field metadata with
//!   every value bound as a parameter
//! - **Key discovery**: primary keys are read from the live schema and cached
//! - **All-or-nothing batches**: every batch write runs in one transaction
//! - **Async Support**: Async/await support with Tokio
//!
//! ## Supported Databases
//!
//! | Database | Feature | Placeholders |
//! |----------|---------|--------------|
//! | SQLite | `sqlite` (default) | `@name` |
//! | PostgreSQL | `postgres` | `$n` |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rust_record_mapper::prelude::*;
//! use rust_record_mapper::record;
//!
//! record! {
//!     #[derive(Debug, Clone)]
//!     pub struct User {
//!         #[auto]
//!         pub Id: i64,
//!         pub Name: String,
//!         pub Email: String,
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mapper = Mapper::new(SqliteDatabase::new(), "app.db");
//!     mapper
//!         .execute_raw("CREATE TABLE IF NOT EXISTS User (Id INTEGER PRIMARY KEY, Name TEXT, Email TEXT)")
//!         .await?;
//!
//!     let alice = User { Id: 0, Name: "Alice".into(), Email: "alice@x.com".into() };
//!     mapper.insert(&[alice]).await.into_result()?;
//!
//!     let users: Vec<User> = mapper
//!         .select(&QueryOptions::new().filter("WHERE Email = 'alice@x.com'"))
//!         .await?;
//!     for user in &users {
//!         println!("{} -> {}", user.Id, user.Name);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Project Structure
//!
//! ```text
//! src/
//! ├── core/          # Database trait, values, statements, builders, config, errors
//! ├── backends/      # SQLite and PostgreSQL implementations
//! ├── orm/           # Records, name mapping, row mapping, the Mapper
//! ├── logging.rs     # Daily log files
//! └── lib.rs
//! ```

/// Core database types and traits
pub mod core;

/// Database backend implementations
pub mod backends;

/// Record mapping
pub mod orm;

/// Log file output
pub mod logging;

/// Prelude for convenient imports
///
/// ```rust
/// use rust_record_mapper::prelude::*;
///
/// let options = QueryOptions::new().filter("WHERE Id > 10");
/// assert_eq!(options.filter_text(), Some("WHERE Id > 10"));
/// ```
pub mod prelude {
    pub use crate::core::{
        ConnectionSettings, Database, DatabaseError, DatabaseResult, DatabaseRow, DatabaseType,
        DatabaseValue, Result,
    };
    pub use crate::orm::{Mapper, MapperOptions, QueryOptions, Record, WriteOutcome};

    #[cfg(feature = "sqlite")]
    pub use crate::backends::SqliteDatabase;

    #[cfg(feature = "postgres")]
    pub use crate::backends::PostgresDatabase;
}

// Re-export at root level for convenience
pub use core::{Database, DatabaseError, DatabaseType, DatabaseValue, Result};
pub use orm::{Mapper, QueryOptions, Record, WriteOutcome};

#[cfg(test)]
mod tests {
    use super::*;

    crate::record! {
        struct Widget {
            Id: i64,
            Label: String,
        }
    }

    #[test]
    fn test_prelude_imports() {
        use prelude::*;

        let db_type = DatabaseType::Sqlite;
        assert_eq!(db_type.to_str(), "sqlite");
        assert!(db_type.is_sql());
        assert_eq!(Widget::type_name(), "Widget");
        assert!(MapperOptions::default().cache_primary_keys);
    }

    #[test]
    fn test_value_conversions() {
        use prelude::*;

        let val: DatabaseValue = 42.into();
        assert_eq!(val.as_int(), Some(42));

        let val: DatabaseValue = "test".into();
        assert_eq!(val.as_string(), "test");

        let val: DatabaseValue = true.into();
        assert_eq!(val.as_bool(), Some(true));
    }
}
