//! Database trait and connection string building
//!
//! This module defines the connection collaborator the mapper drives. Every
//! backend exposes open/close, raw and parameterized execution, transaction
//! control and the primary-key metadata lookup the SQL builder depends on.

use super::database_types::{DatabaseType, PlaceholderStyle};
use super::error::Result;
use super::value::{DatabaseResult, DatabaseValue};
use async_trait::async_trait;

/// Core database trait that all database backends must implement
#[async_trait]
pub trait Database: Send + Sync {
    /// Get the database type
    fn database_type(&self) -> DatabaseType;

    /// Parameter syntax this backend expects in statement text
    fn placeholder_style(&self) -> PlaceholderStyle {
        self.database_type().placeholder_style()
    }

    /// Connect to the database with the given connection string
    ///
    /// Connecting an already connected handle replaces the old connection.
    async fn connect(&self, connection_string: &str) -> Result<()>;

    /// Check if connected to the database
    fn is_connected(&self) -> bool;

    /// Disconnect from the database
    ///
    /// An open transaction is rolled back by the server when the connection
    /// goes away.
    async fn disconnect(&self) -> Result<()>;

    /// Execute a statement that doesn't return rows
    ///
    /// # Security Warning
    ///
    /// The text is sent verbatim. Never splice user input into it; use
    /// [`Database::execute_with_params`] instead.
    async fn execute(&self, query: &str) -> Result<u64>;

    /// Execute a SELECT query and return results
    ///
    /// # Security Warning
    ///
    /// The text is sent verbatim. Never splice user input into it; use
    /// [`Database::query_with_params`] instead.
    async fn query(&self, query: &str) -> Result<DatabaseResult>;

    /// Execute a query with positional parameters (prepared statement)
    ///
    /// `params` must already be ordered for this backend's
    /// [`PlaceholderStyle`].
    async fn query_with_params(
        &self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<DatabaseResult>;

    /// Execute a statement with positional parameters that doesn't return rows
    async fn execute_with_params(&self, query: &str, params: &[DatabaseValue]) -> Result<u64>;

    /// Begin a transaction
    ///
    /// Only one transaction can be active at a time per connection.
    async fn begin_transaction(&self) -> Result<()>;

    /// Commit the current transaction
    async fn commit(&self) -> Result<()>;

    /// Rollback the current transaction
    async fn rollback(&self) -> Result<()>;

    /// Check if currently in a transaction
    fn in_transaction(&self) -> bool;

    /// Primary-key column names of `table`, in key order
    ///
    /// Issues a metadata query against the live database. Requires an open
    /// connection. A table without a primary key yields an empty list; a
    /// missing table is an error.
    async fn primary_keys(&self, table: &str) -> Result<Vec<String>>;
}

/// Database connection builder
#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
    db_type: DatabaseType,
    host: Option<String>,
    port: Option<u16>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    options: std::collections::BTreeMap<String, String>,
}

impl ConnectionBuilder {
    /// Create a new connection builder for the specified database type
    pub fn new(db_type: DatabaseType) -> Self {
        Self {
            db_type,
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            options: std::collections::BTreeMap::new(),
        }
    }

    /// Set the database host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the database port
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the database name (the file path for SQLite)
    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the username
    pub fn username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password
    pub fn password<S: Into<String>>(mut self, password: S) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Add a custom option
    pub fn option<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Build the connection string
    pub fn build_connection_string(&self) -> String {
        match self.db_type {
            DatabaseType::Sqlite => self
                .database
                .clone()
                .unwrap_or_else(|| ":memory:".to_string()),
            DatabaseType::Postgres => {
                let mut parts = Vec::new();
                if let Some(host) = &self.host {
                    parts.push(format!("host={}", host));
                }
                if let Some(port) = self.port {
                    parts.push(format!("port={}", port));
                }
                if let Some(database) = &self.database {
                    parts.push(format!("dbname={}", database));
                }
                if let Some(username) = &self.username {
                    parts.push(format!("user={}", username));
                }
                if let Some(password) = &self.password {
                    parts.push(format!("password={}", quote_libpq_value(password)));
                }
                for (key, value) in &self.options {
                    parts.push(format!("{}={}", key, quote_libpq_value(value)));
                }
                parts.join(" ")
            }
            DatabaseType::None => String::new(),
        }
    }
}

/// Quote a key/value connection-string value when it contains spaces or quotes
fn quote_libpq_value(value: &str) -> String {
    if !value.is_empty() && !value.contains([' ', '\'', '\\']) {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_builder_sqlite() {
        let builder = ConnectionBuilder::new(DatabaseType::Sqlite).database("test.db");
        assert_eq!(builder.build_connection_string(), "test.db");

        let builder = ConnectionBuilder::new(DatabaseType::Sqlite);
        assert_eq!(builder.build_connection_string(), ":memory:");
    }

    #[test]
    fn test_connection_builder_postgres() {
        let builder = ConnectionBuilder::new(DatabaseType::Postgres)
            .host("localhost")
            .port(5432)
            .database("mydb")
            .username("user")
            .password("p@ss word");

        assert_eq!(
            builder.build_connection_string(),
            "host=localhost port=5432 dbname=mydb user=user password='p@ss word'"
        );
    }
}
