//! SQLite database backend implementation
//!
//! rusqlite is synchronous, so every call runs on the blocking thread pool
//! under [`DEFAULT_OPERATION_TIMEOUT`].

use crate::core::{
    database::Database, database_types::DatabaseType, error::DatabaseError, error::Result,
    value::DatabaseResult, value::DatabaseRow, value::DatabaseValue,
};
use async_trait::async_trait;
use rusqlite::{params_from_iter, Connection, Row};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Default timeout for database operations (30 seconds)
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

type SharedConnection = Arc<Mutex<Option<Connection>>>;

/// SQLite database implementation
pub struct SqliteDatabase {
    connection: SharedConnection,
    in_transaction: Arc<Mutex<bool>>,
}

impl SqliteDatabase {
    /// Create a new, unconnected SQLite database handle
    pub fn new() -> Self {
        Self {
            connection: Arc::new(Mutex::new(None)),
            in_transaction: Arc::new(Mutex::new(false)),
        }
    }

    /// Convert a rusqlite Row to a DatabaseRow
    fn row_to_database_row(row: &Row) -> rusqlite::Result<DatabaseRow> {
        let mut db_row = DatabaseRow::new();
        let column_count = row.as_ref().column_count();

        for i in 0..column_count {
            let column_name = row.as_ref().column_name(i)?.to_string();
            let value = match row.get_ref(i)? {
                rusqlite::types::ValueRef::Null => DatabaseValue::Null,
                rusqlite::types::ValueRef::Integer(v) => DatabaseValue::Long(v),
                rusqlite::types::ValueRef::Real(v) => DatabaseValue::Double(v),
                // SQLite does not validate TEXT; keep invalid UTF-8 as raw bytes
                rusqlite::types::ValueRef::Text(v) => match std::str::from_utf8(v) {
                    Ok(text) => DatabaseValue::String(text.to_string()),
                    Err(_) => DatabaseValue::Bytes(v.to_vec()),
                },
                rusqlite::types::ValueRef::Blob(v) => DatabaseValue::Bytes(v.to_vec()),
            };
            db_row.insert(column_name, value);
        }

        Ok(db_row)
    }

    /// Convert DatabaseValue to rusqlite parameter
    ///
    /// SQLite has no timestamp type; timestamps are stored as
    /// `YYYY-MM-DD HH:MM:SS.ffffff` text, which sorts chronologically.
    fn value_to_param(value: &DatabaseValue) -> Box<dyn rusqlite::ToSql> {
        match value {
            DatabaseValue::Null => Box::new(None::<i64>),
            DatabaseValue::Bool(v) => Box::new(*v),
            DatabaseValue::Int(v) => Box::new(*v),
            DatabaseValue::Long(v) => Box::new(*v),
            DatabaseValue::Float(v) => Box::new(*v as f64),
            DatabaseValue::Double(v) => Box::new(*v),
            DatabaseValue::String(v) => Box::new(v.clone()),
            DatabaseValue::Bytes(v) => Box::new(v.clone()),
            DatabaseValue::Timestamp(_) => Box::new(value.as_text()),
        }
    }

    fn collect_rows(
        conn: &Connection,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<DatabaseResult> {
        let rusqlite_params: Vec<Box<dyn rusqlite::ToSql>> =
            params.iter().map(Self::value_to_param).collect();

        let mut stmt = conn.prepare(query)?;
        let rows = stmt.query_map(
            params_from_iter(rusqlite_params.iter()),
            Self::row_to_database_row,
        )?;

        let mut results = Vec::new();
        for row_result in rows {
            results.push(row_result?);
        }
        Ok(results)
    }

    /// Run `f` against the open connection on the blocking pool
    ///
    /// The task is aborted when it outlives the operation timeout.
    async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let connection_arc = Arc::clone(&self.connection);

        let mut task = tokio::task::spawn_blocking(move || -> Result<T> {
            let connection = connection_arc.blocking_lock();
            let conn = connection
                .as_ref()
                .ok_or_else(|| DatabaseError::connection("Not connected to database"))?;
            f(conn)
        });

        tokio::select! {
            result = &mut task => {
                result.map_err(|e| DatabaseError::other(format!("Task join error: {}", e)))?
            }
            _ = tokio::time::sleep(DEFAULT_OPERATION_TIMEOUT) => {
                task.abort();
                Err(DatabaseError::query_timeout(DEFAULT_OPERATION_TIMEOUT.as_millis() as u64))
            }
        }
    }

    /// Run a transaction control statement and flip the transaction flag
    async fn transaction_control(&self, sql: &'static str, expect_open: bool) -> Result<()> {
        let in_transaction_arc = Arc::clone(&self.in_transaction);

        self.run_blocking(move |conn| {
            let mut in_transaction = in_transaction_arc.blocking_lock();

            if *in_transaction != expect_open {
                let message = if expect_open {
                    "Not in a transaction"
                } else {
                    "Already in a transaction"
                };
                return Err(DatabaseError::transaction(message));
            }

            // Execute SQL first, only flip the flag on success
            conn.execute(sql, [])?;
            *in_transaction = !expect_open;

            Ok(())
        })
        .await
    }
}

impl Default for SqliteDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    async fn connect(&self, connection_string: &str) -> Result<()> {
        // Clean up any existing connection first
        {
            let mut connection = self.connection.lock().await;
            *connection = None;
        }
        {
            let mut in_transaction = self.in_transaction.lock().await;
            *in_transaction = false;
        }

        let connection_string = connection_string.to_string();
        let connection_arc = Arc::clone(&self.connection);

        let mut task = tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = Connection::open(&connection_string)?;
            conn.execute("PRAGMA foreign_keys = ON", [])?;

            let mut connection = connection_arc.blocking_lock();
            *connection = Some(conn);
            Ok(())
        });

        tokio::select! {
            result = &mut task => {
                result.map_err(|e| DatabaseError::other(format!("Task join error: {}", e)))?
            }
            _ = tokio::time::sleep(DEFAULT_OPERATION_TIMEOUT) => {
                task.abort();
                Err(DatabaseError::connection_timeout(DEFAULT_OPERATION_TIMEOUT.as_millis() as u64))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connection
            .try_lock()
            .map(|conn| conn.is_some())
            .unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        {
            let mut in_transaction = self.in_transaction.lock().await;
            *in_transaction = false;
        }

        // Dropping the connection closes it; SQLite discards any open transaction.
        let mut connection = self.connection.lock().await;
        *connection = None;
        Ok(())
    }

    async fn execute(&self, query: &str) -> Result<u64> {
        let query = query.to_string();
        self.run_blocking(move |conn| Ok(conn.execute(&query, [])? as u64))
            .await
    }

    async fn query(&self, query: &str) -> Result<DatabaseResult> {
        let query = query.to_string();
        self.run_blocking(move |conn| Self::collect_rows(conn, &query, &[]))
            .await
    }

    async fn query_with_params(
        &self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<DatabaseResult> {
        let query = query.to_string();
        let params = params.to_vec();
        self.run_blocking(move |conn| Self::collect_rows(conn, &query, &params))
            .await
    }

    async fn execute_with_params(&self, query: &str, params: &[DatabaseValue]) -> Result<u64> {
        let query = query.to_string();
        let params = params.to_vec();
        self.run_blocking(move |conn| {
            let rusqlite_params: Vec<Box<dyn rusqlite::ToSql>> =
                params.iter().map(Self::value_to_param).collect();

            let mut stmt = conn.prepare(&query)?;
            let affected = stmt.execute(params_from_iter(rusqlite_params.iter()))?;
            Ok(affected as u64)
        })
        .await
    }

    async fn begin_transaction(&self) -> Result<()> {
        self.transaction_control("BEGIN TRANSACTION", false).await
    }

    async fn commit(&self) -> Result<()> {
        self.transaction_control("COMMIT", true).await
    }

    async fn rollback(&self) -> Result<()> {
        self.transaction_control("ROLLBACK", true).await
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
            .try_lock()
            .map(|guard| *guard)
            .unwrap_or(false)
    }

    async fn primary_keys(&self, table: &str) -> Result<Vec<String>> {
        let table = table.to_string();
        self.run_blocking(move |conn| {
            let (schema, name) = match table.split_once('.') {
                Some((schema, name)) => (schema.to_string(), name.to_string()),
                None => ("main".to_string(), table.clone()),
            };

            let mut stmt = conn.prepare("SELECT name, pk FROM pragma_table_info(?1, ?2)")?;
            let columns = stmt
                .query_map([&name, &schema], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            // pragma_table_info yields no rows at all for an unknown table
            if columns.is_empty() {
                return Err(DatabaseError::TableNotFound(table));
            }

            let mut keys: Vec<(i64, String)> = columns
                .into_iter()
                .filter(|(_, pk)| *pk > 0)
                .map(|(column, pk)| (pk, column))
                .collect();
            keys.sort_by_key(|(pk, _)| *pk);

            Ok(keys.into_iter().map(|(_, column)| column).collect())
        })
        .await
    }
}

impl Drop for SqliteDatabase {
    fn drop(&mut self) {
        // Best-effort cleanup since Drop cannot be async
        if let Ok(in_trans) = self.in_transaction.try_lock() {
            if *in_trans {
                if let Ok(connection) = self.connection.try_lock() {
                    if let Some(conn) = connection.as_ref() {
                        let _ = conn.execute("ROLLBACK", []);
                    }
                }
            }
        }
    }
}
