//! PostgreSQL database backend implementation
//!
//! This module provides a PostgreSQL implementation of the Database trait using tokio-postgres.

use crate::core::{
    database::Database, database_types::DatabaseType, error::DatabaseError, error::Result,
    value::DatabaseResult, value::DatabaseRow, value::DatabaseValue,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{Client, NoTls, Row};

/// Default timeout for database operations (30 seconds)
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

type BoxedParam = Box<dyn ToSql + Sync + Send>;

/// Text layout for `time` columns
const TIME_TEXT_FORMAT: &str = "%H:%M:%S%.f";

/// How a column of a given server type is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Bytes,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    Text,
}

impl ColumnKind {
    /// `None` for types with no lossless conversion (numeric, uuid, json...)
    fn of(ty: &Type) -> Option<Self> {
        let kind = match ty.name() {
            "bool" => ColumnKind::Bool,
            "int2" => ColumnKind::Int2,
            "int4" => ColumnKind::Int4,
            "int8" => ColumnKind::Int8,
            "float4" => ColumnKind::Float4,
            "float8" => ColumnKind::Float8,
            "bytea" => ColumnKind::Bytes,
            "timestamp" => ColumnKind::Timestamp,
            "timestamptz" => ColumnKind::TimestampTz,
            "date" => ColumnKind::Date,
            "time" => ColumnKind::Time,
            _ if <String as FromSql<'_>>::accepts(ty) => ColumnKind::Text,
            _ => return None,
        };
        Some(kind)
    }
}

const PRIMARY_KEY_QUERY: &str = "SELECT a.attname::text AS column_name \
     FROM pg_index i \
     JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
     WHERE i.indrelid = $1::text::regclass AND i.indisprimary \
     ORDER BY array_position(i.indkey::int2[], a.attnum)";

/// PostgreSQL database implementation
pub struct PostgresDatabase {
    client: Arc<Mutex<Option<Client>>>,
    in_transaction: Arc<Mutex<bool>>,
}

impl PostgresDatabase {
    /// Create a new PostgreSQL database instance
    pub fn new() -> Self {
        Self {
            client: Arc::new(Mutex::new(None)),
            in_transaction: Arc::new(Mutex::new(false)),
        }
    }

    /// Convert a tokio_postgres Row to a DatabaseRow
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Mapping`] naming the column and its server
    /// type when the type has no conversion or the driver cannot decode it.
    fn row_to_database_row(row: &Row) -> Result<DatabaseRow> {
        fn read<'a, T, F>(row: &'a Row, idx: usize, wrap: F) -> Result<DatabaseValue>
        where
            T: FromSql<'a>,
            F: FnOnce(T) -> DatabaseValue,
        {
            row.try_get::<_, Option<T>>(idx)
                .map(|v| v.map(wrap).unwrap_or(DatabaseValue::Null))
                .map_err(|e| {
                    let column = &row.columns()[idx];
                    DatabaseError::mapping(
                        column.name(),
                        column.type_().name(),
                        format!("undecodable value ({})", e),
                    )
                })
        }

        let mut db_row = DatabaseRow::new();

        for (idx, column) in row.columns().iter().enumerate() {
            let kind = ColumnKind::of(column.type_()).ok_or_else(|| {
                DatabaseError::mapping(
                    column.name(),
                    "a supported PostgreSQL type",
                    column.type_().name(),
                )
            })?;
            let value = match kind {
                ColumnKind::Bool => read(row, idx, DatabaseValue::Bool)?,
                ColumnKind::Int2 => read(row, idx, |v: i16| DatabaseValue::Int(v as i32))?,
                ColumnKind::Int4 => read(row, idx, DatabaseValue::Int)?,
                ColumnKind::Int8 => read(row, idx, DatabaseValue::Long)?,
                ColumnKind::Float4 => read(row, idx, DatabaseValue::Float)?,
                ColumnKind::Float8 => read(row, idx, DatabaseValue::Double)?,
                ColumnKind::Bytes => read(row, idx, DatabaseValue::Bytes)?,
                ColumnKind::Timestamp => read(row, idx, |v: NaiveDateTime| DatabaseValue::from(v))?,
                ColumnKind::TimestampTz => {
                    read(row, idx, |v: DateTime<Utc>| DatabaseValue::from(v))?
                }
                ColumnKind::Date => read(row, idx, |v: NaiveDate| {
                    DatabaseValue::from(v.and_time(NaiveTime::MIN))
                })?,
                ColumnKind::Time => read(row, idx, |v: NaiveTime| {
                    DatabaseValue::String(v.format(TIME_TEXT_FORMAT).to_string())
                })?,
                ColumnKind::Text => read(row, idx, DatabaseValue::String)?,
            };
            db_row.insert(column.name().to_string(), value);
        }

        Ok(db_row)
    }

    /// Convert a DatabaseValue into a parameter of the type the server expects
    ///
    /// Nulls become a typed `None` and numbers are narrowed or widened to the
    /// parameter's width, so callers need not know column types up front.
    fn value_to_param(value: &DatabaseValue, ty: &Type) -> Result<BoxedParam> {
        fn typed<T, F>(value: &DatabaseValue, ty: &Type, convert: F) -> Result<BoxedParam>
        where
            T: ToSql + Sync + Send + 'static,
            F: FnOnce(&DatabaseValue) -> Option<T>,
        {
            if value.is_null() {
                return Ok(Box::new(None::<T>));
            }
            match convert(value) {
                Some(v) => Ok(Box::new(v)),
                None => Err(DatabaseError::type_mismatch(ty.name(), value.type_name())),
            }
        }

        match ty.name() {
            "bool" => typed(value, ty, DatabaseValue::as_bool),
            "int2" => typed(value, ty, |v| {
                v.as_long().and_then(|n| i16::try_from(n).ok())
            }),
            "int4" => typed(value, ty, DatabaseValue::as_int),
            "int8" => typed(value, ty, DatabaseValue::as_long),
            "float4" => typed(value, ty, DatabaseValue::as_float),
            "float8" => typed(value, ty, DatabaseValue::as_double),
            "bytea" => typed(value, ty, |v| v.as_bytes().map(<[u8]>::to_vec)),
            "timestamp" => typed(value, ty, DatabaseValue::as_datetime),
            "timestamptz" => typed(value, ty, |v| v.as_datetime().map(|dt| dt.and_utc())),
            "date" => typed(value, ty, |v| v.as_datetime().map(|dt| dt.date())),
            "time" => typed(value, ty, |v| {
                v.as_text()
                    .and_then(|t| NaiveTime::parse_from_str(t.trim(), TIME_TEXT_FORMAT).ok())
            }),
            _ => typed(value, ty, DatabaseValue::as_text),
        }
    }

    async fn with_timeout<T, F>(future: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, tokio_postgres::Error>>,
    {
        tokio::time::timeout(DEFAULT_OPERATION_TIMEOUT, future)
            .await
            .map_err(|_| {
                DatabaseError::query_timeout(DEFAULT_OPERATION_TIMEOUT.as_millis() as u64)
            })?
            .map_err(|e| DatabaseError::query(e.to_string()))
    }

    /// Prepare `query` and convert `params` against its parameter types
    async fn prepare(
        client: &Client,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<(tokio_postgres::Statement, Vec<BoxedParam>)> {
        let statement = Self::with_timeout(client.prepare(query)).await?;

        if statement.params().len() != params.len() {
            return Err(DatabaseError::query(format!(
                "statement expects {} parameters, {} supplied",
                statement.params().len(),
                params.len()
            )));
        }

        let boxed = params
            .iter()
            .zip(statement.params())
            .map(|(value, ty)| Self::value_to_param(value, ty))
            .collect::<Result<Vec<_>>>()?;

        Ok((statement, boxed))
    }

    async fn transaction_control(&self, sql: &str, expect_open: bool) -> Result<()> {
        let mut in_transaction = self.in_transaction.lock().await;

        if *in_transaction != expect_open {
            let message = if expect_open {
                "Not in a transaction"
            } else {
                "Already in a transaction"
            };
            return Err(DatabaseError::transaction(message));
        }

        let client = self.client.lock().await;
        let client = client
            .as_ref()
            .ok_or_else(|| DatabaseError::connection("Not connected to database"))?;

        Self::with_timeout(client.execute(sql, &[]))
            .await
            .map_err(|e| DatabaseError::transaction(e.to_string()))?;

        *in_transaction = !expect_open;
        Ok(())
    }
}

impl Default for PostgresDatabase {
    fn default() -> Self {
        Self::new()
    }
}

fn param_refs(params: &[BoxedParam]) -> Vec<&(dyn ToSql + Sync)> {
    params
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

#[async_trait]
impl Database for PostgresDatabase {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    async fn connect(&self, connection_string: &str) -> Result<()> {
        {
            let mut client = self.client.lock().await;
            *client = None;
        }
        {
            let mut in_transaction = self.in_transaction.lock().await;
            *in_transaction = false;
        }

        let connection_string = connection_string.to_string();
        let client_arc = Arc::clone(&self.client);

        let connect_future = async move {
            let (client, connection) = tokio_postgres::connect(&connection_string, NoTls)
                .await
                .map_err(|e| DatabaseError::connection(e.to_string()))?;

            // The connection object drives the socket; it ends when the client is dropped.
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
            });

            let mut client_guard = client_arc.lock().await;
            *client_guard = Some(client);

            Ok::<(), DatabaseError>(())
        };

        tokio::time::timeout(DEFAULT_OPERATION_TIMEOUT, connect_future)
            .await
            .map_err(|_| {
                DatabaseError::connection_timeout(DEFAULT_OPERATION_TIMEOUT.as_millis() as u64)
            })??;

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.client
            .try_lock()
            .map(|client| client.as_ref().is_some_and(|c| !c.is_closed()))
            .unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        {
            let mut in_transaction = self.in_transaction.lock().await;
            *in_transaction = false;
        }

        let mut client = self.client.lock().await;
        *client = None;
        Ok(())
    }

    async fn execute(&self, query: &str) -> Result<u64> {
        let client = self.client.lock().await;
        let client = client
            .as_ref()
            .ok_or_else(|| DatabaseError::connection("Not connected to database"))?;

        Self::with_timeout(client.execute(query, &[])).await
    }

    async fn query(&self, query: &str) -> Result<DatabaseResult> {
        self.query_with_params(query, &[]).await
    }

    async fn query_with_params(
        &self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<DatabaseResult> {
        let client = self.client.lock().await;
        let client = client
            .as_ref()
            .ok_or_else(|| DatabaseError::connection("Not connected to database"))?;

        let (statement, boxed) = Self::prepare(client, query, params).await?;
        let rows = Self::with_timeout(client.query(&statement, &param_refs(&boxed))).await?;

        rows.iter().map(Self::row_to_database_row).collect()
    }

    async fn execute_with_params(&self, query: &str, params: &[DatabaseValue]) -> Result<u64> {
        let client = self.client.lock().await;
        let client = client
            .as_ref()
            .ok_or_else(|| DatabaseError::connection("Not connected to database"))?;

        let (statement, boxed) = Self::prepare(client, query, params).await?;
        Self::with_timeout(client.execute(&statement, &param_refs(&boxed))).await
    }

    async fn begin_transaction(&self) -> Result<()> {
        self.transaction_control("BEGIN", false).await
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
        let rows = self
            .query_with_params(PRIMARY_KEY_QUERY, &[DatabaseValue::from(table)])
            .await?;

        Ok(rows
            .iter()
            .filter_map(|row| row.get("column_name").and_then(DatabaseValue::as_text))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_postgres_url() -> Option<String> {
        std::env::var("POSTGRES_URL").ok()
    }

    #[test]
    fn test_value_to_param_follows_parameter_type() {
        assert!(PostgresDatabase::value_to_param(&DatabaseValue::Null, &Type::TEXT).is_ok());
        assert!(PostgresDatabase::value_to_param(&DatabaseValue::Long(5), &Type::INT4).is_ok());
        assert!(
            PostgresDatabase::value_to_param(&DatabaseValue::Long(i64::MAX), &Type::INT4).is_err()
        );
        assert!(PostgresDatabase::value_to_param(
            &DatabaseValue::from("not a number"),
            &Type::INT8
        )
        .is_err());
    }

    #[test]
    fn test_column_kind_by_server_type() {
        assert_eq!(ColumnKind::of(&Type::INT8), Some(ColumnKind::Int8));
        assert_eq!(ColumnKind::of(&Type::DATE), Some(ColumnKind::Date));
        assert_eq!(ColumnKind::of(&Type::TIME), Some(ColumnKind::Time));
        assert_eq!(ColumnKind::of(&Type::TEXT), Some(ColumnKind::Text));
        assert_eq!(ColumnKind::of(&Type::VARCHAR), Some(ColumnKind::Text));
        assert_eq!(ColumnKind::of(&Type::BPCHAR), Some(ColumnKind::Text));
    }

    #[test]
    fn test_unsupported_column_types_have_no_kind() {
        for ty in [Type::NUMERIC, Type::UUID, Type::JSON, Type::JSONB, Type::INTERVAL] {
            assert_eq!(ColumnKind::of(&ty), None, "{} should be unsupported", ty.name());
        }
    }

    #[test]
    fn test_date_and_time_params() {
        assert!(PostgresDatabase::value_to_param(&DatabaseValue::from("2024-05-17"), &Type::DATE)
            .is_ok());
        assert!(
            PostgresDatabase::value_to_param(&DatabaseValue::from("08:15:30.25"), &Type::TIME)
                .is_ok()
        );
        assert!(
            PostgresDatabase::value_to_param(&DatabaseValue::from("noon"), &Type::TIME).is_err()
        );
    }

    #[tokio::test]
    #[ignore] // Run with: cargo test --features postgres -- --ignored
    async fn test_postgres_unsupported_column_fails() -> Result<()> {
        let url = match get_postgres_url() {
            Some(url) => url,
            None => {
                eprintln!("Skipping test: POSTGRES_URL not set");
                return Ok(());
            }
        };

        let db = PostgresDatabase::new();
        db.connect(&url).await?;

        match db.query("SELECT 1.5::numeric AS amount").await {
            Err(DatabaseError::Mapping { field, actual, .. }) => {
                assert_eq!(field, "amount");
                assert_eq!(actual, "numeric");
            }
            other => panic!("expected mapping error, got {:?}", other),
        }

        let rows = db
            .query("SELECT DATE '2024-05-17' AS day, TIME '08:15:30' AS at")
            .await?;
        assert_eq!(
            rows[0].get("day").and_then(DatabaseValue::as_datetime),
            NaiveDate::from_ymd_opt(2024, 5, 17).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert_eq!(rows[0].get("at"), Some(&DatabaseValue::from("08:15:30")));
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Run with: cargo test --features postgres -- --ignored
    async fn test_postgres_primary_keys() -> Result<()> {
        let url = match get_postgres_url() {
            Some(url) => url,
            None => {
                eprintln!("Skipping test: POSTGRES_URL not set");
                return Ok(());
            }
        };

        let db = PostgresDatabase::new();
        db.connect(&url).await?;

        let _ = db.execute("DROP TABLE IF EXISTS pk_sample").await;
        db.execute("CREATE TABLE pk_sample (a INT, b INT, c TEXT, PRIMARY KEY (b, a))")
            .await?;

        assert_eq!(db.primary_keys("pk_sample").await?, vec!["b", "a"]);
        assert!(db.primary_keys("pk_missing").await.is_err());

        db.execute("DROP TABLE pk_sample").await?;
        Ok(())
    }

    #[tokio::test]
    #[ignore] // Run with: cargo test --features postgres -- --ignored
    async fn test_postgres_transaction() -> Result<()> {
        let url = match get_postgres_url() {
            Some(url) => url,
            None => {
                eprintln!("Skipping test: POSTGRES_URL not set");
                return Ok(());
            }
        };

        let db = PostgresDatabase::new();
        db.connect(&url).await?;

        let _ = db.execute("DROP TABLE IF EXISTS test_transaction").await;
        db.execute("CREATE TABLE test_transaction (id SERIAL PRIMARY KEY, name TEXT)")
            .await?;

        db.begin_transaction().await?;
        db.execute_with_params(
            "INSERT INTO test_transaction (name) VALUES ($1)",
            &[DatabaseValue::from("Alice")],
        )
        .await?;
        db.commit().await?;

        db.begin_transaction().await?;
        db.execute_with_params(
            "INSERT INTO test_transaction (name) VALUES ($1)",
            &[DatabaseValue::Null],
        )
        .await?;
        db.rollback().await?;

        let results = db.query("SELECT * FROM test_transaction").await?;
        assert_eq!(results.len(), 1);

        db.execute("DROP TABLE test_transaction").await?;
        Ok(())
    }
}
