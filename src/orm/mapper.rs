//! Record CRUD over a [`Database`]
//!
//! Every operation opens the connection, does its work and disconnects
//! again, whether the work succeeded or not. Batch writes run inside one
//! transaction: either every record is written or none is.

use super::mapping::{MappedField, MappingRegistry, PrimaryKeyCache};
use super::record::Record;
use super::row::map_rows;
use super::statements::{
    delete_all_statement, delete_statement, insert_statement, select_statement,
    update_statement, QueryOptions,
};
use crate::core::config::ConnectionSettings;
use crate::core::database::Database;
use crate::core::error::{DatabaseError, Result};
use crate::core::statement::Statement;
use crate::core::transaction::TransactionGuard;
use crate::core::value::DatabaseResult;
use std::future::Future;

/// Mapper behavior switches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperOptions {
    /// Remember discovered primary keys per table
    pub cache_primary_keys: bool,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            cache_primary_keys: true,
        }
    }
}

/// Result of a batch write
///
/// Write operations report failure through the outcome rather than a
/// `Result` so callers can branch on [`WriteOutcome::succeeded`]; the cause
/// stays available through [`WriteOutcome::error`].
#[derive(Debug)]
pub struct WriteOutcome {
    result: Result<u64>,
}

impl WriteOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    /// Rows affected across the batch, if it committed
    pub fn rows_affected(&self) -> Option<u64> {
        self.result.as_ref().ok().copied()
    }

    pub fn error(&self) -> Option<&DatabaseError> {
        self.result.as_ref().err()
    }

    pub fn into_result(self) -> Result<u64> {
        self.result
    }
}

impl From<Result<u64>> for WriteOutcome {
    fn from(result: Result<u64>) -> Self {
        Self { result }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteKind {
    Insert,
    Update,
    Delete,
}

impl WriteKind {
    fn name(&self) -> &'static str {
        match self {
            WriteKind::Insert => "insert",
            WriteKind::Update => "update",
            WriteKind::Delete => "delete",
        }
    }
}

/// Maps records of any [`Record`] type onto one database
pub struct Mapper<D: Database> {
    db: D,
    connection_string: String,
    registry: MappingRegistry,
    key_cache: PrimaryKeyCache,
    options: MapperOptions,
}

impl<D: Database> Mapper<D> {
    /// Create a mapper that connects with `connection_string`
    pub fn new(db: D, connection_string: impl Into<String>) -> Self {
        Self::with_options(db, connection_string, MapperOptions::default())
    }

    pub fn with_options(
        db: D,
        connection_string: impl Into<String>,
        options: MapperOptions,
    ) -> Self {
        Self {
            db,
            connection_string: connection_string.into(),
            registry: MappingRegistry::new(),
            key_cache: PrimaryKeyCache::new(),
            options,
        }
    }

    /// Create a mapper from loaded connection settings
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Configuration`] when the configured driver
    /// does not match the backend.
    pub fn from_settings(db: D, settings: &ConnectionSettings) -> Result<Self> {
        if settings.driver != db.database_type() {
            return Err(DatabaseError::configuration(
                "driver",
                format!(
                    "configured driver '{}' does not match the {} backend",
                    settings.driver,
                    db.database_type()
                ),
            ));
        }
        Ok(Self::new(db, settings.connection_string()))
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    pub fn key_cache(&self) -> &PrimaryKeyCache {
        &self.key_cache
    }

    pub fn options(&self) -> &MapperOptions {
        &self.options
    }

    /// Load every row of `T`'s table (narrowed by the options' filter)
    ///
    /// # Example
    ///
    /// ```ignore
    /// let active: Vec<User> = mapper
    ///     .select(&QueryOptions::new().filter("WHERE Active = 1"))
    ///     .await?;
    /// ```
    pub async fn select<T: Record>(&self, options: &QueryOptions) -> Result<Vec<T>> {
        self.scoped("select", || async move {
            let table = self.registry.table_name::<T>();
            let statement = select_statement(&table, options)?;
            let rows = self.run_query(&statement).await?;
            let fields = self.registry.columns::<T>();
            let records = map_rows(&rows, &fields)?;
            tracing::debug!(
                record = T::type_name(),
                rows = records.len(),
                "select mapped rows"
            );
            Ok(records)
        })
        .await
    }

    /// Insert every record in one transaction
    pub async fn insert<T: Record>(&self, records: &[T]) -> WriteOutcome {
        self.write_batch(records, WriteKind::Insert).await
    }

    /// Update every record by primary key in one transaction
    pub async fn update<T: Record>(&self, records: &[T]) -> WriteOutcome {
        self.write_batch(records, WriteKind::Update).await
    }

    /// Delete every record by primary key in one transaction
    pub async fn delete<T: Record>(&self, records: &[T]) -> WriteOutcome {
        self.write_batch(records, WriteKind::Delete).await
    }

    /// Delete the rows of `T`'s table matching the options' filter, or all
    /// of them when there is none
    pub async fn delete_all<T: Record>(&self, options: &QueryOptions) -> WriteOutcome {
        self.scoped("delete_all", || async move {
            let table = self.registry.table_name::<T>();
            let statement = delete_all_statement(&table, options)?;
            self.run_execute(&statement).await
        })
        .await
        .into()
    }

    /// Execute a raw statement and return the affected row count
    pub async fn execute_raw(&self, sql: &str) -> Result<u64> {
        self.scoped("execute_raw", || async move {
            tracing::debug!(sql, "executing raw statement");
            self.db.execute(sql).await
        })
        .await
    }

    /// Run a raw query and return its rows unmapped
    pub async fn query_raw(&self, sql: &str) -> Result<DatabaseResult> {
        self.scoped("query_raw", || async move {
            tracing::debug!(sql, "running raw query");
            self.db.query(sql).await
        })
        .await
    }

    /// Primary key columns of `T`'s table, in key order
    pub async fn primary_keys<T: Record>(&self) -> Result<Vec<String>> {
        self.scoped("primary_keys", || async move {
            let table = self.registry.table_name::<T>();
            self.resolve_keys(&table).await
        })
        .await
    }

    /// Run `work` on an open connection and always disconnect afterwards
    async fn scoped<R, F, Fut>(&self, operation: &'static str, work: F) -> Result<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let result = match self.db.connect(&self.connection_string).await {
            Ok(()) => work().await,
            Err(e) => Err(e),
        };

        if let Err(e) = self.db.disconnect().await {
            tracing::warn!(operation, error = %e, "disconnect failed");
        }
        if let Err(e) = &result {
            tracing::error!(operation, error = %e, "database operation failed");
        }
        result
    }

    async fn write_batch<T: Record>(&self, records: &[T], kind: WriteKind) -> WriteOutcome {
        if records.is_empty() {
            return WriteOutcome::from(Ok(0));
        }

        self.scoped(kind.name(), || async move {
            let tx = TransactionGuard::begin(&self.db).await?;
            match self.apply_batch(&tx, records, kind).await {
                Ok(affected) => {
                    tx.commit().await?;
                    tracing::info!(
                        record = T::type_name(),
                        operation = kind.name(),
                        records = records.len(),
                        affected,
                        "batch committed"
                    );
                    Ok(affected)
                }
                Err(e) => {
                    if let Err(rollback_error) = tx.rollback().await {
                        tracing::warn!(error = %rollback_error, "rollback failed");
                    }
                    Err(e)
                }
            }
        })
        .await
        .into()
    }

    async fn apply_batch<T: Record>(
        &self,
        tx: &TransactionGuard<'_, D>,
        records: &[T],
        kind: WriteKind,
    ) -> Result<u64> {
        let table = self.registry.table_name::<T>();
        let fields = self.registry.columns::<T>();
        let keys = match kind {
            WriteKind::Insert => Vec::new(),
            WriteKind::Update | WriteKind::Delete => self.resolve_keys(&table).await?,
        };

        let mut affected = 0;
        for record in records {
            let statement = Self::write_statement(kind, &table, &fields, &keys, record)?;
            let (sql, values) = statement.render(self.db.placeholder_style())?;
            tracing::debug!(sql = %sql, params = values.len(), "executing statement");
            affected += tx.execute_with_params(&sql, &values).await?;
        }
        Ok(affected)
    }

    fn write_statement<T: Record>(
        kind: WriteKind,
        table: &str,
        fields: &[MappedField<T>],
        keys: &[String],
        record: &T,
    ) -> Result<Statement> {
        match kind {
            WriteKind::Insert => insert_statement(table, fields, record),
            WriteKind::Update => update_statement(table, fields, keys, record),
            WriteKind::Delete => delete_statement(table, fields, keys, record),
        }
    }

    async fn resolve_keys(&self, table: &str) -> Result<Vec<String>> {
        if self.options.cache_primary_keys {
            if let Some(keys) = self.key_cache.get(table) {
                return Ok(keys);
            }
        }

        let keys = self.db.primary_keys(table).await?;
        tracing::debug!(table, keys = ?keys, "resolved primary keys");
        if self.options.cache_primary_keys {
            self.key_cache.insert(table, keys.clone());
        }
        Ok(keys)
    }

    async fn run_query(&self, statement: &Statement) -> Result<DatabaseResult> {
        if statement.params().is_empty() {
            tracing::debug!(sql = %statement.sql(), "running query");
            return self.db.query(statement.sql()).await;
        }
        let (sql, values) = statement.render(self.db.placeholder_style())?;
        tracing::debug!(sql = %sql, params = values.len(), "running query");
        self.db.query_with_params(&sql, &values).await
    }

    /// Statements without parameters (raw overrides, filter-only deletes)
    /// are sent exactly as the caller wrote them
    async fn run_execute(&self, statement: &Statement) -> Result<u64> {
        if statement.params().is_empty() {
            tracing::debug!(sql = %statement.sql(), "executing statement");
            return self.db.execute(statement.sql()).await;
        }
        let (sql, values) = statement.render(self.db.placeholder_style())?;
        tracing::debug!(sql = %sql, params = values.len(), "executing statement");
        self.db.execute_with_params(&sql, &values).await
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::backends::SqliteDatabase;
    use tempfile::TempDir;

    crate::record! {
        #[derive(Debug, Clone, PartialEq)]
        struct Account {
            #[auto]
            Id: i64,
            Owner: String,
            Balance: f64,
        }
    }

    async fn mapper() -> (TempDir, Mapper<SqliteDatabase>) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.db");
        let mapper = Mapper::new(SqliteDatabase::new(), path.to_string_lossy());
        mapper
            .execute_raw(
                "CREATE TABLE Account (Id INTEGER PRIMARY KEY AUTOINCREMENT, \
                 Owner TEXT NOT NULL, Balance REAL NOT NULL)",
            )
            .await
            .unwrap();
        (dir, mapper)
    }

    fn account(owner: &str, balance: f64) -> Account {
        Account {
            Id: 0,
            Owner: owner.to_string(),
            Balance: balance,
        }
    }

    #[tokio::test]
    async fn test_connection_closed_after_each_operation() {
        let (_dir, mapper) = mapper().await;
        assert!(!mapper.database().is_connected());

        let outcome = mapper.insert(&[account("ann", 10.0)]).await;
        assert!(outcome.succeeded());
        assert!(!mapper.database().is_connected());

        let accounts: Vec<Account> = mapper.select(&QueryOptions::new()).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert!(!mapper.database().is_connected());
    }

    #[tokio::test]
    async fn test_connection_closed_after_failure() {
        let (_dir, mapper) = mapper().await;
        let result = mapper.execute_raw("NOT VALID SQL").await;
        assert!(result.is_err());
        assert!(!mapper.database().is_connected());
    }

    #[tokio::test]
    async fn test_empty_batch_succeeds_without_connecting() {
        let mapper = Mapper::new(SqliteDatabase::new(), "/nonexistent/dir/x.db");
        let outcome = mapper.insert::<Account>(&[]).await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.rows_affected(), Some(0));
    }

    #[tokio::test]
    async fn test_primary_keys_are_cached() {
        let (_dir, mapper) = mapper().await;
        assert!(mapper.key_cache().is_empty());

        let keys = mapper.primary_keys::<Account>().await.unwrap();
        assert_eq!(keys, vec!["Id".to_string()]);
        assert_eq!(mapper.key_cache().get("Account"), Some(keys));
    }

    #[tokio::test]
    async fn test_primary_key_cache_can_be_disabled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nocache.db");
        let mapper = Mapper::with_options(
            SqliteDatabase::new(),
            path.to_string_lossy(),
            MapperOptions {
                cache_primary_keys: false,
            },
        );
        mapper
            .execute_raw("CREATE TABLE Account (Id INTEGER PRIMARY KEY, Owner TEXT, Balance REAL)")
            .await
            .unwrap();

        mapper.primary_keys::<Account>().await.unwrap();
        assert!(mapper.key_cache().is_empty());
    }

    #[tokio::test]
    async fn test_from_settings_rejects_driver_mismatch() {
        let settings = ConnectionSettings {
            driver: crate::core::DatabaseType::Postgres,
            host: "localhost".to_string(),
            port: 5432,
            user: "app".to_string(),
            password: "secret".to_string(),
            database: "app".to_string(),
        };
        let err = Mapper::from_settings(SqliteDatabase::new(), &settings)
            .err()
            .unwrap();
        assert!(matches!(err, DatabaseError::Configuration { .. }));
    }
}
