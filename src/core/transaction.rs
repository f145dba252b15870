//! Transaction guard for batch writes
//!
//! A [`TransactionGuard`] brackets a batch of statements on one connection.
//! It must be finished with [`TransactionGuard::commit`] or
//! [`TransactionGuard::rollback`]; a guard dropped while still open logs a
//! warning and leaves the rollback to the connection close that follows it.

use super::database::Database;
use super::error::{DatabaseError, Result};
use super::value::{DatabaseResult, DatabaseValue};

/// Open transaction on a borrowed database handle
///
/// # Example
///
/// ```ignore
/// let tx = TransactionGuard::begin(&db).await?;
/// tx.execute_with_params("UPDATE accounts SET balance = ? WHERE id = ?", &params).await?;
/// tx.commit().await?;
/// ```
pub struct TransactionGuard<'a, D: Database + ?Sized> {
    db: &'a D,
    finished: bool,
}

impl<'a, D: Database + ?Sized> TransactionGuard<'a, D> {
    /// Begin a new transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the database is not connected or a transaction is
    /// already active.
    pub async fn begin(db: &'a D) -> Result<Self> {
        db.begin_transaction().await?;
        tracing::debug!("transaction started");

        Ok(Self {
            db,
            finished: false,
        })
    }

    /// The database this transaction runs on
    pub fn database(&self) -> &'a D {
        self.db
    }

    /// Execute a parameterized statement within the transaction
    pub async fn execute_with_params(&self, query: &str, params: &[DatabaseValue]) -> Result<u64> {
        self.ensure_open()?;
        self.db.execute_with_params(query, params).await
    }

    /// Query with parameters within the transaction
    pub async fn query_with_params(
        &self,
        query: &str,
        params: &[DatabaseValue],
    ) -> Result<DatabaseResult> {
        self.ensure_open()?;
        self.db.query_with_params(query, params).await
    }

    /// Commit the transaction
    pub async fn commit(mut self) -> Result<()> {
        self.finished = true;
        self.db.commit().await?;
        tracing::debug!("transaction committed");
        Ok(())
    }

    /// Roll the transaction back
    pub async fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.db.rollback().await?;
        tracing::warn!("transaction rolled back");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.db.in_transaction() {
            Ok(())
        } else {
            Err(DatabaseError::transaction(
                "Transaction is no longer active on this connection",
            ))
        }
    }
}

impl<D: Database + ?Sized> Drop for TransactionGuard<'_, D> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                "transaction dropped without commit or rollback; \
                 it is discarded when the connection closes"
            );
        }
    }
}
