//! Database handle trait consumed by the executor and transactions.

use crate::error::{DatError, DatResult};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// A PostgreSQL session the executor can run statements on.
///
/// Implemented for plain clients, driver transactions, pooled clients and the
/// crate's own [`Tx`](crate::tx::Tx), so builders run the same way inside or
/// outside a transaction.
pub trait Handle: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DatResult<Vec<Row>>> + Send;

    /// Execute a query and return the **first** row.
    ///
    /// - 0 rows: [`DatError::NotFound`]
    /// - 1 or more rows: the first one
    fn query_one(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DatResult<Row>> + Send {
        async move {
            self.query(sql, params)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| DatError::not_found("Expected one row, got none"))
        }
    }

    /// Execute a query and return the first row, if any.
    fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DatResult<Option<Row>>> + Send {
        async move { Ok(self.query(sql, params).await?.into_iter().next()) }
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = DatResult<u64>> + Send;

    /// Run one or more statements with the simple query protocol (no parameters).
    fn batch_execute(&self, sql: &str) -> impl std::future::Future<Output = DatResult<()>> + Send;

    /// Cancellation token for the underlying connection, if supported.
    ///
    /// The token carries the backend PID and secret key used by a cancel request.
    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        None
    }
}

impl Handle for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DatResult<Vec<Row>> {
        tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(DatError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DatResult<u64> {
        tokio_postgres::Client::execute(self, sql, params)
            .await
            .map_err(DatError::from_db_error)
    }

    async fn batch_execute(&self, sql: &str) -> DatResult<()> {
        tokio_postgres::Client::batch_execute(self, sql)
            .await
            .map_err(DatError::from_db_error)
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        Some(tokio_postgres::Client::cancel_token(self))
    }
}

impl Handle for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DatResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, sql, params)
            .await
            .map_err(DatError::from_db_error)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DatResult<u64> {
        tokio_postgres::Transaction::execute(self, sql, params)
            .await
            .map_err(DatError::from_db_error)
    }

    async fn batch_execute(&self, sql: &str) -> DatResult<()> {
        tokio_postgres::Transaction::batch_execute(self, sql)
            .await
            .map_err(DatError::from_db_error)
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        Some(tokio_postgres::Transaction::cancel_token(self))
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl Handle for deadpool_postgres::ClientWrapper {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DatResult<Vec<Row>> {
        Handle::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DatResult<u64> {
        Handle::execute(&**self, sql, params).await
    }

    async fn batch_execute(&self, sql: &str) -> DatResult<()> {
        Handle::batch_execute(&**self, sql).await
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        Handle::cancel_token(&**self)
    }
}

#[cfg(feature = "pool")]
impl Handle for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DatResult<Vec<Row>> {
        // Delegate to the deref target (ClientWrapper).
        Handle::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DatResult<u64> {
        Handle::execute(&**self, sql, params).await
    }

    async fn batch_execute(&self, sql: &str) -> DatResult<()> {
        Handle::batch_execute(&**self, sql).await
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        Handle::cancel_token(&**self)
    }
}

/// A handle that was never bound to a session. Every call fails with
/// [`DatError::Disconnected`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Disconnected;

impl Handle for Disconnected {
    async fn query(&self, _sql: &str, _params: &[&(dyn ToSql + Sync)]) -> DatResult<Vec<Row>> {
        Err(DatError::Disconnected)
    }

    async fn execute(&self, _sql: &str, _params: &[&(dyn ToSql + Sync)]) -> DatResult<u64> {
        Err(DatError::Disconnected)
    }

    async fn batch_execute(&self, _sql: &str) -> DatResult<()> {
        Err(DatError::Disconnected)
    }
}

/// Send a best-effort cancel request for whatever `handle` is running.
///
/// Fails with [`DatError::InvalidOperation`] when the handle has no cancel
/// token (no backend PID to target).
pub async fn cancel(handle: &impl Handle) -> DatResult<()> {
    let token = handle.cancel_token().ok_or_else(|| {
        DatError::InvalidOperation("handle does not support query cancellation".to_string())
    })?;
    token
        .cancel_query(tokio_postgres::NoTls)
        .await
        .map_err(DatError::from_db_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disconnected_handle_fails_every_call() {
        let h = Disconnected;
        assert!(matches!(
            h.query("SELECT 1", &[]).await,
            Err(DatError::Disconnected)
        ));
        assert!(matches!(
            h.query_one("SELECT 1", &[]).await,
            Err(DatError::Disconnected)
        ));
        assert!(matches!(
            h.execute("SELECT 1", &[]).await,
            Err(DatError::Disconnected)
        ));
        assert!(matches!(
            h.batch_execute("SELECT 1").await,
            Err(DatError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn cancel_without_token_is_invalid() {
        let err = cancel(&Disconnected).await.unwrap_err();
        assert!(matches!(err, DatError::InvalidOperation(_)));
    }
}
