//! Nested logical transactions over a single physical transaction.
//!
//! [`Tx::begin`] issues `BEGIN` on a handle. [`Tx::begin_nested`] on an open
//! transaction returns an inner scope that shares the same physical
//! transaction: committing an inner scope only closes that scope, committing
//! the outermost scope issues `COMMIT`. A rollback at any level issues
//! `ROLLBACK` and poisons every scope of the transaction.
//!
//! ```ignore
//! let tx = Tx::begin(&client).await?;
//! update("accounts").set("balance", 0).where_sql("id = $1", (7,)).exec(&tx).await?;
//! {
//!     let inner = tx.begin_nested().await?;
//!     insert_into("audit").columns(["what"]).values(("reset",)).exec(&inner).await?;
//!     inner.commit().await?;
//! }
//! tx.commit().await?;
//! ```

use crate::client::Handle;
use crate::config::strict_enabled;
use crate::error::{DatError, DatResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// A pending transaction older than this is reported in strict mode.
const LONG_RUNNING: Duration = Duration::from_secs(60);

/// Lifecycle state of a transaction scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxState {
    Pending,
    Committed,
    RolledBack,
    /// A `COMMIT` or `ROLLBACK` statement failed.
    Errored,
}

impl TxState {
    fn is_terminal(self) -> bool {
        !matches!(self, TxState::Pending)
    }
}

#[derive(Debug)]
struct TxInner {
    /// State of the physical transaction.
    state: TxState,
    /// Logical state of every scope opened so far, outermost first.
    scopes: Vec<TxState>,
    started: Instant,
    reported: bool,
}

impl TxInner {
    fn check_age(&mut self) {
        if self.reported || self.state != TxState::Pending || !strict_enabled() {
            return;
        }
        let age = self.started.elapsed();
        if age > LONG_RUNNING {
            self.reported = true;
            tracing::error!(
                target: "pgdat.tx",
                age_secs = age.as_secs(),
                "transaction has been pending for over a minute"
            );
        }
    }
}

/// A transaction scope bound to a handle.
///
/// Implements [`Handle`], so builders execute on it like on a plain client.
pub struct Tx<'a, H: Handle> {
    handle: &'a H,
    inner: Arc<Mutex<TxInner>>,
    level: usize,
}

impl<H: Handle> std::fmt::Debug for Tx<'_, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tx").field("level", &self.level).finish_non_exhaustive()
    }
}

impl<'a, H: Handle> Tx<'a, H> {
    /// Start a physical transaction on `handle`.
    pub async fn begin(handle: &'a H) -> DatResult<Tx<'a, H>> {
        handle.batch_execute("BEGIN").await?;
        tracing::debug!(target: "pgdat.tx", "BEGIN");
        Ok(Tx {
            handle,
            inner: Arc::new(Mutex::new(TxInner {
                state: TxState::Pending,
                scopes: vec![TxState::Pending],
                started: Instant::now(),
                reported: false,
            })),
            level: 0,
        })
    }

    /// Open a nested logical scope; no statement is sent.
    pub async fn begin_nested(&self) -> DatResult<Tx<'a, H>> {
        let mut inner = self.lock_active().await?;
        inner.scopes.push(TxState::Pending);
        let level = inner.scopes.len() - 1;
        drop(inner);
        tracing::debug!(target: "pgdat.tx", level, "nested begin");
        Ok(Tx {
            handle: self.handle,
            inner: Arc::clone(&self.inner),
            level,
        })
    }

    /// Nesting depth of this scope; the outermost scope is `0`.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Current state as seen from this scope.
    ///
    /// A rollback anywhere shows as [`TxState::RolledBack`] on every scope.
    pub async fn state(&self) -> TxState {
        let inner = self.inner.lock().await;
        match inner.state {
            TxState::Pending => inner.scopes[self.level],
            other => other,
        }
    }

    /// Commit this scope. Only the outermost scope sends `COMMIT`.
    pub async fn commit(&self) -> DatResult<()> {
        let mut inner = self.lock_active().await?;
        if self.level > 0 {
            inner.scopes[self.level] = TxState::Committed;
            tracing::debug!(target: "pgdat.tx", level = self.level, "nested commit");
            return Ok(());
        }
        match self.handle.batch_execute("COMMIT").await {
            Ok(()) => {
                inner.state = TxState::Committed;
                inner.scopes.fill(TxState::Committed);
                tracing::debug!(target: "pgdat.tx", "COMMIT");
                Ok(())
            }
            Err(e) => {
                inner.state = TxState::Errored;
                tracing::error!(target: "pgdat.tx", error = %e, "COMMIT failed");
                Err(e)
            }
        }
    }

    /// Roll back the whole physical transaction, whatever the level.
    pub async fn rollback(&self) -> DatResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.state {
            TxState::RolledBack => return Err(DatError::AlreadyRolledBack),
            TxState::Committed => return Err(DatError::AlreadyCommitted),
            TxState::Pending | TxState::Errored => {}
        }
        if inner.scopes[self.level] == TxState::Committed {
            return Err(DatError::AlreadyCommitted);
        }
        match self.handle.batch_execute("ROLLBACK").await {
            Ok(()) => {
                inner.state = TxState::RolledBack;
                inner.scopes.fill(TxState::RolledBack);
                tracing::debug!(target: "pgdat.tx", level = self.level, "ROLLBACK");
                Ok(())
            }
            Err(e) => {
                inner.state = TxState::Errored;
                tracing::error!(target: "pgdat.tx", error = %e, "ROLLBACK failed");
                Err(e)
            }
        }
    }

    /// Commit unless this scope already finished.
    pub async fn auto_commit(&self) -> DatResult<()> {
        if self.finished().await {
            return Ok(());
        }
        self.commit().await
    }

    /// Roll back unless this scope already finished.
    ///
    /// Intended for the error path of a scope: after a successful
    /// [`commit`](Self::commit) it does nothing.
    pub async fn auto_rollback(&self) -> DatResult<()> {
        if self.finished().await {
            return Ok(());
        }
        self.rollback().await
    }

    async fn finished(&self) -> bool {
        let inner = self.inner.lock().await;
        matches!(inner.state, TxState::Committed | TxState::RolledBack)
            || inner.scopes[self.level].is_terminal()
    }

    /// Lock the shared state, failing unless this scope can still run statements.
    async fn lock_active(&self) -> DatResult<MutexGuard<'_, TxInner>> {
        let mut inner = self.inner.lock().await;
        inner.check_age();
        match inner.state {
            TxState::RolledBack => return Err(DatError::AlreadyRolledBack),
            TxState::Committed => return Err(DatError::AlreadyCommitted),
            TxState::Errored => {
                return Err(DatError::InvalidOperation(
                    "transaction is in an errored state".to_string(),
                ));
            }
            TxState::Pending => {}
        }
        if inner.scopes[self.level] == TxState::Committed {
            return Err(DatError::AlreadyCommitted);
        }
        Ok(inner)
    }
}

impl<H: Handle> Drop for Tx<'_, H> {
    fn drop(&mut self) {
        if self.level != 0 {
            return;
        }
        if let Ok(inner) = self.inner.try_lock()
            && inner.state == TxState::Pending
        {
            tracing::warn!(
                target: "pgdat.tx",
                "transaction dropped without commit or rollback"
            );
        }
    }
}

impl<H: Handle> Handle for Tx<'_, H> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DatResult<Vec<Row>> {
        drop(self.lock_active().await?);
        self.handle.query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> DatResult<u64> {
        drop(self.lock_active().await?);
        self.handle.execute(sql, params).await
    }

    async fn batch_execute(&self, sql: &str) -> DatResult<()> {
        drop(self.lock_active().await?);
        self.handle.batch_execute(sql).await
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        self.handle.cancel_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::raw;
    use crate::exec::Execer;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recorder {
        log: StdMutex<Vec<String>>,
        fail_commit: bool,
    }

    impl Recorder {
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl Handle for Recorder {
        async fn query(&self, sql: &str, _params: &[&(dyn ToSql + Sync)]) -> DatResult<Vec<Row>> {
            self.log.lock().unwrap().push(sql.to_string());
            Ok(Vec::new())
        }

        async fn execute(&self, sql: &str, _params: &[&(dyn ToSql + Sync)]) -> DatResult<u64> {
            self.log.lock().unwrap().push(sql.to_string());
            Ok(1)
        }

        async fn batch_execute(&self, sql: &str) -> DatResult<()> {
            if self.fail_commit && sql == "COMMIT" {
                return Err(DatError::Other("commit refused".to_string()));
            }
            self.log.lock().unwrap().push(sql.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn begin_commit() {
        let db = Recorder::default();
        let tx = Tx::begin(&db).await.unwrap();
        assert_eq!(tx.state().await, TxState::Pending);
        tx.commit().await.unwrap();
        assert_eq!(tx.state().await, TxState::Committed);
        assert!(matches!(tx.commit().await, Err(DatError::AlreadyCommitted)));
        tx.auto_rollback().await.unwrap();
        tx.auto_commit().await.unwrap();
        assert_eq!(db.log(), vec!["BEGIN", "COMMIT"]);
    }

    #[tokio::test]
    async fn rollback_poisons_transaction() {
        let db = Recorder::default();
        let tx = Tx::begin(&db).await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(tx.state().await, TxState::RolledBack);
        assert!(matches!(
            tx.execute("UPDATE t SET a = 1", &[]).await,
            Err(DatError::AlreadyRolledBack)
        ));
        assert!(matches!(tx.commit().await, Err(DatError::AlreadyRolledBack)));
        assert!(matches!(tx.rollback().await, Err(DatError::AlreadyRolledBack)));
        tx.auto_commit().await.unwrap();
        tx.auto_rollback().await.unwrap();
        assert_eq!(db.log(), vec!["BEGIN", "ROLLBACK"]);
    }

    #[tokio::test]
    async fn nested_commit_is_logical() {
        let db = Recorder::default();
        let tx = Tx::begin(&db).await.unwrap();
        {
            let inner = tx.begin_nested().await.unwrap();
            assert_eq!(inner.level(), 1);
            inner.execute("INSERT INTO t VALUES (1)", &[]).await.unwrap();
            inner.commit().await.unwrap();
            assert_eq!(inner.state().await, TxState::Committed);
            // the deferred rollback of a committed scope must not touch the outer one
            inner.auto_rollback().await.unwrap();
        }
        assert_eq!(tx.state().await, TxState::Pending);
        tx.commit().await.unwrap();
        assert_eq!(
            db.log(),
            vec!["BEGIN", "INSERT INTO t VALUES (1)", "COMMIT"]
        );
    }

    #[tokio::test]
    async fn nested_rollback_rolls_back_everything() {
        let db = Recorder::default();
        let tx = Tx::begin(&db).await.unwrap();
        let inner = tx.begin_nested().await.unwrap();
        inner.rollback().await.unwrap();
        assert_eq!(tx.state().await, TxState::RolledBack);
        assert!(matches!(tx.commit().await, Err(DatError::AlreadyRolledBack)));
        assert!(matches!(
            tx.begin_nested().await,
            Err(DatError::AlreadyRolledBack)
        ));
        tx.auto_rollback().await.unwrap();
        assert_eq!(db.log(), vec!["BEGIN", "ROLLBACK"]);
    }

    #[tokio::test]
    async fn committed_scope_rejects_statements() {
        let db = Recorder::default();
        let tx = Tx::begin(&db).await.unwrap();
        let inner = tx.begin_nested().await.unwrap();
        inner.commit().await.unwrap();
        assert!(matches!(
            inner.query("SELECT 1", &[]).await,
            Err(DatError::AlreadyCommitted)
        ));
        tx.query("SELECT 1", &[]).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn failed_commit_marks_errored() {
        let db = Recorder {
            fail_commit: true,
            ..Default::default()
        };
        let tx = Tx::begin(&db).await.unwrap();
        assert!(tx.commit().await.is_err());
        assert_eq!(tx.state().await, TxState::Errored);
        assert!(matches!(
            tx.execute("SELECT 1", &[]).await,
            Err(DatError::InvalidOperation(_))
        ));
        tx.auto_rollback().await.unwrap();
        assert_eq!(tx.state().await, TxState::RolledBack);
        assert_eq!(db.log(), vec!["BEGIN", "ROLLBACK"]);
    }

    #[tokio::test]
    async fn builders_execute_inside_transaction() {
        let db = Recorder::default();
        let tx = Tx::begin(&db).await.unwrap();
        let n = raw("UPDATE t SET a = 1", ()).exec(&tx).await.unwrap();
        assert_eq!(n, 1);
        tx.auto_commit().await.unwrap();
        assert_eq!(db.log(), vec!["BEGIN", "UPDATE t SET a = 1", "COMMIT"]);
    }
}
