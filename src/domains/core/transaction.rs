use crate::errors::{DbError, DbResult};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, Transaction};

/// Handle for a scoped unit of database work.
///
/// Either wraps a real transaction (BEGIN .. COMMIT/ROLLBACK) or a plain
/// pooled connection in auto-commit mode. The auto-commit variant exists so
/// business logic stays store-agnostic: against a backing store with no
/// transaction support, `commit` and `rollback` succeed without effect.
///
/// A scope is owned exclusively by the operation that began it and is passed
/// by `&mut` down the call chain; every repository write inside one scope
/// runs on the same underlying connection.
pub struct TransactionScope {
    inner: ScopeInner,
}

enum ScopeInner {
    Transactional(Transaction<'static, Sqlite>),
    AutoCommit(PoolConnection<Sqlite>),
}

impl TransactionScope {
    pub(crate) fn transactional(tx: Transaction<'static, Sqlite>) -> Self {
        Self {
            inner: ScopeInner::Transactional(tx),
        }
    }

    pub(crate) fn auto_commit(conn: PoolConnection<Sqlite>) -> Self {
        Self {
            inner: ScopeInner::AutoCommit(conn),
        }
    }

    /// Whether commit/rollback have real effect for this scope.
    pub fn is_transactional(&self) -> bool {
        matches!(self.inner, ScopeInner::Transactional(_))
    }

    /// The connection all statements in this scope must execute on.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        match &mut self.inner {
            ScopeInner::Transactional(tx) => &mut **tx,
            ScopeInner::AutoCommit(conn) => &mut **conn,
        }
    }

    /// Commit the scope, releasing the underlying connection.
    pub async fn commit(self) -> DbResult<()> {
        match self.inner {
            ScopeInner::Transactional(tx) => tx
                .commit()
                .await
                .map_err(|e| DbError::Transaction(format!("commit failed: {}", e))),
            ScopeInner::AutoCommit(_) => Ok(()),
        }
    }

    /// Roll the scope back, releasing the underlying connection.
    pub async fn rollback(self) -> DbResult<()> {
        match self.inner {
            ScopeInner::Transactional(tx) => tx
                .rollback()
                .await
                .map_err(|e| DbError::Transaction(format!("rollback failed: {}", e))),
            ScopeInner::AutoCommit(_) => Ok(()),
        }
    }
}
