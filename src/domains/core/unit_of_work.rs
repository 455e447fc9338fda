use crate::domains::core::transaction::TransactionScope;
use crate::domains::document::repository::{
    DocumentMetadataRepository, DocumentRepository, SqliteDocumentMetadataRepository,
    SqliteDocumentRepository,
};
use crate::domains::document_type::repository::{
    DocumentTypeRepository, SqliteDocumentTypeRepository,
};
use crate::domains::user::repository::{SqliteUserRepository, UserRepository};
use crate::errors::{DbError, DomainError, DomainResult};
use futures::future::BoxFuture;
use sqlx::SqlitePool;
use std::sync::{Arc, OnceLock};

/// Coordinates the repository set over one shared pool and hands out
/// transaction scopes, so writes that span repositories commit or roll back
/// as a group.
///
/// Repositories are constructed lazily and reused; each request-scoped
/// operation gets its own [`TransactionScope`], never shared across
/// concurrent requests.
pub struct UnitOfWork {
    pool: SqlitePool,
    documents: OnceLock<Arc<SqliteDocumentRepository>>,
    document_types: OnceLock<Arc<SqliteDocumentTypeRepository>>,
    document_metadata: OnceLock<Arc<SqliteDocumentMetadataRepository>>,
    users: OnceLock<Arc<SqliteUserRepository>>,
}

impl UnitOfWork {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            documents: OnceLock::new(),
            document_types: OnceLock::new(),
            document_metadata: OnceLock::new(),
            users: OnceLock::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn documents(&self) -> Arc<dyn DocumentRepository> {
        self.documents
            .get_or_init(|| Arc::new(SqliteDocumentRepository::new(self.pool.clone())))
            .clone()
    }

    pub fn document_types(&self) -> Arc<dyn DocumentTypeRepository> {
        self.document_types
            .get_or_init(|| Arc::new(SqliteDocumentTypeRepository::new(self.pool.clone())))
            .clone()
    }

    pub fn document_metadata(&self) -> Arc<dyn DocumentMetadataRepository> {
        self.document_metadata
            .get_or_init(|| Arc::new(SqliteDocumentMetadataRepository::new(self.pool.clone())))
            .clone()
    }

    pub fn users(&self) -> Arc<dyn UserRepository> {
        self.users
            .get_or_init(|| Arc::new(SqliteUserRepository::new(self.pool.clone())))
            .clone()
    }

    /// Begin a real transaction. Failure to begin aborts the calling
    /// operation before anything ran.
    pub async fn begin_transaction(&self) -> DomainResult<TransactionScope> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::Transaction(format!("begin failed: {}", e)))?;
        Ok(TransactionScope::transactional(tx))
    }

    /// Begin an auto-commit scope for single-statement or read-only work.
    pub async fn begin_autocommit(&self) -> DomainResult<TransactionScope> {
        let conn = self.pool.acquire().await.map_err(DbError::Sqlx)?;
        Ok(TransactionScope::auto_commit(conn))
    }

    pub async fn commit_transaction(&self, scope: TransactionScope) -> DomainResult<()> {
        scope.commit().await.map_err(DomainError::Database)
    }

    /// Roll back, logging failures instead of re-throwing them so a rollback
    /// error never masks the error that triggered the rollback.
    pub async fn rollback_transaction(&self, scope: TransactionScope, context: &str) {
        if let Err(e) = scope.rollback().await {
            log::error!("rollback failed after {}: {}", context, e);
        }
    }

    /// Run `op` inside one transaction: begin, execute, commit on success;
    /// on error, log with `error_context`, roll back, and propagate the
    /// original error. Every multi-step write in the crate goes through here.
    pub async fn execute_in_transaction<T, F>(&self, error_context: &str, op: F) -> DomainResult<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut TransactionScope) -> BoxFuture<'t, DomainResult<T>> + Send,
    {
        let mut scope = self.begin_transaction().await?;
        match op(&mut scope).await {
            Ok(value) => {
                self.commit_transaction(scope).await?;
                Ok(value)
            }
            Err(err) => {
                log::error!("{}: {}", error_context, err);
                self.rollback_transaction(scope, error_context).await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ValidationError;
    use crate::test_support::test_pool;

    #[tokio::test]
    async fn test_repositories_are_reused() {
        let uow = UnitOfWork::new(test_pool().await);
        let a = uow.documents();
        let b = uow.documents();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_execute_in_transaction_commits_on_success() {
        let uow = UnitOfWork::new(test_pool().await);
        let result = uow
            .execute_in_transaction("test.noop", |scope| {
                Box::pin(async move {
                    sqlx::query("CREATE TABLE scratch (id INTEGER PRIMARY KEY)")
                        .execute(&mut *scope.conn())
                        .await
                        .map_err(DbError::from)?;
                    Ok(42)
                })
            })
            .await
            .unwrap();
        assert_eq!(result, 42);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scratch")
            .fetch_one(uow.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_execute_in_transaction_rolls_back_on_error() {
        let uow = UnitOfWork::new(test_pool().await);
        sqlx::query("CREATE TABLE scratch (id INTEGER PRIMARY KEY)")
            .execute(uow.pool())
            .await
            .unwrap();

        let result: DomainResult<()> = uow
            .execute_in_transaction("test.failing", |scope| {
                Box::pin(async move {
                    sqlx::query("INSERT INTO scratch (id) VALUES (1)")
                        .execute(&mut *scope.conn())
                        .await
                        .map_err(DbError::from)?;
                    Err(DomainError::Validation(ValidationError::custom("forced failure")))
                })
            })
            .await;
        assert!(result.is_err());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scratch")
            .fetch_one(uow.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
