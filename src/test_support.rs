//! Shared wiring for service-level tests: in-memory database, temp file
//! storage, and fully-assembled services.

use crate::auth::AuthContext;
use crate::domains::classification::classifier::KeywordClassifier;
use crate::domains::classification::extractor::PlainTextExtractor;
use crate::domains::classification::service::{ClassificationService, ClassificationServiceImpl};
use crate::domains::core::file_storage::{FileStorageService, LocalFileStorageService};
use crate::domains::core::reference_guard::{ReferenceGuard, SqliteReferenceGuard};
use crate::domains::core::unit_of_work::UnitOfWork;
use crate::domains::document::service::{DocumentService, DocumentServiceImpl};
use crate::domains::document::types::{DocumentResponse, NewDocument};
use crate::domains::document_type::initialization::ensure_standard_types;
use crate::domains::document_type::service::{DocumentTypeService, DocumentTypeServiceImpl};
use crate::domains::user::types::{NewUser, User};
use crate::types::UserRole;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Single-connection in-memory pool with migrations applied. One connection
/// keeps every pooled checkout on the same in-memory database.
pub(crate) async fn test_pool() -> SqlitePool {
    let _ = env_logger::builder().is_test(true).try_init();
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    crate::database::run_migrations(&pool).await.unwrap();
    pool
}

pub(crate) async fn test_unit_of_work() -> Arc<UnitOfWork> {
    Arc::new(UnitOfWork::new(test_pool().await))
}

pub(crate) fn admin_context() -> AuthContext {
    AuthContext::new(Uuid::new_v4(), UserRole::Admin)
}

pub(crate) async fn test_user(uow: &UnitOfWork, username: &str, is_admin: bool) -> User {
    let new_user = NewUser {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password_hash: "hash".to_string(),
        password_salt: "salt".to_string(),
        first_name: None,
        last_name: None,
        is_admin,
    };
    let mut scope = uow.begin_autocommit().await.unwrap();
    uow.users().create_with_tx(&new_user, &mut scope).await.unwrap()
}

pub(crate) struct TestEnv {
    pub uow: Arc<UnitOfWork>,
    pub document_service: Arc<dyn DocumentService>,
    pub document_type_service: Arc<dyn DocumentTypeService>,
    pub classification_service: Arc<dyn ClassificationService>,
    _storage_dir: tempfile::TempDir,
}

pub(crate) async fn test_env() -> TestEnv {
    let uow = test_unit_of_work().await;
    let storage_dir = tempfile::tempdir().unwrap();
    let file_storage: Arc<dyn FileStorageService> =
        Arc::new(LocalFileStorageService::new(storage_dir.path().to_str().unwrap()).unwrap());
    let reference_guard: Arc<dyn ReferenceGuard> =
        Arc::new(SqliteReferenceGuard::new(uow.pool().clone()));

    let classification_service: Arc<dyn ClassificationService> = Arc::new(
        ClassificationServiceImpl::new(uow.clone(), Arc::new(PlainTextExtractor), Arc::new(KeywordClassifier)),
    );
    let document_service: Arc<dyn DocumentService> = Arc::new(DocumentServiceImpl::new(
        uow.clone(),
        file_storage,
        classification_service.clone(),
    ));
    let document_type_service: Arc<dyn DocumentTypeService> =
        Arc::new(DocumentTypeServiceImpl::new(uow.clone(), reference_guard));

    TestEnv {
        uow,
        document_service,
        document_type_service,
        classification_service,
        _storage_dir: storage_dir,
    }
}

pub(crate) async fn test_document_type_service() -> Arc<dyn DocumentTypeService> {
    test_env().await.document_type_service_owned()
}

impl TestEnv {
    fn document_type_service_owned(self) -> Arc<dyn DocumentTypeService> {
        self.document_type_service
    }

    pub async fn seed_standard_types(&self) {
        ensure_standard_types(self.document_type_service.as_ref(), &admin_context())
            .await
            .unwrap();
    }

    /// Upload a small plain document, optionally pinned to a type.
    pub async fn create_document_with_type(
        &self,
        auth: &AuthContext,
        filename: &str,
        document_type_id: Option<Uuid>,
    ) -> DocumentResponse {
        self.document_service
            .create_document(
                auth,
                NewDocument {
                    name: filename.to_string(),
                    description: None,
                    document_type_id,
                    metadata: None,
                },
                b"plain note content".to_vec(),
                filename,
            )
            .await
            .unwrap()
    }
}
