use crate::auth::AuthContext;
use crate::domains::core::reference_guard::ReferenceGuard;
use crate::domains::core::unit_of_work::UnitOfWork;
use crate::domains::document_type::types::{
    DocumentTypeResponse, NewDocumentType, UpdateDocumentType,
};
use crate::errors::{DomainError, ServiceResult, ValidationError};
use crate::types::{PaginatedResult, PaginationParams};
use crate::validation::Validate;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

const ENTITY_TABLE: &str = "document_types";

/// Orchestrates document type CRUD: service-level name uniqueness, soft
/// deactivation, and a guarded hard delete that refuses while any
/// non-deleted document still references the type.
#[async_trait]
pub trait DocumentTypeService: Send + Sync {
    async fn create_document_type(
        &self,
        auth: &AuthContext,
        new_type: NewDocumentType,
    ) -> ServiceResult<DocumentTypeResponse>;

    /// Returns None when the id does not exist.
    async fn update_document_type(
        &self,
        auth: &AuthContext,
        id: Uuid,
        update: UpdateDocumentType,
    ) -> ServiceResult<Option<DocumentTypeResponse>>;

    /// Hard delete, allowed only when no live document references the type.
    /// Returns false when the id does not exist.
    async fn delete_document_type(&self, auth: &AuthContext, id: Uuid) -> ServiceResult<bool>;

    /// Soft toggle; errors when the id does not exist.
    async fn deactivate_document_type(&self, auth: &AuthContext, id: Uuid) -> ServiceResult<()>;

    async fn get_document_type(&self, id: Uuid) -> ServiceResult<DocumentTypeResponse>;

    async fn list_document_types(
        &self,
        params: PaginationParams,
    ) -> ServiceResult<PaginatedResult<DocumentTypeResponse>>;

    async fn list_active_types(&self) -> ServiceResult<Vec<DocumentTypeResponse>>;

    async fn count_document_types(&self) -> ServiceResult<i64>;
}

pub struct DocumentTypeServiceImpl {
    uow: Arc<UnitOfWork>,
    reference_guard: Arc<dyn ReferenceGuard>,
}

impl DocumentTypeServiceImpl {
    pub fn new(uow: Arc<UnitOfWork>, reference_guard: Arc<dyn ReferenceGuard>) -> Self {
        Self { uow, reference_guard }
    }
}

#[async_trait]
impl DocumentTypeService for DocumentTypeServiceImpl {
    async fn create_document_type(
        &self,
        _auth: &AuthContext,
        new_type: NewDocumentType,
    ) -> ServiceResult<DocumentTypeResponse> {
        new_type.validate()?;

        let types = self.uow.document_types();
        let created = self
            .uow
            .execute_in_transaction("document_type.create", move |scope| {
                Box::pin(async move {
                    if types.find_by_name_with_tx(&new_type.name, scope).await?.is_some() {
                        return Err(DomainError::Validation(ValidationError::unique("name")));
                    }
                    types.create_with_tx(&new_type, scope).await
                })
            })
            .await?;

        Ok(DocumentTypeResponse::from(created))
    }

    async fn update_document_type(
        &self,
        _auth: &AuthContext,
        id: Uuid,
        update: UpdateDocumentType,
    ) -> ServiceResult<Option<DocumentTypeResponse>> {
        update.validate()?;

        let types = self.uow.document_types();
        let updated = self
            .uow
            .execute_in_transaction("document_type.update", move |scope| {
                Box::pin(async move {
                    if let Some(name) = &update.name {
                        // A rename must stay unique against every other type.
                        if let Some(existing) = types.find_by_name_with_tx(name, scope).await? {
                            if existing.id != id {
                                return Err(DomainError::Validation(ValidationError::unique("name")));
                            }
                        }
                    }
                    types.update_with_tx(id, &update, scope).await
                })
            })
            .await?;

        Ok(updated.map(DocumentTypeResponse::from))
    }

    async fn delete_document_type(&self, auth: &AuthContext, id: Uuid) -> ServiceResult<bool> {
        let references = self.reference_guard.check_references(ENTITY_TABLE, id).await?;
        if !references.is_empty() {
            return Err(DomainError::DependentRecordsExist {
                entity_type: ENTITY_TABLE.to_string(),
                id,
                dependencies: references.into_iter().map(|r| r.table_name).collect(),
            }
            .into());
        }

        let types = self.uow.document_types();
        let auth = auth.clone();
        let deleted = self
            .uow
            .execute_in_transaction("document_type.delete", move |scope| {
                Box::pin(async move { types.hard_delete_with_tx(id, &auth, scope).await })
            })
            .await?;

        Ok(deleted)
    }

    async fn deactivate_document_type(&self, _auth: &AuthContext, id: Uuid) -> ServiceResult<()> {
        let types = self.uow.document_types();
        self.uow
            .execute_in_transaction("document_type.deactivate", move |scope| {
                Box::pin(async move {
                    if types.deactivate_with_tx(id, scope).await? {
                        Ok(())
                    } else {
                        Err(DomainError::EntityNotFound(ENTITY_TABLE.to_string(), id))
                    }
                })
            })
            .await?;

        Ok(())
    }

    async fn get_document_type(&self, id: Uuid) -> ServiceResult<DocumentTypeResponse> {
        let doc_type = self.uow.document_types().find_by_id(id).await?;
        Ok(DocumentTypeResponse::from(doc_type))
    }

    async fn list_document_types(
        &self,
        params: PaginationParams,
    ) -> ServiceResult<PaginatedResult<DocumentTypeResponse>> {
        let paginated = self.uow.document_types().find_all(params).await?;
        let items = paginated.items.into_iter().map(DocumentTypeResponse::from).collect();
        Ok(PaginatedResult::new(items, paginated.total, params.clamped()))
    }

    async fn list_active_types(&self) -> ServiceResult<Vec<DocumentTypeResponse>> {
        let types = self.uow.document_types().find_active().await?;
        Ok(types.into_iter().map(DocumentTypeResponse::from).collect())
    }

    async fn count_document_types(&self) -> ServiceResult<i64> {
        Ok(self.uow.document_types().count().await?)
    }
}
