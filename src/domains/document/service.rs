use crate::auth::AuthContext;
use crate::domains::classification::service::ClassificationService;
use crate::domains::classification::types::ClassificationResult;
use crate::domains::core::file_storage::{FileStorageService, FileVersionInfo};
use crate::domains::core::unit_of_work::UnitOfWork;
use crate::domains::document::types::{
    file_extension, Document, DocumentResponse, NewDocument, NewDocumentRecord, UpdateDocument,
};
use crate::errors::{DomainError, ServiceResult, ValidationError};
use crate::types::{PaginatedResult, PaginationParams};
use crate::validation::Validate;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// Orchestrates the document write path: hash, store, persist, metadata,
/// and the best-effort classification step after the durable commit.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Create a document from uploaded bytes. The document row and its
    /// metadata commit in one transaction; classification runs afterwards
    /// and can never undo the creation.
    async fn create_document(
        &self,
        auth: &AuthContext,
        new_doc: NewDocument,
        file_data: Vec<u8>,
        original_filename: &str,
    ) -> ServiceResult<DocumentResponse>;

    /// Partial update. Returns None when the id does not exist; a supplied
    /// metadata set replaces the stored one wholesale.
    async fn update_document(
        &self,
        auth: &AuthContext,
        id: Uuid,
        update: UpdateDocument,
    ) -> ServiceResult<Option<DocumentResponse>>;

    /// Soft delete. Returns false when the document is missing or already
    /// deleted; bytes and metadata stay in storage.
    async fn delete_document(&self, auth: &AuthContext, id: Uuid) -> ServiceResult<bool>;

    async fn get_document(&self, id: Uuid, include_metadata: bool) -> ServiceResult<DocumentResponse>;

    async fn search_documents(
        &self,
        term: Option<&str>,
        document_type_id: Option<Uuid>,
        params: PaginationParams,
    ) -> ServiceResult<PaginatedResult<DocumentResponse>>;

    async fn get_documents_by_type(
        &self,
        document_type_id: Uuid,
        params: PaginationParams,
    ) -> ServiceResult<PaginatedResult<DocumentResponse>>;

    async fn get_recent_documents(&self, limit: u32) -> ServiceResult<Vec<DocumentResponse>>;

    async fn count_documents(&self) -> ServiceResult<i64>;

    async fn count_documents_by_type(&self, document_type_id: Uuid) -> ServiceResult<i64>;

    /// Original file name and bytes for a live document.
    async fn download_document(&self, id: Uuid) -> ServiceResult<(String, Vec<u8>)>;

    /// Store a new content version alongside the primary copy.
    async fn save_new_version(
        &self,
        auth: &AuthContext,
        id: Uuid,
        file_data: Vec<u8>,
        original_filename: &str,
    ) -> ServiceResult<FileVersionInfo>;

    async fn get_version_history(&self, id: Uuid) -> ServiceResult<Vec<FileVersionInfo>>;

    /// Fetch a stored version's bytes; version 0 means latest.
    async fn download_version(
        &self,
        id: Uuid,
        version_number: u32,
    ) -> ServiceResult<(Vec<u8>, FileVersionInfo)>;
}

pub struct DocumentServiceImpl {
    uow: Arc<UnitOfWork>,
    file_storage: Arc<dyn FileStorageService>,
    classification: Arc<dyn ClassificationService>,
}

impl DocumentServiceImpl {
    pub fn new(
        uow: Arc<UnitOfWork>,
        file_storage: Arc<dyn FileStorageService>,
        classification: Arc<dyn ClassificationService>,
    ) -> Self {
        Self {
            uow,
            file_storage,
            classification,
        }
    }

    /// Phase 2 of document creation: classification after the durable
    /// commit. Failures are captured and logged, never propagated, and the
    /// predicted type is assigned only when the uploader chose none.
    async fn auto_classify(
        &self,
        auth: &AuthContext,
        document: &Document,
        file_data: &[u8],
        original_filename: &str,
    ) -> Option<ClassificationResult> {
        let assign_type = document.document_type_id.is_none();
        match self
            .classification
            .classify_and_apply(auth, document.id, file_data, original_filename, assign_type)
            .await
        {
            Ok(result) => Some(result),
            Err(e) => {
                log::warn!("auto-classification for document {} failed: {}", document.id, e);
                None
            }
        }
    }

    async fn type_name_for(&self, document_type_id: Option<Uuid>) -> Option<String> {
        let type_id = document_type_id?;
        match self.uow.document_types().find_by_id(type_id).await {
            Ok(doc_type) => Some(doc_type.name),
            Err(_) => None,
        }
    }

    async fn to_response(&self, document: &Document, include_metadata: bool) -> ServiceResult<DocumentResponse> {
        let type_name = self.type_name_for(document.document_type_id).await;
        let mut response = DocumentResponse::from_document(document, type_name);
        if include_metadata {
            let metadata = self.uow.document_metadata().find_by_document(document.id).await?;
            response.metadata = Some(metadata);
        }
        Ok(response)
    }
}

#[async_trait]
impl DocumentService for DocumentServiceImpl {
    async fn create_document(
        &self,
        auth: &AuthContext,
        new_doc: NewDocument,
        file_data: Vec<u8>,
        original_filename: &str,
    ) -> ServiceResult<DocumentResponse> {
        new_doc.validate()?;
        if file_data.is_empty() {
            return Err(ValidationError::required("file_data").into());
        }

        // Hash and store the bytes before opening the transaction; the
        // database work stays short and storage failures abort cleanly.
        let content_hash = hex::encode(Sha256::digest(&file_data));
        let id = Uuid::new_v4();
        let (file_path, file_size) = self
            .file_storage
            .save_file(file_data.clone(), &id.to_string(), original_filename)
            .await
            .map_err(DomainError::from)?;

        let record = NewDocumentRecord {
            id,
            name: new_doc.name.clone(),
            description: new_doc.description.clone(),
            document_type_id: new_doc.document_type_id,
            uploaded_by_id: auth.user_id,
            file_type: file_extension(original_filename),
            file_path,
            file_size_bytes: file_size as i64,
            content_hash,
        };
        record.validate()?;

        let documents = self.uow.documents();
        let types = self.uow.document_types();
        let metadata_repo = self.uow.document_metadata();
        let metadata_pairs = new_doc.metadata.clone().unwrap_or_default();

        // Phase 1: everything durable commits or rolls back together.
        let created = self
            .uow
            .execute_in_transaction("document.create", move |scope| {
                Box::pin(async move {
                    if let Some(type_id) = record.document_type_id {
                        if types.find_optional_with_tx(type_id, scope).await?.is_none() {
                            return Err(DomainError::Validation(ValidationError::relationship(
                                &format!("document type {} does not exist", type_id),
                            )));
                        }
                    }

                    let document = documents.create_with_tx(&record, scope).await?;

                    for (key, value) in &metadata_pairs {
                        metadata_repo.upsert_with_tx(document.id, key, value, scope).await?;
                    }

                    Ok(document)
                })
            })
            .await?;

        // Phase 2: best-effort, outside the transaction.
        let classification = self.auto_classify(auth, &created, &file_data, original_filename).await;

        // Re-read so an applied classification shows up in the projection.
        let document = self.uow.documents().find_by_id(created.id).await?;
        let mut response = self.to_response(&document, true).await?;
        response.classification = classification;
        Ok(response)
    }

    async fn update_document(
        &self,
        _auth: &AuthContext,
        id: Uuid,
        update: UpdateDocument,
    ) -> ServiceResult<Option<DocumentResponse>> {
        update.validate()?;

        let documents = self.uow.documents();
        let types = self.uow.document_types();
        let metadata_repo = self.uow.document_metadata();

        let updated = self
            .uow
            .execute_in_transaction("document.update", move |scope| {
                Box::pin(async move {
                    if documents.find_optional_with_tx(id, scope).await?.is_none() {
                        return Ok(None);
                    }

                    if let Some(type_id) = update.document_type_id {
                        if types.find_optional_with_tx(type_id, scope).await?.is_none() {
                            return Err(DomainError::Validation(ValidationError::relationship(
                                &format!("document type {} does not exist", type_id),
                            )));
                        }
                    }

                    let document = documents.update_with_tx(id, &update, scope).await?;

                    // A supplied metadata set replaces the stored one; None
                    // leaves it untouched.
                    if let Some(pairs) = &update.metadata {
                        metadata_repo.delete_for_document_with_tx(id, scope).await?;
                        for (key, value) in pairs {
                            metadata_repo.upsert_with_tx(id, key, value, scope).await?;
                        }
                    }

                    Ok(Some(document))
                })
            })
            .await?;

        match updated {
            Some(document) => Ok(Some(self.to_response(&document, true).await?)),
            None => Ok(None),
        }
    }

    async fn delete_document(&self, auth: &AuthContext, id: Uuid) -> ServiceResult<bool> {
        let documents = self.uow.documents();
        let auth = auth.clone();
        let deleted = self
            .uow
            .execute_in_transaction("document.delete", move |scope| {
                Box::pin(async move { documents.soft_delete_with_tx(id, &auth, scope).await })
            })
            .await?;

        Ok(deleted)
    }

    async fn get_document(&self, id: Uuid, include_metadata: bool) -> ServiceResult<DocumentResponse> {
        let document = self.uow.documents().find_by_id(id).await?;
        self.to_response(&document, include_metadata).await
    }

    async fn search_documents(
        &self,
        term: Option<&str>,
        document_type_id: Option<Uuid>,
        params: PaginationParams,
    ) -> ServiceResult<PaginatedResult<DocumentResponse>> {
        let paginated = self.uow.documents().search(term, document_type_id, params).await?;
        let mut items = Vec::with_capacity(paginated.items.len());
        for document in &paginated.items {
            items.push(self.to_response(document, false).await?);
        }
        Ok(PaginatedResult::new(items, paginated.total, params.clamped()))
    }

    async fn get_documents_by_type(
        &self,
        document_type_id: Uuid,
        params: PaginationParams,
    ) -> ServiceResult<PaginatedResult<DocumentResponse>> {
        self.search_documents(None, Some(document_type_id), params).await
    }

    async fn get_recent_documents(&self, limit: u32) -> ServiceResult<Vec<DocumentResponse>> {
        let documents = self.uow.documents().find_recent(limit).await?;
        let mut items = Vec::with_capacity(documents.len());
        for document in &documents {
            items.push(self.to_response(document, false).await?);
        }
        Ok(items)
    }

    async fn count_documents(&self) -> ServiceResult<i64> {
        Ok(self.uow.documents().count().await?)
    }

    async fn count_documents_by_type(&self, document_type_id: Uuid) -> ServiceResult<i64> {
        Ok(self.uow.documents().count_by_type(document_type_id).await?)
    }

    async fn download_document(&self, id: Uuid) -> ServiceResult<(String, Vec<u8>)> {
        let document = self.uow.documents().find_by_id(id).await?;
        let data = self
            .file_storage
            .get_file_data(&document.file_path)
            .await
            .map_err(DomainError::from)?;
        Ok((document.name, data))
    }

    async fn save_new_version(
        &self,
        _auth: &AuthContext,
        id: Uuid,
        file_data: Vec<u8>,
        original_filename: &str,
    ) -> ServiceResult<FileVersionInfo> {
        if file_data.is_empty() {
            return Err(ValidationError::required("file_data").into());
        }
        // Version saves require a live document.
        let document = self.uow.documents().find_by_id(id).await?;
        let info = self
            .file_storage
            .save_version(document.id, file_data, original_filename)
            .await
            .map_err(DomainError::from)?;
        Ok(info)
    }

    async fn get_version_history(&self, id: Uuid) -> ServiceResult<Vec<FileVersionInfo>> {
        let document = self.uow.documents().find_by_id(id).await?;
        Ok(self
            .file_storage
            .get_version_history(document.id)
            .await
            .map_err(DomainError::from)?)
    }

    async fn download_version(
        &self,
        id: Uuid,
        version_number: u32,
    ) -> ServiceResult<(Vec<u8>, FileVersionInfo)> {
        let document = self.uow.documents().find_by_id(id).await?;
        Ok(self
            .file_storage
            .get_version(document.id, version_number)
            .await
            .map_err(DomainError::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DbError, DomainResult, ServiceError};
    use crate::test_support::{admin_context, test_env};
    use std::collections::HashMap;

    fn invoice_upload() -> (NewDocument, Vec<u8>, &'static str) {
        let mut metadata = HashMap::new();
        metadata.insert("invoiceNumber".to_string(), "INV-001".to_string());
        (
            NewDocument {
                name: "March invoice".to_string(),
                description: Some("Supplier invoice".to_string()),
                document_type_id: None,
                metadata: Some(metadata),
            },
            b"Invoice number INV-001. Amount due: 100 EUR. Payment terms: net 30.".to_vec(),
            "invoice_march.txt",
        )
    }

    #[tokio::test]
    async fn test_create_document_with_metadata_and_auto_classification() {
        let env = test_env().await;
        env.seed_standard_types().await;
        let auth = admin_context();

        let (new_doc, data, filename) = invoice_upload();
        let response = env
            .document_service
            .create_document(&auth, new_doc, data.clone(), filename)
            .await
            .unwrap();

        assert_eq!(response.file_type, "txt");
        assert_eq!(response.file_size_bytes, data.len() as i64);
        assert_eq!(response.content_hash, hex::encode(Sha256::digest(&data)));
        assert!(!response.file_path.is_empty());
        assert_eq!(response.uploaded_by_id, auth.user_id);

        // Caller supplied no type, the classifier found one.
        assert_eq!(response.type_name.as_deref(), Some("Invoice"));
        assert!(response.document_type_id.is_some());
        let classification = response.classification.as_ref().unwrap();
        assert!(classification.is_successful);
        assert_eq!(classification.predicted_type_name, "Invoice");

        let metadata = response.metadata.as_ref().unwrap();
        let entry = metadata.iter().find(|m| m.key == "invoiceNumber").unwrap();
        assert_eq!(entry.value, "INV-001");
        assert_eq!(entry.data_type.as_str(), "string");
    }

    #[tokio::test]
    async fn test_create_keeps_explicit_type_over_prediction() {
        let env = test_env().await;
        env.seed_standard_types().await;
        let auth = admin_context();

        let report_type = env
            .uow
            .document_types()
            .find_by_name("Report")
            .await
            .unwrap()
            .unwrap();

        let (mut new_doc, data, filename) = invoice_upload();
        new_doc.document_type_id = Some(report_type.id);

        let response = env
            .document_service
            .create_document(&auth, new_doc, data, filename)
            .await
            .unwrap();

        // Prediction says Invoice, but the explicit choice wins.
        assert_eq!(response.document_type_id, Some(report_type.id));
        assert_eq!(
            response.classification.as_ref().unwrap().predicted_type_name,
            "Invoice"
        );
    }

    #[tokio::test]
    async fn test_create_with_unknown_type_fails_validation() {
        let env = test_env().await;
        let auth = admin_context();

        let (mut new_doc, data, filename) = invoice_upload();
        new_doc.document_type_id = Some(Uuid::new_v4());

        let result = env
            .document_service
            .create_document(&auth, new_doc, data, filename)
            .await;
        assert!(matches!(
            result,
            Err(ServiceError::Domain(DomainError::Validation(ValidationError::Relationship(_))))
        ));
        assert_eq!(env.document_service.count_documents().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_transaction_leaves_no_document_behind() {
        let env = test_env().await;
        let auth = admin_context();
        let documents = env.uow.documents();
        let metadata = env.uow.document_metadata();
        let record = NewDocumentRecord {
            id: Uuid::new_v4(),
            name: "doomed".to_string(),
            description: None,
            document_type_id: None,
            uploaded_by_id: auth.user_id,
            file_type: "txt".to_string(),
            file_path: "original/x/doomed.txt".to_string(),
            file_size_bytes: 9,
            content_hash: "abc123".to_string(),
        };
        let doc_id = record.id;

        // Metadata write fails after the document insert; both must vanish.
        let result: DomainResult<()> = env
            .uow
            .execute_in_transaction("test.create_then_fail", move |scope| {
                Box::pin(async move {
                    documents.create_with_tx(&record, scope).await?;
                    metadata.upsert_with_tx(doc_id, "k", "v", scope).await?;
                    Err(DomainError::Database(DbError::Other("simulated metadata failure".to_string())))
                })
            })
            .await;
        assert!(result.is_err());

        assert_eq!(env.document_service.count_documents().await.unwrap(), 0);
        assert!(env
            .uow
            .document_metadata()
            .find_by_document(doc_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_metadata_upsert_is_idempotent_per_key() {
        let env = test_env().await;
        let auth = admin_context();
        let doc = env.create_document_with_type(&auth, "notes.png", None).await;

        let metadata = env.uow.document_metadata();
        let mut scope = env.uow.begin_autocommit().await.unwrap();
        metadata.upsert_with_tx(doc.id, "status", "draft", &mut scope).await.unwrap();
        metadata.upsert_with_tx(doc.id, "status", "final", &mut scope).await.unwrap();
        drop(scope);

        let rows = metadata.find_by_document(doc.id).await.unwrap();
        let status_rows: Vec<_> = rows.iter().filter(|m| m.key == "status").collect();
        assert_eq!(status_rows.len(), 1);
        assert_eq!(status_rows[0].value, "final");
    }

    #[tokio::test]
    async fn test_soft_delete_hides_but_keeps_row_and_metadata() {
        let env = test_env().await;
        let auth = admin_context();

        let (new_doc, data, filename) = invoice_upload();
        let doc = env
            .document_service
            .create_document(&auth, new_doc, data, filename)
            .await
            .unwrap();

        assert!(env.document_service.delete_document(&auth, doc.id).await.unwrap());
        // Second delete finds nothing live.
        assert!(!env.document_service.delete_document(&auth, doc.id).await.unwrap());

        let get = env.document_service.get_document(doc.id, false).await;
        assert!(matches!(
            get,
            Err(ServiceError::Domain(DomainError::EntityNotFound(_, _)))
        ));
        assert_eq!(env.document_service.count_documents().await.unwrap(), 0);
        let found = env
            .document_service
            .search_documents(Some("invoice"), None, Default::default())
            .await
            .unwrap();
        assert_eq!(found.total, 0);

        // Storage still holds the row and its metadata.
        let raw_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE id = ?")
            .bind(doc.id.to_string())
            .fetch_one(env.uow.pool())
            .await
            .unwrap();
        assert_eq!(raw_count, 1);
        assert!(!env
            .uow
            .document_metadata()
            .find_by_document(doc.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_update_description_only_leaves_metadata_untouched() {
        let env = test_env().await;
        let auth = admin_context();

        let (new_doc, data, filename) = invoice_upload();
        let doc = env
            .document_service
            .create_document(&auth, new_doc, data, filename)
            .await
            .unwrap();

        let updated = env
            .document_service
            .update_document(&auth, doc.id, UpdateDocument {
                description: Some("Amended description".to_string()),
                ..Default::default()
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.description.as_deref(), Some("Amended description"));
        assert_eq!(updated.name, "March invoice");
        let metadata = updated.metadata.unwrap();
        assert!(metadata.iter().any(|m| m.key == "invoiceNumber" && m.value == "INV-001"));
    }

    #[tokio::test]
    async fn test_update_with_metadata_replaces_the_set() {
        let env = test_env().await;
        let auth = admin_context();

        let (new_doc, data, filename) = invoice_upload();
        let doc = env
            .document_service
            .create_document(&auth, new_doc, data, filename)
            .await
            .unwrap();

        let mut replacement = HashMap::new();
        replacement.insert("reviewed".to_string(), "true".to_string());
        replacement.insert("pages".to_string(), "3".to_string());

        let updated = env
            .document_service
            .update_document(&auth, doc.id, UpdateDocument {
                metadata: Some(replacement),
                ..Default::default()
            })
            .await
            .unwrap()
            .unwrap();

        let metadata = updated.metadata.unwrap();
        assert!(metadata.iter().all(|m| m.key != "invoiceNumber"));
        let reviewed = metadata.iter().find(|m| m.key == "reviewed").unwrap();
        assert_eq!(reviewed.data_type.as_str(), "boolean");
        let pages = metadata.iter().find(|m| m.key == "pages").unwrap();
        assert_eq!(pages.data_type.as_str(), "number");
    }

    #[tokio::test]
    async fn test_update_missing_document_returns_none() {
        let env = test_env().await;
        let updated = env
            .document_service
            .update_document(&admin_context(), Uuid::new_v4(), UpdateDocument::default())
            .await
            .unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn test_update_rolls_back_metadata_on_bad_type() {
        let env = test_env().await;
        let auth = admin_context();

        let (new_doc, data, filename) = invoice_upload();
        let doc = env
            .document_service
            .create_document(&auth, new_doc, data, filename)
            .await
            .unwrap();

        let mut replacement = HashMap::new();
        replacement.insert("reviewed".to_string(), "true".to_string());

        let result = env
            .document_service
            .update_document(&auth, doc.id, UpdateDocument {
                document_type_id: Some(Uuid::new_v4()),
                metadata: Some(replacement),
                ..Default::default()
            })
            .await;
        assert!(result.is_err());

        // The original metadata survived the rolled-back replacement.
        let metadata = env.uow.document_metadata().find_by_document(doc.id).await.unwrap();
        assert!(metadata.iter().any(|m| m.key == "invoiceNumber"));
        assert!(metadata.iter().all(|m| m.key != "reviewed"));
    }

    #[tokio::test]
    async fn test_search_and_counts_paginate_and_filter() {
        let env = test_env().await;
        env.seed_standard_types().await;
        let auth = admin_context();
        let letter_type = env
            .uow
            .document_types()
            .find_by_name("Letter")
            .await
            .unwrap()
            .unwrap();

        for i in 0..3 {
            env.document_service
                .create_document(
                    &auth,
                    NewDocument {
                        name: format!("staff letter {}", i),
                        description: None,
                        document_type_id: Some(letter_type.id),
                        metadata: None,
                    },
                    b"Dear colleague, regards".to_vec(),
                    &format!("letter_{}.txt", i),
                )
                .await
                .unwrap();
        }
        env.create_document_with_type(&auth, "misc.png", None).await;

        let by_term = env
            .document_service
            .search_documents(Some("letter"), None, PaginationParams::new(1, 2))
            .await
            .unwrap();
        assert_eq!(by_term.total, 3);
        assert_eq!(by_term.items.len(), 2);
        assert_eq!(by_term.total_pages, 2);

        let by_type = env
            .document_service
            .get_documents_by_type(letter_type.id, Default::default())
            .await
            .unwrap();
        assert_eq!(by_type.total, 3);

        assert_eq!(env.document_service.count_documents().await.unwrap(), 4);
        assert_eq!(
            env.document_service.count_documents_by_type(letter_type.id).await.unwrap(),
            3
        );

        let recent = env.document_service.get_recent_documents(2).await.unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn test_download_and_version_round_trip() {
        let env = test_env().await;
        let auth = admin_context();

        let (new_doc, data, filename) = invoice_upload();
        let doc = env
            .document_service
            .create_document(&auth, new_doc, data.clone(), filename)
            .await
            .unwrap();

        let (name, bytes) = env.document_service.download_document(doc.id).await.unwrap();
        assert_eq!(name, "March invoice");
        assert_eq!(bytes, data);

        let v1 = env
            .document_service
            .save_new_version(&auth, doc.id, b"revised contents".to_vec(), filename)
            .await
            .unwrap();
        assert_eq!(v1.version_number, 1);

        let history = env.document_service.get_version_history(doc.id).await.unwrap();
        assert_eq!(history.len(), 1);

        let (latest, info) = env.document_service.download_version(doc.id, 0).await.unwrap();
        assert_eq!(latest, b"revised contents");
        assert_eq!(info.version_number, 1);

        let missing = env
            .document_service
            .save_new_version(&auth, Uuid::new_v4(), b"x".to_vec(), filename)
            .await;
        assert!(missing.is_err());
    }
}
