use crate::auth::AuthContext;
use crate::domains::core::repository::{FindById, SoftDeletable};
use crate::domains::core::transaction::TransactionScope;
use crate::domains::document::types::{
    infer_data_type, Document, DocumentMetadata, DocumentMetadataRow, DocumentRow,
    NewDocumentRecord, UpdateDocument,
};
use crate::errors::{DbError, DomainError, DomainResult};
use crate::types::{PaginatedResult, PaginationParams};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, query_scalar, Pool, Sqlite};
use uuid::Uuid;

/// Metadata key under which serialized classification results are appended.
pub const CLASSIFICATION_RESULT_KEY: &str = "ClassificationResult";

// --- Document Repository ---

#[async_trait]
pub trait DocumentRepository: FindById<Document> + SoftDeletable + Send + Sync {
    async fn create_with_tx(
        &self,
        record: &NewDocumentRecord,
        scope: &mut TransactionScope,
    ) -> DomainResult<Document>;

    /// Partial field update; the caller has already checked existence.
    async fn update_with_tx(
        &self,
        id: Uuid,
        update: &UpdateDocument,
        scope: &mut TransactionScope,
    ) -> DomainResult<Document>;

    /// Write classification outcome onto the row. Returns false when the
    /// document does not exist or is deleted.
    async fn set_classification_with_tx(
        &self,
        id: Uuid,
        document_type_id: Option<Uuid>,
        confidence: Option<f64>,
        scope: &mut TransactionScope,
    ) -> DomainResult<bool>;

    /// Clear type and confidence. Returns false when absent.
    async fn clear_classification_with_tx(
        &self,
        id: Uuid,
        scope: &mut TransactionScope,
    ) -> DomainResult<bool>;

    async fn find_optional_with_tx(
        &self,
        id: Uuid,
        scope: &mut TransactionScope,
    ) -> DomainResult<Option<Document>>;

    /// Term search over name and description, optionally narrowed by type.
    async fn search(
        &self,
        term: Option<&str>,
        document_type_id: Option<Uuid>,
        params: PaginationParams,
    ) -> DomainResult<PaginatedResult<Document>>;

    async fn find_by_type(
        &self,
        document_type_id: Uuid,
        params: PaginationParams,
    ) -> DomainResult<PaginatedResult<Document>>;

    async fn find_recent(&self, limit: u32) -> DomainResult<Vec<Document>>;

    async fn count(&self) -> DomainResult<i64>;

    async fn count_by_type(&self, document_type_id: Uuid) -> DomainResult<i64>;
}

pub struct SqliteDocumentRepository {
    pool: Pool<Sqlite>,
}

impl SqliteDocumentRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn entity_name() -> &'static str {
        "documents"
    }

    fn map_row(row: DocumentRow) -> DomainResult<Document> {
        row.into_entity()
    }
}

#[async_trait]
impl FindById<Document> for SqliteDocumentRepository {
    /// Find a live (non-deleted) document; errors when absent.
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Document> {
        query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = ? AND is_deleted = 0")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound(Self::entity_name().to_string(), id))
            .and_then(Self::map_row)
    }
}

#[async_trait]
impl SoftDeletable for SqliteDocumentRepository {
    async fn soft_delete_with_tx(
        &self,
        id: Uuid,
        _auth: &AuthContext,
        scope: &mut TransactionScope,
    ) -> DomainResult<bool> {
        let now = Utc::now().to_rfc3339();
        let result = query(
            "UPDATE documents SET is_deleted = 1, updated_at = ? WHERE id = ? AND is_deleted = 0",
        )
        .bind(&now)
        .bind(id.to_string())
        .execute(&mut *scope.conn())
        .await
        .map_err(DbError::from)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DocumentRepository for SqliteDocumentRepository {
    async fn create_with_tx(
        &self,
        record: &NewDocumentRecord,
        scope: &mut TransactionScope,
    ) -> DomainResult<Document> {
        let now = Utc::now().to_rfc3339();

        query(
            r#"INSERT INTO documents (
                id, name, description, document_type_id, uploaded_by_id,
                file_type, file_path, file_size_bytes, content_hash,
                classification_confidence, is_deleted, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, 0, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(&record.name)
        .bind(&record.description)
        .bind(record.document_type_id.map(|id| id.to_string()))
        .bind(record.uploaded_by_id.to_string())
        .bind(&record.file_type)
        .bind(&record.file_path)
        .bind(record.file_size_bytes)
        .bind(&record.content_hash)
        .bind(&now)
        .bind(&now)
        .execute(&mut *scope.conn())
        .await
        .map_err(DbError::from)?;

        query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = ?")
            .bind(record.id.to_string())
            .fetch_one(&mut *scope.conn())
            .await
            .map_err(DbError::from)?
            .into_entity()
    }

    async fn update_with_tx(
        &self,
        id: Uuid,
        update: &UpdateDocument,
        scope: &mut TransactionScope,
    ) -> DomainResult<Document> {
        let now = Utc::now().to_rfc3339();
        let mut sets: Vec<String> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        if let Some(name) = &update.name {
            sets.push("name = ?".to_string());
            binds.push(name.clone());
        }
        if let Some(description) = &update.description {
            sets.push("description = ?".to_string());
            binds.push(description.clone());
        }
        if let Some(document_type_id) = update.document_type_id {
            sets.push("document_type_id = ?".to_string());
            binds.push(document_type_id.to_string());
        }

        sets.push("updated_at = ?".to_string());
        binds.push(now);

        let query_str = format!(
            "UPDATE documents SET {} WHERE id = ? AND is_deleted = 0",
            sets.join(", ")
        );
        let mut q = query(&query_str);
        for bind_val in binds {
            q = q.bind(bind_val);
        }
        q = q.bind(id.to_string());
        q.execute(&mut *scope.conn()).await.map_err(DbError::from)?;

        self.find_optional_with_tx(id, scope)
            .await?
            .ok_or_else(|| DomainError::EntityNotFound(Self::entity_name().to_string(), id))
    }

    async fn set_classification_with_tx(
        &self,
        id: Uuid,
        document_type_id: Option<Uuid>,
        confidence: Option<f64>,
        scope: &mut TransactionScope,
    ) -> DomainResult<bool> {
        let now = Utc::now().to_rfc3339();

        // Leave an explicitly-assigned type untouched when no new one is given.
        let result = if let Some(type_id) = document_type_id {
            query(
                "UPDATE documents SET document_type_id = ?, classification_confidence = ?, updated_at = ?
                 WHERE id = ? AND is_deleted = 0",
            )
            .bind(type_id.to_string())
            .bind(confidence)
            .bind(&now)
            .bind(id.to_string())
            .execute(&mut *scope.conn())
            .await
        } else {
            query(
                "UPDATE documents SET classification_confidence = ?, updated_at = ?
                 WHERE id = ? AND is_deleted = 0",
            )
            .bind(confidence)
            .bind(&now)
            .bind(id.to_string())
            .execute(&mut *scope.conn())
            .await
        }
        .map_err(DbError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_classification_with_tx(
        &self,
        id: Uuid,
        scope: &mut TransactionScope,
    ) -> DomainResult<bool> {
        let now = Utc::now().to_rfc3339();
        let result = query(
            "UPDATE documents SET document_type_id = NULL, classification_confidence = NULL, updated_at = ?
             WHERE id = ? AND is_deleted = 0",
        )
        .bind(&now)
        .bind(id.to_string())
        .execute(&mut *scope.conn())
        .await
        .map_err(DbError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_optional_with_tx(
        &self,
        id: Uuid,
        scope: &mut TransactionScope,
    ) -> DomainResult<Option<Document>> {
        query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = ? AND is_deleted = 0")
            .bind(id.to_string())
            .fetch_optional(&mut *scope.conn())
            .await
            .map_err(DbError::from)?
            .map(Self::map_row)
            .transpose()
    }

    async fn search(
        &self,
        term: Option<&str>,
        document_type_id: Option<Uuid>,
        params: PaginationParams,
    ) -> DomainResult<PaginatedResult<Document>> {
        let params = params.clamped();
        let mut conditions = vec!["is_deleted = 0".to_string()];
        let mut binds: Vec<String> = Vec::new();

        if let Some(term) = term {
            conditions.push("(name LIKE ? OR description LIKE ?)".to_string());
            let pattern = format!("%{}%", term);
            binds.push(pattern.clone());
            binds.push(pattern);
        }
        if let Some(type_id) = document_type_id {
            conditions.push("document_type_id = ?".to_string());
            binds.push(type_id.to_string());
        }

        let where_clause = conditions.join(" AND ");

        let count_query = format!("SELECT COUNT(*) FROM documents WHERE {}", where_clause);
        let mut cq = query_scalar::<_, i64>(&count_query);
        for bind_val in &binds {
            cq = cq.bind(bind_val);
        }
        let total = cq.fetch_one(&self.pool).await.map_err(DbError::from)?;

        let rows_query = format!(
            "SELECT * FROM documents WHERE {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
            where_clause
        );
        let mut rq = query_as::<_, DocumentRow>(&rows_query);
        for bind_val in &binds {
            rq = rq.bind(bind_val);
        }
        let rows = rq
            .bind(params.per_page as i64)
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

        let items = rows.into_iter().map(Self::map_row).collect::<DomainResult<Vec<_>>>()?;
        Ok(PaginatedResult::new(items, total as u64, params))
    }

    async fn find_by_type(
        &self,
        document_type_id: Uuid,
        params: PaginationParams,
    ) -> DomainResult<PaginatedResult<Document>> {
        self.search(None, Some(document_type_id), params).await
    }

    async fn find_recent(&self, limit: u32) -> DomainResult<Vec<Document>> {
        let limit = limit.clamp(1, crate::types::MAX_PER_PAGE);
        let rows = query_as::<_, DocumentRow>(
            "SELECT * FROM documents WHERE is_deleted = 0 ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn count(&self) -> DomainResult<i64> {
        query_scalar("SELECT COUNT(*) FROM documents WHERE is_deleted = 0")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::Database(DbError::from(e)))
    }

    async fn count_by_type(&self, document_type_id: Uuid) -> DomainResult<i64> {
        query_scalar("SELECT COUNT(*) FROM documents WHERE document_type_id = ? AND is_deleted = 0")
            .bind(document_type_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::Database(DbError::from(e)))
    }
}

// --- Document Metadata Repository ---

#[async_trait]
pub trait DocumentMetadataRepository: Send + Sync {
    /// Update-if-exists-else-insert on (document_id, key). The single write
    /// path for ordinary metadata, keeping one row per key.
    async fn upsert_with_tx(
        &self,
        document_id: Uuid,
        key: &str,
        value: &str,
        scope: &mut TransactionScope,
    ) -> DomainResult<DocumentMetadata>;

    /// Append a new row regardless of existing keys. Used only for
    /// classification history, which keeps every result.
    async fn insert_with_tx(
        &self,
        document_id: Uuid,
        key: &str,
        value: &str,
        scope: &mut TransactionScope,
    ) -> DomainResult<DocumentMetadata>;

    async fn find_by_document(&self, document_id: Uuid) -> DomainResult<Vec<DocumentMetadata>>;

    /// All rows for one key, newest first.
    async fn find_by_document_and_key(
        &self,
        document_id: Uuid,
        key: &str,
    ) -> DomainResult<Vec<DocumentMetadata>>;

    /// Remove every metadata row for a document. Returns the removed count.
    async fn delete_for_document_with_tx(
        &self,
        document_id: Uuid,
        scope: &mut TransactionScope,
    ) -> DomainResult<u64>;

    /// Remove all rows under one key for a document. Returns the removed count.
    async fn delete_key_for_document_with_tx(
        &self,
        document_id: Uuid,
        key: &str,
        scope: &mut TransactionScope,
    ) -> DomainResult<u64>;
}

pub struct SqliteDocumentMetadataRepository {
    pool: Pool<Sqlite>,
}

impl SqliteDocumentMetadataRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_row(row: DocumentMetadataRow) -> DomainResult<DocumentMetadata> {
        row.into_entity()
    }

    async fn fetch_by_id_with_tx(
        &self,
        id: Uuid,
        scope: &mut TransactionScope,
    ) -> DomainResult<DocumentMetadata> {
        query_as::<_, DocumentMetadataRow>("SELECT * FROM document_metadata WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&mut *scope.conn())
            .await
            .map_err(DbError::from)?
            .into_entity()
    }
}

#[async_trait]
impl DocumentMetadataRepository for SqliteDocumentMetadataRepository {
    async fn upsert_with_tx(
        &self,
        document_id: Uuid,
        key: &str,
        value: &str,
        scope: &mut TransactionScope,
    ) -> DomainResult<DocumentMetadata> {
        let now = Utc::now().to_rfc3339();
        let data_type = infer_data_type(value);

        let existing_id: Option<String> = query_scalar(
            "SELECT id FROM document_metadata WHERE document_id = ? AND key = ? LIMIT 1",
        )
        .bind(document_id.to_string())
        .bind(key)
        .fetch_optional(&mut *scope.conn())
        .await
        .map_err(DbError::from)?;

        let id = match existing_id {
            Some(existing_id) => {
                query("UPDATE document_metadata SET value = ?, data_type = ?, updated_at = ? WHERE id = ?")
                    .bind(value)
                    .bind(data_type.as_str())
                    .bind(&now)
                    .bind(&existing_id)
                    .execute(&mut *scope.conn())
                    .await
                    .map_err(DbError::from)?;
                Uuid::parse_str(&existing_id).map_err(|_| DomainError::InvalidUuid(existing_id))?
            }
            None => {
                let id = Uuid::new_v4();
                query(
                    r#"INSERT INTO document_metadata (
                        id, document_id, key, value, data_type, created_at, updated_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
                )
                .bind(id.to_string())
                .bind(document_id.to_string())
                .bind(key)
                .bind(value)
                .bind(data_type.as_str())
                .bind(&now)
                .bind(&now)
                .execute(&mut *scope.conn())
                .await
                .map_err(DbError::from)?;
                id
            }
        };

        self.fetch_by_id_with_tx(id, scope).await
    }

    async fn insert_with_tx(
        &self,
        document_id: Uuid,
        key: &str,
        value: &str,
        scope: &mut TransactionScope,
    ) -> DomainResult<DocumentMetadata> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let data_type = infer_data_type(value);

        query(
            r#"INSERT INTO document_metadata (
                id, document_id, key, value, data_type, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(id.to_string())
        .bind(document_id.to_string())
        .bind(key)
        .bind(value)
        .bind(data_type.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&mut *scope.conn())
        .await
        .map_err(DbError::from)?;

        self.fetch_by_id_with_tx(id, scope).await
    }

    async fn find_by_document(&self, document_id: Uuid) -> DomainResult<Vec<DocumentMetadata>> {
        let rows = query_as::<_, DocumentMetadataRow>(
            "SELECT * FROM document_metadata WHERE document_id = ? ORDER BY key ASC, created_at ASC",
        )
        .bind(document_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn find_by_document_and_key(
        &self,
        document_id: Uuid,
        key: &str,
    ) -> DomainResult<Vec<DocumentMetadata>> {
        let rows = query_as::<_, DocumentMetadataRow>(
            "SELECT * FROM document_metadata WHERE document_id = ? AND key = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(document_id.to_string())
        .bind(key)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn delete_for_document_with_tx(
        &self,
        document_id: Uuid,
        scope: &mut TransactionScope,
    ) -> DomainResult<u64> {
        let result = query("DELETE FROM document_metadata WHERE document_id = ?")
            .bind(document_id.to_string())
            .execute(&mut *scope.conn())
            .await
            .map_err(DbError::from)?;

        Ok(result.rows_affected())
    }

    async fn delete_key_for_document_with_tx(
        &self,
        document_id: Uuid,
        key: &str,
        scope: &mut TransactionScope,
    ) -> DomainResult<u64> {
        let result = query("DELETE FROM document_metadata WHERE document_id = ? AND key = ?")
            .bind(document_id.to_string())
            .bind(key)
            .execute(&mut *scope.conn())
            .await
            .map_err(DbError::from)?;

        Ok(result.rows_affected())
    }
}
