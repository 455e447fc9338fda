use crate::auth::AuthContext;
use crate::domains::core::repository::{FindById, HardDeletable};
use crate::domains::core::transaction::TransactionScope;
use crate::domains::document_type::types::{
    derive_type_name, DocumentType, DocumentTypeRow, NewDocumentType, UpdateDocumentType,
};
use crate::errors::{DbError, DomainError, DomainResult};
use crate::types::{PaginatedResult, PaginationParams};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, query_scalar, Pool, Sqlite};
use uuid::Uuid;

#[async_trait]
pub trait DocumentTypeRepository: FindById<DocumentType> + HardDeletable + Send + Sync {
    async fn create_with_tx(
        &self,
        new_type: &NewDocumentType,
        scope: &mut TransactionScope,
    ) -> DomainResult<DocumentType>;

    /// Partial update; returns None when the id does not exist.
    async fn update_with_tx(
        &self,
        id: Uuid,
        update: &UpdateDocumentType,
        scope: &mut TransactionScope,
    ) -> DomainResult<Option<DocumentType>>;

    /// Soft toggle: mark the type inactive. Returns false when absent.
    async fn deactivate_with_tx(&self, id: Uuid, scope: &mut TransactionScope) -> DomainResult<bool>;

    async fn find_optional_with_tx(
        &self,
        id: Uuid,
        scope: &mut TransactionScope,
    ) -> DomainResult<Option<DocumentType>>;

    /// Exact, case-sensitive name lookup.
    async fn find_by_name(&self, name: &str) -> DomainResult<Option<DocumentType>>;

    async fn find_by_name_with_tx(
        &self,
        name: &str,
        scope: &mut TransactionScope,
    ) -> DomainResult<Option<DocumentType>>;

    async fn find_all(&self, params: PaginationParams) -> DomainResult<PaginatedResult<DocumentType>>;

    async fn find_active(&self) -> DomainResult<Vec<DocumentType>>;

    async fn count(&self) -> DomainResult<i64>;
}

pub struct SqliteDocumentTypeRepository {
    pool: Pool<Sqlite>,
}

impl SqliteDocumentTypeRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_row(row: DocumentTypeRow) -> DomainResult<DocumentType> {
        row.into_entity()
    }
}

#[async_trait]
impl FindById<DocumentType> for SqliteDocumentTypeRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<DocumentType> {
        query_as::<_, DocumentTypeRow>("SELECT * FROM document_types WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound(self.entity_name().to_string(), id))
            .and_then(Self::map_row)
    }
}

#[async_trait]
impl HardDeletable for SqliteDocumentTypeRepository {
    fn entity_name(&self) -> &'static str {
        "document_types"
    }

    async fn hard_delete_with_tx(
        &self,
        id: Uuid,
        _auth: &AuthContext,
        scope: &mut TransactionScope,
    ) -> DomainResult<bool> {
        let result = query("DELETE FROM document_types WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *scope.conn())
            .await
            .map_err(DbError::from)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DocumentTypeRepository for SqliteDocumentTypeRepository {
    async fn create_with_tx(
        &self,
        new_type: &NewDocumentType,
        scope: &mut TransactionScope,
    ) -> DomainResult<DocumentType> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let type_name = derive_type_name(&new_type.name);

        query(
            r#"INSERT INTO document_types (
                id, name, type_name, description, is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, 1, ?, ?)"#,
        )
        .bind(id.to_string())
        .bind(&new_type.name)
        .bind(&type_name)
        .bind(&new_type.description)
        .bind(&now)
        .bind(&now)
        .execute(&mut *scope.conn())
        .await
        .map_err(DbError::from)?;

        query_as::<_, DocumentTypeRow>("SELECT * FROM document_types WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&mut *scope.conn())
            .await
            .map_err(DbError::from)?
            .into_entity()
    }

    async fn update_with_tx(
        &self,
        id: Uuid,
        update: &UpdateDocumentType,
        scope: &mut TransactionScope,
    ) -> DomainResult<Option<DocumentType>> {
        let Some(_existing) = self.find_optional_with_tx(id, scope).await? else {
            return Ok(None);
        };

        let now = Utc::now().to_rfc3339();
        let mut sets: Vec<String> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        if let Some(name) = &update.name {
            sets.push("name = ?".to_string());
            binds.push(name.clone());
            sets.push("type_name = ?".to_string());
            binds.push(derive_type_name(name));
        }
        if let Some(description) = &update.description {
            sets.push("description = ?".to_string());
            binds.push(description.clone());
        }

        if !sets.is_empty() {
            sets.push("updated_at = ?".to_string());
            binds.push(now);

            let query_str = format!("UPDATE document_types SET {} WHERE id = ?", sets.join(", "));
            let mut q = query(&query_str);
            for bind_val in binds {
                q = q.bind(bind_val);
            }
            q = q.bind(id.to_string());
            q.execute(&mut *scope.conn()).await.map_err(DbError::from)?;
        }

        self.find_optional_with_tx(id, scope).await
    }

    async fn deactivate_with_tx(&self, id: Uuid, scope: &mut TransactionScope) -> DomainResult<bool> {
        let now = Utc::now().to_rfc3339();
        let result = query("UPDATE document_types SET is_active = 0, updated_at = ? WHERE id = ?")
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
    ) -> DomainResult<Option<DocumentType>> {
        query_as::<_, DocumentTypeRow>("SELECT * FROM document_types WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *scope.conn())
            .await
            .map_err(DbError::from)?
            .map(Self::map_row)
            .transpose()
    }

    async fn find_by_name(&self, name: &str) -> DomainResult<Option<DocumentType>> {
        query_as::<_, DocumentTypeRow>("SELECT * FROM document_types WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .map(Self::map_row)
            .transpose()
    }

    async fn find_by_name_with_tx(
        &self,
        name: &str,
        scope: &mut TransactionScope,
    ) -> DomainResult<Option<DocumentType>> {
        query_as::<_, DocumentTypeRow>("SELECT * FROM document_types WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *scope.conn())
            .await
            .map_err(DbError::from)?
            .map(Self::map_row)
            .transpose()
    }

    async fn find_all(&self, params: PaginationParams) -> DomainResult<PaginatedResult<DocumentType>> {
        let params = params.clamped();
        let total: i64 = query_scalar("SELECT COUNT(*) FROM document_types")
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;

        let rows = query_as::<_, DocumentTypeRow>(
            "SELECT * FROM document_types ORDER BY name ASC LIMIT ? OFFSET ?",
        )
        .bind(params.per_page as i64)
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        let items = rows.into_iter().map(Self::map_row).collect::<DomainResult<Vec<_>>>()?;
        Ok(PaginatedResult::new(items, total as u64, params))
    }

    async fn find_active(&self) -> DomainResult<Vec<DocumentType>> {
        let rows = query_as::<_, DocumentTypeRow>(
            "SELECT * FROM document_types WHERE is_active = 1 ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn count(&self) -> DomainResult<i64> {
        query_scalar("SELECT COUNT(*) FROM document_types")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::Database(DbError::from(e)))
    }
}
