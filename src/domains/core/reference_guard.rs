use crate::errors::{DbError, DomainError, DomainResult};
use async_trait::async_trait;
use sqlx::{query_as, Pool, Sqlite};
use std::collections::HashMap;
use uuid::Uuid;

/// A live reference held against an entity that is about to be deleted.
#[derive(Debug, Clone)]
pub struct Reference {
    /// Name of the table with referencing records
    pub table_name: String,

    /// Count of referencing records
    pub count: i64,

    /// Name of the foreign key column
    pub foreign_key_column: String,
}

/// Pre-condition check shared by every entity with a guarded hard delete:
/// which non-deleted rows still point at this id?
#[async_trait]
pub trait ReferenceGuard: Send + Sync {
    async fn check_references(&self, table_name: &str, id: Uuid) -> DomainResult<Vec<Reference>>;

    /// Simplified list of referencing table names.
    async fn referencing_tables(&self, table_name: &str, id: Uuid) -> DomainResult<Vec<String>> {
        let references = self.check_references(table_name, id).await?;
        Ok(references.into_iter().map(|r| r.table_name).collect())
    }
}

/// SQLite implementation of the ReferenceGuard
pub struct SqliteReferenceGuard {
    pool: Pool<Sqlite>,
    /// Maps table name to (referencing_table, foreign_key_column) pairs
    reference_map: HashMap<String, Vec<(String, String)>>,
}

impl SqliteReferenceGuard {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        let mut reference_map = HashMap::new();

        // Document types are referenced by documents; only non-deleted
        // documents count as live references.
        reference_map.insert(
            "document_types".to_string(),
            vec![("documents".to_string(), "document_type_id".to_string())],
        );

        // Users are referenced by the documents they uploaded.
        reference_map.insert(
            "users".to_string(),
            vec![("documents".to_string(), "uploaded_by_id".to_string())],
        );

        Self { pool, reference_map }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReferenceCount {
    count: i64,
}

#[async_trait]
impl ReferenceGuard for SqliteReferenceGuard {
    async fn check_references(&self, table_name: &str, id: Uuid) -> DomainResult<Vec<Reference>> {
        let mut references = Vec::new();
        let id_str = id.to_string();

        if let Some(referencing_tables) = self.reference_map.get(table_name) {
            for (referencing_table, foreign_key) in referencing_tables {
                let query = format!(
                    "SELECT COUNT(*) as count FROM {} WHERE {} = ? AND is_deleted = 0",
                    referencing_table, foreign_key
                );

                let count_result: Result<ReferenceCount, sqlx::Error> = query_as(&query)
                    .bind(&id_str)
                    .fetch_one(&self.pool)
                    .await;

                let count = match count_result {
                    Ok(c) => c.count,
                    Err(sqlx::Error::RowNotFound) => 0,
                    Err(e) => return Err(DomainError::Database(DbError::from(e))),
                };

                if count > 0 {
                    references.push(Reference {
                        table_name: referencing_table.clone(),
                        count,
                        foreign_key_column: foreign_key.clone(),
                    });
                }
            }
        }

        Ok(references)
    }
}
