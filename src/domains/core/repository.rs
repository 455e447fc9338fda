use crate::auth::AuthContext;
use crate::domains::core::transaction::TransactionScope;
use crate::errors::DomainResult;
use async_trait::async_trait;
use uuid::Uuid;

/// Trait for finding entities by ID
#[async_trait]
pub trait FindById<T> {
    /// Find an entity by ID, erroring when it does not exist.
    async fn find_by_id(&self, id: Uuid) -> DomainResult<T>;
}

/// Trait for entities that support soft deletion
#[async_trait]
pub trait SoftDeletable {
    /// Mark an entity deleted within a scope. Returns false when the entity
    /// does not exist or is already deleted.
    async fn soft_delete_with_tx(
        &self,
        id: Uuid,
        auth: &AuthContext,
        scope: &mut TransactionScope,
    ) -> DomainResult<bool>;
}

/// Trait for entities that support hard deletion
#[async_trait]
pub trait HardDeletable {
    /// The name of the entity table in the database (for guards/logging)
    fn entity_name(&self) -> &'static str;

    /// Remove the row within a scope. Returns false when nothing was deleted.
    async fn hard_delete_with_tx(
        &self,
        id: Uuid,
        auth: &AuthContext,
        scope: &mut TransactionScope,
    ) -> DomainResult<bool>;
}
