use crate::domains::core::repository::FindById;
use crate::domains::core::transaction::TransactionScope;
use crate::domains::user::types::{NewUser, User, UserRow};
use crate::errors::{DbError, DomainError, DomainResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, Pool, Sqlite};
use uuid::Uuid;

#[async_trait]
pub trait UserRepository: FindById<User> + Send + Sync {
    async fn create_with_tx(&self, new_user: &NewUser, scope: &mut TransactionScope) -> DomainResult<User>;

    async fn find_by_username(&self, username: &str) -> DomainResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>>;

    async fn update_last_login(&self, id: Uuid) -> DomainResult<()>;
}

pub struct SqliteUserRepository {
    pool: Pool<Sqlite>,
}

impl SqliteUserRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn entity_name() -> &'static str {
        "users"
    }
}

#[async_trait]
impl FindById<User> for SqliteUserRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<User> {
        query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound(Self::entity_name().to_string(), id))
            .and_then(UserRow::into_entity)
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_with_tx(&self, new_user: &NewUser, scope: &mut TransactionScope) -> DomainResult<User> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        query(
            r#"INSERT INTO users (
                id, username, email, password_hash, password_salt,
                first_name, last_name, is_active, is_admin, last_login_at,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, NULL, ?, ?)"#,
        )
        .bind(id.to_string())
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(&new_user.password_salt)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.is_admin as i64)
        .bind(&now)
        .bind(&now)
        .execute(&mut *scope.conn())
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return DbError::Conflict(format!("username or email already taken: {}", db));
                }
            }
            DbError::from(e)
        })?;

        query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_one(&mut *scope.conn())
            .await
            .map_err(DbError::from)?
            .into_entity()
    }

    async fn find_by_username(&self, username: &str) -> DomainResult<Option<User>> {
        query_as::<_, UserRow>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .map(UserRow::into_entity)
            .transpose()
    }

    async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        query_as::<_, UserRow>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .map(UserRow::into_entity)
            .transpose()
    }

    async fn update_last_login(&self, id: Uuid) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();
        let result = query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(&now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            Err(DomainError::EntityNotFound(Self::entity_name().to_string(), id))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_unit_of_work, test_user};

    #[tokio::test]
    async fn test_create_and_lookup_user() {
        let uow = test_unit_of_work().await;
        let user = test_user(&uow, "alice", false).await;

        let by_id = uow.users().find_by_id(user.id).await.unwrap();
        assert_eq!(by_id.username, "alice");
        assert!(!by_id.is_admin);
        assert!(by_id.is_active);

        let by_name = uow.users().find_by_username("alice").await.unwrap();
        assert_eq!(by_name.unwrap().id, user.id);

        assert!(uow.users().find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let uow = test_unit_of_work().await;
        test_user(&uow, "bob", false).await;

        let new_user = NewUser {
            username: "bob".to_string(),
            email: "bob2@example.com".to_string(),
            password_hash: "hash".to_string(),
            password_salt: "salt".to_string(),
            first_name: None,
            last_name: None,
            is_admin: false,
        };
        let mut scope = uow.begin_autocommit().await.unwrap();
        let result = uow.users().create_with_tx(&new_user, &mut scope).await;
        assert!(matches!(
            result,
            Err(DomainError::Database(DbError::Conflict(_)))
        ));
    }

    #[tokio::test]
    async fn test_update_last_login() {
        let uow = test_unit_of_work().await;
        let user = test_user(&uow, "carol", true).await;
        assert!(user.last_login_at.is_none());

        uow.users().update_last_login(user.id).await.unwrap();
        let reloaded = uow.users().find_by_id(user.id).await.unwrap();
        assert!(reloaded.last_login_at.is_some());

        let missing = uow.users().update_last_login(Uuid::new_v4()).await;
        assert!(matches!(missing, Err(DomainError::EntityNotFound(_, _))));
    }
}
