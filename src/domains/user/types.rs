use crate::errors::{DomainError, DomainResult};
use crate::types::UserRole;
use crate::validation::{Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Core User entity. The core only needs users as the attribution target for
/// uploads; credential handling lives in the identity layer outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> UserRole {
        if self.is_admin {
            UserRole::Admin
        } else {
            UserRole::User
        }
    }
}

/// DTO for creating a new user. Password hash and salt are produced by the
/// identity provider; this crate never sees plain-text credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
}

impl Validate for NewUser {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("username", Some(self.username.clone()))
            .required()
            .min_length(3)
            .max_length(50)
            .validate()?;
        ValidationBuilder::new("email", Some(self.email.clone()))
            .required()
            .email()
            .validate()?;
        ValidationBuilder::new("password_hash", Some(self.password_hash.clone()))
            .required()
            .validate()?;
        Ok(())
    }
}

/// SQLite row representation for mapping from the database
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: i64,
    pub is_admin: i64,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRow {
    /// Convert database row to domain entity
    pub fn into_entity(self) -> DomainResult<User> {
        let parse_datetime = |s: &str, field: &str| -> DomainResult<DateTime<Utc>> {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| DomainError::Internal(format!("Invalid {} format: {}", field, s)))
        };

        Ok(User {
            id: Uuid::parse_str(&self.id).map_err(|_| DomainError::InvalidUuid(self.id.clone()))?,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            password_salt: self.password_salt,
            first_name: self.first_name,
            last_name: self.last_name,
            is_active: self.is_active != 0,
            is_admin: self.is_admin != 0,
            last_login_at: self
                .last_login_at
                .as_deref()
                .map(|s| parse_datetime(s, "last_login_at"))
                .transpose()?,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}
