use crate::errors::{DomainError, DomainResult};
use crate::validation::{Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Document type definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentType {
    pub id: Uuid,
    pub name: String,
    /// Normalized lookup name, derived from `name` (lowercased, spaces stripped).
    pub type_name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derive the normalized type name from a display name.
pub fn derive_type_name(name: &str) -> String {
    name.to_lowercase().replace(' ', "")
}

/// DTO for creating a new document type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocumentType {
    pub name: String,
    pub description: Option<String>,
}

impl Validate for NewDocumentType {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("name", Some(self.name.clone()))
            .required()
            .min_length(2)
            .max_length(100)
            .validate()?;
        Ok(())
    }
}

/// DTO for updating an existing document type
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateDocumentType {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl Validate for UpdateDocumentType {
    fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            ValidationBuilder::new("name", Some(name.clone()))
                .required()
                .min_length(2)
                .max_length(100)
                .validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTypeResponse {
    pub id: Uuid,
    pub name: String,
    pub type_name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<DocumentType> for DocumentTypeResponse {
    fn from(entity: DocumentType) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            type_name: entity.type_name,
            description: entity.description,
            is_active: entity.is_active,
            created_at: entity.created_at.to_rfc3339(),
            updated_at: entity.updated_at.to_rfc3339(),
        }
    }
}

/// SQLite row representation for mapping from the database
#[derive(Debug, Clone, FromRow)]
pub struct DocumentTypeRow {
    pub id: String,
    pub name: String,
    pub type_name: String,
    pub description: Option<String>,
    pub is_active: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl DocumentTypeRow {
    /// Convert database row to domain entity
    pub fn into_entity(self) -> DomainResult<DocumentType> {
        let parse_datetime = |s: &str, field: &str| -> DomainResult<DateTime<Utc>> {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| DomainError::Internal(format!("Invalid {} format: {}", field, s)))
        };

        Ok(DocumentType {
            id: Uuid::parse_str(&self.id).map_err(|_| DomainError::InvalidUuid(self.id.clone()))?,
            name: self.name,
            type_name: self.type_name,
            description: self.description,
            is_active: self.is_active != 0,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_type_name() {
        assert_eq!(derive_type_name("Invoice"), "invoice");
        assert_eq!(derive_type_name("Purchase Order"), "purchaseorder");
        assert_eq!(derive_type_name("  Mixed Case Name "), "mixedcasename");
    }

    #[test]
    fn test_new_type_validation() {
        let valid = NewDocumentType {
            name: "Invoice".to_string(),
            description: None,
        };
        assert!(valid.validate().is_ok());

        let too_short = NewDocumentType {
            name: "X".to_string(),
            description: None,
        };
        assert!(too_short.validate().is_err());
    }
}
