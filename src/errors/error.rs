use thiserror::Error;
use uuid::Uuid;
use crate::domains::core::file_storage::FileStorageError;

/// Database errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Record not found: {0} with ID {1}")]
    NotFound(String, String),

    #[error("Conflict error: {0}")]
    Conflict(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Database error: {0}")]
    Other(String),
}

/// Domain-level errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),

    #[error("Entity not found: {0} with ID {1}")]
    EntityNotFound(String, Uuid),

    #[error("Cannot delete {entity_type} with ID {id} due to dependent records in: {}", .dependencies.join(", "))]
    DependentRecordsExist {
        entity_type: String,
        id: Uuid,
        dependencies: Vec<String>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cannot perform operation on deleted entity: {0} with ID {1}")]
    DeletedEntity(String, Uuid),

    #[error("File error: {0}")]
    File(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("External error: {0}")]
    External(String),
}

impl From<FileStorageError> for DomainError {
    fn from(error: FileStorageError) -> Self {
        DomainError::External(format!("File storage error: {}", error))
    }
}

/// Service-level errors (application specific)
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Cannot delete record due to dependencies in: {}", .0.join(", "))]
    DependenciesPreventDeletion(Vec<String>),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl From<ValidationError> for ServiceError {
    fn from(error: ValidationError) -> Self {
        ServiceError::Domain(DomainError::Validation(error))
    }
}

impl From<DbError> for ServiceError {
    fn from(error: DbError) -> Self {
        ServiceError::Domain(DomainError::Database(error))
    }
}

/// Validation errors
#[derive(Debug, Error, Clone)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required {
        field: String,
    },

    #[error("Field '{field}' must be at least {min} characters")]
    MinLength {
        field: String,
        min: usize,
    },

    #[error("Field '{field}' cannot exceed {max} characters")]
    MaxLength {
        field: String,
        max: usize,
    },

    #[error("Field '{field}' contains invalid format: {reason}")]
    Format {
        field: String,
        reason: String,
    },

    #[error("Field '{field}' must be unique")]
    Unique {
        field: String,
    },

    #[error("Field '{field}' contains an invalid value: {reason}")]
    InvalidValue {
        field: String,
        reason: String,
    },

    #[error("Relationship error: {0}")]
    Relationship(String),

    #[error("Validation error: {0}")]
    Custom(String),
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        Self::Required {
            field: field.to_string(),
        }
    }

    pub fn min_length(field: &str, min: usize) -> Self {
        Self::MinLength {
            field: field.to_string(),
            min,
        }
    }

    pub fn max_length(field: &str, max: usize) -> Self {
        Self::MaxLength {
            field: field.to_string(),
            max,
        }
    }

    pub fn format(field: &str, reason: &str) -> Self {
        Self::Format {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn unique(field: &str) -> Self {
        Self::Unique {
            field: field.to_string(),
        }
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn relationship(message: &str) -> Self {
        Self::Relationship(message.to_string())
    }

    pub fn custom(message: &str) -> Self {
        Self::Custom(message.to_string())
    }
}
