use crate::domains::classification::types::ClassificationResult;
use crate::errors::{DomainError, DomainResult};
use crate::validation::{Validate, ValidationBuilder};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

/// Document record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub document_type_id: Option<Uuid>,
    pub uploaded_by_id: Uuid,
    pub file_type: String,
    pub file_path: String,
    pub file_size_bytes: i64,
    pub content_hash: String,
    pub classification_confidence: Option<f64>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A key/value metadata entry owned by a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: Uuid,
    pub document_id: Uuid,
    pub key: String,
    pub value: String,
    pub data_type: MetadataDataType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Inferred value kind tag stored next to each metadata value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataDataType {
    Boolean,
    Number,
    Date,
    Json,
    String,
}

impl MetadataDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataDataType::Boolean => "boolean",
            MetadataDataType::Number => "number",
            MetadataDataType::Date => "date",
            MetadataDataType::Json => "json",
            MetadataDataType::String => "string",
        }
    }
}

impl FromStr for MetadataDataType {
    type Err = DomainError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boolean" => Ok(MetadataDataType::Boolean),
            "number" => Ok(MetadataDataType::Number),
            "date" => Ok(MetadataDataType::Date),
            "json" => Ok(MetadataDataType::Json),
            "string" => Ok(MetadataDataType::String),
            _ => Err(DomainError::Internal(format!("Invalid MetadataDataType string: {}", s))),
        }
    }
}

/// Infer the data type tag for a metadata value.
///
/// Precedence is fixed: boolean, then number, then date, then JSON, then
/// string. A value matching an earlier kind never falls through to a later
/// one, so e.g. "20240101" is a number even though it could be read as a
/// date, while "2024-01-01" is a date.
pub fn infer_data_type(value: &str) -> MetadataDataType {
    let trimmed = value.trim();

    if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
        return MetadataDataType::Boolean;
    }

    if trimmed.parse::<i64>().is_ok() {
        return MetadataDataType::Number;
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() && trimmed.chars().next().map_or(false, |c| c.is_ascii_digit() || c == '-' || c == '+' || c == '.') {
            return MetadataDataType::Number;
        }
    }

    if DateTime::parse_from_rfc3339(trimmed).is_ok()
        || NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok()
    {
        return MetadataDataType::Date;
    }

    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
    {
        return MetadataDataType::Json;
    }

    MetadataDataType::String
}

/// DTO for creating a document through the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub name: String,
    pub description: Option<String>,
    pub document_type_id: Option<Uuid>,
    pub metadata: Option<HashMap<String, String>>,
}

impl Validate for NewDocument {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("name", Some(self.name.clone()))
            .required()
            .max_length(255)
            .validate()?;
        if let Some(metadata) = &self.metadata {
            for key in metadata.keys() {
                ValidationBuilder::new("metadata.key", Some(key.clone()))
                    .required()
                    .max_length(100)
                    .validate()?;
            }
        }
        Ok(())
    }
}

/// DTO for partially updating a document. `None` fields are left unchanged;
/// supplying `metadata` replaces the whole metadata set.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateDocument {
    pub name: Option<String>,
    pub description: Option<String>,
    pub document_type_id: Option<Uuid>,
    pub metadata: Option<HashMap<String, String>>,
}

impl Validate for UpdateDocument {
    fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            ValidationBuilder::new("name", Some(name.clone()))
                .required()
                .max_length(255)
                .validate()?;
        }
        Ok(())
    }
}

/// Fully-populated row the service builds after hashing and storing bytes.
/// (Created internally; not part of the caller-facing DTO surface.)
#[derive(Debug, Clone)]
pub struct NewDocumentRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub document_type_id: Option<Uuid>,
    pub uploaded_by_id: Uuid,
    pub file_type: String,
    pub file_path: String,
    pub file_size_bytes: i64,
    pub content_hash: String,
}

impl Validate for NewDocumentRecord {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("name", Some(self.name.clone()))
            .required()
            .max_length(255)
            .validate()?;
        ValidationBuilder::new("file_path", Some(self.file_path.clone()))
            .required()
            .validate()?;
        ValidationBuilder::new("content_hash", Some(self.content_hash.clone()))
            .required()
            .validate()?;
        ValidationBuilder::new("file_size_bytes", Some(self.file_size_bytes))
            .min(0)
            .validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub document_type_id: Option<Uuid>,
    pub type_name: Option<String>,
    pub uploaded_by_id: Uuid,
    pub file_type: String,
    pub file_path: String,
    pub file_size_bytes: i64,
    pub content_hash: String,
    pub classification_confidence: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Vec<DocumentMetadata>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationResult>,
}

impl DocumentResponse {
    pub fn from_document(doc: &Document, type_name: Option<String>) -> Self {
        Self {
            id: doc.id,
            name: doc.name.clone(),
            description: doc.description.clone(),
            document_type_id: doc.document_type_id,
            type_name,
            uploaded_by_id: doc.uploaded_by_id,
            file_type: doc.file_type.clone(),
            file_path: doc.file_path.clone(),
            file_size_bytes: doc.file_size_bytes,
            content_hash: doc.content_hash.clone(),
            classification_confidence: doc.classification_confidence,
            created_at: doc.created_at.to_rfc3339(),
            updated_at: doc.updated_at.to_rfc3339(),
            metadata: None,
            classification: None,
        }
    }
}

/// SQLite row representation for mapping from the database
#[derive(Debug, Clone, FromRow)]
pub struct DocumentRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub document_type_id: Option<String>,
    pub uploaded_by_id: String,
    pub file_type: String,
    pub file_path: String,
    pub file_size_bytes: i64,
    pub content_hash: String,
    pub classification_confidence: Option<f64>,
    pub is_deleted: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl DocumentRow {
    /// Convert database row to domain entity
    pub fn into_entity(self) -> DomainResult<Document> {
        let parse_uuid = |s: &str| -> DomainResult<Uuid> {
            Uuid::parse_str(s).map_err(|_| DomainError::InvalidUuid(s.to_string()))
        };
        let parse_datetime = |s: &str, field: &str| -> DomainResult<DateTime<Utc>> {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| DomainError::Internal(format!("Invalid {} format: {}", field, s)))
        };

        Ok(Document {
            id: parse_uuid(&self.id)?,
            name: self.name,
            description: self.description,
            document_type_id: self.document_type_id.as_deref().map(parse_uuid).transpose()?,
            uploaded_by_id: parse_uuid(&self.uploaded_by_id)?,
            file_type: self.file_type,
            file_path: self.file_path,
            file_size_bytes: self.file_size_bytes,
            content_hash: self.content_hash,
            classification_confidence: self.classification_confidence,
            is_deleted: self.is_deleted != 0,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}

/// SQLite row representation for metadata entries
#[derive(Debug, Clone, FromRow)]
pub struct DocumentMetadataRow {
    pub id: String,
    pub document_id: String,
    pub key: String,
    pub value: String,
    pub data_type: String,
    pub created_at: String,
    pub updated_at: String,
}

impl DocumentMetadataRow {
    /// Convert database row to domain entity
    pub fn into_entity(self) -> DomainResult<DocumentMetadata> {
        let parse_datetime = |s: &str, field: &str| -> DomainResult<DateTime<Utc>> {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| DomainError::Internal(format!("Invalid {} format: {}", field, s)))
        };

        Ok(DocumentMetadata {
            id: Uuid::parse_str(&self.id).map_err(|_| DomainError::InvalidUuid(self.id.clone()))?,
            document_id: Uuid::parse_str(&self.document_id)
                .map_err(|_| DomainError::InvalidUuid(self.document_id.clone()))?,
            key: self.key,
            value: self.value,
            data_type: MetadataDataType::from_str(&self.data_type)?,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}

/// Lowercased extension of a filename, without the dot; empty when absent.
pub fn file_extension(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_boolean() {
        assert_eq!(infer_data_type("true"), MetadataDataType::Boolean);
        assert_eq!(infer_data_type("False"), MetadataDataType::Boolean);
        assert_eq!(infer_data_type(" TRUE "), MetadataDataType::Boolean);
    }

    #[test]
    fn test_infer_number() {
        assert_eq!(infer_data_type("42"), MetadataDataType::Number);
        assert_eq!(infer_data_type("-17"), MetadataDataType::Number);
        assert_eq!(infer_data_type("3.14"), MetadataDataType::Number);
        assert_eq!(infer_data_type("1e6"), MetadataDataType::Number);
        // Digit strings take number precedence even when date-like.
        assert_eq!(infer_data_type("20240101"), MetadataDataType::Number);
        // Textual float spellings are not numbers.
        assert_eq!(infer_data_type("inf"), MetadataDataType::String);
        assert_eq!(infer_data_type("NaN"), MetadataDataType::String);
    }

    #[test]
    fn test_infer_date() {
        assert_eq!(infer_data_type("2024-01-01"), MetadataDataType::Date);
        assert_eq!(infer_data_type("2024-01-01T10:30:00Z"), MetadataDataType::Date);
        assert_eq!(infer_data_type("2024-13-01"), MetadataDataType::String);
    }

    #[test]
    fn test_infer_json() {
        assert_eq!(infer_data_type(r#"{"a": 1}"#), MetadataDataType::Json);
        assert_eq!(infer_data_type("[1, 2, 3]"), MetadataDataType::Json);
        assert_eq!(infer_data_type("{not json"), MetadataDataType::String);
    }

    #[test]
    fn test_infer_string_fallback() {
        assert_eq!(infer_data_type("INV-001"), MetadataDataType::String);
        assert_eq!(infer_data_type(""), MetadataDataType::String);
        assert_eq!(infer_data_type("hello world"), MetadataDataType::String);
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("report.PDF"), "pdf");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
        assert_eq!(file_extension("no_extension"), "");
    }
}
