use crate::auth::AuthContext;
use crate::domains::classification::classifier::{Classifier, KeywordClassifier};
use crate::domains::classification::extractor::TextExtractor;
use crate::domains::classification::types::ClassificationResult;
use crate::domains::core::unit_of_work::UnitOfWork;
use crate::domains::document::repository::CLASSIFICATION_RESULT_KEY;
use crate::domains::document::types::file_extension;
use crate::errors::{DomainError, ServiceResult};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Orchestrates classification: extract text, classify, and optionally
/// persist the outcome onto a document.
///
/// A request moves through extract and classify stages; any stage that
/// cannot proceed degrades to an unsuccessful result instead of erroring,
/// so callers are never blocked by ML unavailability.
#[async_trait]
pub trait ClassificationService: Send + Sync {
    /// Classify file content without touching storage. Empty extracted text
    /// yields an unsuccessful zero-confidence result, not an error.
    async fn classify_document(&self, data: &[u8], filename: &str) -> ServiceResult<ClassificationResult>;

    /// Write a classification outcome onto the document row and append the
    /// serialized result to its metadata, in one transaction. Returns false
    /// when the document does not exist.
    async fn apply_classification(
        &self,
        auth: &AuthContext,
        document_id: Uuid,
        result: &ClassificationResult,
    ) -> ServiceResult<bool>;

    /// Classify and, when successful, apply. With `assign_type` false the
    /// predicted type is reported but not written to the document row
    /// (the caller already chose a type explicitly).
    async fn classify_and_apply(
        &self,
        auth: &AuthContext,
        document_id: Uuid,
        data: &[u8],
        filename: &str,
        assign_type: bool,
    ) -> ServiceResult<ClassificationResult>;

    /// Past results for a document, newest first. Malformed entries are
    /// logged and skipped.
    async fn get_classification_history(
        &self,
        document_id: Uuid,
    ) -> ServiceResult<Vec<ClassificationResult>>;

    /// Clear the document's type and confidence and drop its stored
    /// classification history. Returns false when the document is absent.
    async fn reset_classification(&self, auth: &AuthContext, document_id: Uuid) -> ServiceResult<bool>;
}

pub struct ClassificationServiceImpl {
    uow: Arc<UnitOfWork>,
    extractor: Arc<dyn TextExtractor>,
    classifier: Arc<dyn Classifier>,
    fallback: KeywordClassifier,
}

impl ClassificationServiceImpl {
    pub fn new(
        uow: Arc<UnitOfWork>,
        extractor: Arc<dyn TextExtractor>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            uow,
            extractor,
            classifier,
            fallback: KeywordClassifier,
        }
    }

    /// Resolve a predicted label to a stored document type id, if one matches.
    async fn resolve_type_id(&self, label: &str) -> ServiceResult<Option<Uuid>> {
        let types = self.uow.document_types();
        Ok(types.find_by_name(label).await?.map(|t| t.id))
    }
}

#[async_trait]
impl ClassificationService for ClassificationServiceImpl {
    async fn classify_document(&self, data: &[u8], filename: &str) -> ServiceResult<ClassificationResult> {
        let extension = file_extension(filename);
        let text = self.extractor.extract_text(data, &extension);

        if text.trim().is_empty() {
            return Ok(ClassificationResult::failed("no text could be extracted"));
        }

        let mut output = self.classifier.classify(&text).await;
        if !output.is_successful {
            log::warn!(
                "classifier failed for {} ({}), falling back to keyword model",
                filename,
                output.error_message.as_deref().unwrap_or("no detail")
            );
            output = self.fallback.classify(&text).await;
        }

        let predicted_type_id = self.resolve_type_id(&output.label).await?;

        Ok(ClassificationResult {
            is_successful: output.is_successful,
            predicted_type_id,
            predicted_type_name: output.label,
            confidence: output.confidence.clamp(0.0, 1.0),
            all_predictions: output.all_predictions,
            error_message: output.error_message,
            classified_at: Utc::now(),
        })
    }

    async fn apply_classification(
        &self,
        _auth: &AuthContext,
        document_id: Uuid,
        result: &ClassificationResult,
    ) -> ServiceResult<bool> {
        let documents = self.uow.documents();
        let metadata = self.uow.document_metadata();
        let serialized = serde_json::to_string(result)
            .map_err(|e| DomainError::Internal(format!("failed to serialize classification result: {}", e)))?;
        let predicted_type_id = result.predicted_type_id;
        let confidence = result.confidence;

        let applied = self
            .uow
            .execute_in_transaction("classification.apply", move |scope| {
                Box::pin(async move {
                    let updated = documents
                        .set_classification_with_tx(document_id, predicted_type_id, Some(confidence), scope)
                        .await?;
                    if !updated {
                        return Ok(false);
                    }
                    metadata
                        .insert_with_tx(document_id, CLASSIFICATION_RESULT_KEY, &serialized, scope)
                        .await?;
                    Ok(true)
                })
            })
            .await?;

        Ok(applied)
    }

    async fn classify_and_apply(
        &self,
        auth: &AuthContext,
        document_id: Uuid,
        data: &[u8],
        filename: &str,
        assign_type: bool,
    ) -> ServiceResult<ClassificationResult> {
        let result = self.classify_document(data, filename).await?;
        if !result.is_successful {
            return Ok(result);
        }

        let mut to_apply = result.clone();
        if !assign_type {
            to_apply.predicted_type_id = None;
        }

        if !self.apply_classification(auth, document_id, &to_apply).await? {
            log::warn!("classification result for missing document {} was discarded", document_id);
        }

        Ok(result)
    }

    async fn get_classification_history(
        &self,
        document_id: Uuid,
    ) -> ServiceResult<Vec<ClassificationResult>> {
        let rows = self
            .uow
            .document_metadata()
            .find_by_document_and_key(document_id, CLASSIFICATION_RESULT_KEY)
            .await?;

        let mut history = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_str::<ClassificationResult>(&row.value) {
                Ok(result) => history.push(result),
                Err(e) => {
                    log::warn!(
                        "skipping malformed classification entry {} for document {}: {}",
                        row.id,
                        document_id,
                        e
                    );
                }
            }
        }
        Ok(history)
    }

    async fn reset_classification(&self, _auth: &AuthContext, document_id: Uuid) -> ServiceResult<bool> {
        let documents = self.uow.documents();
        let metadata = self.uow.document_metadata();

        let reset = self
            .uow
            .execute_in_transaction("classification.reset", move |scope| {
                Box::pin(async move {
                    let cleared = documents.clear_classification_with_tx(document_id, scope).await?;
                    if !cleared {
                        return Ok(false);
                    }
                    metadata
                        .delete_key_for_document_with_tx(document_id, CLASSIFICATION_RESULT_KEY, scope)
                        .await?;
                    Ok(true)
                })
            })
            .await?;

        Ok(reset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::classification::types::UNKNOWN_TYPE_NAME;
    use crate::test_support::{admin_context, test_env};

    #[tokio::test]
    async fn test_empty_extraction_degrades_without_error() {
        let env = test_env().await;
        let result = env
            .classification_service
            .classify_document(b"\x89PNG binary", "photo.png")
            .await
            .unwrap();

        assert!(!result.is_successful);
        assert_eq!(result.predicted_type_name, UNKNOWN_TYPE_NAME);
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_classification_resolves_known_type() {
        let env = test_env().await;
        env.seed_standard_types().await;

        let result = env
            .classification_service
            .classify_document(b"Invoice number 42, amount due 100 EUR", "inv.txt")
            .await
            .unwrap();

        assert!(result.is_successful);
        assert_eq!(result.predicted_type_name, "Invoice");
        assert!(result.predicted_type_id.is_some());
        assert!(result.confidence > 0.0);
    }

    #[tokio::test]
    async fn test_apply_to_missing_document_is_noop_false() {
        let env = test_env().await;
        let result = ClassificationResult::failed("whatever");
        let applied = env
            .classification_service
            .apply_classification(&admin_context(), Uuid::new_v4(), &result)
            .await
            .unwrap();
        assert!(!applied);
    }

    #[tokio::test]
    async fn test_history_skips_malformed_entries() {
        let env = test_env().await;
        let auth = admin_context();
        // A .png upload extracts no text, so creation applies no result itself.
        let doc = env.create_document_with_type(&auth, "notes.png", None).await;

        let result = env
            .classification_service
            .classify_document(b"report with findings and analysis", "notes.txt")
            .await
            .unwrap();
        assert!(env
            .classification_service
            .apply_classification(&auth, doc.id, &result)
            .await
            .unwrap());

        // Hand-write a corrupt history row; reads must survive it.
        let metadata = env.uow.document_metadata();
        let mut scope = env.uow.begin_autocommit().await.unwrap();
        metadata
            .insert_with_tx(doc.id, CLASSIFICATION_RESULT_KEY, "not json at all", &mut scope)
            .await
            .unwrap();
        drop(scope);

        let history = env
            .classification_service
            .get_classification_history(doc.id)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].predicted_type_name, result.predicted_type_name);
    }

    #[tokio::test]
    async fn test_reset_clears_type_confidence_and_history() {
        let env = test_env().await;
        env.seed_standard_types().await;
        let auth = admin_context();
        let doc = env.create_document_with_type(&auth, "inv.txt", None).await;

        let result = env
            .classification_service
            .classify_document(b"invoice amount due", "inv.txt")
            .await
            .unwrap();
        env.classification_service
            .apply_classification(&auth, doc.id, &result)
            .await
            .unwrap();

        let reloaded = env.uow.documents().find_by_id(doc.id).await.unwrap();
        assert!(reloaded.classification_confidence.is_some());

        assert!(env
            .classification_service
            .reset_classification(&auth, doc.id)
            .await
            .unwrap());

        let cleared = env.uow.documents().find_by_id(doc.id).await.unwrap();
        assert!(cleared.document_type_id.is_none());
        assert!(cleared.classification_confidence.is_none());
        assert!(env
            .classification_service
            .get_classification_history(doc.id)
            .await
            .unwrap()
            .is_empty());

        assert!(!env
            .classification_service
            .reset_classification(&auth, Uuid::new_v4())
            .await
            .unwrap());
    }
}
