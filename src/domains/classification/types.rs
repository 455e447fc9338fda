use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder label reported when nothing could be classified.
pub const UNKNOWN_TYPE_NAME: &str = "Unknown";

/// A label with its raw score from the classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Outcome of one classification request.
///
/// Not persisted as its own table; applied results are serialized into a
/// document metadata row. An unsuccessful result is normal control flow,
/// not an error: callers check `is_successful`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub is_successful: bool,
    pub predicted_type_id: Option<Uuid>,
    pub predicted_type_name: String,
    /// Certainty of the top prediction, in [0, 1].
    pub confidence: f64,
    /// Ranked predictions, best first.
    pub all_predictions: Vec<LabelScore>,
    pub error_message: Option<String>,
    pub classified_at: DateTime<Utc>,
}

impl ClassificationResult {
    /// The degraded outcome: zero-confidence "Unknown", with the reason.
    pub fn failed(reason: &str) -> Self {
        Self {
            is_successful: false,
            predicted_type_id: None,
            predicted_type_name: UNKNOWN_TYPE_NAME.to_string(),
            confidence: 0.0,
            all_predictions: Vec::new(),
            error_message: Some(reason.to_string()),
            classified_at: Utc::now(),
        }
    }
}

/// Raw output from a classifier collaborator.
#[derive(Debug, Clone)]
pub struct ClassifierOutput {
    pub is_successful: bool,
    pub label: String,
    pub confidence: f64,
    pub all_predictions: Vec<LabelScore>,
    pub error_message: Option<String>,
}
