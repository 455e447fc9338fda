use crate::domains::classification::types::{ClassifierOutput, LabelScore, UNKNOWN_TYPE_NAME};
use async_trait::async_trait;

/// Opaque classification collaborator: text in, label plus scores out.
/// A failed classification is reported in the output, not raised.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> ClassifierOutput;
}

/// Deterministic keyword classifier.
///
/// Serves as the default model and as the fallback when a real model
/// reports failure. Scores are keyword-occurrence counts normalized over
/// all labels; ties break by table order.
pub struct KeywordClassifier;

const KEYWORD_TABLE: &[(&str, &[&str])] = &[
    ("Invoice", &["invoice", "amount due", "bill to", "payment terms", "invoice number", "subtotal"]),
    ("Contract", &["contract", "agreement", "hereby", "party", "terms and conditions", "witness whereof"]),
    ("Report", &["report", "summary", "analysis", "findings", "conclusion", "quarterly"]),
    ("Receipt", &["receipt", "paid", "total", "cash", "change due", "thank you for your purchase"]),
    ("Letter", &["dear", "sincerely", "regards", "yours faithfully"]),
];

impl KeywordClassifier {
    fn score_text(text: &str) -> Vec<LabelScore> {
        let lowered = text.to_lowercase();
        let mut scores: Vec<LabelScore> = Vec::new();
        let mut total_hits = 0usize;

        for (label, keywords) in KEYWORD_TABLE {
            let hits: usize = keywords.iter().map(|kw| lowered.matches(kw).count()).sum();
            total_hits += hits;
            scores.push(LabelScore {
                label: label.to_string(),
                score: hits as f64,
            });
        }

        if total_hits > 0 {
            for entry in &mut scores {
                entry.score /= total_hits as f64;
            }
        }

        // Best first; stable sort keeps table order on ties.
        scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scores
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> ClassifierOutput {
        let predictions = Self::score_text(text);
        let top = predictions.first();

        match top {
            Some(top) if top.score > 0.0 => ClassifierOutput {
                is_successful: true,
                label: top.label.clone(),
                confidence: top.score,
                all_predictions: predictions,
                error_message: None,
            },
            _ => ClassifierOutput {
                is_successful: true,
                label: UNKNOWN_TYPE_NAME.to_string(),
                confidence: 0.0,
                all_predictions: predictions,
                error_message: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invoice_text_classifies_as_invoice() {
        let output = KeywordClassifier
            .classify("Invoice number INV-001. Amount due: $100. Payment terms: net 30.")
            .await;
        assert!(output.is_successful);
        assert_eq!(output.label, "Invoice");
        assert!(output.confidence > 0.5);
    }

    #[tokio::test]
    async fn test_contract_text_classifies_as_contract() {
        let output = KeywordClassifier
            .classify("This agreement is made between party A and party B, who hereby agree...")
            .await;
        assert_eq!(output.label, "Contract");
    }

    #[tokio::test]
    async fn test_no_keywords_yields_unknown() {
        let output = KeywordClassifier.classify("zxqwv blorp").await;
        assert!(output.is_successful);
        assert_eq!(output.label, UNKNOWN_TYPE_NAME);
        assert_eq!(output.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_scores_are_normalized() {
        let output = KeywordClassifier
            .classify("invoice invoice report")
            .await;
        let total: f64 = output.all_predictions.iter().map(|p| p.score).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(output.all_predictions[0].label, "Invoice");
    }

    #[tokio::test]
    async fn test_deterministic_output() {
        let a = KeywordClassifier.classify("quarterly report findings").await;
        let b = KeywordClassifier.classify("quarterly report findings").await;
        assert_eq!(a.label, b.label);
        assert_eq!(a.confidence, b.confidence);
    }
}
