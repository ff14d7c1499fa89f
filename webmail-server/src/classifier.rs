//! Spam classification capability
//!
//! The classifier is an external collaborator behind a small trait so the
//! core never hardcodes a network endpoint. Callers go through
//! [`classify_fail_open`], which degrades to ham on any failure: an outage
//! of the classifier must never block legitimate mail.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;
use crate::store::{AccountStore, MailStore};

/// Classification verdict for a text blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Spam,
    Ham,
}

/// Trait for classifying mail text
pub trait SpamClassifier: Send + Sync {
    /// Classify a text blob
    fn classify(&self, text: &str) -> Result<Verdict, String>;
}

/// Allow using Box<dyn SpamClassifier> as a SpamClassifier
impl SpamClassifier for Box<dyn SpamClassifier> {
    fn classify(&self, text: &str) -> Result<Verdict, String> {
        (**self).classify(text)
    }
}

/// Classifier that treats everything as ham; used when no classifier
/// service is configured
pub struct NullClassifier;

impl SpamClassifier for NullClassifier {
    fn classify(&self, _text: &str) -> Result<Verdict, String> {
        Ok(Verdict::Ham)
    }
}

/// HTTP classifier for production use
///
/// Posts `{"text": ...}` to the configured endpoint and expects
/// `{"label": "spam" | "ham"}` back.
pub struct HttpClassifier {
    endpoint: String,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    label: String,
}

impl HttpClassifier {
    pub fn new(endpoint: String) -> Self {
        Self { endpoint }
    }
}

impl SpamClassifier for HttpClassifier {
    fn classify(&self, text: &str) -> Result<Verdict, String> {
        // Built per call: classify always runs on the blocking pool and
        // the blocking client must not live on the async runtime
        let client = reqwest::blocking::Client::new();
        let response = client
            .post(&self.endpoint)
            .json(&json!({ "text": text }))
            .send()
            .map_err(|e| format!("Classifier request failed: {}", e))?
            .error_for_status()
            .map_err(|e| format!("Classifier returned error status: {}", e))?;

        let body: ClassifyResponse = response
            .json()
            .map_err(|e| format!("Classifier response not parseable: {}", e))?;

        match body.label.as_str() {
            "spam" => Ok(Verdict::Spam),
            "ham" => Ok(Verdict::Ham),
            other => Err(format!("Unknown classifier label: {}", other)),
        }
    }
}

/// Classify on a blocking task, degrading to ham on any failure
///
/// reqwest's blocking client must not run on the async runtime, so the
/// call is pushed onto the blocking pool (same pattern as any outbound
/// sync HTTP in this codebase).
pub async fn classify_fail_open<U, M, C>(state: &Arc<AppState<U, M, C>>, text: String) -> Verdict
where
    U: AccountStore + 'static,
    M: MailStore + 'static,
    C: SpamClassifier + 'static,
{
    let state = Arc::clone(state);
    let result = tokio::task::spawn_blocking(move || state.classifier.classify(&text))
        .await
        .unwrap_or_else(|e| Err(format!("Classifier task failed: {}", e)));

    match result {
        Ok(verdict) => verdict,
        Err(reason) => {
            tracing::warn!(%reason, "Classifier unavailable, defaulting to ham");
            Verdict::Ham
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_classifier_is_ham() {
        assert_eq!(NullClassifier.classify("anything"), Ok(Verdict::Ham));
    }

    #[test]
    fn test_boxed_classifier_delegates() {
        let boxed: Box<dyn SpamClassifier> = Box::new(NullClassifier);
        assert_eq!(boxed.classify("anything"), Ok(Verdict::Ham));
    }
}
