//! Two-tier classifier for page-text documents.
//!
//! Flow:
//! 1. Model attempt — one inference call with a bounded timeout and one
//!    retry, then tolerant extraction of a label + confidence.
//! 2. Fallback — transport failure, an unparsable response, or confidence
//!    below the configured threshold all route to the rules engine.
//!
//! `classify` never raises on model unavailability; it degrades to the
//! deterministic path and records why in the rationale.

use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ClassifierConfig;
use crate::llm::{CompletionRequest, InferenceClient, complete_with_retry};
use crate::pipeline::rules::RulesEngine;
use crate::pipeline::types::{ClassificationResult, DocumentLabel, FallbackReason, Label, Source};

/// Characters of input content included in the prompt.
pub(crate) const PROMPT_CONTENT_LEN: usize = 2000;

/// Two-tier document classifier. Stateless; safe to share.
pub struct Classifier {
    client: Arc<dyn InferenceClient>,
    config: ClassifierConfig,
    rules: RulesEngine<DocumentLabel>,
}

impl Classifier {
    pub fn new(
        client: Arc<dyn InferenceClient>,
        config: ClassifierConfig,
        rules: RulesEngine<DocumentLabel>,
    ) -> Self {
        Self {
            client,
            config,
            rules,
        }
    }

    /// Classify page text. Infallible by design: every failure mode of
    /// the model path degrades to the deterministic rule path.
    pub async fn classify(&self, text: &str) -> ClassificationResult<DocumentLabel> {
        match self.model_attempt(text).await {
            Ok(result) => result,
            Err(reason) => {
                warn!(reason = %reason, "Model path failed, using rules engine");
                self.rules.evaluate(text, Some(&reason))
            }
        }
    }

    async fn model_attempt(
        &self,
        text: &str,
    ) -> Result<ClassificationResult<DocumentLabel>, FallbackReason> {
        let request = CompletionRequest {
            prompt: build_document_prompt(text),
            model: self.config.model.clone(),
            temperature: self.config.temperature,
        };

        let response =
            complete_with_retry(self.client.as_ref(), request, self.config.request_timeout)
                .await
                .map_err(|e| FallbackReason::Transport(e.to_string()))?;

        let extraction =
            extract_labelled::<DocumentLabel>(&response.text, &["intent", "label", "category"])
                .ok_or(FallbackReason::Unparsable)?;

        finish_model_result(extraction, &self.config)
    }
}

/// Apply the default confidence and the fallback threshold to an
/// extracted label, producing the model-path result.
pub(crate) fn finish_model_result<L: Label>(
    extraction: Extraction<L>,
    config: &ClassifierConfig,
) -> Result<ClassificationResult<L>, FallbackReason> {
    let defaulted = extraction.confidence.is_none();
    let confidence = extraction
        .confidence
        .unwrap_or(config.default_model_confidence)
        .clamp(0.0, 1.0);

    if confidence < config.confidence_threshold {
        return Err(FallbackReason::LowConfidence {
            confidence,
            threshold: config.confidence_threshold,
        });
    }

    debug!(label = extraction.label.as_str(), confidence, "Model path succeeded");
    Ok(ClassificationResult {
        label: extraction.label,
        confidence,
        source: Source::Model,
        rationale: format!(
            "model path: {} returned '{}' (confidence {:.2}{})",
            config.model,
            extraction.label.as_str(),
            confidence,
            if defaulted { ", defaulted" } else { "" },
        ),
    })
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_document_prompt(text: &str) -> String {
    let content: String = text.chars().take(PROMPT_CONTENT_LEN).collect();
    format!(
        "You are a document classifier. Analyze the following text extracted \
         from a page-oriented document and determine its primary category.\n\
         Choose one of: 'Invoice', 'Quote Request', 'Contract', 'General Inquiry', 'Other'.\n\
         Respond with ONLY a JSON object with keys 'label' and 'confidence' (0.0-1.0).\n\n\
         Example: {{\"label\": \"Invoice\", \"confidence\": 0.9}}\n\n\
         Document text:\n---\n{content}\n---"
    )
}

// ── Tolerant response extraction ────────────────────────────────────

/// Label and optional numeric confidence pulled out of a free-form
/// model response.
pub(crate) struct Extraction<L> {
    pub label: L,
    pub confidence: Option<f32>,
}

/// Loose shape of a model response. Every field optional — the service
/// returns arbitrary free-form text and this is only the happy case.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct LooseResponse {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    urgency: Option<String>,
    #[serde(default)]
    confidence: Option<serde_json::Value>,
}

impl LooseResponse {
    fn field(&self, key: &str) -> Option<&str> {
        match key {
            "label" => self.label.as_deref(),
            "intent" => self.intent.as_deref(),
            "category" => self.category.as_deref(),
            "urgency" => self.urgency.as_deref(),
            _ => None,
        }
    }

    /// Numeric confidence, tolerating string-encoded numbers.
    pub(crate) fn numeric_confidence(&self) -> Option<f32> {
        match self.confidence.as_ref()? {
            serde_json::Value::Number(n) => n.as_f64().map(|f| f as f32),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Parse the loose JSON object out of a raw response, if there is one.
pub(crate) fn parse_loose(raw: &str) -> Option<LooseResponse> {
    serde_json::from_str(&extract_json_object(raw)).ok()
}

/// Extract a label for one axis: try the named JSON fields first, then
/// fall back to scanning the raw text for any closed-enum token.
pub(crate) fn extract_labelled<L: Label>(raw: &str, keys: &[&str]) -> Option<Extraction<L>> {
    let loose = parse_loose(raw);

    if let Some(ref loose) = loose {
        for key in keys {
            if let Some(label) = loose.field(key).and_then(L::from_token) {
                return Some(Extraction {
                    label,
                    confidence: loose.numeric_confidence(),
                });
            }
        }
    }

    scan_for_label::<L>(raw).map(|label| Extraction {
        label,
        confidence: loose.as_ref().and_then(LooseResponse::numeric_confidence),
    })
}

/// Find the earliest closed-enum token in free-form text. Tokens match
/// only on word boundaries, so a label name embedded in a longer word
/// ("another", "below") does not count.
pub(crate) fn scan_for_label<L: Label>(text: &str) -> Option<L> {
    L::VARIANTS
        .iter()
        .copied()
        .filter_map(|v| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(v.as_str()));
            // Variant names are static and escape cleanly.
            let finder = Regex::new(&pattern).expect("static label pattern");
            finder.find(text).map(|m| (m.start(), v))
        })
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, v)| v)
}

/// Extract a JSON object from model output, tolerating markdown fences
/// and surrounding prose.
pub(crate) fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::rules::{RULE_CONFIDENCE, document_rules};
    use crate::pipeline::testing::{DownClient, FixedClient};

    fn classifier(client: Arc<dyn InferenceClient>) -> Classifier {
        Classifier::new(client, ClassifierConfig::default(), document_rules())
    }

    // ── Extraction ──────────────────────────────────────────────────

    #[test]
    fn extracts_label_and_confidence_from_json() {
        let extraction = extract_labelled::<DocumentLabel>(
            r#"{"label": "Invoice", "confidence": 0.92}"#,
            &["intent", "label"],
        )
        .unwrap();
        assert_eq!(extraction.label, DocumentLabel::Invoice);
        assert!((extraction.confidence.unwrap() - 0.92).abs() < 0.001);
    }

    #[test]
    fn extracts_from_intent_key() {
        let extraction =
            extract_labelled::<DocumentLabel>(r#"{"intent": "Contract"}"#, &["intent", "label"])
                .unwrap();
        assert_eq!(extraction.label, DocumentLabel::Contract);
        assert!(extraction.confidence.is_none());
    }

    #[test]
    fn extracts_from_markdown_wrapped_json() {
        let raw = "Here you go:\n```json\n{\"label\": \"Quote Request\", \"confidence\": 0.8}\n```";
        let extraction = extract_labelled::<DocumentLabel>(raw, &["label"]).unwrap();
        assert_eq!(extraction.label, DocumentLabel::QuoteRequest);
    }

    #[test]
    fn scans_free_text_for_label_token() {
        let raw = "I believe this document is an Invoice based on the line items.";
        let extraction = extract_labelled::<DocumentLabel>(raw, &["label"]).unwrap();
        assert_eq!(extraction.label, DocumentLabel::Invoice);
        assert!(extraction.confidence.is_none());
    }

    #[test]
    fn scan_picks_earliest_token() {
        assert_eq!(
            scan_for_label::<DocumentLabel>("contract before invoice"),
            Some(DocumentLabel::Contract),
        );
    }

    #[test]
    fn scan_ignores_tokens_inside_longer_words() {
        use crate::pipeline::types::UrgencyLabel;

        // "another" must not read as Other.
        assert_eq!(
            scan_for_label::<DocumentLabel>("This is another fine invoice"),
            Some(DocumentLabel::Invoice),
        );
        // "below" must not read as Low.
        assert_eq!(scan_for_label::<UrgencyLabel>("see the notes below"), None);
    }

    #[test]
    fn no_label_anywhere_is_none() {
        assert!(extract_labelled::<DocumentLabel>("I am not sure at all.", &["label"]).is_none());
    }

    #[test]
    fn string_encoded_confidence_is_accepted() {
        let loose = parse_loose(r#"{"label": "Invoice", "confidence": "0.7"}"#).unwrap();
        assert!((loose.numeric_confidence().unwrap() - 0.7).abs() < 0.001);
    }

    #[test]
    fn extract_json_object_handles_surrounding_prose() {
        let raw = "Sure: {\"label\": \"Other\"} — done.";
        assert_eq!(extract_json_object(raw), r#"{"label": "Other"}"#);
    }

    // ── Classify ────────────────────────────────────────────────────

    #[tokio::test]
    async fn model_path_with_good_response() {
        let classifier = classifier(FixedClient::new(
            r#"{"label": "Invoice", "confidence": 0.95}"#,
        ));
        let result = classifier.classify("Invoice #9 total $10").await;
        assert_eq!(result.label, DocumentLabel::Invoice);
        assert_eq!(result.source, Source::Model);
        assert!((result.confidence - 0.95).abs() < 0.001);
        assert!(result.rationale.contains("model path"));
    }

    #[tokio::test]
    async fn prose_response_with_embedded_tokens_still_classifies() {
        let classifier = classifier(FixedClient::new("This is another fine invoice."));
        let result = classifier.classify("invoice attached").await;
        assert_eq!(result.label, DocumentLabel::Invoice);
        assert_eq!(result.source, Source::Model);
    }

    #[tokio::test]
    async fn missing_confidence_is_defaulted() {
        let classifier = classifier(FixedClient::new(r#"{"label": "Contract"}"#));
        let result = classifier.classify("agreement between parties").await;
        assert_eq!(result.source, Source::Model);
        assert!((result.confidence - 0.75).abs() < 0.001);
        assert!(result.rationale.contains("defaulted"));
    }

    #[tokio::test]
    async fn transport_failure_falls_back_deterministically() {
        let classifier = classifier(Arc::new(DownClient));
        let text = "Requesting a quotation for office chairs";
        let first = classifier.classify(text).await;
        assert_eq!(first.source, Source::Rule);
        assert_eq!(first.label, DocumentLabel::QuoteRequest);
        assert_eq!(first.confidence, RULE_CONFIDENCE);
        assert!(first.rationale.contains("transport failure"));

        // Same text, same label, every repeated call.
        for _ in 0..5 {
            let again = classifier.classify(text).await;
            assert_eq!(again.label, first.label);
            assert_eq!(again.source, Source::Rule);
        }
    }

    #[tokio::test]
    async fn unparsable_response_falls_back() {
        let classifier = classifier(FixedClient::new("I cannot help with that."));
        let result = classifier.classify("invoice attached").await;
        assert_eq!(result.source, Source::Rule);
        assert_eq!(result.label, DocumentLabel::Invoice);
        assert!(result.rationale.contains("unparsable"));
    }

    #[tokio::test]
    async fn low_confidence_falls_back() {
        let classifier = classifier(FixedClient::new(
            r#"{"label": "Contract", "confidence": 0.2}"#,
        ));
        let result = classifier.classify("some bill of materials").await;
        assert_eq!(result.source, Source::Rule);
        // Rules see "bill" and classify Invoice, ignoring the model's guess.
        assert_eq!(result.label, DocumentLabel::Invoice);
        assert!(result.rationale.contains("below threshold"));
    }

    #[tokio::test]
    async fn confidence_above_one_is_clamped() {
        let classifier = classifier(FixedClient::new(
            r#"{"label": "Invoice", "confidence": 1.7}"#,
        ));
        let result = classifier.classify("invoice").await;
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn prompt_truncates_long_content() {
        let prompt = build_document_prompt(&"x".repeat(10_000));
        assert!(prompt.chars().count() < PROMPT_CONTENT_LEN + 600);
    }
}
