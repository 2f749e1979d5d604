//! Two-tier analyzer for plain-text correspondence.
//!
//! Same strategy as the document classifier, specialized to two axes:
//! sender intent and urgency. One model call serves both, but each axis
//! is extracted, thresholded, and degraded independently — a response
//! with a usable intent and no urgency takes the rule path for urgency
//! alone.

use std::sync::Arc;

use tracing::warn;

use crate::config::ClassifierConfig;
use crate::llm::{CompletionRequest, InferenceClient, complete_with_retry};
use crate::pipeline::classifier::{PROMPT_CONTENT_LEN, extract_labelled, finish_model_result};
use crate::pipeline::rules::RulesEngine;
use crate::pipeline::types::{
    ClassificationResult, CorrespondenceAssessment, FallbackReason, IntentLabel, Label,
    UrgencyLabel,
};

/// Two-tier correspondence analyzer. Stateless; safe to share.
pub struct CorrespondenceAnalyzer {
    client: Arc<dyn InferenceClient>,
    config: ClassifierConfig,
    intent_rules: RulesEngine<IntentLabel>,
    urgency_rules: RulesEngine<UrgencyLabel>,
}

impl CorrespondenceAnalyzer {
    pub fn new(
        client: Arc<dyn InferenceClient>,
        config: ClassifierConfig,
        intent_rules: RulesEngine<IntentLabel>,
        urgency_rules: RulesEngine<UrgencyLabel>,
    ) -> Self {
        Self {
            client,
            config,
            intent_rules,
            urgency_rules,
        }
    }

    /// Assess intent and urgency. Infallible: each axis degrades to its
    /// own rules engine when the model path fails for it.
    pub async fn analyze(&self, text: &str) -> CorrespondenceAssessment {
        let request = CompletionRequest {
            prompt: build_correspondence_prompt(text),
            model: self.config.model.clone(),
            temperature: self.config.temperature,
        };

        let raw = match complete_with_retry(
            self.client.as_ref(),
            request,
            self.config.request_timeout,
        )
        .await
        {
            Ok(response) => response.text,
            Err(e) => {
                let reason = FallbackReason::Transport(e.to_string());
                warn!(reason = %reason, "Model path failed, using rules for both axes");
                return CorrespondenceAssessment {
                    intent: self.intent_rules.evaluate(text, Some(&reason)),
                    urgency: self.urgency_rules.evaluate(text, Some(&reason)),
                };
            }
        };

        CorrespondenceAssessment {
            intent: self.axis(&raw, text, &["intent", "label"], &self.intent_rules),
            urgency: self.axis(&raw, text, &["urgency"], &self.urgency_rules),
        }
    }

    fn axis<L: Label>(
        &self,
        raw: &str,
        text: &str,
        keys: &[&str],
        rules: &RulesEngine<L>,
    ) -> ClassificationResult<L> {
        let attempt = extract_labelled::<L>(raw, keys)
            .ok_or(FallbackReason::Unparsable)
            .and_then(|extraction| finish_model_result(extraction, &self.config));

        match attempt {
            Ok(result) => result,
            Err(reason) => rules.evaluate(text, Some(&reason)),
        }
    }
}

fn build_correspondence_prompt(text: &str) -> String {
    let content: String = text.chars().take(PROMPT_CONTENT_LEN).collect();
    format!(
        "Classify the intent and urgency of the following message.\n\
         Possible intents: 'Quote Request', 'Order', 'Support', 'Feedback', \
         'General Inquiry', 'Other'.\n\
         Possible urgencies: 'High', 'Normal', 'Low'.\n\
         Respond with ONLY a JSON object with keys 'intent', 'urgency' and \
         'confidence' (0.0-1.0).\n\n\
         Example: {{\"intent\": \"Quote Request\", \"urgency\": \"High\", \"confidence\": 0.9}}\n\n\
         Message:\n---\n{content}\n---"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::rules::{RULE_CONFIDENCE, intent_rules, urgency_rules};
    use crate::pipeline::testing::{DownClient, FixedClient};
    use crate::pipeline::types::Source;

    fn analyzer(client: Arc<dyn InferenceClient>) -> CorrespondenceAnalyzer {
        CorrespondenceAnalyzer::new(
            client,
            ClassifierConfig::default(),
            intent_rules(),
            urgency_rules(),
        )
    }

    #[tokio::test]
    async fn model_path_classifies_both_axes() {
        let analyzer = analyzer(FixedClient::new(
            r#"{"intent": "Support", "urgency": "High", "confidence": 0.9}"#,
        ));
        let assessment = analyzer.analyze("The server is down, please help!").await;
        assert_eq!(assessment.intent.label, IntentLabel::Support);
        assert_eq!(assessment.intent.source, Source::Model);
        assert_eq!(assessment.urgency.label, UrgencyLabel::High);
        assert_eq!(assessment.urgency.source, Source::Model);
        assert!(!assessment.any_fallback());
    }

    #[tokio::test]
    async fn urgent_text_with_model_down_is_high() {
        let analyzer = analyzer(Arc::new(DownClient));
        let assessment = analyzer
            .analyze("This is urgent — the invoice system rejected our order")
            .await;
        assert_eq!(assessment.urgency.label, UrgencyLabel::High);
        assert_eq!(assessment.urgency.source, Source::Rule);
        assert_eq!(assessment.urgency.confidence, RULE_CONFIDENCE);
        assert!(assessment.any_fallback());
    }

    #[tokio::test]
    async fn quote_scenario_with_model_down() {
        let analyzer = analyzer(Arc::new(DownClient));
        let assessment = analyzer
            .analyze("Please send a quote for 500 units by Friday")
            .await;
        assert_eq!(assessment.intent.label, IntentLabel::QuoteRequest);
        assert_eq!(assessment.intent.confidence, 0.6);
        assert_eq!(assessment.intent.source, Source::Rule);
        assert_eq!(assessment.urgency.label, UrgencyLabel::Normal);
    }

    #[tokio::test]
    async fn prose_reply_cannot_fake_an_urgency() {
        // "below" in the reply is not an urgency token; the axis must
        // degrade to rules, which see the urgent message.
        let analyzer = analyzer(FixedClient::new("Thanks, see the notes below for details."));
        let assessment = analyzer.analyze("The server is down, this is urgent!").await;
        assert_eq!(assessment.urgency.label, UrgencyLabel::High);
        assert_eq!(assessment.urgency.source, Source::Rule);
    }

    #[tokio::test]
    async fn axes_degrade_independently() {
        // Model returns a usable intent but no urgency field or token.
        let analyzer = analyzer(FixedClient::new(r#"{"intent": "Feedback"}"#));
        let assessment = analyzer
            .analyze("Some feedback on the release, no rush at all")
            .await;
        assert_eq!(assessment.intent.label, IntentLabel::Feedback);
        assert_eq!(assessment.intent.source, Source::Model);
        assert_eq!(assessment.urgency.label, UrgencyLabel::Low);
        assert_eq!(assessment.urgency.source, Source::Rule);
    }

    #[tokio::test]
    async fn low_confidence_degrades_both_axes() {
        let analyzer = analyzer(FixedClient::new(
            r#"{"intent": "Order", "urgency": "Low", "confidence": 0.1}"#,
        ));
        let assessment = analyzer.analyze("I want to buy 3 units, no rush").await;
        assert_eq!(assessment.intent.source, Source::Rule);
        assert_eq!(assessment.intent.label, IntentLabel::Order);
        assert_eq!(assessment.urgency.source, Source::Rule);
        assert_eq!(assessment.urgency.label, UrgencyLabel::Low);
    }

    #[tokio::test]
    async fn rule_urgency_is_deterministic_across_calls() {
        let analyzer = analyzer(Arc::new(DownClient));
        let text = "urgent: need help immediately";
        for _ in 0..5 {
            let assessment = analyzer.analyze(text).await;
            assert_eq!(assessment.urgency.label, UrgencyLabel::High);
            assert_eq!(assessment.intent.label, IntentLabel::Support);
        }
    }
}
