//! Deterministic fallback classifier.
//!
//! An ordered list of `(label, predicate)` pairs evaluated first-match-wins,
//! with an explicit default label. Pure and side-effect-free: the same text
//! always yields the same label, which is what makes the degraded path
//! auditable and testable independently of the model path.

use regex::Regex;
use tracing::debug;

use crate::pipeline::types::{
    ClassificationResult, DocumentLabel, FallbackReason, IntentLabel, Label, Source, UrgencyLabel,
};

/// Confidence assigned to every rule-path classification.
pub const RULE_CONFIDENCE: f32 = 0.6;

/// One `(label, predicate)` pair.
#[derive(Debug, Clone)]
pub struct Rule<L> {
    pub label: L,
    /// Human-readable cue description, used in rationales.
    pub cue: String,
    regex: Regex,
}

impl<L> Rule<L> {
    fn new(label: L, cue: &str, pattern: &str) -> Self {
        Self {
            label,
            cue: cue.into(),
            // Static patterns, validated by the constructor tests below.
            regex: Regex::new(pattern).expect("static rule pattern"),
        }
    }
}

/// Ordered, deterministic rules engine over one closed label set.
pub struct RulesEngine<L> {
    rules: Vec<Rule<L>>,
}

impl<L: Label> RulesEngine<L> {
    pub fn new(rules: Vec<Rule<L>>) -> Self {
        Self { rules }
    }

    /// Classify `text` on the rule path. Always produces a result: the
    /// first matching predicate wins, otherwise the designated default
    /// label. The triggering fallback reason (if any) is folded into the
    /// rationale for provenance.
    pub fn evaluate(&self, text: &str, reason: Option<&FallbackReason>) -> ClassificationResult<L> {
        let prefix = match reason {
            Some(r) => format!("rule fallback ({r})"),
            None => "rule path".to_string(),
        };

        for rule in &self.rules {
            if rule.regex.is_match(text) {
                debug!(label = rule.label.as_str(), cue = %rule.cue, "Rule matched");
                return ClassificationResult {
                    label: rule.label,
                    confidence: RULE_CONFIDENCE,
                    source: Source::Rule,
                    rationale: format!("{prefix}: matched cue '{}'", rule.cue),
                };
            }
        }

        let default = L::fallback_default();
        debug!(label = default.as_str(), "No rule matched, using default label");
        ClassificationResult {
            label: default,
            confidence: RULE_CONFIDENCE,
            source: Source::Rule,
            rationale: format!("{prefix}: no cue matched, default label"),
        }
    }
}

// ── Default rule sets ───────────────────────────────────────────────

/// Keyword rules for page-text documents.
pub fn document_rules() -> RulesEngine<DocumentLabel> {
    RulesEngine::new(vec![
        Rule::new(
            DocumentLabel::Invoice,
            "invoice/bill",
            r"(?i)\b(invoice|bill|billing)\b",
        ),
        Rule::new(
            DocumentLabel::QuoteRequest,
            "quote/quotation",
            r"(?i)\b(quote|quotation)\b",
        ),
        Rule::new(
            DocumentLabel::Contract,
            "contract/agreement",
            r"(?i)\b(contract|agreement)\b",
        ),
    ])
}

/// Keyword rules for correspondence intent.
pub fn intent_rules() -> RulesEngine<IntentLabel> {
    RulesEngine::new(vec![
        Rule::new(
            IntentLabel::QuoteRequest,
            "quote/pricing",
            r"(?i)\b(quote|quotation|estimate|pricing)\b",
        ),
        Rule::new(
            IntentLabel::Order,
            "order/purchase",
            r"(?i)\b(order|purchase|procure|buy)\b",
        ),
        Rule::new(
            IntentLabel::Support,
            "support/issue",
            r"(?i)\b(support|help|issue|problem|bug|trouble)\b",
        ),
        Rule::new(
            IntentLabel::Feedback,
            "feedback/review",
            r"(?i)\b(feedback|suggestion|review|complaint)\b",
        ),
    ])
}

/// Cue-word rules for the urgency axis. Escalation cues are checked
/// before de-escalation cues; neither matching means Normal.
pub fn urgency_rules() -> RulesEngine<UrgencyLabel> {
    RulesEngine::new(vec![
        Rule::new(
            UrgencyLabel::High,
            "escalation keyword",
            r"(?i)\b(urgent|urgently|immediately|asap|critical|emergency)\b",
        ),
        Rule::new(
            UrgencyLabel::Low,
            "de-escalation keyword",
            r"(?i)\b(no rush|whenever|not urgent|low priority|take your time)\b",
        ),
    ])
}
