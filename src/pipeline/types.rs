//! Shared types for the document processing pipeline.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Modality ────────────────────────────────────────────────────────

/// Input category — a closed set, matched exhaustively everywhere.
///
/// The router assigns exactly one modality per input; there is no open
/// type registry. Anything outside this set is `UnsupportedFormat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Modality {
    /// Text extracted from a page-oriented document.
    PageText,
    /// Structured data payload (JSON).
    StructuredData,
    /// Plain-text correspondence (email-like).
    Correspondence,
}

impl Modality {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PageText => "page-text",
            Self::StructuredData => "structured-data",
            Self::Correspondence => "correspondence",
        }
    }

    /// Prefix used when minting conversation ids.
    pub fn conversation_prefix(&self) -> &'static str {
        match self {
            Self::PageText => "doc",
            Self::StructuredData => "data",
            Self::Correspondence => "mail",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Document ────────────────────────────────────────────────────────

/// A routed input. Created once by the router, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document id.
    pub id: Uuid,
    /// Which pipeline branch handles this input.
    pub modality: Modality,
    /// Raw content (extracted page text, JSON source, or message body).
    pub raw_content: String,
    /// Identifier linking every record produced for this input.
    pub conversation_id: String,
    /// Originating file.
    pub source: PathBuf,
}

impl Document {
    /// Create a document with a fresh id and a modality-prefixed
    /// conversation id.
    pub fn new(modality: Modality, raw_content: String, source: PathBuf) -> Self {
        let id = Uuid::new_v4();
        let conversation_id = format!("{}_{}", modality.conversation_prefix(), id.simple());
        Self {
            id,
            modality,
            raw_content,
            conversation_id,
            source,
        }
    }
}

// ── Labels ──────────────────────────────────────────────────────────

/// A closed classification enumeration.
///
/// Both the tolerant model-response extractor and the rules engine are
/// generic over this trait: the extractor matches response tokens against
/// `VARIANTS`, and the rules engine returns `fallback_default()` when no
/// predicate fires.
pub trait Label:
    Copy + Eq + fmt::Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// Every member of the closed set, in declaration order.
    const VARIANTS: &'static [Self];

    /// Canonical display name (also the persisted form).
    fn as_str(&self) -> &'static str;

    /// Label returned when no rule matches.
    fn fallback_default() -> Self;

    /// Match a single token against the closed set, case-insensitively.
    fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::VARIANTS
            .iter()
            .copied()
            .find(|v| v.as_str().eq_ignore_ascii_case(token))
    }
}

/// Category for page-text documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentLabel {
    Invoice,
    Contract,
    #[serde(rename = "Quote Request")]
    QuoteRequest,
    #[serde(rename = "General Inquiry")]
    GeneralInquiry,
    Other,
}

impl Label for DocumentLabel {
    const VARIANTS: &'static [Self] = &[
        Self::Invoice,
        Self::Contract,
        Self::QuoteRequest,
        Self::GeneralInquiry,
        Self::Other,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::Invoice => "Invoice",
            Self::Contract => "Contract",
            Self::QuoteRequest => "Quote Request",
            Self::GeneralInquiry => "General Inquiry",
            Self::Other => "Other",
        }
    }

    fn fallback_default() -> Self {
        Self::GeneralInquiry
    }
}

/// Sender intent for correspondence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentLabel {
    #[serde(rename = "Quote Request")]
    QuoteRequest,
    Order,
    Support,
    Feedback,
    #[serde(rename = "General Inquiry")]
    GeneralInquiry,
    Other,
}

impl Label for IntentLabel {
    const VARIANTS: &'static [Self] = &[
        Self::QuoteRequest,
        Self::Order,
        Self::Support,
        Self::Feedback,
        Self::GeneralInquiry,
        Self::Other,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            Self::QuoteRequest => "Quote Request",
            Self::Order => "Order",
            Self::Support => "Support",
            Self::Feedback => "Feedback",
            Self::GeneralInquiry => "General Inquiry",
            Self::Other => "Other",
        }
    }

    fn fallback_default() -> Self {
        Self::GeneralInquiry
    }
}

/// Urgency axis for correspondence — independent of intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UrgencyLabel {
    High,
    Normal,
    Low,
}

impl Label for UrgencyLabel {
    const VARIANTS: &'static [Self] = &[Self::High, Self::Normal, Self::Low];

    fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Normal => "Normal",
            Self::Low => "Low",
        }
    }

    fn fallback_default() -> Self {
        Self::Normal
    }
}

// ── Classification result ──────────────────────────────────────────

/// Which path produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Model-backed path. Not deterministic across calls — expected.
    Model,
    /// Deterministic rule path (same text, same label, always).
    Rule,
}

/// Outcome of classifying one piece of text. Produced once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult<L> {
    pub label: L,
    /// Always within [0, 1].
    pub confidence: f32,
    pub source: Source,
    /// Human-readable account of the path taken, including any fallback
    /// reason. For observability, not for machine consumption.
    pub rationale: String,
}

/// Both axes of a correspondence assessment.
///
/// Each axis degrades independently: a model response with a usable
/// intent but no urgency still takes the rule path for urgency only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrespondenceAssessment {
    pub intent: ClassificationResult<IntentLabel>,
    pub urgency: ClassificationResult<UrgencyLabel>,
}

impl CorrespondenceAssessment {
    /// True if either axis took the rule path.
    pub fn any_fallback(&self) -> bool {
        self.intent.source == Source::Rule || self.urgency.source == Source::Rule
    }
}

// ── Fallback reason ─────────────────────────────────────────────────

/// Why the model path was abandoned for the rule path.
///
/// Carried into the result rationale so every degraded decision is
/// traceable from the memory store alone.
#[derive(Debug, Clone)]
pub enum FallbackReason {
    /// Inference service unreachable or timed out, after one retry.
    Transport(String),
    /// Response contained no recognizable label.
    Unparsable,
    /// Parsed confidence fell below the configured threshold.
    LowConfidence { confidence: f32, threshold: f32 },
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(reason) => write!(f, "transport failure: {reason}"),
            Self::Unparsable => write!(f, "unparsable model response"),
            Self::LowConfidence {
                confidence,
                threshold,
            } => write!(
                f,
                "confidence {confidence:.2} below threshold {threshold:.2}"
            ),
        }
    }
}

// ── Validation result ───────────────────────────────────────────────

/// One discrepancy found while validating a structured payload.
///
/// Anomalies are non-fatal; callers decide whether they block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Dotted field path (e.g. `customer.email`).
    pub field: String,
    pub issue: String,
}

/// Best-effort normalization of a structured payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Exactly the shape's fields; missing ones are `null`.
    pub normalized: serde_json::Value,
    /// In shape-declaration order.
    pub anomalies: Vec<Anomaly>,
}

impl ValidationResult {
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }
}
