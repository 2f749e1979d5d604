//! Configuration types.
//!
//! Everything is environment-driven with sensible defaults — there is no
//! CLI argument surface. Variables are prefixed `DOC_TRIAGE_`.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Tunables for the model-backed classification path.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Model identifier passed to the inference service.
    pub model: String,
    /// Sampling temperature for classification calls.
    pub temperature: f32,
    /// Bound on a single inference call. One retry on transport failure.
    pub request_timeout: Duration,
    /// Parsed confidence below this routes to the rule path. A tunable
    /// heuristic with no canonical value, so it is explicitly
    /// configurable rather than baked in.
    pub confidence_threshold: f32,
    /// Confidence assigned when the model response carries none.
    pub default_model_confidence: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: "mistral:latest".to_string(),
            temperature: 0.3,
            request_timeout: Duration::from_secs(10),
            confidence_threshold: 0.5,
            default_model_confidence: 0.75,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the inference service.
    pub inference_url: String,
    /// Directory scanned by the batch entry point.
    pub input_dir: PathBuf,
    /// JSONL provenance store path.
    pub store_path: PathBuf,
    /// Directory for the activity log file.
    pub log_dir: PathBuf,
    pub classifier: ClassifierConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inference_url: "http://localhost:11434".to_string(),
            input_dir: PathBuf::from("./sample_inputs"),
            store_path: PathBuf::from("./data/memory.jsonl"),
            log_dir: PathBuf::from("./output_logs"),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl Config {
    /// Build configuration from `DOC_TRIAGE_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DOC_TRIAGE_INFERENCE_URL") {
            config.inference_url = url;
        }
        if let Ok(dir) = std::env::var("DOC_TRIAGE_INPUT_DIR") {
            config.input_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("DOC_TRIAGE_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Ok(dir) = std::env::var("DOC_TRIAGE_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Ok(model) = std::env::var("DOC_TRIAGE_MODEL") {
            config.classifier.model = model;
        }
        if let Ok(raw) = std::env::var("DOC_TRIAGE_TIMEOUT_SECS") {
            let secs = parse_var("DOC_TRIAGE_TIMEOUT_SECS", &raw)?;
            config.classifier.request_timeout = Duration::from_secs(secs);
        }
        if let Ok(raw) = std::env::var("DOC_TRIAGE_CONFIDENCE_THRESHOLD") {
            let threshold: f32 = parse_var("DOC_TRIAGE_CONFIDENCE_THRESHOLD", &raw)?;
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::InvalidValue {
                    key: "DOC_TRIAGE_CONFIDENCE_THRESHOLD".into(),
                    message: format!("{threshold} is outside [0, 1]"),
                });
            }
            config.classifier.confidence_threshold = threshold;
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.into(),
        message: e.to_string(),
    })
}
