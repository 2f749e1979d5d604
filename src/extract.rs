//! Page-text extraction seam.
//!
//! Extraction itself is an external collaborator: the pipeline only needs
//! `extract_text(path) -> String` and treats failure as fatal for that one
//! document. The default implementation reads pre-extracted UTF-8 text;
//! a real page-oriented extractor plugs in through the same trait.

use std::path::Path;

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::error::ExtractError;

/// Max characters kept after preprocessing, sized for the prompt window.
const MAX_TEXT_LEN: usize = 4000;

static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--- Page \d+ ---").expect("static regex"));

/// Extracts readable text from a page-oriented document.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Reads the file as UTF-8 text.
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract_text(&self, path: &Path) -> Result<String, ExtractError> {
        let text = tokio::fs::read_to_string(path).await?;
        if text.trim().is_empty() {
            return Err(ExtractError::Empty {
                path: path.to_path_buf(),
            });
        }
        debug!(path = %path.display(), chars = text.len(), "Extracted page text");
        Ok(text)
    }
}

/// Normalize extracted page text before classification: strip page
/// markers, collapse whitespace, truncate to the prompt budget.
pub fn preprocess_page_text(text: &str) -> String {
    let without_markers = PAGE_MARKER.replace_all(text, " ");
    let mut normalized = without_markers.split_whitespace().collect::<Vec<_>>().join(" ");

    if normalized.chars().count() > MAX_TEXT_LEN {
        normalized = normalized.chars().take(MAX_TEXT_LEN).collect::<String>() + "...";
    }
    normalized
}
