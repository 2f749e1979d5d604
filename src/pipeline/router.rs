//! Input routing — extension and content sniffing over a closed modality set.
//!
//! The router is the only place a `Document` is created. Unrecognized
//! inputs fail with `UnsupportedFormat`, scoped to that single input;
//! the batch keeps going.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::error::RouteError;
use crate::extract::{TextExtractor, preprocess_page_text};
use crate::pipeline::types::{Document, Modality};

/// Email header indicators; two or more mark content as correspondence.
const EMAIL_INDICATORS: &[&str] = &["from:", "to:", "subject:", "dear", "@", "sent:", "date:"];

/// Dispatches inputs to a modality and materializes a `Document`.
pub struct Router {
    extractor: Arc<dyn TextExtractor>,
}

impl Router {
    pub fn new(extractor: Arc<dyn TextExtractor>) -> Self {
        Self { extractor }
    }

    /// Route one input file.
    ///
    /// `.pdf` is page-text (through the extractor); `.json` is
    /// structured data; text-ish extensions are sniffed into
    /// correspondence, structured data, or page-text. Anything else gets
    /// one content-sniffing chance before `UnsupportedFormat`.
    pub async fn route(&self, path: &Path) -> Result<Document, RouteError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let document = match extension.as_str() {
            "pdf" => {
                let raw = self.extractor.extract_text(path).await?;
                Document::new(
                    Modality::PageText,
                    preprocess_page_text(&raw),
                    path.to_path_buf(),
                )
            }
            "json" => {
                let raw = read_text(path).await?;
                Document::new(Modality::StructuredData, raw, path.to_path_buf())
            }
            "txt" | "eml" | "md" | "" => {
                let raw = read_text(path).await?;
                match sniff_modality(&raw) {
                    Some(modality) => Document::new(modality, raw, path.to_path_buf()),
                    None => {
                        return Err(RouteError::UnsupportedFormat {
                            path: path.to_path_buf(),
                            extension,
                        });
                    }
                }
            }
            _ => {
                return Err(RouteError::UnsupportedFormat {
                    path: path.to_path_buf(),
                    extension,
                });
            }
        };

        debug!(
            path = %path.display(),
            modality = %document.modality,
            conversation_id = %document.conversation_id,
            "Routed input"
        );
        Ok(document)
    }
}

async fn read_text(path: &Path) -> Result<String, RouteError> {
    Ok(tokio::fs::read_to_string(path)
        .await
        .map_err(crate::error::ExtractError::Io)?)
}

/// Determine a modality from content alone.
///
/// Leading `{`/`[` implies structured data; two or more email header
/// indicators imply correspondence; any other non-empty text is treated
/// as page text.
fn sniff_modality(content: &str) -> Option<Modality> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Some(Modality::StructuredData);
    }
    if looks_like_email(content) {
        return Some(Modality::Correspondence);
    }
    Some(Modality::PageText)
}

fn looks_like_email(content: &str) -> bool {
    let lower = content.to_lowercase();
    EMAIL_INDICATORS
        .iter()
        .filter(|indicator| lower.contains(*indicator))
        .count()
        >= 2
}
