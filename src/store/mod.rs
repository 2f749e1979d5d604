//! Append-only provenance store.
//!
//! Every agent decision becomes exactly one `MemoryRecord`, persisted as
//! one JSON line. The store grows monotonically — records are never
//! updated or deleted. Appends are flushed and fsynced individually, so a
//! crash mid-write can only tear the final uncommitted line; loading
//! drops and truncates such a torn tail without touching earlier
//! records.
//!
//! Single writer by design: `append` takes `&mut self`. A concurrent
//! variant must serialize writes through one owner.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::MemoryError;
use crate::pipeline::types::{
    ClassificationResult, CorrespondenceAssessment, DocumentLabel, Modality, ValidationResult,
};

// ── Record types ────────────────────────────────────────────────────

/// Which agent produced a record. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentName {
    Classifier,
    CorrespondenceAnalyzer,
    PayloadValidator,
}

/// Outcome class of one processed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Model path succeeded (or validation was clean).
    Ok,
    /// Rule path was taken for at least one axis.
    Fallback,
    /// Validation found non-fatal anomalies.
    Anomaly,
    /// Recoverable per-document failure (e.g. undecodable payload).
    Error,
}

/// The agent result carried inside a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordResult {
    Classification(ClassificationResult<DocumentLabel>),
    Correspondence(CorrespondenceAssessment),
    Validation(ValidationResult),
}

/// One immutable provenance entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub record_id: Uuid,
    pub conversation_id: String,
    pub agent_name: AgentName,
    /// ISO-8601 on the wire.
    pub timestamp: DateTime<Utc>,
    pub modality: Modality,
    pub result: RecordResult,
    pub status: RecordStatus,
}

impl MemoryRecord {
    pub fn new(
        conversation_id: &str,
        agent_name: AgentName,
        modality: Modality,
        result: RecordResult,
        status: RecordStatus,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            conversation_id: conversation_id.to_string(),
            agent_name,
            timestamp: Utc::now(),
            modality,
            result,
            status,
        }
    }
}

// ── Store ───────────────────────────────────────────────────────────

/// Durable append-only store over a JSON Lines file.
pub struct MemoryStore {
    path: PathBuf,
    file: tokio::fs::File,
    records: Vec<MemoryRecord>,
}

impl MemoryStore {
    /// Open (or create) the store, loading every existing record.
    ///
    /// A torn trailing line from an interrupted append is dropped with a
    /// warning and truncated off the file, so subsequent appends start on
    /// a fresh line. A torn line anywhere else means external tampering
    /// and fails the open.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| MemoryError::Open {
                    path: path.clone(),
                    source,
                })?;
        }

        let existing = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(source) => {
                return Err(MemoryError::Open {
                    path: path.clone(),
                    source,
                });
            }
        };

        let mut offset = 0;
        let mut entries: Vec<(usize, &str)> = Vec::new();
        for chunk in existing.split_inclusive('\n') {
            let line = chunk.trim_end_matches(|c| c == '\n' || c == '\r');
            if !line.trim().is_empty() {
                entries.push((offset, line));
            }
            offset += chunk.len();
        }

        let mut records = Vec::new();
        let mut torn_at = None;
        for (index, (start, line)) in entries.iter().enumerate() {
            match serde_json::from_str::<MemoryRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) if index == entries.len() - 1 => {
                    warn!(path = %path.display(), error = %e, "Dropping torn trailing record");
                    torn_at = Some(*start as u64);
                }
                Err(e) => return Err(MemoryError::Serialize(e)),
            }
        }

        // The torn bytes must come off the disk too, or the next append
        // would continue the partial line and corrupt its own record.
        if let Some(valid_len) = torn_at {
            let file = tokio::fs::OpenOptions::new()
                .write(true)
                .open(&path)
                .await
                .map_err(|source| MemoryError::Open {
                    path: path.clone(),
                    source,
                })?;
            file.set_len(valid_len)
                .await
                .map_err(|source| MemoryError::Open {
                    path: path.clone(),
                    source,
                })?;
            file.sync_data()
                .await
                .map_err(|source| MemoryError::Open {
                    path: path.clone(),
                    source,
                })?;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| MemoryError::Open {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), records = records.len(), "Memory store opened");
        Ok(Self {
            path,
            file,
            records,
        })
    }

    /// Append one record. Atomic with respect to previously persisted
    /// records: the line is written, flushed and fsynced before this
    /// returns. Failure here is fatal to the run — the caller must abort
    /// rather than continue without provenance.
    pub async fn append(&mut self, record: MemoryRecord) -> Result<Uuid, MemoryError> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        self.file
            .write_all(line.as_bytes())
            .await
            .map_err(MemoryError::Append)?;
        self.file.flush().await.map_err(MemoryError::Append)?;
        self.file.sync_data().await.map_err(MemoryError::Append)?;

        let record_id = record.record_id;
        info!(
            record_id = %record_id,
            conversation_id = %record.conversation_id,
            status = ?record.status,
            total = self.records.len() + 1,
            "Appended memory record"
        );
        self.records.push(record);
        Ok(record_id)
    }

    /// Assemble a store from raw parts, e.g. around a handle rigged to
    /// fail writes.
    #[cfg(test)]
    pub(crate) fn with_parts(
        path: PathBuf,
        file: tokio::fs::File,
        records: Vec<MemoryRecord>,
    ) -> Self {
        Self {
            path,
            file,
            records,
        }
    }

    /// All records for one conversation, in insertion order.
    pub fn query(&self, conversation_id: &str) -> Vec<&MemoryRecord> {
        self.records
            .iter()
            .filter(|r| r.conversation_id == conversation_id)
            .collect()
    }

    /// Every record, in insertion order.
    pub fn records(&self) -> &[MemoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
