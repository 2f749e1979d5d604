//! Document processor — routes inputs, runs the right agent, records
//! provenance.
//!
//! **Core invariant: exactly one memory record per processed document,
//! appended before the next input is touched.**
//!
//! Failure policy: routing and extraction problems are fatal for one
//! input only; a memory append failure aborts the whole run — silent
//! loss of traceability is the one thing this pipeline must never do.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::pipeline::classifier::Classifier;
use crate::pipeline::correspondence::CorrespondenceAnalyzer;
use crate::pipeline::router::Router;
use crate::pipeline::types::{Anomaly, Document, Modality, Source, ValidationResult};
use crate::pipeline::validator::{PayloadShape, PayloadValidator};
use crate::store::{AgentName, MemoryRecord, MemoryStore, RecordResult, RecordStatus};

/// What happened to one input file.
#[derive(Debug)]
pub enum FileOutcome {
    /// Processed and recorded.
    Recorded {
        record_id: Uuid,
        conversation_id: String,
        status: RecordStatus,
    },
    /// Failed before a document existed; no record written.
    Failed { error: String },
}

/// Per-file outcomes of one batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<(PathBuf, FileOutcome)>,
}

impl BatchSummary {
    pub fn recorded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, FileOutcome::Recorded { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.recorded()
    }
}

/// Orchestrates Router → agent → MemoryStore.
///
/// Processing is sequential: one document is fully classified/validated
/// and recorded before the next begins. The store is the only mutable
/// state and this processor is its single writer.
pub struct DocumentProcessor {
    router: Router,
    classifier: Classifier,
    correspondence: CorrespondenceAnalyzer,
    validator: PayloadValidator,
    shape: PayloadShape,
    store: MemoryStore,
}

impl DocumentProcessor {
    pub fn new(
        router: Router,
        classifier: Classifier,
        correspondence: CorrespondenceAnalyzer,
        shape: PayloadShape,
        store: MemoryStore,
    ) -> Self {
        Self {
            router,
            classifier,
            correspondence,
            validator: PayloadValidator,
            shape,
            store,
        }
    }

    /// Process every supported file under `dir`, in sorted order.
    ///
    /// Per-file failures are isolated and reported in the summary. Only
    /// a memory append failure (or an unreadable input directory)
    /// escapes as an error.
    pub async fn process_dir(&mut self, dir: &Path) -> Result<BatchSummary, Error> {
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        info!(dir = %dir.display(), files = paths.len(), "Starting batch run");

        let mut summary = BatchSummary::default();
        for path in paths {
            let outcome = self.process_path(&path).await?;
            summary.outcomes.push((path, outcome));
        }

        info!(
            recorded = summary.recorded(),
            failed = summary.failed(),
            "Batch run complete"
        );
        Ok(summary)
    }

    /// Process one input file. `Err` only for fatal (memory) failures.
    pub async fn process_path(&mut self, path: &Path) -> Result<FileOutcome, Error> {
        info!(path = %path.display(), "Processing input");

        let document = match self.router.route(path).await {
            Ok(document) => document,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Input failed before processing");
                return Ok(FileOutcome::Failed {
                    error: e.to_string(),
                });
            }
        };

        let record = self.process_document(&document).await?;
        Ok(FileOutcome::Recorded {
            record_id: record.record_id,
            conversation_id: record.conversation_id,
            status: record.status,
        })
    }

    /// Run the modality's agent and append exactly one record.
    async fn process_document(&mut self, document: &Document) -> Result<MemoryRecord, Error> {
        let (agent_name, result, status) = match document.modality {
            Modality::PageText => {
                let result = self.classifier.classify(&document.raw_content).await;
                let status = if result.source == Source::Rule {
                    RecordStatus::Fallback
                } else {
                    RecordStatus::Ok
                };
                (
                    AgentName::Classifier,
                    RecordResult::Classification(result),
                    status,
                )
            }
            Modality::Correspondence => {
                let assessment = self.correspondence.analyze(&document.raw_content).await;
                let status = if assessment.any_fallback() {
                    RecordStatus::Fallback
                } else {
                    RecordStatus::Ok
                };
                (
                    AgentName::CorrespondenceAnalyzer,
                    RecordResult::Correspondence(assessment),
                    status,
                )
            }
            Modality::StructuredData => {
                let (result, status) = self.validate_payload(&document.raw_content);
                (
                    AgentName::PayloadValidator,
                    RecordResult::Validation(result),
                    status,
                )
            }
        };

        let record = MemoryRecord::new(
            &document.conversation_id,
            agent_name,
            document.modality,
            result,
            status,
        );
        let snapshot = record.clone();

        if let Err(e) = self.store.append(record).await {
            // Fatal: continuing without provenance is worse than aborting.
            error!(error = %e, "Memory append failed, aborting run");
            return Err(Error::Memory(e));
        }

        Ok(snapshot)
    }

    /// Decode and validate a structured payload. An undecodable payload
    /// is still recorded (as an error-status validation result) — the
    /// batch goes on.
    fn validate_payload(&self, raw: &str) -> (ValidationResult, RecordStatus) {
        match serde_json::from_str::<Value>(raw) {
            Ok(payload) => {
                let result = self.validator.validate(&payload, &self.shape);
                let status = if result.is_clean() {
                    RecordStatus::Ok
                } else {
                    RecordStatus::Anomaly
                };
                (result, status)
            }
            Err(e) => {
                let normalized = self
                    .shape
                    .fields
                    .iter()
                    .map(|f| (f.name.clone(), Value::Null))
                    .collect::<Map<_, _>>();
                let result = ValidationResult {
                    normalized: Value::Object(normalized),
                    anomalies: vec![Anomaly {
                        field: "payload".into(),
                        issue: format!("invalid JSON: {e}"),
                    }],
                };
                (result, RecordStatus::Error)
            }
        }
    }

    /// Read-only view of the provenance store.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Hand the store back (e.g. for querying after a run).
    pub fn into_store(self) -> MemoryStore {
        self.store
    }
}
