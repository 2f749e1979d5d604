//! Document processing pipeline.
//!
//! Router → {Classifier | CorrespondenceAnalyzer | PayloadValidator} →
//! MemoryStore. The processor owns the orchestration and the batch entry
//! point; everything else is a stateless component.

pub mod classifier;
pub mod correspondence;
pub mod processor;
pub mod router;
pub mod rules;
pub mod types;
pub mod validator;
