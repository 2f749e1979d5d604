//! Doc Triage — document classification pipeline with provenance.

pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod pipeline;
pub mod store;
