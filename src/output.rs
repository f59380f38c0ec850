//! Result types returned by the batch entry points.

use crate::error::DocumentError;
use crate::record::FieldRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a batch run produced.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutput {
    /// One record per successfully processed document, in processing order.
    pub records: Vec<FieldRecord>,
    /// One entry per document found, successful or not.
    pub documents: Vec<DocumentResult>,
    pub stats: BatchStats,
    /// Where the spreadsheet was written; `None` when there were no records
    /// or the caller only asked for processing.
    pub report_path: Option<PathBuf>,
}

impl BatchOutput {
    /// Documents that did not make it into the report.
    pub fn failures(&self) -> impl Iterator<Item = &DocumentResult> {
        self.documents.iter().filter(|d| d.error.is_some())
    }
}

/// Outcome of a single document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResult {
    /// File name (not the full path).
    pub file: String,
    /// `None` when the document produced a record.
    pub error: Option<DocumentError>,
    /// Model calls spent on this document, retries included.
    pub model_calls: u32,
    /// Quota cooldowns taken while processing this document.
    pub cooldowns: u32,
    pub duration_ms: u64,
}

impl DocumentResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate counters for a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchStats {
    /// PDF files found in the directory.
    pub total_documents: usize,
    /// Documents that produced a record.
    pub processed: usize,
    /// Documents whose model step failed.
    pub failed: usize,
    /// Documents with no extractable text (no model call was made).
    pub skipped: usize,
    /// Outbound model calls across the batch.
    pub model_calls: u32,
    /// Quota cooldowns across the batch.
    pub cooldowns: u32,
    pub duration_ms: u64,
}
