//! # pdf2xlsx
//!
//! Batch-extract company qualification dossiers (PDF) into a spreadsheet
//! using a generative language model.
//!
//! Each PDF in a directory is reduced to its text layer, sent to the model
//! with a fixed extraction prompt, and the JSON answer is mapped onto fifteen
//! canonical columns. One row per document lands in
//! `export_qualifications.xlsx` next to the PDFs.
//!
//! ## Pipeline Overview
//!
//! ```text
//! directory
//!  │
//!  ├─ 1. Input    list *.pdf (top level, sorted)
//!  ├─ 2. Extract  pdfium text layer (spawn_blocking); empty → skip
//!  ├─ 3. Prompt   instructions + field list + document text
//!  ├─ 4. Model    Gemini call with fault / quota retry and pacing
//!  ├─ 5. Parse    ```json block → 15-field record
//!  └─ 6. Report   one worksheet, one row per record
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2xlsx::{export_directory, ExportConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from GEMINI_API_KEY / GOOGLE_API_KEY
//!     let config = ExportConfig::default();
//!     let output = export_directory("./dossiers", &config).await?;
//!     eprintln!("{}/{} documents exported",
//!         output.stats.processed,
//!         output.stats.total_documents);
//!     if let Some(path) = output.report_path {
//!         println!("{}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Failure Handling
//!
//! | Failure | Behaviour |
//! |---------|-----------|
//! | HTTP 500/502/503/504 | retried, at most `max_attempts` calls (default 5) |
//! | HTTP 429 | 60 s cooldown, retried, not counted as an attempt |
//! | malformed answer, 4xx, network | document dropped from the report |
//! | no extractable text | document skipped, no model call |
//!
//! A document that fails is tried once more before it is dropped. Nothing a
//! single document does can stop the batch.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2xlsx` binary (clap + dialoguer + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2xlsx = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod record;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExportConfig, ExportConfigBuilder, Pacing, DEFAULT_OUTPUT_NAME};
pub use convert::{export_directory, export_directory_sync, process_directory};
pub use error::{Classify, DocumentError, FailureClass, ParseError, Pdf2XlsxError, ProviderError};
pub use output::{BatchOutput, BatchStats, DocumentResult};
pub use pipeline::extract::{PdfiumExtractor, TextExtractor};
pub use pipeline::report::write_report;
pub use pipeline::retry::{Pacer, RetryPolicy};
pub use progress::{ExportProgressCallback, NoopProgressCallback, ProgressCallback};
pub use provider::{GeminiProvider, GenerationProvider};
pub use record::{FieldRecord, CANONICAL_FIELDS};
