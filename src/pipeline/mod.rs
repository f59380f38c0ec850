//! Pipeline stages for PDF-to-spreadsheet export.
//!
//! Each submodule implements one step; [`crate::convert`] strings them
//! together per document.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ llm ──────────▶ report
//! (*.pdf)   (pdfium)    (retry, parse)  (xlsx)
//! ```
//!
//! 1. [`input`]   — list the PDF files of the input directory
//! 2. [`extract`] — text layer of every page; runs in `spawn_blocking`
//!    because pdfium is synchronous
//! 3. [`llm`]     — one model call with retry and pacing; the only stage
//!    with network I/O. Builds on [`retry`] and [`parse`]
//! 4. [`report`]  — write the collected records as one worksheet

pub mod extract;
pub mod input;
pub mod llm;
pub mod parse;
pub mod report;
pub mod retry;
