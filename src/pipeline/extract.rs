//! Text extraction: concatenate the text layer of every page.
//!
//! ## Why never fail?
//!
//! A dossier that cannot be read is just one missing row in the report; it
//! must not stop the batch. [`TextExtractor::extract_text`] therefore returns
//! a `String`, empty when anything goes wrong, and logs the reason. The
//! orchestrator treats empty text as "skip this document".
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and synchronous I/O. The
//! orchestrator calls extractors through `tokio::task::spawn_blocking` so the
//! async runtime is never stalled by a large document.

use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable pointing at libpdfium (file or directory).
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// Turns a document into plain text.
pub trait TextExtractor: Send + Sync {
    /// Text of every page in order, or `""` when the document is unreadable.
    fn extract_text(&self, path: &Path) -> String;
}

/// pdfium-backed extractor.
#[derive(Debug, Clone, Default)]
pub struct PdfiumExtractor {
    library_path: Option<PathBuf>,
    password: Option<String>,
}

impl PdfiumExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use libpdfium at this path (the library file or its directory).
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    /// Password for encrypted documents.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Bind pdfium: explicit path, then `PDFIUM_LIB_PATH`, then the working
    /// directory, then the system library.
    fn bind(&self) -> Result<Pdfium, PdfiumError> {
        let candidates = self
            .library_path
            .clone()
            .into_iter()
            .chain(std::env::var_os(PDFIUM_LIB_ENV).map(PathBuf::from))
            .chain(std::iter::once(PathBuf::from("./")));

        for candidate in candidates {
            let lib = if candidate.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&candidate)
            } else {
                candidate
            };
            if !lib.exists() {
                continue;
            }
            match Pdfium::bind_to_library(&lib) {
                Ok(bindings) => return Ok(Pdfium::new(bindings)),
                Err(e) => debug!("Could not bind pdfium at {}: {:?}", lib.display(), e),
            }
        }

        Pdfium::bind_to_system_library().map(Pdfium::new)
    }

    fn extract(&self, path: &Path) -> Result<String, PdfiumError> {
        let pdfium = self.bind()?;
        let document = pdfium.load_pdf_from_file(path, self.password.as_deref())?;

        let mut text = String::new();
        for page in document.pages().iter() {
            text.push_str(&page.text()?.all());
            text.push('\n');
        }
        Ok(text)
    }
}

impl TextExtractor for PdfiumExtractor {
    fn extract_text(&self, path: &Path) -> String {
        match self.extract(path) {
            Ok(text) => {
                debug!("Extracted {} chars from {}", text.len(), path.display());
                text
            }
            Err(e) => {
                warn!("Text extraction failed for {}: {:?}", path.display(), e);
                String::new()
            }
        }
    }
}
