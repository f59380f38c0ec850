//! Input resolution: list the PDF documents of a directory.
//!
//! Only the directory itself is scanned (no recursion), and only regular
//! files whose name ends in `.pdf` (any case) are kept. The listing is sorted
//! by file name so a run always visits documents in the same order and the
//! report rows come out the same way twice.

use crate::error::Pdf2XlsxError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Check whether a file name carries the PDF extension.
pub fn is_pdf_name(name: &str) -> bool {
    name.len() > 4
        && name
            .get(name.len() - 4..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(".pdf"))
}

/// List the PDF files directly inside `dir`, sorted by file name.
pub fn list_documents(dir: &Path) -> Result<Vec<PathBuf>, Pdf2XlsxError> {
    if !dir.exists() {
        return Err(Pdf2XlsxError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    if !dir.is_dir() {
        return Err(Pdf2XlsxError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| Pdf2XlsxError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut documents = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Pdf2XlsxError::DirectoryUnreadable {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        let is_pdf = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_pdf_name);
        if is_pdf && path.is_file() {
            documents.push(path);
        }
    }

    documents.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Found {} PDF documents in {}", documents.len(), dir.display());
    Ok(documents)
}

/// File name of a document for logs and results.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
