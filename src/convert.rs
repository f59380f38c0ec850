//! Batch entry points.
//!
//! [`process_directory`] walks a directory and returns the extracted records
//! without writing anything; [`export_directory`] does the same and then
//! writes the spreadsheet. Both are sequential: one document at a time, one
//! model call at a time, which is what the pacing and quota rules assume.

use crate::config::ExportConfig;
use crate::error::{DocumentError, Pdf2XlsxError};
use crate::output::{BatchOutput, BatchStats, DocumentResult};
use crate::pipeline::extract::{PdfiumExtractor, TextExtractor};
use crate::pipeline::input::{display_name, list_documents};
use crate::pipeline::llm::ModelClient;
use crate::pipeline::report::write_report;
use crate::prompts::build_extraction_prompt;
use crate::provider::{GeminiProvider, GenerationProvider, API_KEY_ENV_VARS};
use crate::record::FieldRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Extract one record per PDF in `dir`.
///
/// # Errors
/// Returns `Err(Pdf2XlsxError)` only when the batch cannot start:
/// - Directory missing, not a directory, or unreadable
/// - No provider and no API key
///
/// Per-document failures are reported in [`BatchOutput::documents`].
pub async fn process_directory(
    dir: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<BatchOutput, Pdf2XlsxError> {
    let total_start = Instant::now();
    let dir = dir.as_ref();
    info!("Starting export: {}", dir.display());

    // ── Step 1: List documents ───────────────────────────────────────────
    let documents = list_documents(dir)?;
    let total = documents.len();
    info!("Found {} PDF documents", total);

    // ── Step 2: Resolve provider and extractor ───────────────────────────
    let provider = resolve_provider(config)?;
    let extractor = resolve_extractor(config);
    let client = ModelClient::from_config(provider, config);
    debug!("Using provider '{}'", client.provider_name());

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    // ── Step 3: Process documents in order ───────────────────────────────
    let mut records = Vec::new();
    let mut results = Vec::with_capacity(total);
    for (i, path) in documents.iter().enumerate() {
        let index = i + 1;
        let file = display_name(path);
        if let Some(ref cb) = config.progress_callback {
            cb.on_document_start(index, total, &file);
        }

        let (record, result) = process_document(&client, &extractor, path, &file, config).await;

        if let Some(ref cb) = config.progress_callback {
            match &result.error {
                None => cb.on_document_complete(index, total, &file),
                Some(DocumentError::NoText { .. }) => cb.on_document_skipped(index, total, &file),
                Some(e) => cb.on_document_error(index, total, &file, &e.to_string()),
            }
        }
        records.extend(record);
        results.push(result);
    }

    // ── Step 4: Stats ────────────────────────────────────────────────────
    let stats = BatchStats {
        total_documents: total,
        processed: records.len(),
        failed: results
            .iter()
            .filter(|r| matches!(r.error, Some(ref e) if !matches!(e, DocumentError::NoText { .. })))
            .count(),
        skipped: results
            .iter()
            .filter(|r| matches!(r.error, Some(DocumentError::NoText { .. })))
            .count(),
        model_calls: client.calls(),
        cooldowns: results.iter().map(|r| r.cooldowns).sum(),
        duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Export complete: {}/{} documents, {} model calls, {}ms total",
        stats.processed, total, stats.model_calls, stats.duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, stats.processed);
    }

    Ok(BatchOutput {
        records,
        documents: results,
        stats,
        report_path: None,
    })
}

/// Run [`process_directory`] and write the report into `dir`.
///
/// When no document produced a record, no file is written and
/// `report_path` is `None`.
pub async fn export_directory(
    dir: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<BatchOutput, Pdf2XlsxError> {
    let dir = dir.as_ref();
    let mut output = process_directory(dir, config).await?;

    let records = output.records.clone();
    let dir_buf = dir.to_path_buf();
    let file_name = config.output_name.clone();
    output.report_path = tokio::task::spawn_blocking(move || {
        write_report(&records, &dir_buf, &file_name)
    })
    .await
    .map_err(|e| Pdf2XlsxError::Internal(format!("Report task panicked: {}", e)))??;

    Ok(output)
}

/// Synchronous wrapper around [`export_directory`].
///
/// Creates a temporary tokio runtime internally.
pub fn export_directory_sync(
    dir: impl AsRef<Path>,
    config: &ExportConfig,
) -> Result<BatchOutput, Pdf2XlsxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2XlsxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(export_directory(dir, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn process_document(
    client: &ModelClient,
    extractor: &Arc<dyn TextExtractor>,
    path: &Path,
    file: &str,
    config: &ExportConfig,
) -> (Option<FieldRecord>, DocumentResult) {
    let start = Instant::now();
    info!("Processing {}", file);

    let extracted = {
        let extractor = Arc::clone(extractor);
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || extractor.extract_text(&path)).await
    };

    let text = match extracted {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            warn!("{}: no text could be extracted, skipping", file);
            return skipped(file, start);
        }
        Err(e) => {
            warn!("{}: text extraction aborted ({}), skipping", file, e);
            return skipped(file, start);
        }
    };
    debug!("{}: {} chars of text", file, text.len());

    let prompt = build_extraction_prompt(&text);
    let mut outcome = client.extract_record(file, &prompt).await;
    let mut model_calls = outcome.state.calls;
    let mut cooldowns = outcome.state.cooldowns;

    if outcome.result.is_err() && config.retry_failed_documents {
        warn!("{}: extraction failed, trying the document once more", file);
        outcome = client.extract_record(file, &prompt).await;
        model_calls += outcome.state.calls;
        cooldowns += outcome.state.cooldowns;
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    let (record, error) = match outcome.result {
        Ok(record) => {
            info!(
                "{}: {} fields extracted in {}ms",
                file,
                record.populated(),
                duration_ms
            );
            (Some(record), None)
        }
        Err(e) => {
            error!("{}: {}", file, e);
            (None, Some(e))
        }
    };

    (
        record,
        DocumentResult {
            file: file.to_string(),
            error,
            model_calls,
            cooldowns,
            duration_ms,
        },
    )
}

/// Result for a document with no usable text; no model call is made.
fn skipped(file: &str, start: Instant) -> (Option<FieldRecord>, DocumentResult) {
    (
        None,
        DocumentResult {
            file: file.to_string(),
            error: Some(DocumentError::NoText {
                file: file.to_string(),
            }),
            model_calls: 0,
            cooldowns: 0,
            duration_ms: start.elapsed().as_millis() as u64,
        },
    )
}

/// Resolve the generation provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **API key in the config** (`config.api_key`), for a Gemini client.
/// 3. **API key in the environment** (`GEMINI_API_KEY`, then `GOOGLE_API_KEY`).
fn resolve_provider(config: &ExportConfig) -> Result<Arc<dyn GenerationProvider>, Pdf2XlsxError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let key = config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            API_KEY_ENV_VARS
                .iter()
                .filter_map(|var| std::env::var(var).ok())
                .find(|k| !k.trim().is_empty())
        })
        .ok_or_else(|| Pdf2XlsxError::ProviderNotConfigured {
            provider: "gemini".to_string(),
            hint: format!(
                "No API key found. Pass --api-key or set {}.",
                API_KEY_ENV_VARS.join(" or ")
            ),
        })?;

    let provider = GeminiProvider::from_config(key, config).map_err(|e| {
        Pdf2XlsxError::ProviderNotConfigured {
            provider: "gemini".to_string(),
            hint: e.to_string(),
        }
    })?;
    Ok(Arc::new(provider))
}

fn resolve_extractor(config: &ExportConfig) -> Arc<dyn TextExtractor> {
    if let Some(ref extractor) = config.extractor {
        return Arc::clone(extractor);
    }
    let mut extractor = PdfiumExtractor::new();
    if let Some(ref lib) = config.pdfium_library {
        extractor = extractor.with_library_path(lib);
    }
    if let Some(ref pwd) = config.password {
        extractor = extractor.with_password(pwd);
    }
    Arc::new(extractor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use async_trait::async_trait;

    struct Fixed;

    #[async_trait]
    impl GenerationProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
            Ok("{}".into())
        }
    }

    #[test]
    fn explicit_provider_wins() {
        let config = ExportConfig::builder()
            .provider(Arc::new(Fixed))
            .build()
            .unwrap();
        let provider = resolve_provider(&config).unwrap();
        assert_eq!(provider.name(), "fixed");
    }

    #[test]
    fn api_key_builds_gemini() {
        let config = ExportConfig::builder().api_key("k-123").build().unwrap();
        let provider = resolve_provider(&config).unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[tokio::test]
    async fn missing_directory_is_fatal() {
        let config = ExportConfig::builder()
            .provider(Arc::new(Fixed))
            .build()
            .unwrap();
        let err = process_directory("/definitely/not/here", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2XlsxError::DirectoryNotFound { .. }));
    }
}
