//! Error types for the pdf2xlsx library.
//!
//! Four error types map onto four layers of the pipeline:
//!
//! * [`Pdf2XlsxError`] — **Fatal**: the batch cannot run at all (missing
//!   directory, no credential, report could not be written). Returned as
//!   `Err(Pdf2XlsxError)` from the top-level `process_*` / `export_*` functions.
//!
//! * [`DocumentError`] — **Non-fatal**: one document was skipped (no text,
//!   retries exhausted, malformed answer). Stored inside
//!   [`crate::output::DocumentResult`]; the batch carries on.
//!
//! * [`ProviderError`] — a single failed call to the generation service.
//!   Every variant maps to a [`FailureClass`], which is what the retry policy
//!   looks at before deciding whether and how to try again.
//!
//! * [`ParseError`] — the model answered but the answer is not a usable JSON
//!   object. Always [`FailureClass::Terminal`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2xlsx library.
#[derive(Debug, Error)]
pub enum Pdf2XlsxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input directory does not exist.
    #[error("Directory not found: '{path}'\nCheck the path exists and is readable.")]
    DirectoryNotFound { path: PathBuf },

    /// The input path exists but is a file.
    #[error("'{path}' is not a directory")]
    NotADirectory { path: PathBuf },

    /// The directory exists but could not be listed.
    #[error("Failed to list directory '{path}': {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Provider errors ───────────────────────────────────────────────────
    /// No provider was supplied and no API key could be found.
    #[error("Generation provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// The spreadsheet could not be built or written.
    #[error("Failed to write report '{path}': {detail}")]
    ReportWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single document.
///
/// The document is absent from the report; every other document is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// Text extraction produced nothing (unreadable, scanned or empty PDF).
    #[error("{file}: no text could be extracted")]
    NoText { file: String },

    /// The service kept reporting an internal fault.
    #[error("service fault persisted after {attempts} attempts: {detail}")]
    RetriesExhausted { attempts: u32, detail: String },

    /// Quota cooldowns hit the configured cap.
    #[error("quota still exhausted after {cooldowns} cooldowns: {detail}")]
    QuotaExhausted { cooldowns: u32, detail: String },

    /// The model answered, but not with a usable JSON object.
    #[error("malformed model response: {detail}")]
    MalformedResponse { detail: String },

    /// Any other provider failure (auth, bad request, network).
    #[error("generation call failed: {detail}")]
    Provider { detail: String },
}

/// How a failed call should be treated by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Internal service fault; retry immediately, bounded by `max_attempts`.
    Transient,
    /// Rate limit or quota; cool down and retry, not counted as an attempt.
    Quota,
    /// Anything else; give up on this call.
    Terminal,
}

/// Implemented by every error the retry policy may see.
pub trait Classify {
    fn class(&self) -> FailureClass;
}

/// A failed call to the generation service.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// HTTP 5xx: the service reported an internal fault.
    #[error("service fault (HTTP {status}): {message}")]
    ServerFault { status: u16, message: String },

    /// HTTP 429 / RESOURCE_EXHAUSTED.
    #[error("quota exhausted: {message}")]
    QuotaExhausted { message: String },

    /// Any other non-success status (400, 401, 403, 404, …).
    #[error("request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Connection, TLS or timeout failure before a status was received.
    #[error("network error: {0}")]
    Network(String),

    /// 2xx response whose body is not a usable generation result.
    #[error("invalid response body: {0}")]
    InvalidResponse(String),
}

impl Classify for ProviderError {
    fn class(&self) -> FailureClass {
        match self {
            ProviderError::ServerFault { .. } => FailureClass::Transient,
            ProviderError::QuotaExhausted { .. } => FailureClass::Quota,
            ProviderError::Rejected { .. }
            | ProviderError::Network(_)
            | ProviderError::InvalidResponse(_) => FailureClass::Terminal,
        }
    }
}

/// The model's answer could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The answer was empty after fence stripping.
    #[error("response is empty")]
    Empty,

    /// The payload is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// Valid JSON, but not an object.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

impl Classify for ParseError {
    fn class(&self) -> FailureClass {
        FailureClass::Terminal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_classify() {
        let fault = ProviderError::ServerFault {
            status: 500,
            message: "internal".into(),
        };
        let quota = ProviderError::QuotaExhausted {
            message: "RESOURCE_EXHAUSTED".into(),
        };
        let auth = ProviderError::Rejected {
            status: 403,
            message: "bad key".into(),
        };
        assert_eq!(fault.class(), FailureClass::Transient);
        assert_eq!(quota.class(), FailureClass::Quota);
        assert_eq!(auth.class(), FailureClass::Terminal);
        assert_eq!(
            ProviderError::Network("timed out".into()).class(),
            FailureClass::Terminal
        );
    }

    #[test]
    fn parse_errors_are_terminal() {
        assert_eq!(ParseError::Empty.class(), FailureClass::Terminal);
        assert_eq!(
            ParseError::InvalidJson("eof".into()).class(),
            FailureClass::Terminal
        );
    }

    #[test]
    fn retries_exhausted_display() {
        let e = DocumentError::RetriesExhausted {
            attempts: 5,
            detail: "HTTP 500".into(),
        };
        assert!(e.to_string().contains("5 attempts"), "got: {e}");
    }

    #[test]
    fn no_text_names_the_file() {
        let e = DocumentError::NoText {
            file: "acme.pdf".into(),
        };
        assert!(e.to_string().starts_with("acme.pdf"));
    }

    #[test]
    fn report_write_failed_display() {
        let e = Pdf2XlsxError::ReportWriteFailed {
            path: PathBuf::from("/tmp/out.xlsx"),
            detail: "disk full".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("out.xlsx"));
        assert!(msg.contains("disk full"));
    }
}
