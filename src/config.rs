//! Configuration for a batch export.
//!
//! All behaviour is controlled through [`ExportConfig`], built via its
//! [`ExportConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to pass the run context by reference instead of through globals, and to
//! log it (the API key is redacted from `Debug`).

use crate::error::Pdf2XlsxError;
use crate::pipeline::extract::TextExtractor;
use crate::progress::ProgressCallback;
use crate::provider::{GenerationProvider, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default report file name, written into the input directory.
pub const DEFAULT_OUTPUT_NAME: &str = "export_qualifications.xlsx";

/// Configuration for one export run.
///
/// # Example
/// ```rust
/// use pdf2xlsx::ExportConfig;
///
/// let config = ExportConfig::builder()
///     .api_key("AIza...")
///     .max_attempts(3)
///     .pacing(None)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_attempts, 3);
/// ```
#[derive(Clone)]
pub struct ExportConfig {
    /// Pre-constructed generation provider. Takes precedence over `api_key`.
    pub provider: Option<Arc<dyn GenerationProvider>>,

    /// Text extractor. If None, a [`crate::pipeline::extract::PdfiumExtractor`]
    /// is built from `pdfium_library` and `password`.
    pub extractor: Option<Arc<dyn TextExtractor>>,

    /// API key for the generation service. If None, read from
    /// `GEMINI_API_KEY` / `GOOGLE_API_KEY`.
    pub api_key: Option<String>,

    /// Model identifier. Default: `gemini-1.5-flash`.
    pub model: String,

    /// Override for the service base URL.
    pub base_url: Option<String>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Extraction wants the model to copy what is on the page, not to invent.
    pub temperature: f32,

    /// Maximum tokens the model may generate per document. Default: 4096.
    pub max_output_tokens: usize,

    /// Per-call HTTP timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Total attempts per call when the service reports an internal fault. Default: 5.
    pub max_attempts: u32,

    /// Base delay between fault retries, doubled on each retry. Default: 0 (immediate).
    pub retry_backoff_ms: u64,

    /// Pause after a quota/rate-limit answer before retrying. Default: 60 s.
    pub quota_cooldown_secs: u64,

    /// Cap on quota cooldowns per call. Default: None (wait as long as it takes).
    pub max_cooldowns: Option<u32>,

    /// Fixed pause after every Nth outbound call. Default: every 10 calls, 60 s.
    pub pacing: Option<Pacing>,

    /// Give a failed document one more full attempt before skipping it. Default: true.
    pub retry_failed_documents: bool,

    /// Report file name inside the input directory. Default: `export_qualifications.xlsx`.
    pub output_name: String,

    /// Password for encrypted PDFs.
    pub password: Option<String>,

    /// Path to libpdfium (file or containing directory).
    pub pdfium_library: Option<PathBuf>,

    /// Per-document progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            provider: None,
            extractor: None,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
            temperature: 0.1,
            max_output_tokens: 4096,
            api_timeout_secs: 120,
            max_attempts: 5,
            retry_backoff_ms: 0,
            quota_cooldown_secs: 60,
            max_cooldowns: None,
            pacing: Some(Pacing::default()),
            retry_failed_documents: true,
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            password: None,
            pdfium_library: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfig")
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("extractor", &self.extractor.as_ref().map(|_| "<dyn TextExtractor>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("quota_cooldown_secs", &self.quota_cooldown_secs)
            .field("max_cooldowns", &self.max_cooldowns)
            .field("pacing", &self.pacing)
            .field("retry_failed_documents", &self.retry_failed_documents)
            .field("output_name", &self.output_name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pdfium_library", &self.pdfium_library)
            .finish()
    }
}

impl ExportConfig {
    /// Create a new builder for `ExportConfig`.
    pub fn builder() -> ExportConfigBuilder {
        ExportConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn quota_cooldown(&self) -> Duration {
        Duration::from_secs(self.quota_cooldown_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Builder for [`ExportConfig`].
pub struct ExportConfigBuilder {
    config: ExportConfig,
}

impl fmt::Debug for ExportConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExportConfigBuilder {
    pub fn provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn quota_cooldown_secs(mut self, secs: u64) -> Self {
        self.config.quota_cooldown_secs = secs;
        self
    }

    pub fn max_cooldowns(mut self, cap: Option<u32>) -> Self {
        self.config.max_cooldowns = cap;
        self
    }

    pub fn pacing(mut self, pacing: Option<Pacing>) -> Self {
        self.config.pacing = pacing;
        self
    }

    pub fn retry_failed_documents(mut self, v: bool) -> Self {
        self.config.retry_failed_documents = v;
        self
    }

    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.config.output_name = name.into();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExportConfig, Pdf2XlsxError> {
        let c = &self.config;
        if c.max_attempts == 0 {
            return Err(Pdf2XlsxError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if let Some(ref p) = c.pacing {
            if p.every == 0 {
                return Err(Pdf2XlsxError::InvalidConfig(
                    "pacing interval must be ≥ 1 call".into(),
                ));
            }
        }
        if c.model.trim().is_empty() {
            return Err(Pdf2XlsxError::InvalidConfig("model must not be empty".into()));
        }
        if c.output_name.trim().is_empty() || c.output_name.contains(['/', '\\']) {
            return Err(Pdf2XlsxError::InvalidConfig(format!(
                "output name must be a plain file name, got {:?}",
                c.output_name
            )));
        }
        Ok(self.config)
    }
}

/// Fixed pause after every `every` outbound calls, independent of outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pacing {
    pub every: u32,
    pub pause_secs: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            every: 10,
            pause_secs: 60,
        }
    }
}

impl Pacing {
    pub fn pause(&self) -> Duration {
        Duration::from_secs(self.pause_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExportConfig::default();
        assert_eq!(c.max_attempts, 5);
        assert_eq!(c.quota_cooldown(), Duration::from_secs(60));
        assert_eq!(c.pacing, Some(Pacing { every: 10, pause_secs: 60 }));
        assert_eq!(c.output_name, "export_qualifications.xlsx");
        assert!(c.retry_failed_documents);
        assert_eq!(c.max_cooldowns, None);
    }

    #[test]
    fn debug_redacts_secrets() {
        let c = ExportConfig::builder()
            .api_key("AIza-top-secret")
            .password("hunter2")
            .build()
            .expect("valid config");
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("AIza-top-secret"));
        assert!(!dbg.contains("hunter2"));
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = ExportConfig::builder().max_attempts(0).build().unwrap_err();
        assert!(matches!(err, Pdf2XlsxError::InvalidConfig(_)));
    }

    #[test]
    fn zero_pacing_interval_rejected() {
        let err = ExportConfig::builder()
            .pacing(Some(Pacing { every: 0, pause_secs: 1 }))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("pacing"));
    }

    #[test]
    fn output_name_must_be_a_file_name() {
        assert!(ExportConfig::builder()
            .output_name("../elsewhere.xlsx")
            .build()
            .is_err());
        assert!(ExportConfig::builder()
            .output_name("rapport.xlsx")
            .build()
            .is_ok());
    }

    #[test]
    fn temperature_is_clamped() {
        let c = ExportConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }
}
