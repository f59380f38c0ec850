//! CLI binary for pdf2xlsx.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExportConfig`, prompts for what is missing, and prints a summary.

use anyhow::{bail, Context, Result};
use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2xlsx::{
    export_directory, BatchOutput, ExportConfig, ExportProgressCallback, Pacing, ProgressCallback,
    DEFAULT_OUTPUT_NAME,
};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar across the documents of the batch and
/// a log line per document.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the document currently being processed.
    started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Listing documents…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Exporting");
        self.bar.reset_eta();
    }

    fn elapsed(&self) -> String {
        let secs = self
            .started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.activate_bar(total_documents);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Exporting {total_documents} documents…"))
        ));
    }

    fn on_document_start(&self, _index: usize, _total: usize, file: &str) {
        if let Ok(mut s) = self.started.lock() {
            *s = Some(Instant::now());
        }
        self.bar.set_message(file.to_string());
    }

    fn on_document_complete(&self, index: usize, total: usize, file: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            file,
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_document_skipped(&self, index: usize, total: usize, file: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            yellow("–"),
            index,
            total,
            file,
            dim("no text, skipped"),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, file: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = match error.char_indices().nth(79) {
            Some((cut, _)) => format!("{}\u{2026}", &error[..cut]),
            None => error.to_string(),
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index,
            total,
            file,
            red(&msg),
            self.elapsed(),
        ));
        self.bar.inc(1);
    }

    fn on_pause(&self, seconds: u64, reason: &str) {
        self.bar.set_message(format!("pausing {seconds}s ({reason})"));
    }

    fn on_batch_complete(&self, total_documents: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total_documents.saturating_sub(success_count);

        if failed == 0 {
            eprintln!(
                "{} {} documents exported successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents exported  ({} not exported)",
                if success_count == 0 {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Export every PDF of a directory (prompts for the API key)
  pdf2xlsx ./dossiers

  # Prompt for the directory too
  pdf2xlsx

  # Non-interactive, no pacing, JSON summary
  GEMINI_API_KEY=... pdf2xlsx ./dossiers --no-pacing --json > summary.json

  # Custom report name and model
  pdf2xlsx ./dossiers --output-name export.xlsx --model gemini-1.5-pro

FAILURE HANDLING:
  HTTP 5xx        retried immediately, at most --max-attempts calls
  HTTP 429        --quota-cooldown seconds wait, then retried, not counted
  bad JSON, 4xx   document left out of the report
  no text         document skipped without a model call

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY     Gemini API key (GOOGLE_API_KEY also accepted)
  PDFIUM_LIB_PATH    Path to libpdfium (file or directory)
  RUST_LOG           Log filter, overrides -v / -q
  PDF2XLSX_*         Every flag, e.g. PDF2XLSX_MAX_ATTEMPTS=3

OUTPUT:
  export_qualifications.xlsx in the input directory, one row per document.
  Nothing is written when no document could be exported.
"#;

/// Extract company qualification dossiers (PDF) into a spreadsheet.
#[derive(Parser)]
#[command(
    name = "pdf2xlsx",
    version,
    about = "Extract company qualification dossiers (PDF) into a spreadsheet with Gemini",
    long_about = "Reads the text of every PDF in a directory, asks a Gemini model for a fixed \
set of 15 company fields, and writes one spreadsheet row per document.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory holding the PDF files. Prompted for when omitted.
    directory: Option<PathBuf>,

    /// Gemini API key. Prompted for (hidden) when not set.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini model ID.
    #[arg(long, env = "PDF2XLSX_MODEL", default_value = pdf2xlsx::provider::DEFAULT_MODEL)]
    model: String,

    /// API base URL.
    #[arg(long, env = "PDF2XLSX_BASE_URL")]
    base_url: Option<String>,

    /// Calls per document when the service keeps faulting (HTTP 5xx).
    #[arg(long, env = "PDF2XLSX_MAX_ATTEMPTS", default_value_t = 5,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: u32,

    /// Base delay between fault retries in ms, doubled each time. 0 = immediate.
    #[arg(long, env = "PDF2XLSX_RETRY_BACKOFF_MS", default_value_t = 0)]
    retry_backoff_ms: u64,

    /// Seconds to wait after a quota (HTTP 429) answer.
    #[arg(long, env = "PDF2XLSX_QUOTA_COOLDOWN", default_value_t = 60)]
    quota_cooldown: u64,

    /// Give up on a document after this many quota cooldowns. Unbounded by default.
    #[arg(long, env = "PDF2XLSX_MAX_COOLDOWNS")]
    max_cooldowns: Option<u32>,

    /// Pause after every N model calls.
    #[arg(long, env = "PDF2XLSX_PACE_EVERY", default_value_t = 10,
          value_parser = clap::value_parser!(u32).range(1..))]
    pace_every: u32,

    /// Length of the pacing pause in seconds.
    #[arg(long, env = "PDF2XLSX_PACE_PAUSE", default_value_t = 60)]
    pace_pause: u64,

    /// Disable pacing pauses.
    #[arg(long, env = "PDF2XLSX_NO_PACING")]
    no_pacing: bool,

    /// Do not try a failed document a second time.
    #[arg(long, env = "PDF2XLSX_NO_DOCUMENT_RETRY")]
    no_document_retry: bool,

    /// Report file name, written inside the input directory.
    #[arg(long, env = "PDF2XLSX_OUTPUT_NAME", default_value = DEFAULT_OUTPUT_NAME)]
    output_name: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2XLSX_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Per-call timeout in seconds.
    #[arg(long, env = "PDF2XLSX_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "PDF2XLSX_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max output tokens per call.
    #[arg(long, env = "PDF2XLSX_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Print the batch result as JSON on stdout.
    #[arg(long, env = "PDF2XLSX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2XLSX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2XLSX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2XLSX_QUIET")]
    quiet: bool,
}

impl fmt::Debug for Cli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cli")
            .field("directory", &self.directory)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("quota_cooldown", &self.quota_cooldown)
            .field("max_cooldowns", &self.max_cooldowns)
            .field("pace_every", &self.pace_every)
            .field("pace_pause", &self.pace_pause)
            .field("no_pacing", &self.no_pacing)
            .field("no_document_retry", &self.no_document_retry)
            .field("output_name", &self.output_name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pdfium_lib", &self.pdfium_lib)
            .field("api_timeout", &self.api_timeout)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("json", &self.json)
            .field("no_progress", &self.no_progress)
            .field("verbose", &self.verbose)
            .field("quiet", &self.quiet)
            .finish()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // With the progress bar active only warnings get through; the bar
    // already reports per-document progress.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Interactive inputs ───────────────────────────────────────────────
    let directory = match cli.directory.clone() {
        Some(dir) => dir,
        None => prompt_directory()?,
    };
    if !directory.is_dir() {
        bail!("Directory not found: '{}'", directory.display());
    }

    let env_key = || {
        std::env::var("GOOGLE_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
    };
    let api_key = match cli.api_key.clone().filter(|k| !k.trim().is_empty()) {
        Some(key) => key,
        None => match env_key() {
            Some(key) => key,
            None => prompt_api_key()?,
        },
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn ExportProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, api_key, progress_cb)?;

    // ── Run export ───────────────────────────────────────────────────────
    let output = export_directory(&directory, &config)
        .await
        .context("Export failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    if !cli.quiet {
        print_summary(&output, show_progress);
    }

    Ok(())
}

fn prompt_directory() -> Result<PathBuf> {
    let input: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("Directory containing the PDF files")
        .interact_text()
        .context("Failed to read the directory")?;
    Ok(PathBuf::from(input.trim()))
}

fn prompt_api_key() -> Result<String> {
    let key = Password::with_theme(&ColorfulTheme::default())
        .with_prompt("Gemini API key")
        .interact()
        .context("Failed to read the API key")?;
    if key.trim().is_empty() {
        bail!("An API key is required (--api-key or GEMINI_API_KEY)");
    }
    Ok(key)
}

fn print_summary(output: &BatchOutput, show_progress: bool) {
    let stats = &output.stats;
    if !show_progress {
        eprintln!(
            "Exported {}/{} documents in {}ms",
            stats.processed, stats.total_documents, stats.duration_ms
        );
        for doc in output.failures() {
            if let Some(ref e) = doc.error {
                eprintln!("  {} {}: {}", red("✗"), doc.file, e);
            }
        }
    }

    match output.report_path {
        Some(ref path) => eprintln!(
            "{}  {} rows  →  {}",
            green("✔"),
            output.records.len(),
            bold(&path.display().to_string()),
        ),
        None => eprintln!("{}  nothing to export, no report written", cyan("⚠")),
    }
    eprintln!(
        "   {} model calls  /  {} quota cooldowns  /  {} skipped",
        dim(&stats.model_calls.to_string()),
        dim(&stats.cooldowns.to_string()),
        dim(&stats.skipped.to_string()),
    );
}

/// Map CLI args to `ExportConfig`.
fn build_config(
    cli: &Cli,
    api_key: String,
    progress: Option<ProgressCallback>,
) -> Result<ExportConfig> {
    let pacing = if cli.no_pacing {
        None
    } else {
        Some(Pacing {
            every: cli.pace_every,
            pause_secs: cli.pace_pause,
        })
    };

    let mut builder = ExportConfig::builder()
        .model(cli.model.clone())
        .temperature(cli.temperature)
        .max_output_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .max_attempts(cli.max_attempts)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .quota_cooldown_secs(cli.quota_cooldown)
        .max_cooldowns(cli.max_cooldowns)
        .pacing(pacing)
        .retry_failed_documents(!cli.no_document_retry)
        .output_name(cli.output_name.clone())
        .api_key(api_key);

    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
