//! CLI binary for edgequake-invoice.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` and prints one JSON envelope per document.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_invoice::{
    extract_batch, ExtractionConfig, ExtractionProgressCallback, ModelSpec, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a bar across the batch plus one log line per
/// document. Documents may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos:>3}/{len} documents  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_document_start(&self, _index: usize, _total: usize, location: &str) {
        self.bar.set_message(location.to_string());
    }

    fn on_document_complete(&self, index: usize, total: usize, item_count: usize) {
        self.bar.println(format!(
            "  {} Document {:>3}/{:<3}  {}",
            green("✓"),
            index + 1,
            total,
            dim(&format!("{item_count} items")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        // Keep the log line on one terminal row.
        let first_line = error.lines().next().unwrap_or(error);
        let msg = if first_line.chars().count() > 80 {
            let cut: String = first_line.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            first_line.to_string()
        };
        self.bar.println(format!(
            "  {} Document {:>3}/{:<3}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} documents extracted",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents extracted  ({} failed)",
                red("✘"),
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a bill from a URL
  invoice2json https://example.com/bills/sample_3.png

  # Several local scans, compact JSON array
  invoice2json --compact scans/*.png > results.json

  # Custom model chain (tried in order until one succeeds)
  invoice2json --models gemini:gemini-2.0-flash,openai:gpt-4.1-mini bill.jpg

  # Looser reconciliation for large-denomination currencies
  invoice2json --tolerance 50 bill.png

OUTPUT:
  One JSON envelope per document:
    { "is_success": bool, "data": { ... } | null, "error": str | null }
  Several documents are printed as a JSON array, in input order. The exit
  code is 0 even when an envelope reports failure.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  INVOICE_MODELS          Comma-separated model chain
  RUST_LOG                Log filter (overrides --verbose/--quiet)
"#;

/// Extract invoice line items from scanned images using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "invoice2json",
    version,
    about = "Extract and reconcile invoice line items from scanned images using Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document locations: local image paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    documents: Vec<String>,

    /// Model chain, tried in order: provider:model[,provider:model...].
    #[arg(
        long,
        env = "INVOICE_MODELS",
        value_delimiter = ',',
        default_value = "gemini:gemini-flash-latest,gemini:gemini-1.5-flash"
    )]
    models: Vec<String>,

    /// Absolute difference tolerated between item sum and printed total.
    #[arg(long, env = "INVOICE_TOLERANCE", default_value_t = 1.0)]
    tolerance: f64,

    /// Per-model-attempt timeout in seconds.
    #[arg(long, env = "INVOICE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "INVOICE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Documents processed at once.
    #[arg(short, long, env = "INVOICE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "INVOICE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per document.
    #[arg(long, env = "INVOICE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Path to a text file containing a custom extraction prompt.
    #[arg(long, env = "INVOICE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Print single-line JSON instead of pretty-printed.
    #[arg(long)]
    compact: bool,

    /// Disable progress bar.
    #[arg(long, env = "INVOICE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INVOICE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs when it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && cli.documents.len() > 1;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run extraction ───────────────────────────────────────────────────
    let envelopes = extract_batch(&cli.documents, &config).await;

    let json = if envelopes.len() == 1 {
        render(&envelopes[0], cli.compact)?
    } else {
        render(&envelopes, cli.compact)?
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{json}").context("Failed to write to stdout")?;

    Ok(())
}

fn render<T: serde::Serialize>(value: &T, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    json.context("Failed to serialise output")
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let models = cli
        .models
        .iter()
        .map(|m| m.parse::<ModelSpec>())
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid --models")?;

    let mut builder = ExtractionConfig::builder()
        .models(models)
        .mismatch_tolerance(cli.tolerance)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .concurrency(cli.concurrency)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
