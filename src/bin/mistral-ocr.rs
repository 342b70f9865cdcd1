//! CLI binary for mistral-ocr.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `OcrConfig`, picks a mode and prints results.

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use indicatif::{ProgressBar, ProgressStyle};
use mistral_ocr::config::DEFAULT_BASE_URL;
use mistral_ocr::output::write_atomic;
use mistral_ocr::{
    BatchProcessor, BatchProgressCallback, ImageProcessor, OcrConfig, PageSeparator, Parser,
    ProgressCallback, Schema,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
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

/// Terminal progress for batch runs: a bar at the bottom and one log line
/// per finished file. Works when files finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-file wall-clock start times, keyed by index.
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_batch_start` tells us how many files there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = spinner("Preparing", "Listing input directory…");
        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} files  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Parsing");
        self.bar.reset_eta();
    }

    fn elapsed(&self, index: usize) -> String {
        let ms = self
            .start_times
            .lock()
            .map(|mut m| m.remove(&index))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);
        dim(&format!("{:.1}s", ms as f64 / 1000.0))
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_files: usize) {
        self.activate_bar(total_files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Parsing {total_files} file(s)…"))
        ));
    }

    fn on_file_start(&self, index: usize, _total: usize, input: &Path) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(display_name(input));
    }

    fn on_file_complete(&self, index: usize, total: usize, input: &Path, output: &Path) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  →  {}  {}",
            green("✓"),
            index + 1,
            total,
            display_name(input),
            dim(&output.display().to_string()),
            self.elapsed(index),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, input: &Path, error: &str) {
        // First line only, truncated, to keep the log tidy.
        let first = error.lines().next().unwrap_or_default();
        let msg = if first.chars().count() > 80 {
            format!("{}\u{2026}", first.chars().take(79).collect::<String>())
        } else {
            first.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index + 1,
            total,
            display_name(input),
            red(&msg),
            self.elapsed(index),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_files: usize, success_count: usize) {
        let failed = total_files.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} file(s) parsed successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} files parsed  ({} failed)",
                if failed == total_files {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_files,
                red(&failed.to_string()),
            );
        }
    }
}

fn spinner(prefix: &'static str, msg: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS);
    bar.set_style(style);
    bar.set_prefix(prefix);
    bar.set_message(msg.into());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # PDF to Markdown (stdout)
  mistral-ocr --input report.pdf

  # PDF to a file, with page markers and no image descriptions
  mistral-ocr -i report.pdf -o report.md --separator comment --no-describe-images

  # Plain OCR of an image
  mistral-ocr -i receipt.jpg

  # Structured JSON from an image, shaped by a JSON Schema
  mistral-ocr -i receipt.jpg --structured --schema receipt.schema.json -o receipt.json

  # Whole directory, four files at a time, with a JSON report
  mistral-ocr --input-dir scans/ --output-dir markdown/ -c 4 --report report.json

  # Only some files, recursively
  mistral-ocr --input-dir scans/ --output-dir markdown/ -p "**/invoice-*.pdf"

MODES:
  --input <file.pdf>                     PDF → Markdown
  --input <image>                        image → Markdown (plain OCR)
  --input <image> --structured           image → JSON {file_name, topics, languages, ocr_contents}
  --input-dir <dir> --output-dir <dir>   every matching PDF → <stem>.md

  A batch run exits 0 once every file has been attempted, even when some
  failed; failures are listed on stderr and in --report.

MODELS:
  Purpose               Default               Flag
  ────────────────────  ────────────────────  ────────────────────
  Document/image OCR    mistral-ocr-latest    --ocr-model
  Image descriptions    mistral-large-latest  --vision-model
  Structured JSON       pixtral-12b-latest    --structured-model

ENVIRONMENT VARIABLES:
  MISTRAL_API_KEY         Mistral API key (also read from .env)
  MISTRAL_BASE_URL        Override the API root
  RUST_LOG                Override log filtering (e.g. mistral_ocr=debug)

SETUP:
  1. Set API key:     export MISTRAL_API_KEY=...   (or put it in .env)
  2. Parse:           mistral-ocr -i document.pdf -o document.md
"#;

/// Parse PDFs and images with the Mistral OCR API.
#[derive(ClapParser, Debug)]
#[command(
    name = "mistral-ocr",
    version,
    about = "Parse PDFs and images with the Mistral OCR API into Markdown or structured JSON",
    long_about = "Parse PDF documents into Markdown with described images, extract schema-validated \
JSON from images, or convert a whole directory of PDFs, using the Mistral OCR and vision APIs.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input PDF, or image with --structured.
    #[arg(short, long, required_unless_present = "input_dir", conflicts_with = "input_dir")]
    input: Option<PathBuf>,

    /// Write the result to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Batch mode: directory of PDFs to parse.
    #[arg(long, requires = "output_dir")]
    input_dir: Option<PathBuf>,

    /// Batch mode: directory for the `.md` files (created if missing).
    #[arg(long, requires = "input_dir")]
    output_dir: Option<PathBuf>,

    /// Batch mode: glob pattern relative to --input-dir.
    #[arg(short, long, default_value = mistral_ocr::batch::DEFAULT_PATTERN)]
    pattern: String,

    /// Batch mode: files processed at once.
    #[arg(short, long, env = "MISTRAL_OCR_CONCURRENCY", default_value_t = 1,
          value_parser = clap::value_parser!(u16).range(1..=64))]
    concurrency: u16,

    /// Batch mode: write a JSON report of every file's outcome here.
    #[arg(long, requires = "input_dir")]
    report: Option<PathBuf>,

    /// Structured OCR of an image instead of Markdown.
    #[arg(long, conflicts_with = "input_dir")]
    structured: bool,

    /// JSON Schema file describing `ocr_contents` (structured mode).
    #[arg(long, requires = "structured")]
    schema: Option<PathBuf>,

    /// Mistral API key.
    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Key-value file to read MISTRAL_API_KEY from (default: .env).
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// API root URL.
    #[arg(long, env = "MISTRAL_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Model used for OCR.
    #[arg(long, default_value = "mistral-ocr-latest")]
    ocr_model: String,

    /// Model used to describe images inside PDFs.
    #[arg(long, default_value = "mistral-large-latest")]
    vision_model: String,

    /// Model used for structured JSON extraction.
    #[arg(long, default_value = "pixtral-12b-latest")]
    structured_model: String,

    /// Do not call the vision model; images get a placeholder description.
    #[arg(long)]
    no_describe_images: bool,

    /// Do not ask the OCR endpoint for image data (implies placeholder descriptions).
    #[arg(long)]
    no_image_base64: bool,

    /// Page separator: none, hr, comment, or custom string.
    #[arg(long, default_value = "none")]
    separator: String,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Disable progress output.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are noise under a progress bar.
    let show_progress = !cli.quiet && !cli.no_progress;
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

    if let (Some(input_dir), Some(output_dir)) = (&cli.input_dir, &cli.output_dir) {
        return run_batch(&cli, input_dir, output_dir, show_progress).await;
    }

    let input = cli
        .input
        .as_deref()
        .context("Either --input or --input-dir is required")?;

    if cli.structured {
        run_structured(&cli, input, show_progress).await
    } else if is_pdf_path(input) {
        run_parse(&cli, input, show_progress).await
    } else {
        run_image_ocr(&cli, input, show_progress).await
    }
}

// ── Modes ────────────────────────────────────────────────────────────────

async fn run_parse(cli: &Cli, input: &Path, show_progress: bool) -> Result<()> {
    let config = build_config(cli, None)?;
    let parser = Parser::new(config).context("Cannot start parser")?;
    let start = Instant::now();
    let bar = show_progress.then(|| spinner("Parsing", display_name(input)));

    let document = parser
        .parse_document(input)
        .await
        .with_context(|| format!("Failed to parse {}", input.display()));
    if let Some(ref b) = bar {
        b.finish_and_clear();
    }
    let document = document?;
    let markdown = document.to_markdown(&parser.config().page_separator);

    match cli.output {
        Some(ref out) => {
            write_atomic(out, &markdown)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{}  {} page(s), {} image(s)  {}ms  →  {}",
                    green("✔"),
                    document.pages.len(),
                    document.image_count(),
                    start.elapsed().as_millis(),
                    bold(&out.display().to_string()),
                );
            }
        }
        None => write_stdout(&markdown)?,
    }
    Ok(())
}

async fn run_image_ocr(cli: &Cli, input: &Path, show_progress: bool) -> Result<()> {
    let config = build_config(cli, None)?;
    let processor = ImageProcessor::new(config).context("Cannot start image processor")?;
    let bar = show_progress.then(|| spinner("OCR", display_name(input)));

    let markdown = processor
        .ocr_markdown(input)
        .await
        .with_context(|| format!("Failed to OCR {}", input.display()));
    if let Some(ref b) = bar {
        b.finish_and_clear();
    }
    emit(cli, &markdown?).await
}

async fn run_structured(cli: &Cli, input: &Path, show_progress: bool) -> Result<()> {
    let schema = match cli.schema {
        Some(ref path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read schema from {}", path.display()))?;
            Some(
                Schema::from_json_str(&text)
                    .with_context(|| format!("Invalid schema in {}", path.display()))?,
            )
        }
        None => None,
    };

    let config = build_config(cli, None)?;
    let processor = ImageProcessor::new(config).context("Cannot start image processor")?;
    let bar = show_progress.then(|| spinner("Extracting", display_name(input)));

    let result = processor
        .process(input, schema.as_ref())
        .await
        .with_context(|| format!("Structured OCR of {} failed", input.display()));
    if let Some(ref b) = bar {
        b.finish_and_clear();
    }

    let json = serde_json::to_string_pretty(&result?).context("Failed to serialise result")?;
    emit(cli, &format!("{json}\n")).await
}

async fn run_batch(
    cli: &Cli,
    input_dir: &Path,
    output_dir: &Path,
    show_progress: bool,
) -> Result<()> {
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as ProgressCallback)
    } else {
        None
    };
    let config = build_config(cli, progress)?;

    let report = BatchProcessor::new(config)
        .context("Cannot start batch")?
        .pattern(cli.pattern.clone())
        .run(input_dir, output_dir)
        .await
        .with_context(|| format!("Batch over {} failed", input_dir.display()))?;

    if let Some(ref path) = cli.report {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        write_atomic(path, json + "\n")
            .await
            .with_context(|| format!("Failed to write report {}", path.display()))?;
    }

    if !cli.quiet {
        if report.is_empty() {
            eprintln!(
                "{} no files matching '{}' in {}",
                cyan("⚠"),
                cli.pattern,
                input_dir.display()
            );
        } else if !show_progress {
            eprintln!("Parsed {}/{} files", report.successes(), report.len());
        }
        for (input, reason) in report.failed() {
            eprintln!("  {} {}: {}", red("✗"), input.display(), reason);
        }
    }
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// Map CLI args to `OcrConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<OcrConfig> {
    let mut builder = OcrConfig::builder()
        .base_url(cli.base_url.clone())
        .ocr_model(cli.ocr_model.clone())
        .vision_model(cli.vision_model.clone())
        .structured_model(cli.structured_model.clone())
        .describe_images(!cli.no_describe_images)
        .include_image_base64(!cli.no_image_base64)
        .page_separator(parse_separator(&cli.separator))
        .batch_concurrency(usize::from(cli.concurrency));

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    builder = builder.api_key_from_env(cli.env_file.as_deref());

    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Write to `--output` when given, stdout otherwise.
async fn emit(cli: &Cli, text: &str) -> Result<()> {
    match cli.output {
        Some(ref out) => {
            write_atomic(out, text)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            if !cli.quiet {
                eprintln!("{}  →  {}", green("✔"), bold(&out.display().to_string()));
            }
            Ok(())
        }
        None => write_stdout(text),
    }
}

fn write_stdout(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Parse `--separator` string into `PageSeparator`.
fn parse_separator(s: &str) -> PageSeparator {
    match s.to_lowercase().as_str() {
        "none" => PageSeparator::None,
        "hr" | "---" => PageSeparator::HorizontalRule,
        "comment" => PageSeparator::Comment,
        _ => PageSeparator::Custom(s.to_string()),
    }
}
