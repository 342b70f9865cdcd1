//! Directory of PDFs → directory of markdown files.
//!
//! [`BatchProcessor::run`] lists `input_dir` with a glob pattern, parses
//! each match with a [`Parser`] and writes `<stem>.md` under `output_dir`,
//! keeping any subdirectory the pattern descended into. A file that fails is
//! recorded in the [`BatchReport`] and the run moves on; only problems with
//! the run itself (no API key, unreadable input directory, bad pattern,
//! uncreatable output directory) abort it.
//!
//! Inputs whose names differ only in extension (`a.pdf`, `a.PDF`) would
//! write the same `a.md`. The first in sorted order keeps the output and the
//! others are recorded as [`OcrError::OutputConflict`] failures.
//!
//! With `batch_concurrency = 1` files are processed strictly one after
//! another. Higher values keep that many files in flight; results are still
//! collected in input order.

use crate::config::OcrConfig;
use crate::error::{ErrorKind, OcrError};
use crate::parser::Parser;
use crate::transport::OcrTransport;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Pattern used when none is given.
pub const DEFAULT_PATTERN: &str = "*.pdf";

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Success { output: PathBuf },
    Failure { kind: ErrorKind, reason: String },
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Success { .. })
    }
}

/// Outcome of every matched file, keyed and ordered by input path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchReport {
    pub outcomes: BTreeMap<PathBuf, FileOutcome>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn successes(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }

    pub fn failures(&self) -> usize {
        self.len() - self.successes()
    }

    pub fn get(&self, input: impl AsRef<Path>) -> Option<&FileOutcome> {
        self.outcomes.get(input.as_ref())
    }

    /// Inputs that failed, with their reasons.
    pub fn failed(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.outcomes.iter().filter_map(|(path, o)| match o {
            FileOutcome::Failure { reason, .. } => Some((path.as_path(), reason.as_str())),
            FileOutcome::Success { .. } => None,
        })
    }
}

/// Runs a [`Parser`] over every file matching a pattern.
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    parser: Parser,
    pattern: String,
}

impl BatchProcessor {
    /// Processor backed by the Mistral API. Fails without an API key.
    pub fn new(config: OcrConfig) -> Result<Self, OcrError> {
        Ok(Self {
            parser: Parser::new(config)?,
            pattern: DEFAULT_PATTERN.to_string(),
        })
    }

    /// Processor backed by a caller-supplied transport. Still requires a key.
    pub fn with_transport(
        config: OcrConfig,
        transport: Arc<dyn OcrTransport>,
    ) -> Result<Self, OcrError> {
        Ok(Self {
            parser: Parser::with_transport(config, transport)?,
            pattern: DEFAULT_PATTERN.to_string(),
        })
    }

    /// Glob pattern relative to the input directory. Default: `*.pdf`.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Process every match under `input_dir`, writing into `output_dir`.
    pub async fn run(
        &self,
        input_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> Result<BatchReport, OcrError> {
        let input_dir = input_dir.as_ref();
        let output_dir = output_dir.as_ref();
        let start = Instant::now();

        let inputs = list_inputs(input_dir, &self.pattern)?;
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| OcrError::OutputWriteFailed {
                path: output_dir.to_path_buf(),
                source: e,
            })?;

        let config = self.parser.config();
        let callback = config.progress_callback.as_deref();
        let total = inputs.len();
        info!(
            "Batch: {} file(s) matching '{}' in {}",
            total,
            self.pattern,
            input_dir.display()
        );
        if let Some(cb) = callback {
            cb.on_batch_start(total);
        }

        let planned = plan_outputs(input_dir, output_dir, inputs);
        let jobs = planned
            .into_iter()
            .enumerate()
            .map(|(index, (input, output, conflict))| async move {
                if let Some(cb) = callback {
                    cb.on_file_start(index, total, &input);
                }
                let result = match conflict {
                    Some(e) => Err(e),
                    None => self.parser.parse_to_file(&input, &output).await,
                };
                let outcome = match result {
                    Ok(_) => {
                        info!("{} → {}", input.display(), output.display());
                        if let Some(cb) = callback {
                            cb.on_file_complete(index, total, &input, &output);
                        }
                        FileOutcome::Success { output }
                    }
                    Err(e) => {
                        warn!("{} failed: {}", input.display(), e);
                        let reason = e.to_string();
                        if let Some(cb) = callback {
                            cb.on_file_error(index, total, &input, &reason);
                        }
                        FileOutcome::Failure {
                            kind: e.kind(),
                            reason,
                        }
                    }
                };
                (input, outcome)
            });

        let results: Vec<(PathBuf, FileOutcome)> = stream::iter(jobs)
            .buffered(config.batch_concurrency.max(1))
            .collect()
            .await;

        let report = BatchReport {
            outcomes: results.into_iter().collect(),
        };
        info!(
            "Batch complete: {}/{} succeeded in {}ms",
            report.successes(),
            report.len(),
            start.elapsed().as_millis()
        );
        if let Some(cb) = callback {
            cb.on_batch_complete(total, report.successes());
        }
        Ok(report)
    }
}

/// Files under `input_dir` matching `pattern`, sorted. Directories are skipped.
pub fn list_inputs(input_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, OcrError> {
    let meta = std::fs::metadata(input_dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => OcrError::FileNotFound {
            path: input_dir.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => OcrError::PermissionDenied {
            path: input_dir.to_path_buf(),
        },
        _ => OcrError::ReadFailed {
            path: input_dir.to_path_buf(),
            source: e,
        },
    })?;
    if !meta.is_dir() {
        return Err(OcrError::ReadFailed {
            path: input_dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
        });
    }

    glob::Pattern::new(pattern).map_err(|e| OcrError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    let escaped = glob::Pattern::escape(&input_dir.to_string_lossy());
    let full = Path::new(&escaped).join(pattern);
    let full = full.to_string_lossy();

    let matches = glob::glob(&full).map_err(|e| OcrError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in matches {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable entry {}: {}", e.path().display(), e.error()),
        }
    }
    files.sort();
    Ok(files)
}

/// Output path for each input, plus the conflict error for any input whose
/// output was already claimed by an earlier one.
fn plan_outputs(
    input_dir: &Path,
    output_dir: &Path,
    inputs: Vec<PathBuf>,
) -> Vec<(PathBuf, PathBuf, Option<OcrError>)> {
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    inputs
        .into_iter()
        .map(|input| {
            let output = output_path(input_dir, output_dir, &input);
            let conflict = match claimed.get(&output) {
                Some(first) => Some(OcrError::OutputConflict {
                    path: output.clone(),
                    claimed_by: first.clone(),
                }),
                None => {
                    claimed.insert(output.clone(), input.clone());
                    None
                }
            };
            (input, output, conflict)
        })
        .collect()
}

/// `input_dir/sub/report.pdf` → `output_dir/sub/report.md`
fn output_path(input_dir: &Path, output_dir: &Path, input: &Path) -> PathBuf {
    let relative = input.strip_prefix(input_dir).unwrap_or(input);
    let mut name = relative
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "document".into());
    name.push(".md");
    let mut out = output_dir.to_path_buf();
    if let Some(parent) = relative.parent().filter(|p| !p.as_os_str().is_empty()) {
        out.push(parent);
    }
    out.push(name);
    out
}

// ── Free functions ───────────────────────────────────────────────────────

/// Convert every PDF under `input_dir` matching `pattern` (default `*.pdf`).
///
/// # Example
/// ```rust,no_run
/// use mistral_ocr::{batch_process_pdfs, OcrConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = OcrConfig::builder().api_key_from_env(None).build()?;
/// let report = batch_process_pdfs("scans/", "markdown/", None, &config).await?;
/// for (input, reason) in report.failed() {
///     eprintln!("{}: {reason}", input.display());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn batch_process_pdfs(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    pattern: Option<&str>,
    config: &OcrConfig,
) -> Result<BatchReport, OcrError> {
    BatchProcessor::new(config.clone())?
        .pattern(pattern.unwrap_or(DEFAULT_PATTERN))
        .run(input_dir, output_dir)
        .await
}

/// Blocking wrapper around [`batch_process_pdfs`].
pub fn batch_process_pdfs_sync(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    pattern: Option<&str>,
    config: &OcrConfig,
) -> Result<BatchReport, OcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(batch_process_pdfs(input_dir, output_dir, pattern, config))
}
