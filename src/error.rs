//! Error types for the mistral-ocr library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`OcrError`]: **Fatal** for the call that produced it. The file could
//!   not be read, the remote API refused the request, or the response did not
//!   match the expected shape. Returned as `Err(OcrError)` from every entry
//!   point; nothing is retried and no partial result is salvaged.
//!
//! * [`ValidationErrors`]: the field-level detail of a structured-output
//!   response that does not conform to its schema. Wrapped in
//!   [`OcrError::Validation`] so callers can inspect each failing path.
//!
//! Batch mode downgrades a per-file `OcrError` into a recorded
//! [`crate::batch::FileOutcome::Failure`] carrying its [`ErrorKind`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the mistral-ocr library.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// No API key was given explicitly, in the environment, or in a key file.
    #[error("Mistral API key not configured.\nSet {var}, add it to a .env file, or pass --api-key.")]
    MissingApiKey { var: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A caller-supplied schema uses a construct the validator does not know.
    #[error("Invalid schema at '{path}': {reason}")]
    InvalidSchema { path: String, reason: String },

    // ── Input / output errors ─────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The file is not an image format the OCR endpoint accepts.
    #[error("File is not a supported image: '{path}'")]
    UnsupportedImage { path: PathBuf },

    /// Reading an input file or directory failed after it was found.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output file or directory.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two batch inputs map to the same output file.
    #[error("Output '{path}' is already written by '{claimed_by}'")]
    OutputConflict { path: PathBuf, claimed_by: PathBuf },

    /// The batch file pattern is not a valid glob.
    #[error("Invalid file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    // ── Remote API errors ─────────────────────────────────────────────────
    /// The request never produced an HTTP response (DNS, TLS, connection reset, timeout).
    #[error("Network error calling {endpoint}: {detail}")]
    Network { endpoint: String, detail: String },

    /// The API rejected the credentials (401/403).
    #[error("Authentication failed ({status}): {detail}\nCheck MISTRAL_API_KEY.")]
    AuthError { status: u16, detail: String },

    /// The API returned HTTP 429.
    #[error("Rate limit exceeded{}", .retry_after_secs.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited { retry_after_secs: Option<u64> },

    /// Any other non-success status.
    #[error("API error {status} from {endpoint}: {message}")]
    ApiError {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// The API answered 2xx but the body is missing expected fields.
    #[error("Malformed API response: {detail}")]
    MalformedResponse { detail: String },

    // ── Validation errors ─────────────────────────────────────────────────
    /// Structured output did not conform to its schema.
    #[error("Structured output failed validation: {0}")]
    Validation(ValidationErrors),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`OcrError`], used in batch reports and by
/// callers that only care about which layer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Io,
    Remote,
    Validation,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Io => "io",
            ErrorKind::Remote => "remote",
            ErrorKind::Validation => "validation",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl OcrError {
    /// Which layer this error came from.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OcrError::MissingApiKey { .. }
            | OcrError::InvalidConfig(_)
            | OcrError::InvalidSchema { .. } => ErrorKind::Configuration,
            OcrError::FileNotFound { .. }
            | OcrError::PermissionDenied { .. }
            | OcrError::NotAPdf { .. }
            | OcrError::UnsupportedImage { .. }
            | OcrError::ReadFailed { .. }
            | OcrError::OutputWriteFailed { .. }
            | OcrError::OutputConflict { .. }
            | OcrError::InvalidPattern { .. } => ErrorKind::Io,
            OcrError::Network { .. }
            | OcrError::AuthError { .. }
            | OcrError::RateLimited { .. }
            | OcrError::ApiError { .. }
            | OcrError::MalformedResponse { .. } => ErrorKind::Remote,
            OcrError::Validation(_) => ErrorKind::Validation,
            OcrError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        OcrError::MalformedResponse {
            detail: detail.into(),
        }
    }
}

impl From<ValidationErrors> for OcrError {
    fn from(errors: ValidationErrors) -> Self {
        OcrError::Validation(errors)
    }
}

/// One failing field in a structured-output response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// JSON path of the offending value, e.g. `ocr_contents.items[2].price`.
    /// The document root is `$`.
    pub path: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Every field-level error found while validating one value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            path: path.into(),
            message: message.into(),
        });
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Whether any error was recorded at exactly `path`.
    pub fn has_path(&self, path: &str) -> bool {
        self.errors.iter().any(|e| e.path == path)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field error(s)", self.errors.len())?;
        for (i, e) in self.errors.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
