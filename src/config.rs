//! Configuration for every component of the library.
//!
//! All behaviour is controlled through one [`OcrConfig`] value, built via its
//! [`OcrConfigBuilder`] and handed to each component at construction. There
//! is no module-level state: the API key and model names travel with the
//! config, so two parsers with different keys can coexist in one process.
//!
//! # API key resolution
//! [`OcrConfigBuilder::api_key_from_env`] looks, in order, at the
//! `MISTRAL_API_KEY` environment variable and then a local `.env` key-value
//! file. The file is read with `dotenvy` without touching the process
//! environment.

use crate::error::OcrError;
use crate::progress::BatchProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Environment variable (and key-file entry) holding the API key.
pub const API_KEY_VAR: &str = "MISTRAL_API_KEY";

/// Default Mistral API root.
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";

/// Configuration for OCR parsing, structured OCR and batch runs.
///
/// # Example
/// ```rust
/// use mistral_ocr::OcrConfig;
///
/// let config = OcrConfig::builder()
///     .api_key("sk-test")
///     .describe_images(false)
///     .batch_concurrency(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_concurrency, 4);
/// ```
#[derive(Clone)]
pub struct OcrConfig {
    /// Mistral API key. `None` is only an error once an entry point is called.
    pub api_key: Option<String>,

    /// API root, without trailing slash. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Model used for document and image OCR. Default: `mistral-ocr-latest`.
    pub ocr_model: String,

    /// Multimodal model used to describe images found in a document.
    /// Default: `mistral-large-latest`.
    pub vision_model: String,

    /// Multimodal model used for structured OCR of a single image.
    /// Default: `pixtral-12b-latest`.
    pub structured_model: String,

    /// Ask the OCR endpoint to return extracted images as base64. Default: true.
    ///
    /// Image descriptions need the pixels; without them every image gets the
    /// placeholder description.
    pub include_image_base64: bool,

    /// Call the vision model once per extracted image. Default: true.
    pub describe_images: bool,

    /// Sampling temperature for structured-output calls. Default: 0.0.
    pub temperature: f32,

    /// Lifetime of the signed URL handed to the OCR endpoint, in hours. Default: 1.
    pub signed_url_expiry_hours: u32,

    /// Per-request timeout. `None` keeps the HTTP client's default.
    pub request_timeout_secs: Option<u64>,

    /// Separator between pages in the assembled markdown. Default: none.
    pub page_separator: PageSeparator,

    /// Files processed at once in batch mode. Default: 1 (strictly sequential).
    pub batch_concurrency: usize,

    /// Optional observer for batch progress.
    pub progress_callback: Option<Arc<dyn BatchProgressCallback>>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            ocr_model: "mistral-ocr-latest".to_string(),
            vision_model: "mistral-large-latest".to_string(),
            structured_model: "pixtral-12b-latest".to_string(),
            include_image_base64: true,
            describe_images: true,
            temperature: 0.0,
            signed_url_expiry_hours: 1,
            request_timeout_secs: None,
            page_separator: PageSeparator::default(),
            batch_concurrency: 1,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("ocr_model", &self.ocr_model)
            .field("vision_model", &self.vision_model)
            .field("structured_model", &self.structured_model)
            .field("include_image_base64", &self.include_image_base64)
            .field("describe_images", &self.describe_images)
            .field("temperature", &self.temperature)
            .field("signed_url_expiry_hours", &self.signed_url_expiry_hours)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("page_separator", &self.page_separator)
            .field("batch_concurrency", &self.batch_concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }

    /// Default configuration with the API key taken from the environment or
    /// a `.env` file. The key may still be absent.
    pub fn from_env() -> Self {
        Self {
            api_key: lookup_api_key(API_KEY_VAR, None),
            ..Self::default()
        }
    }

    /// The configured key, or [`OcrError::MissingApiKey`].
    ///
    /// Every entry point calls this before touching the network.
    pub fn require_api_key(&self) -> Result<&str, OcrError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(OcrError::MissingApiKey {
                var: API_KEY_VAR.to_string(),
            }),
        }
    }
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Fill the key from `MISTRAL_API_KEY` or `env_file` (default: `.env`
    /// searched from the working directory upwards) unless one is already set.
    pub fn api_key_from_env(mut self, env_file: Option<&Path>) -> Self {
        if self.config.api_key.is_none() {
            self.config.api_key = lookup_api_key(API_KEY_VAR, env_file);
        }
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn ocr_model(mut self, model: impl Into<String>) -> Self {
        self.config.ocr_model = model.into();
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = model.into();
        self
    }

    pub fn structured_model(mut self, model: impl Into<String>) -> Self {
        self.config.structured_model = model.into();
        self
    }

    pub fn include_image_base64(mut self, v: bool) -> Self {
        self.config.include_image_base64 = v;
        self
    }

    pub fn describe_images(mut self, v: bool) -> Self {
        self.config.describe_images = v;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 1.5);
        self
    }

    pub fn signed_url_expiry_hours(mut self, hours: u32) -> Self {
        self.config.signed_url_expiry_hours = hours.max(1);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn batch_concurrency(mut self, n: usize) -> Self {
        self.config.batch_concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn BatchProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// A missing API key is *not* a build error; it is reported when an
    /// entry point runs so that offline helpers keep working.
    pub fn build(self) -> Result<OcrConfig, OcrError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(OcrError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        for (name, value) in [
            ("OCR model", &c.ocr_model),
            ("vision model", &c.vision_model),
            ("structured model", &c.structured_model),
        ] {
            if value.trim().is_empty() {
                return Err(OcrError::InvalidConfig(format!("{name} must not be empty")));
            }
        }
        if c.batch_concurrency == 0 {
            return Err(OcrError::InvalidConfig(
                "Batch concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Look up an API key: the environment variable `var` first, then the
/// key-value file. Empty values count as absent.
pub fn lookup_api_key(var: &str, env_file: Option<&Path>) -> Option<String> {
    if let Ok(v) = std::env::var(var) {
        if !v.trim().is_empty() {
            debug!("API key taken from ${}", var);
            return Some(v.trim().to_string());
        }
    }

    let entries = match env_file {
        Some(path) => dotenvy::from_path_iter(path).ok()?,
        None => dotenvy::dotenv_iter().ok()?,
    };
    for (key, value) in entries.flatten() {
        if key == var && !value.trim().is_empty() {
            debug!("API key taken from key file");
            return Some(value.trim().to_string());
        }
    }
    None
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How to separate pages in the assembled Markdown output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// No separator; pages joined with "\n\n". (default)
    #[default]
    None,
    /// Horizontal rule: "\n\n---\n\n"
    HorizontalRule,
    /// HTML comment with page number: "<!-- page N -->"
    Comment,
    /// Custom string inserted between pages.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator placed before the given page (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::None => "\n\n".to_string(),
            PageSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            PageSeparator::Comment => format!("\n\n<!-- page {} -->\n\n", page_num),
            PageSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}
