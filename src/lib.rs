//! # mistral-ocr
//!
//! Turn PDFs and images into Markdown or schema-validated JSON with the
//! Mistral OCR API.
//!
//! ## What it does
//!
//! * **PDF → Markdown** ([`Parser`], [`parse_pdf`]): the document is OCR'd
//!   remotely, each page is split into headings, paragraphs, lists, tables
//!   and images, and every image gets a caption plus a metadata block from a
//!   vision model.
//! * **Image → JSON** ([`ImageProcessor`], [`structured_ocr`]): OCR an
//!   image, then ask a multimodal model for `{file_name, topics, languages,
//!   ocr_contents}` shaped by a [`Schema`]. The answer is validated; nothing
//!   is coerced.
//! * **Directory → directory** ([`BatchProcessor`], [`batch_process_pdfs`]):
//!   run the parser over every PDF matching a glob, recording each failure
//!   without stopping.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     read the file, check the %PDF magic
//!  ├─ 2. OCR       upload → signed URL → /ocr (one call per document)
//!  ├─ 3. Clean     line endings, stray fences, invisible characters
//!  ├─ 4. Split     headings / lists / tables / paragraphs / image refs
//!  ├─ 5. Describe  one structured vision call per image
//!  └─ 6. Render    Markdown with a fixed image caption + metadata layout
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mistral_ocr::{OcrConfig, Parser};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Key from MISTRAL_API_KEY or a .env file
//!     let config = OcrConfig::builder().api_key_from_env(None).build()?;
//!     let parser = Parser::new(config)?;
//!     let markdown = parser.parse("report.pdf").await?;
//!     println!("{markdown}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mistral-ocr` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! mistral-ocr = { version = "0.1", default-features = false }
//! ```
//!
//! ## Testing without the API
//!
//! Every entry point has a `with_transport` constructor taking any
//! [`OcrTransport`], so tests can run the full pipeline against canned
//! responses.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod document;
pub mod error;
pub mod languages;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;
pub mod structured;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{
    batch_process_pdfs, batch_process_pdfs_sync, BatchProcessor, BatchReport, FileOutcome,
};
pub use config::{OcrConfig, OcrConfigBuilder, PageSeparator};
pub use document::{Block, Dimensions, Document, DocumentPage, ImageMetadata};
pub use error::{ErrorKind, FieldError, OcrError, ValidationErrors};
pub use languages::resolve_language;
pub use parser::{parse_pdf, parse_pdf_sync, Parser};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use schema::{ObjectSchema, Schema};
pub use structured::{structured_ocr, structured_ocr_sync, ImageProcessor, StructuredResult};
pub use transport::{MistralTransport, OcrTransport};
