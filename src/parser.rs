//! PDF → markdown.
//!
//! [`Parser`] runs the whole document flow for one PDF:
//!
//! ```text
//! load_pdf ──▶ ocr_document ──▶ per page: clean ──▶ split ──▶ describe images
//!                                                   └──────▶ Document ──▶ markdown
//! ```
//!
//! Pages are walked in `index` order and elements in the order the OCR
//! service returned them. Nothing is reordered, dropped or duplicated: each
//! image reference becomes exactly one [`Block::Image`] at its own position.
//! Remote calls are awaited one at a time.

use crate::config::OcrConfig;
use crate::document::{Block, Document, DocumentPage};
use crate::error::OcrError;
use crate::output::write_atomic;
use crate::pipeline::blocks::{split_elements, Element};
use crate::pipeline::describe::{describe_image, placeholder};
use crate::pipeline::{input, postprocess};
use crate::transport::{
    DocumentSource, MistralTransport, OcrOptions, OcrResponse, OcrTransport,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Converts PDFs to markdown through an [`OcrTransport`].
#[derive(Clone)]
pub struct Parser {
    config: OcrConfig,
    transport: Arc<dyn OcrTransport>,
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser").field("config", &self.config).finish()
    }
}

impl Parser {
    /// Parser backed by the Mistral API.
    ///
    /// Fails with [`OcrError::MissingApiKey`] before any network call when
    /// no key is configured.
    pub fn new(config: OcrConfig) -> Result<Self, OcrError> {
        let transport = MistralTransport::new(&config)?;
        Ok(Self {
            config,
            transport: Arc::new(transport),
        })
    }

    /// Parser backed by a caller-supplied transport.
    ///
    /// The API key is still required so that a misconfigured run fails the
    /// same way whatever the transport.
    pub fn with_transport(
        config: OcrConfig,
        transport: Arc<dyn OcrTransport>,
    ) -> Result<Self, OcrError> {
        config.require_api_key()?;
        Ok(Self { config, transport })
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// OCR a PDF and build its [`Document`].
    pub async fn parse_document(&self, path: impl AsRef<Path>) -> Result<Document, OcrError> {
        let path = path.as_ref();
        let start = Instant::now();
        info!("Parsing {}", path.display());

        let pdf = input::load_pdf(path).await?;
        let source = DocumentSource::Pdf {
            file_name: pdf.file_name,
            bytes: pdf.bytes,
        };
        let response = self
            .transport
            .ocr_document(&source, &OcrOptions::from_config(&self.config))
            .await?;

        let document = build_document(self.transport.as_ref(), &self.config, response).await?;
        info!(
            "Parsed {}: {} page(s), {} image(s) in {}ms",
            path.display(),
            document.pages.len(),
            document.image_count(),
            start.elapsed().as_millis()
        );
        Ok(document)
    }

    /// OCR a PDF and return its markdown.
    pub async fn parse(&self, path: impl AsRef<Path>) -> Result<String, OcrError> {
        let document = self.parse_document(path).await?;
        Ok(document.to_markdown(&self.config.page_separator))
    }

    /// OCR a PDF and write its markdown to `output` atomically.
    pub async fn parse_to_file(
        &self,
        path: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<Document, OcrError> {
        let document = self.parse_document(path).await?;
        let markdown = document.to_markdown(&self.config.page_separator);
        write_atomic(output.as_ref(), markdown).await?;
        debug!("Wrote {}", output.as_ref().display());
        Ok(document)
    }
}

/// Turn an OCR response into a [`Document`], describing images on the way.
pub(crate) async fn build_document(
    transport: &dyn OcrTransport,
    config: &OcrConfig,
    response: OcrResponse,
) -> Result<Document, OcrError> {
    if response.pages.is_empty() {
        return Err(OcrError::malformed("OCR response contains no pages"));
    }

    let mut pages = response.pages;
    pages.sort_by_key(|p| p.index);

    let mut document = Document::default();
    for page in pages {
        let cleaned = postprocess::clean_page_markdown(&page.markdown);
        let mut blocks = Vec::new();

        for element in split_elements(&cleaned) {
            match element {
                Element::Block(block) => blocks.push(block),
                Element::ImageRef { alt, target } => {
                    let image = page
                        .images
                        .iter()
                        .find(|img| img.id == target || img.id == alt);
                    let described = match image {
                        Some(img) if config.describe_images => {
                            describe_image(transport, config, img).await?
                        }
                        other => placeholder(other),
                    };
                    let reference = if target.is_empty() { alt } else { target };
                    blocks.push(Block::Image {
                        reference,
                        description: described.description,
                        metadata: described.metadata,
                    });
                }
            }
        }

        debug!("Page {}: {} block(s)", page.index + 1, blocks.len());
        document.pages.push(DocumentPage {
            index: page.index,
            blocks,
        });
    }
    Ok(document)
}

// ── Free functions ───────────────────────────────────────────────────────

/// Parse `path` to markdown, writing it to `output` when given.
///
/// Returns the markdown either way.
///
/// # Example
/// ```rust,no_run
/// use mistral_ocr::{parse_pdf, OcrConfig};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = OcrConfig::builder().api_key_from_env(None).build()?;
/// let markdown = parse_pdf("report.pdf", Some(Path::new("report.md")), &config).await?;
/// println!("{markdown}");
/// # Ok(())
/// # }
/// ```
pub async fn parse_pdf(
    path: impl AsRef<Path>,
    output: Option<&Path>,
    config: &OcrConfig,
) -> Result<String, OcrError> {
    let parser = Parser::new(config.clone())?;
    let markdown = parser.parse(path).await?;
    if let Some(out) = output {
        write_atomic(out, &markdown).await?;
    }
    Ok(markdown)
}

/// Blocking wrapper around [`parse_pdf`].
///
/// Creates a temporary tokio runtime internally.
pub fn parse_pdf_sync(
    path: impl AsRef<Path>,
    output: Option<&Path>,
    config: &OcrConfig,
) -> Result<String, OcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(parse_pdf(path, output, config))
}
