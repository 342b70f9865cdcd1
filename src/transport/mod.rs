//! The remote API seam.
//!
//! Everything the library needs from the service fits in two operations:
//! run OCR on a document or image, and ask a multimodal model for JSON that
//! matches a schema. [`OcrTransport`] names exactly those two, so the parser,
//! the image processor and the batch loop can be driven by an in-memory fake
//! in tests and by [`MistralTransport`] in production.
//!
//! The response types mirror the service's OCR payload closely; the parser
//! turns them into a [`crate::document::Document`].

pub mod mistral;

pub use mistral::MistralTransport;

use crate::config::OcrConfig;
use crate::error::OcrError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// What to run OCR on.
#[derive(Clone)]
pub enum DocumentSource {
    /// Raw PDF bytes. The Mistral transport uploads them and passes a signed URL.
    Pdf { file_name: String, bytes: Vec<u8> },
    /// An image as a `data:<mime>;base64,...` URL.
    Image { data_url: String },
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentSource::Pdf { file_name, bytes } => f
                .debug_struct("Pdf")
                .field("file_name", file_name)
                .field("bytes", &format!("<{} bytes>", bytes.len()))
                .finish(),
            DocumentSource::Image { data_url } => f
                .debug_struct("Image")
                .field("data_url", &format!("<{} chars>", data_url.len()))
                .finish(),
        }
    }
}

/// Per-call OCR options.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOptions {
    pub model: String,
    pub include_image_base64: bool,
    /// Lifetime of the signed URL handed to the OCR endpoint.
    pub signed_url_expiry_hours: u32,
}

impl OcrOptions {
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            model: config.ocr_model.clone(),
            include_image_base64: config.include_image_base64,
            signed_url_expiry_hours: config.signed_url_expiry_hours,
        }
    }
}

/// A structured-output request: prompt plus optional image, answered as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    pub model: String,
    pub prompt: String,
    /// `data:` URL of the image the prompt refers to.
    pub image_data_url: Option<String>,
    /// Name the schema is registered under in the request.
    pub schema_name: String,
    /// JSON Schema the answer must follow. `None` asks for any JSON object.
    pub schema: Option<Value>,
    pub temperature: f32,
}

/// OCR result as returned by the service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrResponse {
    #[serde(default)]
    pub model: Option<String>,
    pub pages: Vec<OcrPage>,
    #[serde(default)]
    pub usage_info: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrPage {
    pub index: usize,
    pub markdown: String,
    #[serde(default)]
    pub images: Vec<OcrImage>,
    #[serde(default)]
    pub dimensions: Option<PageDimensions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageDimensions {
    #[serde(default)]
    pub dpi: Option<u32>,
    pub width: u32,
    pub height: u32,
}

/// An image the OCR service cut out of a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrImage {
    /// Id referenced from the page markdown, e.g. `img-0.jpeg`.
    pub id: String,
    #[serde(default)]
    pub top_left_x: Option<f64>,
    #[serde(default)]
    pub top_left_y: Option<f64>,
    #[serde(default)]
    pub bottom_right_x: Option<f64>,
    #[serde(default)]
    pub bottom_right_y: Option<f64>,
    /// `data:image/...;base64,...`, present when `include_image_base64` was set.
    #[serde(default)]
    pub image_base64: Option<String>,
}

impl OcrImage {
    /// Bounding-box size in page pixels, when all four corners are known.
    pub fn bbox_size(&self) -> Option<(u32, u32)> {
        let w = self.bottom_right_x? - self.top_left_x?;
        let h = self.bottom_right_y? - self.top_left_y?;
        if w <= 0.0 || h <= 0.0 {
            return None;
        }
        Some((w.round() as u32, h.round() as u32))
    }
}

/// The two remote operations the library depends on.
#[async_trait]
pub trait OcrTransport: Send + Sync {
    /// Run OCR and return every page.
    async fn ocr_document(
        &self,
        source: &DocumentSource,
        options: &OcrOptions,
    ) -> Result<OcrResponse, OcrError>;

    /// Ask a multimodal model for a JSON answer.
    ///
    /// Returns the parsed JSON; validation against the schema is the
    /// caller's job.
    async fn structured(&self, request: &StructuredRequest) -> Result<Value, OcrError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ocr_response_tolerates_missing_optional_fields() {
        let body = json!({
            "pages": [
                { "index": 0, "markdown": "# Title" },
                {
                    "index": 1,
                    "markdown": "![img-0.jpeg](img-0.jpeg)",
                    "images": [{
                        "id": "img-0.jpeg",
                        "top_left_x": 10, "top_left_y": 20,
                        "bottom_right_x": 110, "bottom_right_y": 70,
                        "image_base64": "data:image/jpeg;base64,AAAA"
                    }],
                    "dimensions": { "dpi": 200, "height": 2200, "width": 1700 }
                }
            ],
            "model": "mistral-ocr-2505-completion",
            "usage_info": { "pages_processed": 2 }
        });
        let resp: OcrResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.pages.len(), 2);
        assert!(resp.pages[0].images.is_empty());
        assert_eq!(resp.pages[1].images[0].bbox_size(), Some((100, 50)));
        assert_eq!(resp.pages[1].dimensions.unwrap().dpi, Some(200));
    }

    #[test]
    fn bbox_requires_all_corners() {
        let img = OcrImage {
            id: "x".into(),
            top_left_x: Some(0.0),
            ..Default::default()
        };
        assert_eq!(img.bbox_size(), None);
    }

    #[test]
    fn source_debug_hides_payload() {
        let s = DocumentSource::Pdf {
            file_name: "a.pdf".into(),
            bytes: vec![0; 2048],
        };
        let dbg = format!("{s:?}");
        assert!(dbg.contains("<2048 bytes>"));
    }
}
