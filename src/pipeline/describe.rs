//! Image description: turn an extracted image into a caption plus metadata.
//!
//! Images with base64 data are sent to the vision model in structured mode
//! with [`description_schema`]; the answer is validated before use. Images
//! without data, or with descriptions switched off, get a fixed placeholder.
//! Either way every image yields exactly one [`ImageDescription`].

use crate::config::OcrConfig;
use crate::document::{Dimensions, ImageMetadata};
use crate::error::OcrError;
use crate::pipeline::encode::{decode_data_url, image_dimensions};
use crate::prompts::IMAGE_DESCRIPTION_PROMPT;
use crate::schema::{ObjectSchema, Schema};
use crate::transport::{OcrImage, OcrTransport, StructuredRequest};
use serde_json::Value;
use tracing::debug;

/// Caption used when no description was requested or possible.
pub const PLACEHOLDER_DESCRIPTION: &str = "An image from the document";

/// Caption and metadata for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDescription {
    pub description: String,
    pub metadata: ImageMetadata,
}

/// Shape the vision model must answer with.
pub fn description_schema() -> Schema {
    let metadata = ObjectSchema::new()
        .optional("type", Schema::nullable(Schema::String))
        .optional("dimensions", Schema::Any)
        .optional("content", Schema::nullable(Schema::String))
        .optional("key_elements", Schema::Any);
    ObjectSchema::new()
        .required("description", Schema::String)
        .optional("metadata", metadata.into())
        .into()
}

/// Ask the vision model about `image`.
///
/// Falls back to [`placeholder`] when the image carries no data. Remote
/// failures propagate; an answer without a usable description is
/// [`OcrError::MalformedResponse`].
pub async fn describe_image(
    transport: &dyn OcrTransport,
    config: &OcrConfig,
    image: &OcrImage,
) -> Result<ImageDescription, OcrError> {
    let Some(ref data) = image.image_base64 else {
        return Ok(placeholder(Some(image)));
    };
    let data_url = if data.starts_with("data:") {
        data.clone()
    } else {
        format!("data:image/jpeg;base64,{data}")
    };

    let schema = description_schema();
    let request = StructuredRequest {
        model: config.vision_model.clone(),
        prompt: IMAGE_DESCRIPTION_PROMPT.to_string(),
        image_data_url: Some(data_url),
        schema_name: "image_description".to_string(),
        schema: Some(schema.to_json_schema()),
        temperature: config.temperature,
    };

    debug!("Describing image {}", image.id);
    let reply = transport.structured(&request).await?;
    schema.validate(&reply).map_err(|errors| {
        OcrError::malformed(format!("description of {} does not match schema: {errors}", image.id))
    })?;

    let description = reply
        .get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if description.is_empty() {
        return Err(OcrError::malformed(format!(
            "empty description for image {}",
            image.id
        )));
    }

    let meta = reply.get("metadata");
    let field = |name: &str| meta.and_then(|m| m.get(name));

    let metadata = ImageMetadata {
        kind: text(field("type")).unwrap_or_else(|| "Unknown".to_string()),
        dimensions: field("dimensions")
            .and_then(dimensions_from_value)
            .or_else(|| measure(image)),
        content: text(field("content")),
        key_elements: key_elements(field("key_elements")),
    };

    Ok(ImageDescription {
        description: description.to_string(),
        metadata,
    })
}

/// Fixed description for an image that is not sent to the model.
///
/// Dimensions are still measured when the image is known.
pub fn placeholder(image: Option<&OcrImage>) -> ImageDescription {
    ImageDescription {
        description: PLACEHOLDER_DESCRIPTION.to_string(),
        metadata: ImageMetadata {
            dimensions: image.and_then(measure),
            ..ImageMetadata::default()
        },
    }
}

/// Size from the decoded image header, else from the OCR bounding box.
fn measure(image: &OcrImage) -> Option<Dimensions> {
    image
        .image_base64
        .as_deref()
        .and_then(decode_data_url)
        .and_then(|bytes| image_dimensions(&bytes))
        .or_else(|| image.bbox_size().map(|(w, h)| Dimensions::new(w, h)))
}

fn text(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `"640x480"` or `{"width": 640, "height": 480}`.
fn dimensions_from_value(v: &Value) -> Option<Dimensions> {
    match v {
        Value::String(s) => Dimensions::parse(s),
        Value::Object(o) => {
            let w = o.get("width")?.as_u64()?;
            let h = o.get("height")?.as_u64()?;
            Some(Dimensions::new(u32::try_from(w).ok()?, u32::try_from(h).ok()?))
        }
        _ => None,
    }
}

fn key_elements(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{DocumentSource, OcrOptions, OcrResponse};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct Canned {
        reply: Value,
        seen: Mutex<Vec<StructuredRequest>>,
    }

    #[async_trait]
    impl OcrTransport for Canned {
        async fn ocr_document(
            &self,
            _source: &DocumentSource,
            _options: &OcrOptions,
        ) -> Result<OcrResponse, OcrError> {
            unreachable!("describe never runs OCR")
        }

        async fn structured(&self, request: &StructuredRequest) -> Result<Value, OcrError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }
    }

    fn canned(reply: Value) -> Canned {
        Canned {
            reply,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn image_with_data() -> OcrImage {
        OcrImage {
            id: "img-0.jpeg".into(),
            top_left_x: Some(0.0),
            top_left_y: Some(0.0),
            bottom_right_x: Some(300.0),
            bottom_right_y: Some(200.0),
            image_base64: Some("data:image/jpeg;base64,AAAA".into()),
        }
    }

    #[tokio::test]
    async fn full_answer_is_used() {
        let t = canned(json!({
            "description": "A line chart of sales",
            "metadata": {
                "type": "Chart",
                "dimensions": "800x600",
                "content": "Sales 2020-2024",
                "key_elements": ["x axis", "trend line"]
            }
        }));
        let d = describe_image(&t, &OcrConfig::default(), &image_with_data())
            .await
            .unwrap();
        assert_eq!(d.description, "A line chart of sales");
        assert_eq!(d.metadata.kind, "Chart");
        assert_eq!(d.metadata.dimensions, Some(Dimensions::new(800, 600)));
        assert_eq!(d.metadata.key_elements, vec!["x axis", "trend line"]);

        let seen = t.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, "mistral-large-latest");
        assert_eq!(seen[0].image_data_url.as_deref(), Some("data:image/jpeg;base64,AAAA"));
    }

    #[tokio::test]
    async fn missing_metadata_falls_back() {
        let t = canned(json!({ "description": "A photo" }));
        let d = describe_image(&t, &OcrConfig::default(), &image_with_data())
            .await
            .unwrap();
        assert_eq!(d.metadata.kind, "Unknown");
        // "AAAA" is not a decodable image, so the bounding box is used.
        assert_eq!(d.metadata.dimensions, Some(Dimensions::new(300, 200)));
        assert!(d.metadata.key_elements.is_empty());
    }

    #[tokio::test]
    async fn missing_description_is_malformed() {
        let t = canned(json!({ "metadata": { "type": "Chart" } }));
        let err = describe_image(&t, &OcrConfig::default(), &image_with_data())
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::MalformedResponse { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn blank_description_is_malformed() {
        let t = canned(json!({ "description": "   " }));
        assert!(describe_image(&t, &OcrConfig::default(), &image_with_data())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn image_without_data_is_not_sent() {
        let t = canned(json!({}));
        let img = OcrImage {
            id: "img-1.png".into(),
            ..Default::default()
        };
        let d = describe_image(&t, &OcrConfig::default(), &img).await.unwrap();
        assert_eq!(d.description, PLACEHOLDER_DESCRIPTION);
        assert!(t.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn key_elements_accepts_comma_string() {
        assert_eq!(
            key_elements(Some(&json!("title, legend ,, axis"))),
            vec!["title", "legend", "axis"]
        );
    }

    #[test]
    fn dimensions_from_object() {
        assert_eq!(
            dimensions_from_value(&json!({"width": 10, "height": 20})),
            Some(Dimensions::new(10, 20))
        );
        assert_eq!(dimensions_from_value(&json!(42)), None);
    }
}
