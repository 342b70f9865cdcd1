//! Image → validated structured JSON.
//!
//! [`ImageProcessor::process`] runs two remote calls per image:
//!
//! 1. plain OCR of the image, to get its text as markdown;
//! 2. a structured-output chat call with the image, that markdown and the
//!    JSON Schema of [`StructuredResult`].
//!
//! The answer is checked against the same schema before anything is
//! returned. Every field error is collected, languages are resolved to ISO
//! 639-1 codes, and any error at all fails the call: there is no coercion
//! and no partial result.

use crate::config::OcrConfig;
use crate::error::{OcrError, ValidationErrors};
use crate::languages::resolve_language;
use crate::pipeline::encode::to_data_url;
use crate::pipeline::{input, postprocess};
use crate::prompts::structured_ocr_prompt;
use crate::schema::{ObjectSchema, Schema};
use crate::transport::{
    DocumentSource, MistralTransport, OcrOptions, OcrTransport, StructuredRequest,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Structured OCR of one image.
///
/// Serialises to a JSON object with exactly these four keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StructuredResult {
    /// Name of the input file.
    pub file_name: String,
    pub topics: BTreeSet<String>,
    /// ISO 639-1 codes.
    pub languages: BTreeSet<String>,
    /// The image's content, shaped by the caller's schema.
    pub ocr_contents: Map<String, Value>,
}

/// Runs structured OCR through an [`OcrTransport`].
#[derive(Clone)]
pub struct ImageProcessor {
    config: OcrConfig,
    transport: Arc<dyn OcrTransport>,
}

impl std::fmt::Debug for ImageProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageProcessor")
            .field("config", &self.config)
            .finish()
    }
}

impl ImageProcessor {
    /// Processor backed by the Mistral API. Fails without an API key.
    pub fn new(config: OcrConfig) -> Result<Self, OcrError> {
        let transport = MistralTransport::new(&config)?;
        Ok(Self {
            config,
            transport: Arc::new(transport),
        })
    }

    /// Processor backed by a caller-supplied transport. Still requires a key.
    pub fn with_transport(
        config: OcrConfig,
        transport: Arc<dyn OcrTransport>,
    ) -> Result<Self, OcrError> {
        config.require_api_key()?;
        Ok(Self { config, transport })
    }

    /// Plain OCR of an image: its text as markdown.
    pub async fn ocr_markdown(&self, path: impl AsRef<Path>) -> Result<String, OcrError> {
        let image = input::load_image(path.as_ref()).await?;
        let data_url = to_data_url(image.mime_type, &image.bytes);
        let markdown = self.ocr_data_url(&data_url).await?;
        Ok(postprocess::ensure_final_newline(&markdown))
    }

    /// Structured OCR of an image.
    ///
    /// `schema` shapes `ocr_contents` and must describe an object; `None`
    /// accepts any object.
    pub async fn process(
        &self,
        path: impl AsRef<Path>,
        schema: Option<&Schema>,
    ) -> Result<StructuredResult, OcrError> {
        let path = path.as_ref();
        let contents_schema = contents_schema(schema)?;
        info!("Structured OCR of {}", path.display());

        let image = input::load_image(path).await?;
        let data_url = to_data_url(image.mime_type, &image.bytes);
        let markdown = self.ocr_data_url(&data_url).await?;
        debug!("OCR text: {} chars", markdown.len());

        let result_schema = result_schema(&contents_schema);
        let request = StructuredRequest {
            model: self.config.structured_model.clone(),
            prompt: structured_ocr_prompt(&markdown),
            image_data_url: Some(data_url),
            schema_name: "structured_ocr".to_string(),
            schema: Some(result_schema.to_json_schema()),
            temperature: self.config.temperature,
        };
        let reply = self.transport.structured(&request).await?;

        validate_reply(reply, &result_schema, &image.file_name)
    }

    /// OCR a `data:` URL, joining every page's cleaned markdown.
    async fn ocr_data_url(&self, data_url: &str) -> Result<String, OcrError> {
        let source = DocumentSource::Image {
            data_url: data_url.to_string(),
        };
        let mut response = self
            .transport
            .ocr_document(&source, &OcrOptions::from_config(&self.config))
            .await?;
        if response.pages.is_empty() {
            return Err(OcrError::malformed("OCR response contains no pages"));
        }
        response.pages.sort_by_key(|p| p.index);

        let text = response
            .pages
            .iter()
            .map(|p| postprocess::clean_page_markdown(&p.markdown))
            .filter(|md| !md.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(text)
    }
}

/// Schema of `ocr_contents`: the caller's object schema, or any object.
fn contents_schema(schema: Option<&Schema>) -> Result<Schema, OcrError> {
    match schema {
        None | Some(Schema::Any) => Ok(Schema::permissive_object()),
        Some(s @ Schema::Object(_)) => Ok(s.clone()),
        Some(_) => Err(OcrError::InvalidSchema {
            path: "$".to_string(),
            reason: "ocr_contents schema must describe an object".to_string(),
        }),
    }
}

/// The full answer schema with `contents` in place of `ocr_contents`.
pub fn result_schema(contents: &Schema) -> Schema {
    ObjectSchema::new()
        .required("file_name", Schema::String)
        .required("topics", Schema::array(Schema::String))
        .required("languages", Schema::array(Schema::String))
        .required("ocr_contents", contents.clone())
        .deny_unknown()
        .into()
}

/// Check a model answer and build the result.
///
/// `file_name` replaces whatever name the model put in the answer.
fn validate_reply(
    reply: Value,
    schema: &Schema,
    file_name: &str,
) -> Result<StructuredResult, OcrError> {
    let mut errors = ValidationErrors::new();
    schema.validate_into(&reply, "$", &mut errors);

    let mut languages = BTreeSet::new();
    if let Some(list) = reply.get("languages").and_then(Value::as_array) {
        for (i, lang) in list.iter().enumerate() {
            let Some(name) = lang.as_str() else { continue };
            match resolve_language(name) {
                Some(code) => {
                    languages.insert(code.to_string());
                }
                None => errors.push(
                    format!("$.languages[{i}]"),
                    format!("unknown language '{name}'"),
                ),
            }
        }
    }

    if !errors.is_empty() {
        return Err(OcrError::Validation(errors));
    }

    let strings = |key: &str| -> BTreeSet<String> {
        reply
            .get(key)
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    let ocr_contents = match reply.get("ocr_contents") {
        Some(Value::Object(map)) => map.clone(),
        _ => return Err(OcrError::Internal("validated reply lost ocr_contents".into())),
    };

    Ok(StructuredResult {
        file_name: file_name.to_string(),
        topics: strings("topics"),
        languages,
        ocr_contents,
    })
}

// ── Free functions ───────────────────────────────────────────────────────

/// Structured OCR of the image at `path`.
pub async fn structured_ocr(
    path: impl AsRef<Path>,
    schema: Option<&Schema>,
    config: &OcrConfig,
) -> Result<StructuredResult, OcrError> {
    ImageProcessor::new(config.clone())?
        .process(path, schema)
        .await
}

/// Blocking wrapper around [`structured_ocr`].
pub fn structured_ocr_sync(
    path: impl AsRef<Path>,
    schema: Option<&Schema>,
    config: &OcrConfig,
) -> Result<StructuredResult, OcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(structured_ocr(path, schema, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn permissive() -> Schema {
        result_schema(&Schema::permissive_object())
    }

    #[test]
    fn valid_reply_builds_result() {
        let reply = json!({
            "file_name": "whatever-the-model-said.png",
            "topics": ["receipt", "groceries", "receipt"],
            "languages": ["English", "fr"],
            "ocr_contents": { "total": 12.5 }
        });
        let r = validate_reply(reply, &permissive(), "receipt.png").unwrap();
        assert_eq!(r.file_name, "receipt.png");
        assert_eq!(r.topics.len(), 2);
        assert_eq!(
            r.languages.into_iter().collect::<Vec<_>>(),
            vec!["en".to_string(), "fr".to_string()]
        );
        assert_eq!(r.ocr_contents["total"], json!(12.5));
    }

    #[test]
    fn unknown_language_is_field_error() {
        let reply = json!({
            "file_name": "x.png",
            "topics": [],
            "languages": ["English", "Klingon"],
            "ocr_contents": {}
        });
        let err = validate_reply(reply, &permissive(), "x.png").unwrap_err();
        let OcrError::Validation(errors) = err else {
            panic!("expected validation error")
        };
        assert!(errors.has_path("$.languages[1]"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn every_problem_is_reported() {
        let reply = json!({
            "topics": "not a list",
            "languages": ["Elvish"],
            "ocr_contents": [],
            "extra": true
        });
        let OcrError::Validation(errors) =
            validate_reply(reply, &permissive(), "x.png").unwrap_err()
        else {
            panic!("expected validation error")
        };
        for path in ["$.file_name", "$.topics", "$.ocr_contents", "$.extra", "$.languages[0]"] {
            assert!(errors.has_path(path), "missing {path} in {errors}");
        }
    }

    #[test]
    fn caller_schema_applies_to_contents() {
        let contents: Schema = ObjectSchema::new()
            .required("total", Schema::Number)
            .into();
        let reply = json!({
            "file_name": "r.png",
            "topics": ["receipt"],
            "languages": ["en"],
            "ocr_contents": { "total": "12.50" }
        });
        let OcrError::Validation(errors) =
            validate_reply(reply, &result_schema(&contents), "r.png").unwrap_err()
        else {
            panic!("expected validation error")
        };
        assert!(errors.has_path("$.ocr_contents.total"));
    }

    #[test]
    fn non_object_contents_schema_is_rejected() {
        let err = contents_schema(Some(&Schema::array(Schema::String))).unwrap_err();
        assert!(matches!(err, OcrError::InvalidSchema { .. }));
        assert_eq!(contents_schema(None).unwrap(), Schema::permissive_object());
    }

    #[test]
    fn result_json_has_exactly_four_keys() {
        let r = StructuredResult {
            file_name: "a.png".into(),
            topics: ["t".to_string()].into(),
            languages: ["en".to_string()].into(),
            ocr_contents: Map::new(),
        };
        let v = serde_json::to_value(&r).unwrap();
        let keys: Vec<&String> = v.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 4);
        let back: StructuredResult = serde_json::from_value(v).unwrap();
        assert_eq!(back, r);
    }
}
