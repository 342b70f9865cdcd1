//! Prompts sent to the multimodal model.
//!
//! Every instruction the library gives a model lives here, so unit tests can
//! inspect them without a network round-trip. The OCR endpoint itself takes
//! no prompt; only image descriptions and structured extraction do.

/// Instruction for describing an image found inside a PDF.
///
/// Sent together with the image itself and the fixed description schema
/// built in [`crate::pipeline::describe`].
pub const IMAGE_DESCRIPTION_PROMPT: &str = "Describe this image in detail. \
Include what type of image it is (chart, graph, photograph, diagram, etc.), \
what it depicts, and any key elements. \
Also provide structured metadata about the image content.";

/// Marker lines that fence the OCR markdown inside [`structured_ocr_prompt`].
pub const OCR_BEGIN: &str = "<BEGIN_IMAGE_OCR>";
pub const OCR_END: &str = "<END_IMAGE_OCR>";

/// Build the structured-extraction prompt around an image's OCR markdown.
///
/// The model sees the image alongside this text and must answer with JSON
/// matching the structured result schema.
pub fn structured_ocr_prompt(ocr_markdown: &str) -> String {
    format!(
        "This is the image's OCR in markdown:\n{OCR_BEGIN}\n{}\n{OCR_END}.\n\
         Convert this into a structured JSON response with the OCR contents in a sensible dictionary. \
         List the main topics, and every language the text is written in.",
        ocr_markdown.trim()
    )
}
