//! Base64 data URLs in both directions.
//!
//! Images go to the API as `data:<mime>;base64,<payload>` strings, and the
//! OCR endpoint hands extracted images back the same way. Decoding is only
//! needed to measure an image the model did not give dimensions for.

use crate::document::Dimensions;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::io::Cursor;
use tracing::debug;

/// Wrap raw bytes in a `data:` URL.
pub fn to_data_url(mime_type: &str, bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded {} bytes → {} chars base64", bytes.len(), b64.len());
    format!("data:{mime_type};base64,{b64}")
}

/// Decode a `data:` URL, or a bare base64 string, back to bytes.
pub fn decode_data_url(data: &str) -> Option<Vec<u8>> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => data,
    };
    STANDARD.decode(payload.trim()).ok()
}

/// Pixel size of an encoded image, read from its header only.
pub fn image_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    let (w, h) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;
    Some(Dimensions::new(w, h))
}
