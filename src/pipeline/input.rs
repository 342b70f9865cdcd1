//! Input validation: load a user-supplied path into memory, checking it is
//! the kind of file the OCR endpoint expects.
//!
//! Files are read whole. The OCR API takes the full document in one request
//! anyway, and reading up front means a bad path is reported before any
//! network traffic. PDF inputs must start with the `%PDF` magic; image inputs
//! are sniffed from their first bytes rather than trusted by extension.

use crate::error::OcrError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A PDF read from disk.
#[derive(Debug, Clone)]
pub struct PdfInput {
    pub path: PathBuf,
    /// File name sent with the upload.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// An image read from disk.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub path: PathBuf,
    pub file_name: String,
    /// MIME type sniffed from the content, e.g. `image/png`.
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Read a PDF, validating existence, permissions and magic bytes.
pub async fn load_pdf(path: &Path) -> Result<PdfInput, OcrError> {
    let bytes = read_file(path).await?;

    if !bytes.starts_with(b"%PDF") {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(OcrError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }

    debug!("Loaded PDF {} ({} bytes)", path.display(), bytes.len());
    Ok(PdfInput {
        path: path.to_path_buf(),
        file_name: file_name(path),
        bytes,
    })
}

/// Read an image, sniffing its format from the content.
pub async fn load_image(path: &Path) -> Result<ImageInput, OcrError> {
    let bytes = read_file(path).await?;

    let mime_type = sniff_image_mime(&bytes).ok_or_else(|| OcrError::UnsupportedImage {
        path: path.to_path_buf(),
    })?;

    debug!(
        "Loaded image {} ({}, {} bytes)",
        path.display(),
        mime_type,
        bytes.len()
    );
    Ok(ImageInput {
        path: path.to_path_buf(),
        file_name: file_name(path),
        mime_type,
        bytes,
    })
}

/// MIME type of an image the OCR endpoint accepts, from its magic bytes.
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    use image::ImageFormat;

    match image::guess_format(bytes).ok()? {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Tiff => Some("image/tiff"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Avif => Some("image/avif"),
        _ => None,
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>, OcrError> {
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => OcrError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => OcrError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => OcrError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[tokio::test]
    async fn missing_pdf_is_file_not_found() {
        let err = load_pdf(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::FileNotFound { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn non_pdf_is_rejected_with_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"GIF89a....").unwrap();
        match load_pdf(&path).await.unwrap_err() {
            OcrError::NotAPdf { magic, .. } => assert_eq!(&magic, b"GIF8"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn short_file_is_not_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.pdf");
        std::fs::write(&path, b"%P").unwrap();
        assert!(matches!(
            load_pdf(&path).await.unwrap_err(),
            OcrError::NotAPdf { .. }
        ));
    }

    #[tokio::test]
    async fn valid_pdf_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.pdf");
        std::fs::write(&path, b"%PDF-1.7\n%test").unwrap();
        let input = load_pdf(&path).await.unwrap();
        assert_eq!(input.file_name, "ok.pdf");
        assert_eq!(input.bytes.len(), 14);
    }

    #[tokio::test]
    async fn image_is_sniffed_not_trusted_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.jpg");
        std::fs::write(&path, PNG_MAGIC).unwrap();
        let input = load_image(&path).await.unwrap();
        assert_eq!(input.mime_type, "image/png");
    }

    #[tokio::test]
    async fn text_file_is_not_an_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.png");
        std::fs::write(&path, b"just some text").unwrap();
        assert!(matches!(
            load_image(&path).await.unwrap_err(),
            OcrError::UnsupportedImage { .. }
        ));
    }

    #[test]
    fn sniff_jpeg() {
        assert_eq!(sniff_image_mime(b"\xFF\xD8\xFF\xE0\0\x10JFIF"), Some("image/jpeg"));
        assert_eq!(sniff_image_mime(b""), None);
    }
}
