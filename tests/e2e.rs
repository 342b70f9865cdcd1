//! End-to-end integration tests for mistral-ocr.
//!
//! These tests use real files in `./test_cases/` and make live Mistral API
//! calls. They are gated behind the `E2E_ENABLED` environment variable so
//! they do not run in CI unless explicitly requested, and they need
//! `MISTRAL_API_KEY` in the environment or in `.env`.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_structured -- --nocapture

use mistral_ocr::{
    batch_process_pdfs, parse_pdf, structured_ocr, ImageProcessor, ObjectSchema, OcrConfig,
    OcrError, PageSeparator, Parser, Schema,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Config with the key from the environment or `.env`.
fn live_config() -> OcrConfig {
    OcrConfig::builder()
        .api_key_from_env(None)
        .request_timeout_secs(300)
        .build()
        .expect("valid config")
}

/// Skip this test if E2E_ENABLED is not set, no key is available, or the
/// file at `path` is missing.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        if live_config().require_api_key().is_err() {
            println!("SKIP — MISTRAL_API_KEY not set");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            println!("       Put a sample PDF/image under test_cases/");
            return;
        }
        p
    }};
}

/// Assert the markdown passes basic quality checks.
fn assert_markdown_quality(md: &str, context: &str) {
    assert!(!md.trim().is_empty(), "[{context}] Markdown is empty");

    assert!(
        md.ends_with('\n') && !md.ends_with("\n\n"),
        "[{context}] Markdown must end with exactly one newline"
    );

    let first_line = md.lines().next().unwrap_or("");
    assert!(
        !first_line.starts_with("```markdown") && !first_line.starts_with("```md"),
        "[{context}] Output must not start with a markdown fence, got: {first_line:?}"
    );

    assert!(
        !md.contains("\n\n\n\n"),
        "[{context}] Output has more than 3 consecutive blank lines"
    );

    let invisible = ['\u{200B}', '\u{FEFF}', '\u{200C}', '\u{200D}', '\u{2060}'];
    for ch in invisible {
        assert!(
            !md.contains(ch),
            "[{context}] Output contains invisible char U+{:04X}",
            ch as u32
        );
    }

    println!("[{context}] ✓  {} bytes, quality checks passed", md.len());
}

/// Every image reference must be followed by its description and metadata.
fn assert_images_described(md: &str, context: &str) {
    let images = md.matches("![Image](").count();
    assert_eq!(
        images,
        md.matches("*Image Description: ").count(),
        "[{context}] Every image needs exactly one description"
    );
    assert_eq!(
        images,
        md.matches("**Image Metadata:**").count(),
        "[{context}] Every image needs exactly one metadata block"
    );
    println!("[{context}] {images} image(s) described");
}

// ── PDF → markdown ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_parse_sample_pdf() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.pdf"));
    let out_path = output_dir().join("sample.md");

    let md = parse_pdf(&path, Some(out_path.as_path()), &live_config())
        .await
        .expect("parse should succeed");

    assert_markdown_quality(&md, "sample");
    assert_images_described(&md, "sample");
    assert_eq!(
        std::fs::read_to_string(&out_path).expect("output written"),
        md
    );
}

#[tokio::test]
async fn test_parse_without_descriptions_uses_placeholders() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.pdf"));

    let config = OcrConfig::builder()
        .api_key_from_env(None)
        .describe_images(false)
        .page_separator(PageSeparator::Comment)
        .build()
        .expect("valid config");
    let doc = Parser::new(config)
        .expect("key present")
        .parse_document(&path)
        .await
        .expect("parse should succeed");

    let md = doc.to_markdown(&PageSeparator::Comment);
    assert_markdown_quality(&md, "placeholders");
    assert_eq!(
        md.matches("*Image Description: An image from the document*").count(),
        doc.image_count()
    );
    if doc.pages.len() > 1 {
        assert!(md.contains("<!-- page 2 -->"));
    }
}

#[tokio::test]
async fn test_parse_nonexistent() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }

    let config = OcrConfig::builder().api_key("sk-unused").build().unwrap();
    let err = Parser::new(config)
        .unwrap()
        .parse("/definitely/not/a/real/file.pdf")
        .await
        .unwrap_err();
    assert!(matches!(err, OcrError::FileNotFound { .. }));
}

// ── Image → JSON ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_structured_receipt() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("receipt.png"));

    let schema: Schema = ObjectSchema::new()
        .required("merchant", Schema::nullable(Schema::String))
        .required("total", Schema::nullable(Schema::Number))
        .required("items", Schema::array(Schema::String))
        .deny_unknown()
        .into();

    let result = structured_ocr(&path, Some(&schema), &live_config())
        .await
        .expect("structured OCR should succeed");

    assert_eq!(result.file_name, "receipt.png");
    assert!(!result.languages.is_empty(), "at least one language expected");
    for code in &result.languages {
        assert_eq!(code.len(), 2, "language '{code}' is not ISO 639-1");
    }
    assert!(result.ocr_contents.contains_key("items"));

    let json = serde_json::to_string_pretty(&result).unwrap();
    std::fs::write(output_dir().join("receipt.json"), &json).ok();
    println!("{json}");
}

#[tokio::test]
async fn test_image_ocr_markdown() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("receipt.png"));

    let md = ImageProcessor::new(live_config())
        .expect("key present")
        .ocr_markdown(&path)
        .await
        .expect("image OCR should succeed");

    assert!(!md.trim().is_empty());
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_batch_over_test_cases() {
    let dir = e2e_skip_unless_ready!(test_cases_dir());
    let out = output_dir().join("batch");

    let report = batch_process_pdfs(&dir, &out, None, &live_config())
        .await
        .expect("batch should run");

    println!("{}/{} succeeded", report.successes(), report.len());
    for (input, reason) in report.failed() {
        println!("  ✗ {}: {reason}", input.display());
    }
    assert_eq!(report.failures(), 0);
}

// ── Offline checks ───────────────────────────────────────────────────────────

#[test]
fn test_missing_key_message_names_variable() {
    let err = Parser::new(OcrConfig::default()).unwrap_err();
    assert!(err.to_string().contains("MISTRAL_API_KEY"));
}
