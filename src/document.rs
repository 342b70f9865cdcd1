//! Parsed document model and its markdown serialisation.
//!
//! A [`Document`] is produced once per OCR response and never mutated. Its
//! blocks keep the order in which the OCR service returned them; rendering
//! walks them once and emits one markdown construct per block.

use crate::config::PageSeparator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A whole OCR'd document, page by page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub pages: Vec<DocumentPage>,
}

/// The blocks extracted from one page, in reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPage {
    /// 0-based page index as reported by the OCR service.
    pub index: usize,
    pub blocks: Vec<Block>,
}

/// One structural unit of a parsed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Heading { level: u8, text: String },
    /// Running text. Fenced code is kept verbatim here.
    Paragraph { text: String },
    List {
        ordered: bool,
        /// Number of the first item of an ordered list, as written in the source.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<u64>,
        items: Vec<String>,
    },
    /// Table cells, header row first. The GFM separator row is not stored.
    Table { rows: Vec<Vec<String>> },
    Image {
        /// Target of the original `![..](target)` reference, usually the image id.
        reference: String,
        description: String,
        metadata: ImageMetadata,
    },
}

/// What the vision model said about an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    #[serde(rename = "type")]
    pub kind: String,
    pub dimensions: Option<Dimensions>,
    pub content: Option<String>,
    #[serde(default)]
    pub key_elements: Vec<String>,
}

impl Default for ImageMetadata {
    fn default() -> Self {
        Self {
            kind: "Unknown".to_string(),
            dimensions: None,
            content: None,
            key_elements: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse `"640x480"`, `"640 x 480"` or `"640×480"`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase().replace("px", "").replace('×', "x");
        let (w, h) = s.split_once('x')?;
        let width = w.trim().parse().ok()?;
        let height = h.trim().parse().ok()?;
        Some(Self { width, height })
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl Document {
    /// All blocks across pages, in order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.pages.iter().flat_map(|p| p.blocks.iter())
    }

    pub fn image_count(&self) -> usize {
        self.blocks()
            .filter(|b| matches!(b, Block::Image { .. }))
            .count()
    }

    /// Serialise to markdown, joining pages with `separator`.
    ///
    /// Always ends with exactly one newline.
    pub fn to_markdown(&self, separator: &PageSeparator) -> String {
        let mut out = String::new();
        let mut first = true;
        for page in &self.pages {
            if page.blocks.is_empty() {
                continue;
            }
            if !first {
                out.push_str(&separator.render(page.index + 1));
            }
            first = false;
            let rendered: Vec<String> = page.blocks.iter().map(Block::to_markdown).collect();
            out.push_str(&rendered.join("\n\n"));
        }
        crate::pipeline::postprocess::ensure_final_newline(&out)
    }
}

impl Block {
    /// Markdown for this block alone, without surrounding blank lines.
    pub fn to_markdown(&self) -> String {
        match self {
            Block::Heading { level, text } => {
                format!("{} {}", "#".repeat((*level).clamp(1, 6) as usize), text)
            }
            Block::Paragraph { text } => text.clone(),
            Block::List {
                ordered,
                start,
                items,
            } => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    if *ordered {
                        format!("{}. {}", start.unwrap_or(1) + i as u64, item)
                    } else {
                        format!("- {item}")
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Block::Table { rows } => render_table(rows),
            Block::Image {
                reference,
                description,
                metadata,
            } => render_image(reference, description, metadata),
        }
    }
}

fn render_table(rows: &[Vec<String>]) -> String {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (i, row) in rows.iter().enumerate() {
        let mut cells: Vec<&str> = row.iter().map(String::as_str).collect();
        cells.resize(width, "");
        lines.push(format!("| {} |", cells.join(" | ")));
        if i == 0 {
            lines.push(format!("|{}", " --- |".repeat(width)));
        }
    }
    lines.join("\n")
}

fn render_image(reference: &str, description: &str, metadata: &ImageMetadata) -> String {
    let mut s = format!(
        "![Image]({reference})\n*Image Description: {}*\n\n**Image Metadata:**\n- Type: {}\n- Dimensions: {}",
        single_line(description).replace('*', "\\*"),
        metadata.kind,
        metadata
            .dimensions
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    );
    if let Some(ref content) = metadata.content {
        s.push_str(&format!("\n- Content: {}", single_line(content)));
    }
    if !metadata.key_elements.is_empty() {
        s.push_str(&format!("\n- Key Elements: {}", metadata.key_elements.join(", ")));
    }
    s
}

/// Collapse every whitespace run, newlines included, to one space.
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart() -> Block {
        Block::Image {
            reference: "img-0.jpeg".into(),
            description: "A bar chart of revenue".into(),
            metadata: ImageMetadata {
                kind: "Chart".into(),
                dimensions: Some(Dimensions::new(640, 480)),
                content: Some("Quarterly revenue".into()),
                key_elements: vec!["bars".into(), "legend".into()],
            },
        }
    }

    #[test]
    fn heading_levels() {
        let b = Block::Heading {
            level: 2,
            text: "Results".into(),
        };
        assert_eq!(b.to_markdown(), "## Results");
    }

    #[test]
    fn lists() {
        let b = Block::List {
            ordered: true,
            start: None,
            items: vec!["one".into(), "two".into()],
        };
        assert_eq!(b.to_markdown(), "1. one\n2. two");
        let b = Block::List {
            ordered: false,
            start: None,
            items: vec!["a".into()],
        };
        assert_eq!(b.to_markdown(), "- a");
    }

    #[test]
    fn ordered_list_keeps_its_first_number() {
        let b = Block::List {
            ordered: true,
            start: Some(3),
            items: vec!["Results".into(), "Discussion".into()],
        };
        assert_eq!(b.to_markdown(), "3. Results\n4. Discussion");
    }

    #[test]
    fn description_stays_on_one_caption_line() {
        let b = Block::Image {
            reference: "img-0.jpeg".into(),
            description: "A *bold* claim.\n\nSecond   paragraph".into(),
            metadata: ImageMetadata {
                content: Some("line one\nline two".into()),
                ..ImageMetadata::default()
            },
        };
        let md = b.to_markdown();
        assert!(
            md.contains("*Image Description: A \\*bold\\* claim. Second paragraph*\n"),
            "{md}"
        );
        assert!(md.contains("- Content: line one line two"), "{md}");
        assert!(!md.contains("\n\n**Image Metadata:**\n\n"));
    }

    #[test]
    fn table_gets_separator_after_header() {
        let b = Block::Table {
            rows: vec![
                vec!["A".into(), "B".into()],
                vec!["1".into()],
            ],
        };
        assert_eq!(b.to_markdown(), "| A | B |\n| --- | --- |\n| 1 |  |");
    }

    #[test]
    fn image_renders_caption_then_metadata() {
        let md = chart().to_markdown();
        assert_eq!(
            md,
            "![Image](img-0.jpeg)\n\
             *Image Description: A bar chart of revenue*\n\n\
             **Image Metadata:**\n\
             - Type: Chart\n\
             - Dimensions: 640x480\n\
             - Content: Quarterly revenue\n\
             - Key Elements: bars, legend"
        );
    }

    #[test]
    fn image_without_optional_metadata() {
        let b = Block::Image {
            reference: "img-1.png".into(),
            description: "An image from the document".into(),
            metadata: ImageMetadata::default(),
        };
        let md = b.to_markdown();
        assert!(md.contains("- Type: Unknown"));
        assert!(md.contains("- Dimensions: unknown"));
        assert!(!md.contains("Content:"));
        assert!(!md.contains("Key Elements:"));
    }

    #[test]
    fn document_joins_pages_with_separator() {
        let doc = Document {
            pages: vec![
                DocumentPage {
                    index: 0,
                    blocks: vec![Block::Paragraph { text: "first".into() }],
                },
                DocumentPage {
                    index: 1,
                    blocks: vec![Block::Paragraph { text: "second".into() }],
                },
            ],
        };
        assert_eq!(
            doc.to_markdown(&PageSeparator::Comment),
            "first\n\n<!-- page 2 -->\n\nsecond\n"
        );
        assert_eq!(doc.to_markdown(&PageSeparator::None), "first\n\nsecond\n");
    }

    #[test]
    fn empty_document_is_single_newline() {
        assert_eq!(Document::default().to_markdown(&PageSeparator::None), "\n");
    }

    #[test]
    fn dimensions_parse() {
        assert_eq!(Dimensions::parse("640x480"), Some(Dimensions::new(640, 480)));
        assert_eq!(Dimensions::parse("640 × 480"), Some(Dimensions::new(640, 480)));
        assert_eq!(Dimensions::parse("100px x 50px"), Some(Dimensions::new(100, 50)));
        assert_eq!(Dimensions::parse("large"), None);
    }

    #[test]
    fn block_json_is_tagged() {
        let v = serde_json::to_value(chart()).unwrap();
        assert_eq!(v["kind"], "image");
        assert_eq!(v["metadata"]["type"], "Chart");
    }
}
