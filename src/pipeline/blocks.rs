//! Split one page of cleaned OCR markdown into structural elements.
//!
//! The splitter is line-based and never reorders: every element is emitted
//! at the position its first line had in the page. Image references are
//! kept as [`Element::ImageRef`] so the describe stage can swap them for
//! full [`Block::Image`] values.
//!
//! Recognised constructs:
//!
//! | Line shape | Element |
//! |------------|---------|
//! | `# ..` to `###### ..` | heading |
//! | `- ..`, `* ..`, `+ ..`, `1. ..`, `1) ..` | list item |
//! | `\| .. \|` | table row (GFM separator rows dropped) |
//! | ```` ``` ```` .. ```` ``` ```` | fenced code, kept verbatim as a paragraph |
//! | `![alt](target)` anywhere | image reference |
//! | anything else | paragraph text |
//!
//! Nested list indentation is flattened; continuation lines indented under
//! a list item are appended to it. An ordered list keeps the number of its
//! first item. A list or quote marker in front of an image reference is
//! dropped along with the line it would have started.

use crate::document::Block;
use crate::pipeline::postprocess::{is_separator_row, is_table_row};
use once_cell::sync::Lazy;
use regex::Regex;

/// One element of a page, before images are described.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Block(Block),
    ImageRef { alt: String, target: String },
}

static RE_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})[ \t]+(.*?)(?:[ \t]+#+)?[ \t]*$").unwrap());

static RE_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:([-*+])|(\d{1,9})[.)])[ \t]+(.*)$").unwrap());

static RE_THEMATIC_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:(?:-\s*){3,}|(?:\*\s*){3,}|(?:_\s*){3,})$").unwrap());

static RE_IMAGE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)\s]*)(?:\s+[^)]*)?\)").unwrap());

/// Accumulates lines into the block currently being built.
#[derive(Default)]
struct Splitter {
    out: Vec<Element>,
    paragraph: Vec<String>,
    /// `(ordered, first number, items)`
    list: Option<(bool, Option<u64>, Vec<String>)>,
    table: Vec<Vec<String>>,
    fence: Option<Vec<String>>,
}

impl Splitter {
    fn flush_paragraph(&mut self) {
        if !self.paragraph.is_empty() {
            let text = std::mem::take(&mut self.paragraph).join("\n");
            self.out.push(Element::Block(Block::Paragraph { text }));
        }
    }

    fn flush_list(&mut self) {
        if let Some((ordered, start, items)) = self.list.take() {
            self.out.push(Element::Block(Block::List {
                ordered,
                start,
                items,
            }));
        }
    }

    fn flush_table(&mut self) {
        if !self.table.is_empty() {
            let rows = std::mem::take(&mut self.table);
            self.out.push(Element::Block(Block::Table { rows }));
        }
    }

    fn flush_all(&mut self) {
        self.flush_paragraph();
        self.flush_list();
        self.flush_table();
    }

    fn push_block(&mut self, block: Block) {
        self.flush_all();
        self.out.push(Element::Block(block));
    }

    fn line(&mut self, line: &str) {
        let trimmed = line.trim();

        // ── Fenced code ──────────────────────────────────────────────────
        if let Some(ref mut fence) = self.fence {
            fence.push(line.to_string());
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                let text = self.fence.take().unwrap_or_default().join("\n");
                self.out.push(Element::Block(Block::Paragraph { text }));
            }
            return;
        }
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            self.flush_all();
            self.fence = Some(vec![line.to_string()]);
            return;
        }

        if trimmed.is_empty() {
            self.flush_all();
            return;
        }

        // ── Images ───────────────────────────────────────────────────────
        if RE_IMAGE_REF.is_match(line) {
            let line = strip_block_marker(line);
            let mut last = 0;
            for caps in RE_IMAGE_REF.captures_iter(line) {
                let Some(m) = caps.get(0) else { continue };
                self.text_fragment(&line[last..m.start()]);
                self.flush_all();
                self.out.push(Element::ImageRef {
                    alt: caps[1].to_string(),
                    target: caps[2].to_string(),
                });
                last = m.end();
            }
            self.text_fragment(&line[last..]);
            return;
        }

        // ── Headings ─────────────────────────────────────────────────────
        if let Some(caps) = RE_HEADING.captures(trimmed) {
            let level = caps[1].len() as u8;
            let text = caps[2].trim().to_string();
            self.push_block(Block::Heading { level, text });
            return;
        }

        if RE_THEMATIC_BREAK.is_match(line) {
            self.push_block(Block::Paragraph {
                text: "---".to_string(),
            });
            return;
        }

        // ── Tables ───────────────────────────────────────────────────────
        if is_table_row(line) {
            self.flush_paragraph();
            self.flush_list();
            if !is_separator_row(line) {
                self.table.push(split_cells(trimmed));
            }
            return;
        }
        self.flush_table();

        // ── Lists ────────────────────────────────────────────────────────
        if let Some(caps) = RE_LIST_ITEM.captures(line) {
            let start = caps.get(2).and_then(|n| n.as_str().parse::<u64>().ok());
            let ordered = caps.get(2).is_some();
            let item = caps[3].trim().to_string();
            self.flush_paragraph();
            match self.list.as_mut() {
                Some((o, _, items)) if *o == ordered => items.push(item),
                _ => {
                    self.flush_list();
                    self.list = Some((ordered, start, vec![item]));
                }
            }
            return;
        }
        if let Some((_, _, items)) = self.list.as_mut() {
            if line.starts_with([' ', '\t']) {
                if let Some(last) = items.last_mut() {
                    last.push(' ');
                    last.push_str(trimmed);
                    return;
                }
            }
        }
        self.flush_list();

        self.paragraph.push(line.to_string());
    }

    /// Text around an image reference on the same line.
    fn text_fragment(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.flush_list();
        self.flush_table();
        self.paragraph.push(text.trim().to_string());
    }

    fn finish(mut self) -> Vec<Element> {
        if let Some(fence) = self.fence.take() {
            // Unterminated fence: keep what was there.
            self.out.push(Element::Block(Block::Paragraph {
                text: fence.join("\n"),
            }));
        }
        self.flush_all();
        self.out
    }
}

/// Split one page of markdown into elements, in reading order.
pub fn split_elements(markdown: &str) -> Vec<Element> {
    let mut splitter = Splitter::default();
    for line in markdown.lines() {
        splitter.line(line);
    }
    splitter.finish()
}

/// The line without a leading list item or blockquote marker.
fn strip_block_marker(line: &str) -> &str {
    let line = match RE_LIST_ITEM.captures(line).and_then(|caps| caps.get(3)) {
        Some(rest) => rest.as_str(),
        None => line,
    };
    line.trim_start().trim_start_matches(['>', ' ', '\t'])
}

/// Cells of a pipe-table row. `\|` is an escaped pipe inside a cell.
fn split_cells(row: &str) -> Vec<String> {
    let inner = row.strip_prefix('|').unwrap_or(row);
    let inner = inner.strip_suffix('|').unwrap_or(inner);

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                cell.push_str("\\|");
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut cell).trim().to_string()),
            _ => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}
