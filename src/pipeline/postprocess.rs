//! Deterministic cleanup of OCR page markdown before block extraction.
//!
//! The OCR service occasionally returns markdown with artefacts that would
//! confuse the block splitter: Windows line endings, a whole page wrapped in
//! a ```` ```markdown ```` fence, zero-width characters between words, runs
//! of blank lines. Each rule is a pure `&str → String` function.
//!
//! ## Rule Order
//!
//! Line endings are normalised before the fence check so the fence regex
//! sees `\n` only; invisible characters are removed before trailing
//! whitespace is trimmed so a line ending in `\u{200B} ` trims cleanly.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one page of OCR markdown.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip an outer ```` ```markdown ```` / ```` ```md ```` fence wrapping the whole page
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim trailing whitespace per line
/// 5. Collapse 3+ consecutive blank lines down to 1
pub fn clean_page_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_markdown_fences(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    collapse_blank_lines(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)\n(.*)\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        // The tagged fence must wrap the whole page, with no fences inside.
        // An untagged fence is a real code block and stays.
        if !caps[1].contains("\n```") {
            return caps[1].to_string();
        }
    }
    input.to_string()
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Output helpers ───────────────────────────────────────────────────────────

/// Trim trailing whitespace and end with exactly one newline.
pub fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

/// A GFM table row: starts and ends with `|`.
pub(crate) fn is_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|') && trimmed.ends_with('|') && trimmed.len() > 1
}

/// A GFM separator row: only `|`, `-`, `:` and spaces, with at least one `-`.
pub(crate) fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with('|')
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| c == '|' || c == '-' || c == ':' || c == ' ')
}

// ── Tests ────────────────────────────────────────────────────────────────────
