use std::sync::LazyLock;

use regex::Regex;

use super::floor_char_boundary;
use super::headings::Stub;

// How far to look back from the next heading for the start of its line.
const HEADER_LOOKBACK: usize = 200;

static NUMBERED_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\d+(?:\.\d+)*\.?\s+[^\n]+$").unwrap());
static FORMATTING_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[#\*_\-]+\s*$").unwrap());
static PAGE_FOOTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*_?\*{0,2}\d+-\d+\*{0,2}_?\s*$").unwrap());
static MD_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#{2,}\s+.*$").unwrap());
static TABLE_ROW_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\|.*\|$").unwrap());
static RULE_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[-\s\|:]{3,}\s*$").unwrap());
static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Compute each stub's body span `[start, end)`. A body runs from the end of
/// its own heading to the start of the next heading's line; heading matches
/// anchor on the number and title only, so the cut is backed up to the last
/// newline within a bounded window to avoid swallowing a fragment of the
/// next heading. The final body runs to end of input.
pub fn body_spans(text: &str, stubs: &[Stub]) -> Vec<(usize, usize)> {
    let mut spans = Vec::with_capacity(stubs.len());

    for (i, stub) in stubs.iter().enumerate() {
        let end = match stubs.get(i + 1) {
            Some(next) => {
                let window_start =
                    floor_char_boundary(text, next.header_end.saturating_sub(HEADER_LOOKBACK));
                let window = &text[window_start..next.header_end];
                match window.rfind('\n') {
                    Some(pos) => window_start + pos,
                    None => next.header_end,
                }
            }
            None => text.len(),
        };
        spans.push((stub.header_end, end));
    }

    spans
}

/// Strip leftover structure from a table-free body: captured heading lines,
/// markdown-only lines, page footers like `_**9-1**_`, stray table rows, and
/// runs of blank lines.
pub fn clean_content(content: &str) -> String {
    let content = NUMBERED_LINE_RE.replace_all(content, "");
    let content = FORMATTING_LINE_RE.replace_all(&content, "");
    let content = PAGE_FOOTER_RE.replace_all(&content, "");
    let content = MD_HEADING_RE.replace_all(&content, "");
    let content = TABLE_ROW_RE.replace_all(&content, "");
    let content = RULE_LINE_RE.replace_all(&content, "");
    let content = BLANK_RUN_RE.replace_all(&content, "\n\n");
    content.trim().to_string()
}
