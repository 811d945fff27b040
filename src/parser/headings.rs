use std::sync::LazyLock;

use regex::Regex;

use super::floor_char_boundary;

// Trailing dot on the number is mandatory: it is what separates a heading
// like "9.5.1. Stairs" from a measurement like "9.5 mm".
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:#{2,}\s*(?:Section\s+)?)?(\d+(?:\.\d+)*\.)\s+([^\n]+)").unwrap()
});
static LIST_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\)\s*$").unwrap());

// Table-internal header rows that masquerade as headings.
const TABLE_ARTIFACTS: &[&str] = &["notes to table", "col1", "col2", "col3"];

/// A detected section heading, before its body has been segmented.
#[derive(Debug, Clone)]
pub struct Stub {
    pub number: String,
    pub title: String,
    pub header_start: usize,
    pub header_end: usize,
}

/// Scan the document for section headings and return them ordered by
/// position. `root` is the top numeric group the document belongs to
/// ("9" for Part 9); anything outside it is discarded.
pub fn extract_stubs(text: &str, root: &str) -> Vec<Stub> {
    let mut stubs = Vec::new();

    for caps in HEADING_RE.captures_iter(text) {
        let m = caps.get(0).unwrap();
        let number = caps[1].trim().to_string();
        let title = caps[2].trim().to_string();

        // A bare "N)" just before the match means this is a list item
        // continuation, not a heading.
        let window_start = floor_char_boundary(text, m.start().saturating_sub(5));
        if LIST_MARKER_RE.is_match(&text[window_start..m.start()]) {
            continue;
        }

        let trimmed = number.trim_end_matches('.');
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts[0] != root || parts.len() < 2 {
            continue;
        }

        let title_lower = title.to_lowercase();
        if TABLE_ARTIFACTS.iter().any(|t| title_lower.contains(t)) {
            continue;
        }

        stubs.push(Stub {
            number,
            title,
            header_start: m.start(),
            header_end: m.end(),
        });
    }

    stubs.sort_by_key(|s| s.header_start);
    stubs
}
