use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::floor_char_boundary;

// How far above a table to search for its caption.
const CAPTION_LOOKBACK: usize = 1200;
// How many lines above a table to strip caption/notes debris from.
const CAPTION_SCAN_LINES: usize = 10;

// Header row, divider row, one or more data rows.
static TABLE_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(^\|[^\n]*\|\s*\n^\|(?:\s*[:-]+[-\s|:]*)\|\s*\n(?:^\|[^\n]*\|\s*\n?)+)")
        .unwrap()
});

// "Table <id>" inside a single header cell; the trailing \b lets the regex
// back off a final dot so the id still ends on a digit or letter.
static TABLE_TOKEN_CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bTable\s+([0-9A-Za-z.\-]+\.?)\b").unwrap());
static TABLE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Table\s+([0-9A-Za-z.\-]+\.?)").unwrap());

static CAPTION_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:\*{0,2}\s*Notes to Table\b|Table\s+[0-9A-Za-z.\-]+\.?|Table\b)")
        .unwrap()
});

static BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());
static EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[_\*]{1,2}").unwrap());
static LEADING_PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\s.\-:]+").unwrap());
static WS_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// A table lifted out of a section body, keyed in the section's `tables`
/// map by its "Table <n>." token (or a synthesized fallback).
#[derive(Debug, Clone, Serialize)]
pub struct Table {
    #[serde(rename = "table_name")]
    pub name: String,
    #[serde(rename = "table_content")]
    pub content: String,
}

/// Find every markdown table in `raw`, associate a key and caption with
/// each, and return the text with the table blocks (and their caption
/// lines) removed alongside the key → table map.
///
/// Blocks are visited in reverse document order, so key collisions resolve
/// the same way regardless of where in the body the duplicates sit; removal
/// spans are collected first and the cleaned text is rebuilt from the
/// retained spans in one pass, so no offset is ever invalidated by an edit.
pub fn extract_tables(raw: &str) -> (String, BTreeMap<String, Table>) {
    let mut tables: BTreeMap<String, Table> = BTreeMap::new();

    let matches: Vec<_> = TABLE_BLOCK_RE.find_iter(raw).collect();
    if matches.is_empty() {
        return (raw.to_string(), tables);
    }

    let mut removals: Vec<(usize, usize)> = Vec::new();

    for m in matches.iter().rev() {
        let table_text = m.as_str().trim_end_matches('\n');
        let start_idx = m.start();
        let end_idx = m.end();

        let header_line = table_text
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("")
            .trim();

        let mut key: Option<String> = None;
        let mut name = String::new();
        let mut found_in_header = false;

        // Preferred: "Table <n> Title" sitting in one of the header cells.
        for cell in header_line.split('|') {
            let cell_text = cell.trim();
            if cell_text.is_empty() {
                continue;
            }
            if let Some(caps) = TABLE_TOKEN_CELL_RE.captures(cell_text) {
                let token = caps.get(1).unwrap();
                key = Some(format!("Table {}", with_trailing_dot(token.as_str().trim())));
                name = clean_title_text(&cell_text[token.end()..]);
                found_in_header = true;
                break;
            }
        }

        // Otherwise look for a caption in the text above the table.
        let mut caption_region_start: Option<usize> = None;
        if !found_in_header {
            let lookback_start =
                floor_char_boundary(raw, start_idx.saturating_sub(CAPTION_LOOKBACK));
            let context = &raw[lookback_start..start_idx];

            let mut lines: Vec<&str> = context.lines().collect();
            lines.reverse();

            let mut table_line_idx: Option<usize> = None;
            for (idx, line) in lines.iter().enumerate() {
                if let Some(caps) = TABLE_TOKEN_RE.captures(line) {
                    key = Some(format!("Table {}", with_trailing_dot(caps[1].trim())));
                    table_line_idx = Some(idx);
                    break;
                }
            }

            if let Some(table_idx) = table_line_idx {
                // Non-empty lines above the "Table <n>" line form the
                // caption; restore document order before joining.
                let mut title_lines = Vec::new();
                for line in &lines[..table_idx] {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if TABLE_TOKEN_RE.is_match(line) {
                        break;
                    }
                    title_lines.push(line);
                }
                title_lines.reverse();
                name = clean_title_text(&title_lines.join(" "));

                // Removal starts at the caption's own "Table" token.
                if let Some(last) = TABLE_TOKEN_RE.find_iter(context).last() {
                    caption_region_start = Some(lookback_start + last.start());
                }
            }
        }

        // Fallbacks: anywhere in the header row, else a synthetic key.
        if key.is_none() {
            if let Some(caps) = TABLE_TOKEN_RE.captures(header_line) {
                let token = caps.get(1).unwrap();
                key = Some(format!("Table {}", with_trailing_dot(token.as_str().trim())));
                name = clean_title_text(&header_line[token.end()..]);
            } else {
                let snippet: String = header_line.chars().take(60).collect();
                let snippet = snippet.trim();
                let safe_key = if snippet.is_empty() { "unnamed" } else { snippet };
                key = Some(format!("Table: {}", safe_key));
                name = String::new();
            }
        }

        let base_key = key.unwrap_or_else(|| "Table".to_string());
        let mut unique_key = base_key.clone();
        let mut counter = 1;
        while tables.contains_key(&unique_key) {
            counter += 1;
            unique_key = format!("{} ({})", base_key, counter);
        }

        tables.insert(
            unique_key,
            Table {
                name,
                content: table_text.to_string(),
            },
        );

        // Remove the block, plus caption/notes lines directly above it, so
        // their table numbers do not leak into reference extraction.
        let remove_start = match caption_region_start {
            Some(pos) => pos,
            None => scan_caption_lines_above(raw, start_idx),
        };
        removals.push((remove_start, end_idx));
    }

    // Rebuild from the retained spans; each removed region collapses to a
    // single newline. Overlapping regions (a caption scan reaching into an
    // adjacent block) are merged first.
    removals.sort_unstable();
    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (start, end) in removals {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }

    let mut cleaned = String::with_capacity(raw.len());
    let mut cursor = 0;
    for (start, end) in merged {
        cleaned.push_str(&raw[cursor..start]);
        cleaned.push('\n');
        cursor = end;
    }
    cleaned.push_str(&raw[cursor..]);

    (cleaned, tables)
}

/// Walk up to `CAPTION_SCAN_LINES` whole lines backward from `start_idx`
/// (which sits at a line start), extending the removal over blank lines and
/// caption-like lines so orphaned captions never survive their table.
fn scan_caption_lines_above(raw: &str, start_idx: usize) -> usize {
    let mut remove_start = start_idx;
    let mut lines_removed = 0;

    while lines_removed < CAPTION_SCAN_LINES && remove_start > 0 {
        if raw.as_bytes()[remove_start - 1] != b'\n' {
            break;
        }
        let prev_end = remove_start - 1;
        let line_start = match raw[..prev_end].rfind('\n') {
            Some(nl) => nl + 1,
            None => 0,
        };
        let line = raw[line_start..prev_end].trim();

        let caption_like = line.is_empty()
            || CAPTION_LINE_RE.is_match(line)
            || (line.chars().count() <= 80 && (line.contains("Table") || line.starts_with("**")));
        if !caption_like {
            break;
        }

        remove_start = line_start;
        lines_removed += 1;
    }

    remove_start
}

fn with_trailing_dot(num: &str) -> String {
    if num.ends_with('.') {
        num.to_string()
    } else {
        format!("{}.", num)
    }
}

fn clean_title_text(s: &str) -> String {
    let s = BR_RE.replace_all(s, " ");
    let s = EMPHASIS_RE.replace_all(&s, "");
    let s = LEADING_PUNCT_RE.replace_all(&s, "");
    let s = WS_RUN_RE.replace_all(&s, " ");
    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPAN_TABLE: &str = "\
Joists shall conform to the spans shown.

Table 9.23.11.3.
**Maximum Spans**

|Size|Span|
|---|---|
|38 x 89|2.1 m|
|38 x 140|3.2 m|

Further prose after the table.
";

    #[test]
    fn caption_above_table() {
        let (cleaned, tables) = extract_tables(SPAN_TABLE);
        assert_eq!(tables.len(), 1);
        let table = &tables["Table 9.23.11.3."];
        assert_eq!(table.name, "Maximum Spans");
        assert!(table.content.contains("|38 x 89|2.1 m|"));
        assert!(!cleaned.contains('|'));
        assert!(!cleaned.contains("9.23.11.3."));
        assert!(cleaned.contains("Joists shall conform"));
        assert!(cleaned.contains("Further prose after the table."));
    }

    #[test]
    fn key_in_header_cell() {
        let raw = "|Table 9.3.1.1. Allowable Loads|Col|\n|---|---|\n|a|b|\n";
        let (_, tables) = extract_tables(raw);
        let table = &tables["Table 9.3.1.1."];
        assert_eq!(table.name, "Allowable Loads");
    }

    #[test]
    fn synthetic_key_when_unidentifiable() {
        let raw = "|Species|Grade|\n|---|---|\n|Spruce|No. 1|\n";
        let (_, tables) = extract_tables(raw);
        assert_eq!(tables.len(), 1);
        let key = tables.keys().next().unwrap();
        assert!(key.starts_with("Table: "), "got key {:?}", key);
        assert_eq!(tables[key].name, "");
    }

    #[test]
    fn duplicate_keys_get_suffix() {
        let raw = "\
|Table 9.4.1.1. First|x|
|---|---|
|a|b|

|Table 9.4.1.1. Second|x|
|---|---|
|c|d|
";
        let (_, tables) = extract_tables(raw);
        assert_eq!(tables.len(), 2);
        assert!(tables.contains_key("Table 9.4.1.1."));
        assert!(tables.contains_key("Table 9.4.1.1. (2)"));
    }

    #[test]
    fn removal_is_idempotent() {
        let (cleaned, tables) = extract_tables(SPAN_TABLE);
        assert_eq!(tables.len(), 1);
        let (again, more) = extract_tables(&cleaned);
        assert!(more.is_empty());
        assert_eq!(again, cleaned);
    }

    #[test]
    fn no_tables_returns_input_unchanged() {
        let raw = "plain prose with no table syntax at all";
        let (cleaned, tables) = extract_tables(raw);
        assert_eq!(cleaned, raw);
        assert!(tables.is_empty());
    }

    #[test]
    fn notes_lines_removed_with_table() {
        let raw = "\
prose before

**Notes to Table 9.5.2.1.**

|Table 9.5.2.1. Stair Rise|x|
|---|---|
|a|b|

prose after
";
        let (cleaned, tables) = extract_tables(raw);
        assert!(tables.contains_key("Table 9.5.2.1."));
        assert!(!cleaned.contains("Notes to Table"));
        assert!(cleaned.contains("prose before"));
        assert!(cleaned.contains("prose after"));
    }

    #[test]
    fn caption_scan_stops_at_prose() {
        let raw = "\
This paragraph stays even though it is short.

|Col1|Col2|
|---|---|
|a|b|
";
        let (cleaned, _) = extract_tables(raw);
        assert!(cleaned.contains("This paragraph stays even though it is short."));
    }
}
