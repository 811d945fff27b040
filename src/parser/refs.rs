use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use super::floor_char_boundary;
use super::tables::Table;

// How far past a labeled reference to look for chained bare numbers.
const CHAIN_LOOKAHEAD: usize = 200;

// Table citations, including letter-suffixed chains like
// "Table 9.10.3.1.-A or 9.10.3.1.-B".
static TABLE_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bTables?\s+((?:\d+\.){2,4}(?:-[A-Z])?(?:\s+(?:or|and)\s+(?:\d+\.){2,4}(?:-[A-Z])?)*)",
    )
    .unwrap()
});

// References introduced by a structural keyword; parenthetical sentence and
// clause markers are captured so they can be stripped off the number.
static LABELED_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:Articles?|Sections?|Subsections?|Clauses?|Subclauses?|Sentences?)\s+((?:\d+\.){2,4}(?:\([^)]*\))*)",
    )
    .unwrap()
});

// A dotted number of 2 to 4 groups, each ending in a dot.
static DOTTED_NUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:\d+\.){2,4}").unwrap());
static LEADING_NUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^((?:\d+\.){2,4})").unwrap());

// Keywordless citations near "see" or inside parentheses,
// e.g. "(see 9.20., 9.27. or 9.28.)".
static LOOSE_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:(?:see|see also|see Article|see Section)\b.{0,80}?|\()\s*((?:\d+\.){2,4})")
        .unwrap()
});

/// Extract normalized reference tokens from cleaned prose, first-seen order,
/// no duplicates.
///
/// Three passes share one seen-set: table references run first and claim
/// their numbers, so later passes never re-emit a table's number as a plain
/// section reference; labeled references run before loose ones.
pub fn extract_references(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut ordered: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut table_numbers: HashSet<String> = HashSet::new();

    // Pass 1: table references.
    for caps in TABLE_REF_RE.captures_iter(text) {
        for num in DOTTED_NUM_RE.find_iter(&caps[1]) {
            let num = with_trailing_dot(num.as_str());
            let table_ref = format!("Table {}", num);
            table_numbers.insert(num);
            if seen.insert(table_ref.clone()) {
                ordered.push(table_ref);
            }
        }
    }

    // Pass 2: keyword-labeled references, plus chained numbers that follow
    // without a repeated keyword ("9.10.15.2., 9.10.15.3. and 9.10.15.4.").
    for caps in LABELED_REF_RE.captures_iter(text) {
        if let Some(lead) = LEADING_NUM_RE.captures(&caps[1]) {
            let num = with_trailing_dot(&lead[1]);
            if !table_numbers.contains(&num) && seen.insert(num.clone()) {
                ordered.push(num);
            }
        }

        let m_end = caps.get(0).unwrap().end();
        let tail_end = floor_char_boundary(text, (m_end + CHAIN_LOOKAHEAD).min(text.len()));
        for chained in DOTTED_NUM_RE.find_iter(&text[m_end..tail_end]) {
            let num = with_trailing_dot(chained.as_str());
            if !table_numbers.contains(&num) && seen.insert(num.clone()) {
                ordered.push(num);
            }
        }
    }

    // Pass 3: loose references.
    for caps in LOOSE_REF_RE.captures_iter(text) {
        let num = with_trailing_dot(&caps[1]);
        if !table_numbers.contains(&num) && seen.insert(num.clone()) {
            ordered.push(num);
        }
    }

    ordered
}

/// Drop references a section may not cite: itself, any ancestor, and any of
/// its own tables.
pub fn filter_references(
    refs: Vec<String>,
    number: &str,
    tables: &BTreeMap<String, Table>,
) -> Vec<String> {
    let self_num = with_trailing_dot(number);

    // "9.33.8.4." yields ancestors {"9.33.", "9.33.8."}; the bare root "9."
    // has a single group and is never a valid reference anyway.
    let parts: Vec<&str> = self_num.trim_end_matches('.').split('.').collect();
    let mut ancestors: HashSet<String> = HashSet::new();
    for i in 1..parts.len().saturating_sub(1) {
        let anc = format!("{}.", parts[..=i].join("."));
        if anc.matches('.').count() >= 2 {
            ancestors.insert(anc);
        }
    }

    refs.into_iter()
        .map(|r| with_trailing_dot(&r))
        .filter(|r| *r != self_num && !ancestors.contains(r) && !tables.contains_key(r))
        .collect()
}

fn with_trailing_dot(num: &str) -> String {
    if num.ends_with('.') {
        num.to_string()
    } else {
        format!("{}.", num)
    }
}
