pub mod headings;
pub mod hierarchy;
pub mod refs;
pub mod segment;
pub mod tables;

use std::collections::BTreeMap;

use hierarchy::Hierarchy;
use tables::Table;
use tracing::info;

/// A section as a flat record, before tree placement. Offsets index the
/// original input and exist only for the duration of the parse.
#[derive(Debug, Clone)]
pub struct Section {
    pub number: String,
    pub title: String,
    pub text: String,
    pub start_pos: usize,
    pub end_pos: usize,
    pub tables: BTreeMap<String, Table>,
    pub referenced_text: Vec<String>,
}

impl Section {
    /// Nesting depth, equal to the number of numeric groups in the path
    /// ("9.1." is 2, an Article like "9.23.11.3." is 4).
    pub fn depth(&self) -> usize {
        self.number.matches('.').count()
    }

    /// Parent path, or None for top-level sections like "9.1.".
    pub fn parent_number(&self) -> Option<String> {
        let parts: Vec<&str> = self.number.trim_end_matches('.').split('.').collect();
        if parts.len() <= 2 {
            return None;
        }
        Some(format!("{}.", parts[..parts.len() - 1].join(".")))
    }
}

/// Everything one parse run produces: the tree, the flat section list it
/// was assembled from, and the paths that could not be placed.
pub struct ParseOutcome {
    pub hierarchy: Hierarchy,
    pub sections: Vec<Section>,
    pub orphans: Vec<String>,
}

/// Five-pass pipeline: headings → body spans → tables out → references →
/// tree assembly. `root` is the document's top numeric group ("9").
///
/// Deterministic and total: the same input always yields the same tree,
/// and no section's failure can abort its siblings.
pub fn parse_document(text: &str, root: &str) -> ParseOutcome {
    let stubs = headings::extract_stubs(text, root);
    let spans = segment::body_spans(text, &stubs);

    let mut sections = Vec::with_capacity(stubs.len());
    for (stub, &(start, end)) in stubs.iter().zip(&spans) {
        let raw = &text[start..end];
        let (without_tables, tables) = tables::extract_tables(raw);
        let cleaned = segment::clean_content(&without_tables);
        let raw_refs = refs::extract_references(&cleaned);
        let referenced_text = refs::filter_references(raw_refs, &stub.number, &tables);

        sections.push(Section {
            number: stub.number.clone(),
            title: stub.title.clone(),
            text: cleaned,
            start_pos: start,
            end_pos: end,
            tables,
            referenced_text,
        });
    }

    let mut hierarchy = Hierarchy::default();
    let mut orphans = Vec::new();
    for section in &sections {
        if !hierarchy.insert(section.clone()) {
            orphans.push(section.number.clone());
        }
    }

    info!(
        "Parsed {} sections ({} orphans dropped)",
        sections.len(),
        orphans.len()
    );

    ParseOutcome {
        hierarchy,
        sections,
        orphans,
    }
}

/// Largest char boundary not greater than `idx`. Window arithmetic on byte
/// offsets must not split a multibyte character.
pub(crate) fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(n: &str) -> Section {
        Section {
            number: n.to_string(),
            title: String::new(),
            text: String::new(),
            start_pos: 0,
            end_pos: 0,
            tables: BTreeMap::new(),
            referenced_text: Vec::new(),
        }
    }

    #[test]
    fn depth_counts_groups() {
        assert_eq!(section("9.1.").depth(), 2);
        assert_eq!(section("9.23.11.").depth(), 3);
        assert_eq!(section("9.23.11.3.").depth(), 4);
    }

    #[test]
    fn parent_number() {
        assert_eq!(section("9.1.").parent_number(), None);
        assert_eq!(section("9.23.11.").parent_number(), Some("9.23.".to_string()));
        assert_eq!(
            section("9.23.11.3.").parent_number(),
            Some("9.23.11.".to_string())
        );
    }

    #[test]
    fn flat_list_depth_is_consistent_with_tree_placement() {
        let text = "9.3. Materials\nprose\n9.3.2. Lumber\nprose\n9.3.2.1. Grade Marking\nprose\n";
        let outcome = parse_document(text, "9");
        assert_eq!(outcome.sections.len(), 3);
        assert!(outcome.orphans.is_empty());

        for s in &outcome.sections {
            let groups = s.number.trim_end_matches('.').split('.').count();
            assert_eq!(s.depth(), groups);
        }

        let top = &outcome.hierarchy.0["9.3."];
        assert_eq!(
            top.subsections["9.3.2."].subsections["9.3.2.1."].title,
            "Grade Marking"
        );
    }

    #[test]
    fn parsing_is_idempotent() {
        let text = "9.1. General\nSee Article 9.2.1.1.\n9.2. Application\nprose here\n";
        let a = parse_document(text, "9");
        let b = parse_document(text, "9");
        assert_eq!(
            serde_json::to_string(&a.hierarchy).unwrap(),
            serde_json::to_string(&b.hierarchy).unwrap()
        );
    }

    #[test]
    fn part9_fixture_end_to_end() {
        let md = std::fs::read_to_string("tests/fixtures/part9_excerpt.md").unwrap();
        let outcome = parse_document(&md, "9");

        let numbers: Vec<&str> = outcome.sections.iter().map(|s| s.number.as_str()).collect();
        assert_eq!(
            numbers,
            vec!["9.23.", "9.23.1.", "9.23.11.", "9.23.11.3.", "9.40.2.1."]
        );

        // 9.40. was never declared, so 9.40.2.1. cannot be placed
        assert_eq!(outcome.orphans, vec!["9.40.2.1."]);
        assert_eq!(outcome.hierarchy.0.len(), 1);

        let top = &outcome.hierarchy.0["9.23."];
        assert_eq!(top.title, "Wood-Frame Construction");
        // Only a page footer sat between this heading and the next one
        assert_eq!(top.text, "");

        let application = &top.subsections["9.23.1."];
        assert_eq!(application.referenced_text, vec!["9.20."]);
        assert!(application.text.contains("9.5 mm gypsum board"));

        let article = &top.subsections["9.23.11."].subsections["9.23.11.3."];
        assert_eq!(article.title, "Support of Joists");
        assert_eq!(article.tables.len(), 1);
        let table = &article.tables["Table 9.23.11.3."];
        assert_eq!(table.name, "Maximum Spans for Floor Joists");
        assert!(table.content.contains("|38 x 89|2.1|"));
        assert!(!article.text.contains('|'));

        // Own table filtered out; the cited pair of letter-suffixed tables
        // collapses to one token; the labeled Article survives
        assert_eq!(
            article.referenced_text,
            vec!["Table 9.10.3.1.", "9.20.17.5."]
        );

        // Wire shape for the downstream loader
        let json = serde_json::to_value(&outcome.hierarchy).unwrap();
        let node = &json["9.23."]["subsections"]["9.23.11."]["subsections"]["9.23.11.3."];
        assert_eq!(
            node["tables"]["Table 9.23.11.3."]["table_name"],
            "Maximum Spans for Floor Joists"
        );
        assert!(node["tables"]["Table 9.23.11.3."]["table_content"]
            .as_str()
            .unwrap()
            .contains("|---|---|"));
        assert!(node["referenced_text"].is_array());
        assert!(node["subsections"].as_object().unwrap().is_empty());
    }

    #[test]
    fn multibyte_input_near_window_edges_is_safe() {
        // 200-char lookback and 5-char look-behind windows land inside
        // multibyte sequences without panicking
        let text = "Préambule — façade °C\n9.1. Généralités\nprose façade à 9.2. °C\n9.1.1. Écarts\nprose\n";
        let outcome = parse_document(text, "9");
        assert_eq!(outcome.sections.len(), 2);
        assert!(outcome.orphans.is_empty());
    }
}
