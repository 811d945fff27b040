use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use super::tables::Table;
use super::Section;

/// One node of the output tree; this is the wire shape consumed by the
/// downstream graph loader.
#[derive(Debug, Clone, Serialize)]
pub struct SectionNode {
    pub title: String,
    pub text: String,
    pub tables: BTreeMap<String, Table>,
    pub referenced_text: Vec<String>,
    pub subsections: BTreeMap<String, SectionNode>,
}

/// The full document tree, keyed at the root by top-level section paths
/// like "9.1.".
#[derive(Debug, Default, Serialize)]
pub struct Hierarchy(pub BTreeMap<String, SectionNode>);

impl Hierarchy {
    /// Insert a parsed section at the position its dotted path dictates.
    ///
    /// A two-group path ("9.1.") goes directly under the root; deeper paths
    /// walk down through each ancestor's `subsections`. When an ancestor is
    /// missing, the section is an orphan: it is logged and dropped, never
    /// attached to a fabricated placeholder. Returns whether the section
    /// was placed.
    pub fn insert(&mut self, section: Section) -> bool {
        let parts: Vec<String> = section
            .number
            .trim_end_matches('.')
            .split('.')
            .map(str::to_string)
            .collect();

        let node = SectionNode {
            title: section.title,
            text: section.text,
            tables: section.tables,
            referenced_text: section.referenced_text,
            subsections: BTreeMap::new(),
        };

        if parts.len() == 2 {
            self.0.insert(section.number, node);
            return true;
        }

        let mut current = &mut self.0;
        for i in 1..parts.len() - 1 {
            let parent_key = format!("{}.", parts[..=i].join("."));
            match current.get_mut(&parent_key) {
                Some(parent) => current = &mut parent.subsections,
                None => {
                    warn!(
                        "Parent '{}' not found for section '{}', dropping orphan",
                        parent_key, section.number
                    );
                    return false;
                }
            }
        }

        current.insert(section.number, node);
        true
    }
}
