//! Table-of-contents projection and section decomposition
//!
//! Scans a document tree for headings in document order and computes
//! hierarchical dotted section numbers with a per-level counter stack.
//! Section numbers stay strings end to end so "2.10" never collapses
//! into "2.1".

use itertools::Itertools;
use serde::Serialize;

use crate::document_model::DocumentNode;

/// One table-of-contents row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TocEntry {
    /// Stable id derived from the section number (e.g. "section-2-1-3")
    pub id: String,
    /// Heading text
    pub title: String,
    /// Heading level, 1-4
    pub level: u8,
    /// Dot-joined hierarchical number, always a string
    pub section_number: String,
}

/// A heading-delimited slice of a document
///
/// Derived, never persisted. Used to decompose generated content and to
/// feed section-scoped operations.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybookSection {
    pub id: String,
    pub title: String,
    pub level: u8,
    /// Block nodes between this heading and the next one
    pub content: Vec<DocumentNode>,
}

/// Extract the table of contents of a document tree
///
/// Heading numbering: visiting a level-L heading increments the L-th
/// counter, emits counters 1..=L joined with '.', then truncates the
/// counter stack to depth L so a later shallower heading does not inherit
/// stale deeper counters.
pub fn extract_toc(doc: &DocumentNode) -> Vec<TocEntry> {
    let mut numberer = SectionNumberer::new();
    let mut entries = Vec::new();

    doc.walk(&mut |node| {
        if let DocumentNode::Heading { attrs, .. } = node {
            let number = numberer.next(attrs.level);
            entries.push(TocEntry {
                id: section_id(&number),
                title: crate::plain_text::extract_text(node),
                level: attrs.level,
                section_number: number,
            });
        }
    });

    entries
}

/// Extract a table of contents from a serialized tree
///
/// Malformed input degrades to an empty listing.
pub fn extract_toc_from_json(json: &str) -> Vec<TocEntry> {
    match crate::document_model::from_json(json) {
        Ok(doc) => extract_toc(&doc),
        Err(e) => {
            log::warn!("toc extraction skipped malformed tree: {}", e);
            Vec::new()
        }
    }
}

/// Decompose a document into heading-delimited sections
///
/// Top-level blocks preceding the first heading become a level-0 preamble
/// section so no content is dropped.
pub fn split_sections(doc: &DocumentNode) -> Vec<PlaybookSection> {
    let mut numberer = SectionNumberer::new();
    let mut sections: Vec<PlaybookSection> = Vec::new();

    for block in doc.children() {
        match block {
            DocumentNode::Heading { attrs, .. } => {
                let number = numberer.next(attrs.level);
                sections.push(PlaybookSection {
                    id: section_id(&number),
                    title: crate::plain_text::extract_text(block),
                    level: attrs.level,
                    content: Vec::new(),
                });
            }
            other => match sections.last_mut() {
                Some(section) => section.content.push(other.clone()),
                None => sections.push(PlaybookSection {
                    id: "preamble".to_string(),
                    title: String::new(),
                    level: 0,
                    content: vec![other.clone()],
                }),
            },
        }
    }

    sections
}

/// Per-level counter stack for dotted section numbers
struct SectionNumberer {
    counters: Vec<u32>,
}

impl SectionNumberer {
    fn new() -> Self {
        Self {
            counters: Vec::new(),
        }
    }

    fn next(&mut self, level: u8) -> String {
        let level = level.max(1) as usize;
        if self.counters.len() < level {
            self.counters.resize(level, 0);
        }
        self.counters[level - 1] += 1;
        self.counters.truncate(level);
        self.counters.iter().join(".")
    }
}

fn section_id(number: &str) -> String {
    format!("section-{}", number.replace('.', "-"))
}
