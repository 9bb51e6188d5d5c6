//! Assignment query layer
//!
//! Scans a document tree for assignment marks and answers the questions a
//! filter surface needs: which assignees appear, how many assignments each
//! one has, and whether a given block contains work for a given assignee.

use std::collections::HashMap;

use crate::document_model::{DocumentNode, Mark};

/// One row of the assignee census
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssigneeCount {
    /// Identity-provider id
    pub id: String,
    /// Display name as carried by the marks
    pub name: String,
    /// Number of assignment marks naming this assignee
    pub count: usize,
}

/// Count assignments per distinct assignee across a document tree
///
/// # Returns
/// * Rows sorted by count descending, ties broken by name ascending
///   (compared lowercased)
pub fn assignee_census(doc: &DocumentNode) -> Vec<AssigneeCount> {
    let mut counts: HashMap<String, AssigneeCount> = HashMap::new();

    doc.walk(&mut |node| {
        for mark in node.marks() {
            if let Mark::Assignment { attrs } = mark {
                for assignee in &attrs.assignees {
                    counts
                        .entry(assignee.id.clone())
                        .and_modify(|row| row.count += 1)
                        .or_insert_with(|| AssigneeCount {
                            id: assignee.id.clone(),
                            name: assignee.name.clone(),
                            count: 1,
                        });
                }
            }
        }
    });

    let mut rows: Vec<AssigneeCount> = counts.into_values().collect();
    rows.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    rows
}

/// Whether any assignment mark inside this subtree names the assignee
pub fn block_contains_assignee(block: &DocumentNode, assignee_id: &str) -> bool {
    let mut found = false;
    block.walk(&mut |node| {
        if found {
            return;
        }
        for mark in node.marks() {
            if let Mark::Assignment { attrs } = mark {
                if attrs.assignees.iter().any(|a| a.id == assignee_id) {
                    found = true;
                }
            }
        }
    });
    found
}

/// Derived visibility of each top-level block under an assignee filter
///
/// Pure projection consumed by the rendering layer; the tree itself is
/// never mutated and no style text is generated here.
pub fn block_visibility(doc: &DocumentNode, assignee_id: &str) -> Vec<bool> {
    doc.children()
        .iter()
        .map(|block| block_contains_assignee(block, assignee_id))
        .collect()
}
