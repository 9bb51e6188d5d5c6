//! Playbook container: primary document plus internal pages
//!
//! A playbook owns one primary document tree and an ordered set of
//! internal pages, cross-referenced by internal-link marks. This module
//! keeps those references honest: renaming a page rewrites the displayed
//! text and the mark attributes of every referencing span in the same
//! pass, and deleting a page removes every referencing span outright.
//! It also defines the boundary traits for the persistence store, the
//! generative text service and the identity provider.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document_model::{self, DocumentNode, InternalLinkAttrs, Mark};
use crate::markdown_builder::build_document;
use crate::pages::{InternalPage, PageError, PageSet};
use crate::plain_text;

/// Authenticated user as supplied by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    /// Stable user id
    pub id: String,
    /// Display name
    pub name: String,
    pub email: String,
}

/// Generative text service boundary
///
/// Prompt in, markdown out; the markdown builder handles whatever comes
/// back, so no structured output is assumed.
pub trait TextGenerator {
    fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// Failure reported by a text generator implementation
#[derive(Error, Debug)]
#[error("text generation failed: {0}")]
pub struct GenerateError(pub String);

/// Persistence store boundary
///
/// The tree travels as its serialized JSON form. `save_page` must report
/// a page-name collision as [`StoreError::DuplicateKey`] so the caller
/// can distinguish the create race from other failures.
pub trait PlaybookStore {
    fn save_content(&mut self, playbook_id: &str, tree_json: &str) -> Result<(), StoreError>;
    fn load_content(&self, playbook_id: &str) -> Result<String, StoreError>;
    fn save_page(&mut self, playbook_id: &str, page: &InternalPage) -> Result<(), StoreError>;
    fn load_pages(&self, playbook_id: &str) -> Result<Vec<InternalPage>, StoreError>;
}

/// Errors reported by a store implementation
#[derive(Error, Debug)]
pub enum StoreError {
    /// Unique-key violation, e.g. two near-simultaneous page creates
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store failure: {0}")]
    Backend(String),
}

/// Errors for playbook-level operations
#[derive(Error, Debug)]
pub enum PlaybookError {
    #[error(transparent)]
    Page(#[from] PageError),

    /// The pre-check passed but the store saw a concurrent create; local
    /// pages have been reloaded so state is no longer stale
    #[error("page name '{name}' was taken by a concurrent create; pages reloaded")]
    DuplicatePageRace { name: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("tree serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The top-level playbook entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playbook {
    pub id: String,
    pub title: String,
    /// Primary document tree
    pub content: DocumentNode,
    /// Authored description; when absent one is derived from content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Owner user id
    pub owner_id: String,
    pages: PageSet,
    next_page_number: u64,
}

impl Playbook {
    /// Create an empty playbook owned by a user
    pub fn new(id: &str, title: &str, owner_id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            content: DocumentNode::empty_doc(),
            description: None,
            tags: Vec::new(),
            owner_id: owner_id.to_string(),
            pages: PageSet::new(),
            next_page_number: 1,
        }
    }

    /// Replace the primary document with generated content
    pub fn generate_content(
        &mut self,
        generator: &dyn TextGenerator,
        prompt: &str,
    ) -> Result<(), GenerateError> {
        let markdown = generator.generate(prompt)?;
        self.content = build_document(&markdown);
        Ok(())
    }

    /// Authored description, or one derived from the primary document
    pub fn effective_description(&self) -> String {
        match &self.description {
            Some(authored) if !authored.is_empty() => authored.clone(),
            _ => plain_text::derive_description(&self.content),
        }
    }

    pub fn pages(&self) -> &PageSet {
        &self.pages
    }

    pub fn page(&self, page_id: &str) -> Option<&InternalPage> {
        self.pages.get(page_id)
    }

    pub fn page_mut(&mut self, page_id: &str) -> Option<&mut InternalPage> {
        self.pages.get_mut(page_id)
    }

    /// Create an internal page and return the link mark to attach
    ///
    /// The name is pre-checked locally; a duplicate-key error from the
    /// store (two near-simultaneous creates) triggers a page reload so
    /// local state cannot go stale, surfaced as a distinct error.
    pub fn create_internal_page(
        &mut self,
        name: &str,
        title: &str,
        creator: &UserIdentity,
        store: &mut dyn PlaybookStore,
    ) -> Result<Mark, PlaybookError> {
        if self.pages.name_taken(name) {
            return Err(PageError::DuplicateName(name.to_string()).into());
        }

        let page_id = format!("pg-{}", self.next_page_number);
        let page = InternalPage::new(&page_id, name, title, &creator.id);

        match store.save_page(&self.id, &page) {
            Ok(()) => {}
            Err(StoreError::DuplicateKey(_)) => {
                match store.load_pages(&self.id) {
                    Ok(pages) => self.pages.replace_all(pages),
                    Err(e) => log::warn!("page resync after duplicate key failed: {}", e),
                }
                return Err(PlaybookError::DuplicatePageRace {
                    name: name.to_string(),
                });
            }
            Err(other) => return Err(other.into()),
        }

        self.next_page_number += 1;
        self.pages.add(page)?;

        Ok(Mark::InternalLink {
            attrs: InternalLinkAttrs {
                page_id,
                page_name: name.to_string(),
                page_title: title.to_string(),
                created_by: creator.id.clone(),
                created_by_name: creator.name.clone(),
            },
        })
    }

    /// Rename an internal page and every span referencing it
    ///
    /// Displayed text and mark attributes change in the same traversal of
    /// each tree, so no reader can observe text that disagrees with its
    /// mark metadata.
    pub fn rename_internal_page(
        &mut self,
        page_id: &str,
        new_name: &str,
        new_title: &str,
    ) -> Result<(), PlaybookError> {
        let taken_by_other = self
            .pages
            .iter()
            .any(|p| p.id != page_id && p.page_name.to_lowercase() == new_name.to_lowercase());
        if taken_by_other {
            return Err(PageError::DuplicateName(new_name.to_string()).into());
        }

        let page = self
            .pages
            .get_mut(page_id)
            .ok_or_else(|| PageError::NotFound(page_id.to_string()))?;
        page.page_name = new_name.to_string();
        page.page_title = new_title.to_string();

        rewrite_link_spans(&mut self.content, page_id, new_name, new_title);
        for page in self.pages.iter_mut() {
            rewrite_link_spans(&mut page.content, page_id, new_name, new_title);
        }
        Ok(())
    }

    /// Delete an internal page and every span referencing it
    ///
    /// The referenced object is gone, so the dangling link text is removed
    /// from every tree, not downgraded to plain text.
    pub fn delete_internal_page(&mut self, page_id: &str) -> Result<InternalPage, PlaybookError> {
        let removed = self
            .pages
            .remove(page_id)
            .ok_or_else(|| PageError::NotFound(page_id.to_string()))?;

        remove_link_spans(&mut self.content, page_id);
        for page in self.pages.iter_mut() {
            remove_link_spans(&mut page.content, page_id);
        }
        Ok(removed)
    }

    /// Number of spans referencing a page across all trees
    pub fn link_span_count(&self, page_id: &str) -> usize {
        let mut count = count_link_spans(&self.content, page_id);
        for page in self.pages.iter() {
            count += count_link_spans(&page.content, page_id);
        }
        count
    }

    /// Persist the primary document through the store boundary
    pub fn save_content(&self, store: &mut dyn PlaybookStore) -> Result<(), PlaybookError> {
        let json = document_model::to_json(&self.content)?;
        store.save_content(&self.id, &json)?;
        Ok(())
    }

    /// Reload the primary document from the store boundary
    pub fn load_content(&mut self, store: &dyn PlaybookStore) -> Result<(), PlaybookError> {
        let json = store.load_content(&self.id)?;
        self.content = document_model::from_json(&json)?;
        Ok(())
    }
}

/// Whether a node is a text leaf whose marks reference the page
fn references_page(node: &DocumentNode, page_id: &str) -> bool {
    matches!(node, DocumentNode::Text { .. })
        && node
            .marks()
            .iter()
            .any(|m| m.internal_link_page_id() == Some(page_id))
}

/// Replace displayed text and mark attrs of every referencing span
fn rewrite_link_spans(node: &mut DocumentNode, page_id: &str, new_name: &str, new_title: &str) {
    if let DocumentNode::Text { text, marks } = node {
        let mut referenced = false;
        for mark in marks.iter_mut() {
            if let Mark::InternalLink { attrs } = mark {
                if attrs.page_id == page_id {
                    attrs.page_name = new_name.to_string();
                    attrs.page_title = new_title.to_string();
                    referenced = true;
                }
            }
        }
        if referenced {
            *text = new_name.to_string();
        }
        return;
    }
    if let Some(children) = node.children_mut() {
        for child in children {
            rewrite_link_spans(child, page_id, new_name, new_title);
        }
    }
}

/// Delete every span referencing the page from this subtree
fn remove_link_spans(node: &mut DocumentNode, page_id: &str) {
    if let Some(children) = node.children_mut() {
        children.retain(|child| !references_page(child, page_id));
        for child in children {
            remove_link_spans(child, page_id);
        }
    }
}

fn count_link_spans(node: &DocumentNode, page_id: &str) -> usize {
    let mut count = 0;
    node.walk(&mut |n| {
        if references_page(n, page_id) {
            count += 1;
        }
    });
    count
}

/// In-memory store, used by tests and as a reference implementation
#[derive(Debug, Default)]
pub struct MemoryStore {
    content: HashMap<String, String>,
    pages: HashMap<String, Vec<InternalPage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaybookStore for MemoryStore {
    fn save_content(&mut self, playbook_id: &str, tree_json: &str) -> Result<(), StoreError> {
        self.content
            .insert(playbook_id.to_string(), tree_json.to_string());
        Ok(())
    }

    fn load_content(&self, playbook_id: &str) -> Result<String, StoreError> {
        self.content
            .get(playbook_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(playbook_id.to_string()))
    }

    fn save_page(&mut self, playbook_id: &str, page: &InternalPage) -> Result<(), StoreError> {
        let pages = self.pages.entry(playbook_id.to_string()).or_default();
        let collision = pages.iter().any(|p| {
            p.id != page.id && p.page_name.to_lowercase() == page.page_name.to_lowercase()
        });
        if collision {
            return Err(StoreError::DuplicateKey(page.page_name.clone()));
        }
        match pages.iter_mut().find(|p| p.id == page.id) {
            Some(existing) => *existing = page.clone(),
            None => pages.push(page.clone()),
        }
        Ok(())
    }

    fn load_pages(&self, playbook_id: &str) -> Result<Vec<InternalPage>, StoreError> {
        Ok(self.pages.get(playbook_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Editor;
    use crate::plain_text::extract_text;

    fn ada() -> UserIdentity {
        UserIdentity {
            id: "u1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        }
    }

    struct CannedGenerator(&'static str);

    impl TextGenerator for CannedGenerator {
        fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_generate_content_builds_tree() {
        let mut playbook = Playbook::new("pb-1", "Onboarding", "u1");
        let generator = CannedGenerator("# Title\n\nIntro para.\n");
        playbook.generate_content(&generator, "write it").unwrap();
        assert_eq!(playbook.content.children().len(), 2);
    }

    #[test]
    fn test_effective_description_prefers_authored() {
        let mut playbook = Playbook::new("pb-1", "T", "u1");
        playbook.content = build_document("Derived sentence here.\n");
        assert_eq!(playbook.effective_description(), "Derived sentence here.");
        playbook.description = Some("Authored.".to_string());
        assert_eq!(playbook.effective_description(), "Authored.");
    }

    #[test]
    fn test_create_page_returns_link_mark() {
        let mut playbook = Playbook::new("pb-1", "T", "u1");
        let mut store = MemoryStore::new();
        let mark = playbook
            .create_internal_page("Escalation", "Escalation steps", &ada(), &mut store)
            .unwrap();
        assert_eq!(playbook.pages().len(), 1);
        match mark {
            Mark::InternalLink { attrs } => {
                assert_eq!(attrs.page_name, "Escalation");
                assert_eq!(attrs.created_by_name, "Ada");
                assert!(playbook.page(&attrs.page_id).is_some());
            }
            other => panic!("expected internal link mark, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_create_page_precheck_rejects_duplicate() {
        let mut playbook = Playbook::new("pb-1", "T", "u1");
        let mut store = MemoryStore::new();
        playbook
            .create_internal_page("Checks", "t", &ada(), &mut store)
            .unwrap();
        let err = playbook
            .create_internal_page("checks", "t", &ada(), &mut store)
            .unwrap_err();
        assert!(matches!(err, PlaybookError::Page(PageError::DuplicateName(_))));
    }

    #[test]
    fn test_create_page_race_resyncs_from_store() {
        let mut playbook = Playbook::new("pb-1", "T", "u1");
        let mut store = MemoryStore::new();
        // Another client created the page directly in the store, so the
        // local pre-check passes but the store reports a duplicate key.
        store
            .save_page("pb-1", &InternalPage::new("pg-other", "Checks", "t", "u2"))
            .unwrap();

        let err = playbook
            .create_internal_page("Checks", "t", &ada(), &mut store)
            .unwrap_err();
        assert!(matches!(err, PlaybookError::DuplicatePageRace { .. }));
        // Local pages were reloaded rather than left stale
        assert_eq!(playbook.pages().len(), 1);
        assert_eq!(playbook.pages().iter().next().unwrap().id, "pg-other");
    }

    /// A playbook with one page and link spans in the primary document
    /// and inside another page
    fn playbook_with_links() -> (Playbook, String) {
        let mut playbook = Playbook::new("pb-1", "T", "u1");
        let mut store = MemoryStore::new();
        let mark = playbook
            .create_internal_page("Escalation", "Escalation", &ada(), &mut store)
            .unwrap();
        let page_id = match &mark {
            Mark::InternalLink { attrs } => attrs.page_id.clone(),
            _ => unreachable!(),
        };

        let mut editor = Editor::new(build_document("see below\n"));
        editor.set_selection(9, 9);
        editor.apply_internal_link(mark.clone()).unwrap();
        playbook.content = editor.into_doc();

        let second_mark = playbook
            .create_internal_page("Runbook", "Runbook", &ada(), &mut store)
            .unwrap();
        let runbook_id = match &second_mark {
            Mark::InternalLink { attrs } => attrs.page_id.clone(),
            _ => unreachable!(),
        };
        // Reference the first page from inside the second page's tree
        let mut page_editor = Editor::new(build_document("escalate via\n"));
        page_editor.set_selection(12, 12);
        page_editor.apply_internal_link(mark).unwrap();
        playbook.page_mut(&runbook_id).unwrap().content = page_editor.into_doc();

        (playbook, page_id)
    }

    #[test]
    fn test_rename_updates_text_and_attrs_everywhere() {
        let (mut playbook, page_id) = playbook_with_links();
        assert_eq!(playbook.link_span_count(&page_id), 2);

        playbook
            .rename_internal_page(&page_id, "Paging", "Paging policy")
            .unwrap();

        assert!(extract_text(&playbook.content).contains("Paging"));
        assert!(!extract_text(&playbook.content).contains("Escalation"));
        let mut attr_names = Vec::new();
        playbook.content.walk(&mut |node| {
            for mark in node.marks() {
                if let Mark::InternalLink { attrs } = mark {
                    attr_names.push((attrs.page_name.clone(), attrs.page_title.clone()));
                }
            }
        });
        assert_eq!(
            attr_names,
            vec![("Paging".to_string(), "Paging policy".to_string())]
        );
        // The span inside the other page was rewritten too
        let runbook = playbook
            .pages()
            .iter()
            .find(|p| p.page_name == "Runbook")
            .unwrap();
        assert!(extract_text(&runbook.content).contains("Paging"));
    }

    #[test]
    fn test_rename_rejects_name_taken_by_other_page() {
        let (mut playbook, page_id) = playbook_with_links();
        let err = playbook
            .rename_internal_page(&page_id, "runbook", "t")
            .unwrap_err();
        assert!(matches!(err, PlaybookError::Page(PageError::DuplicateName(_))));
    }

    #[test]
    fn test_rename_after_rejected_style_edit_keeps_single_occurrence() {
        let (mut playbook, page_id) = playbook_with_links();
        // Primary text is "see belowEscalation" with the link at 9..19;
        // styling across it is rejected, so the span is never split and a
        // rename rewrites its displayed name exactly once.
        let mut editor = Editor::new(playbook.content.clone());
        assert!(editor.apply_mark(5, 14, Mark::Bold).is_err());
        playbook.content = editor.into_doc();

        playbook
            .rename_internal_page(&page_id, "Paging", "Paging policy")
            .unwrap();
        let text = extract_text(&playbook.content);
        assert_eq!(text.matches("Paging").count(), 1);
    }

    #[test]
    fn test_delete_page_removes_all_spans() {
        let (mut playbook, page_id) = playbook_with_links();
        assert_eq!(playbook.link_span_count(&page_id), 2);

        playbook.delete_internal_page(&page_id).unwrap();

        assert_eq!(playbook.link_span_count(&page_id), 0);
        assert!(!extract_text(&playbook.content).contains("Escalation"));
        for page in playbook.pages().iter() {
            assert!(!extract_text(&page.content).contains("Escalation"));
        }
    }

    #[test]
    fn test_delete_missing_page_is_not_found() {
        let mut playbook = Playbook::new("pb-1", "T", "u1");
        let err = playbook.delete_internal_page("pg-404").unwrap_err();
        assert!(matches!(err, PlaybookError::Page(PageError::NotFound(_))));
    }

    #[test]
    fn test_save_and_load_content_roundtrip() {
        let mut playbook = Playbook::new("pb-1", "T", "u1");
        playbook.content = build_document("# Title\n\nBody.\n");
        let mut store = MemoryStore::new();
        playbook.save_content(&mut store).unwrap();

        let mut restored = Playbook::new("pb-1", "T", "u1");
        restored.load_content(&store).unwrap();
        assert_eq!(restored.content, playbook.content);
    }
}
