//! Internal pages of a playbook
//!
//! An internal page is an independently-editable secondary document tree,
//! addressable by id and referenced from other trees by internal-link
//! marks. Page names are unique within a playbook, compared
//! case-insensitively.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document_model::DocumentNode;

/// Access level a user holds on an internal page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Owner,
    Edit,
    View,
}

/// One user's access to a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePermission {
    pub user_id: String,
    pub permission_level: PermissionLevel,
}

/// An independently-editable secondary document owned by a playbook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalPage {
    pub id: String,
    /// Unique per playbook, case-insensitively
    pub page_name: String,
    pub page_title: String,
    /// The page's own document tree
    pub content: DocumentNode,
    /// Id of the creating user
    pub created_by: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<PagePermission>,
}

impl InternalPage {
    /// Create a page with an empty document, owned by its creator
    pub fn new(id: &str, name: &str, title: &str, created_by: &str) -> Self {
        Self {
            id: id.to_string(),
            page_name: name.to_string(),
            page_title: title.to_string(),
            content: DocumentNode::empty_doc(),
            created_by: created_by.to_string(),
            permissions: vec![PagePermission {
                user_id: created_by.to_string(),
                permission_level: PermissionLevel::Owner,
            }],
        }
    }
}

/// Errors for page collection operations
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PageError {
    /// Name already in use (case-insensitive); user-correctable
    #[error("an internal page named '{0}' already exists")]
    DuplicateName(String),

    #[error("internal page '{0}' not found")]
    NotFound(String),
}

/// The ordered-by-creation set of a playbook's internal pages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSet {
    pages: Vec<InternalPage>,
}

impl PageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pages in creation order
    pub fn iter(&self) -> impl Iterator<Item = &InternalPage> {
        self.pages.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut InternalPage> {
        self.pages.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&InternalPage> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut InternalPage> {
        self.pages.iter_mut().find(|p| p.id == id)
    }

    /// Whether a name is already taken, compared case-insensitively
    pub fn name_taken(&self, name: &str) -> bool {
        let lowered = name.to_lowercase();
        self.pages.iter().any(|p| p.page_name.to_lowercase() == lowered)
    }

    /// Add a page, enforcing name uniqueness
    pub fn add(&mut self, page: InternalPage) -> Result<(), PageError> {
        if self.name_taken(&page.page_name) {
            return Err(PageError::DuplicateName(page.page_name));
        }
        self.pages.push(page);
        Ok(())
    }

    /// Remove a page by id, returning it if present
    pub fn remove(&mut self, id: &str) -> Option<InternalPage> {
        let index = self.pages.iter().position(|p| p.id == id)?;
        Some(self.pages.remove(index))
    }

    /// Replace the whole set from a store reload (duplicate-key resync)
    pub fn replace_all(&mut self, pages: Vec<InternalPage>) {
        self.pages = pages;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup() {
        let mut set = PageSet::new();
        set.add(InternalPage::new("pg-1", "Escalation", "Escalation steps", "u1"))
            .unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("pg-1").unwrap().page_name, "Escalation");
        assert!(set.get("pg-2").is_none());
    }

    #[test]
    fn test_duplicate_name_is_case_insensitive() {
        let mut set = PageSet::new();
        set.add(InternalPage::new("pg-1", "Escalation", "t", "u1"))
            .unwrap();
        let err = set
            .add(InternalPage::new("pg-2", "ESCALATION", "t", "u1"))
            .unwrap_err();
        assert_eq!(err, PageError::DuplicateName("ESCALATION".to_string()));
    }

    #[test]
    fn test_creator_gets_owner_permission() {
        let page = InternalPage::new("pg-1", "Checks", "t", "u9");
        assert_eq!(page.permissions.len(), 1);
        assert_eq!(page.permissions[0].user_id, "u9");
        assert_eq!(page.permissions[0].permission_level, PermissionLevel::Owner);
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut set = PageSet::new();
        for (id, name) in [("a", "one"), ("b", "two"), ("c", "three")] {
            set.add(InternalPage::new(id, name, "t", "u1")).unwrap();
        }
        set.remove("b");
        let ids: Vec<&str> = set.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_permission_level_wire_names() {
        let json = serde_json::to_string(&PermissionLevel::Owner).unwrap();
        assert_eq!(json, "\"owner\"");
    }
}
