//! Document tree and mark layer for playbook content
//!
//! This module defines the recursive rich-text structure a playbook body is
//! made of: block nodes (headings, paragraphs, lists, blockquotes), atomic
//! nodes (attachments) and text leaves carrying marks. The serde shape of
//! these types is the wire/persisted format: a tagged `type`, an `attrs`
//! bag, ordered `content` children, or a leaf `text` plus `marks`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A node in the document tree
///
/// The serialized form is the persisted format and must round-trip exactly,
/// so variant and attribute names here are wire names, not display names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DocumentNode {
    /// Root node, holds ordered block-level children
    Doc {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<DocumentNode>,
    },
    /// Heading, level 1-4, holds inline children
    Heading {
        attrs: HeadingAttrs,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<DocumentNode>,
    },
    /// Paragraph, holds inline children
    Paragraph {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<DocumentNode>,
    },
    /// Unordered list, holds list items
    BulletList {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<DocumentNode>,
    },
    /// Ordered list, holds list items
    OrderedList {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<DocumentNode>,
    },
    /// Single list item, holds block-level children
    ListItem {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<DocumentNode>,
    },
    /// Block quote, holds block-level children
    Blockquote {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<DocumentNode>,
    },
    /// Horizontal rule, no children, no attributes
    HorizontalRule,
    /// Atomic attachment node, attributes only, never any children
    Attachment { attrs: AttachmentAttrs },
    /// Text leaf with an ordered set of marks
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        marks: Vec<Mark>,
    },
}

/// Attributes for heading nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadingAttrs {
    /// Heading level, 1 through 4
    pub level: u8,
}

/// Attributes carried by an attachment node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentAttrs {
    /// Original file name as uploaded
    pub file_name: String,
    /// Opaque payload reference: a data URI or an external URL
    pub file_url: String,
    /// File size in bytes
    pub file_size: u64,
    /// MIME type or extension string
    pub file_type: String,
    /// Upload instant, ISO-8601
    pub upload_date: String,
}

/// An annotation applied to a run of text
///
/// Marks are attribute bags attached to text leaves, not standalone nodes.
/// Multiple marks may coexist on the same leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Code,
    Highlight { attrs: HighlightAttrs },
    TextColor { attrs: TextColorAttrs },
    FontFamily { attrs: FontFamilyAttrs },
    TextAlign { attrs: TextAlignAttrs },
    Link { attrs: LinkAttrs },
    /// Assignment of the marked span to one or more people
    Assignment { attrs: AssignmentAttrs },
    /// Reference to an internal page; the marked span is immutable
    InternalLink { attrs: InternalLinkAttrs },
}

/// Attributes for highlight marks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightAttrs {
    /// Highlight color, hex string
    pub color: String,
}

/// Attributes for text color marks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextColorAttrs {
    /// Text color, hex string
    pub color: String,
}

/// Attributes for font family marks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontFamilyAttrs {
    pub font_family: String,
}

/// Attributes for text alignment marks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAlignAttrs {
    /// One of "left", "center", "right", "justify"
    pub align: String,
}

/// Attributes for hyperlink marks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkAttrs {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// One person an assignment mark points at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignee {
    /// Stable identity-provider id
    pub id: String,
    /// Display name at assignment time
    pub name: String,
}

/// Attributes for assignment marks
///
/// Assignees are an ordered list of `{id, name}` pairs. The persisted format
/// carries them as a proper array, never as delimiter-joined strings, so
/// names containing commas need no escaping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentAttrs {
    pub assignees: Vec<Assignee>,
    /// Due instant, ISO-8601
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    /// Badge color, hex string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_color: Option<String>,
}

/// Attributes for internal-link marks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalLinkAttrs {
    /// Id of the internal page this span points at
    pub page_id: String,
    pub page_name: String,
    pub page_title: String,
    /// Id of the user who created the link
    pub created_by: String,
    pub created_by_name: String,
}

impl Mark {
    /// Wire name of this mark's type tag
    pub fn type_name(&self) -> &'static str {
        match self {
            Mark::Bold => "bold",
            Mark::Italic => "italic",
            Mark::Underline => "underline",
            Mark::Code => "code",
            Mark::Highlight { .. } => "highlight",
            Mark::TextColor { .. } => "textColor",
            Mark::FontFamily { .. } => "fontFamily",
            Mark::TextAlign { .. } => "textAlign",
            Mark::Link { .. } => "link",
            Mark::Assignment { .. } => "assignment",
            Mark::InternalLink { .. } => "internalLink",
        }
    }

    /// Page id if this is an internal-link mark
    pub fn internal_link_page_id(&self) -> Option<&str> {
        match self {
            Mark::InternalLink { attrs } => Some(&attrs.page_id),
            _ => None,
        }
    }
}

impl DocumentNode {
    /// Create an empty document root
    pub fn empty_doc() -> Self {
        DocumentNode::Doc {
            content: Vec::new(),
        }
    }

    /// Create a plain text leaf with no marks
    pub fn text<S: Into<String>>(text: S) -> Self {
        DocumentNode::Text {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    /// Create a paragraph holding a single plain text leaf
    pub fn paragraph_of<S: Into<String>>(text: S) -> Self {
        DocumentNode::Paragraph {
            content: vec![DocumentNode::text(text)],
        }
    }

    /// Create a heading holding a single plain text leaf
    pub fn heading_of<S: Into<String>>(level: u8, text: S) -> Self {
        DocumentNode::Heading {
            attrs: HeadingAttrs { level },
            content: vec![DocumentNode::text(text)],
        }
    }

    /// Wire name of this node's type tag
    pub fn type_name(&self) -> &'static str {
        match self {
            DocumentNode::Doc { .. } => "doc",
            DocumentNode::Heading { .. } => "heading",
            DocumentNode::Paragraph { .. } => "paragraph",
            DocumentNode::BulletList { .. } => "bulletList",
            DocumentNode::OrderedList { .. } => "orderedList",
            DocumentNode::ListItem { .. } => "listItem",
            DocumentNode::Blockquote { .. } => "blockquote",
            DocumentNode::HorizontalRule => "horizontalRule",
            DocumentNode::Attachment { .. } => "attachment",
            DocumentNode::Text { .. } => "text",
        }
    }

    /// Ordered children of this node; empty for leaves and atomic nodes
    pub fn children(&self) -> &[DocumentNode] {
        match self {
            DocumentNode::Doc { content }
            | DocumentNode::Heading { content, .. }
            | DocumentNode::Paragraph { content }
            | DocumentNode::BulletList { content }
            | DocumentNode::OrderedList { content }
            | DocumentNode::ListItem { content }
            | DocumentNode::Blockquote { content } => content,
            DocumentNode::HorizontalRule
            | DocumentNode::Attachment { .. }
            | DocumentNode::Text { .. } => &[],
        }
    }

    /// Mutable children, or None for leaves and atomic nodes
    pub fn children_mut(&mut self) -> Option<&mut Vec<DocumentNode>> {
        match self {
            DocumentNode::Doc { content }
            | DocumentNode::Heading { content, .. }
            | DocumentNode::Paragraph { content }
            | DocumentNode::BulletList { content }
            | DocumentNode::OrderedList { content }
            | DocumentNode::ListItem { content }
            | DocumentNode::Blockquote { content } => Some(content),
            DocumentNode::HorizontalRule
            | DocumentNode::Attachment { .. }
            | DocumentNode::Text { .. } => None,
        }
    }

    /// Whether this node may appear at block level
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            DocumentNode::Heading { .. }
                | DocumentNode::Paragraph { .. }
                | DocumentNode::BulletList { .. }
                | DocumentNode::OrderedList { .. }
                | DocumentNode::Blockquote { .. }
                | DocumentNode::HorizontalRule
        )
    }

    /// Whether this node may appear in inline position
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            DocumentNode::Text { .. } | DocumentNode::Attachment { .. }
        )
    }

    /// Marks on this node; empty unless it is a text leaf
    pub fn marks(&self) -> &[Mark] {
        match self {
            DocumentNode::Text { marks, .. } => marks,
            _ => &[],
        }
    }

    /// Depth-first preorder walk over this subtree
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a DocumentNode)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    /// All nodes of this subtree in document (depth-first preorder) order
    ///
    /// The index into this list is a node's positional identity: two nodes
    /// with equal content at different positions are distinct nodes.
    pub fn flatten(&self) -> Vec<&DocumentNode> {
        let mut nodes = Vec::new();
        self.walk(&mut |node| nodes.push(node));
        nodes
    }

    /// Total character count of all text leaves in document order
    pub fn text_len(&self) -> usize {
        let mut len = 0;
        self.walk(&mut |node| {
            if let DocumentNode::Text { text, .. } = node {
                len += text.chars().count();
            }
        });
        len
    }

    /// Validate structural invariants of the tree
    ///
    /// # Returns
    /// * `Ok(())` - every node's children are well-typed for its position
    /// * `Err(TreeValidationError)` - one or more violations, all collected
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let mut violations = Vec::new();
        self.collect_violations(&mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(TreeValidationError::Multiple(violations))
        }
    }

    fn collect_violations(&self, violations: &mut Vec<TreeViolation>) {
        match self {
            DocumentNode::Doc { content } => {
                for child in content {
                    if !child.is_block() {
                        violations.push(TreeViolation::InvalidChild {
                            parent: "doc",
                            child: child.type_name(),
                        });
                    }
                }
            }
            DocumentNode::Heading { attrs, content } => {
                if !(1..=4).contains(&attrs.level) {
                    violations.push(TreeViolation::HeadingLevel { level: attrs.level });
                }
                for child in content {
                    if !child.is_inline() {
                        violations.push(TreeViolation::InvalidChild {
                            parent: "heading",
                            child: child.type_name(),
                        });
                    }
                }
            }
            DocumentNode::Paragraph { content } => {
                for child in content {
                    if !child.is_inline() {
                        violations.push(TreeViolation::InvalidChild {
                            parent: "paragraph",
                            child: child.type_name(),
                        });
                    }
                }
            }
            DocumentNode::BulletList { content } | DocumentNode::OrderedList { content } => {
                for child in content {
                    if !matches!(child, DocumentNode::ListItem { .. }) {
                        violations.push(TreeViolation::InvalidChild {
                            parent: self.type_name(),
                            child: child.type_name(),
                        });
                    }
                }
            }
            DocumentNode::ListItem { content } | DocumentNode::Blockquote { content } => {
                for child in content {
                    if !child.is_block() {
                        violations.push(TreeViolation::InvalidChild {
                            parent: self.type_name(),
                            child: child.type_name(),
                        });
                    }
                }
            }
            DocumentNode::HorizontalRule
            | DocumentNode::Attachment { .. }
            | DocumentNode::Text { .. } => {}
        }

        for child in self.children() {
            child.collect_violations(violations);
        }
    }
}

/// A single structural violation found during validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeViolation {
    /// A child node type not allowed under its parent
    InvalidChild {
        parent: &'static str,
        child: &'static str,
    },
    /// Heading level outside 1..=4
    HeadingLevel { level: u8 },
}

impl std::fmt::Display for TreeViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeViolation::InvalidChild { parent, child } => {
                write!(f, "node '{}' may not contain '{}'", parent, child)
            }
            TreeViolation::HeadingLevel { level } => {
                write!(f, "heading level {} is outside 1..=4", level)
            }
        }
    }
}

/// Errors produced by tree validation
#[derive(Error, Debug)]
pub enum TreeValidationError {
    #[error("document structure invalid:\n{}", .0.iter().map(|v| format!("  - {}", v)).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<TreeViolation>),
}

/// Serialize a tree to its persisted JSON form
pub fn to_json(node: &DocumentNode) -> Result<String, serde_json::Error> {
    serde_json::to_string(node)
}

/// Deserialize a tree from its persisted JSON form
pub fn from_json(json: &str) -> Result<DocumentNode, serde_json::Error> {
    serde_json::from_str(json)
}
