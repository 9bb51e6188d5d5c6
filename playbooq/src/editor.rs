//! Editing session over a single document tree
//!
//! One editor owns one tree at a time; every mutation goes through its
//! command methods, so edits are serialized by construction. Positions are
//! character offsets into the document's text linearization; atomic nodes
//! (attachments) are addressed by their depth-first node index instead,
//! because their identity is positional, never by-value.
//!
//! Spans marked with an internal link are immutable: any edit whose
//! effective range intersects such a span is rejected with a recoverable
//! error, including backspace and delete at the exact boundary character.

use thiserror::Error;

use crate::document_model::{AttachmentAttrs, DocumentNode, Mark};

/// Handler invoked when rendered internal-link text is activated
///
/// Injected per editing session at construction; never shared global
/// state, so two open documents cannot leak handlers into each other.
pub type LinkClickHandler = Box<dyn FnMut(&str)>;

/// Errors surfaced to the editing surface
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EditError {
    /// The edit touches a span that belongs to an internal page link
    #[error("'{page_name}' is an internal page link and cannot be edited; delete the page to remove it")]
    LockedSpan { page_name: String },

    /// Offset past the end of the document text
    #[error("position {position} is beyond the document end ({len})")]
    OutOfBounds { position: usize, len: usize },

    /// Internal-link marks are only removed by deleting their page
    #[error("internal page links cannot be removed by unmarking; delete the page instead")]
    UnremovableLink,
}

/// Range of one text leaf in the character linearization
#[derive(Debug, Clone)]
struct LeafSpan {
    start: usize,
    end: usize,
    path: Vec<usize>,
}

/// An editing session over one document tree
pub struct Editor {
    doc: DocumentNode,
    selection: (usize, usize),
    undo_stack: Vec<DocumentNode>,
    redo_stack: Vec<DocumentNode>,
    link_click: Option<LinkClickHandler>,
}

impl Editor {
    /// Open an editing session on a document
    pub fn new(doc: DocumentNode) -> Self {
        Self {
            doc,
            selection: (0, 0),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            link_click: None,
        }
    }

    /// Open a session with an injected link-activation handler
    pub fn with_link_handler(doc: DocumentNode, handler: LinkClickHandler) -> Self {
        let mut editor = Self::new(doc);
        editor.link_click = Some(handler);
        editor
    }

    /// The current document tree
    pub fn doc(&self) -> &DocumentNode {
        &self.doc
    }

    /// Surrender the document, ending the session
    pub fn into_doc(self) -> DocumentNode {
        self.doc
    }

    /// Current selection as (from, to) character offsets
    pub fn selection(&self) -> (usize, usize) {
        self.selection
    }

    /// Set the selection, clamped to the document text length
    pub fn set_selection(&mut self, from: usize, to: usize) {
        let len = self.doc.text_len();
        let from = from.min(len);
        let to = to.min(len).max(from);
        self.selection = (from, to);
    }

    // ---- text commands -------------------------------------------------

    /// Insert text at a character offset
    ///
    /// Insertion strictly inside a locked span is rejected. At a boundary
    /// the text joins the unlocked side, so a locked span never grows.
    pub fn insert_text(&mut self, offset: usize, text: &str) -> Result<(), EditError> {
        if text.is_empty() {
            return Ok(());
        }
        let len = self.doc.text_len();
        if offset > len {
            return Err(EditError::OutOfBounds {
                position: offset,
                len,
            });
        }

        let spans = self.leaf_spans();

        // Strictly inside a leaf: splice, unless the leaf is locked.
        if let Some(span) = spans
            .iter()
            .find(|s| s.start < offset && offset < s.end)
        {
            if let Some(page_name) = locked_page_name(leaf_at(&self.doc, &span.path)) {
                return Err(EditError::LockedSpan { page_name });
            }
            self.snapshot();
            let local = offset - span.start;
            let path = span.path.clone();
            if let DocumentNode::Text { text: leaf_text, .. } = leaf_mut(&mut self.doc, &path) {
                let byte = char_to_byte(leaf_text, local);
                leaf_text.insert_str(byte, text);
            }
            return Ok(());
        }

        // Boundary: prefer the left leaf, falling back to the right one
        // when the left is locked, then to a fresh leaf.
        let left = spans.iter().find(|s| s.end == offset).cloned();
        let right = spans.iter().find(|s| s.start == offset).cloned();

        if let Some(ref span) = left {
            if locked_page_name(leaf_at(&self.doc, &span.path)).is_none() {
                self.snapshot();
                let path = span.path.clone();
                if let DocumentNode::Text { text: leaf_text, .. } =
                    leaf_mut(&mut self.doc, &path)
                {
                    leaf_text.push_str(text);
                }
                return Ok(());
            }
        }
        if let Some(ref span) = right {
            if locked_page_name(leaf_at(&self.doc, &span.path)).is_none() {
                self.snapshot();
                let path = span.path.clone();
                if let DocumentNode::Text { text: leaf_text, .. } =
                    leaf_mut(&mut self.doc, &path)
                {
                    leaf_text.insert_str(0, text);
                }
                return Ok(());
            }
        }

        // Both neighbors locked, or the document has no text yet.
        self.snapshot();
        match (left, right) {
            (Some(span), _) => {
                // Fresh unmarked leaf after the locked left neighbor.
                let (parent_path, index) = split_path(&span.path);
                let parent = node_mut(&mut self.doc, parent_path);
                if let Some(children) = parent.children_mut() {
                    children.insert(index + 1, DocumentNode::text(text));
                }
            }
            (None, Some(span)) => {
                let (parent_path, index) = split_path(&span.path);
                let parent = node_mut(&mut self.doc, parent_path);
                if let Some(children) = parent.children_mut() {
                    children.insert(index, DocumentNode::text(text));
                }
            }
            (None, None) => {
                // Empty document: start a paragraph.
                if let Some(children) = self.doc.children_mut() {
                    children.push(DocumentNode::paragraph_of(text));
                }
            }
        }
        Ok(())
    }

    /// Delete the character range [from, to)
    pub fn delete_range(&mut self, from: usize, to: usize) -> Result<(), EditError> {
        let len = self.doc.text_len();
        if to > len {
            return Err(EditError::OutOfBounds { position: to, len });
        }
        if from >= to {
            return Ok(());
        }
        self.guard_range(from, to)?;
        self.snapshot();
        self.delete_range_unchecked(from, to);
        Ok(())
    }

    /// Backspace: delete the character before the caret
    ///
    /// Inspects the mark set at the exact boundary character, so a locked
    /// span cannot be eroded right-to-left one keystroke at a time.
    pub fn backspace(&mut self, caret: usize) -> Result<(), EditError> {
        if caret == 0 {
            return Ok(());
        }
        self.delete_range(caret - 1, caret)
    }

    /// Delete key: delete the character after the caret
    pub fn delete_forward(&mut self, caret: usize) -> Result<(), EditError> {
        if caret >= self.doc.text_len() {
            return Ok(());
        }
        self.delete_range(caret, caret + 1)
    }

    // ---- mark commands -------------------------------------------------

    /// Add a formatting mark to the character range [from, to)
    ///
    /// Leaves partially covered by the range are split so the mark applies
    /// to exactly the requested characters. A range intersecting a locked
    /// span is rejected whole; splitting a locked leaf would leave two
    /// spans referencing the same page.
    pub fn apply_mark(&mut self, from: usize, to: usize, mark: Mark) -> Result<(), EditError> {
        if from >= to {
            return Ok(());
        }
        let len = self.doc.text_len();
        if to > len {
            return Err(EditError::OutOfBounds { position: to, len });
        }
        self.guard_range(from, to)?;
        self.snapshot();
        self.split_leaf_at(to);
        self.split_leaf_at(from);
        for span in self.leaf_spans() {
            if span.start >= from && span.end <= to {
                if let DocumentNode::Text { marks, .. } = leaf_mut(&mut self.doc, &span.path) {
                    if !marks.iter().any(|m| m.type_name() == mark.type_name()) {
                        marks.push(mark.clone());
                    }
                }
            }
        }
        Ok(())
    }

    /// Remove all marks of a type from the character range [from, to)
    ///
    /// Internal-link marks are refused outright: unmarking one would leave
    /// its span deletable while the page still exists. The only way such a
    /// mark disappears is page deletion, which removes the whole span.
    pub fn remove_mark(
        &mut self,
        from: usize,
        to: usize,
        mark_type: &str,
    ) -> Result<(), EditError> {
        if mark_type == "internalLink" {
            return Err(EditError::UnremovableLink);
        }
        if from >= to {
            return Ok(());
        }
        let len = self.doc.text_len();
        if to > len {
            return Err(EditError::OutOfBounds { position: to, len });
        }
        self.guard_range(from, to)?;
        self.snapshot();
        self.split_leaf_at(to);
        self.split_leaf_at(from);
        for span in self.leaf_spans() {
            if span.start >= from && span.end <= to {
                if let DocumentNode::Text { marks, .. } = leaf_mut(&mut self.doc, &span.path) {
                    marks.retain(|m| m.type_name() != mark_type);
                }
            }
        }
        Ok(())
    }

    /// Marks present at the character offset, if any text is there
    pub fn marks_at(&self, offset: usize) -> Vec<Mark> {
        for span in self.leaf_spans() {
            if span.start <= offset && offset < span.end {
                return leaf_at(&self.doc, &span.path).marks().to_vec();
            }
        }
        Vec::new()
    }

    // ---- block commands ------------------------------------------------

    /// Append a heading block to the document
    pub fn append_heading(&mut self, level: u8, text: &str) {
        self.snapshot();
        if let Some(children) = self.doc.children_mut() {
            children.push(DocumentNode::heading_of(level, text));
        }
    }

    /// Append a paragraph block to the document
    pub fn append_paragraph(&mut self, text: &str) {
        self.snapshot();
        if let Some(children) = self.doc.children_mut() {
            children.push(DocumentNode::paragraph_of(text));
        }
    }

    /// Append a bullet list with one item per entry
    pub fn append_bullet_list(&mut self, items: &[&str]) {
        self.snapshot();
        let list = DocumentNode::BulletList {
            content: items
                .iter()
                .map(|text| DocumentNode::ListItem {
                    content: vec![DocumentNode::paragraph_of(*text)],
                })
                .collect(),
        };
        if let Some(children) = self.doc.children_mut() {
            children.push(list);
        }
    }

    /// Split the block containing the offset in two (the Enter key)
    ///
    /// The first half keeps the block's kind; the remainder becomes a
    /// paragraph. Splitting strictly inside a locked span is rejected like
    /// any other edit there; at a span boundary the split falls between
    /// leaves and the span stays whole.
    pub fn split_block(&mut self, offset: usize) -> Result<(), EditError> {
        let len = self.doc.text_len();
        if offset > len {
            return Err(EditError::OutOfBounds {
                position: offset,
                len,
            });
        }
        let spans = self.leaf_spans();
        if let Some(span) = spans.iter().find(|s| s.start < offset && offset < s.end) {
            if let Some(page_name) = locked_page_name(leaf_at(&self.doc, &span.path)) {
                log::warn!("rejected block split inside internal-link span '{}'", page_name);
                return Err(EditError::LockedSpan { page_name });
            }
        }
        self.snapshot();
        self.split_leaf_at(offset);

        let spans = self.leaf_spans();
        let (block_path, leaf_index) = if let Some(span) =
            spans.iter().find(|s| s.start == offset)
        {
            let (parent, index) = split_path(&span.path);
            (parent.to_vec(), index)
        } else if let Some(span) = spans.iter().filter(|s| s.end == offset).next_back() {
            let (parent, index) = split_path(&span.path);
            (parent.to_vec(), index + 1)
        } else {
            // No text anywhere: open a fresh paragraph.
            if let Some(children) = self.doc.children_mut() {
                children.push(DocumentNode::Paragraph {
                    content: Vec::new(),
                });
            }
            return Ok(());
        };
        if block_path.is_empty() {
            return Ok(());
        }

        let tail: Vec<DocumentNode> = match node_mut(&mut self.doc, &block_path).children_mut() {
            Some(children) => children.drain(leaf_index..).collect(),
            None => return Ok(()),
        };
        let (parent_path, block_index) = split_path(&block_path);
        let parent = node_mut(&mut self.doc, parent_path);
        if let Some(children) = parent.children_mut() {
            children.insert(block_index + 1, DocumentNode::Paragraph { content: tail });
        }
        Ok(())
    }

    // ---- internal links ------------------------------------------------

    /// Attach an internal-link mark at the selection
    ///
    /// A non-empty selection is marked in place; an empty one gets a fresh
    /// text run equal to the page name, inserted at the caret.
    pub fn apply_internal_link(&mut self, mark: Mark) -> Result<(), EditError> {
        let page_name = match &mark {
            Mark::InternalLink { attrs } => attrs.page_name.clone(),
            _ => return Ok(()),
        };
        let (from, to) = self.selection;
        if from < to {
            self.apply_mark(from, to, mark)
        } else {
            self.snapshot();
            self.split_leaf_at(from);
            let linked = DocumentNode::Text {
                text: page_name,
                marks: vec![mark],
            };
            self.insert_inline_at(from, linked);
            Ok(())
        }
    }

    /// Activate the link at a character offset
    ///
    /// Dispatches the page id to the injected handler and returns it.
    pub fn click_link_at(&mut self, offset: usize) -> Option<String> {
        let page_id = self
            .marks_at(offset)
            .iter()
            .find_map(|m| m.internal_link_page_id().map(str::to_string))?;
        if let Some(handler) = self.link_click.as_mut() {
            handler(&page_id);
        }
        Some(page_id)
    }

    // ---- attachments ---------------------------------------------------

    /// Attachments with their depth-first node indexes, in document order
    pub fn attachments(&self) -> Vec<(usize, AttachmentAttrs)> {
        self.doc
            .flatten()
            .into_iter()
            .enumerate()
            .filter_map(|(index, node)| match node {
                DocumentNode::Attachment { attrs } => Some((index, attrs.clone())),
                _ => None,
            })
            .collect()
    }

    /// Insert an attachment node at the caret position
    pub fn insert_attachment(&mut self, attrs: AttachmentAttrs) -> Result<(), EditError> {
        let caret = self.selection.0;
        let len = self.doc.text_len();
        if caret > len {
            return Err(EditError::OutOfBounds {
                position: caret,
                len,
            });
        }
        self.snapshot();
        self.split_leaf_at(caret);
        self.insert_inline_at(caret, DocumentNode::Attachment { attrs });
        Ok(())
    }

    /// Delete the attachment at an exact depth-first node index
    ///
    /// Identity is positional: a same-content sibling at another index is
    /// never touched. A stale index is an idempotent no-op.
    ///
    /// # Returns
    /// * `true` - an attachment was removed at that index
    /// * `false` - nothing at that index was an attachment
    pub fn delete_attachment_at(&mut self, node_index: usize) -> bool {
        let Some(path) = attachment_path_at(&self.doc, node_index) else {
            return false;
        };
        self.snapshot();
        let (parent_path, index) = split_path(&path);
        let parent = node_mut(&mut self.doc, parent_path);
        if let Some(children) = parent.children_mut() {
            children.remove(index);
            true
        } else {
            false
        }
    }

    /// Delete every attachment in the document
    ///
    /// Positions are scanned once and removed back to front so earlier
    /// removals cannot invalidate later ones within the same command.
    pub fn delete_all_attachments(&mut self) -> usize {
        let indexes: Vec<usize> = self.attachments().iter().map(|(i, _)| *i).collect();
        let mut removed = 0;
        if indexes.is_empty() {
            return 0;
        }
        self.snapshot();
        for index in indexes.into_iter().rev() {
            if let Some(path) = attachment_path_at(&self.doc, index) {
                let (parent_path, child_index) = split_path(&path);
                let parent = node_mut(&mut self.doc, parent_path);
                if let Some(children) = parent.children_mut() {
                    children.remove(child_index);
                    removed += 1;
                }
            }
        }
        removed
    }

    // ---- undo / redo ---------------------------------------------------

    /// Undo the most recent command
    pub fn undo(&mut self) -> bool {
        match self.undo_stack.pop() {
            Some(previous) => {
                self.redo_stack.push(self.doc.clone());
                self.doc = previous;
                self.clamp_selection();
                true
            }
            None => false,
        }
    }

    /// Redo the most recently undone command
    pub fn redo(&mut self) -> bool {
        match self.redo_stack.pop() {
            Some(next) => {
                self.undo_stack.push(self.doc.clone());
                self.doc = next;
                self.clamp_selection();
                true
            }
            None => false,
        }
    }

    // ---- internals -----------------------------------------------------

    fn snapshot(&mut self) {
        self.undo_stack.push(self.doc.clone());
        self.redo_stack.clear();
    }

    fn clamp_selection(&mut self) {
        let (from, to) = self.selection;
        self.set_selection(from, to);
    }

    fn leaf_spans(&self) -> Vec<LeafSpan> {
        let mut spans = Vec::new();
        let mut pos = 0;
        collect_leaf_spans(&self.doc, &mut Vec::new(), &mut pos, &mut spans);
        spans
    }

    /// Reject the edit when [from, to) touches any locked character
    fn guard_range(&self, from: usize, to: usize) -> Result<(), EditError> {
        for span in self.leaf_spans() {
            if span.start < to && from < span.end {
                if let Some(page_name) = locked_page_name(leaf_at(&self.doc, &span.path)) {
                    log::warn!("rejected edit into internal-link span '{}'", page_name);
                    return Err(EditError::LockedSpan { page_name });
                }
            }
        }
        Ok(())
    }

    fn delete_range_unchecked(&mut self, from: usize, to: usize) {
        let spans = self.leaf_spans();
        for span in spans.iter().rev() {
            if span.start >= to || span.end <= from {
                continue;
            }
            let cut_from = from.max(span.start) - span.start;
            let cut_to = to.min(span.end) - span.start;
            let path = span.path.clone();
            let mut now_empty = false;
            if let DocumentNode::Text { text, .. } = leaf_mut(&mut self.doc, &path) {
                let byte_from = char_to_byte(text, cut_from);
                let byte_to = char_to_byte(text, cut_to);
                text.replace_range(byte_from..byte_to, "");
                now_empty = text.is_empty();
            }
            if now_empty {
                let (parent_path, index) = split_path(&path);
                let parent = node_mut(&mut self.doc, parent_path);
                if let Some(children) = parent.children_mut() {
                    children.remove(index);
                }
            }
        }
    }

    /// Split the leaf containing the offset so the offset lands on a
    /// leaf boundary; both halves keep the original marks
    fn split_leaf_at(&mut self, offset: usize) {
        let spans = self.leaf_spans();
        let Some(span) = spans.iter().find(|s| s.start < offset && offset < s.end) else {
            return;
        };
        let local = offset - span.start;
        let path = span.path.clone();
        let (left, right) = match leaf_at(&self.doc, &path) {
            DocumentNode::Text { text, marks } => {
                let byte = char_to_byte(text, local);
                (
                    DocumentNode::Text {
                        text: text[..byte].to_string(),
                        marks: marks.clone(),
                    },
                    DocumentNode::Text {
                        text: text[byte..].to_string(),
                        marks: marks.clone(),
                    },
                )
            }
            _ => return,
        };
        let (parent_path, index) = split_path(&path);
        let parent = node_mut(&mut self.doc, parent_path);
        if let Some(children) = parent.children_mut() {
            children.splice(index..=index, [left, right]);
        }
    }

    /// Insert an inline node at a leaf boundary at the given offset
    fn insert_inline_at(&mut self, offset: usize, node: DocumentNode) {
        let spans = self.leaf_spans();
        if let Some(span) = spans.iter().find(|s| s.start == offset) {
            let (parent_path, index) = split_path(&span.path);
            let parent = node_mut(&mut self.doc, parent_path);
            if let Some(children) = parent.children_mut() {
                children.insert(index, node);
            }
            return;
        }
        if let Some(span) = spans.iter().filter(|s| s.end == offset).next_back() {
            let (parent_path, index) = split_path(&span.path);
            let parent = node_mut(&mut self.doc, parent_path);
            if let Some(children) = parent.children_mut() {
                children.insert(index + 1, node);
            }
            return;
        }
        // No text anywhere: wrap in a paragraph at the end.
        let paragraph = DocumentNode::Paragraph {
            content: vec![node],
        };
        if let Some(children) = self.doc.children_mut() {
            children.push(paragraph);
        }
    }
}

/// Page name when the leaf carries an internal-link mark
fn locked_page_name(leaf: &DocumentNode) -> Option<String> {
    leaf.marks().iter().find_map(|m| match m {
        Mark::InternalLink { attrs } => Some(attrs.page_name.clone()),
        _ => None,
    })
}

fn collect_leaf_spans(
    node: &DocumentNode,
    path: &mut Vec<usize>,
    pos: &mut usize,
    out: &mut Vec<LeafSpan>,
) {
    if let DocumentNode::Text { text, .. } = node {
        let start = *pos;
        *pos += text.chars().count();
        out.push(LeafSpan {
            start,
            end: *pos,
            path: path.clone(),
        });
        return;
    }
    for (index, child) in node.children().iter().enumerate() {
        path.push(index);
        collect_leaf_spans(child, path, pos, out);
        path.pop();
    }
}

fn leaf_at<'a>(root: &'a DocumentNode, path: &[usize]) -> &'a DocumentNode {
    let mut node = root;
    for &index in path {
        node = &node.children()[index];
    }
    node
}

fn leaf_mut<'a>(root: &'a mut DocumentNode, path: &[usize]) -> &'a mut DocumentNode {
    node_mut(root, path)
}

fn node_mut<'a>(root: &'a mut DocumentNode, path: &[usize]) -> &'a mut DocumentNode {
    let mut node = root;
    for &index in path {
        node = &mut node
            .children_mut()
            .expect("path points through container nodes")[index];
    }
    node
}

fn split_path(path: &[usize]) -> (&[usize], usize) {
    let (last, parent) = path.split_last().expect("leaf paths are never empty");
    (parent, *last)
}

/// Path of the node at a depth-first index, if it is an attachment
fn attachment_path_at(root: &DocumentNode, node_index: usize) -> Option<Vec<usize>> {
    fn walk(
        node: &DocumentNode,
        path: &mut Vec<usize>,
        counter: &mut usize,
        target: usize,
    ) -> Option<Vec<usize>> {
        if *counter == target {
            return match node {
                DocumentNode::Attachment { .. } => Some(path.clone()),
                _ => None,
            };
        }
        *counter += 1;
        for (index, child) in node.children().iter().enumerate() {
            path.push(index);
            let found = walk(child, path, counter, target);
            path.pop();
            if *counter > target || found.is_some() {
                return found;
            }
        }
        None
    }
    let mut counter = 0;
    walk(root, &mut Vec::new(), &mut counter, node_index)
}

/// Byte index of the nth character
fn char_to_byte(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}
