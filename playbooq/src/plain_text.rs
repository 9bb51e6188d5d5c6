//! Plain-text projection of a document tree
//!
//! Depth-first extraction of all text leaves, with a blank line after each
//! heading and paragraph subtree. Used for marketplace previews and for
//! deriving a playbook description when none is authored explicitly.

use crate::document_model::DocumentNode;

/// Longest auto-derived description, in characters
const DESCRIPTION_LIMIT: usize = 200;

/// Extract the plain text of a document tree
///
/// Concatenates every text leaf in document order, inserting a double
/// newline after each heading and paragraph subtree, and trims the result.
pub fn extract_text(node: &DocumentNode) -> String {
    let mut out = String::new();
    collect(node, &mut out);
    out.trim().to_string()
}

/// Extract plain text from a serialized tree
///
/// A corrupt persisted document degrades to an empty preview rather than
/// failing the surface that asked for it.
pub fn extract_text_from_json(json: &str) -> String {
    match crate::document_model::from_json(json) {
        Ok(doc) => extract_text(&doc),
        Err(e) => {
            log::warn!("plain-text extraction skipped malformed tree: {}", e);
            String::new()
        }
    }
}

fn collect(node: &DocumentNode, out: &mut String) {
    if let DocumentNode::Text { text, .. } = node {
        out.push_str(text);
    }
    for child in node.children() {
        collect(child, out);
    }
    if matches!(
        node,
        DocumentNode::Heading { .. } | DocumentNode::Paragraph { .. }
    ) {
        out.push_str("\n\n");
    }
}

/// Derive a description from document content
///
/// Returns the first sentence when it fits in 200 characters, otherwise the
/// first 200 characters of the extracted text. Empty documents yield an
/// empty description.
pub fn derive_description(node: &DocumentNode) -> String {
    let text = extract_text(node).replace('\n', " ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return String::new();
    }

    if let Some(sentence) = first_sentence(&text) {
        if sentence.chars().count() <= DESCRIPTION_LIMIT {
            return sentence.to_string();
        }
    }

    text.chars().take(DESCRIPTION_LIMIT).collect()
}

/// First sentence of the text, terminator included
fn first_sentence(text: &str) -> Option<&str> {
    for (idx, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let end = idx + c.len_utf8();
            let rest = &text[end..];
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return Some(&text[..end]);
            }
        }
    }
    None
}
