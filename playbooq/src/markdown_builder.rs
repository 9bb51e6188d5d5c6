//! Markdown to document-tree builder
//!
//! Generated playbook content arrives as markdown from the text-generation
//! boundary. This module converts it into a [`DocumentNode`] tree with a
//! single line-by-line pass. Classification precedence per line: blank,
//! heading, bullet item, ordered item, plain paragraph. The only parser
//! state is the currently open list; headings and paragraphs flush it
//! before emitting, so lists never interleave with other block types.
//!
//! No input line can fail: unrecognized shapes always fall through to a
//! plain paragraph, and empty input yields an empty `doc`.

use std::sync::OnceLock;

use regex::Regex;

use crate::document_model::DocumentNode;

/// Matcher for ordered-list lines such as `12. step`
fn ordered_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\s+").expect("ordered-list pattern is valid"))
}

/// Build a document tree from a markdown string
///
/// # Parameters
/// * `markdown` - Arbitrary markdown text, typically a generation result
///
/// # Returns
/// * `DocumentNode::Doc` - One block node per recognized construct, in
///   input order; never fails
pub fn build_document(markdown: &str) -> DocumentNode {
    let mut blocks: Vec<DocumentNode> = Vec::new();
    // The single piece of parser state: items of the currently open list.
    let mut open_list: Option<Vec<DocumentNode>> = None;

    for line in markdown.lines() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            flush_list(&mut open_list, &mut blocks);
            continue;
        }

        if let Some((level, text)) = classify_heading(trimmed) {
            flush_list(&mut open_list, &mut blocks);
            blocks.push(DocumentNode::heading_of(level, text));
            continue;
        }

        if let Some(text) = classify_bullet_item(trimmed) {
            push_list_item(&mut open_list, text);
            continue;
        }

        if let Some(text) = classify_ordered_item(trimmed) {
            // Mixed `-` and `1.` markers accumulate into the same open
            // list; the flush decides the list kind from its first item.
            push_list_item(&mut open_list, text);
            continue;
        }

        flush_list(&mut open_list, &mut blocks);
        blocks.push(DocumentNode::paragraph_of(trimmed));
    }

    flush_list(&mut open_list, &mut blocks);

    DocumentNode::Doc { content: blocks }
}

/// Heading line: one to four `#` characters followed by whitespace
fn classify_heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if !(1..=4).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(' ') && !rest.starts_with('\t') {
        return None;
    }
    Some((hashes as u8, rest.trim()))
}

/// Bullet line: `-` or `*` marker followed by whitespace
fn classify_bullet_item(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("- ").or_else(|| line.strip_prefix("* "))?;
    Some(rest.trim())
}

/// Ordered line: decimal number, dot, whitespace
fn classify_ordered_item(line: &str) -> Option<&str> {
    let matched = ordered_item_re().find(line)?;
    Some(line[matched.end()..].trim())
}

fn push_list_item(open_list: &mut Option<Vec<DocumentNode>>, text: &str) {
    let item = DocumentNode::ListItem {
        content: vec![DocumentNode::paragraph_of(text)],
    };
    open_list.get_or_insert_with(Vec::new).push(item);
}

/// Emit the accumulated open list, if any, as a bulletList block
fn flush_list(open_list: &mut Option<Vec<DocumentNode>>, blocks: &mut Vec<DocumentNode>) {
    if let Some(items) = open_list.take() {
        blocks.push(DocumentNode::BulletList { content: items });
    }
}
