//! Read-only HTML projection of a document tree
//!
//! This module renders a document tree to semantic HTML with:
//! - Per-node-type rendering rules (h1-h4, p, ul/ol/li, blockquote, hr)
//! - A fixed mark nesting order so identical marks always produce
//!   identical markup
//! - A forward-compatibility rule: an unrecognized node type renders the
//!   concatenation of its children; only an unrecognized childless leaf is
//!   dropped
//!
//! Rendering happens over the wire representation (`serde_json::Value`),
//! so trees persisted by newer writers degrade gracefully instead of
//! failing deserialization.

use serde_json::Value;

use crate::assignments;
use crate::document_model::DocumentNode;

/// Rendering options for the read-only view
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// When set, top-level blocks that carry no assignment naming this
    /// assignee id render inside a dimmed wrapper. Derived per block during
    /// rendering; the tree is never mutated and no stylesheet is generated.
    pub assignee_filter: Option<String>,
}

/// Render a document tree to an HTML fragment
pub fn render_fragment(doc: &DocumentNode) -> String {
    render_with_options(doc, &RenderOptions::default())
}

/// Render a document tree to an HTML fragment with options applied
pub fn render_with_options(doc: &DocumentNode, options: &RenderOptions) -> String {
    let value = match serde_json::to_value(doc) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("html rendering skipped unserializable tree: {}", e);
            return String::new();
        }
    };

    match &options.assignee_filter {
        None => render_node(&value),
        Some(assignee_id) => {
            // Pair each wire block with its derived visibility from the
            // typed tree; both walk the same top-level children in order.
            let blocks = doc.children();
            let mut out = String::new();
            if let Some(children) = value.get("content").and_then(Value::as_array) {
                for (i, child) in children.iter().enumerate() {
                    let matches = blocks
                        .get(i)
                        .map(|block| assignments::block_contains_assignee(block, assignee_id))
                        .unwrap_or(false);
                    if matches {
                        out.push_str(&render_node(child));
                    } else {
                        out.push_str("<div class=\"assignment-dimmed\">");
                        out.push_str(&render_node(child));
                        out.push_str("</div>");
                    }
                }
            }
            out
        }
    }
}

/// Render a serialized tree to an HTML fragment
///
/// Malformed input degrades to an empty fragment; unknown node types render
/// their children.
pub fn render_from_json(json: &str) -> String {
    match serde_json::from_str::<Value>(json) {
        Ok(value) => render_node(&value),
        Err(e) => {
            log::warn!("html rendering skipped malformed tree: {}", e);
            String::new()
        }
    }
}

/// Render a full standalone HTML page around the fragment
pub fn render_page(title: &str, doc: &DocumentNode) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n");
    out.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    out.push_str("<style>\n");
    out.push_str(CSS_STYLES);
    out.push_str("</style>\n</head>\n<body>\n<div class=\"playbook\">\n");
    out.push_str(&render_fragment(doc));
    out.push_str("\n</div>\n</body>\n</html>\n");
    out
}

fn render_node(value: &Value) -> String {
    let node_type = value.get("type").and_then(Value::as_str).unwrap_or("");

    match node_type {
        "doc" => render_children(value),
        "heading" => {
            let level = value
                .pointer("/attrs/level")
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .clamp(1, 4);
            format!("<h{}>{}</h{}>", level, render_children(value), level)
        }
        "paragraph" => format!("<p>{}</p>", render_children(value)),
        "bulletList" => format!("<ul>{}</ul>", render_children(value)),
        "orderedList" => format!("<ol>{}</ol>", render_children(value)),
        "listItem" => format!("<li>{}</li>", render_children(value)),
        "blockquote" => format!("<blockquote>{}</blockquote>", render_children(value)),
        "horizontalRule" => "<hr>".to_string(),
        "attachment" => render_attachment(value),
        "text" => render_text(value),
        // Forward compatibility: never drop content for an unrecognized
        // node type, only for an unrecognized childless leaf.
        _ => render_children(value),
    }
}

fn render_children(value: &Value) -> String {
    match value.get("content").and_then(Value::as_array) {
        Some(children) => children.iter().map(render_node).collect(),
        None => String::new(),
    }
}

fn render_attachment(value: &Value) -> String {
    let attr = |name: &str| {
        value
            .pointer(&format!("/attrs/{}", name))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    };
    let file_size = value
        .pointer("/attrs/fileSize")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    format!(
        "<a class=\"attachment\" href=\"{}\" download=\"{}\" data-file-size=\"{}\">{}</a>",
        escape_html(&attr("fileUrl")),
        escape_html(&attr("fileName")),
        file_size,
        escape_html(&attr("fileName"))
    )
}

/// Render a text leaf with its marks applied in the fixed nesting order:
/// bold, italic, underline, highlight, code, link, style span last.
fn render_text(value: &Value) -> String {
    let raw = value.get("text").and_then(Value::as_str).unwrap_or("");
    let mut html = escape_html(raw);

    let marks = match value.get("marks").and_then(Value::as_array) {
        Some(marks) => marks,
        None => return html,
    };

    let has = |mark_type: &str| {
        marks
            .iter()
            .any(|m| m.get("type").and_then(Value::as_str) == Some(mark_type))
    };
    let mark_attr = |mark_type: &str, attr: &str| -> Option<String> {
        marks.iter().find_map(|m| {
            if m.get("type").and_then(Value::as_str) == Some(mark_type) {
                m.pointer(&format!("/attrs/{}", attr))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            } else {
                None
            }
        })
    };

    if has("bold") {
        html = format!("<strong>{}</strong>", html);
    }
    if has("italic") {
        html = format!("<em>{}</em>", html);
    }
    if has("underline") {
        html = format!("<u>{}</u>", html);
    }
    if has("highlight") {
        let style = mark_attr("highlight", "color")
            .map(|c| format!(" style=\"background-color: {}\"", escape_html(&c)))
            .unwrap_or_default();
        html = format!("<mark{}>{}</mark>", style, html);
    }
    if has("code") {
        html = format!("<code>{}</code>", html);
    }
    if has("link") {
        let href = mark_attr("link", "href").unwrap_or_default();
        match mark_attr("link", "title") {
            Some(title) => {
                html = format!(
                    "<a href=\"{}\" title=\"{}\">{}</a>",
                    escape_html(&href),
                    escape_html(&title),
                    html
                );
            }
            None => {
                html = format!("<a href=\"{}\">{}</a>", escape_html(&href), html);
            }
        }
    }
    if has("internalLink") {
        let page_id = mark_attr("internalLink", "pageId").unwrap_or_default();
        html = format!(
            "<a class=\"internal-link\" data-page-id=\"{}\">{}</a>",
            escape_html(&page_id),
            html
        );
    }

    // Color, font and alignment share one style wrapper, applied last.
    let mut styles = Vec::new();
    if let Some(color) = mark_attr("textColor", "color") {
        styles.push(format!("color: {}", color));
    }
    if let Some(font) = mark_attr("fontFamily", "fontFamily") {
        styles.push(format!("font-family: {}", font));
    }
    if let Some(align) = mark_attr("textAlign", "align") {
        styles.push(format!("text-align: {}", align));
    }
    if !styles.is_empty() {
        html = format!(
            "<span style=\"{}\">{}</span>",
            escape_html(&styles.join("; ")),
            html
        );
    }

    if has("assignment") {
        let due = mark_attr("assignment", "dueDate")
            .map(|d| format!(" data-due-date=\"{}\"", escape_html(&d)))
            .unwrap_or_default();
        html = format!("<span class=\"assignment\"{}>{}</span>", due, html);
    }

    html
}

/// Escape HTML special characters
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const CSS_STYLES: &str = r#"
body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Roboto', sans-serif;
    line-height: 1.6;
    color: #333;
    background-color: #f5f5f5;
    padding: 20px;
}

.playbook {
    max-width: 820px;
    margin: 0 auto;
    background: white;
    padding: 48px;
    border-radius: 4px;
    box-shadow: 0 2px 4px rgba(0, 0, 0, 0.1);
}

h1, h2, h3, h4 {
    margin-top: 28px;
    margin-bottom: 12px;
    font-weight: 600;
    color: #1a1a1a;
}

p {
    margin-bottom: 14px;
}

blockquote {
    border-left: 4px solid #ddd;
    padding-left: 16px;
    margin: 16px 0;
    color: #666;
}

a.internal-link {
    color: #6a40bf;
    text-decoration: underline;
    cursor: pointer;
}

a.attachment {
    display: inline-block;
    padding: 2px 8px;
    background-color: #f0f4f8;
    border: 1px solid #d0d7de;
    border-radius: 4px;
    font-size: 0.9em;
}

span.assignment {
    background-color: #fff7e0;
    border-bottom: 2px solid #f0b429;
}

div.assignment-dimmed {
    opacity: 0.25;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_model::{
        Assignee, AssignmentAttrs, AttachmentAttrs, LinkAttrs, Mark,
    };
    use crate::markdown_builder::build_document;

    fn marked_text(text: &str, marks: Vec<Mark>) -> DocumentNode {
        DocumentNode::Text {
            text: text.to_string(),
            marks,
        }
    }

    #[test]
    fn test_render_basic_blocks() {
        let doc = build_document("# Title\n\nIntro para.\n\n- do a\n- do b\n");
        let html = render_fragment(&doc);
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<p>Intro para.</p>"));
        assert!(html.contains("<ul><li><p>do a</p></li><li><p>do b</p></li></ul>"));
    }

    #[test]
    fn test_text_is_escaped() {
        let doc = DocumentNode::Doc {
            content: vec![DocumentNode::paragraph_of("a < b & \"c\"")],
        };
        let html = render_fragment(&doc);
        assert!(html.contains("a &lt; b &amp; &quot;c&quot;"));
    }

    #[test]
    fn test_mark_nesting_order_bold_link() {
        let doc = DocumentNode::Doc {
            content: vec![DocumentNode::Paragraph {
                content: vec![marked_text(
                    "click",
                    vec![
                        Mark::Bold,
                        Mark::Link {
                            attrs: LinkAttrs {
                                href: "http://x".to_string(),
                                title: None,
                            },
                        },
                    ],
                )],
            }],
        };
        let html = render_fragment(&doc);
        assert!(html.contains("<a href=\"http://x\"><strong>click</strong></a>"));
    }

    #[test]
    fn test_mark_order_is_independent_of_mark_list_order() {
        let forward = vec![
            Mark::Bold,
            Mark::Link {
                attrs: LinkAttrs {
                    href: "http://x".to_string(),
                    title: None,
                },
            },
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let render = |marks: Vec<Mark>| {
            render_fragment(&DocumentNode::Doc {
                content: vec![DocumentNode::Paragraph {
                    content: vec![marked_text("t", marks)],
                }],
            })
        };
        assert_eq!(render(forward), render(reversed));
    }

    #[test]
    fn test_unknown_node_type_renders_children() {
        let json = r#"{"type":"doc","content":[
            {"type":"calloutBox","content":[
                {"type":"paragraph","content":[{"type":"text","text":"kept"}]}
            ]},
            {"type":"mysteryLeaf"}
        ]}"#;
        let html = render_from_json(json);
        assert!(html.contains("<p>kept</p>"));
        assert!(!html.contains("mysteryLeaf"));
    }

    #[test]
    fn test_malformed_json_degrades_to_empty() {
        assert_eq!(render_from_json("{oops"), "");
    }

    #[test]
    fn test_attachment_renders_metadata() {
        let doc = DocumentNode::Doc {
            content: vec![DocumentNode::Paragraph {
                content: vec![DocumentNode::Attachment {
                    attrs: AttachmentAttrs {
                        file_name: "runbook.pdf".to_string(),
                        file_url: "https://files.example/runbook.pdf".to_string(),
                        file_size: 1024,
                        file_type: "application/pdf".to_string(),
                        upload_date: "2026-03-01T09:00:00Z".to_string(),
                    },
                }],
            }],
        };
        let html = render_fragment(&doc);
        assert!(html.contains("class=\"attachment\""));
        assert!(html.contains("runbook.pdf"));
        assert!(html.contains("data-file-size=\"1024\""));
    }

    #[test]
    fn test_internal_link_carries_page_id() {
        let doc = DocumentNode::Doc {
            content: vec![DocumentNode::Paragraph {
                content: vec![marked_text(
                    "Escalation",
                    vec![Mark::InternalLink {
                        attrs: crate::document_model::InternalLinkAttrs {
                            page_id: "pg-7".to_string(),
                            page_name: "Escalation".to_string(),
                            page_title: "Escalation".to_string(),
                            created_by: "u1".to_string(),
                            created_by_name: "Ada".to_string(),
                        },
                    }],
                )],
            }],
        };
        let html = render_fragment(&doc);
        assert!(html.contains("data-page-id=\"pg-7\""));
    }

    #[test]
    fn test_assignee_filter_dims_unrelated_blocks() {
        let assigned = DocumentNode::Paragraph {
            content: vec![marked_text(
                "review contract",
                vec![Mark::Assignment {
                    attrs: AssignmentAttrs {
                        assignees: vec![Assignee {
                            id: "u9".to_string(),
                            name: "Lin".to_string(),
                        }],
                        due_date: None,
                        assignment_color: None,
                    },
                }],
            )],
        };
        let doc = DocumentNode::Doc {
            content: vec![DocumentNode::paragraph_of("unrelated"), assigned],
        };
        let html = render_with_options(
            &doc,
            &RenderOptions {
                assignee_filter: Some("u9".to_string()),
            },
        );
        assert!(html.contains("<div class=\"assignment-dimmed\"><p>unrelated</p></div>"));
        // The matching block is rendered bare, outside any dimming wrapper
        assert_eq!(html.matches("assignment-dimmed").count(), 1);
        assert!(html.ends_with("review contract</span></p>"));
    }

    #[test]
    fn test_render_page_wraps_fragment() {
        let doc = build_document("# T\n");
        let page = render_page("My Playbook", &doc);
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<title>My Playbook</title>"));
        assert!(page.contains("<h1>T</h1>"));
    }
}
