//! playbooq - structured playbook documents
//!
//! The document tree is the single source of truth: markdown is converted
//! into it once, edits mutate it, and every other representation (HTML,
//! plain text, table of contents, assignment queries) is derived from it
//! on demand. Trees travel between sessions as JSON.

#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod assignments;
pub mod document_model;
pub mod editor;
pub mod html;
pub mod markdown_builder;
pub mod pages;
pub mod persistence;
pub mod plain_text;
pub mod playbook;
pub mod toc;

pub use document_model::{DocumentNode, Mark};
pub use editor::Editor;
pub use playbook::Playbook;
