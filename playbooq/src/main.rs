//! playbooq - structured playbook document tool
//!
//! A CLI tool for converting markdown into the playbook document tree
//! format and deriving HTML, plain text, and tables of contents from it.

#![deny(unsafe_code)]
#![cfg_attr(all(not(debug_assertions), not(test)), deny(clippy::all))]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod cli;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands, TocFormat};
use playbooq::document_model::{self, DocumentNode};
use playbooq::html::{self, RenderOptions};
use playbooq::markdown_builder::build_document;
use playbooq::plain_text;
use playbooq::toc;

/// Main entry point for the playbooq CLI application
fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    }
}

/// Run the CLI application
fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            output,
            pretty,
        } => {
            handle_convert_command(&input, output.as_deref(), pretty)?;
        }

        Commands::Render {
            input,
            output,
            page,
            assignee,
            verbose,
        } => {
            handle_render_command(&input, output.as_deref(), page, assignee, verbose)?;
        }

        Commands::Toc { input, format } => {
            handle_toc_command(&input, format)?;
        }

        Commands::Describe { input, short } => {
            handle_describe_command(&input, short)?;
        }

        Commands::Validate { input, verbose } => {
            handle_validate_command(&input, verbose)?;
        }
    }

    Ok(())
}

/// Read and deserialize a document tree JSON file
fn load_tree(input: &Path) -> Result<DocumentNode> {
    let json = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    document_model::from_json(&json)
        .with_context(|| format!("Failed to parse document tree from {}", input.display()))
}

/// Write to a file or stdout when no output path is given
fn emit(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => fs::write(path, text)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", text),
    }
    Ok(())
}

/// Handle the convert command
fn handle_convert_command(input: &Path, output: Option<&Path>, pretty: bool) -> Result<()> {
    let markdown = fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let doc = build_document(&markdown);
    let json = if pretty {
        serde_json::to_string_pretty(&doc)
    } else {
        serde_json::to_string(&doc)
    }
    .context("Failed to serialize document tree")?;

    emit(output, &json)
}

/// Handle the render command
fn handle_render_command(
    input: &Path,
    output: Option<&Path>,
    page: bool,
    assignee: Option<String>,
    verbose: bool,
) -> Result<()> {
    if verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let doc = load_tree(input)?;
    log::info!("rendering {} top-level blocks", doc.children().len());

    let html_text = if page {
        let title = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Playbook".to_string());
        html::render_page(&title, &doc)
    } else {
        html::render_with_options(
            &doc,
            &RenderOptions {
                assignee_filter: assignee,
            },
        )
    };

    emit(output, &html_text)
}

/// Handle the toc command
fn handle_toc_command(input: &Path, format: TocFormat) -> Result<()> {
    let doc = load_tree(input)?;
    let entries = toc::extract_toc(&doc);

    match format {
        TocFormat::Json => {
            let json =
                serde_json::to_string_pretty(&entries).context("Failed to serialize TOC")?;
            println!("{}", json);
        }
        TocFormat::Text => {
            for entry in &entries {
                let indent = "  ".repeat((entry.level as usize).saturating_sub(1));
                println!("{}{} {}", indent, entry.section_number, entry.title);
            }
        }
    }

    Ok(())
}

/// Handle the describe command
fn handle_describe_command(input: &Path, short: bool) -> Result<()> {
    let doc = load_tree(input)?;
    if short {
        println!("{}", plain_text::derive_description(&doc));
    } else {
        println!("{}", plain_text::extract_text(&doc));
    }
    Ok(())
}

/// Handle the validate command
fn handle_validate_command(input: &Path, verbose: bool) -> Result<()> {
    let doc = load_tree(input)?;

    match doc.validate() {
        Ok(()) => {
            println!("✓ {} is structurally valid", input.display());
            Ok(())
        }
        Err(e) => {
            if verbose {
                eprintln!("{}", e);
            }
            Err(e).with_context(|| format!("{} failed validation", input.display()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_cli_parses_convert() {
        let cli = Cli::parse_from(["playbooq", "convert", "in.md", "--pretty"]);
        match cli.command {
            Commands::Convert { input, pretty, .. } => {
                assert_eq!(input, PathBuf::from("in.md"));
                assert!(pretty);
            }
            _ => panic!("expected convert command"),
        }
    }

    #[test]
    fn test_cli_parses_render_with_assignee() {
        let cli = Cli::parse_from(["playbooq", "render", "tree.json", "--assignee", "u1"]);
        match cli.command {
            Commands::Render { assignee, page, .. } => {
                assert_eq!(assignee.as_deref(), Some("u1"));
                assert!(!page);
            }
            _ => panic!("expected render command"),
        }
    }
}
