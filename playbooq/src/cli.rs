//! Command-line interface definitions for playbooq

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for the toc command
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum TocFormat {
    /// Human-readable numbered outline
    #[default]
    Text,
    /// JSON array of entries
    Json,
}

/// CLI structure for the playbooq application
#[derive(Parser)]
#[command(name = "playbooq")]
#[command(version)]
#[command(about = "Structured playbook document tool", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for playbooq
#[derive(Subcommand)]
pub enum Commands {
    /// Convert markdown to the document tree JSON format
    Convert {
        /// Markdown input file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Render a document tree JSON file to HTML
    Render {
        /// Document tree JSON input file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit a complete styled page instead of a fragment
        #[arg(long)]
        page: bool,

        /// Dim blocks without assignments for this assignee id
        #[arg(long, value_name = "ASSIGNEE_ID")]
        assignee: Option<String>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Extract the numbered table of contents from a document tree
    Toc {
        /// Document tree JSON input file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: TocFormat,
    },

    /// Derive plain text or a short description from a document tree
    Describe {
        /// Document tree JSON input file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Emit the short description instead of the full plain text
        #[arg(short, long)]
        short: bool,
    },

    /// Validate the structure of a document tree JSON file
    Validate {
        /// Document tree JSON input file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Show each violation instead of a summary
        #[arg(short, long)]
        verbose: bool,
    },
}
