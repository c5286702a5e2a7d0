//! CLI parse: clap types for folio. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Folio CLI - structured multi-section document generation
#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Generate structured multi-section documents with a language model")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (holds folio.toml)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, short, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a document and save it
    Generate {
        /// Document title
        #[arg(long)]
        title: String,
        /// Document type (see `folio plans`)
        #[arg(long = "type")]
        document_type: String,
        /// Extra instructions added to every prompt
        #[arg(long)]
        instructions: Option<String>,
        /// Owner of the generated document
        #[arg(long, default_value = "local")]
        user: String,
        /// Print sections as they are generated
        #[arg(long)]
        stream: bool,
    },
    /// Show a stored document
    Show {
        /// Document id
        id: String,
        #[arg(long, default_value = "local")]
        user: String,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List stored documents, newest first
    List {
        #[arg(long, default_value = "local")]
        user: String,
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long, default_value = "10")]
        limit: usize,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Delete a stored document
    Delete {
        /// Document id
        id: String,
        #[arg(long, default_value = "local")]
        user: String,
    },
    /// List available document types and their sections
    Plans {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Generate { .. } => "generate",
            Commands::Show { .. } => "show",
            Commands::List { .. } => "list",
            Commands::Delete { .. } => "delete",
            Commands::Plans { .. } => "plans",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generate_with_type_flag() {
        let cli = Cli::try_parse_from([
            "folio",
            "generate",
            "--title",
            "Library System",
            "--type",
            "project_proposal",
            "--stream",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate {
                title,
                document_type,
                user,
                stream,
                instructions,
            } => {
                assert_eq!(title, "Library System");
                assert_eq!(document_type, "project_proposal");
                assert_eq!(user, "local");
                assert!(stream);
                assert!(instructions.is_none());
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["folio", "--quiet", "--verbose", "plans"]).is_err());
    }

    #[test]
    fn list_defaults() {
        let cli = Cli::try_parse_from(["folio", "list"]).unwrap();
        assert_eq!(cli.command.name(), "list");
        match cli.command {
            Commands::List {
                page,
                limit,
                format,
                ..
            } => {
                assert_eq!((page, limit), (1, 10));
                assert_eq!(format, OutputFormat::Text);
            }
            _ => panic!("expected list"),
        }
    }
}
