//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::OutputFormat;

/// Copilot Chat Export - Extract GitHub Copilot chat history from VS Code.
///
/// Chats are looked up for the workspace opened on `--folder` (the current
/// directory by default), falling back to editor-wide storage.
#[derive(Parser, Debug)]
#[command(name = "copilot-chat-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (default: ~/.copilot-chat-export/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// VS Code data directory (e.g. ~/.config/Code).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Use VS Code Insiders data instead of the stable build.
    #[arg(long, global = true)]
    pub insiders: bool,

    /// Output format: markdown, json, csv, or table.
    #[arg(short, long, global = true)]
    pub format: Option<String>,

    /// Project folder whose workspace chats are wanted.
    #[arg(short = 'w', long, default_value = ".", global = true)]
    pub folder: String,

    /// Skip the workspace lookup and read editor-wide storage only.
    #[arg(short, long, global = true)]
    pub global_only: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the workspace identifier recorded for a folder.
    FindWorkspace {
        /// Folder path or URI (defaults to --folder).
        folder: Option<String>,
    },

    /// List every workspace known to the editor.
    Workspaces,

    /// Show the chat store locations that would be searched.
    Paths,

    /// List sessions (summary table).
    List {
        /// Maximum number of sessions to show.
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Minimum number of messages to include a session.
        #[arg(short, long)]
        min_messages: Option<usize>,

        /// Merge every location instead of stopping at the first with data.
        #[arg(short, long)]
        all_locations: bool,
    },

    /// Show a specific session in detail.
    Show {
        /// Session ID (full or partial).
        session_id: String,

        /// Include empty messages.
        #[arg(long)]
        include_empty: bool,

        /// Show only the last N messages.
        #[arg(short, long)]
        last: Option<usize>,
    },

    /// Export sessions to a file or stdout.
    Export {
        /// Output file path, `-` for stdout
        /// (default: copilot_chat_<project>_<timestamp>.<ext>).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Session ID to export (all if not specified).
        #[arg(short, long)]
        session: Option<String>,

        /// Minimum number of messages to include a session.
        #[arg(short, long)]
        min_messages: Option<usize>,

        /// Merge every location instead of stopping at the first with data.
        #[arg(short, long)]
        all_locations: bool,
    },

    /// Export sessions to separate files with auto-generated names.
    ExportAll {
        /// Output directory (defaults to the configured export directory).
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Number of recent sessions to export (0 = all).
        #[arg(short, long, default_value = "0")]
        limit: usize,

        /// Minimum number of messages to include a session.
        #[arg(short, long)]
        min_messages: Option<usize>,
    },

    /// Export every session as JSON, Markdown and CSV in one go.
    Quick {
        /// Output directory (defaults to the configured export directory).
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Minimum number of messages to include a session.
        #[arg(short, long)]
        min_messages: Option<usize>,

        /// Merge every location instead of stopping at the first with data.
        #[arg(short, long)]
        all_locations: bool,
    },

    /// Show statistics about stored sessions.
    Stats,

    /// Write a default configuration file.
    InitConfig,
}

impl Cli {
    /// Parse the output format argument, falling back to `default`.
    pub fn output_format(&self, default: &str) -> Result<OutputFormat, String> {
        self.format.as_deref().unwrap_or(default).parse()
    }
}

/// Where `export` writes its document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportTarget {
    Stdout,
    File(PathBuf),
    /// Generated name in the current directory.
    DefaultName,
}

impl ExportTarget {
    #[must_use]
    pub fn from_arg(output: Option<PathBuf>) -> Self {
        match output {
            Some(path) if path.as_os_str() == "-" => Self::Stdout,
            Some(path) => Self::File(path),
            None => Self::DefaultName,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "copilot-chat-export",
            "export",
            "-o",
            "out.json",
            "--format",
            "csv",
            "--folder",
            "/home/u/proj",
        ]);

        assert_eq!(cli.output_format("json"), Ok(OutputFormat::Csv));
        assert_eq!(cli.folder, "/home/u/proj");
        assert!(matches!(cli.command, Commands::Export { output: Some(_), .. }));
    }

    #[test]
    fn test_export_target() {
        assert_eq!(ExportTarget::from_arg(None), ExportTarget::DefaultName);
        assert_eq!(
            ExportTarget::from_arg(Some(PathBuf::from("-"))),
            ExportTarget::Stdout
        );
        assert_eq!(
            ExportTarget::from_arg(Some(PathBuf::from("a.md"))),
            ExportTarget::File(PathBuf::from("a.md"))
        );
    }

    #[test]
    fn test_quick_command() {
        let cli = Cli::parse_from(["copilot-chat-export", "quick", "--dir", "out", "-a"]);
        assert!(matches!(
            cli.command,
            Commands::Quick {
                dir: Some(_),
                all_locations: true,
                ..
            }
        ));
    }

    #[test]
    fn test_format_falls_back_to_default() {
        let cli = Cli::parse_from(["copilot-chat-export", "stats"]);
        assert_eq!(cli.output_format("markdown"), Ok(OutputFormat::Markdown));
        assert_eq!(cli.folder, ".");
    }
}
