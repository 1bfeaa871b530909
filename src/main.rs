//! Copilot Chat Export - Extract GitHub Copilot chat history from VS Code.
//!
//! This tool maps a project folder to the editor's workspace storage, finds
//! the chat stores below it (or in editor-wide storage), and exports the
//! sessions as Markdown, JSON, CSV or a table.
//!
//! Quick start:
//!   copilot-chat-export find-workspace ~/src/proj   # Workspace id for a folder
//!   copilot-chat-export list                        # Sessions for the current folder
//!   copilot-chat-export show <id> --last 5          # Last 5 messages of a session
//!   copilot-chat-export export -f csv -o chats.csv  # Save everything
//!   copilot-chat-export export-all --limit 3        # One file per recent session
//!   copilot-chat-export quick                       # JSON, Markdown and CSV at once

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::path::{Path, PathBuf};

use chrono::Local;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    collect_sessions, export_file_name, format_locations, format_session_markdown,
    format_sessions_table, format_stats, format_workspaces_table, project_name, render,
    ExtractOptions, OutputFormat, StoreLocator, WorkspaceResolver, QUICK_EXPORT_FORMATS,
};
use cli::{Cli, Commands, ExportTarget};
use domain::{AppConfig, AppError, ChatSession, ExtractionStats, SearchPaths};
use infrastructure::{ensure_config_exists, find_editor_data_dir, load_config};

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Shared state for every command.
struct Context {
    config: AppConfig,
    paths: SearchPaths,
    format: OutputFormat,
    folder: String,
    global_only: bool,
}

impl Context {
    fn options(&self) -> ExtractOptions {
        ExtractOptions {
            global_only: self.global_only,
            min_messages: self.config.export.min_messages,
            ..Default::default()
        }
    }

    fn collect(
        &self,
        options: &ExtractOptions,
    ) -> domain::Result<(Vec<ChatSession>, ExtractionStats)> {
        collect_sessions(&self.paths, Some(self.folder.as_str()), options)
    }

    fn default_export_path(&self, dir: &Path, format: OutputFormat) -> PathBuf {
        let name = export_file_name(
            &project_name(&self.folder),
            Local::now().naive_local(),
            format,
        );
        dir.join(name)
    }
}

/// Main application logic.
fn run(cli: Cli) -> domain::Result<()> {
    if matches!(cli.command, Commands::InitConfig) {
        return cmd_init_config(cli.config.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;
    let format = cli
        .output_format(&config.export.format)
        .map_err(|message| AppError::Config { message })?;
    let paths = resolve_search_paths(&cli, &config)?;

    let ctx = Context {
        config,
        paths,
        format,
        folder: cli.folder,
        global_only: cli.global_only,
    };

    match cli.command {
        Commands::FindWorkspace { folder } => {
            cmd_find_workspace(&ctx, folder.as_deref().unwrap_or(&ctx.folder))?;
        }
        Commands::Workspaces => {
            cmd_workspaces(&ctx)?;
        }
        Commands::Paths => {
            cmd_paths(&ctx);
        }
        Commands::List {
            limit,
            min_messages,
            all_locations,
        } => {
            cmd_list(&ctx, limit, min_messages, all_locations)?;
        }
        Commands::Show {
            session_id,
            include_empty,
            last,
        } => {
            cmd_show(&ctx, &session_id, include_empty, last)?;
        }
        Commands::Export {
            output,
            session,
            min_messages,
            all_locations,
        } => {
            let target = ExportTarget::from_arg(output);
            cmd_export(&ctx, &target, session, min_messages, all_locations)?;
        }
        Commands::ExportAll {
            dir,
            limit,
            min_messages,
        } => {
            let dir = dir.unwrap_or_else(|| ctx.config.export.output_dir.clone());
            cmd_export_all(&ctx, &dir, limit, min_messages)?;
        }
        Commands::Quick {
            dir,
            min_messages,
            all_locations,
        } => {
            let dir = dir.unwrap_or_else(|| ctx.config.export.output_dir.clone());
            cmd_quick(&ctx, &dir, min_messages, all_locations)?;
        }
        Commands::Stats => {
            cmd_stats(&ctx)?;
        }
        Commands::InitConfig => {}
    }

    Ok(())
}

/// Search roots from `--data-dir`, the config file, or the platform default.
fn resolve_search_paths(cli: &Cli, config: &AppConfig) -> domain::Result<SearchPaths> {
    let data_dir = match cli.data_dir.clone().or_else(|| config.paths.editor_data_dir.clone()) {
        Some(dir) => dir,
        None => find_editor_data_dir(cli.insiders)?,
    };

    tracing::debug!("Using editor data dir: {}", data_dir.display());
    Ok(config.search_paths(&data_dir))
}

/// Print the workspace id for a folder; not finding one is an error.
fn cmd_find_workspace(ctx: &Context, folder: &str) -> domain::Result<()> {
    let resolver = WorkspaceResolver::new(&ctx.paths.workspace_storage);

    let id = resolver
        .find_workspace_id(folder)
        .ok_or_else(|| AppError::NotFound {
            message: format!("No workspace recorded for {folder}"),
        })?;

    println!("{id}");
    Ok(())
}

/// List known workspaces.
fn cmd_workspaces(ctx: &Context) -> domain::Result<()> {
    let resolver = WorkspaceResolver::new(&ctx.paths.workspace_storage);
    let mut entries: Vec<_> = resolver.list_workspaces().collect();
    entries.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    if ctx.format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).map_err(AppError::json_parse)?
        );
    } else if entries.is_empty() {
        println!(
            "{} No workspaces under {}",
            "⚠".yellow(),
            resolver.storage_root().display()
        );
    } else {
        println!("{}", format_workspaces_table(&entries));
        println!();
        println!("Total: {} workspace(s)", entries.len());
    }

    Ok(())
}

/// Show chat store locations command.
fn cmd_paths(ctx: &Context) {
    let workspace_id = if ctx.global_only {
        None
    } else {
        WorkspaceResolver::new(&ctx.paths.workspace_storage).find_workspace_id(&ctx.folder)
    };

    let locations = StoreLocator::new(ctx.paths.clone()).locate(workspace_id.as_deref());

    println!("{}", format_locations(workspace_id.as_deref(), &locations));
    if locations.is_empty() {
        println!("{}", "No chat data found.".yellow());
    }
}

/// List sessions command.
fn cmd_list(
    ctx: &Context,
    limit: usize,
    min_messages: Option<usize>,
    all_locations: bool,
) -> domain::Result<()> {
    let options = ExtractOptions {
        min_messages: min_messages.unwrap_or(ctx.config.export.min_messages),
        all_locations,
        ..ctx.options()
    };

    let (mut sessions, stats) = ctx.collect(&options)?;
    sessions.truncate(limit);

    println!("{}", format_sessions_table(&sessions));
    println!();
    println!("{}", format_stats(&stats));

    Ok(())
}

/// Show a single session.
fn cmd_show(
    ctx: &Context,
    id: &str,
    include_empty: bool,
    last: Option<usize>,
) -> domain::Result<()> {
    let options = ExtractOptions {
        include_empty,
        all_locations: true,
        min_messages: 0,
        ..ctx.options()
    };

    let (sessions, _) = ctx.collect(&options)?;

    // Find session by ID (partial match)
    let mut session = sessions
        .into_iter()
        .find(|s| s.session_id.starts_with(id) || s.session_id.contains(id))
        .ok_or_else(|| AppError::NotFound {
            message: format!("Session not found: {id}"),
        })?;

    // Apply --last filter if specified
    if let Some(n) = last {
        let len = session.messages.len();
        if n < len {
            session.messages.drain(..len - n);
        }
    }

    let output = match ctx.format {
        OutputFormat::Markdown => format_session_markdown(&session),
        format => render(std::slice::from_ref(&session), format).map_err(AppError::json_parse)?,
    };

    println!("{output}");
    Ok(())
}

/// Export sessions to file or stdout.
fn cmd_export(
    ctx: &Context,
    target: &ExportTarget,
    session_id: Option<String>,
    min_messages: Option<usize>,
    all_locations: bool,
) -> domain::Result<()> {
    let options = ExtractOptions {
        min_messages: min_messages.unwrap_or(ctx.config.export.min_messages),
        session_ids: session_id.map(|id| vec![id]),
        all_locations,
        ..ctx.options()
    };

    let (sessions, stats) = ctx.collect(&options)?;

    if sessions.is_empty() {
        eprintln!("{}", "No chat sessions found.".yellow());
    }

    let content = render(&sessions, ctx.format).map_err(AppError::json_parse)?;

    let path = match target {
        ExportTarget::Stdout => {
            println!("{content}");
            return Ok(());
        }
        ExportTarget::File(path) => path.clone(),
        ExportTarget::DefaultName => ctx.default_export_path(Path::new("."), ctx.format),
    };

    write_file(&path, &content)?;
    println!(
        "{} Exported {} sessions ({} messages) to {}",
        "✓".green().bold(),
        stats.session_count,
        stats.total_messages,
        path.display()
    );

    Ok(())
}

/// Export everything as JSON, Markdown and CSV into one directory.
fn cmd_quick(
    ctx: &Context,
    dir: &Path,
    min_messages: Option<usize>,
    all_locations: bool,
) -> domain::Result<()> {
    let options = ExtractOptions {
        min_messages: min_messages.unwrap_or(ctx.config.export.min_messages),
        all_locations,
        ..ctx.options()
    };

    let (sessions, stats) = ctx.collect(&options)?;

    if sessions.is_empty() {
        println!("{}", "No chat history found.".yellow());
        match &stats.workspace_id {
            Some(id) => println!("  Workspace ID: {}", id.cyan()),
            None => println!("  No workspace recorded for {}", ctx.folder),
        }
        return Ok(());
    }

    println!(
        "{} Found {} sessions with {} messages",
        "✓".green().bold(),
        stats.session_count,
        stats.total_messages
    );

    std::fs::create_dir_all(dir).map_err(|e| {
        AppError::io(format!("Failed to create directory {}", dir.display()), e)
    })?;

    // One timestamp so the three files share a name stem
    let at = Local::now().naive_local();
    let project = project_name(&ctx.folder);

    for format in QUICK_EXPORT_FORMATS {
        let path = dir.join(export_file_name(&project, at, format));
        let content = render(&sessions, format).map_err(AppError::json_parse)?;
        write_file(&path, &content)?;
        println!("  {} {}", "📄".bold(), path.display());
    }

    println!("\n{} Files saved in {}", "📁".bold(), dir.display());
    Ok(())
}

/// Export sessions to separate files with auto-generated names.
fn cmd_export_all(
    ctx: &Context,
    dir: &Path,
    limit: usize,
    min_messages: Option<usize>,
) -> domain::Result<()> {
    let options = ExtractOptions {
        min_messages: min_messages.unwrap_or(ctx.config.export.min_messages),
        ..ctx.options()
    };

    let (mut sessions, _) = ctx.collect(&options)?;

    if limit > 0 {
        sessions.truncate(limit);
    }

    // Create output directory
    std::fs::create_dir_all(dir).map_err(|e| {
        AppError::io(format!("Failed to create directory {}", dir.display()), e)
    })?;

    for (i, session) in sessions.iter().enumerate() {
        // Ids synthesized from store paths share prefixes; the index keeps names unique
        let path = dir.join(format!(
            "{:03}_{}.{}",
            i + 1,
            session.filename(),
            ctx.format.extension()
        ));
        let content = render(std::slice::from_ref(session), ctx.format)
            .map_err(AppError::json_parse)?;

        write_file(&path, &content)?;

        println!("{} {} → {}", "✓".green(), session.title.cyan(), path.display());
    }

    println!(
        "\n{} Exported {} sessions to {}",
        "📁".bold(),
        sessions.len(),
        dir.display()
    );

    Ok(())
}

/// Show statistics command.
fn cmd_stats(ctx: &Context) -> domain::Result<()> {
    let options = ExtractOptions {
        include_empty: true,
        min_messages: 0,
        ..ctx.options()
    };

    let (_, stats) = ctx.collect(&options)?;

    if ctx.format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).map_err(AppError::json_parse)?
        );
    } else {
        println!("{}", format_stats(&stats));
    }

    Ok(())
}

/// Write the default configuration file.
fn cmd_init_config(path: Option<&Path>) -> domain::Result<()> {
    let path = ensure_config_exists(path)?;
    println!("{} Configuration at {}", "✓".green().bold(), path.display());
    Ok(())
}

fn write_file(path: &Path, content: &str) -> domain::Result<()> {
    std::fs::write(path, content)
        .map_err(|e| AppError::io(format!("Failed to write {}", path.display()), e))
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
