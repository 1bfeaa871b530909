//! Output formatting for extracted chat data.
//!
//! Supports multiple output formats: Markdown, JSON, CSV and table view.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDateTime, Utc};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::domain::{ChatSession, ExtractionStats, Role, StorageLocation, WorkspaceEntry};

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable Markdown format.
    #[default]
    Markdown,
    /// JSON format for programmatic use.
    Json,
    /// One row per message, for spreadsheets.
    Csv,
    /// Compact table listing.
    Table,
}

/// Formats written by a quick export, in order.
pub const QUICK_EXPORT_FORMATS: [OutputFormat; 3] =
    [OutputFormat::Json, OutputFormat::Markdown, OutputFormat::Csv];

impl OutputFormat {
    /// File extension used when writing this format to disk.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Table => "txt",
        }
    }
}

/// Default export file name: `copilot_chat_<project>_<YYYYmmdd_HHMMSS>.<ext>`.
#[must_use]
pub fn export_file_name(project: &str, at: NaiveDateTime, format: OutputFormat) -> String {
    let project: String = project
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    format!(
        "copilot_chat_{}_{}.{}",
        project,
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "table" => Ok(Self::Table),
            _ => Err(format!("Unknown format: {s}. Use: markdown, json, csv, table")),
        }
    }
}

/// Renders sessions in the requested format.
///
/// # Errors
/// Returns error if JSON serialization fails.
pub fn render(sessions: &[ChatSession], format: OutputFormat) -> Result<String, serde_json::Error> {
    Ok(match format {
        OutputFormat::Markdown => format_sessions_markdown(sessions),
        OutputFormat::Json => format_sessions_json(sessions)?,
        OutputFormat::Csv => format_sessions_csv(sessions),
        OutputFormat::Table => format_sessions_table(sessions),
    })
}

/// Formats a single session as Markdown.
#[must_use]
pub fn format_session_markdown(session: &ChatSession) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# {} ({})\n", session.title, session.short_id());
    write_session_body(&mut out, session);

    out
}

/// Formats an export document with every session as Markdown.
#[must_use]
pub fn format_sessions_markdown(sessions: &[ChatSession]) -> String {
    let mut out = String::from("# Copilot Chat History Export\n\n");

    let _ = writeln!(
        out,
        "Exported on: {}\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "Total Sessions: {}", sessions.len());
    let _ = writeln!(out, "Total Messages: {}\n", total_messages(sessions));

    for (i, session) in sessions.iter().enumerate() {
        let _ = writeln!(out, "## Session {}: {}\n", i + 1, session.title);
        write_session_body(&mut out, session);
    }

    out
}

fn write_session_body(out: &mut String, session: &ChatSession) {
    if let Some(dt) = session.created_at {
        let _ = writeln!(out, "**Created:** {}", dt.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    let _ = writeln!(
        out,
        "**Messages:** {} ({} user, {} assistant)\n",
        session.message_count(),
        session.user_message_count(),
        session.assistant_message_count()
    );

    out.push_str("---\n\n");

    if session.is_empty() {
        out.push_str("_No messages._\n\n");
    }

    for message in &session.messages {
        let role = match message.role {
            Role::User => "👤 **User**",
            Role::Assistant => "🤖 **Assistant**",
            Role::System => "⚙️ **System**",
            Role::Unknown => "❓ **Unknown**",
        };

        let _ = writeln!(out, "### {role}\n");

        if let Some(dt) = message.timestamp {
            let _ = writeln!(out, "*{}*\n", dt.format("%Y-%m-%d %H:%M:%S"));
        }

        out.push_str(&message.content);
        out.push_str("\n\n---\n\n");
    }
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    exported_at: DateTime<Utc>,
    total_sessions: usize,
    total_messages: usize,
    sessions: &'a [ChatSession],
}

/// Formats sessions as a JSON export document.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_sessions_json(sessions: &[ChatSession]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ExportDocument {
        exported_at: Utc::now(),
        total_sessions: sessions.len(),
        total_messages: total_messages(sessions),
        sessions,
    })
}

/// Formats sessions as CSV, one row per message.
#[must_use]
pub fn format_sessions_csv(sessions: &[ChatSession]) -> String {
    let mut out = String::from("Session ID,Session Title,Message ID,Timestamp,Role,Content\n");

    for session in sessions {
        for message in &session.messages {
            let timestamp = message
                .timestamp
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default();
            let role = message.role.to_string();

            let row: Vec<String> = [
                session.session_id.as_str(),
                session.title.as_str(),
                message.id.as_str(),
                timestamp.as_str(),
                role.as_str(),
                message.content.as_str(),
            ]
            .iter()
            .map(|field| csv_field(field))
            .collect();

            out.push_str(&row.join(","));
            out.push('\n');
        }
    }

    out
}

/// Quotes a CSV field when it contains a separator, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Formats a table listing of sessions.
#[must_use]
pub fn format_sessions_table(sessions: &[ChatSession]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Created", "Msgs", "Title"]);

    for session in sessions {
        let created = session.created_at.map_or_else(
            || "-".to_string(),
            |dt| dt.format("%Y-%m-%d %H:%M").to_string(),
        );

        table.add_row(vec![
            session.short_id().to_string(),
            created,
            session.message_count().to_string(),
            truncate(&session.title, 50),
        ]);
    }

    table.to_string()
}

/// Formats known workspaces as a table.
#[must_use]
pub fn format_workspaces_table(entries: &[WorkspaceEntry]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Name", "Folder", "Exists"]);

    for entry in entries {
        let folder = entry
            .folder_path
            .as_ref()
            .map_or_else(|| entry.folder_uri.clone(), |p| p.display().to_string());

        table.add_row(vec![
            entry.id.clone(),
            entry.name.clone(),
            truncate(&folder, 60),
            if entry.exists { "yes" } else { "no" }.to_string(),
        ]);
    }

    table.to_string()
}

/// Formats the store locations being searched.
#[must_use]
pub fn format_locations(workspace_id: Option<&str>, locations: &[StorageLocation]) -> String {
    let mut out = format!("{}\n\n", "📂 Chat Store Locations".bold());

    if let Some(id) = workspace_id {
        let _ = writeln!(out, "  Workspace: {}\n", id.cyan());
    }

    for (i, location) in locations.iter().enumerate() {
        let label = match location.kind.priority() {
            0 => location.kind.label().blue(),
            1 => location.kind.label().green(),
            _ => location.kind.label().yellow(),
        };
        let _ = writeln!(out, "  {}. [{}] {}", i + 1, label, location.path.display());
    }

    let _ = write!(out, "\nTotal: {} location(s)", locations.len());
    out
}

/// Formats extraction statistics for display.
#[must_use]
pub fn format_stats(stats: &ExtractionStats) -> String {
    let workspace = stats.workspace_id.as_deref().unwrap_or("-");
    let date = |dt: Option<DateTime<Utc>>| {
        dt.map_or_else(|| "-".to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
    };

    let mut out = format!("{}\n", "📊 Statistics".bold());
    let _ = writeln!(out, "  Workspace: {}", workspace.cyan());
    let _ = writeln!(out, "  Sessions: {}", stats.session_count.to_string().cyan());
    let _ = writeln!(out, "  Total messages: {}", stats.total_messages.to_string().cyan());
    let _ = writeln!(out, "  User messages: {}", stats.user_messages.to_string().green());
    let _ = writeln!(
        out,
        "  Assistant messages: {}",
        stats.assistant_messages.to_string().blue()
    );
    let _ = writeln!(out, "  Oldest session: {}", date(stats.oldest_session));
    let _ = writeln!(out, "  Newest session: {}", date(stats.newest_session));
    let _ = write!(
        out,
        "  Locations scanned: {} ({} failed)",
        stats.locations_scanned.to_string().yellow(),
        stats.locations_failed
    );
    out
}

fn total_messages(sessions: &[ChatSession]) -> usize {
    sessions.iter().map(ChatSession::message_count).sum()
}

/// Truncates a string to its first line and at most `max_chars` characters.
fn truncate(s: &str, max_chars: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChatMessage;
    use serde_json::Value;

    fn sample() -> ChatSession {
        ChatSession {
            session_id: "abcdef1234".into(),
            title: "Fix, \"the\" build".into(),
            created_at: DateTime::from_timestamp(1_700_000_000, 0),
            messages: vec![
                ChatMessage {
                    id: "m1".into(),
                    timestamp: DateTime::from_timestamp(1_700_000_000, 0),
                    role: Role::User,
                    content: "why?\nline two".into(),
                    metadata: Some(
                        serde_json::json!({"model": "gpt-4o"})
                            .as_object()
                            .cloned()
                            .unwrap(),
                    ),
                },
                ChatMessage {
                    id: "m2".into(),
                    timestamp: None,
                    role: Role::Assistant,
                    content: "because".into(),
                    metadata: None,
                },
            ],
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world!", 8), "hello...");
        assert_eq!(truncate("héllo wörld", 6), "hél...");
        assert_eq!(truncate("first\nsecond", 20), "first");
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("markdown".parse::<OutputFormat>(), Ok(OutputFormat::Markdown));
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("csv".parse::<OutputFormat>(), Ok(OutputFormat::Csv));
        assert_eq!("table".parse::<OutputFormat>(), Ok(OutputFormat::Table));
        assert!("invalid".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Csv.extension(), "csv");
    }

    #[test]
    fn test_json_document() {
        let json = format_sessions_json(&[sample()]).unwrap();
        let doc: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(doc["total_sessions"], 1);
        assert_eq!(doc["total_messages"], 2);
        assert!(doc["exported_at"].is_string());
        assert_eq!(doc["sessions"][0]["session_id"], "abcdef1234");
        assert_eq!(doc["sessions"][0]["messages"][0]["role"], "user");
        assert!(doc["sessions"][0]["messages"][1]["timestamp"].is_null());
        assert_eq!(doc["sessions"][0]["messages"][0]["metadata"]["model"], "gpt-4o");
        assert!(doc["sessions"][0]["messages"][1].get("metadata").is_none());
    }

    #[test]
    fn test_csv_quoting() {
        let csv = format_sessions_csv(&[sample()]);
        let mut lines = csv.lines();

        assert_eq!(
            lines.next(),
            Some("Session ID,Session Title,Message ID,Timestamp,Role,Content")
        );
        assert!(csv.contains(r#""Fix, ""the"" build""#));
        assert!(csv.contains("\"why?\nline two\""));
        assert!(csv.contains(",m2,,Assistant,because\n"));
        assert!(!csv.contains("gpt-4o"));
    }

    #[test]
    fn test_export_file_name() {
        let at = chrono::NaiveDate::from_ymd_opt(2025, 3, 9)
            .and_then(|d| d.and_hms_opt(14, 5, 7))
            .unwrap();

        assert_eq!(
            export_file_name("my proj", at, OutputFormat::Json),
            "copilot_chat_my_proj_20250309_140507.json"
        );
        assert_eq!(
            export_file_name("app", at, OutputFormat::Markdown),
            "copilot_chat_app_20250309_140507.md"
        );
    }

    #[test]
    fn test_stats_show_session_range() {
        let stats = ExtractionStats {
            session_count: 2,
            oldest_session: DateTime::from_timestamp(1_700_000_000, 0),
            ..Default::default()
        };

        let text = format_stats(&stats);
        assert!(text.contains("Oldest session: 2023-11-14 22:13:20"));
        assert!(text.contains("Newest session: -"));
    }

    #[test]
    fn test_markdown() {
        let single = format_session_markdown(&sample());
        assert!(single.starts_with("# Fix, \"the\" build (abcdef12)"));
        assert!(single.contains("### 👤 **User**"));
        assert!(single.contains("**Messages:** 2 (1 user, 1 assistant)"));

        let export = format_sessions_markdown(&[sample()]);
        assert!(export.starts_with("# Copilot Chat History Export"));
        assert!(export.contains("Total Messages: 2"));
        assert!(export.contains("## Session 1: Fix"));
    }

    #[test]
    fn test_table_lists_sessions() {
        let table = format_sessions_table(&[sample()]);
        assert!(table.contains("abcdef12"));
        assert!(table.contains("2023-11-14"));
    }
}
