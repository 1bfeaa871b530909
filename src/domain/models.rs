//! Domain models for Copilot chat data.
//!
//! Canonical entities handed to the writers, plus the intermediate values the
//! resolver, locator and extractor pass between each other.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::path;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message from the user (human).
    User,
    /// Message from the AI assistant.
    Assistant,
    /// System or instruction message.
    System,
    /// Unrecognized role label.
    #[default]
    Unknown,
}

impl Role {
    /// Maps a source role label to a canonical role.
    ///
    /// Matching is exact: labels such as `"Human"` are [`Role::Unknown`].
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "user" | "human" => Self::User,
            "assistant" => Self::Assistant,
            "system" => Self::System,
            _ => Self::Unknown,
        }
    }

    /// Maps Cursor's numeric bubble type.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            1 => Self::User,
            2 => Self::Assistant,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::Assistant => write!(f, "Assistant"),
            Self::System => write!(f, "System"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A single canonical chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Identifier, unique within its session.
    pub id: String,
    /// When this message was sent, if the source recorded it.
    pub timestamp: Option<DateTime<Utc>>,
    /// Who wrote the message.
    pub role: Role,
    /// Message text (possibly empty, never absent).
    pub content: String,
    /// Raw source fields, kept for JSON exports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// A canonical chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Identifier, unique across an export.
    pub session_id: String,
    /// Explicit or derived title.
    pub title: String,
    /// When this session was created.
    pub created_at: Option<DateTime<Utc>>,
    /// Messages ordered by time when known, else extraction order.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

impl ChatSession {
    /// Sessions without messages are valid but flagged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Get total message count.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Get user message count.
    #[must_use]
    pub fn user_message_count(&self) -> usize {
        self.count_role(Role::User)
    }

    /// Get assistant message count.
    #[must_use]
    pub fn assistant_message_count(&self) -> usize {
        self.count_role(Role::Assistant)
    }

    fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }

    /// Latest known time in the session: its newest message, else its creation.
    #[must_use]
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.messages
            .iter()
            .filter_map(|m| m.timestamp)
            .max()
            .or(self.created_at)
    }

    /// Short form of the session id for tables and filenames.
    #[must_use]
    pub fn short_id(&self) -> &str {
        let end = self
            .session_id
            .char_indices()
            .nth(8)
            .map_or(self.session_id.len(), |(i, _)| i);
        &self.session_id[..end]
    }

    /// Get a safe filename based on the title.
    #[must_use]
    pub fn filename(&self) -> String {
        let cleaned: String = self
            .title
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
            .collect();

        let slug = cleaned
            .split_whitespace()
            .take(8)
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase();

        let short_id: String = self
            .short_id()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
            .collect();

        if slug.is_empty() {
            short_id
        } else {
            format!("{short_id}_{slug}")
        }
    }
}

/// Per-workspace metadata read from `workspace.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceDescriptor {
    /// Folder URI recorded by the editor (e.g. `file:///home/user/proj`).
    pub folder_uri: String,
    /// Storage subdirectory name, which is the workspace identifier.
    pub storage_dir_name: String,
}

/// One workspace known to the editor.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceEntry {
    /// Opaque workspace identifier.
    pub id: String,
    /// Folder URI as recorded.
    pub folder_uri: String,
    /// Decoded local path, `None` for remote workspaces.
    pub folder_path: Option<PathBuf>,
    /// Project name (last path segment).
    pub name: String,
    /// Whether the local folder still exists.
    pub exists: bool,
}

impl WorkspaceEntry {
    /// Builds an entry from a descriptor, decoding the folder URI.
    #[must_use]
    pub fn from_descriptor(descriptor: WorkspaceDescriptor) -> Self {
        let folder_path = path::local_path(&descriptor.folder_uri);

        let name = path::normalize(&descriptor.folder_uri)
            .rsplit('/')
            .find(|s| !s.is_empty())
            .unwrap_or("unknown")
            .to_string();

        let exists = folder_path.as_ref().is_some_and(|p| p.exists());

        Self {
            id: descriptor.storage_dir_name,
            folder_uri: descriptor.folder_uri,
            folder_path,
            name,
            exists,
        }
    }
}

/// Category of a chat store location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// `workspaceStorage/<id>` for the resolved workspace.
    WorkspaceSpecific,
    /// Editor-wide `globalStorage`.
    Global,
    /// Cached extension data.
    CachedExtension,
    /// `./db` relative to the working directory.
    LocalFallback,
}

impl LocationKind {
    /// Search priority; lower is searched first.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::WorkspaceSpecific => 0,
            Self::Global => 1,
            Self::CachedExtension => 2,
            Self::LocalFallback => 3,
        }
    }

    /// Short label for display.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::WorkspaceSpecific => "workspace",
            Self::Global => "global",
            Self::CachedExtension => "cached",
            Self::LocalFallback => "local",
        }
    }
}

/// A directory expected to contain chat stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageLocation {
    /// Directory to search.
    pub path: PathBuf,
    /// What kind of location this is.
    pub kind: LocationKind,
    /// Search priority (lower first).
    pub priority: u8,
}

impl StorageLocation {
    /// Creates a location with the priority implied by its kind.
    #[must_use]
    pub fn new(path: PathBuf, kind: LocationKind) -> Self {
        Self {
            path,
            kind,
            priority: kind.priority(),
        }
    }
}

/// Unnormalized unit of chat data.
///
/// A record with `message: None` only carries session metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// Store file and key path this record came from.
    pub origin: String,
    /// Explicit session identifier from the source, if any.
    pub session_id: Option<String>,
    /// Session title from the source, if any.
    pub session_title: Option<String>,
    /// Raw session creation value (number or string).
    pub session_created: Option<Value>,
    /// Message fields as found in the source.
    pub message: Option<Map<String, Value>>,
}

impl RawRecord {
    /// A record carrying one message body.
    #[must_use]
    pub fn message(origin: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            origin: origin.into(),
            message: Some(fields),
            ..Self::default()
        }
    }

    /// A record carrying only session metadata.
    #[must_use]
    pub fn header(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Self::default()
        }
    }
}

/// Summary statistics for an extraction run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionStats {
    /// Resolved workspace identifier, if any.
    pub workspace_id: Option<String>,
    /// Number of sessions exported.
    pub session_count: usize,
    /// Total number of messages.
    pub total_messages: usize,
    /// Total user messages.
    pub user_messages: usize,
    /// Total assistant messages.
    pub assistant_messages: usize,
    /// Store locations examined.
    pub locations_scanned: usize,
    /// Store locations whose parsing failed.
    pub locations_failed: usize,
    /// Creation time of the oldest dated session.
    pub oldest_session: Option<DateTime<Utc>>,
    /// Latest activity across all sessions.
    pub newest_session: Option<DateTime<Utc>>,
}

impl ExtractionStats {
    /// Adds one exported session to the totals.
    pub fn record_session(&mut self, session: &ChatSession) {
        self.session_count += 1;
        self.total_messages += session.message_count();
        self.user_messages += session.user_message_count();
        self.assistant_messages += session.assistant_message_count();

        if let Some(created) = session.created_at {
            self.oldest_session = Some(self.oldest_session.map_or(created, |t| t.min(created)));
        }
        if let Some(latest) = session.last_activity() {
            self.newest_session = Some(self.newest_session.map_or(latest, |t| t.max(latest)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str, title: &str) -> ChatSession {
        ChatSession {
            session_id: id.into(),
            title: title.into(),
            created_at: None,
            messages: Vec::new(),
        }
    }

    #[test]
    fn test_role_labels_are_exact() {
        assert_eq!(Role::from_label("user"), Role::User);
        assert_eq!(Role::from_label("assistant"), Role::Assistant);
        assert_eq!(Role::from_label("system"), Role::System);
        assert_eq!(Role::from_label("Human"), Role::Unknown);
        assert_eq!(Role::from_code(2), Role::Assistant);
        assert_eq!(Role::from_code(7), Role::Unknown);
    }

    #[test]
    fn test_filename() {
        let s = session("0f3a9c2e-1111", "How do I: parse TOML?");
        assert_eq!(s.filename(), "0f3a9c2e_how_do_i_parse_toml");

        let untitled = session("ws.vscdb:chat[0]", "");
        assert_eq!(untitled.filename(), "ws_vscdb");
    }

    #[test]
    fn test_stats_track_oldest_and_newest() {
        let message = |secs: i64| ChatMessage {
            id: secs.to_string(),
            timestamp: DateTime::from_timestamp(secs, 0),
            role: Role::User,
            content: "q".into(),
            metadata: None,
        };

        let mut old = session("old", "t");
        old.created_at = DateTime::from_timestamp(1_000, 0);
        old.messages.push(message(1_500));
        let mut new = session("new", "t");
        new.created_at = DateTime::from_timestamp(2_000, 0);
        new.messages.push(message(9_000));

        let mut stats = ExtractionStats::default();
        stats.record_session(&new);
        stats.record_session(&session("undated", "t"));
        stats.record_session(&old);

        assert_eq!(stats.session_count, 3);
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.oldest_session, DateTime::from_timestamp(1_000, 0));
        assert_eq!(stats.newest_session, DateTime::from_timestamp(9_000, 0));
    }

    #[test]
    fn test_empty_session_flag() {
        let s = session("s1", "t");
        assert!(s.is_empty());
    }

    #[test]
    fn test_location_priority_follows_kind() {
        let loc = StorageLocation::new(PathBuf::from("/tmp"), LocationKind::CachedExtension);
        assert_eq!(loc.priority, 2);
        assert!(LocationKind::WorkspaceSpecific.priority() < LocationKind::Global.priority());
    }
}
