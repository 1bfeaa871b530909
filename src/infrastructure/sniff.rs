//! Store file discovery and format sniffing.
//!
//! A file's kind is decided from its opening bytes (and, for JSON, its
//! top-level keys), never from its extension.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use walkdir::WalkDir;

use crate::domain::{AppError, Result};

/// Header of every `SQLite` 3 database file.
const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Bytes read when sniffing a file.
const HEAD_LEN: u64 = 512;

/// How deep below a location directory store files are searched.
const MAX_SEARCH_DEPTH: usize = 4;

/// Structured-text stores larger than this are skipped.
const MAX_DOCUMENT_BYTES: u64 = 64 * 1024 * 1024;

/// Keys holding aggregated chat data in editor state.
const CHAT_DATA_KEYS: &[&str] = &[
    "interactive.sessions",
    "workbench.panel.aichat.view.aichat.chatdata",
    "workbench.panel.chat.view.chatView.chatdata",
    "aiChat.chatdata",
    "chat.data",
    "composer.composerData",
];

/// Key prefixes for individual chat entries.
const CHAT_KEY_PREFIXES: &[&str] = &[
    "composerData:",
    "bubbleId:",
    "chat.",
    "aichat.",
    "aiChat.",
    "copilot.",
    "interactive.",
];

/// Fragments of keys with an unknown schema that still look like chat data.
const CHAT_KEY_FRAGMENTS: &[&str] = &["chatdata", "conversation"];

/// Keys that look like chat data but hold metadata, settings or input history.
const IGNORED_KEYS: &[&str] = &[
    "chat.participantNameRegistry",
    "chat.ChatSessionStore.index",
    "chat.workspaceTransfer",
    "chat.customModes",
    "chat.setupContext",
];
const IGNORED_KEY_PREFIXES: &[&str] = &["memento/interactive-session", "workbench.panel.chat"];

/// Recognized kinds of chat store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    /// `SQLite` key-value database (`state.vscdb` and friends).
    KeyValueDb,
    /// JSON document with chat history embedded somewhere inside.
    StructuredText,
    /// JSON object of editor state keys, some holding chat data.
    StateBlob,
}

/// An opened store, tagged by its sniffed format.
#[derive(Debug)]
pub enum StoreFile {
    /// Database path; the connection is opened by the reader.
    KeyValueDb(PathBuf),
    /// Parsed JSON document.
    StructuredText(Value),
    /// Parsed editor state object.
    StateBlob(Map<String, Value>),
}

impl StoreFile {
    /// Format after refinement; JSON may have turned out to be a state blob.
    #[must_use]
    pub const fn format(&self) -> StoreFormat {
        match self {
            Self::KeyValueDb(_) => StoreFormat::KeyValueDb,
            Self::StructuredText(_) => StoreFormat::StructuredText,
            Self::StateBlob(_) => StoreFormat::StateBlob,
        }
    }
}

/// Sniffs a file's opening bytes.
///
/// JSON text is reported as [`StoreFormat::StructuredText`]; telling it apart
/// from a state blob needs the parsed keys (see [`open_store`]).
#[must_use]
pub fn sniff_bytes(head: &[u8]) -> Option<StoreFormat> {
    if head.starts_with(SQLITE_MAGIC) {
        return Some(StoreFormat::KeyValueDb);
    }

    let text = head.strip_prefix(UTF8_BOM).unwrap_or(head);
    match text.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{' | b'[') => Some(StoreFormat::StructuredText),
        _ => None,
    }
}

/// Sniffs a file on disk. Unreadable files are not stores.
#[must_use]
pub fn sniff_file(path: &Path) -> Option<StoreFormat> {
    let mut head = Vec::new();
    let read = File::open(path).and_then(|f| f.take(HEAD_LEN).read_to_end(&mut head));

    match read {
        Ok(_) => sniff_bytes(&head),
        Err(e) => {
            tracing::debug!("Cannot sniff {}: {}", path.display(), e);
            None
        }
    }
}

/// Whether an editor state key may hold chat data.
#[must_use]
pub fn is_chat_state_key(key: &str) -> bool {
    if CHAT_DATA_KEYS.contains(&key) {
        return true;
    }
    if IGNORED_KEYS.contains(&key) || IGNORED_KEY_PREFIXES.iter().any(|p| key.starts_with(p)) {
        return false;
    }
    if CHAT_KEY_PREFIXES.iter().any(|p| key.starts_with(p)) {
        return true;
    }

    let lower = key.to_lowercase();
    CHAT_KEY_FRAGMENTS.iter().any(|f| lower.contains(f))
}

/// Lists recognized store files below `dir`, in a stable order.
#[must_use]
pub fn store_files(dir: &Path) -> Vec<(PathBuf, StoreFormat)> {
    candidate_files(dir)
        .filter_map(|path| sniff_file(&path).map(|format| (path, format)))
        .collect()
}

/// Whether `dir` contains at least one recognized store file.
#[must_use]
pub fn has_store_file(dir: &Path) -> bool {
    candidate_files(dir).any(|path| sniff_file(&path).is_some())
}

fn candidate_files(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .max_depth(MAX_SEARCH_DEPTH)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        // Editor-made copies of the live database would duplicate every record
        .filter(|e| !e.file_name().to_string_lossy().ends_with(".backup"))
        .map(walkdir::DirEntry::into_path)
}

/// Opens a sniffed store, parsing structured text and refining its kind.
///
/// # Errors
/// Returns error if the file cannot be read or is not valid JSON.
pub fn open_store(path: &Path, format: StoreFormat) -> Result<StoreFile> {
    if format == StoreFormat::KeyValueDb {
        return Ok(StoreFile::KeyValueDb(path.to_path_buf()));
    }

    let size = std::fs::metadata(path)
        .map_err(|e| AppError::io(format!("Failed to stat {}", path.display()), e))?
        .len();
    if size > MAX_DOCUMENT_BYTES {
        return Err(AppError::parse_failure(
            path,
            format!("file too large ({size} bytes, max {MAX_DOCUMENT_BYTES})"),
        ));
    }

    let bytes = std::fs::read(path)
        .map_err(|e| AppError::io(format!("Failed to read {}", path.display()), e))?;
    let text = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

    let document: Value =
        serde_json::from_slice(text).map_err(|e| AppError::parse_failure(path, e.to_string()))?;

    Ok(match document {
        Value::Object(entries) if entries.keys().any(|k| is_chat_state_key(k)) => {
            StoreFile::StateBlob(entries)
        }
        document => StoreFile::StructuredText(document),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_sniff_bytes() {
        assert_eq!(
            sniff_bytes(b"SQLite format 3\0\x10\x00"),
            Some(StoreFormat::KeyValueDb)
        );
        assert_eq!(
            sniff_bytes(b"\n  {\"requests\": []}"),
            Some(StoreFormat::StructuredText)
        );
        assert_eq!(
            sniff_bytes(b"\xEF\xBB\xBF[1, 2]"),
            Some(StoreFormat::StructuredText)
        );
        assert_eq!(sniff_bytes(b"just some notes"), None);
        assert_eq!(sniff_bytes(b""), None);
    }

    #[test]
    fn test_extension_is_not_trusted() {
        let dir = tempdir().unwrap();
        let fake_db = dir.path().join("chat.vscdb");
        let real_json = dir.path().join("history.data");
        fs::write(&fake_db, "not a database").unwrap();
        fs::write(&real_json, r#"{"messages": []}"#).unwrap();

        assert_eq!(sniff_file(&fake_db), None);
        assert_eq!(sniff_file(&real_json), Some(StoreFormat::StructuredText));
    }

    #[test]
    fn test_chat_state_keys() {
        assert!(is_chat_state_key("interactive.sessions"));
        assert!(is_chat_state_key("composerData:abc"));
        assert!(is_chat_state_key("bubbleId:abc:def"));
        assert!(is_chat_state_key("workbench.panel.chat.view.chatView.chatdata"));
        assert!(is_chat_state_key("someExtension.conversationHistory"));
        assert!(!is_chat_state_key("memento/interactive-session"));
        assert!(!is_chat_state_key("chat.ChatSessionStore.index"));
        assert!(!is_chat_state_key("workbench.panel.chat.numberOfVisibleViews"));
        assert!(!is_chat_state_key("editor.fontSize"));
    }

    #[test]
    fn test_store_files_and_probe() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        assert!(!has_store_file(dir.path()));
        assert!(store_files(dir.path()).is_empty());

        let nested = dir.path().join("chatSessions");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("state.vscdb.backup"), "SQLite format 3\0").unwrap();

        assert!(has_store_file(dir.path()));
        let files = store_files(dir.path());
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, nested.join("a.json"));
    }

    #[test]
    fn test_open_store_refines_state_blob() {
        let dir = tempdir().unwrap();
        let blob = dir.path().join("state.json");
        let doc = dir.path().join("session.json");
        fs::write(&blob, r#"{"interactive.sessions": "[]", "editor.fontSize": 12}"#).unwrap();
        fs::write(&doc, r#"{"sessionId": "s1", "requests": []}"#).unwrap();

        assert_eq!(
            open_store(&blob, StoreFormat::StructuredText).unwrap().format(),
            StoreFormat::StateBlob
        );
        assert_eq!(
            open_store(&doc, StoreFormat::StructuredText).unwrap().format(),
            StoreFormat::StructuredText
        );
    }

    #[test]
    fn test_open_store_corrupt_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{\"requests\": [").unwrap();

        assert!(matches!(
            open_store(&path, StoreFormat::StructuredText),
            Err(AppError::ParseFailure { .. })
        ));
    }
}
