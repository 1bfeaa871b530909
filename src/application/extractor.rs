//! Chat data extraction.
//!
//! Reads every store file below a location and turns its content into raw
//! records. Failures are contained per file: one corrupt store never hides
//! the records of its siblings.

use std::path::Path;

use serde_json::{Map, Value};

use crate::domain::{RawRecord, Result, StorageLocation};
use crate::infrastructure::sniff::is_chat_state_key;
use crate::infrastructure::{open_store, store_files, StateDbReader, StoreFile, StoreFormat};

use super::normalizer::parse_timestamp;
use super::parser::{records_from_document, records_from_state_bytes, records_from_state_entry};

/// Row columns that carry a session identifier.
const SESSION_COLUMNS: &[&str] = &["session_id", "sessionId", "conversation_id", "conversationId"];

/// Column name fragments, matched case-insensitively, for row fields.
const CONTENT_FRAGMENTS: &[&str] = &["content", "message", "text", "body"];
const ROLE_FRAGMENTS: &[&str] = &["role", "type", "sender"];
const TIME_FRAGMENTS: &[&str] = &["time", "date"];

/// Outcome of extracting one location.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// At least one message was recovered.
    Found(Vec<RawRecord>),
    /// The location holds no chat messages.
    NotFound,
    /// Every store that could hold data failed to parse.
    Failed(String),
}

impl Extraction {
    /// Whether messages were recovered.
    #[must_use]
    pub const fn found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Recovered records; empty unless [`Extraction::Found`].
    #[must_use]
    pub fn records(self) -> Vec<RawRecord> {
        match self {
            Self::Found(records) => records,
            Self::NotFound | Self::Failed(_) => Vec::new(),
        }
    }
}

/// Extracts raw chat records from store locations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatDataExtractor;

impl ChatDataExtractor {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Extracts every store file below `location`.
    ///
    /// Never fails: unreadable or corrupt files are logged and counted, and
    /// the location is [`Extraction::Failed`] only if nothing was recovered
    /// while at least one file failed. Session headers alone (titles or dates
    /// without any message) do not count as found.
    #[must_use]
    pub fn extract(&self, location: &StorageLocation) -> Extraction {
        tracing::info!(
            "Extracting from {} location: {}",
            location.kind.label(),
            location.path.display()
        );

        let mut records = Vec::new();
        let mut failures = Vec::new();

        for (path, format) in store_files(&location.path) {
            match extract_file(&path, format) {
                Ok(found) => {
                    tracing::debug!("{} record(s) from {}", found.len(), path.display());
                    records.extend(found);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    failures.push(e.to_string());
                }
            }
        }

        if records.iter().any(|r| r.message.is_some()) {
            Extraction::Found(records)
        } else if failures.is_empty() {
            Extraction::NotFound
        } else {
            Extraction::Failed(failures.join("; "))
        }
    }
}

/// Extracts records from a single sniffed store file.
///
/// # Errors
/// Returns error if the store cannot be opened or parsed.
pub fn extract_file(path: &Path, format: StoreFormat) -> Result<Vec<RawRecord>> {
    let origin = path.display().to_string();

    let store = open_store(path, format)?;
    tracing::trace!("Opened {} as {:?}", origin, store.format());

    match store {
        StoreFile::KeyValueDb(db) => extract_database(&db, &origin),
        StoreFile::StructuredText(document) => Ok(records_from_document(&document, &origin)),
        StoreFile::StateBlob(entries) => Ok(entries
            .iter()
            .filter(|(key, _)| is_chat_state_key(key))
            .flat_map(|(key, value)| records_from_state_entry(&origin, key, value))
            .collect()),
    }
}

fn extract_database(path: &Path, origin: &str) -> Result<Vec<RawRecord>> {
    let reader = StateDbReader::open(path)?;
    let tables = reader.tables()?;
    let mut records = Vec::new();

    for entry in reader.fetch_chat_entries(&tables)? {
        match records_from_state_bytes(origin, &entry.key, &entry.value) {
            Ok(found) => records.extend(found),
            Err(e) => tracing::debug!("Undecodable value for key {}: {}", entry.key, e),
        }
    }

    for table in StateDbReader::chat_tables(&tables) {
        match reader.fetch_rows(table) {
            Ok(rows) => records.extend(table_records(origin, table, rows)),
            Err(e) => tracing::debug!("Failed to scan table {}: {}", table, e),
        }
    }

    Ok(records)
}

/// One message record per row with text; rows without a session column share
/// a session named after the table.
///
/// Column names vary between tools, so content, role and time are picked by
/// name fragment and copied under their canonical keys.
fn table_records(origin: &str, table: &str, rows: Vec<Map<String, Value>>) -> Vec<RawRecord> {
    let origin = format!("{origin}#{table}");

    rows.into_iter()
        .filter_map(|row| {
            let fields = canonical_row(row)?;
            let session_id = SESSION_COLUMNS.iter().find_map(|c| match fields.get(*c)? {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
            let mut record = RawRecord::message(origin.clone(), fields);
            record.session_id = session_id;
            Some(record)
        })
        .collect()
}

/// Adds `content`, `role` and `timestamp` keys to a row; `None` without text.
fn canonical_row(mut row: Map<String, Value>) -> Option<Map<String, Value>> {
    let content = row
        .iter()
        .filter(|(name, _)| is_content_column(name))
        .find_map(|(_, value)| value.as_str().filter(|s| !s.trim().is_empty()))?
        .to_string();

    let role = row
        .iter()
        .filter(|(name, _)| column_has(name, ROLE_FRAGMENTS))
        .find_map(|(_, value)| value.as_str().map(str::to_string));

    let timestamp = row
        .iter()
        .filter(|(name, _)| column_has(name, TIME_FRAGMENTS))
        .map(|(_, value)| value)
        .find(|value| parse_timestamp(value).is_some())
        .cloned();

    let has_content = row
        .get("content")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());
    if !has_content {
        row.insert("content".into(), Value::String(content));
    }
    if let Some(role) = role {
        row.entry("role").or_insert(Value::String(role));
    }
    if let Some(timestamp) = timestamp {
        row.entry("timestamp").or_insert(timestamp);
    }

    Some(row)
}

fn column_has(name: &str, fragments: &[&str]) -> bool {
    let lower = name.to_lowercase();
    fragments.iter().any(|f| lower.contains(f))
}

/// Text columns, excluding ids and columns that name a role or a time.
fn is_content_column(name: &str) -> bool {
    let lower = name.to_lowercase();
    column_has(name, CONTENT_FRAGMENTS)
        && !column_has(name, ROLE_FRAGMENTS)
        && !column_has(name, TIME_FRAGMENTS)
        && !lower.ends_with("id")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LocationKind;
    use rusqlite::Connection;
    use std::fs;
    use tempfile::tempdir;

    const SESSION_JSON: &str = r#"{
        "sessionId": "s-1",
        "creationDate": 1700000000000,
        "requests": [
            {"requestId": "r1", "message": {"text": "hello"}, "response": [{"value": "hi"}]}
        ]
    }"#;

    fn location(path: &Path) -> StorageLocation {
        StorageLocation::new(path.to_path_buf(), LocationKind::Global)
    }

    #[test]
    fn test_extract_structured_text() {
        let dir = tempdir().unwrap();
        let sessions = dir.path().join("chatSessions");
        fs::create_dir(&sessions).unwrap();
        fs::write(sessions.join("s-1.json"), SESSION_JSON).unwrap();

        let extraction = ChatDataExtractor::new().extract(&location(dir.path()));
        assert!(extraction.found());

        let records = extraction.records();
        let messages: Vec<_> = records.iter().filter(|r| r.message.is_some()).collect();
        assert_eq!(messages.len(), 2);
        assert!(records.iter().all(|r| r.session_id.as_deref() == Some("s-1")));
    }

    #[test]
    fn test_extract_key_value_db() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("state.vscdb");
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch(
            "CREATE TABLE ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB);
             CREATE TABLE chat_log (session_id TEXT, role TEXT, content TEXT, timestamp INTEGER);
             INSERT INTO chat_log VALUES ('t1', 'user', 'from table', 1700000000);
             INSERT INTO chat_log VALUES ('t1', 'assistant', '', 1700000001);",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO ItemTable VALUES ('interactive.sessions', ?1)",
            [format!("[{SESSION_JSON}]")],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO ItemTable VALUES ('memento/interactive-session', ?1)",
            [r#"{"history": {"copilot": [{"text": "typed input"}]}}"#],
        )
        .unwrap();
        drop(conn);

        let records = ChatDataExtractor::new().extract(&location(dir.path())).records();

        let texts: Vec<_> = records
            .iter()
            .filter_map(|r| r.message.as_ref())
            .filter_map(|m| m.get("content").and_then(Value::as_str))
            .collect();
        assert_eq!(texts, vec!["hello", "hi", "from table"]);

        let row = records.iter().find(|r| r.origin.ends_with("#chat_log")).unwrap();
        assert_eq!(row.session_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_table_columns_matched_by_fragment() {
        let dir = tempdir().unwrap();
        let conn = Connection::open(dir.path().join("history.db")).unwrap();
        conn.execute_batch(
            "CREATE TABLE message_log (
                 message_id TEXT, sender_role TEXT, message_text TEXT, sent_time INTEGER
             );
             INSERT INTO message_log VALUES ('m1', 'user', 'how do I?', 1700000000);
             INSERT INTO message_log VALUES ('m2', 'assistant', 'like so', 1700000005);
             INSERT INTO message_log VALUES ('m3', 'assistant', '   ', 1700000009);",
        )
        .unwrap();
        drop(conn);

        let records = ChatDataExtractor::new().extract(&location(dir.path())).records();
        assert_eq!(records.len(), 2);

        let first = records[0].message.as_ref().unwrap();
        assert_eq!(first["content"], "how do I?");
        assert_eq!(first["role"], "user");
        assert_eq!(first["timestamp"], 1_700_000_000);
        assert_eq!(first["message_id"], "m1");
        assert_eq!(records[1].message.as_ref().unwrap()["role"], "assistant");
    }

    #[test]
    fn test_header_only_location_is_not_found() {
        let dir = tempdir().unwrap();
        let linter = dir.path().join("some.linter");
        fs::create_dir(&linter).unwrap();
        fs::write(linter.join("cache.json"), r#"{"file": "a.py", "messages": []}"#).unwrap();

        assert_eq!(
            ChatDataExtractor::new().extract(&location(dir.path())),
            Extraction::NotFound
        );
    }

    #[test]
    fn test_extract_state_blob() {
        let dir = tempdir().unwrap();
        let blob = serde_json::json!({
            "interactive.sessions": serde_json::to_string(&serde_json::json!([
                {"sessionId": "b1", "requests": [{"message": {"text": "q"}}]}
            ])).unwrap(),
            "editor.fontSize": 14
        });
        fs::write(dir.path().join("storage.json"), blob.to_string()).unwrap();

        let records = ChatDataExtractor::new().extract(&location(dir.path())).records();
        assert_eq!(records.len(), 2);
        assert!(records[0].origin.ends_with("#interactive.sessions[0]"));
    }

    #[test]
    fn test_one_corrupt_file_does_not_hide_siblings() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.json"), "{\"requests\": [").unwrap();
        fs::write(dir.path().join("b.json"), SESSION_JSON).unwrap();

        let extraction = ChatDataExtractor::new().extract(&location(dir.path()));
        assert!(extraction.found());
    }

    #[test]
    fn test_failed_and_not_found() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "[{").unwrap();
        assert!(matches!(
            ChatDataExtractor::new().extract(&location(dir.path())),
            Extraction::Failed(_)
        ));

        let empty = tempdir().unwrap();
        fs::write(empty.path().join("settings.json"), r#"{"editor.fontSize": 12}"#).unwrap();
        assert_eq!(
            ChatDataExtractor::new().extract(&location(empty.path())),
            Extraction::NotFound
        );
    }
}
