//! `SQLite` database reader for VS Code state databases.
//!
//! Reads chat-related entries from the `ItemTable` / `cursorDiskKV` key-value
//! tables, and rows from any table whose name suggests chat content.

use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::{Map, Number, Value};

use crate::domain::{AppError, Result};

use super::sniff::is_chat_state_key;

/// Key-value tables used by VS Code and its forks.
const KV_TABLES: &[&str] = &["ItemTable", "cursorDiskKV"];

/// Coarse SQL filter; [`is_chat_state_key`] makes the final decision.
/// `LIKE` is case-insensitive for ASCII.
const KV_KEY_FILTER: &str = "key LIKE '%chat%' OR key LIKE '%interactive%' \
     OR key LIKE '%copilot%' OR key LIKE '%conversation%' \
     OR key LIKE 'composerData:%' OR key LIKE 'bubbleId:%'";

/// Table names that suggest chat content.
const CHAT_TABLE_INDICATORS: &[&str] = &["chat", "message", "conversation", "copilot", "session"];

/// Upper bound on rows read from a single chat table.
const MAX_TABLE_ROWS: usize = 100_000;

/// Raw key-value pair from the database.
#[derive(Debug)]
pub struct RawKvEntry {
    pub key: String,
    pub value: Vec<u8>,
}

/// `SQLite` reader for editor state databases.
pub struct StateDbReader {
    conn: Connection,
}

impl StateDbReader {
    /// Opens a state database in read-only mode.
    ///
    /// # Errors
    /// Returns error if database cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(path, flags).map_err(AppError::database)?;

        // Optimize for read-only access
        conn.execute_batch(
            "PRAGMA query_only = ON;
             PRAGMA temp_store = MEMORY;",
        )
        .map_err(AppError::database)?;

        Ok(Self { conn })
    }

    /// Lists all table names.
    ///
    /// # Errors
    /// Returns error if the schema cannot be read (e.g. not a database).
    pub fn tables(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .map_err(AppError::database)?;

        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(AppError::database)?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(names)
    }

    /// Fetches chat-related entries from every key-value table present.
    ///
    /// # Errors
    /// Returns error if a query fails.
    pub fn fetch_chat_entries(&self, tables: &[String]) -> Result<Vec<RawKvEntry>> {
        let mut entries = Vec::new();

        for table in tables.iter().filter(|t| KV_TABLES.contains(&t.as_str())) {
            let sql = format!(
                "SELECT key, value FROM {} WHERE {KV_KEY_FILTER} ORDER BY key",
                quote_ident(table)
            );
            let mut stmt = self.conn.prepare(&sql).map_err(AppError::database)?;

            let rows = stmt
                .query_map([], |row| {
                    let key: String = row.get(0)?;
                    // Handle both TEXT and BLOB value types
                    let value = match row.get_ref(1)? {
                        ValueRef::Blob(b) => b.to_vec(),
                        ValueRef::Text(t) => t.to_vec(),
                        _ => Vec::new(),
                    };
                    Ok(RawKvEntry { key, value })
                })
                .map_err(AppError::database)?;

            let before = entries.len();
            for row in rows {
                match row {
                    Ok(entry) if is_chat_state_key(&entry.key) => entries.push(entry),
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Failed to read row: {}", e);
                    }
                }
            }

            tracing::debug!("Fetched {} chat entries from {}", entries.len() - before, table);
        }

        Ok(entries)
    }

    /// Names of non key-value tables that look like chat storage.
    #[must_use]
    pub fn chat_tables(tables: &[String]) -> Vec<&str> {
        tables
            .iter()
            .map(String::as_str)
            .filter(|t| !KV_TABLES.contains(t))
            .filter(|t| {
                let lower = t.to_lowercase();
                CHAT_TABLE_INDICATORS.iter().any(|i| lower.contains(i))
            })
            .collect()
    }

    /// Reads every row of a table as a column-name → JSON value map.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn fetch_rows(&self, table: &str) -> Result<Vec<Map<String, Value>>> {
        let sql = format!("SELECT * FROM {} LIMIT {MAX_TABLE_ROWS}", quote_ident(table));
        let mut stmt = self.conn.prepare(&sql).map_err(AppError::database)?;

        let columns: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();

        let rows = stmt
            .query_map([], |row| {
                let mut map = Map::new();
                for (i, name) in columns.iter().enumerate() {
                    map.insert(name.clone(), to_json(row.get_ref(i)?));
                }
                Ok(map)
            })
            .map_err(AppError::database)?;

        let mut out = Vec::new();
        for row in rows {
            match row {
                Ok(map) => out.push(map),
                Err(e) => tracing::warn!("Failed to read row from {}: {}", table, e),
            }
        }

        tracing::debug!("Fetched {} rows from table '{}'", out.len(), table);

        Ok(out)
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => std::str::from_utf8(b)
            .map_or(Value::Null, |s| Value::String(s.to_string())),
    }
}
