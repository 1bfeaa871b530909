//! Session normalization.
//!
//! Turns raw records into canonical sessions: grouping, title derivation,
//! role mapping, timestamp parsing, id assignment and ordering.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::domain::{ChatMessage, ChatSession, RawRecord, Role};

use super::parser::content_text;

/// Title used when a session has neither a title nor a user message.
pub const UNTITLED_SESSION: &str = "Untitled session";

/// Maximum title length (in characters) when derived from a message.
const TITLE_MAX_CHARS: usize = 60;

/// Numbers above this are epoch milliseconds, below it epoch seconds.
const MILLIS_THRESHOLD: f64 = 1e10;

const ID_KEYS: &[&str] = &["id", "messageId", "bubbleId", "requestId"];
const ROLE_KEYS: &[&str] = &["role", "type", "sender", "author"];
const CONTENT_KEYS: &[&str] = &["content", "text", "message", "body"];
const TIMESTAMP_KEYS: &[&str] = &[
    "timestamp",
    "createdAt",
    "created_at",
    "time",
    "date",
    "creationDate",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Sessions under construction, keyed by session id.
struct Group {
    session_id: String,
    title: Option<String>,
    created_at: Option<DateTime<Utc>>,
    messages: Vec<ChatMessage>,
    /// Source id to the positions of messages that arrived under it.
    by_source_id: HashMap<String, Vec<usize>>,
    assigned_ids: HashSet<String>,
    next_position: usize,
}

impl Group {
    fn new(session_id: String) -> Self {
        Self {
            session_id,
            title: None,
            created_at: None,
            messages: Vec::new(),
            by_source_id: HashMap::new(),
            assigned_ids: HashSet::new(),
            next_position: 0,
        }
    }

    fn absorb(&mut self, record: RawRecord) {
        if self.title.is_none() {
            self.title = record
                .session_title
                .filter(|t| !t.trim().is_empty());
        }
        if self.created_at.is_none() {
            self.created_at = record.session_created.as_ref().and_then(parse_timestamp);
        }

        let Some(fields) = record.message else {
            return;
        };

        let position = self.next_position;
        self.next_position += 1;

        let source_id =
            field_id(&fields).unwrap_or_else(|| format!("{}:{position}", self.session_id));
        let timestamp = field_timestamp(&fields);
        let role = field_role(&fields);
        let content = field_content(&fields);

        let earlier = self.by_source_id.entry(source_id.clone()).or_default();
        if earlier.iter().any(|&i| {
            let m = &self.messages[i];
            m.role == role && m.content == content && m.timestamp == timestamp
        }) {
            tracing::trace!("Dropping duplicate message {} in {}", source_id, self.session_id);
            return;
        }
        earlier.push(self.messages.len());

        // A reused source id on a different message gets a fresh suffix
        let mut id = source_id.clone();
        let mut n = 0;
        while !self.assigned_ids.insert(id.clone()) {
            n += 1;
            id = format!("{source_id}#{n}");
        }

        self.messages.push(ChatMessage {
            id,
            timestamp,
            role,
            content,
            metadata: Some(fields),
        });
    }

    fn finish(mut self) -> ChatSession {
        if self.messages.iter().all(|m| m.timestamp.is_some()) {
            self.messages.sort_by_key(|m| m.timestamp);
        }

        let created_at = self
            .created_at
            .or_else(|| self.messages.iter().filter_map(|m| m.timestamp).min());

        let title = self.title.unwrap_or_else(|| derive_title(&self.messages));

        ChatSession {
            session_id: self.session_id,
            title,
            created_at,
            messages: self.messages,
        }
    }
}

/// Normalizes raw records into canonical sessions.
///
/// Records are grouped by session id, or by origin when the source has no
/// id. Groups sharing an id are merged. Sessions are returned newest first;
/// undated sessions follow in discovery order. Deterministic for a given input.
#[must_use]
pub fn normalize(records: Vec<RawRecord>) -> Vec<ChatSession> {
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = record
            .session_id
            .clone()
            .unwrap_or_else(|| record.origin.clone());

        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(Group::new(key));
            groups.len() - 1
        });
        groups[slot].absorb(record);
    }

    let mut sessions: Vec<ChatSession> = groups.into_iter().map(Group::finish).collect();
    sessions.sort_by(|a, b| newest_first(a.created_at, b.created_at));

    tracing::debug!("Normalized {} sessions", sessions.len());

    sessions
}

fn newest_first(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Parses a timestamp in any of the encodings seen in editor stores.
///
/// Accepts epoch milliseconds or seconds (as numbers or numeric strings),
/// RFC 3339, and naive ISO-8601 (taken as UTC). Anything else is `None`.
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }

    if let Ok(n) = s.parse::<f64>() {
        return from_epoch(n);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .map(|naive| naive.and_utc())
}

#[allow(clippy::cast_possible_truncation)]
fn from_epoch(n: f64) -> Option<DateTime<Utc>> {
    if !n.is_finite() || n <= 0.0 {
        return None;
    }
    let millis = if n > MILLIS_THRESHOLD { n } else { n * 1000.0 };
    DateTime::from_timestamp_millis(millis as i64)
}

fn field_id(fields: &Map<String, Value>) -> Option<String> {
    ID_KEYS.iter().find_map(|k| match fields.get(*k)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn field_role(fields: &Map<String, Value>) -> Role {
    ROLE_KEYS
        .iter()
        .find_map(|k| match fields.get(*k)? {
            Value::String(label) => Some(Role::from_label(label)),
            Value::Number(code) => code.as_i64().map(Role::from_code),
            _ => None,
        })
        .unwrap_or(Role::Unknown)
}

fn field_content(fields: &Map<String, Value>) -> String {
    CONTENT_KEYS
        .iter()
        .find_map(|k| fields.get(*k).and_then(content_text))
        .unwrap_or_default()
}

fn field_timestamp(fields: &Map<String, Value>) -> Option<DateTime<Utc>> {
    TIMESTAMP_KEYS
        .iter()
        .filter_map(|k| fields.get(*k))
        .find_map(parse_timestamp)
}

/// Leading text of the first user message, truncated on a word boundary.
fn derive_title(messages: &[ChatMessage]) -> String {
    let Some(first) = messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|text| !text.is_empty())
    else {
        return UNTITLED_SESSION.to_string();
    };

    if first.chars().count() <= TITLE_MAX_CHARS {
        return first;
    }

    let cut: String = first.chars().take(TITLE_MAX_CHARS).collect();
    let trimmed = cut.rfind(' ').map_or(cut.as_str(), |i| &cut[..i]);
    format!("{}…", trimmed.trim_end())
}
