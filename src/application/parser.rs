//! JSON walking for chat data embedded in editor stores.
//!
//! Chat history shows up in many shapes: VS Code chat sessions
//! (`requests[]`), session objects with a message list, wrapper lists of
//! sessions, bare message lists and single Cursor bubbles. Recognition is
//! best-effort pattern matching; anything unrecognized is skipped.

use serde_json::{Map, Value};

use crate::domain::{AppError, RawRecord, Result};

/// Nesting depth past which values are ignored.
const MAX_DEPTH: usize = 16;

const REQUESTS_KEY: &str = "requests";
const MESSAGE_LIST_KEYS: &[&str] = &[
    "messages",
    "conversation",
    "bubbles",
    "turns",
    "exchanges",
    "entries",
];
const CONTENT_KEYS: &[&str] = &["content", "text", "message"];
const SESSION_ID_KEYS: &[&str] = &[
    "sessionId",
    "composerId",
    "conversationId",
    "chatId",
    "tabId",
    "id",
];
/// Ids strong enough to trust an object without messages as a session.
const HEADER_ID_KEYS: &[&str] = &["sessionId", "composerId", "conversationId"];
const TITLE_KEYS: &[&str] = &["customTitle", "title", "chatTitle", "name"];
const CREATED_KEYS: &[&str] = &["creationDate", "createdAt", "created_at", "created"];

/// Session-level fields copied onto every record of a session.
#[derive(Debug, Clone, Default)]
struct SessionMeta {
    id: Option<String>,
    title: Option<String>,
    created: Option<Value>,
}

impl SessionMeta {
    fn from_object(map: &Map<String, Value>) -> Self {
        Self {
            id: first_id(map, SESSION_ID_KEYS),
            title: TITLE_KEYS
                .iter()
                .filter_map(|k| map.get(*k).and_then(Value::as_str))
                .find(|t| !t.trim().is_empty())
                .map(str::to_string),
            created: CREATED_KEYS
                .iter()
                .filter_map(|k| map.get(*k))
                .find(|v| !v.is_null())
                .cloned(),
        }
    }

    /// Metadata-only session (e.g. a Cursor composer whose bubbles are stored
    /// under separate keys).
    fn header(map: &Map<String, Value>) -> Option<Self> {
        first_id(map, HEADER_ID_KEYS)?;
        let meta = Self::from_object(map);
        (meta.title.is_some() || meta.created.is_some()).then_some(meta)
    }

    fn record(&self, origin: &str, message: Option<Map<String, Value>>) -> RawRecord {
        RawRecord {
            session_id: self.id.clone(),
            session_title: self.title.clone(),
            session_created: self.created.clone(),
            message,
            ..RawRecord::header(origin)
        }
    }
}

/// Extracts raw records from a parsed JSON document.
#[must_use]
pub fn records_from_document(document: &Value, origin: &str) -> Vec<RawRecord> {
    let mut out = Vec::new();
    walk(document, origin, 0, &mut out);

    if out.is_empty() {
        tracing::debug!("No chat shape recognized in {}", origin);
    }

    out
}

/// Extracts raw records from one editor state entry.
///
/// Cursor stores bubbles as `bubbleId:{composer_id}:{bubble_id}` and sessions
/// as `composerData:{composer_id}`; the key supplies the session id when the
/// value doesn't.
#[must_use]
pub fn records_from_state_entry(root: &str, key: &str, value: &Value) -> Vec<RawRecord> {
    let origin = format!("{root}#{key}");
    let mut records = records_from_document(value, &origin);

    if let Some(session_id) = extract_conversation_id(key).or_else(|| extract_composer_id(key)) {
        for record in &mut records {
            record
                .session_id
                .get_or_insert_with(|| session_id.to_string());
        }
    }

    records
}

/// Parses a raw database value and extracts its records.
///
/// # Errors
/// Returns error if the value is not JSON.
pub fn records_from_state_bytes(root: &str, key: &str, bytes: &[u8]) -> Result<Vec<RawRecord>> {
    let value: Value = serde_json::from_slice(bytes).map_err(AppError::json_parse)?;
    Ok(records_from_state_entry(root, key, &value))
}

/// Extracts conversation ID from a bubble key.
///
/// Key format: `bubbleId:{composer_id}:{bubble_id}`
#[must_use]
pub fn extract_conversation_id(key: &str) -> Option<&str> {
    let stripped = key.strip_prefix("bubbleId:")?;
    stripped.split(':').next().filter(|s| !s.is_empty())
}

/// Extracts composer ID from a composer key.
///
/// Key format: `composerData:{composer_id}`
#[must_use]
pub fn extract_composer_id(key: &str) -> Option<&str> {
    key.strip_prefix("composerData:").filter(|s| !s.is_empty())
}

/// Flattens a content value into text.
///
/// Accepts plain strings, `{text|value|content}` objects and arrays of parts
/// (joined without separator, as the editor renders them).
#[must_use]
pub fn content_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => ["text", "value", "content"]
            .iter()
            .find_map(|k| map.get(*k).and_then(content_text)),
        Value::Array(parts) => {
            let texts: Vec<String> = parts.iter().filter_map(content_text).collect();
            (!texts.is_empty()).then(|| texts.concat())
        }
        _ => None,
    }
}

fn walk(value: &Value, origin: &str, depth: usize, out: &mut Vec<RawRecord>) {
    if depth > MAX_DEPTH {
        tracing::trace!("Nesting too deep at {}", origin);
        return;
    }

    match value {
        Value::String(s) => {
            // Editor state often double-encodes JSON as a string
            if let Some(inner) = embedded_json(s) {
                walk(&inner, origin, depth + 1, out);
            }
        }
        Value::Array(items) => {
            if items.iter().any(is_message_like) {
                emit_messages(items, origin, &SessionMeta::default(), out);
            } else {
                for (i, item) in items.iter().enumerate() {
                    walk(item, &format!("{origin}[{i}]"), depth + 1, out);
                }
            }
        }
        Value::Object(map) => {
            if let Some(requests) = map.get(REQUESTS_KEY).and_then(Value::as_array) {
                emit_requests(map, requests, origin, out);
            } else if let Some(list) = message_list(map) {
                let meta = SessionMeta::from_object(map);
                out.push(meta.record(origin, None));
                emit_messages(list, origin, &meta, out);
            } else if is_message_object(map) {
                out.push(RawRecord::message(origin, map.clone()));
            } else if let Some(meta) = SessionMeta::header(map) {
                out.push(meta.record(origin, None));
            } else {
                for (key, child) in map {
                    walk(child, &format!("{origin}/{key}"), depth + 1, out);
                }
            }
        }
        _ => {}
    }
}

fn emit_messages(items: &[Value], origin: &str, meta: &SessionMeta, out: &mut Vec<RawRecord>) {
    for item in items {
        match item.as_object() {
            Some(map) if is_message_object(map) => out.push(meta.record(origin, Some(map.clone()))),
            _ => tracing::trace!("Skipping non-message entry in {}", origin),
        }
    }
}

/// VS Code chat session: each request holds the user prompt and the
/// assistant's response parts.
fn emit_requests(
    session: &Map<String, Value>,
    requests: &[Value],
    origin: &str,
    out: &mut Vec<RawRecord>,
) {
    let meta = SessionMeta::from_object(session);
    out.push(meta.record(origin, None));

    for request in requests {
        let Some(request) = request.as_object() else {
            tracing::trace!("Skipping non-object request in {}", origin);
            continue;
        };

        let request_id = request.get("requestId").and_then(Value::as_str);
        let timestamp = request.get("timestamp").filter(|v| !v.is_null());

        if let Some(text) = request.get("message").and_then(content_text) {
            let fields = message_fields(
                request_id.map(str::to_string),
                "user",
                text,
                timestamp.cloned(),
            );
            out.push(meta.record(origin, Some(fields)));
        }

        if let Some(text) = request.get("response").and_then(content_text) {
            let fields = message_fields(
                request_id.map(|id| format!("{id}:response")),
                "assistant",
                text,
                response_timestamp(request, timestamp),
            );
            out.push(meta.record(origin, Some(fields)));
        }
    }
}

/// Request time plus the recorded elapsed time, when both are known.
fn response_timestamp(request: &Map<String, Value>, sent: Option<&Value>) -> Option<Value> {
    let sent = sent?;
    let elapsed = request
        .get("result")
        .and_then(|r| r.get("timings"))
        .and_then(|t| t.get("totalElapsed"))
        .and_then(Value::as_i64);

    match (sent.as_i64(), elapsed) {
        (Some(ms), Some(elapsed)) => Some(Value::from(ms.saturating_add(elapsed))),
        _ => Some(sent.clone()),
    }
}

fn message_fields(
    id: Option<String>,
    role: &str,
    content: String,
    timestamp: Option<Value>,
) -> Map<String, Value> {
    let mut fields = Map::new();
    if let Some(id) = id {
        fields.insert("id".into(), Value::String(id));
    }
    fields.insert("role".into(), Value::String(role.to_string()));
    fields.insert("content".into(), Value::String(content));
    if let Some(ts) = timestamp {
        fields.insert("timestamp".into(), ts);
    }
    fields
}

fn message_list(map: &Map<String, Value>) -> Option<&Vec<Value>> {
    MESSAGE_LIST_KEYS
        .iter()
        .filter_map(|k| map.get(*k).and_then(Value::as_array))
        .find(|list| list.is_empty() || list.iter().any(is_message_like))
}

fn is_message_like(value: &Value) -> bool {
    value.as_object().is_some_and(is_message_object)
}

fn is_message_object(map: &Map<String, Value>) -> bool {
    if map.contains_key(REQUESTS_KEY)
        || MESSAGE_LIST_KEYS
            .iter()
            .any(|k| map.get(*k).is_some_and(Value::is_array))
    {
        return false;
    }

    CONTENT_KEYS
        .iter()
        .any(|k| map.get(*k).and_then(content_text).is_some())
}

fn first_id(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match map.get(*k)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn embedded_json(s: &str) -> Option<Value> {
    let trimmed = s.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}
