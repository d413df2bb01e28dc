//! Windsurf extractor (spec §4.3.3). Grounded in
//! `original_source/server/src/tool_calls/windsurf/windsurf_query.py`
//! (`query_conversations_from_db`'s chat-sessions-first, key-scan-fallback
//! order) and `windsurf/recall.py`'s standardized record shape
//! (`database_path`, `windsurf_metadata`).

use std::path::Path;

use rusqlite::Connection;
use serde_json::Value;

use crate::error::CoreResult;
use crate::extractors::{ExtractionOutcome, RawConversation, RawMessage};
use crate::model::{SourceTool, Timestamp};
use crate::pool::ConnectionPool;
use crate::validator::is_conversation_like;

const KEY_CHAT_SESSION_STORE: &str = "chat.sessionStore";

const FALLBACK_PATTERNS: &[&str] = &["chat", "conversation", "session", "message", "cascade"];

pub fn extract(pool: &ConnectionPool, db_path: &Path) -> CoreResult<ExtractionOutcome> {
    let workspace_id = db_path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned());
    let database_path = db_path.to_string_lossy().into_owned();

    pool.with_connection(db_path, |conn| {
        let mut outcome = ExtractionOutcome::default();

        if let Some(session_store) = fetch_key(conn, KEY_CHAT_SESSION_STORE) {
            if let Value::Object(store) = &session_store {
                if let Some(Value::Object(entries)) = store.get("entries") {
                    for (entry_id, entry) in entries {
                        if is_conversation_like(entry) {
                            outcome.records.push(build_record(entry_id, entry, &workspace_id, &database_path));
                        } else {
                            outcome.rejected += 1;
                        }
                    }
                    if !outcome.records.is_empty() {
                        return Ok(outcome);
                    }
                }
            }
        }

        // Fallback: scan every ItemTable key for plausible conversation shapes.
        for (key, value) in fetch_matching_keys(conn, FALLBACK_PATTERNS) {
            scan_candidate(&key, &value, &workspace_id, &database_path, &mut outcome, true);
        }

        Ok(outcome)
    })
}

fn scan_candidate(
    key: &str,
    value: &Value,
    workspace_id: &Option<String>,
    database_path: &str,
    outcome: &mut ExtractionOutcome,
    recurse: bool,
) {
    if is_conversation_like(value) {
        outcome.records.push(build_record(key, value, workspace_id, database_path));
        return;
    }
    outcome.rejected += 1;

    if !recurse {
        return;
    }
    if let Value::Object(map) = value {
        for (child_key, child_value) in map {
            if matches!(child_value, Value::Array(_) | Value::Object(_)) {
                scan_candidate(child_key, child_value, workspace_id, database_path, outcome, false);
            }
        }
    }
}

fn build_record(id: &str, entry: &Value, workspace_id: &Option<String>, database_path: &str) -> RawConversation {
    let title = entry
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Windsurf Chat {}", id.chars().take(8).collect::<String>()));

    let messages = entry
        .get("messages")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|m| RawMessage {
                    role: m.get("role").and_then(Value::as_str).map(str::to_owned),
                    content: m.get("content").and_then(Value::as_str).unwrap_or_default().to_string(),
                    timestamp: m.get("timestamp").and_then(timestamp_from_value),
                })
                .collect()
        })
        .unwrap_or_default();

    RawConversation {
        source_tool: SourceTool::Windsurf,
        id: id.to_string(),
        title: Some(title),
        created_at: None,
        updated_at: None,
        messages,
        workspace_id: workspace_id.clone(),
        database_path: Some(database_path.to_string()),
        session_id: None,
        extra: entry.clone(),
    }
}

fn timestamp_from_value(v: &Value) -> Option<Timestamp> {
    if let Some(ms) = v.as_i64() {
        return Some(Timestamp::EpochMillis(ms));
    }
    v.as_str().map(|s| Timestamp::Iso(s.to_string()))
}

fn fetch_key(conn: &Connection, key: &str) -> Option<Value> {
    let raw: String = conn
        .query_row("SELECT value FROM ItemTable WHERE key = ?1", [key], |r| r.get(0))
        .ok()?;
    serde_json::from_str(&raw).ok()
}

fn fetch_matching_keys(conn: &Connection, patterns: &[&str]) -> Vec<(String, Value)> {
    let mut stmt = match conn.prepare("SELECT key, value FROM ItemTable") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let rows = stmt.query_map([], |r| {
        let key: String = r.get(0)?;
        let value: String = r.get(1)?;
        Ok((key, value))
    });
    let Ok(rows) = rows else { return Vec::new() };

    rows.filter_map(|r| r.ok())
        .filter(|(key, _)| {
            let lower = key.to_lowercase();
            patterns.iter().any(|p| lower.contains(p))
        })
        .filter_map(|(key, raw)| serde_json::from_str::<Value>(&raw).ok().map(|v| (key, v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_db(dir: &Path, rows: &[(&str, &str)]) -> std::path::PathBuf {
        let path = dir.join("state.vscdb");
        let conn = Connection::open(&path).unwrap();
        conn.execute("CREATE TABLE ItemTable (key TEXT PRIMARY KEY, value TEXT)", [])
            .unwrap();
        for (k, v) in rows {
            conn.execute("INSERT INTO ItemTable (key, value) VALUES (?1, ?2)", rusqlite::params![k, v])
                .unwrap();
        }
        path
    }

    #[test]
    fn extracts_from_chat_session_store() {
        let dir = tempdir().unwrap();
        let store = serde_json::json!({
            "entries": {
                "sess-1": {
                    "title": "Refactor the parser",
                    "messages": [{"role": "user", "content": "split this function please"}],
                }
            }
        });
        let path = make_db(dir.path(), &[(KEY_CHAT_SESSION_STORE, &store.to_string())]);
        let pool = ConnectionPool::default();

        let outcome = extract(&pool, &path).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].id, "sess-1");
    }

    #[test]
    fn falls_back_to_key_scan_when_no_session_store() {
        let dir = tempdir().unwrap();
        let noise = serde_json::json!({"workbench.panel.layout": "x"});
        let plausible = serde_json::json!({
            "content": "how do I debug this cascade failure, it keeps timing out",
            "messages": [{"role": "user", "content": "cascade keeps failing"}],
        });
        let path = make_db(
            dir.path(),
            &[
                ("some.unrelated.key", &noise.to_string()),
                ("cascade.session.data", &plausible.to_string()),
            ],
        );
        let pool = ConnectionPool::default();

        let outcome = extract(&pool, &path).unwrap();
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn rejects_pure_editor_noise_in_fallback_scan() {
        let dir = tempdir().unwrap();
        let noise = serde_json::json!({"workbench.panel.layout": {"view": "explorer"}});
        let path = make_db(dir.path(), &[("session.ui.state", &noise.to_string())]);
        let pool = ConnectionPool::default();

        let outcome = extract(&pool, &path).unwrap();
        assert!(outcome.records.is_empty());
    }
}
