//! Cursor extractor (spec §4.3.1). Grounded in
//! `original_source/server/src/utils/cursor_chat_query.py` (`CursorQuery`,
//! `_reconstruct_conversations_from_prompts_generations`) and the teacher's
//! `cursor::platform::open_db`, now routed through the shared pool (C1).

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::Connection;
use serde_json::Value;

use crate::error::CoreResult;
use crate::extractors::{ExtractionOutcome, RawConversation, RawMessage};
use crate::model::{SourceTool, Timestamp};
use crate::pool::ConnectionPool;
use crate::validator::is_conversation_like;

const KEY_COMPOSER_DATA: &str = "composer.composerData";
const KEY_AI_PROMPTS: &str = "aiService.prompts";
const KEY_AI_GENERATIONS: &str = "aiService.generations";
const KEY_LEGACY_CHATDATA: &str = "workbench.panel.aichat.view.aichat.chatdata";
const KEY_INTERACTIVE_SESSIONS: &str = "interactive.sessions";

const CANDIDATE_KEYS: &[&str] = &[
    KEY_COMPOSER_DATA,
    KEY_AI_PROMPTS,
    KEY_AI_GENERATIONS,
    KEY_LEGACY_CHATDATA,
    KEY_INTERACTIVE_SESSIONS,
];

pub fn extract(pool: &ConnectionPool, db_path: &Path) -> CoreResult<ExtractionOutcome> {
    let workspace_id = db_path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned());
    let database_path = db_path.to_string_lossy().into_owned();

    pool.with_connection(db_path, |conn| {
        let values = fetch_keys(conn, CANDIDATE_KEYS);

        let mut outcome = ExtractionOutcome::default();

        if let Some(Value::Object(composer)) = values.get(KEY_COMPOSER_DATA) {
            if let Some(Value::Array(composers)) = composer.get("allComposers") {
                for entry in composers {
                    match build_from_composer(entry, &workspace_id, &database_path) {
                        Some(record) => outcome.records.push(record),
                        None => outcome.rejected += 1,
                    }
                }
                return Ok(outcome);
            }
        }

        let prompts = values
            .get(KEY_AI_PROMPTS)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let generations = values
            .get(KEY_AI_GENERATIONS)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        if !prompts.is_empty() || !generations.is_empty() {
            outcome
                .records
                .extend(reconstruct_from_prompts_generations(&prompts, &generations, &workspace_id, &database_path));
        }

        Ok(outcome)
    })
}

fn fetch_keys(conn: &Connection, keys: &[&str]) -> BTreeMap<&'static str, Value> {
    let mut out = BTreeMap::new();
    for key in keys {
        let row: Option<String> = conn
            .query_row("SELECT value FROM ItemTable WHERE key = ?1", [*key], |r| r.get(0))
            .ok();
        if let Some(raw) = row {
            if let Ok(parsed) = serde_json::from_str::<Value>(&raw) {
                out.insert(*key, parsed);
            }
        }
    }
    out
}

fn build_from_composer(entry: &Value, workspace_id: &Option<String>, database_path: &str) -> Option<RawConversation> {
    if !is_conversation_like(entry) {
        return None;
    }
    let obj = entry.as_object()?;
    let id = obj
        .get("composerId")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| "unknown".to_string());
    let title = obj
        .get("name")
        .or_else(|| obj.get("title"))
        .and_then(Value::as_str)
        .map(str::to_owned);
    let created_at = obj.get("createdAt").and_then(timestamp_from_value);
    let updated_at = obj.get("lastUpdatedAt").and_then(timestamp_from_value);

    Some(RawConversation {
        source_tool: SourceTool::Cursor,
        id,
        title,
        created_at,
        updated_at,
        messages: Vec::new(),
        workspace_id: workspace_id.clone(),
        database_path: Some(database_path.to_string()),
        session_id: None,
        extra: entry.clone(),
    })
}

fn timestamp_from_value(v: &Value) -> Option<Timestamp> {
    if let Some(ms) = v.as_i64() {
        return Some(Timestamp::EpochMillis(ms));
    }
    v.as_str().map(|s| Timestamp::Iso(s.to_string()))
}

/// Mirrors `_reconstruct_conversations_from_prompts_generations`: group by
/// `conversationId`, sort by `unixMs`, synthesize one record per group.
fn reconstruct_from_prompts_generations(
    prompts: &[Value],
    generations: &[Value],
    workspace_id: &Option<String>,
    database_path: &str,
) -> Vec<RawConversation> {
    #[derive(Default)]
    struct Group {
        items: Vec<(i64, RawMessage)>,
    }

    let mut groups: BTreeMap<String, Group> = BTreeMap::new();

    for prompt in prompts {
        let Some(obj) = prompt.as_object() else { continue };
        let conv_id = obj
            .get("conversationId")
            .and_then(Value::as_str)
            .unwrap_or("default")
            .to_string();
        let ts = obj.get("unixMs").and_then(Value::as_i64).unwrap_or(0);
        let text = obj.get("text").and_then(Value::as_str).unwrap_or("").to_string();
        groups.entry(conv_id).or_default().items.push((
            ts,
            RawMessage {
                role: Some("user".to_string()),
                content: text,
                timestamp: Some(Timestamp::EpochMillis(ts)),
            },
        ));
    }

    for gen in generations {
        let Some(obj) = gen.as_object() else { continue };
        let conv_id = obj
            .get("conversationId")
            .and_then(Value::as_str)
            .unwrap_or("default")
            .to_string();
        let ts = obj.get("unixMs").and_then(Value::as_i64).unwrap_or(0);
        let text = obj
            .get("textDescription")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        groups.entry(conv_id).or_default().items.push((
            ts,
            RawMessage {
                role: Some("assistant".to_string()),
                content: text,
                timestamp: Some(Timestamp::EpochMillis(ts)),
            },
        ));
    }

    let mut records = Vec::new();
    for (conv_id, mut group) in groups {
        if group.items.is_empty() {
            continue;
        }
        group.items.sort_by_key(|(ts, _)| *ts);
        let min_ts = group.items.first().map(|(ts, _)| *ts).unwrap_or(0);
        let max_ts = group.items.last().map(|(ts, _)| *ts).unwrap_or(0);
        let messages: Vec<RawMessage> = group.items.into_iter().map(|(_, m)| m).collect();

        records.push(RawConversation {
            source_tool: SourceTool::Cursor,
            id: format!("reconstructed_{conv_id}"),
            title: Some("Reconstructed Conversation".to_string()),
            created_at: Some(Timestamp::EpochMillis(min_ts)),
            updated_at: Some(Timestamp::EpochMillis(max_ts)),
            messages,
            workspace_id: workspace_id.clone(),
            database_path: Some(database_path.to_string()),
            session_id: None,
            extra: Value::Null,
        });
    }
    records
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
    fn extracts_composer_conversations() {
        let dir = tempdir().unwrap();
        let composer_json = serde_json::json!({
            "allComposers": [
                {
                    "composerId": "abc123",
                    "name": "Fix the pool leak",
                    "createdAt": 1_700_000_000_000i64,
                    "lastUpdatedAt": 1_700_000_500_000i64,
                    "messages": [{"role": "user", "content": "leak in pool.rs"}],
                }
            ]
        });
        let path = make_db(dir.path(), &[(KEY_COMPOSER_DATA, &composer_json.to_string())]);
        let pool = ConnectionPool::default();

        let outcome = extract(&pool, &path).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].id, "abc123");
        assert_eq!(outcome.records[0].title.as_deref(), Some("Fix the pool leak"));
    }

    #[test]
    fn reconstructs_from_prompts_and_generations() {
        let dir = tempdir().unwrap();
        let prompts = serde_json::json!([
            {"conversationId": "conv-1", "text": "how do I pool connections", "unixMs": 100},
        ]);
        let generations = serde_json::json!([
            {"conversationId": "conv-1", "textDescription": "use a mutex-guarded map", "unixMs": 200},
        ]);
        let path = make_db(
            dir.path(),
            &[
                (KEY_AI_PROMPTS, &prompts.to_string()),
                (KEY_AI_GENERATIONS, &generations.to_string()),
            ],
        );
        let pool = ConnectionPool::default();

        let outcome = extract(&pool, &path).unwrap();
        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.messages.len(), 2);
        assert_eq!(record.title.as_deref(), Some("Reconstructed Conversation"));
    }

    #[test]
    fn no_recognized_keys_yields_empty() {
        let dir = tempdir().unwrap();
        let path = make_db(dir.path(), &[]);
        let pool = ConnectionPool::default();
        let outcome = extract(&pool, &path).unwrap();
        assert!(outcome.records.is_empty());
    }
}
