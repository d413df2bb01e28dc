//! Claude Code extractor (spec §4.3.2). Grounded in
//! `original_source/server/src/tool_calls/claude_code/query.py`
//! (`find_session_files`, `parse_session_file`): JSONL transcripts under the
//! projects directory, newest-mtime-first, one malformed line dropped
//! without failing the file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CoreResult;
use crate::extractors::{ExtractionOutcome, RawConversation, RawMessage};
use crate::model::{SourceTool, Timestamp};

pub fn extract(projects_dir: &Path, project_root: Option<&str>, limit: usize) -> CoreResult<ExtractionOutcome> {
    let mut files = find_session_files(projects_dir, project_root);
    files.sort_by_key(|f| std::cmp::Reverse(mtime(f)));

    let mut outcome = ExtractionOutcome::default();
    for file in files.into_iter().take(limit) {
        match parse_session_file(&file) {
            Some(record) => outcome.records.push(record),
            None => outcome.rejected += 1,
        }
    }
    Ok(outcome)
}

fn find_session_files(projects_dir: &Path, project_root: Option<&str>) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = fs::read_dir(projects_dir) else {
        return files;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Ok(dir_entries) = fs::read_dir(&path) else { continue };
        for file_entry in dir_entries.filter_map(|e| e.ok()) {
            let file_path = file_entry.path();
            if file_path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                files.push(file_path);
            }
        }
    }

    if let Some(root) = project_root {
        let encoded = root.replace('/', "-");
        files.retain(|f| {
            f.parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().contains(&encoded))
                .unwrap_or(false)
        });
    }

    files
}

fn mtime(path: &Path) -> std::time::SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
}

/// Parses one JSONL transcript. Line 1 seeds session metadata; every
/// subsequent line (parsed independently) becomes a message. A file whose
/// every line fails to parse yields `None` — spec §4.3.2 "a file with zero
/// parsed lines is dropped."
fn parse_session_file(path: &Path) -> Option<RawConversation> {
    let content = fs::read_to_string(path).ok()?;

    let mut session_id = None;
    let mut cwd = None;
    let mut start_time: Option<Timestamp> = None;
    let mut messages = Vec::new();

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let Ok(data) = serde_json::from_str::<serde_json::Value>(trimmed) else {
            continue;
        };

        if i == 0 {
            session_id = data.get("sessionId").and_then(|v| v.as_str()).map(str::to_owned);
            cwd = data.get("cwd").and_then(|v| v.as_str()).map(str::to_owned);
            start_time = data.get("timestamp").and_then(timestamp_from_value);
        }

        let message = data.get("message");
        let role = message
            .and_then(|m| m.get("role"))
            .and_then(|v| v.as_str())
            .map(str::to_owned);
        let content_text = message
            .and_then(|m| m.get("content"))
            .map(content_to_string)
            .unwrap_or_default();
        let timestamp = data.get("timestamp").and_then(timestamp_from_value);

        messages.push(RawMessage {
            role,
            content: content_text,
            timestamp,
        });
    }

    if messages.is_empty() {
        return None;
    }

    let file_stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let updated_at = mtime(path)
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .ok()
        .map(|d| Timestamp::EpochMillis(d.as_millis() as i64));

    Some(RawConversation {
        source_tool: SourceTool::ClaudeCode,
        id: session_id.clone().unwrap_or(file_stem),
        title: cwd.clone(),
        created_at: start_time,
        updated_at,
        messages,
        workspace_id: cwd,
        database_path: Some(path.to_string_lossy().into_owned()),
        session_id,
        extra: serde_json::Value::Null,
    })
}

fn content_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn timestamp_from_value(v: &serde_json::Value) -> Option<Timestamp> {
    if let Some(ms) = v.as_i64() {
        return Some(Timestamp::EpochMillis(ms));
    }
    v.as_str().map(|s| Timestamp::Iso(s.to_string()))
}
