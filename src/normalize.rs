//! C8 Normalizer — maps each tool's raw record plus its relevance analysis
//! into the canonical schema of spec §3. Unknown/missing fields collapse to
//! documented defaults; nothing here truncates for display — that happens
//! in the Response Shaper (C10) on the way out of the request.

use crate::extractors::RawConversation;
use crate::model::{ConversationRecord, LightweightRecord, SourceTool};
use crate::relevance::RelevanceAnalysis;

const SNIPPET_SOURCE_CHARS: usize = 300;

pub fn normalize(record: &RawConversation, analysis: &RelevanceAnalysis, context_keywords: &[String]) -> ConversationRecord {
    let title = record
        .title
        .clone()
        .unwrap_or_else(|| format!("Untitled {} conversation", record.source_tool));

    let snippet = build_snippet(record);
    let extra = non_null(record.extra.clone());
    let (session_data, windsurf_metadata) = match record.source_tool {
        SourceTool::Windsurf => (None, extra),
        _ => (extra, None),
    };

    ConversationRecord {
        id: record.id.clone(),
        source_tool: record.source_tool,
        title,
        created_at: record.created_at.clone(),
        updated_at: record.updated_at.clone(),
        message_count: record.message_count(),
        snippet,
        relevance_score: round2(analysis.final_score),
        keyword_matches: analysis.keyword_matches.clone(),
        file_references: analysis.file_references.clone(),
        conversation_type: analysis.conversation_type,
        workspace_id: record.workspace_id.clone(),
        database_path: record.database_path.clone(),
        session_data,
        session_id: record.session_id.clone(),
        windsurf_metadata,
        context_keywords: context_keywords.to_vec(),
    }
}

/// Produces the compact 7-field subset the Response Shaper falls back to
/// when a full response would exceed the size budget (spec §4.8, §4.10).
pub fn normalize_lightweight(record: &ConversationRecord) -> LightweightRecord {
    LightweightRecord::from(record)
}

fn build_snippet(record: &RawConversation) -> String {
    let first_user_message = record
        .messages
        .iter()
        .find(|m| m.role.as_deref() == Some("user"))
        .or_else(|| record.messages.first());

    match first_user_message {
        Some(message) => truncate_chars(&message.content, SNIPPET_SOURCE_CHARS),
        None => record
            .title
            .clone()
            .map(|t| truncate_chars(&t, SNIPPET_SOURCE_CHARS))
            .unwrap_or_default(),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn non_null(v: serde_json::Value) -> Option<serde_json::Value> {
    if v.is_null() {
        None
    } else {
        Some(v)
    }
}
