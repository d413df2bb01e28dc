//! C10 Response Shaper — enforces the response size budget via progressive
//! degradation: full records, then the lightweight 7-field projection,
//! then a summary-only response (spec §4.10).

use crate::config::{ID_MAX, MAX_RESPONSE_BYTES, SNIPPET_MAX, TITLE_MAX};
use crate::model::{ConversationRecord, ShapedConversations, SourceSummary, SourceTool};
use crate::normalize::normalize_lightweight;

pub fn shape(mut records: Vec<ConversationRecord>, max_bytes: usize) -> ShapedConversations {
    for record in &mut records {
        truncate_record(record);
    }

    if fits(&records, max_bytes) {
        return ShapedConversations::Full(records);
    }

    let lightweight: Vec<_> = records.iter().map(normalize_lightweight).collect();
    if fits(&lightweight, max_bytes) {
        return ShapedConversations::Lightweight(lightweight);
    }

    summary_mode(&records)
}

pub fn shape_default(records: Vec<ConversationRecord>) -> ShapedConversations {
    shape(records, MAX_RESPONSE_BYTES)
}

fn fits<T: serde::Serialize>(value: &T, max_bytes: usize) -> bool {
    serde_json::to_vec(value).map(|bytes| bytes.len() <= max_bytes).unwrap_or(false)
}

fn truncate_record(record: &mut ConversationRecord) {
    record.id = truncate_with_ellipsis(&record.id, ID_MAX);
    record.title = truncate_with_ellipsis(&record.title, TITLE_MAX);
    record.snippet = truncate_with_ellipsis(&record.snippet, SNIPPET_MAX);
}

fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{truncated}...")
}

fn summary_mode(records: &[ConversationRecord]) -> ShapedConversations {
    let mut per_source: Vec<SourceSummary> = Vec::new();

    for tool in SourceTool::all() {
        let matching: Vec<&ConversationRecord> = records.iter().filter(|r| r.source_tool == tool).collect();
        if matching.is_empty() {
            continue;
        }
        let average_score = matching.iter().map(|r| r.relevance_score).sum::<f64>() / matching.len() as f64;
        let latest_updated_at = matching
            .iter()
            .max_by_key(|r| r.updated_at_epoch())
            .and_then(|r| r.updated_at.clone());

        per_source.push(SourceSummary {
            source_tool: tool,
            count: matching.len(),
            latest_updated_at,
            average_score: (average_score * 100.0).round() / 100.0,
        });
    }

    let sources = per_source.iter().map(|s| s.source_tool).collect();
    ShapedConversations::Summary { per_source, sources }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConversationType;

    fn make_record(id: &str, score: f64, snippet_len: usize) -> ConversationRecord {
        ConversationRecord {
            id: id.to_string(),
            source_tool: SourceTool::Cursor,
            title: "t".repeat(10),
            created_at: None,
            updated_at: None,
            message_count: 1,
            snippet: "s".repeat(snippet_len),
            relevance_score: score,
            keyword_matches: vec![],
            file_references: vec![],
            conversation_type: ConversationType::General,
            workspace_id: None,
            database_path: None,
            session_data: None,
            session_id: None,
            windsurf_metadata: None,
            context_keywords: vec![],
        }
    }

    #[test]
    fn full_response_when_small() {
        let records = vec![make_record("a", 0.9, 10)];
        let shaped = shape(records, MAX_RESPONSE_BYTES);
        assert!(matches!(shaped, ShapedConversations::Full(_)));
    }

    #[test]
    fn degrades_to_lightweight_when_over_budget() {
        let records: Vec<_> = (0..5).map(|i| make_record(&i.to_string(), 0.5, 1000)).collect();
        // Budget sized to accept the lightweight projection but not the full one.
        let shaped = shape(records, 600);
        assert!(matches!(shaped, ShapedConversations::Lightweight(_)));
    }

    #[test]
    fn degrades_to_summary_when_still_over_budget() {
        let records: Vec<_> = (0..50).map(|i| make_record(&i.to_string(), 0.5, 1000)).collect();
        let shaped = shape(records, 50);
        assert!(matches!(shaped, ShapedConversations::Summary { .. }));
    }

    #[test]
    fn truncates_oversized_fields_with_ellipsis() {
        let mut record = make_record("x", 0.1, 400);
        truncate_record(&mut record);
        assert!(record.snippet.ends_with("..."));
        assert!(record.snippet.chars().count() <= SNIPPET_MAX);
    }
}
