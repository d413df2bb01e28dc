//! C6 Relevance Engine — scores a conversation against context keywords,
//! recency, and file references (spec §4.6). The scoring formula constants
//! live in `config.rs`, transcribed from
//! `original_source/server/src/tool_calls/conversation_recall.py`'s
//! analysis pipeline (keyword weighting, recency buckets, early
//! termination, file-reference increment).

use std::collections::HashSet;
use std::path::Path;

use crate::config::{
    CONVERSATION_WEIGHT_FILE_REFERENCE, CONVERSATION_WEIGHT_KEYWORD, CONVERSATION_WEIGHT_RECENCY,
    EARLY_TERMINATION_THRESHOLD, FILE_REF_SCORE_INCREMENT, KEYWORD_CHECK_LIMIT, KEYWORD_MATCHES_LIMIT,
    KEYWORD_WEIGHT, MAX_EXTRACTION_CHARS, MAX_FILE_REF_MATCHES, MAX_PROJECT_FILES_SCANNED, RECENCY_BUCKETS,
    RECENCY_DEFAULT_SCORE,
};
use crate::deps::ProjectFileLister;
use crate::extractors::RawConversation;
use crate::model::ConversationType;

/// Component breakdown retained for callers that request detailed output
/// (spec §4.6 step 7).
#[derive(Debug, Clone, Default)]
pub struct RelevanceAnalysis {
    pub keyword_score: f64,
    pub recency_score: f64,
    pub file_score: f64,
    pub final_score: f64,
    pub keyword_matches: Vec<String>,
    pub file_references: Vec<String>,
    pub conversation_type: ConversationType,
    pub terminated_early: bool,
}

/// `now_epoch_secs` is passed in rather than read from the clock, so scoring
/// stays deterministic and testable (spec §4.6 "no time-of-day noise other
/// than the recency step function").
pub fn score(
    record: &RawConversation,
    context_keywords: &[String],
    project_root: Option<&Path>,
    now_epoch_secs: i64,
    detailed: bool,
    file_lister: &dyn ProjectFileLister,
) -> RelevanceAnalysis {
    let text = extract_text(record);

    let (keyword_score, keyword_matches) = keyword_score(&text, context_keywords);
    let recency_score = recency_score(record.updated_at.as_ref().and_then(|t| t.as_epoch_secs()), now_epoch_secs);

    if !detailed && keyword_score + recency_score < EARLY_TERMINATION_THRESHOLD {
        return RelevanceAnalysis {
            keyword_score,
            recency_score,
            file_score: 0.0,
            final_score: keyword_score * CONVERSATION_WEIGHT_KEYWORD + recency_score * CONVERSATION_WEIGHT_RECENCY,
            keyword_matches,
            file_references: Vec::new(),
            conversation_type: ConversationType::General,
            terminated_early: true,
        };
    }

    let file_references = project_root
        .map(|root| file_references(&text, root, file_lister))
        .unwrap_or_default();
    let file_score = (file_references.len().min(MAX_FILE_REF_MATCHES) as f64 * FILE_REF_SCORE_INCREMENT).min(1.0);

    let conversation_type = classify(&text, &keyword_matches);
    let final_score = keyword_score * CONVERSATION_WEIGHT_KEYWORD
        + recency_score * CONVERSATION_WEIGHT_RECENCY
        + file_score * CONVERSATION_WEIGHT_FILE_REFERENCE;

    RelevanceAnalysis {
        keyword_score,
        recency_score,
        file_score,
        final_score,
        keyword_matches,
        file_references,
        conversation_type,
        terminated_early: false,
    }
}

/// Concatenates title + message text, bounded to `MAX_EXTRACTION_CHARS`;
/// sources past the cap are skipped entirely (spec §4.6 step 1).
fn extract_text(record: &RawConversation) -> String {
    let mut out = String::new();
    if let Some(title) = &record.title {
        out.push_str(title);
        out.push('\n');
    }
    for message in &record.messages {
        if out.len() >= MAX_EXTRACTION_CHARS {
            break;
        }
        out.push_str(&message.content);
        out.push('\n');
    }
    out.truncate(MAX_EXTRACTION_CHARS);
    out
}

fn keyword_score(text: &str, keywords: &[String]) -> (f64, Vec<String>) {
    let lower = text.to_lowercase();
    let mut sorted: Vec<&String> = keywords.iter().collect();
    sorted.sort_by_key(|k| std::cmp::Reverse(k.len()));

    let mut score = 0.0;
    let mut matches = Vec::new();

    for keyword in sorted.into_iter().take(KEYWORD_CHECK_LIMIT) {
        if matches.len() >= KEYWORD_MATCHES_LIMIT {
            break;
        }
        let needle = keyword.to_lowercase();
        if !needle.is_empty() && lower.contains(&needle) {
            score += keyword.len() as f64 * KEYWORD_WEIGHT;
            matches.push(keyword.clone());
        }
    }

    (score.min(1.0), matches)
}

fn recency_score(updated_at_secs: Option<i64>, now_epoch_secs: i64) -> f64 {
    let Some(updated) = updated_at_secs else { return 0.0 };
    let age_days = ((now_epoch_secs - updated).max(0)) / 86_400;

    for (max_days, bucket_score) in RECENCY_BUCKETS {
        if age_days <= *max_days {
            return *bucket_score;
        }
    }
    RECENCY_DEFAULT_SCORE
}

/// Extracts path-like tokens (containing `/` or a file extension) and keeps
/// only the ones that resolve to a real file under `project_root`, per the
/// injected `ProjectFileLister`'s bounded listing rather than an unbounded
/// per-token filesystem probe (spec §4.6 step 5: "only project-resident
/// paths count").
fn file_references(text: &str, project_root: &Path, file_lister: &dyn ProjectFileLister) -> Vec<String> {
    let known: HashSet<String> = file_lister
        .list_files(project_root, MAX_PROJECT_FILES_SCANNED)
        .into_iter()
        .filter_map(|path| path.strip_prefix(project_root).ok().map(|rel| rel.to_string_lossy().replace('\\', "/")))
        .collect();

    let mut found = Vec::new();
    for token in text.split_whitespace() {
        let cleaned = token.trim_matches(|c: char| !c.is_alphanumeric() && c != '/' && c != '.' && c != '_' && c != '-');
        if cleaned.is_empty() || found.len() >= MAX_FILE_REF_MATCHES {
            continue;
        }
        if !looks_like_path(cleaned) {
            continue;
        }
        if known.contains(cleaned) {
            let normalized = cleaned.to_string();
            if !found.contains(&normalized) {
                found.push(normalized);
            }
        }
    }
    found
}

fn looks_like_path(token: &str) -> bool {
    token.contains('/') || (token.contains('.') && token.rsplit('.').next().map(|e| e.len() <= 5).unwrap_or(false))
}

/// Tag-set classification driven by keyword matches and whole-text signal
/// words. `general` is the default when nothing else fires.
fn classify(text: &str, keyword_matches: &[String]) -> ConversationType {
    let lower = text.to_lowercase();
    let hit = |words: &[&str]| {
        words.iter().any(|w| lower.contains(w)) || keyword_matches.iter().any(|m| words.contains(&m.to_lowercase().as_str()))
    };

    if hit(&["architecture", "design pattern", "system design", "schema"]) {
        ConversationType::Architecture
    } else if hit(&["bug", "error", "exception", "crash", "stack trace", "traceback", "debugging"]) {
        ConversationType::Debugging
    } else if hit(&["fix", "solve", "issue", "workaround", "resolve"]) {
        ConversationType::ProblemSolving
    } else if hit(&["refactor", "implement", "api", "performance", "optimi"]) {
        ConversationType::Technical
    } else if hit(&["code review", "function", "method", "variable", "class "]) {
        ConversationType::CodeDiscussion
    } else {
        ConversationType::General
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::WalkdirFileLister;
    use crate::extractors::RawMessage;
    use crate::model::{SourceTool, Timestamp};
    use tempfile::tempdir;

    fn make_record(title: &str, content: &str, updated_secs: i64) -> RawConversation {
        RawConversation {
            source_tool: SourceTool::Cursor,
            id: "abc".to_string(),
            title: Some(title.to_string()),
            created_at: None,
            updated_at: Some(Timestamp::EpochMillis(updated_secs * 1000)),
            messages: vec![RawMessage {
                role: Some("user".to_string()),
                content: content.to_string(),
                timestamp: None,
            }],
            workspace_id: None,
            database_path: None,
            session_id: None,
            extra: serde_json::Value::Null,
        }
    }

    #[test]
    fn scores_keyword_matches_and_recency() {
        let record = make_record("Fix pool leak", "investigating a connection pool leak in rust", 1000);
        let keywords = vec!["pool".to_string(), "rust".to_string()];
        let analysis = score(&record, &keywords, None, 1000 + 3600, true, &WalkdirFileLister);
        assert!(analysis.keyword_score > 0.0);
        assert_eq!(analysis.recency_score, 1.0);
        assert!(analysis.keyword_matches.contains(&"pool".to_string()));
    }

    #[test]
    fn recency_buckets_step_down_with_age() {
        let record = make_record("x", "y", 0);
        let keywords: Vec<String> = vec![];
        let one_day = 86_400;
        let analysis = score(&record, &keywords, None, one_day, true, &WalkdirFileLister);
        assert_eq!(analysis.recency_score, 1.0);

        let analysis_old = score(&record, &keywords, None, one_day * 100, true, &WalkdirFileLister);
        assert_eq!(analysis_old.recency_score, 0.1);
    }

    #[test]
    fn early_termination_skips_file_scoring() {
        let record = make_record("unrelated", "nothing matches here at all", 0);
        let keywords = vec!["zzz_no_match".to_string()];
        let analysis = score(&record, &keywords, None, 100_000_000, false, &WalkdirFileLister);
        assert!(analysis.terminated_early);
        assert_eq!(analysis.file_score, 0.0);
    }

    #[test]
    fn file_references_only_count_when_path_exists_under_root() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("pool.rs"), "fn main() {}").unwrap();

        let record = make_record("discussion", "see pool.rs and also missing.rs for context", 1000);
        let keywords = vec!["pool".to_string()];
        let analysis = score(&record, &keywords, Some(dir.path()), 1000, true, &WalkdirFileLister);
        assert_eq!(analysis.file_references, vec!["pool.rs".to_string()]);
    }

    #[test]
    fn classifies_debugging_conversations() {
        let record = make_record("Crash investigation", "got a stack trace and an exception on startup", 0);
        let keywords: Vec<String> = vec![];
        let analysis = score(&record, &keywords, None, 0, true, &WalkdirFileLister);
        assert_eq!(analysis.conversation_type, ConversationType::Debugging);
    }

    #[test]
    fn final_score_caps_each_component_before_weighting() {
        let long_match: String = "pool".repeat(30);
        let record = make_record(&long_match, &long_match, 0);
        let keywords = vec![long_match];
        let analysis = score(&record, &keywords, None, 0, true, &WalkdirFileLister);
        assert_eq!(analysis.keyword_score, 1.0);
        assert!(analysis.final_score <= CONVERSATION_WEIGHT_KEYWORD + CONVERSATION_WEIGHT_RECENCY + CONVERSATION_WEIGHT_FILE_REFERENCE);
    }

    #[test]
    fn a_strong_keyword_and_recent_match_clears_the_default_min_score() {
        let record = make_record(
            "pool cache error crash fixed",
            "the connection pool had a cache error causing a crash, now fixed",
            0,
        );
        let keywords = vec!["pool".to_string(), "cache".to_string(), "error".to_string(), "crash".to_string(), "fixed".to_string()];
        let analysis = score(&record, &keywords, None, 0, true, &WalkdirFileLister);
        assert_eq!(analysis.keyword_score, 1.0);
        assert!(
            analysis.final_score >= crate::config::DEFAULT_MIN_SCORE,
            "score {} should clear the default threshold",
            analysis.final_score
        );
    }
}
