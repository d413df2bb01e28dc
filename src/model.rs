//! Canonical conversation record (spec §3), emitted by the Normalizer (C8)
//! and consumed by the Aggregator (C9) / Response Shaper (C10).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTool {
    Cursor,
    ClaudeCode,
    Windsurf,
}

impl SourceTool {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTool::Cursor => "cursor",
            SourceTool::ClaudeCode => "claude-code",
            SourceTool::Windsurf => "windsurf",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "cursor" => Some(SourceTool::Cursor),
            "claude-code" | "claude_code" => Some(SourceTool::ClaudeCode),
            "windsurf" => Some(SourceTool::Windsurf),
            _ => None,
        }
    }

    pub fn all() -> [SourceTool; 3] {
        [SourceTool::Cursor, SourceTool::ClaudeCode, SourceTool::Windsurf]
    }
}

impl std::fmt::Display for SourceTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationType {
    Architecture,
    Debugging,
    ProblemSolving,
    Technical,
    CodeDiscussion,
    General,
}

impl Default for ConversationType {
    fn default() -> Self {
        ConversationType::General
    }
}

/// Preserves the timestamp form seen at the source (spec §3, §9): the
/// normalizer never coerces one into the other, only the Relevance Engine
/// interprets both as epoch seconds internally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    EpochMillis(i64),
    Iso(String),
}

impl Timestamp {
    /// Best-effort conversion to epoch seconds for scoring (spec §9).
    pub fn as_epoch_secs(&self) -> Option<i64> {
        match self {
            Timestamp::EpochMillis(ms) => Some(ms / 1000),
            Timestamp::Iso(s) => chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.timestamp())
                .or_else(|| {
                    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                        .ok()
                        .map(|dt| dt.and_utc().timestamp())
                }),
        }
    }
}

/// The full canonical record (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub source_tool: SourceTool,
    pub title: String,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
    pub message_count: u64,
    pub snippet: String,
    pub relevance_score: f64,
    pub keyword_matches: Vec<String>,
    pub file_references: Vec<String>,
    pub conversation_type: ConversationType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub windsurf_metadata: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_keywords: Vec<String>,
}

impl ConversationRecord {
    /// `(source_tool, id)` primary key, per spec §3 invariants.
    pub fn key(&self) -> (SourceTool, &str) {
        (self.source_tool, self.id.as_str())
    }

    pub fn updated_at_epoch(&self) -> i64 {
        self.updated_at.as_ref().and_then(|t| t.as_epoch_secs()).unwrap_or(0)
    }
}

/// The 7-field compact form used when a full response exceeds the size
/// budget (spec §4.8, §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightweightRecord {
    pub id: String,
    pub title: String,
    pub source_tool: SourceTool,
    pub message_count: u64,
    pub relevance_score: f64,
    pub created_at: Option<Timestamp>,
    pub snippet: String,
}

impl From<&ConversationRecord> for LightweightRecord {
    fn from(r: &ConversationRecord) -> Self {
        LightweightRecord {
            id: r.id.clone(),
            title: r.title.clone(),
            source_tool: r.source_tool,
            message_count: r.message_count,
            relevance_score: r.relevance_score,
            created_at: r.created_at.clone(),
            snippet: r.snippet.clone(),
        }
    }
}

/// Per-source aggregate used by summary-mode responses (spec §4.10 step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSummary {
    pub source_tool: SourceTool,
    pub count: usize,
    pub latest_updated_at: Option<Timestamp>,
    pub average_score: f64,
}

/// Either a (possibly degraded) record list, or a summary-mode aggregate —
/// the three response forms from spec §4.10.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum ShapedConversations {
    Full(Vec<ConversationRecord>),
    Lightweight(Vec<LightweightRecord>),
    Summary {
        per_source: Vec<SourceSummary>,
        sources: Vec<SourceTool>,
    },
}

/// Per-tool outcome folded into the aggregate response (spec §7 propagation
/// policy: per-source errors never escalate to a fatal request error).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolResult {
    pub total_conversations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub type ToolResults = BTreeMap<SourceTool, ToolResult>;
