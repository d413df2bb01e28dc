//! C3 Record Extractors — one implementation per source tool, sharing a
//! common contract: given a store path (and, for SQLite-backed tools, a
//! pool handle), produce an ordered list of raw records plus a per-source
//! count (spec §4.3).

pub mod claude_code;
pub mod cursor;
pub mod windsurf;

use crate::model::{SourceTool, Timestamp};

/// A single raw message within a raw conversation, shaped loosely after the
/// union of what Cursor/Claude Code/Windsurf actually store — the
/// Normalizer (C8) is the only place this gets squeezed into the canonical
/// schema.
#[derive(Debug, Clone, Default)]
pub struct RawMessage {
    pub role: Option<String>,
    pub content: String,
    pub timestamp: Option<Timestamp>,
}

/// Pre-canonical record emitted by an extractor. Carries both the
/// already-known fields and the original JSON blob, since the Relevance
/// Engine (C6) and Content Validator (C4) need to inspect the raw shape,
/// not just what the extractor chose to promote.
#[derive(Debug, Clone)]
pub struct RawConversation {
    pub source_tool: SourceTool,
    pub id: String,
    pub title: Option<String>,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
    pub messages: Vec<RawMessage>,
    pub workspace_id: Option<String>,
    pub database_path: Option<String>,
    pub session_id: Option<String>,
    pub extra: serde_json::Value,
}

impl RawConversation {
    pub fn message_count(&self) -> u64 {
        self.messages.len() as u64
    }
}

/// Outcome of running one extractor against one store location: the records
/// it found, plus how many candidates it rejected on the way (diagnostic
/// only — never surfaced to callers as an error).
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    pub records: Vec<RawConversation>,
    pub rejected: usize,
}
