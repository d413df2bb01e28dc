//! Per-tool raw dump (`query_<tool>_conversations`, spec §6). Runs a single
//! source tool's extractor directly (bypassing C5/C6 scoring) and renders the
//! result in one of the formats the original per-tool query handlers expose
//! (`json`, `markdown`, and a tool-native format — `cursor` or `windsurf`),
//! grounded in
//! `original_source/server/src/tool_calls/cursor/query.py::handle_query_cursor_conversations`
//! and `windsurf/query.py`'s format switch.

use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::extractors::{claude_code, cursor, windsurf, RawConversation};
use crate::locator::locator_for;
use crate::model::SourceTool;
use crate::pool::ConnectionPool;
use crate::project::resolve_project_root;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFormat {
    Json,
    Markdown,
    /// The tool's own native rendering — `cursor`'s composer-style digest or
    /// `windsurf`'s cascade-style digest. Claude Code has no native format of
    /// its own, so this falls back to `Json` for that tool.
    Native,
}

impl QueryFormat {
    pub fn parse(name: &str, tool: SourceTool) -> CoreResult<Self> {
        match name {
            "json" => Ok(QueryFormat::Json),
            "markdown" => Ok(QueryFormat::Markdown),
            "cursor" if tool == SourceTool::Cursor => Ok(QueryFormat::Native),
            "windsurf" if tool == SourceTool::Windsurf => Ok(QueryFormat::Native),
            other => Err(CoreError::Validation(format!(
                "format must be one of: json, markdown, {tool} (got '{other}')"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryArgs {
    pub format: QueryFormat,
    pub limit: usize,
    pub project_root: Option<String>,
    pub summary: bool,
}

#[derive(Debug)]
pub struct QueryResponse {
    pub source_tool: SourceTool,
    pub total_conversations: usize,
    pub content: String,
}

pub fn query_conversations(
    pool: &Arc<ConnectionPool>,
    tool: SourceTool,
    args: QueryArgs,
) -> CoreResult<QueryResponse> {
    let locator = locator_for(tool);
    let locations = locator.discover();
    if locations.is_empty() {
        return Err(CoreError::source_unavailable(
            resolve_project_root(args.project_root.as_deref()),
            format!("no {tool} store found"),
        ));
    }

    let project_root = resolve_project_root(args.project_root.as_deref());
    let project_root_str = project_root.to_string_lossy().into_owned();

    let mut records = Vec::new();
    for location in &locations {
        let extracted = match tool {
            SourceTool::Cursor => cursor::extract(pool, &location.path)?.records,
            SourceTool::Windsurf => windsurf::extract(pool, &location.path)?.records,
            SourceTool::ClaudeCode => claude_code::extract(&location.path, Some(&project_root_str), args.limit)?.records,
        };
        records.extend(extracted);
    }
    records.truncate(args.limit);

    let content = if args.summary {
        render_summary(tool, &records)
    } else {
        match args.format {
            QueryFormat::Json => render_json(&records),
            QueryFormat::Markdown => render_markdown(tool, &records),
            QueryFormat::Native => render_native(tool, &records),
        }
    };

    Ok(QueryResponse {
        source_tool: tool,
        total_conversations: records.len(),
        content,
    })
}

fn render_json(records: &[RawConversation]) -> String {
    let values: Vec<serde_json::Value> = records
        .iter()
        .map(|r| {
            serde_json::json!({
                "id": r.id,
                "title": r.title,
                "message_count": r.message_count(),
                "workspace_id": r.workspace_id,
                "database_path": r.database_path,
            })
        })
        .collect();
    serde_json::to_string_pretty(&values).unwrap_or_default()
}

fn render_markdown(tool: SourceTool, records: &[RawConversation]) -> String {
    let mut out = format!("# {tool} conversations\n\n");
    for record in records {
        out.push_str(&format!(
            "## {}\n\n- id: `{}`\n- messages: {}\n\n",
            record.title.as_deref().unwrap_or("Untitled"),
            record.id,
            record.message_count()
        ));
    }
    out
}

/// `cursor`/`windsurf`'s own style: a flat, compact digest line per
/// conversation rather than a rendered document, matching
/// `CursorQuery.format_as_cursor_markdown`'s intent of "looks like the tool's
/// own export."
fn render_native(tool: SourceTool, records: &[RawConversation]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str(&format!(
            "[{tool}] {} ({} messages) id={}\n",
            record.title.as_deref().unwrap_or("Untitled"),
            record.message_count(),
            record.id
        ));
    }
    out
}

fn render_summary(tool: SourceTool, records: &[RawConversation]) -> String {
    let total_messages: u64 = records.iter().map(|r| r.message_count()).sum();
    serde_json::json!({
        "source_tool": tool,
        "total_conversations": records.len(),
        "total_messages": total_messages,
    })
    .to_string()
}
