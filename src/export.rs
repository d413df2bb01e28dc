//! `export_individual_conversations` (spec §6): writes one file per
//! conversation to an output directory. Grounded in
//! `original_source/server/src/tool_calls/export.py`
//! (`format_timestamp`, `sanitize_filename`,
//! `_format_conversation_markdown`/`_format_conversation_text`), generalized
//! from Cursor-only to every source tool via the canonical
//! `ConversationRecord` rather than the raw Cursor composer shape.

use std::path::PathBuf;

use crate::config::{EXPORT_DEFAULT_LIMIT, EXPORT_MAX_LIMIT, EXPORT_NAME_MAX};
use crate::error::{CoreError, CoreResult};
use crate::model::ConversationRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Markdown,
    Text,
}

impl ExportFormat {
    pub fn parse(name: &str) -> CoreResult<Self> {
        match name {
            "json" => Ok(ExportFormat::Json),
            "md" | "markdown" => Ok(ExportFormat::Markdown),
            "txt" => Ok(ExportFormat::Text),
            other => Err(CoreError::Validation(format!(
                "format must be one of: json, md, markdown, txt (got '{other}')"
            ))),
        }
    }

    fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Markdown => "md",
            ExportFormat::Text => "txt",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportArgs {
    pub format: ExportFormat,
    pub output_dir: PathBuf,
    pub limit: usize,
    pub conversation_filter: Option<String>,
}

impl ExportArgs {
    pub fn validated(
        format: &str,
        output_dir: PathBuf,
        limit: Option<usize>,
        conversation_filter: Option<String>,
    ) -> CoreResult<Self> {
        let limit = limit.unwrap_or(EXPORT_DEFAULT_LIMIT);
        if limit < 1 || limit > EXPORT_MAX_LIMIT {
            return Err(CoreError::Validation(format!(
                "limit must be between 1 and {EXPORT_MAX_LIMIT}"
            )));
        }
        Ok(ExportArgs {
            format: ExportFormat::parse(format)?,
            output_dir,
            limit,
            conversation_filter,
        })
    }
}

#[derive(Debug)]
pub struct ExportResponse {
    pub exported_count: usize,
    pub output_directory: PathBuf,
    pub files: Vec<PathBuf>,
}

/// `now_epoch_secs` is threaded through rather than read from the clock, so
/// filenames stay deterministic and testable.
pub fn export_individual(
    records: &[ConversationRecord],
    args: &ExportArgs,
    now_epoch_secs: i64,
) -> CoreResult<ExportResponse> {
    let filtered: Vec<&ConversationRecord> = records
        .iter()
        .filter(|r| match &args.conversation_filter {
            Some(needle) => r.title.to_lowercase().contains(&needle.to_lowercase()),
            None => true,
        })
        .take(args.limit)
        .collect();

    std::fs::create_dir_all(&args.output_dir)?;

    let mut files = Vec::with_capacity(filtered.len());
    for record in &filtered {
        let timestamp = format_timestamp(record_created_epoch(record, now_epoch_secs));
        let name = sanitize_filename(&record.title);
        let id8: String = record.id.chars().take(8).collect();
        let filename = format!("{timestamp}_{name}_{id8}.{}", args.format.extension());
        let path = args.output_dir.join(&filename);

        let content = match args.format {
            ExportFormat::Json => serde_json::to_string_pretty(record)?,
            ExportFormat::Markdown => format_markdown(record),
            ExportFormat::Text => format_text(record),
        };
        std::fs::write(&path, content)?;
        files.push(path);
    }

    Ok(ExportResponse {
        exported_count: files.len(),
        output_directory: args.output_dir.clone(),
        files,
    })
}

fn record_created_epoch(record: &ConversationRecord, fallback: i64) -> i64 {
    record
        .created_at
        .as_ref()
        .and_then(|t| t.as_epoch_secs())
        .unwrap_or(fallback)
}

/// `strftime("%Y%m%d_%H%M%S")` equivalent, via `chrono` (the teacher already
/// depends on it for the same purpose in `view::fmt`).
fn format_timestamp(epoch_secs: i64) -> String {
    chrono::DateTime::from_timestamp(epoch_secs, 0)
        .map(|dt| dt.format("%Y%m%d_%H%M%S").to_string())
        .unwrap_or_else(|| "19700101_000000".to_string())
}

const INVALID_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if INVALID_FILENAME_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    let trimmed: String = sanitized.trim().chars().take(EXPORT_NAME_MAX).collect();
    if trimmed.is_empty() {
        "unnamed_conversation".to_string()
    } else {
        trimmed
    }
}

fn format_markdown(record: &ConversationRecord) -> String {
    let mut out = format!("# {}\n\n**Conversation ID:** {}\n", record.title, record.id);
    out.push_str(&format!("**Source:** {}\n", record.source_tool));
    out.push_str("\n---\n\n");
    out.push_str(&format!(
        "```json\n{}\n```\n",
        serde_json::to_string_pretty(record).unwrap_or_default()
    ));
    out
}

fn format_text(record: &ConversationRecord) -> String {
    let mut out = format!("Conversation: {}\nID: {}\nSource: {}\n", record.title, record.id, record.source_tool);
    out.push_str(&"=".repeat(50));
    out.push_str("\n\nRaw Data:\n");
    out.push_str(&serde_json::to_string_pretty(record).unwrap_or_default());
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConversationType, SourceTool};
    use tempfile::tempdir;

    fn sample(id: &str, title: &str) -> ConversationRecord {
        ConversationRecord {
            id: id.to_string(),
            source_tool: SourceTool::Cursor,
            title: title.to_string(),
            created_at: None,
            updated_at: None,
            message_count: 3,
            snippet: "s".to_string(),
            relevance_score: 0.5,
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
    fn exports_one_file_per_conversation() {
        let dir = tempdir().unwrap();
        let records = vec![sample("abc12345", "Fix the pool leak"), sample("def67890", "Refactor parser")];
        let args = ExportArgs::validated("json", dir.path().to_path_buf(), None, None).unwrap();

        let response = export_individual(&records, &args, 1_700_000_000).unwrap();
        assert_eq!(response.exported_count, 2);
        for file in &response.files {
            assert!(file.exists());
        }
    }

    #[test]
    fn filename_uses_sanitized_name_and_short_id() {
        let dir = tempdir().unwrap();
        let records = vec![sample("abcdefgh12345", "Weird/Name:With*Chars")];
        let args = ExportArgs::validated("md", dir.path().to_path_buf(), None, None).unwrap();

        let response = export_individual(&records, &args, 1_700_000_000).unwrap();
        let filename = response.files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(filename.contains("Weird_Name_With_Chars"));
        assert!(filename.contains("abcdefgh"));
        assert!(filename.ends_with(".md"));
    }

    #[test]
    fn conversation_filter_matches_case_insensitively() {
        let dir = tempdir().unwrap();
        let records = vec![sample("a", "Fix the pool leak"), sample("b", "Unrelated topic")];
        let args = ExportArgs::validated("txt", dir.path().to_path_buf(), None, Some("pool".to_string())).unwrap();

        let response = export_individual(&records, &args, 0).unwrap();
        assert_eq!(response.exported_count, 1);
    }

    #[test]
    fn rejects_limit_out_of_range() {
        let dir = tempdir().unwrap();
        assert!(ExportArgs::validated("json", dir.path().to_path_buf(), Some(0), None).is_err());
        assert!(ExportArgs::validated("json", dir.path().to_path_buf(), Some(1000), None).is_err());
    }

    #[test]
    fn rejects_unknown_format() {
        let dir = tempdir().unwrap();
        assert!(ExportArgs::validated("pdf", dir.path().to_path_buf(), None, None).is_err());
    }
}
