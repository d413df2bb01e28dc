//! C9 Aggregator — orchestrates C2→C3→C6→C8, merges, sorts, and limits
//! (spec §4.9). Per-source fan-out runs as a `tokio::task::JoinSet`, one
//! task per enabled tool, under a shared per-request deadline; a per-source
//! failure is caught at its own branch and folded into `tool_results`
//! rather than failing the request, matching the teacher's async
//! MCP-request-loop error containment.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::cache::ConversationCache;
use crate::config::{
    CoreConfig, DAYS_LOOKBACK_MAX, DAYS_LOOKBACK_MIN, DEFAULT_LIMIT, DEFAULT_MIN_SCORE, LIMIT_MAX, LIMIT_MIN,
    RECALL_DEFAULT_DAYS_LOOKBACK, SEARCH_DEFAULT_DAYS_LOOKBACK,
};
use crate::deps::{PermissiveValidator, ProjectFileLister, RequestValidator, WalkdirFileLister};
use crate::error::{CoreError, CoreResult};
use crate::extractors::{claude_code, cursor, windsurf, RawConversation};
use crate::keywords::{build_context_keywords, KeywordInputs};
use crate::locator::{locator_for, Locator};
use crate::model::{ConversationRecord, ConversationType, ShapedConversations, SourceTool, ToolResult, ToolResults};
use crate::normalize::normalize;
use crate::pool::ConnectionPool;
use crate::project::resolve_project_root;
use crate::relevance;
use crate::shaper::shape;

#[derive(Debug, Clone)]
pub struct RecallRequest {
    pub fast_mode: bool,
    pub days_lookback: Option<u32>,
    pub limit: Option<usize>,
    pub min_score: Option<f64>,
    pub conversation_types: Option<Vec<ConversationType>>,
    pub tools: Option<Vec<String>>,
    pub user_prompt: Option<String>,
    pub search_query: Option<String>,
    pub project_root: Option<String>,
}

impl Default for RecallRequest {
    fn default() -> Self {
        RecallRequest {
            fast_mode: true,
            days_lookback: None,
            limit: None,
            min_score: None,
            conversation_types: None,
            tools: None,
            user_prompt: None,
            search_query: None,
            project_root: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub days_lookback: Option<u32>,
    pub limit: Option<usize>,
    pub min_score: Option<f64>,
    pub conversation_types: Option<Vec<ConversationType>>,
    pub tools: Option<Vec<String>>,
    pub include_content: bool,
    pub project_root: Option<String>,
}

#[derive(Debug)]
pub struct AggregateResponse {
    pub summary: String,
    pub conversations: ShapedConversations,
    pub available_tools: Vec<SourceTool>,
    pub tool_results: ToolResults,
    pub context_keywords: Vec<String>,
    pub status: String,
    pub partial: bool,
}

struct NormalizedRequest {
    days_lookback: u32,
    limit: usize,
    min_score: f64,
    conversation_types: Option<Vec<ConversationType>>,
    tools: Option<Vec<SourceTool>>,
    /// When true, the relevance engine may terminate a record's analysis
    /// early once keyword+recency fall under threshold (spec §4.6); search
    /// requests always want the full analysis since results are already
    /// query-filtered and comparatively few.
    detailed_scoring: bool,
    project_root: PathBuf,
}

pub struct Aggregator {
    pool: Arc<ConnectionPool>,
    cache: Arc<ConversationCache>,
    config: CoreConfig,
    validator: Arc<dyn RequestValidator>,
    file_lister: Arc<dyn ProjectFileLister>,
}

impl Aggregator {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Aggregator {
            pool: Arc::new(ConnectionPool::default()),
            cache: Arc::new(ConversationCache::new(cache_dir)),
            config: CoreConfig::default(),
            validator: Arc::new(PermissiveValidator),
            file_lister: Arc::new(WalkdirFileLister),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn RequestValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Rebuilds the pool and cache from an overriding `CoreConfig` (pool
    /// size/timeouts, cache TTL/min-size) — the embedder hook spec §2.3
    /// describes alongside the `pub const` defaults.
    pub fn with_config(mut self, config: CoreConfig) -> Self {
        self.pool = Arc::new(ConnectionPool::new(config.pool_max_per_key, config.pool_busy_timeout));
        self.cache = Arc::new(ConversationCache::with_ttl(
            self.cache.cache_dir(),
            config.cache_ttl_hours,
            config.cache_min_size,
        ));
        self.config = config;
        self
    }

    pub async fn recall(&self, request: RecallRequest) -> CoreResult<AggregateResponse> {
        if let Some(prompt) = &request.user_prompt {
            self.validator.validate_string(prompt, "user_prompt", 0, 10_000)?;
        }

        let normalized = self.normalize_request(
            request.days_lookback,
            request.limit,
            request.min_score,
            request.conversation_types.clone(),
            request.tools.clone(),
            RECALL_DEFAULT_DAYS_LOOKBACK,
            request.project_root.as_deref(),
            !request.fast_mode,
        )?;

        let context_keywords = build_context_keywords(
            &KeywordInputs {
                project_root: Some(normalized.project_root.as_path()),
                user_prompt: request.user_prompt.as_deref(),
                search_query: request.search_query.as_deref(),
            },
            self.file_lister.as_ref(),
        );

        self.run(normalized, context_keywords).await
    }

    pub async fn search(&self, request: SearchRequest) -> CoreResult<AggregateResponse> {
        self.validator.validate_string(&request.query, "query", 1, 500)?;

        let normalized = self.normalize_request(
            request.days_lookback,
            request.limit,
            request.min_score,
            request.conversation_types.clone(),
            request.tools.clone(),
            SEARCH_DEFAULT_DAYS_LOOKBACK,
            request.project_root.as_deref(),
            true,
        )?;

        let mut context_keywords = vec![request.query.to_lowercase()];
        context_keywords.extend(build_context_keywords(
            &KeywordInputs {
                project_root: Some(normalized.project_root.as_path()),
                user_prompt: None,
                search_query: Some(&request.query),
            },
            self.file_lister.as_ref(),
        ));

        self.run(normalized, context_keywords).await
    }

    #[allow(clippy::too_many_arguments)]
    fn normalize_request(
        &self,
        days_lookback: Option<u32>,
        limit: Option<usize>,
        min_score: Option<f64>,
        conversation_types: Option<Vec<ConversationType>>,
        tools: Option<Vec<String>>,
        default_days_lookback: u32,
        project_root: Option<&str>,
        detailed_scoring: bool,
    ) -> CoreResult<NormalizedRequest> {
        let days_lookback = days_lookback
            .unwrap_or(default_days_lookback)
            .clamp(DAYS_LOOKBACK_MIN, DAYS_LOOKBACK_MAX);
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(LIMIT_MIN, LIMIT_MAX);
        let min_score = min_score.unwrap_or(DEFAULT_MIN_SCORE).max(0.0);

        let resolved_tools = tools.map(|names| {
            names
                .iter()
                .filter_map(|n| {
                    let parsed = SourceTool::parse(n);
                    if parsed.is_none() {
                        log::warn!("ignoring unknown source tool name '{n}'");
                    }
                    parsed
                })
                .collect::<Vec<_>>()
        });

        Ok(NormalizedRequest {
            days_lookback,
            limit,
            min_score,
            conversation_types,
            tools: resolved_tools,
            detailed_scoring,
            project_root: resolve_project_root(project_root),
        })
    }

    async fn run(&self, request: NormalizedRequest, context_keywords: Vec<String>) -> CoreResult<AggregateResponse> {
        let enabled_tools: Vec<SourceTool> = request.tools.clone().unwrap_or_else(|| SourceTool::all().to_vec());

        let project_hash = ConversationCache::project_hash(&request.project_root, &context_keywords);
        if let Some(cached) = self.cache.get(&request.project_root, &project_hash) {
            let filtered: Vec<ConversationRecord> = cached
                .into_iter()
                .filter(|r| passes_filters(r, request.min_score, &request.conversation_types))
                .collect();
            if filtered.len() >= request.limit {
                return Ok(self.finish(filtered, request, context_keywords, BTreeMap::new(), enabled_tools, false));
            }
        }

        let deadline = self.config.per_source_deadline;
        let mut join_set: JoinSet<(SourceTool, CoreResult<Vec<RawConversation>>)> = JoinSet::new();

        for tool in &enabled_tools {
            let tool = *tool;
            let pool = Arc::clone(&self.pool);
            let project_root_for_filter = request.project_root.to_string_lossy().into_owned();
            join_set.spawn(async move {
                let outcome = tokio::time::timeout(deadline, extract_for_tool(tool, pool, project_root_for_filter)).await;
                match outcome {
                    Ok(result) => (tool, result),
                    Err(_) => (tool, Err(CoreError::SourceTimeout { elapsed_ms: deadline.as_millis() as u64 })),
                }
            });
        }

        let mut tool_results: ToolResults = BTreeMap::new();
        let mut scored: Vec<ConversationRecord> = Vec::new();
        let mut partial = false;
        let now = now_epoch_secs();
        let early_termination_count = request.limit * self.config.early_termination_multiplier;

        while let Some(joined) = join_set.join_next().await {
            let (tool, result) = match joined {
                Ok(v) => v,
                Err(_) => {
                    partial = true;
                    continue;
                }
            };

            match result {
                Ok(raw_records) => {
                    let mut kept = 0usize;
                    for raw in raw_records {
                        if kept >= early_termination_count {
                            break;
                        }
                        if !within_lookback(&raw, request.days_lookback, now) {
                            continue;
                        }
                        let analysis = relevance::score(
                            &raw,
                            &context_keywords,
                            Some(request.project_root.as_path()),
                            now,
                            request.detailed_scoring,
                            self.file_lister.as_ref(),
                        );
                        if analysis.final_score < request.min_score {
                            continue;
                        }
                        if let Some(types) = &request.conversation_types {
                            if !types.contains(&analysis.conversation_type) {
                                continue;
                            }
                        }
                        let normalized_record = normalize(&raw, &analysis, &context_keywords);
                        scored.push(normalized_record);
                        kept += 1;
                    }
                    tool_results.insert(tool, ToolResult { total_conversations: kept, error: None });
                }
                Err(e) if e.is_per_source() => {
                    partial = true;
                    tool_results.insert(tool, ToolResult { total_conversations: 0, error: Some(e.to_string()) });
                }
                Err(e) => return Err(e),
            }
        }

        if scored.len() >= self.config.cache_min_size {
            let _ = self.cache.put(&request.project_root, &project_hash, &scored);
        }

        Ok(self.finish(scored, request, context_keywords, tool_results, enabled_tools, partial))
    }

    fn finish(
        &self,
        mut records: Vec<ConversationRecord>,
        request: NormalizedRequest,
        context_keywords: Vec<String>,
        tool_results: ToolResults,
        available_tools: Vec<SourceTool>,
        partial: bool,
    ) -> AggregateResponse {
        records.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.updated_at_epoch().cmp(&a.updated_at_epoch()))
        });
        records.truncate(request.limit);

        let summary = format!("{} conversations across {} source(s)", records.len(), available_tools.len());
        let conversations = shape(records, self.config.max_response_bytes);

        AggregateResponse {
            summary,
            conversations,
            available_tools,
            tool_results,
            context_keywords,
            status: "ok".to_string(),
            partial,
        }
    }
}

fn within_lookback(record: &RawConversation, days_lookback: u32, now: i64) -> bool {
    let Some(updated) = record.updated_at.as_ref().and_then(|t| t.as_epoch_secs()) else {
        return true;
    };
    let age_days = (now - updated).max(0) / 86_400;
    age_days <= days_lookback as i64
}

fn passes_filters(record: &ConversationRecord, min_score: f64, types: &Option<Vec<ConversationType>>) -> bool {
    if record.relevance_score < min_score {
        return false;
    }
    if let Some(types) = types {
        if !types.contains(&record.conversation_type) {
            return false;
        }
    }
    true
}

async fn extract_for_tool(tool: SourceTool, pool: Arc<ConnectionPool>, project_root: String) -> CoreResult<Vec<RawConversation>> {
    tokio::task::spawn_blocking(move || extract_for_tool_sync(tool, &pool, &project_root))
        .await
        .map_err(|e| CoreError::Internal(e.to_string()))?
}

fn extract_for_tool_sync(tool: SourceTool, pool: &ConnectionPool, project_root: &str) -> CoreResult<Vec<RawConversation>> {
    let locator = locator_for(tool);
    let locations = locator.discover();
    if locations.is_empty() {
        return Err(CoreError::source_unavailable(project_root, format!("no {tool} store found")));
    }

    let mut all_records = Vec::new();
    for location in locations {
        let records = match tool {
            SourceTool::Cursor => cursor::extract(pool, &location.path)?.records,
            SourceTool::Windsurf => windsurf::extract(pool, &location.path)?.records,
            SourceTool::ClaudeCode => claude_code::extract(&location.path, Some(project_root), 50)?.records,
        };
        all_records.extend(records);
    }
    Ok(all_records)
}

fn now_epoch_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recall_with_no_sources_present_reports_per_source_errors_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let aggregator = Aggregator::new(dir.path());
        let response = aggregator
            .recall(RecallRequest {
                fast_mode: true,
                tools: Some(vec!["cursor".to_string()]),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(response.partial || response.tool_results.values().any(|r| r.error.is_some()));
    }

    #[tokio::test]
    async fn search_rejects_empty_query() {
        let dir = tempfile::tempdir().unwrap();
        let aggregator = Aggregator::new(dir.path());
        let result = aggregator
            .search(SearchRequest {
                query: String::new(),
                ..Default::default()
            })
            .await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn unknown_tool_names_are_filtered_out() {
        let names = vec!["cursor".to_string(), "not-a-real-tool".to_string()];
        let resolved: Vec<_> = names.iter().filter_map(|n| SourceTool::parse(n)).collect();
        assert_eq!(resolved, vec![SourceTool::Cursor]);
    }

    #[tokio::test]
    async fn with_config_overrides_cache_min_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CoreConfig::default();
        config.cache_min_size = 1;
        let aggregator = Aggregator::new(dir.path()).with_config(config);

        assert_eq!(aggregator.config.cache_min_size, 1);
        assert_eq!(aggregator.cache.cache_dir(), dir.path());
    }
}
