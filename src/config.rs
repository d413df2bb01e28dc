//! Tunables named throughout the spec, as `pub const` defaults plus a typed
//! `CoreConfig` an embedder can override. Loading a config file from disk is
//! out of scope (external collaborator) — only the shape of the tunables
//! belongs here, the way the teacher's `models::load_config` is a flat
//! `KEY=VALUE` reader rather than a config *source*.

use std::time::Duration;

// ---- C1 Connection Pool -----------------------------------------------

pub const POOL_MAX_PER_KEY: usize = 5;
pub const POOL_BUSY_TIMEOUT: Duration = Duration::from_secs(2);
pub const SCOPED_TIMEOUT_OPERATION: Duration = Duration::from_secs(15);
pub const SCOPED_TIMEOUT_STRUCTURAL: Duration = Duration::from_secs(5);

// ---- C4 Content Validator ----------------------------------------------

pub const MAX_ANALYSIS_LEN: usize = 10_000;
pub const FALSE_POSITIVE_RATIO_THRESHOLD: f64 = 2.0;
pub const MIN_CONTENT_LEN: usize = 20;
pub const MAX_LIST_ITEMS_TO_CHECK: usize = 10;

pub const STRONG_INDICATORS: &[&str] = &[
    "messages",
    "content",
    "text",
    "prompt",
    "response",
    "user",
    "assistant",
    "entries",
    "conversation",
    "chat",
    "role",
];

pub const FALSE_POSITIVE_INDICATORS: &[&str] = &[
    "workbench",
    "panel",
    "view",
    "storage",
    "settings",
    "keybinding",
    "layout",
    "theme",
    "extension",
    "telemetry",
];

pub const CONTENT_KEYS: &[&str] = &["content", "text", "messages", "entries", "prompt", "response"];

// ---- C5 Context Keyword Builder ----------------------------------------

pub const MAX_CONTEXT_KEYWORDS: usize = 20;
pub const MAX_KEYWORDS_PER_FIELD: usize = 20;

pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "is", "are", "was", "were", "be", "been",
    "to", "of", "in", "on", "for", "with", "at", "by", "from", "this", "that", "it",
    "as", "can", "will", "would", "should", "could", "i", "you", "we", "they",
];

/// File extension -> technology keyword, per `_get_tech_category_from_extension`.
pub const EXTENSION_KEYWORDS: &[(&str, &str)] = &[
    (".py", "python"),
    (".js", "javascript"),
    (".ts", "typescript"),
    (".jsx", "react"),
    (".tsx", "react"),
    (".vue", "vue"),
    (".rs", "rust"),
    (".go", "go"),
    (".java", "java"),
    (".rb", "ruby"),
    (".php", "php"),
    (".cs", "csharp"),
    (".cpp", "cpp"),
    (".c", "c"),
    (".swift", "swift"),
    (".kt", "kotlin"),
];

/// Technology keyword -> terms recognized in README/CLAUDE.md prose, per
/// `TECHNOLOGY_KEYWORD_MAPPING`.
pub const TECHNOLOGY_KEYWORD_MAPPING: &[(&str, &[&str])] = &[
    ("python", &["python", "django", "flask", "fastapi"]),
    ("javascript", &["javascript", "node", "npm", "express"]),
    ("typescript", &["typescript", "ts"]),
    ("react", &["react", "jsx", "tsx", "next.js"]),
    ("rust", &["rust", "cargo", "tokio"]),
    ("go", &["golang", "go "]),
];

pub const MANIFEST_FILES: &[&str] = &[
    "package.json",
    "pyproject.toml",
    "requirements.txt",
    "Cargo.toml",
];

// ---- C6 Relevance Engine ------------------------------------------------

pub const MAX_EXTRACTION_CHARS: usize = 5_000;
pub const KEYWORD_CHECK_LIMIT: usize = 50;
pub const KEYWORD_MATCHES_LIMIT: usize = 10;
pub const KEYWORD_WEIGHT: f64 = 0.05;
pub const EARLY_TERMINATION_THRESHOLD: f64 = 0.1;
pub const FILE_REF_SCORE_INCREMENT: f64 = 0.1;
pub const MAX_FILE_REF_MATCHES: usize = 10;
pub const MAX_PROJECT_FILES_SCANNED: usize = 2_000;

/// Component weights the three 0.0-1.0 sub-scores are multiplied by before
/// summing into `final_score`, per `CONVERSATION_WEIGHTS` in
/// `conversation_recall.py`. Each sub-score is already capped at 1.0
/// individually; the weighted sum is not capped again, which is what makes
/// `DEFAULT_MIN_SCORE` a reachable threshold rather than an impossible one.
pub const CONVERSATION_WEIGHT_KEYWORD: f64 = 2.0;
pub const CONVERSATION_WEIGHT_RECENCY: f64 = 1.0;
pub const CONVERSATION_WEIGHT_FILE_REFERENCE: f64 = 0.5;

/// (max_days_ago, score) pairs, checked in order; `RECENCY_DEFAULT_SCORE`
/// applies past the last bucket.
pub const RECENCY_BUCKETS: &[(i64, f64)] = &[(1, 1.0), (7, 0.8), (30, 0.5), (90, 0.2)];
pub const RECENCY_DEFAULT_SCORE: f64 = 0.1;

// ---- C7 Conversation Cache ----------------------------------------------

pub const CACHE_TTL_HOURS: i64 = 24;
pub const CACHE_MIN_SIZE: usize = 5;
pub const CACHE_CONVERSATIONS_FILE: &str = "conversations.json";
pub const CACHE_METADATA_FILE: &str = "metadata.json";

// ---- C9 Aggregator -------------------------------------------------------

pub const DAYS_LOOKBACK_MIN: u32 = 1;
pub const DAYS_LOOKBACK_MAX: u32 = 60;
pub const RECALL_DEFAULT_DAYS_LOOKBACK: u32 = 7;
pub const SEARCH_DEFAULT_DAYS_LOOKBACK: u32 = 30;
pub const LIMIT_MIN: usize = 1;
pub const LIMIT_MAX: usize = 100;
pub const DEFAULT_LIMIT: usize = 20;
pub const DEFAULT_MIN_SCORE: f64 = 2.0;
pub const EARLY_TERMINATION_MULTIPLIER: usize = 3;
pub const PER_SOURCE_DEADLINE: Duration = Duration::from_secs(10);

// ---- C10 Response Shaper -------------------------------------------------

pub const MAX_RESPONSE_BYTES: usize = 256 * 1024;
pub const ID_MAX: usize = 50;
pub const TITLE_MAX: usize = 100;
pub const SNIPPET_MAX: usize = 150;

// ---- Export --------------------------------------------------------------

pub const EXPORT_DEFAULT_LIMIT: usize = 10;
pub const EXPORT_MAX_LIMIT: usize = 100;
pub const EXPORT_NAME_MAX: usize = 100;

/// Typed, overridable bundle of the above. Defaults match the `pub const`s;
/// an embedder constructs one with `CoreConfig::default()` and tweaks fields
/// (e.g. a test wanting a tiny `max_response_bytes` to exercise degradation).
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub pool_max_per_key: usize,
    pub pool_busy_timeout: Duration,
    pub scoped_timeout_operation: Duration,
    pub per_source_deadline: Duration,
    pub cache_ttl_hours: i64,
    pub cache_min_size: usize,
    pub max_response_bytes: usize,
    pub early_termination_multiplier: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            pool_max_per_key: POOL_MAX_PER_KEY,
            pool_busy_timeout: POOL_BUSY_TIMEOUT,
            scoped_timeout_operation: SCOPED_TIMEOUT_OPERATION,
            per_source_deadline: PER_SOURCE_DEADLINE,
            cache_ttl_hours: CACHE_TTL_HOURS,
            cache_min_size: CACHE_MIN_SIZE,
            max_response_bytes: MAX_RESPONSE_BYTES,
            early_termination_multiplier: EARLY_TERMINATION_MULTIPLIER,
        }
    }
}
