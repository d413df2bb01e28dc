//! `gandalf_core` — a local conversation aggregator: discovers, extracts,
//! scores, and merges AI-assistant chat histories from Cursor, Claude Code,
//! and Windsurf into one ranked view.
//!
//! The crate is layered strictly by component number (C1 through C10); each
//! module depends only on lower-numbered ones:
//!
//! `pool` (C1) → `locator` (C2) → `extractors` (C3) → `validator` (C4) /
//! `keywords` (C5) / `relevance` (C6) → `cache` (C7) → `normalize` (C8) →
//! `aggregator` (C9) → `shaper` (C10).
//!
//! `query` and `export` sit alongside the aggregator as the remaining two
//! public operations from spec §6. The RPC/transport layer, CLI wiring, and
//! config *loading* are left to an embedder — see `src/bin/gandalf-cli.rs`
//! for a thin example.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod deps;
pub mod error;
pub mod export;
pub mod extractors;
pub mod keywords;
pub mod locator;
pub mod model;
pub mod normalize;
pub mod pool;
pub mod project;
pub mod query;
pub mod relevance;
pub mod shaper;
pub mod validator;

pub use aggregator::{AggregateResponse, Aggregator, RecallRequest, SearchRequest};
pub use error::{CoreError, CoreResult};
pub use model::{ConversationRecord, ConversationType, ShapedConversations, SourceTool};
