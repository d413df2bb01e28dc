//! Integration coverage for the conversation cache's manifest-mtime
//! invalidation (spec §4.7): touching a project's manifest file changes the
//! project hash even when the project path and context keywords don't move,
//! so a stale cache entry is never served across a dependency bump.

use std::time::{Duration, SystemTime};

use filetime::{set_file_mtime, FileTime};
use gandalf_core::cache::ConversationCache;
use gandalf_core::model::{ConversationRecord, ConversationType, SourceTool};
use tempfile::tempdir;

fn sample_record(id: &str) -> ConversationRecord {
    ConversationRecord {
        id: id.to_string(),
        source_tool: SourceTool::Cursor,
        title: "t".to_string(),
        created_at: None,
        updated_at: None,
        message_count: 1,
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
fn manifest_mtime_change_invalidates_the_cache() {
    let cache_dir = tempdir().unwrap();
    let project = tempdir().unwrap();
    std::fs::write(project.path().join("Cargo.toml"), "[package]\nname=\"x\"\n").unwrap();

    let cache = ConversationCache::new(cache_dir.path());
    let records: Vec<_> = (0..6).map(|i| sample_record(&i.to_string())).collect();

    let hash_before = ConversationCache::project_hash(project.path(), &["keyword".to_string()]);
    cache.put(project.path(), &hash_before, &records).unwrap();
    assert!(cache.get(project.path(), &hash_before).is_some());

    let future = SystemTime::now() + Duration::from_secs(120);
    set_file_mtime(project.path().join("Cargo.toml"), FileTime::from_system_time(future)).unwrap();

    let hash_after = ConversationCache::project_hash(project.path(), &["keyword".to_string()]);
    assert_ne!(hash_before, hash_after, "touching the manifest must change the project hash");
    assert!(cache.get(project.path(), &hash_after).is_none());
}

#[test]
fn cache_is_keyed_per_project_root() {
    let cache_dir = tempdir().unwrap();
    let project_a = tempdir().unwrap();
    let project_b = tempdir().unwrap();

    let cache = ConversationCache::new(cache_dir.path());
    let records: Vec<_> = (0..6).map(|i| sample_record(&i.to_string())).collect();

    let hash_a = ConversationCache::project_hash(project_a.path(), &[]);
    cache.put(project_a.path(), &hash_a, &records).unwrap();

    let hash_b = ConversationCache::project_hash(project_b.path(), &[]);
    assert!(cache.get(project_b.path(), &hash_b).is_none());
    assert!(cache.get(project_a.path(), &hash_a).is_some());
}
