//! C7 Conversation Cache — per-project disk cache of prior scored results
//! (spec §4.7). Grounded in the teacher's `cursor::cache` staleness-by-mtime
//! pattern (`is_cache_stale`, a flat JSON-lines payload file next to a
//! metadata file), generalized to per-project keying and a composite
//! project hash.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{CACHE_CONVERSATIONS_FILE, CACHE_METADATA_FILE, CACHE_MIN_SIZE, CACHE_TTL_HOURS, MANIFEST_FILES};
use crate::error::CoreResult;
use crate::model::ConversationRecord;

#[derive(Debug, Serialize, Deserialize)]
struct CacheMetadata {
    project_hash: String,
    written_at_epoch: i64,
}

pub struct ConversationCache {
    cache_dir: PathBuf,
    ttl_hours: i64,
    min_size: usize,
    /// Per-project-slot write locks, mirroring the pool's path-keyed
    /// registry (spec §4.7) — a reader must never observe a metadata file
    /// and conversations file from two different writes.
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl ConversationCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        ConversationCache {
            cache_dir: cache_dir.into(),
            ttl_hours: CACHE_TTL_HOURS,
            min_size: CACHE_MIN_SIZE,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(cache_dir: impl Into<PathBuf>, ttl_hours: i64, min_size: usize) -> Self {
        ConversationCache {
            cache_dir: cache_dir.into(),
            ttl_hours,
            min_size,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn project_slot(&self, project_root: &Path) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(project_root.to_string_lossy().as_bytes());
        let digest = hasher.finalize();
        self.cache_dir.join(hex(&digest))
    }

    /// Gets or creates the `Mutex` guarding reads/writes for a single
    /// project slot, so concurrent `get`/`put` calls against the same
    /// project never interleave.
    fn slot_lock(&self, slot: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(slot.to_path_buf()).or_insert_with(|| Arc::new(Mutex::new(()))))
    }

    /// Mixes the resolved project path, sorted context keywords, and the
    /// mtime of the first manifest file found — spec §4.7.
    pub fn project_hash(project_root: &Path, context_keywords: &[String]) -> String {
        let mut sorted_keywords = context_keywords.to_vec();
        sorted_keywords.sort();

        let manifest_mtime = MANIFEST_FILES
            .iter()
            .find_map(|name| std::fs::metadata(project_root.join(name)).ok())
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut hasher = Sha256::new();
        hasher.update(project_root.to_string_lossy().as_bytes());
        hasher.update(sorted_keywords.join(",").as_bytes());
        hasher.update(manifest_mtime.to_le_bytes());
        hex(&hasher.finalize())
    }

    /// Returns cached records only if the TTL and project hash both still
    /// match; the caller re-filters against the live request parameters.
    pub fn get(&self, project_root: &Path, expected_hash: &str) -> Option<Vec<ConversationRecord>> {
        let slot = self.project_slot(project_root);
        let lock = self.slot_lock(&slot);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let metadata_path = slot.join(CACHE_METADATA_FILE);
        let payload_path = slot.join(CACHE_CONVERSATIONS_FILE);

        let metadata_raw = std::fs::read_to_string(&metadata_path).ok()?;
        let metadata: CacheMetadata = serde_json::from_str(&metadata_raw).ok()?;

        if metadata.project_hash != expected_hash {
            return None;
        }

        let now = now_epoch_secs();
        let age_hours = (now - metadata.written_at_epoch).max(0) / 3600;
        if age_hours >= self.ttl_hours {
            return None;
        }

        let payload_raw = std::fs::read_to_string(&payload_path).ok()?;
        serde_json::from_str(&payload_raw).ok()
    }

    /// Writes the payload only if it meets `CACHE_MIN_SIZE` — spec §4.7 "on
    /// miss ... if the resulting set >= MIN_SIZE, write both files."
    pub fn put(&self, project_root: &Path, project_hash: &str, records: &[ConversationRecord]) -> CoreResult<()> {
        if records.len() < self.min_size {
            return Ok(());
        }

        let slot = self.project_slot(project_root);
        let lock = self.slot_lock(&slot);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        std::fs::create_dir_all(&slot)?;

        let metadata = CacheMetadata {
            project_hash: project_hash.to_string(),
            written_at_epoch: now_epoch_secs(),
        };

        // Payload first, metadata last: a reader never sees metadata for a
        // hash whose conversations file isn't there yet. Each file itself
        // is written to a sibling temp path and renamed in, so a reader
        // never observes a partially-written file either.
        write_atomic(&slot.join(CACHE_CONVERSATIONS_FILE), &serde_json::to_vec(records)?)?;
        write_atomic(&slot.join(CACHE_METADATA_FILE), &serde_json::to_vec(&metadata)?)?;
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    let tmp = path.with_extension(format!("tmp-{}", std::process::id()));
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn now_epoch_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
