//! C1 Connection Pool — pooled, health-checked, timeout-bounded SQLite
//! handles, one pool per absolute path. Grounded in
//! `original_source/server/src/utils/database_pool.py::ConnectionPool` and
//! the teacher's `cursor::platform::open_db` (busy timeout, WAL, foreign
//! keys, read-only open).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::Connection;

use crate::config::{POOL_BUSY_TIMEOUT, POOL_MAX_PER_KEY};
use crate::error::{CoreError, CoreResult};

pub struct ConnectionPool {
    max_per_key: usize,
    busy_timeout: Duration,
    idle: Mutex<HashMap<PathBuf, Vec<Connection>>>,
}

impl Default for ConnectionPool {
    fn default() -> Self {
        ConnectionPool::new(POOL_MAX_PER_KEY, POOL_BUSY_TIMEOUT)
    }
}

impl ConnectionPool {
    pub fn new(max_per_key: usize, busy_timeout: Duration) -> Self {
        ConnectionPool {
            max_per_key,
            busy_timeout,
            idle: Mutex::new(HashMap::new()),
        }
    }

    /// Scoped acquisition: `f` runs with a borrowed, healthy connection. The
    /// connection is returned to the pool (or closed, if unhealthy/pool-full)
    /// on every exit path, including an error return from `f` — spec §4.1.
    pub fn with_connection<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&Connection) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let key = canonical_key(path);
        let conn = self.checkout(&key, path)?;
        let result = f(&conn);
        self.checkin(key, conn);
        result
    }

    fn checkout(&self, key: &Path, original_path: &Path) -> CoreResult<Connection> {
        {
            let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(slot) = idle.get_mut(key) {
                if let Some(conn) = slot.pop() {
                    if is_healthy(&conn) {
                        return Ok(conn);
                    }
                    log::debug!("discarding unhealthy pooled connection for {}", key.display());
                }
            }
        }
        open_connection(original_path, self.busy_timeout)
    }

    fn checkin(&self, key: PathBuf, conn: Connection) {
        if !is_healthy(&conn) {
            return;
        }
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        let slot = idle.entry(key).or_default();
        if slot.len() < self.max_per_key {
            slot.push(conn);
        }
        // else: drop(conn) closes it — pool for this key is full.
    }

    pub fn close_all(&self) {
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        idle.clear();
    }

    /// Snapshot of idle-handle counts per key, for diagnostics.
    pub fn stats(&self) -> HashMap<PathBuf, usize> {
        let idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        idle.iter().map(|(k, v)| (k.clone(), v.len())).collect()
    }
}

fn canonical_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn open_connection(path: &Path, busy_timeout: Duration) -> CoreResult<Connection> {
    if !path.exists() {
        return Err(CoreError::source_unavailable(path, "database file does not exist"));
    }

    let conn = Connection::open_with_flags(path, rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| CoreError::source_unavailable(path, format!("cannot open database: {e}")))?;

    conn.busy_timeout(busy_timeout)
        .map_err(|e| CoreError::source_unavailable(path, format!("busy_timeout failed: {e}")))?;
    conn.pragma_update(None, "foreign_keys", "ON").ok();
    conn.pragma_update(None, "journal_mode", "WAL").ok();
    conn.pragma_update(None, "synchronous", "NORMAL").ok();

    Ok(conn)
}

/// Cheap `SELECT 1` health check (spec §4.1).
fn is_healthy(conn: &Connection) -> bool {
    conn.query_row("SELECT 1", [], |_| Ok(())).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_db(dir: &Path) -> PathBuf {
        let path = dir.join("state.vscdb");
        let conn = Connection::open(&path).unwrap();
        conn.execute("CREATE TABLE ItemTable (key TEXT PRIMARY KEY, value TEXT)", [])
            .unwrap();
        path
    }

    #[test]
    fn opens_and_reuses_connections() {
        let dir = tempdir().unwrap();
        let path = make_db(dir.path());

        let seed = Connection::open(&path).unwrap();
        seed.execute("INSERT INTO ItemTable (key, value) VALUES ('a', 'b')", []).unwrap();
        drop(seed);

        let pool = ConnectionPool::default();

        pool.with_connection(&path, |conn| conn.query_row("SELECT 1", [], |_| Ok(())).map_err(CoreError::from))
            .unwrap();

        let stats_before = pool.stats();
        assert_eq!(stats_before.values().sum::<usize>(), 1);

        let value: String = pool
            .with_connection(&path, |conn| {
                conn.query_row("SELECT value FROM ItemTable WHERE key = 'a'", [], |r| r.get(0))
                    .map_err(CoreError::from)
            })
            .unwrap();
        assert_eq!(value, "b");
    }

    #[test]
    fn missing_database_is_source_unavailable() {
        let pool = ConnectionPool::default();
        let result = pool.with_connection(Path::new("/nonexistent/does-not-exist.vscdb"), |_| Ok(()));
        assert!(matches!(result, Err(CoreError::SourceUnavailable { .. })));
    }

    #[test]
    fn respects_max_per_key() {
        let dir = tempdir().unwrap();
        let path = make_db(dir.path());
        let pool = ConnectionPool::new(1, Duration::from_millis(500));

        // Two nested scoped acquisitions exceed max_per_key=1 for the second checkin;
        // the pool must not panic and must keep serving connections.
        for _ in 0..3 {
            pool.with_connection(&path, |conn| {
                conn.query_row("SELECT 1", [], |_| Ok(())).map_err(CoreError::from)
            })
            .unwrap();
        }
        let stats = pool.stats();
        assert!(stats.values().sum::<usize>() <= 1);
    }
}
