//! Project root resolution, feeding the Context Keyword Builder (C5) and
//! the Relevance Engine's file-reference check (C6). Grounded in
//! `original_source/src/adapters/claude_code.py::resolve_project_root`'s
//! precedence order: explicit field, then `WORKSPACE_FOLDER_PATHS`-style
//! environment input, then the nearest `.git`-bearing ancestor, then the
//! current directory.

use std::env;
use std::path::{Path, PathBuf};

const GIT_INDICATOR: &str = ".git";

/// Resolves the project root for a request. `explicit_root`, when present
/// and existing, always wins.
pub fn resolve_project_root(explicit_root: Option<&str>) -> PathBuf {
    if let Some(root) = explicit_root {
        let path = PathBuf::from(root);
        if path.exists() {
            return path;
        }
    }

    if let Ok(workspace_paths) = env::var("WORKSPACE_FOLDER_PATHS") {
        for candidate in workspace_paths.split(':') {
            let candidate = candidate.trim();
            if candidate.is_empty() {
                continue;
            }
            let path = PathBuf::from(candidate);
            if path.exists() {
                return path;
            }
        }
    }

    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    if let Some(git_root) = nearest_git_root(&cwd) {
        return git_root;
    }

    cwd
}

fn nearest_git_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(GIT_INDICATOR).exists() {
            return Some(current.to_path_buf());
        }
        current = current.parent()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn explicit_root_wins_when_it_exists() {
        let dir = tempdir().unwrap();
        let resolved = resolve_project_root(Some(&dir.path().to_string_lossy()));
        assert_eq!(resolved, dir.path());
    }

    #[test]
    fn nonexistent_explicit_root_falls_through() {
        let resolved = resolve_project_root(Some("/definitely/does/not/exist/xyz"));
        assert_ne!(resolved, PathBuf::from("/definitely/does/not/exist/xyz"));
    }

    #[test]
    fn finds_nearest_git_ancestor() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let nested = dir.path().join("src/inner");
        std::fs::create_dir_all(&nested).unwrap();

        let found = nearest_git_root(&nested);
        assert_eq!(found, Some(dir.path().to_path_buf()));
    }
}
