//! C5 Context Keyword Builder — deduplicated, case-insensitive keyword list
//! assembled from project metadata, extension-to-technology mapping, and
//! request-supplied text (spec §4.5). Grounded in
//! `original_source/src/config/constants/ide_constants.py`'s project
//! detection constants and the `_get_tech_category_from_extension` /
//! `TECHNOLOGY_KEYWORD_MAPPING` pattern referenced throughout
//! `conversation_recall.py`.

use std::collections::BTreeSet;
use std::path::Path;

use crate::config::{
    EXTENSION_KEYWORDS, MANIFEST_FILES, MAX_CONTEXT_KEYWORDS, MAX_KEYWORDS_PER_FIELD, MAX_PROJECT_FILES_SCANNED,
    STOP_WORDS, TECHNOLOGY_KEYWORD_MAPPING,
};
use crate::deps::ProjectFileLister;

#[derive(Debug, Default, Clone)]
pub struct KeywordInputs<'a> {
    pub project_root: Option<&'a Path>,
    pub user_prompt: Option<&'a str>,
    pub search_query: Option<&'a str>,
}

/// Builds the final, capped keyword list an embedder passes into the
/// Relevance Engine.
pub fn build_context_keywords(inputs: &KeywordInputs, file_lister: &dyn ProjectFileLister) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut ordered = Vec::new();

    let mut push = |word: String| {
        let key = word.to_lowercase();
        if key.is_empty() || seen.contains(&key) {
            return;
        }
        seen.insert(key);
        ordered.push(word);
    };

    if let Some(root) = inputs.project_root {
        for word in project_name_tokens(root) {
            push(word);
        }
        for word in manifest_tokens(root) {
            push(word);
        }
        for word in readme_technology_tokens(root) {
            push(word);
        }
        for word in extension_technology_tokens(root, file_lister) {
            push(word);
        }
    }

    if let Some(prompt) = inputs.user_prompt {
        for word in tokenize(prompt).into_iter().take(MAX_KEYWORDS_PER_FIELD) {
            push(word);
        }
    }
    if let Some(query) = inputs.search_query {
        for word in tokenize(query).into_iter().take(MAX_KEYWORDS_PER_FIELD) {
            push(word);
        }
    }

    ordered.truncate(MAX_CONTEXT_KEYWORDS);
    ordered
}

fn project_name_tokens(root: &Path) -> Vec<String> {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .map(|name| name.split(['-', '_', '.']).map(str::to_owned).collect())
        .unwrap_or_default()
}

/// Declared `keywords`/`dependencies` in package manifests at the project
/// root, plus the manifest's own technology (e.g. the presence of
/// `Cargo.toml` implies "rust").
fn manifest_tokens(root: &Path) -> Vec<String> {
    let mut tokens = Vec::new();
    for manifest in MANIFEST_FILES {
        let path = root.join(manifest);
        if !path.exists() {
            continue;
        }
        if let Some((_, tech)) = EXTENSION_KEYWORDS.iter().find(|(ext, _)| manifest.ends_with(&ext[1..])) {
            tokens.push(tech.to_string());
        }
        if let Ok(contents) = std::fs::read_to_string(&path) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&contents) {
                if let Some(keywords) = value.get("keywords").and_then(|v| v.as_array()) {
                    for kw in keywords {
                        if let Some(s) = kw.as_str() {
                            tokens.push(s.to_string());
                        }
                    }
                }
            }
        }
    }
    tokens
}

fn readme_technology_tokens(root: &Path) -> Vec<String> {
    let mut tokens = Vec::new();
    for name in ["README.md", "README", "CLAUDE.md"] {
        let path = root.join(name);
        let Ok(contents) = std::fs::read_to_string(&path) else { continue };
        let lower = contents.to_lowercase();
        for (tech, terms) in TECHNOLOGY_KEYWORD_MAPPING {
            if terms.iter().any(|t| lower.contains(t)) {
                tokens.push(tech.to_string());
            }
        }
    }
    tokens
}

/// Bounded recursive scan via the injected `ProjectFileLister`, rather than
/// a top-level-only `read_dir` (spec §6: the lister is the one collaborator
/// allowed to walk the project tree).
fn extension_technology_tokens(root: &Path, file_lister: &dyn ProjectFileLister) -> Vec<String> {
    let mut tokens = BTreeSet::new();
    for path in file_lister.list_files(root, MAX_PROJECT_FILES_SCANNED) {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else { continue };
        let dotted = format!(".{ext}");
        if let Some((_, tech)) = EXTENSION_KEYWORDS.iter().find(|(e, _)| *e == dotted) {
            tokens.insert(tech.to_string());
        }
    }
    tokens.into_iter().collect()
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 1 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::WalkdirFileLister;
    use tempfile::tempdir;

    #[test]
    fn tokenizes_prompt_stripping_stop_words() {
        let inputs = KeywordInputs {
            project_root: None,
            user_prompt: Some("the connection pool is leaking and I should fix it"),
            search_query: None,
        };
        let keywords = build_context_keywords(&inputs, &WalkdirFileLister);
        assert!(keywords.contains(&"connection".to_string()));
        assert!(keywords.contains(&"pool".to_string()));
        assert!(keywords.contains(&"leaking".to_string()));
        assert!(!keywords.contains(&"the".to_string()));
    }

    #[test]
    fn picks_up_manifest_keywords_and_extension_technology() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name": "my-app", "keywords": ["react", "typescript"]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("index.ts"), "export const x = 1;").unwrap();

        let inputs = KeywordInputs {
            project_root: Some(dir.path()),
            user_prompt: None,
            search_query: None,
        };
        let keywords = build_context_keywords(&inputs, &WalkdirFileLister);
        assert!(keywords.contains(&"react".to_string()));
        assert!(keywords.contains(&"typescript".to_string()));
    }

    #[test]
    fn caps_output_at_max_context_keywords() {
        let long_prompt: String = (0..50).map(|i| format!("keyword{i}")).collect::<Vec<_>>().join(" ");
        let inputs = KeywordInputs {
            project_root: None,
            user_prompt: Some(&long_prompt),
            search_query: None,
        };
        let keywords = build_context_keywords(&inputs, &WalkdirFileLister);
        assert!(keywords.len() <= MAX_CONTEXT_KEYWORDS);
    }

    #[test]
    fn dedups_case_insensitively() {
        let inputs = KeywordInputs {
            project_root: None,
            user_prompt: Some("Pool pool POOL"),
            search_query: None,
        };
        let keywords = build_context_keywords(&inputs, &WalkdirFileLister);
        assert_eq!(keywords.iter().filter(|k| k.to_lowercase() == "pool").count(), 1);
    }
}
