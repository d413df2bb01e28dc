//! External collaborators (spec §6). The core depends on these only through
//! traits; an embedder is expected to supply stricter implementations. The
//! defaults here (`PermissiveValidator`, `WalkdirFileLister`) make the crate
//! usable standalone and in tests, mirroring
//! `original_source/src/utils/access_control.py::AccessValidator`'s method
//! set for the validator, and the project-file scanning the spec assumes
//! exists externally (§6) for the lister.

use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// Mirrors `AccessValidator`'s public method set. Called at request-entry,
/// before any source access (spec §6).
pub trait RequestValidator: Send + Sync {
    fn validate_string(
        &self,
        value: &str,
        field_name: &str,
        min_length: usize,
        max_length: usize,
    ) -> Result<(), CoreError>;

    fn validate_array(&self, value: &[String], field_name: &str, max_items: usize) -> Result<(), CoreError>;

    fn validate_path(&self, path: &Path) -> Result<(), CoreError>;

    fn validate_file_extension(&self, ext: &str) -> Result<(), CoreError>;

    fn validate_integer(&self, value: i64, field_name: &str, min: i64, max: i64) -> Result<(), CoreError>;

    fn validate_enum(&self, value: &str, field_name: &str, allowed: &[&str]) -> Result<(), CoreError>;

    fn sanitize_project_name(&self, name: &str) -> String;
}

/// A permissive validator: it enforces the bounds already named in the
/// schemas (lengths, enums) but applies no additional security policy. Real
/// deployments (e.g. an MCP server embedding this crate) are expected to
/// supply a stricter implementation — see spec §6's "assume a validator
/// exists."
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissiveValidator;

impl RequestValidator for PermissiveValidator {
    fn validate_string(
        &self,
        value: &str,
        field_name: &str,
        min_length: usize,
        max_length: usize,
    ) -> Result<(), CoreError> {
        if value.len() < min_length {
            return Err(CoreError::Validation(format!(
                "{field_name} must be at least {min_length} characters"
            )));
        }
        if value.len() > max_length {
            return Err(CoreError::Validation(format!(
                "{field_name} cannot exceed {max_length} characters"
            )));
        }
        Ok(())
    }

    fn validate_array(&self, value: &[String], field_name: &str, max_items: usize) -> Result<(), CoreError> {
        if value.len() > max_items {
            return Err(CoreError::Validation(format!(
                "{field_name} cannot exceed {max_items} items"
            )));
        }
        Ok(())
    }

    fn validate_path(&self, path: &Path) -> Result<(), CoreError> {
        if path.to_string_lossy().contains("..") {
            return Err(CoreError::Validation("path traversal is not allowed".into()));
        }
        Ok(())
    }

    fn validate_file_extension(&self, ext: &str) -> Result<(), CoreError> {
        if !ext.starts_with('.') {
            return Err(CoreError::Validation(format!("invalid extension: {ext}")));
        }
        Ok(())
    }

    fn validate_integer(&self, value: i64, field_name: &str, min: i64, max: i64) -> Result<(), CoreError> {
        if value < min || value > max {
            return Err(CoreError::Validation(format!(
                "{field_name} must be between {min} and {max}"
            )));
        }
        Ok(())
    }

    fn validate_enum(&self, value: &str, field_name: &str, allowed: &[&str]) -> Result<(), CoreError> {
        if !allowed.contains(&value) {
            return Err(CoreError::Validation(format!(
                "{field_name} must be one of: {}",
                allowed.join(", ")
            )));
        }
        Ok(())
    }

    fn sanitize_project_name(&self, name: &str) -> String {
        let sanitized: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' { c } else { '_' })
            .collect();
        sanitized.chars().take(100).collect()
    }
}

/// Bounded project-file listing (spec §6: "assume a file lister exists").
pub trait ProjectFileLister: Send + Sync {
    fn list_files(&self, root: &Path, max_files: usize) -> Vec<PathBuf>;
}

/// `walkdir`-backed lister, depth- and count-bounded, skipping the usual
/// noise directories. Grounded in the pack's use of `walkdir` for project
/// tree scans (`claude-view`, `claude-code-history-viewer`).
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkdirFileLister;

const SKIP_DIRS: &[&str] = &["node_modules", ".git", "target", "dist", "build", ".venv", "__pycache__"];

impl ProjectFileLister for WalkdirFileLister {
    fn list_files(&self, root: &Path, max_files: usize) -> Vec<PathBuf> {
        walkdir::WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| {
                e.file_name()
                    .to_str()
                    .map(|n| !SKIP_DIRS.contains(&n))
                    .unwrap_or(true)
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .take(max_files)
            .map(|e| e.path().to_path_buf())
            .collect()
    }
}
