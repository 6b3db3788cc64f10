//! Path validation for the file tools.
//!
//! Confines file access to allowed roots and blocks forbidden paths
//! (e.g., ~/.ssh, /etc/shadow).

use std::path::{Component, Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathGuardError {
    #[error("Path '{path}' is outside allowed roots")]
    OutsideAllowedRoots { path: String },

    #[error("Path '{path}' is under forbidden path '{pattern}'")]
    ForbiddenPath { path: String, pattern: String },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Failed to resolve path '{path}': {reason}")]
    ResolveFailed { path: String, reason: String },
}

/// Allowed roots and forbidden prefixes for file access.
///
/// An empty root list allows anything that is not forbidden. Forbidden
/// paths take precedence over allowed roots.
#[derive(Debug, Clone, Default)]
pub struct PathGuard {
    allowed_roots: Vec<PathBuf>,
    forbidden_paths: Vec<PathBuf>,
}

impl PathGuard {
    pub fn new(allowed_roots: Vec<PathBuf>, forbidden_paths: Vec<PathBuf>) -> Self {
        Self {
            allowed_roots: allowed_roots.iter().map(|p| resolve_prefix(p)).collect(),
            forbidden_paths: forbidden_paths.iter().map(|p| resolve_prefix(p)).collect(),
        }
    }

    /// A guard with no restrictions.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Validate `path` and return its resolved form.
    ///
    /// Symlinks are resolved for existing paths; for a path that does not
    /// exist yet, its parent is resolved instead.
    pub fn check(&self, path: &str) -> Result<PathBuf, PathGuardError> {
        let input = Path::new(path);

        if input.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(PathGuardError::PathTraversal { path: path.into() });
        }

        let resolved = resolve(input).map_err(|e| PathGuardError::ResolveFailed {
            path: path.into(),
            reason: e.to_string(),
        })?;

        if let Some(forbidden) = self.forbidden_paths.iter().find(|f| resolved.starts_with(f)) {
            return Err(PathGuardError::ForbiddenPath {
                path: path.into(),
                pattern: forbidden.display().to_string(),
            });
        }

        if !self.allowed_roots.is_empty()
            && !self.allowed_roots.iter().any(|root| resolved.starts_with(root))
        {
            return Err(PathGuardError::OutsideAllowedRoots { path: path.into() });
        }

        Ok(resolved)
    }
}

fn resolve(input: &Path) -> std::io::Result<PathBuf> {
    if input.exists() {
        return input.canonicalize();
    }

    match (input.parent(), input.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() && parent.exists() => {
            Ok(parent.canonicalize()?.join(name))
        }
        (Some(parent), Some(name)) if parent.as_os_str().is_empty() => {
            Ok(std::env::current_dir()?.join(name))
        }
        _ => Ok(input.to_path_buf()),
    }
}

/// Expand `~` and resolve symlinks where the prefix exists.
fn resolve_prefix(path: &Path) -> PathBuf {
    let expanded = expand_tilde(path);
    expanded.canonicalize().unwrap_or(expanded)
}

fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("USERPROFILE").map(PathBuf::from)
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("HOME").map(PathBuf::from)
    }
}
