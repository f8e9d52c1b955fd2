//! Path containment.
//!
//! Every tool that resolves a caller-supplied relative path must route it
//! through [`validate_path`] first: absolute paths and `..` components are
//! rejected outright, and the resolved path is checked against the root
//! even when the target doesn't exist yet (by walking up to the nearest
//! existing ancestor and re-appending the missing tail).

use std::path::{Component, Path, PathBuf};

use dr_domain::tool_error::ToolError;

fn denied(message: impl Into<String>) -> ToolError {
    ToolError::new(
        dr_domain::tool_error::ToolErrorCode::FileAccessDenied,
        message,
        "use a path inside the permitted directory".to_string(),
        false,
    )
}

pub fn validate_path(root: &Path, requested: &str) -> Result<PathBuf, ToolError> {
    let requested_path = Path::new(requested);
    if requested_path.is_absolute() {
        return Err(denied(format!(
            "absolute paths are not allowed; use a path relative to the workspace root (got '{requested}')"
        )));
    }

    for component in requested_path.components() {
        if matches!(component, Component::ParentDir) {
            return Err(denied("path must not contain '..' components"));
        }
    }

    let canonical_root = root
        .canonicalize()
        .map_err(|e| denied(format!("cannot resolve workspace root '{}': {e}", root.display())))?;

    let candidate = canonical_root.join(requested_path);

    let resolved = if candidate.exists() {
        candidate
            .canonicalize()
            .map_err(|e| denied(format!("cannot resolve path '{}': {e}", candidate.display())))?
    } else {
        let mut existing = candidate.as_path();
        let mut tail_parts: Vec<&std::ffi::OsStr> = Vec::new();
        loop {
            if existing.exists() {
                break;
            }
            match existing.parent() {
                Some(parent) => {
                    if let Some(file_name) = existing.file_name() {
                        tail_parts.push(file_name);
                    }
                    existing = parent;
                }
                None => break,
            }
        }
        let mut resolved = existing
            .canonicalize()
            .map_err(|e| denied(format!("cannot resolve ancestor of '{}': {e}", candidate.display())))?;
        for part in tail_parts.into_iter().rev() {
            resolved.push(part);
        }
        resolved
    };

    if !resolved.starts_with(&canonical_root) {
        return Err(ToolError::file_access_denied(requested));
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rejects_parent_traversal() {
        let ws = TempDir::new().unwrap();
        let result = validate_path(ws.path(), "../etc/passwd");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_absolute_path() {
        let ws = TempDir::new().unwrap();
        let abs_path = if cfg!(windows) { "C:\\Windows" } else { "/etc/passwd" };
        assert!(validate_path(ws.path(), abs_path).is_err());
    }

    #[test]
    fn accepts_existing_file() {
        let ws = TempDir::new().unwrap();
        std::fs::write(ws.path().join("hello.txt"), "hi").unwrap();
        let result = validate_path(ws.path(), "hello.txt");
        assert!(result.is_ok());
        assert!(result.unwrap().ends_with("hello.txt"));
    }

    #[test]
    fn accepts_new_file_in_existing_subdir() {
        let ws = TempDir::new().unwrap();
        std::fs::create_dir_all(ws.path().join("sub")).unwrap();
        assert!(validate_path(ws.path(), "sub/new.txt").is_ok());
    }

    #[test]
    fn accepts_new_nested_dirs_not_yet_created() {
        let ws = TempDir::new().unwrap();
        assert!(validate_path(ws.path(), "charts/plot.png").is_ok());
    }
}
