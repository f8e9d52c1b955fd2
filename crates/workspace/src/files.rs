//! Scoped file I/O backing the `file` tool exposed to both the orchestrator
//! and sub-agents. Every operation is rooted at a directory (the session
//! directory for the orchestrator, the agent directory for a sub-agent) and
//! goes through [`crate::paths::validate_path`] first.

use std::path::Path;

use chrono::{DateTime, Utc};
use dr_domain::tool_error::ToolError;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::paths::validate_path;

#[derive(Debug, Clone, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,
    pub modified: String,
    pub is_dir: bool,
}

pub async fn read(
    root: &Path,
    path: &str,
    offset: Option<usize>,
    limit: Option<usize>,
) -> Result<Value, ToolError> {
    let resolved = validate_path(root, path)?;
    let content = fs::read_to_string(&resolved)
        .await
        .map_err(|_| ToolError::file_not_found(path))?;

    let lines: Vec<&str> = content.lines().collect();
    let total_lines = lines.len();
    let offset = offset.unwrap_or(0);
    let limit = limit.unwrap_or(total_lines.saturating_sub(offset));
    let selected: Vec<&str> = lines.into_iter().skip(offset).take(limit).collect();

    Ok(serde_json::json!({
        "path": path,
        "content": selected.join("\n"),
        "total_lines": total_lines,
        "offset": offset,
        "lines_returned": selected.len(),
    }))
}

/// Write a file atomically: write to a uniquely-named `.tmp` sibling, flush
/// and sync it, then rename into place. A crash mid-write never leaves a
/// partially-written file at `path`.
pub async fn write(root: &Path, path: &str, content: &str) -> Result<Value, ToolError> {
    let resolved = validate_path(root, path)?;

    if let Some(parent) = resolved.parent() {
        fs::create_dir_all(parent).await.map_err(dr_domain::error::Error::Io)?;
    }

    let tmp_name = format!(
        ".{}.{}.tmp",
        resolved.file_name().unwrap_or_default().to_string_lossy(),
        uuid::Uuid::new_v4().as_simple()
    );
    let tmp_path = resolved.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp_path).await.map_err(dr_domain::error::Error::Io)?;
    file.write_all(content.as_bytes()).await.map_err(dr_domain::error::Error::Io)?;
    file.flush().await.map_err(dr_domain::error::Error::Io)?;
    file.sync_data().await.map_err(dr_domain::error::Error::Io)?;

    if let Err(e) = fs::rename(&tmp_path, &resolved).await {
        let tmp = tmp_path.clone();
        tokio::spawn(async move {
            let _ = fs::remove_file(&tmp).await;
        });
        return Err(dr_domain::error::Error::Io(e).into());
    }

    Ok(serde_json::json!({
        "path": path,
        "bytes_written": content.len(),
        "success": true,
    }))
}

pub async fn append(root: &Path, path: &str, content: &str) -> Result<Value, ToolError> {
    let resolved = validate_path(root, path)?;

    if let Some(parent) = resolved.parent() {
        fs::create_dir_all(parent).await.map_err(dr_domain::error::Error::Io)?;
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&resolved)
        .await
        .map_err(dr_domain::error::Error::Io)?;
    file.write_all(content.as_bytes()).await.map_err(dr_domain::error::Error::Io)?;
    file.flush().await.map_err(dr_domain::error::Error::Io)?;

    Ok(serde_json::json!({
        "path": path,
        "bytes_appended": content.len(),
        "success": true,
    }))
}

pub async fn list(root: &Path, path: &str) -> Result<Value, ToolError> {
    let resolved = validate_path(root, path)?;
    let mut read_dir = fs::read_dir(&resolved).await.map_err(|_| ToolError::file_not_found(path))?;

    let mut entries = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(dr_domain::error::Error::Io)?
    {
        let metadata = entry.metadata().await.map_err(dr_domain::error::Error::Io)?;
        let modified = metadata
            .modified()
            .ok()
            .map(|t| {
                let dt: DateTime<Utc> = t.into();
                dt.to_rfc3339()
            })
            .unwrap_or_default();
        entries.push(DirEntry {
            name: entry.file_name().to_string_lossy().to_string(),
            size: metadata.len(),
            modified,
            is_dir: metadata.is_dir(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(serde_json::json!({
        "path": path,
        "entries": entries,
        "count": entries.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let ws = TempDir::new().unwrap();
        write(ws.path(), "out.txt", "line0\nline1\n").await.unwrap();
        let result = read(ws.path(), "out.txt", None, None).await.unwrap();
        assert_eq!(result["content"].as_str().unwrap(), "line0\nline1");
    }

    #[tokio::test]
    async fn append_extends_existing_file() {
        let ws = TempDir::new().unwrap();
        write(ws.path(), "log.txt", "a\n").await.unwrap();
        append(ws.path(), "log.txt", "b\n").await.unwrap();
        let result = read(ws.path(), "log.txt", None, None).await.unwrap();
        assert_eq!(result["content"].as_str().unwrap(), "a\nb");
    }

    #[tokio::test]
    async fn list_reports_directory_entries() {
        let ws = TempDir::new().unwrap();
        write(ws.path(), "a.txt", "x").await.unwrap();
        std::fs::create_dir(ws.path().join("sub")).unwrap();
        let result = list(ws.path(), ".").await.unwrap();
        assert_eq!(result["count"].as_u64().unwrap(), 2);
    }

    #[tokio::test]
    async fn write_rejects_escaping_path() {
        let ws = TempDir::new().unwrap();
        let err = write(ws.path(), "../escape.txt", "x").await.unwrap_err();
        assert_eq!(err.error_code, dr_domain::tool_error::ToolErrorCode::FileAccessDenied);
    }
}
