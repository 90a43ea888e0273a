//! Agent workspace readers
//!
//! Read-only views of the files the agent runtime keeps on disk: the session
//! index and the memory notes.

use crate::error::AppError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Maximum number of sessions returned
pub const MAX_SESSIONS: usize = 50;

/// One entry of the session index
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    /// Session key in the index
    pub id: String,
    /// Session id
    pub session_id: Option<String>,
    /// Last update, milliseconds since the epoch
    pub updated_at: Option<i64>,
    /// Channel the session came from
    pub channel: Option<String>,
    /// Model in use
    pub model: Option<String>,
    /// User-assigned label
    pub label: Option<String>,
    /// Tokens used so far
    pub total_tokens: Option<u64>,
}

/// A memory note available for reading
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct MemoryFile {
    /// Name shown in the file list
    pub name: String,
    /// Path relative to the workspace, as accepted by [`WorkspaceService::read_memory_file`]
    pub path: String,
}

/// Contents of one memory note
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct MemoryContent {
    /// File contents
    pub content: String,
    /// Path relative to the workspace
    pub path: String,
}

/// Reads the agent runtime's files under one root directory
#[derive(Debug, Clone)]
pub struct WorkspaceService {
    root: PathBuf,
}

impl WorkspaceService {
    /// Service rooted at `root` (the runtime's home directory)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn sessions_path(&self) -> PathBuf {
        self.root
            .join("agents")
            .join("main")
            .join("sessions")
            .join("sessions.json")
    }

    fn notes_dir(&self) -> PathBuf {
        self.root.join("workspace")
    }

    /// Most recently updated sessions, newest first
    pub async fn sessions(&self) -> Result<Vec<SessionEntry>, AppError> {
        let path = self.sessions_path();
        let raw = fs::read_to_string(&path).await.map_err(|e| {
            AppError::NotFound(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let index: Map<String, Value> = serde_json::from_str(&raw).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Invalid session index: {}", e))
        })?;

        let mut sessions: Vec<SessionEntry> = index
            .into_iter()
            .map(|(id, value)| session_entry(id, &value))
            .collect();
        sessions.sort_by(|a, b| b.updated_at.unwrap_or(0).cmp(&a.updated_at.unwrap_or(0)));
        sessions.truncate(MAX_SESSIONS);

        debug!(count = sessions.len(), "Read session index");
        Ok(sessions)
    }

    /// `MEMORY.md` (if present) followed by `memory/*.md`
    pub async fn memory_files(&self) -> Result<Vec<MemoryFile>, AppError> {
        let dir = self.notes_dir();
        let mut files = Vec::new();

        if fs::try_exists(dir.join("MEMORY.md")).await.unwrap_or(false) {
            files.push(MemoryFile {
                name: "MEMORY.md".to_string(),
                path: "MEMORY.md".to_string(),
            });
        }

        let memory_dir = dir.join("memory");
        let mut entries = match fs::read_dir(&memory_dir).await {
            Ok(entries) => entries,
            Err(_) => return Ok(files),
        };

        let mut notes = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            AppError::Internal(anyhow::anyhow!(
                "Failed to read directory entry in {}: {}",
                memory_dir.display(),
                e
            ))
        })? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(".md") {
                notes.push(format!("memory/{}", name));
            }
        }
        notes.sort();

        files.extend(notes.into_iter().map(|path| MemoryFile {
            name: path.clone(),
            path,
        }));
        Ok(files)
    }

    /// Read one memory note
    ///
    /// Only `MEMORY.md` and `memory/<name>.md` (name made of word characters,
    /// dots and dashes) are accepted.
    pub async fn read_memory_file(&self, path: &str) -> Result<MemoryContent, AppError> {
        if !is_memory_path(path) {
            return Err(AppError::InvalidRequest("Invalid path".to_string()));
        }

        let full = self.notes_dir().join(Path::new(path));
        let content = fs::read_to_string(&full)
            .await
            .map_err(|_| AppError::NotFound("File not found".to_string()))?;

        Ok(MemoryContent {
            content,
            path: path.to_string(),
        })
    }
}

fn session_entry(id: String, value: &Value) -> SessionEntry {
    let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
    let updated_at = value
        .get("updatedAt")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)));

    SessionEntry {
        id,
        session_id: text("sessionId"),
        updated_at,
        channel: text("channel")
            .filter(|c| !c.is_empty())
            .or_else(|| text("lastChannel")),
        model: text("model"),
        label: text("label"),
        total_tokens: value.get("totalTokens").and_then(Value::as_u64),
    }
}

/// Whether `path` names a readable memory note
pub fn is_memory_path(path: &str) -> bool {
    if path == "MEMORY.md" {
        return true;
    }
    let Some(stem) = path
        .strip_prefix("memory/")
        .and_then(|rest| rest.strip_suffix(".md"))
    else {
        return false;
    };
    !stem.is_empty()
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_memory_path_validation() {
        assert!(is_memory_path("MEMORY.md"));
        assert!(is_memory_path("memory/2024-01-02.md"));
        assert!(is_memory_path("memory/notes_v1.2.md"));
        assert!(!is_memory_path("memory/.md"));
        assert!(!is_memory_path("memory/../secret.md"));
        assert!(!is_memory_path("memory/a b.md"));
        assert!(!is_memory_path("/etc/passwd"));
        assert!(!is_memory_path("memory/notes.txt"));
        assert!(!is_memory_path("other/notes.md"));
    }

    #[tokio::test]
    async fn test_sessions_sorted_and_projected() {
        let dir = TempDir::new().unwrap();
        let index = json!({
            "old": {"sessionId": "s1", "updatedAt": 100, "lastChannel": "telegram"},
            "new": {"sessionId": "s2", "updatedAt": 300, "channel": "discord", "model": "m", "totalTokens": 42},
            "undated": {"sessionId": "s3"}
        });
        write(
            dir.path(),
            "agents/main/sessions/sessions.json",
            &index.to_string(),
        );

        let sessions = WorkspaceService::new(dir.path()).sessions().await.unwrap();
        let ids: Vec<_> = sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "undated"]);
        assert_eq!(sessions[0].channel.as_deref(), Some("discord"));
        assert_eq!(sessions[0].total_tokens, Some(42));
        assert_eq!(sessions[1].channel.as_deref(), Some("telegram"));
    }

    #[tokio::test]
    async fn test_sessions_truncated() {
        let dir = TempDir::new().unwrap();
        let index: Map<String, Value> = (0..80)
            .map(|i| (format!("s{}", i), json!({"updatedAt": i})))
            .collect();
        write(
            dir.path(),
            "agents/main/sessions/sessions.json",
            &Value::Object(index).to_string(),
        );

        let sessions = WorkspaceService::new(dir.path()).sessions().await.unwrap();
        assert_eq!(sessions.len(), MAX_SESSIONS);
        assert_eq!(sessions[0].updated_at, Some(79));
    }

    #[tokio::test]
    async fn test_missing_session_index() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            WorkspaceService::new(dir.path()).sessions().await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_listing_and_reading() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "workspace/MEMORY.md", "# Memory");
        write(dir.path(), "workspace/memory/b.md", "second");
        write(dir.path(), "workspace/memory/a.md", "first");
        write(dir.path(), "workspace/memory/skip.txt", "nope");

        let service = WorkspaceService::new(dir.path());
        let paths: Vec<_> = service
            .memory_files()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert_eq!(paths, vec!["MEMORY.md", "memory/a.md", "memory/b.md"]);

        let note = service.read_memory_file("memory/a.md").await.unwrap();
        assert_eq!(note.content, "first");

        assert!(matches!(
            service.read_memory_file("memory/missing.md").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.read_memory_file("../agents/x.md").await,
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_listing_without_workspace() {
        let dir = TempDir::new().unwrap();
        let files = WorkspaceService::new(dir.path()).memory_files().await.unwrap();
        assert!(files.is_empty());
    }
}
