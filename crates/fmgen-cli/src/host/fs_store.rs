//! Filesystem-backed document store.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, trace};
use walkdir::WalkDir;

use fmgen_core::{Document, DocumentId, DocumentStat, DocumentStore, StoreError, StoreResult};
use fmgen_parser::normalize_line_endings;

/// A vault directory on disk. Documents are the `.md` files below the root;
/// hidden directories are skipped.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open the vault at `root`, resolving it to an absolute path.
    pub async fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref();
        let root = tokio::fs::canonicalize(root)
            .await
            .map_err(|e| StoreError::io(root.display().to_string(), e))?;
        if !tokio::fs::metadata(&root)
            .await
            .map_err(|e| StoreError::io(root.display().to_string(), e))?
            .is_dir()
        {
            return Err(StoreError::Other(format!(
                "vault root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, id: &DocumentId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Vault-relative id of a filesystem path, or `None` when the path is
    /// outside the vault or inside a hidden directory.
    pub fn id_of(&self, path: &Path) -> Option<DocumentId> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    let part = part.to_str()?;
                    if part.starts_with('.') {
                        return None;
                    }
                    parts.push(part);
                }
                Component::CurDir => {}
                _ => return None,
            }
        }
        if parts.is_empty() {
            return None;
        }
        Some(DocumentId::new(parts.join("/")))
    }

    /// The document at `path` (absolute, or relative to the working
    /// directory), with its stat.
    pub async fn document_at(&self, path: &Path) -> StoreResult<Document> {
        let absolute = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| StoreError::io(path.display().to_string(), e))?;
        let id = self.id_of(&absolute).ok_or_else(|| {
            StoreError::Other(format!(
                "{} is not inside the vault {}",
                path.display(),
                self.root.display()
            ))
        })?;
        let metadata = tokio::fs::metadata(&absolute)
            .await
            .map_err(|e| StoreError::io(id.as_str(), e))?;
        Ok(Document::new(id).with_stat(stat_of(&metadata)))
    }

    fn scan(root: &Path) -> StoreResult<Vec<Document>> {
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

        let mut documents = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| StoreError::Other(format!("failed to scan vault: {e}")))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let id = DocumentId::new(relative.to_string_lossy());
            if !id.is_markdown() {
                continue;
            }
            let document = match entry.metadata() {
                Ok(metadata) => Document::new(id).with_stat(stat_of(&metadata)),
                Err(e) => {
                    trace!(path = %id, error = %e, "no stat available");
                    Document::new(id)
                }
            };
            documents.push(document);
        }
        Ok(documents)
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

fn stat_of(metadata: &std::fs::Metadata) -> DocumentStat {
    let modified: DateTime<Utc> = metadata
        .modified()
        .map(DateTime::from)
        .unwrap_or_else(|_| Utc::now());
    let created = metadata.created().map(DateTime::from).unwrap_or(modified);
    DocumentStat {
        created,
        modified,
        size: metadata.len(),
    }
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn read(&self, id: &DocumentId) -> StoreResult<String> {
        let text = tokio::fs::read_to_string(self.path_of(id))
            .await
            .map_err(|e| StoreError::io(id.as_str(), e))?;
        Ok(normalize_line_endings(&text))
    }

    async fn write(&self, id: &DocumentId, text: &str) -> StoreResult<()> {
        tokio::fs::write(self.path_of(id), text)
            .await
            .map_err(|e| StoreError::io(id.as_str(), e))?;
        debug!(path = %id, bytes = text.len(), "document written");
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<Document>> {
        let root = self.root.clone();
        let documents = tokio::task::spawn_blocking(move || Self::scan(&root))
            .await
            .map_err(|e| StoreError::Other(format!("vault scan panicked: {e}")))??;
        debug!(count = documents.len(), "vault scanned");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn vault() -> (TempDir, FsStore) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("Notes/sub")).unwrap();
        std::fs::create_dir_all(root.join(".obsidian")).unwrap();
        std::fs::write(root.join("root.md"), "root").unwrap();
        std::fs::write(root.join("Notes/a.md"), "a\r\nb").unwrap();
        std::fs::write(root.join("Notes/sub/b.md"), "b").unwrap();
        std::fs::write(root.join("Notes/image.png"), "png").unwrap();
        std::fs::write(root.join(".obsidian/hidden.md"), "hidden").unwrap();
        let store = FsStore::open(root).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_list_skips_hidden_and_non_markdown() {
        let (_dir, store) = vault().await;
        let ids: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id.to_string())
            .collect();
        assert_eq!(ids, vec!["Notes/a.md", "Notes/sub/b.md", "root.md"]);
    }

    #[tokio::test]
    async fn test_read_strips_carriage_returns() {
        let (_dir, store) = vault().await;
        assert_eq!(store.read(&DocumentId::new("Notes/a.md")).await.unwrap(), "a\nb");
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let (_dir, store) = vault().await;
        let err = store.read(&DocumentId::new("nope.md")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_id_of_paths() {
        let (_dir, store) = vault().await;
        let root = store.root().to_path_buf();
        assert_eq!(store.id_of(&root.join("Notes/a.md")), Some(DocumentId::new("Notes/a.md")));
        assert_eq!(store.id_of(&root.join(".obsidian/hidden.md")), None);
        assert_eq!(store.id_of(Path::new("/elsewhere/a.md")), None);
    }

    #[tokio::test]
    async fn test_document_at_has_stat() {
        let (_dir, store) = vault().await;
        let doc = store
            .document_at(&store.root().join("Notes/sub/b.md"))
            .await
            .unwrap();
        assert_eq!(doc.id.as_str(), "Notes/sub/b.md");
        assert_eq!(doc.stat.unwrap().size, 1);
    }
}
