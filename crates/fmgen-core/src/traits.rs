//! Host abstractions
//!
//! The synchroniser never talks to a filesystem, editor or UI directly.
//! Hosts provide these traits and the pipeline receives them as
//! `Arc<dyn Trait>`.

use std::fmt;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::document::{Document, DocumentId};
use crate::error::StoreError;
use crate::value::Value;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent document storage.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Full text of a document, with line endings normalised to `\n`.
    async fn read(&self, id: &DocumentId) -> StoreResult<String>;

    /// Replace the full text of a document.
    async fn write(&self, id: &DocumentId, text: &str) -> StoreResult<()>;

    /// All markdown documents.
    async fn list(&self) -> StoreResult<Vec<Document>>;

    /// Markdown documents inside `folder`, recursively.
    async fn list_folder(&self, folder: &str) -> StoreResult<Vec<Document>> {
        let docs = self.list().await?;
        Ok(docs.into_iter().filter(|d| d.id.is_within(folder)).collect())
    }
}

/// Read-only query API exposed to templates as `dv`.
pub trait QueryApi: Send + Sync {
    /// Pages matching `source` (`"folder"`, `#tag`), or every page.
    fn pages(&self, source: Option<&str>) -> Vec<Value>;

    /// A single page by path.
    fn page(&self, path: &str) -> Option<Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frontmatter Generator: {}", self.message)
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!("{notice}"),
            NoticeLevel::Warning => warn!("{notice}"),
            NoticeLevel::Error => error!("{notice}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_display_is_prefixed() {
        assert_eq!(
            Notice::error("boom").to_string(),
            "Frontmatter Generator: boom"
        );
    }
}
