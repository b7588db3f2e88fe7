//! Mock host implementations for testing
//!
//! In-memory, deterministic stand-ins for the host traits. Each mock keeps
//! its state behind `Arc<Mutex<..>>` so clones observe the same data, and
//! records the calls it receives for later assertions.
//!
//! ```ignore
//! use fmgen_core::test_support::mocks::MockStore;
//! use fmgen_core::{DocumentId, DocumentStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MockStore::new().with_document("a.md", "body");
//! store.write(&DocumentId::new("a.md"), "new body").await?;
//! assert_eq!(store.writes().len(), 1);
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::document::{Document, DocumentId};
use crate::error::StoreError;
use crate::traits::{DocumentStore, Notice, NoticeLevel, Notifier, QueryApi, StoreResult};
use crate::value::Value;

// ============================================================================
// Mock Store
// ============================================================================

#[derive(Debug, Default)]
struct MockStoreState {
    documents: BTreeMap<DocumentId, String>,
    writes: Vec<(DocumentId, String)>,
    reads: usize,
    failing_reads: HashSet<DocumentId>,
    failing_writes: HashSet<DocumentId>,
}

/// In-memory [`DocumentStore`] with error injection.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    state: Arc<Mutex<MockStoreState>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, path: &str, text: &str) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&self, path: &str, text: &str) {
        self.state
            .lock()
            .documents
            .insert(DocumentId::new(path), text.to_string());
    }

    /// Current text of a document.
    pub fn text(&self, path: &str) -> Option<String> {
        self.state.lock().documents.get(&DocumentId::new(path)).cloned()
    }

    /// Every write received, in order.
    pub fn writes(&self) -> Vec<(DocumentId, String)> {
        self.state.lock().writes.clone()
    }

    pub fn read_count(&self) -> usize {
        self.state.lock().reads
    }

    /// Make reads of `path` fail with an I/O error.
    pub fn fail_reads(&self, path: &str) {
        self.state.lock().failing_reads.insert(DocumentId::new(path));
    }

    /// Make writes to `path` fail with an I/O error.
    pub fn fail_writes(&self, path: &str) {
        self.state.lock().failing_writes.insert(DocumentId::new(path));
    }
}

fn injected(id: &DocumentId) -> StoreError {
    StoreError::io(
        id.as_str(),
        std::io::Error::new(std::io::ErrorKind::PermissionDenied, "injected failure"),
    )
}

#[async_trait]
impl DocumentStore for MockStore {
    async fn read(&self, id: &DocumentId) -> StoreResult<String> {
        let mut state = self.state.lock();
        state.reads += 1;
        if state.failing_reads.contains(id) {
            return Err(injected(id));
        }
        state
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn write(&self, id: &DocumentId, text: &str) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.failing_writes.contains(id) {
            return Err(injected(id));
        }
        state.writes.push((id.clone(), text.to_string()));
        state.documents.insert(id.clone(), text.to_string());
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<Document>> {
        Ok(self
            .state
            .lock()
            .documents
            .keys()
            .filter(|id| id.is_markdown())
            .cloned()
            .map(Document::new)
            .collect())
    }
}

// ============================================================================
// Recording Notifier
// ============================================================================

/// [`Notifier`] that keeps every notice.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices.lock().iter().filter(|n| n.level == level).count()
    }

    pub fn clear(&self) {
        self.notices.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

// ============================================================================
// Static Query
// ============================================================================

/// [`QueryApi`] over a fixed page list. Sources match a folder prefix of
/// `file.path`, or a tag in `file.tags` when prefixed with `#`.
#[derive(Debug, Clone, Default)]
pub struct StaticQuery {
    pages: Vec<Value>,
}

impl StaticQuery {
    pub fn new(pages: Vec<Value>) -> Self {
        Self { pages }
    }
}

impl QueryApi for StaticQuery {
    fn pages(&self, source: Option<&str>) -> Vec<Value> {
        let Some(source) = source.map(str::trim).filter(|s| !s.is_empty()) else {
            return self.pages.clone();
        };
        self.pages
            .iter()
            .filter(|page| {
                let file = page.get("file");
                if let Some(tag) = source.strip_prefix('#') {
                    file.get("tags")
                        .as_list()
                        .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(tag)))
                } else {
                    let folder = source.trim_matches('"');
                    file.get("path")
                        .as_str()
                        .is_some_and(|p| DocumentId::new(p).is_within(folder))
                }
            })
            .cloned()
            .collect()
    }

    fn page(&self, path: &str) -> Option<Value> {
        self.pages
            .iter()
            .find(|page| page.get("file").get("path").as_str() == Some(path))
            .cloned()
    }
}
