//! Routes host events to the sync orchestrator.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use fmgen_core::{BufferHandle, Document, DocumentId};

use crate::hooks::{SaveContext, SavePipeline, SaveReport};
use crate::outcome::{BulkReport, SyncOutcome};
use crate::sync::FrontmatterSync;

/// Something the host reports or the user asks for.
pub enum HostEvent {
    /// A document changed on disk.
    Modified { document: Document },
    /// The content of an open editor changed.
    EditorChanged {
        document: Document,
        buffer: BufferHandle,
    },
    /// The user saved a document.
    SaveRequested {
        document: Document,
        buffer: Option<BufferHandle>,
    },
    /// Explicit "run file" command.
    RunFile {
        document: Document,
        buffer: Option<BufferHandle>,
    },
    RunAll,
    RunFolder { folder: String },
}

/// Why an event did not trigger a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredEvent {
    NotMarkdown,
    /// `runOnModify` is off.
    RunOnModifyDisabled,
    /// The document is open in an editor; the editor path handles it.
    OpenInEditor,
}

#[derive(Debug)]
pub enum DispatchOutcome {
    Synced(SyncOutcome),
    Saved(SaveReport),
    Bulk(BulkReport),
    Ignored(IgnoredEvent),
}

/// Dispatches [`HostEvent`]s and tracks which documents are open in live
/// buffers.
pub struct EventRouter {
    sync: Arc<FrontmatterSync>,
    save: SavePipeline,
    open: RwLock<HashMap<DocumentId, BufferHandle>>,
}

impl EventRouter {
    pub fn new(sync: Arc<FrontmatterSync>, save: SavePipeline) -> Self {
        Self {
            sync,
            save,
            open: RwLock::new(HashMap::new()),
        }
    }

    pub fn sync(&self) -> &Arc<FrontmatterSync> {
        &self.sync
    }

    /// Register a document as open in `buffer`.
    pub fn open(&self, id: DocumentId, buffer: BufferHandle) {
        trace!(path = %id, "buffer opened");
        self.open.write().insert(id, buffer);
    }

    pub fn close(&self, id: &DocumentId) {
        trace!(path = %id, "buffer closed");
        self.open.write().remove(id);
    }

    pub fn buffer(&self, id: &DocumentId) -> Option<BufferHandle> {
        self.open.read().get(id).cloned()
    }

    pub async fn dispatch(&self, event: HostEvent) -> DispatchOutcome {
        match event {
            HostEvent::Modified { document } => {
                if let Some(ignored) = self.modify_filter(&document) {
                    return DispatchOutcome::Ignored(ignored);
                }
                if self.open.read().contains_key(&document.id) {
                    debug!(path = %document.id, "modified document is open, leaving it to the editor");
                    return DispatchOutcome::Ignored(IgnoredEvent::OpenInEditor);
                }
                DispatchOutcome::Synced(self.sync.sync_file(&document).await)
            }
            HostEvent::EditorChanged { document, buffer } => {
                if let Some(ignored) = self.modify_filter(&document) {
                    return DispatchOutcome::Ignored(ignored);
                }
                DispatchOutcome::Synced(self.sync.sync_buffer(&document, &buffer).await)
            }
            HostEvent::SaveRequested { document, buffer } => {
                let buffer = buffer.or_else(|| self.buffer(&document.id));
                let mut ctx = SaveContext::new(document);
                ctx.buffer = buffer;
                DispatchOutcome::Saved(self.save.run(&ctx).await)
            }
            HostEvent::RunFile { document, buffer } => {
                if !document.id.is_markdown() {
                    return DispatchOutcome::Ignored(IgnoredEvent::NotMarkdown);
                }
                let outcome = match buffer.or_else(|| self.buffer(&document.id)) {
                    Some(buffer) => self.sync.sync_buffer(&document, &buffer).await,
                    None => self.sync.sync_file(&document).await,
                };
                DispatchOutcome::Synced(outcome)
            }
            HostEvent::RunAll => DispatchOutcome::Bulk(self.sync.run_all().await),
            HostEvent::RunFolder { folder } => {
                DispatchOutcome::Bulk(self.sync.run_folder(&folder).await)
            }
        }
    }

    fn modify_filter(&self, document: &Document) -> Option<IgnoredEvent> {
        if !document.id.is_markdown() {
            return Some(IgnoredEvent::NotMarkdown);
        }
        if !self.sync.settings().run_on_modify {
            return Some(IgnoredEvent::RunOnModifyDisabled);
        }
        None
    }
}
