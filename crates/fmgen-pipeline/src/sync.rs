//! Frontmatter sync orchestrator
//!
//! Drives one document through the sync phases:
//!
//! 1. **Ignore**: skip documents in ignored folders
//! 2. **Split**: separate the metadata block from the body
//! 3. **Ignore**: skip documents that opt out with `yaml-gen-ignore`
//! 4. **Evaluate**: run the template in the sandbox against the document
//! 5. **Merge**: fold the candidate into the existing metadata
//! 6. **Serialize**: render the new block and compare with the old text
//! 7. **Write**: patch the live buffer, or overwrite through the store
//!
//! Every collaborator is injected, so the same orchestrator serves the CLI,
//! the watcher and tests.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use fmgen_config::Settings;
use fmgen_core::{
    patch, plan_merge, should_write, BufferHandle, Document, DocumentId, DocumentStore,
    MergePlan, Notice, Notifier, QueryApi, StoreResult, Value, IGNORE_KEY,
};
use fmgen_expr::{EvaluationContext, Sandbox};
use fmgen_parser::{render_document, serialize_block, split, ParsedDocument};

use crate::error::{SyncError, SyncResult};
use crate::flight::SingleFlight;
use crate::outcome::{BulkReport, PreviewResult, SkipReason, SyncOutcome, SyncPlan, WriteMode};

/// Behaviour switches that do not belong in persisted settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Compute changes but never write them.
    pub dry_run: bool,
}

/// The sync orchestrator.
///
/// ```text
/// FrontmatterSync
///   ├─> fmgen-parser  (split, serialize)
///   ├─> fmgen-expr    (sandboxed template)
///   ├─> fmgen-core    (merge, change detection, patch)
///   └─> DocumentStore / LiveBuffer (write)
/// ```
pub struct FrontmatterSync {
    store: Arc<dyn DocumentStore>,
    notifier: Arc<dyn Notifier>,
    /// Exposed to templates as `dv` when present.
    query: Option<Arc<dyn QueryApi>>,
    /// Swapped whole on update so a running sync keeps a consistent view.
    settings: RwLock<Arc<Settings>>,
    flights: SingleFlight,
    options: SyncOptions,
}

impl FrontmatterSync {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            notifier,
            query: None,
            settings: RwLock::new(Arc::new(settings)),
            flights: SingleFlight::new(),
            options: SyncOptions::default(),
        }
    }

    pub fn with_query(mut self, query: Arc<dyn QueryApi>) -> Self {
        self.query = Some(query);
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn settings(&self) -> Arc<Settings> {
        Arc::clone(&self.settings.read())
    }

    /// Replace the settings. Syncs already running finish with the old ones.
    pub fn update_settings(&self, settings: Settings) {
        *self.settings.write() = Arc::new(settings);
        info!("settings updated");
    }

    pub fn flights(&self) -> &SingleFlight {
        &self.flights
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    // ========================================================================
    // Planning
    // ========================================================================

    /// Decide what a sync of `document` with content `text` would do,
    /// without touching any buffer or file.
    pub fn plan(&self, document: &Document, text: &str) -> SyncResult<SyncPlan> {
        let settings = self.settings();
        let id = &document.id;

        if settings.is_folder_ignored(id) {
            debug!(path = %id, "folder ignored");
            return Ok(SyncPlan::Skip(SkipReason::IgnoredFolder));
        }

        let parsed = split(text)?;
        if parsed.property(IGNORE_KEY).is_truthy() {
            debug!(path = %id, "document opted out");
            return Ok(SyncPlan::Skip(SkipReason::IgnoreKey));
        }

        let ctx = self.context(document, &parsed);
        let candidate = Sandbox::new(settings.limits).evaluate(&settings.template, &ctx)?;
        debug!(path = %id, keys = candidate.len(), "template evaluated");

        let merged = match plan_merge(parsed.metadata.as_ref(), &candidate, &settings.merge_options())
        {
            MergePlan::EmptyCandidate => return Ok(SyncPlan::Skip(SkipReason::EmptyCandidate)),
            MergePlan::AlreadySatisfied => {
                debug!(path = %id, "existing metadata already satisfies template");
                return Ok(SyncPlan::Skip(SkipReason::AlreadySatisfied));
            }
            MergePlan::Merged(merged) => merged,
        };

        let block = serialize_block(&merged)?;
        let new_text = render_document(&block, &parsed.body);
        if !should_write(text, &new_text, parsed.block_text.as_deref(), &block) {
            debug!(path = %id, "serialized text unchanged");
            return Ok(SyncPlan::Skip(SkipReason::Identical));
        }

        Ok(SyncPlan::Write {
            metadata: merged,
            new_text,
        })
    }

    fn context(&self, document: &Document, parsed: &ParsedDocument) -> EvaluationContext {
        let ctx = EvaluationContext::for_document(document, &parsed.tags, parsed.metadata.as_ref());
        match &self.query {
            Some(query) => ctx.with_query(Arc::clone(query)),
            None => ctx,
        }
    }

    // ========================================================================
    // Single document
    // ========================================================================

    /// Sync a document whose current content is `current_text`.
    ///
    /// With a buffer the change is patched into it; otherwise the store is
    /// overwritten. Failures are notified and returned as
    /// [`SyncOutcome::Failed`].
    pub async fn sync(
        &self,
        document: &Document,
        current_text: &str,
        buffer: Option<&BufferHandle>,
    ) -> SyncOutcome {
        let Some(_guard) = self.flights.try_begin(&document.id) else {
            return SyncOutcome::Busy;
        };
        let result = self.apply(document, current_text, buffer).await;
        self.finish(&document.id, result, true)
    }

    /// Sync a document open in a live buffer.
    pub async fn sync_buffer(&self, document: &Document, buffer: &BufferHandle) -> SyncOutcome {
        let text = buffer.lock().content();
        self.sync(document, &text, Some(buffer)).await
    }

    /// Sync a document through the store.
    pub async fn sync_file(&self, document: &Document) -> SyncOutcome {
        self.sync_stored(document, true).await
    }

    async fn sync_stored(&self, document: &Document, notify: bool) -> SyncOutcome {
        let Some(_guard) = self.flights.try_begin(&document.id) else {
            return SyncOutcome::Busy;
        };
        if self.settings().is_folder_ignored(&document.id) {
            return SyncOutcome::Skipped(SkipReason::IgnoredFolder);
        }
        let result = match self.store.read(&document.id).await {
            Ok(text) => self.apply(document, &text, None).await,
            Err(err) => Err(err.into()),
        };
        self.finish(&document.id, result, notify)
    }

    async fn apply(
        &self,
        document: &Document,
        text: &str,
        buffer: Option<&BufferHandle>,
    ) -> SyncResult<SyncOutcome> {
        let id = &document.id;
        let (metadata, new_text) = match self.plan(document, text)? {
            SyncPlan::Skip(reason) => return Ok(SyncOutcome::Skipped(reason)),
            SyncPlan::Write { metadata, new_text } => (metadata, new_text),
        };

        if self.options.dry_run {
            info!(path = %id, keys = metadata.len(), "dry run, not writing");
            return Ok(SyncOutcome::Updated(WriteMode::DryRun));
        }

        match buffer {
            Some(buffer) => {
                // The lock is released before anything awaits.
                let stats = {
                    let mut live = buffer.lock();
                    patch(&mut *live, text, &new_text)?
                };
                info!(path = %id, edits = stats.edits, "patched live buffer");
                Ok(SyncOutcome::Updated(WriteMode::Patched(stats)))
            }
            None => {
                self.store.write(id, &new_text).await?;
                info!(path = %id, keys = metadata.len(), "frontmatter written");
                Ok(SyncOutcome::Updated(WriteMode::Overwritten))
            }
        }
    }

    fn finish(&self, id: &DocumentId, result: SyncResult<SyncOutcome>, notify: bool) -> SyncOutcome {
        match result {
            Ok(outcome) => outcome,
            Err(err) => {
                if let Some(reason) = err.skip_reason() {
                    debug!(path = %id, error = %err, "sync abandoned");
                    return SyncOutcome::Skipped(reason);
                }
                if notify {
                    self.report(id, &err);
                } else {
                    warn!(path = %id, error = %err, "sync failed");
                }
                SyncOutcome::Failed(err)
            }
        }
    }

    fn report(&self, id: &DocumentId, err: &SyncError) {
        let cause = std::error::Error::source(err).map(ToString::to_string);
        error!(path = %id, error = %err, cause = ?cause, "sync failed");
        let message = match err {
            SyncError::Evaluation(_) => {
                format!("Invalid template for {id}, check the logs for details. {err}")
            }
            _ => format!("Could not update {id}: {err}"),
        };
        self.notifier.notify(Notice::error(message));
    }

    // ========================================================================
    // Bulk
    // ========================================================================

    /// Sync every markdown document in the store.
    pub async fn run_all(&self) -> BulkReport {
        let listed = self.store.list().await;
        self.run_many("vault", listed).await
    }

    /// Sync every markdown document inside `folder`, recursively.
    pub async fn run_folder(&self, folder: &str) -> BulkReport {
        let listed = self.store.list_folder(folder).await;
        self.run_many(folder, listed).await
    }

    async fn run_many(&self, scope: &str, listed: StoreResult<Vec<Document>>) -> BulkReport {
        let mut report = BulkReport::default();
        let documents = match listed {
            Ok(documents) => documents,
            Err(err) => {
                error!(scope, error = %err, "failed to list documents");
                self.notifier
                    .notify(Notice::error(format!("Could not list documents in {scope}: {err}")));
                report.record(DocumentId::new(scope), SyncOutcome::Failed(err.into()));
                return report;
            }
        };

        info!(scope, count = documents.len(), "bulk sync started");
        let mut pending: FuturesUnordered<_> = documents
            .iter()
            .map(|document| async move {
                (document.id.clone(), self.sync_stored(document, false).await)
            })
            .collect();
        while let Some((id, outcome)) = pending.next().await {
            report.record(id, outcome);
        }

        info!(
            scope,
            total = report.total,
            updated = report.updated,
            ignored = report.ignored,
            failed = report.failures.len(),
            "bulk sync finished"
        );
        let notice = if report.has_failures() {
            Notice::warning(report.to_string())
        } else {
            Notice::info(report.to_string())
        };
        self.notifier.notify(notice);
        report
    }

    // ========================================================================
    // Preview
    // ========================================================================

    /// Evaluate `template` against a sample document and render the result
    /// as pretty JSON, or the error message.
    pub fn preview(&self, template: &str, document: &Document, text: &str) -> PreviewResult {
        let parsed = match split(text) {
            Ok(parsed) => parsed,
            Err(err) => return PreviewResult::Failed(SyncError::from(err).to_string()),
        };
        let ctx = self.context(document, &parsed);
        match Sandbox::new(self.settings().limits).evaluate(template, &ctx) {
            Ok(metadata) => match serde_json::to_string_pretty(&Value::Map(metadata).to_json()) {
                Ok(json) => PreviewResult::Rendered(json),
                Err(err) => PreviewResult::Failed(err.to_string()),
            },
            Err(err) => {
                debug!(path = %document.id, error = %err, "preview failed");
                PreviewResult::Failed(err.to_string())
            }
        }
    }
}

/// Pick the document a preview should run against: the shallowest document
/// inside a folder, else the first one at the vault root.
pub fn sample_document(documents: &[Document]) -> Option<&Document> {
    documents
        .iter()
        .filter(|d| d.id.parent_path() != "/")
        .min_by_key(|d| d.id.depth())
        .or_else(|| documents.iter().find(|d| d.id.parent_path() == "/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmgen_core::test_support::{MockStore, RecordingNotifier};

    fn sync_with(template: &str) -> FrontmatterSync {
        let settings = Settings {
            template: template.to_string(),
            ..Settings::default()
        };
        FrontmatterSync::new(
            Arc::new(MockStore::new()),
            Arc::new(RecordingNotifier::new()),
            settings,
        )
    }

    #[test]
    fn test_plan_writes_new_block() {
        let sync = sync_with("{ title: file.basename }");
        let plan = sync.plan(&Document::new("Notes/a.md"), "body").unwrap();
        match plan {
            SyncPlan::Write { new_text, .. } => assert_eq!(new_text, "---\ntitle: a\n---\n\nbody"),
            other => panic!("unexpected plan: {other:?}"),
        }
    }

    #[test]
    fn test_plan_skips_opted_out_document() {
        let sync = sync_with("{ title: 'x' }");
        let plan = sync
            .plan(&Document::new("a.md"), "---\nyaml-gen-ignore: true\n---\n\nbody")
            .unwrap();
        assert_eq!(plan, SyncPlan::Skip(SkipReason::IgnoreKey));
    }

    #[test]
    fn test_plan_reports_invalid_frontmatter() {
        let sync = sync_with("{ title: 'x' }");
        let err = sync.plan(&Document::new("a.md"), "---\n- a\n- b\n---\nbody").unwrap_err();
        assert!(matches!(err, SyncError::Parse(_)));
    }

    #[test]
    fn test_sample_document_prefers_shallow_folder() {
        let docs = vec![
            Document::new("root.md"),
            Document::new("a/b/deep.md"),
            Document::new("a/shallow.md"),
        ];
        assert_eq!(sample_document(&docs).unwrap().id.as_str(), "a/shallow.md");
        assert_eq!(sample_document(&docs[..1]).unwrap().id.as_str(), "root.md");
        assert!(sample_document(&[]).is_none());
    }
}
