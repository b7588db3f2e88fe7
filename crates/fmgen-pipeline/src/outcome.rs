//! Results of sync runs.

use std::fmt;

use fmgen_core::{DocumentId, Metadata, PatchStats};

use crate::error::SyncError;

/// Why a sync stopped without writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The parent folder is in the ignore list.
    IgnoredFolder,
    /// The document opts out with `yaml-gen-ignore`.
    IgnoreKey,
    /// The template produced `{}`.
    EmptyCandidate,
    /// Existing metadata already contains the template result.
    AlreadySatisfied,
    /// Re-serialising produced the same text.
    Identical,
    /// The live buffer changed while the sync was running.
    BufferChanged,
}

impl SkipReason {
    pub fn is_ignore(self) -> bool {
        matches!(self, Self::IgnoredFolder | Self::IgnoreKey)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::IgnoredFolder => "folder is ignored",
            Self::IgnoreKey => "document sets yaml-gen-ignore",
            Self::EmptyCandidate => "template generated nothing",
            Self::AlreadySatisfied => "frontmatter is up to date",
            Self::Identical => "no textual change",
            Self::BufferChanged => "buffer changed during sync",
        };
        f.write_str(text)
    }
}

/// How a change was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMode {
    /// Minimal edits applied to a live buffer.
    Patched(PatchStats),
    /// Whole content replaced through the document store.
    Overwritten,
    /// Dry run: the new text was computed but not written.
    DryRun,
}

/// What the pipeline decided for one document before writing.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncPlan {
    Skip(SkipReason),
    Write {
        /// Merged metadata that produced `new_text`.
        metadata: Metadata,
        new_text: String,
    },
}

/// Result of one document sync. Never an error across the pipeline
/// boundary: failures are carried as [`SyncOutcome::Failed`].
#[derive(Debug)]
pub enum SyncOutcome {
    Updated(WriteMode),
    Skipped(SkipReason),
    /// Another sync of the same document was in flight.
    Busy,
    Failed(SyncError),
}

impl SyncOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Aggregate result of a bulk run.
#[derive(Debug, Default)]
pub struct BulkReport {
    pub total: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub ignored: usize,
    pub busy: usize,
    pub failures: Vec<(DocumentId, SyncError)>,
}

impl BulkReport {
    pub(crate) fn record(&mut self, id: DocumentId, outcome: SyncOutcome) {
        self.total += 1;
        match outcome {
            SyncOutcome::Updated(_) => self.updated += 1,
            SyncOutcome::Skipped(reason) if reason.is_ignore() => self.ignored += 1,
            SyncOutcome::Skipped(_) => self.unchanged += 1,
            SyncOutcome::Busy => self.busy += 1,
            SyncOutcome::Failed(err) => self.failures.push((id, err)),
        }
    }

    /// Documents that were not ignored.
    pub fn processed(&self) -> usize {
        self.total - self.ignored
    }

    pub fn succeeded(&self) -> usize {
        self.processed() - self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

impl fmt::Display for BulkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} out of {} files are successfully processed ({} updated). Errors: {}",
            self.succeeded(),
            self.processed(),
            self.updated,
            self.failures.len()
        )
    }
}

/// Rendered template preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewResult {
    /// Pretty JSON of the generated object.
    Rendered(String),
    /// Error message of the failed evaluation.
    Failed(String),
}

impl PreviewResult {
    pub fn text(&self) -> &str {
        match self {
            Self::Rendered(text) | Self::Failed(text) => text,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Rendered(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmgen_core::StoreError;

    #[test]
    fn test_report_counts() {
        let mut report = BulkReport::default();
        report.record(DocumentId::new("a.md"), SyncOutcome::Updated(WriteMode::Overwritten));
        report.record(DocumentId::new("b.md"), SyncOutcome::Skipped(SkipReason::AlreadySatisfied));
        report.record(DocumentId::new("c.md"), SyncOutcome::Skipped(SkipReason::IgnoreKey));
        report.record(
            DocumentId::new("d.md"),
            SyncOutcome::Failed(StoreError::Other("disk full".into()).into()),
        );

        assert_eq!(report.total, 4);
        assert_eq!(report.processed(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(
            report.to_string(),
            "2 out of 3 files are successfully processed (1 updated). Errors: 1"
        );
    }
}
