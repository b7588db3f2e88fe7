//! Core of the frontmatter generator.
//!
//! Holds the pieces every other crate shares: the [`Value`] model, document
//! identity, the merge engine, the text patcher and the host traits.

pub mod document;
pub mod error;
pub mod merge;
pub mod patch;
pub mod traits;
pub mod value;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use document::{Document, DocumentId, DocumentStat};
pub use error::{PatchError, StoreError};
pub use merge::{deep_include, merge, plan_merge, MergeOptions, MergePlan};
pub use patch::{
    patch, should_write, BufferHandle, EditKind, EditScript, EditSpan, LiveBuffer, PatchStats,
    Position, TextBuffer,
};
pub use traits::{
    DocumentStore, Notice, NoticeLevel, Notifier, QueryApi, StoreResult, TracingNotifier,
};
pub use value::{metadata_to_yaml, Metadata, Value};

/// Metadata key that opts a document out of generation when truthy.
pub const IGNORE_KEY: &str = "yaml-gen-ignore";
