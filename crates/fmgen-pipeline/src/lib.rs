//! Sync orchestration layer
//!
//! Coordinates the frontmatter sync of single documents and whole vaults.
//!
//! Infrastructure crates (do not orchestrate):
//! - `fmgen-parser`: splits documents and serializes blocks
//! - `fmgen-expr`: evaluates templates in a sandbox
//! - `fmgen-core`: merges metadata and patches buffers
//!
//! This crate:
//! - Applies the ignore policy before any evaluation
//! - Allows one sync per document at a time
//! - Patches live buffers or overwrites stored documents
//! - Runs bulk syncs and reports a single summary
//! - Wires saves and host events to the sync
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fmgen_pipeline::FrontmatterSync;
//!
//! let sync = FrontmatterSync::new(store, notifier, settings);
//! let report = sync.run_all().await;
//! println!("{report}");
//! ```

pub mod error;
pub mod events;
pub mod flight;
pub mod hooks;
pub mod outcome;
pub mod sync;

pub use error::{SyncError, SyncResult};
pub use events::{DispatchOutcome, EventRouter, HostEvent, IgnoredEvent};
pub use flight::{FlightGuard, FlightState, SingleFlight};
pub use hooks::{FnStep, FrontmatterSaveStep, SaveContext, SavePipeline, SaveReport, SaveStep};
pub use outcome::{BulkReport, PreviewResult, SkipReason, SyncOutcome, SyncPlan, WriteMode};
pub use sync::{sample_document, FrontmatterSync, SyncOptions};
