//! Minimal in-place text patching
//!
//! A rewrite of a document is turned into a character-level edit script
//! and replayed against a [`LiveBuffer`] as a sequence of range
//! replacements, so cursor position and editor history around untouched
//! text survive.
//!
//! ## Architecture
//!
//! - [`detect`] decides whether a rewrite is needed at all
//! - [`diff`] computes an [`EditScript`] (pure, no buffer access)
//! - [`buffer`] defines the live buffer seam and an in-memory implementation
//! - [`patch`] ties them together with a stale-buffer check

pub mod buffer;
pub mod detect;
pub mod diff;

pub use buffer::{BufferHandle, LiveBuffer, Position, TextBuffer};
pub use detect::should_write;
pub use diff::{EditKind, EditScript, EditSpan, PatchStats};

use tracing::debug;

use crate::error::PatchError;

/// Replace `old` with `new` inside `buffer` using minimal edits.
///
/// Fails with [`PatchError::StaleBuffer`] when the buffer no longer holds
/// `old`; nothing is written in that case.
pub fn patch(buffer: &mut dyn LiveBuffer, old: &str, new: &str) -> Result<PatchStats, PatchError> {
    if buffer.content() != old {
        return Err(PatchError::StaleBuffer);
    }
    let script = EditScript::compute(old, new);
    let stats = script.replay(buffer);
    debug!(
        edits = stats.edits,
        inserted = stats.inserted_chars,
        deleted = stats.deleted_chars,
        "patched live buffer"
    );
    Ok(stats)
}
