//! Character-level edit scripts.

use similar::{Algorithm, ChangeTag, TextDiff};

use super::buffer::{LiveBuffer, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Equal,
    Delete,
    Insert,
}

/// A run of consecutive characters sharing one [`EditKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSpan {
    pub kind: EditKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchStats {
    /// Number of `replace_range` calls issued.
    pub edits: usize,
    pub inserted_chars: usize,
    pub deleted_chars: usize,
}

/// Ordered spans that turn one text into another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditScript {
    spans: Vec<EditSpan>,
}

impl EditScript {
    /// Myers diff over Unicode scalar values, coalesced into spans.
    pub fn compute(old: &str, new: &str) -> Self {
        let diff = TextDiff::configure()
            .algorithm(Algorithm::Myers)
            .diff_chars(old, new);

        let mut spans: Vec<EditSpan> = Vec::new();
        for change in diff.iter_all_changes() {
            let kind = match change.tag() {
                ChangeTag::Equal => EditKind::Equal,
                ChangeTag::Delete => EditKind::Delete,
                ChangeTag::Insert => EditKind::Insert,
            };
            match spans.last_mut() {
                Some(last) if last.kind == kind => last.text.push_str(change.value()),
                _ => spans.push(EditSpan {
                    kind,
                    text: change.value().to_string(),
                }),
            }
        }
        Self { spans }
    }

    pub fn spans(&self) -> &[EditSpan] {
        &self.spans
    }

    /// True when the script contains no insertions or deletions.
    pub fn is_identity(&self) -> bool {
        self.spans.iter().all(|s| s.kind == EditKind::Equal)
    }

    /// Apply the script to `buffer`, which must hold the script's old text.
    ///
    /// Positions are tracked over the already-applied prefix of the new
    /// text, so every range is valid in the buffer at the moment it is
    /// issued.
    pub fn replay(&self, buffer: &mut dyn LiveBuffer) -> PatchStats {
        let mut stats = PatchStats::default();
        let mut cursor = Position::default();

        for span in &self.spans {
            match span.kind {
                EditKind::Equal => cursor = cursor.advance(&span.text),
                EditKind::Insert => {
                    buffer.replace_range(&span.text, cursor, cursor);
                    cursor = cursor.advance(&span.text);
                    stats.edits += 1;
                    stats.inserted_chars += span.text.chars().count();
                }
                EditKind::Delete => {
                    let end = cursor.advance(&span.text);
                    buffer.replace_range("", cursor, end);
                    stats.edits += 1;
                    stats.deleted_chars += span.text.chars().count();
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::TextBuffer;
    use proptest::prelude::*;

    #[test]
    fn test_spans_are_coalesced() {
        let script = EditScript::compute("hello world", "hello there world");
        let kinds: Vec<_> = script.spans().iter().map(|s| s.kind).collect();
        assert!(kinds.windows(2).all(|w| w[0] != w[1]));
        assert!(!script.is_identity());
    }

    #[test]
    fn test_multiline_replay() {
        let old = "---\ntags:\n  - a\n---\n\nline one\nline two";
        let new = "---\ntags:\n  - a\n  - b\nx: é\n---\n\nline one\nline two";
        let mut buffer = TextBuffer::new(old);
        EditScript::compute(old, new).replay(&mut buffer);
        assert_eq!(buffer.content(), new);
    }

    proptest! {
        #[test]
        fn prop_replay_reproduces_new_text(old in "[ab\\n é]{0,24}", new in "[ab\\n é]{0,24}") {
            let mut buffer = TextBuffer::new(&old);
            EditScript::compute(&old, &new).replay(&mut buffer);
            prop_assert_eq!(buffer.content(), new);
        }
    }
}
