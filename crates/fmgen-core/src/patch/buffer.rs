//! Live buffer seam
//!
//! A live buffer is text currently open in an editor. It is the only
//! mutable resource shared between the host and the synchroniser, and it
//! is only ever mutated through [`LiveBuffer::replace_range`].

use std::sync::Arc;

use parking_lot::Mutex;

/// Zero-based line and column. Columns count Unicode scalar values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Position just past the end of `text`.
    pub fn end_of(text: &str) -> Self {
        Self::default().advance(text)
    }

    /// Position reached by typing `text` starting here.
    pub fn advance(self, text: &str) -> Self {
        let mut pos = self;
        for ch in text.chars() {
            if ch == '\n' {
                pos.line += 1;
                pos.column = 0;
            } else {
                pos.column += 1;
            }
        }
        pos
    }
}

pub trait LiveBuffer: Send {
    fn content(&self) -> String;

    /// Replace the text between `from` and `to` with `text`.
    fn replace_range(&mut self, text: &str, from: Position, to: Position);
}

/// Shared handle to a buffer owned by the host.
pub type BufferHandle = Arc<Mutex<dyn LiveBuffer>>;

/// In-memory [`LiveBuffer`] with a cursor that follows edits.
#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    text: String,
    cursor: Position,
    edits: usize,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cursor: Position::default(),
            edits: 0,
        }
    }

    /// Wrap into a [`BufferHandle`].
    pub fn into_handle(self) -> BufferHandle {
        Arc::new(Mutex::new(self))
    }

    pub fn cursor(&self) -> Position {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: Position) {
        self.cursor = cursor;
    }

    /// Number of `replace_range` calls received.
    pub fn edit_count(&self) -> usize {
        self.edits
    }

    /// Overwrite everything, as a user edit would.
    pub fn set_content(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Absolute character offset of `pos`, clamped to the text.
    fn char_offset(&self, pos: Position) -> usize {
        let mut offset = 0;
        for (line_no, line) in self.text.split('\n').enumerate() {
            let len = line.chars().count();
            if line_no == pos.line {
                return offset + pos.column.min(len);
            }
            offset += len + 1;
        }
        self.text.chars().count()
    }

    fn byte_index(&self, char_offset: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_offset)
            .map(|(idx, _)| idx)
            .unwrap_or(self.text.len())
    }

    fn position_at(&self, char_offset: usize) -> Position {
        let prefix: String = self.text.chars().take(char_offset).collect();
        Position::end_of(&prefix)
    }
}

impl LiveBuffer for TextBuffer {
    fn content(&self) -> String {
        self.text.clone()
    }

    fn replace_range(&mut self, text: &str, from: Position, to: Position) {
        let start = self.char_offset(from);
        let end = self.char_offset(to).max(start);
        let cursor = self.char_offset(self.cursor);

        let (start_byte, end_byte) = (self.byte_index(start), self.byte_index(end));
        self.text.replace_range(start_byte..end_byte, text);
        self.edits += 1;

        let inserted = text.chars().count();
        let new_cursor = if cursor >= end {
            cursor - (end - start) + inserted
        } else if cursor > start {
            start + inserted
        } else {
            cursor
        };
        self.cursor = self.position_at(new_cursor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_advance_counts_chars() {
        assert_eq!(Position::end_of("ab\ncé"), Position::new(1, 2));
        assert_eq!(Position::end_of(""), Position::new(0, 0));
        assert_eq!(Position::new(2, 1).advance("xy"), Position::new(2, 3));
    }

    #[test]
    fn test_replace_range_multiline() {
        let mut buffer = TextBuffer::new("one\ntwo\nthree");
        buffer.replace_range("2", Position::new(1, 0), Position::new(1, 3));
        assert_eq!(buffer.content(), "one\n2\nthree");
    }

    #[test]
    fn test_cursor_shifts_after_insert_before_it() {
        let mut buffer = TextBuffer::new("abc\ndef");
        buffer.set_cursor(Position::new(1, 1));
        buffer.replace_range("xx\n", Position::new(0, 0), Position::new(0, 0));
        assert_eq!(buffer.cursor(), Position::new(2, 1));
    }

    #[test]
    fn test_cursor_before_edit_is_stable() {
        let mut buffer = TextBuffer::new("abc\ndef");
        buffer.set_cursor(Position::new(0, 1));
        buffer.replace_range("ZZZ", Position::new(1, 0), Position::new(1, 3));
        assert_eq!(buffer.cursor(), Position::new(0, 1));
        assert_eq!(buffer.content(), "abc\nZZZ");
    }
}
