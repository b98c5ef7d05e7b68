//! Surrounding text snapshot exposed by the editor.
//!
//! Hosts track the caret in characters; the conversion engine wants a UTF-8
//! byte offset, so the snapshot can express its caret both ways.

/// Editor text around the caret, as last reported by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurroundingText {
    text: String,
    cursor: usize, // Character offset, not byte offset
    anchor: usize,
    valid: bool,
}

impl SurroundingText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot. Cursor and anchor are character offsets and
    /// are clamped to the text length.
    pub fn set_text<S: Into<String>>(&mut self, text: S, cursor: usize, anchor: usize) {
        self.text = text.into();
        let chars = self.text.chars().count();
        self.cursor = cursor.min(chars);
        self.anchor = anchor.min(chars);
        self.valid = true;
    }

    /// Drop the snapshot so nothing stale survives into the next session.
    pub fn invalidate(&mut self) {
        self.text.clear();
        self.cursor = 0;
        self.anchor = 0;
        self.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Caret position in characters.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn anchor(&self) -> usize {
        self.anchor
    }

    /// Caret position as a UTF-8 byte offset into `text()`.
    pub fn cursor_byte_offset(&self) -> usize {
        char_to_byte(&self.text, self.cursor)
    }

    /// Text between cursor and anchor, empty when there is no selection.
    pub fn selected_text(&self) -> &str {
        let (start, end) = if self.cursor <= self.anchor {
            (self.cursor, self.anchor)
        } else {
            (self.anchor, self.cursor)
        };
        &self.text[char_to_byte(&self.text, start)..char_to_byte(&self.text, end)]
    }
}

fn char_to_byte(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
