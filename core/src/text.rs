//! Formatted text shown in the input panel (preedit, aux lines, candidates).

/// Formatting applied to a text segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TextFormatFlags(pub u32);

impl TextFormatFlags {
    pub const NONE: TextFormatFlags = TextFormatFlags(0);
    pub const UNDERLINE: TextFormatFlags = TextFormatFlags(1 << 3);
    pub const HIGHLIGHT: TextFormatFlags = TextFormatFlags(1 << 4);
    pub const BOLD: TextFormatFlags = TextFormatFlags(1 << 6);

    pub fn contains(self, flag: TextFormatFlags) -> bool {
        self.0 & flag.0 == flag.0
    }
}

/// Text made of formatted segments plus an optional caret.
///
/// The caret is a byte offset into the concatenated segments, matching what
/// the conversion engine reports for preedit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Text {
    segments: Vec<(String, TextFormatFlags)>,
    cursor: Option<usize>,
}

impl Text {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single unformatted segment.
    pub fn plain<S: Into<String>>(s: S) -> Self {
        let mut text = Self::new();
        text.append(s, TextFormatFlags::NONE);
        text
    }

    pub fn append<S: Into<String>>(&mut self, s: S, format: TextFormatFlags) {
        self.segments.push((s.into(), format));
    }

    /// Set the caret byte offset. Offsets past the end are clamped.
    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = Some(cursor.min(self.len()));
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn segments(&self) -> &[(String, TextFormatFlags)] {
        &self.segments
    }

    /// Total length in bytes.
    pub fn len(&self) -> usize {
        self.segments.iter().map(|(s, _)| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|(s, _)| s.is_empty())
    }

    pub fn to_plain_string(&self) -> String {
        self.segments.iter().map(|(s, _)| s.as_str()).collect()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.cursor = None;
    }
}
