//! Candidate list presented in the input panel.
//!
//! The engine hands over one page of conversion candidates at a time. This
//! module turns that page into a host-side list with a fixed page size of
//! nine, selection labels `1`..`9`, and entries that remember the engine
//! index they came from so that choosing one can be routed back as the
//! matching digit key.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::addon::KarukanAddon;
use crate::backend::Backend;
use crate::input_context::{InputContext, InputContextId};
use crate::key::Key;
use crate::text::Text;

/// Candidates shown per page; matches the nine digit selection keys.
pub const PAGE_SIZE: usize = 9;

/// Selection key labels bound to the entries of a page.
pub const SELECTION_KEYS: &str = "1 2 3 4 5 6 7 8 9";

/// How the host should lay out the list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateLayoutHint {
    NotSet,
    #[default]
    Vertical,
    Horizontal,
}

/// A single entry of the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateWord {
    text: Text,
    index: usize,
    comment: String,
}

impl CandidateWord {
    pub fn new(text: Text, index: usize, comment: impl Into<String>) -> Self {
        Self {
            text,
            index,
            comment: comment.into(),
        }
    }

    pub fn text(&self) -> &Text {
        &self.text
    }

    /// Position of this entry in the engine's candidate page.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Engine annotation. Not rendered inline; the engine surfaces it
    /// through aux text.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Choose this entry: routes through the addon as a digit key.
    pub fn select<B, C>(&self, addon: &mut KarukanAddon<B>, ic: &mut C)
    where
        B: Backend + 'static,
        C: InputContext,
    {
        addon.select_candidate(ic, self.index);
    }
}

/// A paginated list of candidates with a global cursor.
#[derive(Debug, Clone)]
pub struct CandidateList {
    /// Input context the list was built for
    ic: InputContextId,

    /// All entries, in engine order
    words: Vec<CandidateWord>,

    /// Number of entries per page
    page_size: usize,

    /// Current page index (0-based)
    current_page: usize,

    /// Cursor position within the current page (0-based)
    cursor: usize,

    layout_hint: CandidateLayoutHint,

    selection_keys: Vec<Key>,
}

impl CandidateList {
    /// Create an empty list for `ic`: vertical, nine per page, keys `1`..`9`.
    pub fn new(ic: InputContextId) -> Self {
        Self {
            ic,
            words: Vec::new(),
            page_size: PAGE_SIZE,
            current_page: 0,
            cursor: 0,
            layout_hint: CandidateLayoutHint::Vertical,
            selection_keys: Key::parse_list(SELECTION_KEYS),
        }
    }

    pub fn input_context(&self) -> InputContextId {
        self.ic
    }

    pub fn set_layout_hint(&mut self, hint: CandidateLayoutHint) {
        self.layout_hint = hint;
    }

    pub fn layout_hint(&self) -> CandidateLayoutHint {
        self.layout_hint
    }

    pub fn selection_keys(&self) -> &[Key] {
        &self.selection_keys
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Rebuild the entries from the engine's current candidate page.
    ///
    /// Null candidate texts are skipped; every kept entry keeps the engine
    /// index it was read from.
    pub fn update_candidates<B: Backend + ?Sized>(&mut self, backend: &B) {
        self.clear();

        let count = backend.candidate_count();
        let cursor = backend.candidate_cursor();

        for i in 0..count {
            let Some(text) = backend.candidate(i) else {
                continue;
            };
            let comment = backend.candidate_annotation(i).unwrap_or_default();
            self.append(CandidateWord::new(Text::plain(text), i as usize, comment));
        }

        if count > 0 && cursor < count {
            self.set_global_cursor_index(cursor as usize);
        }
    }

    pub fn append(&mut self, word: CandidateWord) {
        self.words.push(word);
    }

    /// Get all entries.
    pub fn words(&self) -> &[CandidateWord] {
        &self.words
    }

    /// Get the total number of entries.
    pub fn total_size(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Get the total number of pages.
    pub fn num_pages(&self) -> usize {
        self.words.len().div_ceil(self.page_size)
    }

    /// Get the current page index (0-based).
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Get the cursor position within the current page (0-based).
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn current_page_range(&self) -> Range<usize> {
        let start = (self.current_page * self.page_size).min(self.words.len());
        let end = (start + self.page_size).min(self.words.len());
        start..end
    }

    /// Get the entries of the current page.
    pub fn current_page_words(&self) -> &[CandidateWord] {
        &self.words[self.current_page_range()]
    }

    /// Global index of the highlighted entry.
    pub fn global_cursor_index(&self) -> Option<usize> {
        let index = self.current_page * self.page_size + self.cursor;
        (index < self.words.len()).then_some(index)
    }

    /// Move the highlight to a global index, switching page as needed.
    /// Out of range indices are ignored.
    pub fn set_global_cursor_index(&mut self, index: usize) {
        if index < self.words.len() {
            self.current_page = index / self.page_size;
            self.cursor = index % self.page_size;
        }
    }

    /// Get the highlighted entry.
    pub fn selected_word(&self) -> Option<&CandidateWord> {
        self.current_page_words().get(self.cursor)
    }

    /// Entry on the current page bound to a selection key.
    pub fn word_for_key(&self, key: &Key) -> Option<&CandidateWord> {
        let pos = self
            .selection_keys
            .iter()
            .position(|k| k.sym == key.sym && k.states == key.states)?;
        self.current_page_words().get(pos)
    }

    /// Move to the previous page. Returns true if the page changed.
    pub fn page_up(&mut self) -> bool {
        if self.current_page > 0 {
            self.current_page -= 1;
            self.clamp_cursor();
            true
        } else {
            false
        }
    }

    /// Move to the next page. Returns true if the page changed.
    pub fn page_down(&mut self) -> bool {
        let num_pages = self.num_pages();
        if num_pages > 0 && self.current_page < num_pages - 1 {
            self.current_page += 1;
            self.clamp_cursor();
            true
        } else {
            false
        }
    }

    fn clamp_cursor(&mut self) {
        let page_len = self.current_page_words().len();
        if page_len > 0 && self.cursor >= page_len {
            self.cursor = page_len - 1;
        }
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.words.clear();
        self.current_page = 0;
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{KeyStates, Keysym};
    use crate::testing::{CallLog, CandidateFrame, OutputFrame, ScriptedBackend};

    fn backend_with(items: &[(&str, &str)], cursor: u32) -> ScriptedBackend {
        let mut backend = ScriptedBackend::new(CallLog::default());
        backend.push_frame(OutputFrame {
            candidates: Some(CandidateFrame::show(items, cursor)),
            ..OutputFrame::default()
        });
        backend.process_key(Keysym::SPACE.0, 0, false);
        backend
    }

    #[test]
    fn test_new_list_configuration() {
        let list = CandidateList::new(InputContextId(1));
        assert!(list.is_empty());
        assert_eq!(list.page_size(), 9);
        assert_eq!(list.layout_hint(), CandidateLayoutHint::Vertical);
        let labels: Vec<String> = list.selection_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(labels, ["1", "2", "3", "4", "5", "6", "7", "8", "9"]);
    }

    #[test]
    fn test_update_candidates_keeps_engine_index() {
        let backend = backend_with(&[("漢字", ""), ("感じ", "📚"), ("幹事", "")], 1);
        let mut list = CandidateList::new(InputContextId(1));
        list.update_candidates(&backend);

        assert_eq!(list.total_size(), 3);
        assert_eq!(list.words()[1].text().to_plain_string(), "感じ");
        assert_eq!(list.words()[1].index(), 1);
        assert_eq!(list.words()[1].comment(), "📚");
        assert_eq!(list.words()[0].comment(), "");
        assert_eq!(list.global_cursor_index(), Some(1));
    }

    #[test]
    fn test_update_replaces_previous_entries() {
        let mut list = CandidateList::new(InputContextId(1));
        list.update_candidates(&backend_with(&[("a", ""), ("b", ""), ("c", "")], 2));
        list.update_candidates(&backend_with(&[("x", "")], 0));
        assert_eq!(list.total_size(), 1);
        assert_eq!(list.words()[0].text().to_plain_string(), "x");
        assert_eq!(list.global_cursor_index(), Some(0));
    }

    #[test]
    fn test_cursor_out_of_range_is_ignored() {
        let mut list = CandidateList::new(InputContextId(1));
        list.update_candidates(&backend_with(&[("a", ""), ("b", "")], 5));
        assert_eq!(list.global_cursor_index(), Some(0));
    }

    #[test]
    fn test_pagination_past_nine() {
        let mut list = CandidateList::new(InputContextId(1));
        for i in 0..12 {
            list.append(CandidateWord::new(Text::plain(format!("候補{}", i)), i, ""));
        }
        assert_eq!(list.num_pages(), 2);
        assert_eq!(list.current_page_words().len(), 9);

        list.set_global_cursor_index(10);
        assert_eq!(list.current_page(), 1);
        assert_eq!(list.cursor(), 1);
        assert_eq!(list.selected_word().map(|w| w.index()), Some(10));

        assert!(!list.page_down());
        assert!(list.page_up());
        assert_eq!(list.current_page(), 0);
    }

    #[test]
    fn test_word_for_selection_key() {
        let mut list = CandidateList::new(InputContextId(1));
        list.update_candidates(&backend_with(&[("a", ""), ("b", ""), ("c", "")], 0));

        let key = Key::new(Keysym(0x33), KeyStates::NONE);
        assert_eq!(list.word_for_key(&key).map(|w| w.index()), Some(2));

        let key = Key::new(Keysym::KEY_9, KeyStates::NONE);
        assert!(list.word_for_key(&key).is_none());
    }
}
