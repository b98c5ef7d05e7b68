//! Input panel model.
//!
//! The `InputPanel` is a plain data container owned by the host input
//! context. The adapter writes the slots; the host renders them when asked
//! to update its UI.
//!
//! Design philosophy: no callbacks, just data. Whoever holds the context
//! reads and writes the fields through the accessors below.

use crate::candidate::CandidateList;
use crate::text::Text;

/// Slots of the host's input panel.
///
/// - `preedit`: server-side preedit, drawn by the input method framework
/// - `client_preedit`: preedit forwarded to clients that draw it themselves
/// - `aux_up` / `aux_down`: hint lines above and below the candidates
/// - `candidate_list`: the list currently installed, if any
#[derive(Debug, Clone, Default)]
pub struct InputPanel {
    preedit: Text,
    client_preedit: Text,
    aux_up: Text,
    aux_down: Text,
    candidate_list: Option<CandidateList>,
}

impl InputPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preedit(&self) -> &Text {
        &self.preedit
    }

    pub fn set_preedit(&mut self, text: Text) {
        self.preedit = text;
    }

    pub fn client_preedit(&self) -> &Text {
        &self.client_preedit
    }

    pub fn set_client_preedit(&mut self, text: Text) {
        self.client_preedit = text;
    }

    pub fn aux_up(&self) -> &Text {
        &self.aux_up
    }

    pub fn set_aux_up(&mut self, text: Text) {
        self.aux_up = text;
    }

    pub fn aux_down(&self) -> &Text {
        &self.aux_down
    }

    pub fn set_aux_down(&mut self, text: Text) {
        self.aux_down = text;
    }

    pub fn candidate_list(&self) -> Option<&CandidateList> {
        self.candidate_list.as_ref()
    }

    pub fn candidate_list_mut(&mut self) -> Option<&mut CandidateList> {
        self.candidate_list.as_mut()
    }

    /// Install a new list, or detach the current one with `None`.
    /// Lists are replaced wholesale, never edited in place.
    pub fn set_candidate_list(&mut self, list: Option<CandidateList>) {
        self.candidate_list = list;
    }

    /// Clear every slot in one shot.
    pub fn reset(&mut self) {
        self.preedit.clear();
        self.client_preedit.clear();
        self.aux_up.clear();
        self.aux_down.clear();
        self.candidate_list = None;
    }

    /// Check if anything would be drawn.
    pub fn has_visible_state(&self) -> bool {
        !self.preedit.is_empty()
            || !self.client_preedit.is_empty()
            || !self.aux_up.is_empty()
            || !self.aux_down.is_empty()
            || self.candidate_list.as_ref().is_some_and(|l| !l.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidateWord;
    use crate::input_context::InputContextId;

    #[test]
    fn test_new_panel_is_blank() {
        let panel = InputPanel::new();
        assert!(!panel.has_visible_state());
        assert!(panel.candidate_list().is_none());
    }

    #[test]
    fn test_reset_clears_all_slots() {
        let mut panel = InputPanel::new();
        panel.set_preedit(Text::plain("a"));
        panel.set_client_preedit(Text::plain("b"));
        panel.set_aux_up(Text::plain("hint"));
        let mut list = CandidateList::new(InputContextId(7));
        list.append(CandidateWord::new(Text::plain("候補"), 0, ""));
        panel.set_candidate_list(Some(list));
        assert!(panel.has_visible_state());

        panel.reset();

        assert!(!panel.has_visible_state());
        assert!(panel.preedit().is_empty());
        assert!(panel.client_preedit().is_empty());
        assert!(panel.aux_up().is_empty());
        assert!(panel.candidate_list().is_none());
    }

    #[test]
    fn test_empty_list_is_not_visible() {
        let mut panel = InputPanel::new();
        panel.set_candidate_list(Some(CandidateList::new(InputContextId(1))));
        assert!(!panel.has_visible_state());
    }
}
