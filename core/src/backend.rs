//! Seam to the conversion engine.
//!
//! The engine is an opaque handle behind a C ABI. `Backend` mirrors that
//! surface call for call, except that every string accessor hands back an
//! owned copy: the engine invalidates its buffers on the next `process_key`,
//! so implementations copy at the accessor boundary and callers never hold a
//! borrowed engine pointer.
//!
//! Releasing the handle is `Drop`. An adapter owns its backend by value, so
//! the handle is released exactly once, when the adapter goes away.

/// Output-flag driven view of a conversion engine instance.
///
/// Query methods (`has_*`, getters) reflect the result of the most recent
/// `process_key` or `commit`. A `None` string means the engine returned a
/// null pointer for that slot.
pub trait Backend {
    /// Prepare the conversion model. May block for seconds; call once.
    fn init(&mut self) -> anyhow::Result<()>;

    /// Feed a key. `mask` uses the engine's modifier bits (see
    /// [`crate::key::mask`]). Returns true when the key was consumed.
    fn process_key(&mut self, keysym: u32, mask: u32, is_release: bool) -> bool;

    /// Discard any composition state.
    fn reset(&mut self);

    /// Provide editor context, or clear it with `("", 0)`.
    /// `cursor` is a byte offset into `text`.
    fn set_surrounding_text(&mut self, text: &str, cursor: u32);

    /// True while no composition is pending.
    fn is_empty(&self) -> bool;

    /// Force-finalize pending input. True when something was committed;
    /// the text is then available through `commit_text`.
    fn commit(&mut self) -> bool;

    /// Persist the learning cache if it has unsaved changes.
    fn save_learning(&mut self);

    fn has_preedit(&self) -> bool;
    fn preedit(&self) -> Option<String>;
    fn preedit_len(&self) -> u32;
    /// Caret byte offset within the preedit.
    fn preedit_caret(&self) -> u32;

    fn has_commit(&self) -> bool;
    fn commit_text(&self) -> Option<String>;
    fn commit_len(&self) -> u32;

    fn has_aux(&self) -> bool;
    fn aux(&self) -> Option<String>;
    fn aux_len(&self) -> u32;

    fn has_candidates(&self) -> bool;
    fn should_hide_candidates(&self) -> bool;
    fn candidate_count(&self) -> u32;
    /// `None` when `index >= candidate_count()`.
    fn candidate(&self, index: u32) -> Option<String>;
    /// `None` when out of range, empty when the candidate has no annotation.
    fn candidate_annotation(&self, index: u32) -> Option<String>;
    fn candidate_cursor(&self) -> u32;

    /// Inference time of the last conversion, in milliseconds.
    fn last_conversion_ms(&self) -> u64 {
        0
    }

    /// End-to-end time of the last `process_key`, in milliseconds.
    fn last_process_key_ms(&self) -> u64 {
        0
    }
}

/// Produces a fresh backend for a new input context. `None` models an
/// allocation failure (`new()` returning null).
pub type BackendFactory<B> = Box<dyn Fn() -> Option<B>>;
