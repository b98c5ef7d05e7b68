//! Per-input-context adapter.
//!
//! `KarukanState` owns one engine handle per input context and is the only
//! place where host events meet the engine. A key event runs through a fixed
//! pipeline:
//!
//! 1. bail out if the engine could not be allocated
//! 2. on the very first key, initialize the engine (showing a loading hint)
//! 3. in the Empty state, refresh the engine's surrounding-text context
//! 4. translate modifiers and dispatch the key
//! 5. reconcile the engine's output flags into the input panel
//!
//! Reconciliation (`update_ui`) always runs in the order commit, preedit,
//! aux, candidates, flush. A commit resets the panel before the new preedit
//! is written, so the client sees the committed text first and the new
//! composition after it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::candidate::CandidateList;
use crate::config::AddonConfig;
use crate::input_context::{CapabilityFlags, InputContext, InputContextId, UserInterfaceComponent};
use crate::key::{backend_modifier_mask, KeyEvent};
use crate::text::{Text, TextFormatFlags};

/// Adapter state for one input context.
pub struct KarukanState<B: Backend> {
    ic: InputContextId,

    /// Engine handle; `None` when allocation failed. Never changes after
    /// construction and is released when the state is dropped.
    backend: Option<B>,

    /// Latched true by the first key event, whether init succeeded or not
    initialized: bool,

    unavailable_reported: bool,

    config: Arc<AddonConfig>,
}

impl<B: Backend> KarukanState<B> {
    pub fn new(ic: InputContextId, backend: Option<B>, config: Arc<AddonConfig>) -> Self {
        if backend.is_none() {
            warn!(ic = ic.0, "conversion engine allocation failed, keys will pass through");
        }
        Self {
            ic,
            backend,
            initialized: false,
            unavailable_reported: false,
            config,
        }
    }

    pub fn input_context(&self) -> InputContextId {
        self.ic
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> Option<&mut B> {
        self.backend.as_mut()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Handle a key press or release.
    pub fn key_event<C: InputContext>(&mut self, ic: &mut C, event: &mut KeyEvent) {
        if self.backend.is_none() {
            self.report_unavailable(ic);
            return;
        }

        if !self.initialized {
            self.initialize(ic);
        }

        let Some(backend) = self.backend.as_mut() else {
            return;
        };

        let key = event.key();
        let is_release = event.is_release();

        // Only refresh context while idle; mid-composition the engine's
        // context must not change under it.
        if !is_release && backend.is_empty() {
            forward_surrounding_text(backend, ic, self.config.capture_surrounding_text);
        }

        let mask = backend_modifier_mask(key.states);
        let consumed = backend.process_key(key.sym.0, mask, is_release);
        debug!(
            ic = self.ic.0,
            keysym = key.sym.0,
            mask,
            is_release,
            consumed,
            conversion_ms = backend.last_conversion_ms(),
            process_key_ms = backend.last_process_key_ms(),
            "key dispatched"
        );

        if consumed {
            event.filter_and_accept();
        }

        // Unconsumed keys (a bare Shift toggling mode, say) can still change
        // engine output; the has_* flags keep this from redrawing needlessly.
        self.update_ui(ic);
    }

    /// Run the engine's blocking init once, bracketed by aux hints.
    fn initialize<C: InputContext>(&mut self, ic: &mut C) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };

        ic.input_panel_mut()
            .set_aux_up(Text::plain(&self.config.loading_message));
        flush_ui(ic);

        let result = backend.init();
        self.initialized = true;

        match result {
            Ok(()) => {
                info!(ic = self.ic.0, "conversion engine initialized");
                ic.input_panel_mut().set_aux_up(Text::new());
            }
            Err(err) => {
                warn!(ic = self.ic.0, error = %err, "conversion engine init failed");
                ic.input_panel_mut()
                    .set_aux_up(Text::plain(&self.config.load_failed_message));
            }
        }
        flush_ui(ic);
    }

    fn report_unavailable<C: InputContext>(&mut self, ic: &mut C) {
        if !self.config.report_unavailable_backend || self.unavailable_reported {
            return;
        }
        self.unavailable_reported = true;
        ic.input_panel_mut()
            .set_aux_up(Text::plain(&self.config.unavailable_message));
        flush_ui(ic);
    }

    /// Copy the engine's pending output into the input panel and flush it.
    pub fn update_ui<C: InputContext>(&mut self, ic: &mut C) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };

        if backend.has_commit() {
            if let Some(text) = backend.commit_text() {
                if backend.commit_len() > 0 {
                    ic.commit_string(&text);
                }
            }
            // Drops old preedit, candidates and aux together; anything the
            // same event produced is set again below.
            ic.input_panel_mut().reset();
        }

        if backend.has_preedit() {
            let mut preedit = Text::new();
            if let Some(text) = backend.preedit() {
                if backend.preedit_len() > 0 {
                    preedit.append(text, TextFormatFlags::UNDERLINE);
                    preedit.set_cursor(backend.preedit_caret() as usize);
                }
            }
            if ic.capability_flags().test(CapabilityFlags::PREEDIT) {
                ic.input_panel_mut().set_client_preedit(preedit);
            } else {
                ic.input_panel_mut().set_preedit(preedit);
            }
        }

        if backend.has_aux() {
            let aux = match backend.aux() {
                Some(text) if backend.aux_len() > 0 => Text::plain(text),
                _ => Text::new(),
            };
            ic.input_panel_mut().set_aux_up(aux);
        }

        if backend.has_candidates() {
            if backend.should_hide_candidates() {
                ic.input_panel_mut().set_candidate_list(None);
            } else {
                let mut list = CandidateList::new(self.ic);
                list.set_layout_hint(self.config.candidate_layout);
                list.update_candidates(backend);
                ic.input_panel_mut().set_candidate_list(Some(list));
            }
        }

        flush_ui(ic);
    }

    /// Discard composition and clear the panel.
    pub fn reset<C: InputContext>(&mut self, ic: &mut C) {
        if let Some(backend) = self.backend.as_mut() {
            backend.reset();
        }
        ic.input_panel_mut().reset();
        flush_ui(ic);
    }

    /// Input method switched on for this context: take a fresh context
    /// snapshot regardless of engine state.
    pub fn activate<C: InputContext>(&mut self, ic: &mut C) {
        if let Some(backend) = self.backend.as_mut() {
            forward_surrounding_text(backend, ic, self.config.capture_surrounding_text);
        }
    }

    /// Focus left this context: flush composing text into the client,
    /// persist learning, scrub context on both sides, then reset.
    pub fn deactivate<C: InputContext>(&mut self, ic: &mut C) {
        if let Some(backend) = self.backend.as_mut() {
            if backend.commit() {
                if let Some(text) = backend.commit_text() {
                    if backend.commit_len() > 0 {
                        debug!(ic = self.ic.0, "committing pending input on deactivate");
                        ic.commit_string(&text);
                    }
                }
            }
            backend.save_learning();
        }

        ic.surrounding_text_mut().invalidate();
        if let Some(backend) = self.backend.as_mut() {
            backend.set_surrounding_text("", 0);
        }

        self.reset(ic);
    }
}

impl<B: Backend> Drop for KarukanState<B> {
    fn drop(&mut self) {
        if self.backend.is_some() {
            debug!(ic = self.ic.0, "releasing conversion engine");
        }
    }
}

impl<B: Backend> std::fmt::Debug for KarukanState<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KarukanState")
            .field("ic", &self.ic)
            .field("has_backend", &self.backend.is_some())
            .field("initialized", &self.initialized)
            .finish()
    }
}

/// Hand the editor's context to the engine, or an empty one when the client
/// does not provide a usable snapshot. Clearing matters for clients such as
/// terminals: otherwise context from a previous client would linger.
fn forward_surrounding_text<B, C>(backend: &mut B, ic: &C, enabled: bool)
where
    B: Backend,
    C: InputContext,
{
    let surrounding = ic.surrounding_text();
    if enabled
        && ic.capability_flags().test(CapabilityFlags::SURROUNDING_TEXT)
        && surrounding.is_valid()
    {
        let cursor = u32::try_from(surrounding.cursor_byte_offset()).unwrap_or(u32::MAX);
        backend.set_surrounding_text(surrounding.text(), cursor);
    } else {
        backend.set_surrounding_text("", 0);
    }
}

fn flush_ui<C: InputContext>(ic: &mut C) {
    ic.update_preedit();
    ic.update_user_interface(UserInterfaceComponent::InputPanel);
}
