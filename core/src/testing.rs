//! Scripted doubles for both sides of the adapter.
//!
//! `ScriptedBackend` plays the conversion engine from a queue of output
//! frames and records every state-changing call. `RecordingContext` plays
//! the host input context and records what the adapter asked the host to
//! do, tagging each event with how many backend calls had happened by then
//! so that ordering across the two sides can be asserted.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::anyhow;
use serde::Deserialize;

use crate::backend::Backend;
use crate::candidate::CandidateLayoutHint;
use crate::input_context::{CapabilityFlags, InputContext, InputContextId, UserInterfaceComponent};
use crate::panel::InputPanel;
use crate::surrounding::SurroundingText;

/// A state-changing call made on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Init,
    ProcessKey {
        keysym: u32,
        mask: u32,
        is_release: bool,
    },
    Reset,
    SetSurroundingText {
        text: String,
        cursor: u32,
    },
    Commit,
    SaveLearning,
    Free,
}

/// Shared, clonable log of backend calls. Outlives the backend so `Free`
/// can be observed after drop.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<BackendCall>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: BackendCall) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Number of recorded calls equal to `call`.
    pub fn count(&self, call: &BackendCall) -> usize {
        self.0.borrow().iter().filter(|c| *c == call).count()
    }

    pub fn count_where<F: Fn(&BackendCall) -> bool>(&self, pred: F) -> usize {
        self.0.borrow().iter().filter(|c| pred(c)).count()
    }

    /// Index of the first call matching `pred`.
    pub fn position<F: Fn(&BackendCall) -> bool>(&self, pred: F) -> Option<usize> {
        self.0.borrow().iter().position(pred)
    }
}

/// Preedit produced by a frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PreeditFrame {
    pub text: String,
    /// Caret byte offset
    #[serde(default)]
    pub caret: u32,
}

/// One entry of a candidate page. `text = None` models a null pointer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CandidateItem {
    pub text: Option<String>,
    #[serde(default)]
    pub annotation: String,
}

/// Candidate output of a frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum CandidateFrame {
    Hide,
    Show {
        items: Vec<CandidateItem>,
        #[serde(default)]
        cursor: u32,
    },
}

impl CandidateFrame {
    /// Candidate page from `(text, annotation)` pairs.
    pub fn show(items: &[(&str, &str)], cursor: u32) -> Self {
        CandidateFrame::Show {
            items: items
                .iter()
                .map(|(text, annotation)| CandidateItem {
                    text: Some(text.to_string()),
                    annotation: annotation.to_string(),
                })
                .collect(),
            cursor,
        }
    }
}

/// What the engine reports after one `process_key`.
///
/// `empty` is the engine state afterwards; when unset it follows the
/// preedit (empty preedit → Empty state) and otherwise stays as it was.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputFrame {
    pub consumed: bool,
    pub preedit: Option<PreeditFrame>,
    pub commit: Option<String>,
    pub aux: Option<String>,
    pub candidates: Option<CandidateFrame>,
    pub empty: Option<bool>,
}

#[derive(Debug, Default)]
struct Outputs {
    has_preedit: bool,
    preedit: String,
    caret: u32,
    has_commit: bool,
    commit: String,
    has_aux: bool,
    aux: String,
    has_candidates: bool,
    hide_candidates: bool,
    candidates: Vec<CandidateItem>,
    candidate_cursor: u32,
}

/// Engine double driven by queued frames.
#[derive(Debug)]
pub struct ScriptedBackend {
    log: CallLog,
    frames: VecDeque<OutputFrame>,
    init_code: i32,
    empty: bool,
    composing: String,
    surrounding: (String, u32),
    out: Outputs,
}

impl ScriptedBackend {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            frames: VecDeque::new(),
            init_code: 0,
            empty: true,
            composing: String::new(),
            surrounding: (String::new(), 0),
            out: Outputs::default(),
        }
    }

    /// Make `init` fail with the given C return code.
    pub fn with_init_code(mut self, code: i32) -> Self {
        self.init_code = code;
        self
    }

    pub fn with_frames<I: IntoIterator<Item = OutputFrame>>(mut self, frames: I) -> Self {
        self.frames.extend(frames);
        self
    }

    pub fn push_frame(&mut self, frame: OutputFrame) {
        self.frames.push_back(frame);
    }

    pub fn set_empty(&mut self, empty: bool) {
        self.empty = empty;
    }

    /// Last context handed over through `set_surrounding_text`.
    pub fn surrounding_text(&self) -> (&str, u32) {
        (&self.surrounding.0, self.surrounding.1)
    }

    fn clear_flags(&mut self) {
        self.out.has_preedit = false;
        self.out.has_commit = false;
        self.out.has_aux = false;
        self.out.has_candidates = false;
        self.out.hide_candidates = false;
    }

    fn apply(&mut self, frame: OutputFrame) {
        if let Some(commit) = frame.commit {
            self.out.commit = commit;
            self.out.has_commit = true;
            self.composing.clear();
        }
        if let Some(preedit) = &frame.preedit {
            self.out.preedit = preedit.text.clone();
            self.out.caret = preedit.caret;
            self.out.has_preedit = true;
            self.composing = preedit.text.clone();
        }
        if let Some(aux) = frame.aux {
            self.out.aux = aux;
            self.out.has_aux = true;
        }
        match frame.candidates {
            Some(CandidateFrame::Hide) => {
                self.out.has_candidates = true;
                self.out.hide_candidates = true;
            }
            Some(CandidateFrame::Show { items, cursor }) => {
                self.out.has_candidates = true;
                self.out.candidates = items;
                self.out.candidate_cursor = cursor;
            }
            None => {}
        }
        self.empty = match (frame.empty, &frame.preedit) {
            (Some(empty), _) => empty,
            (None, Some(preedit)) => preedit.text.is_empty(),
            (None, None) => self.empty,
        };
    }
}

impl Backend for ScriptedBackend {
    fn init(&mut self) -> anyhow::Result<()> {
        self.log.push(BackendCall::Init);
        if self.init_code == 0 {
            Ok(())
        } else {
            Err(anyhow!("karukan_engine_init returned {}", self.init_code))
        }
    }

    fn process_key(&mut self, keysym: u32, mask: u32, is_release: bool) -> bool {
        self.log.push(BackendCall::ProcessKey {
            keysym,
            mask,
            is_release,
        });
        self.clear_flags();
        let frame = self.frames.pop_front().unwrap_or_default();
        let consumed = frame.consumed;
        self.apply(frame);
        consumed
    }

    fn reset(&mut self) {
        self.log.push(BackendCall::Reset);
        self.out = Outputs::default();
        self.composing.clear();
        self.empty = true;
    }

    fn set_surrounding_text(&mut self, text: &str, cursor: u32) {
        self.log.push(BackendCall::SetSurroundingText {
            text: text.to_string(),
            cursor,
        });
        self.surrounding = (text.to_string(), cursor);
    }

    fn is_empty(&self) -> bool {
        self.empty
    }

    fn commit(&mut self) -> bool {
        self.log.push(BackendCall::Commit);
        if self.composing.is_empty() {
            return false;
        }
        self.out.commit = std::mem::take(&mut self.composing);
        self.out.has_commit = true;
        self.empty = true;
        true
    }

    fn save_learning(&mut self) {
        self.log.push(BackendCall::SaveLearning);
    }

    fn has_preedit(&self) -> bool {
        self.out.has_preedit
    }

    fn preedit(&self) -> Option<String> {
        Some(self.out.preedit.clone())
    }

    fn preedit_len(&self) -> u32 {
        self.out.preedit.len() as u32
    }

    fn preedit_caret(&self) -> u32 {
        self.out.caret
    }

    fn has_commit(&self) -> bool {
        self.out.has_commit
    }

    fn commit_text(&self) -> Option<String> {
        Some(self.out.commit.clone())
    }

    fn commit_len(&self) -> u32 {
        self.out.commit.len() as u32
    }

    fn has_aux(&self) -> bool {
        self.out.has_aux
    }

    fn aux(&self) -> Option<String> {
        Some(self.out.aux.clone())
    }

    fn aux_len(&self) -> u32 {
        self.out.aux.len() as u32
    }

    fn has_candidates(&self) -> bool {
        self.out.has_candidates
    }

    fn should_hide_candidates(&self) -> bool {
        self.out.hide_candidates
    }

    fn candidate_count(&self) -> u32 {
        self.out.candidates.len() as u32
    }

    fn candidate(&self, index: u32) -> Option<String> {
        self.out
            .candidates
            .get(index as usize)
            .and_then(|c| c.text.clone())
    }

    fn candidate_annotation(&self, index: u32) -> Option<String> {
        self.out
            .candidates
            .get(index as usize)
            .map(|c| c.annotation.clone())
    }

    fn candidate_cursor(&self) -> u32 {
        self.out.candidate_cursor
    }
}

impl Drop for ScriptedBackend {
    fn drop(&mut self) {
        self.log.push(BackendCall::Free);
    }
}

/// Plain-data copy of the panel at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelSnapshot {
    pub preedit: String,
    pub client_preedit: String,
    pub preedit_cursor: Option<usize>,
    pub aux_up: String,
    pub candidates: Option<Vec<String>>,
    pub candidate_cursor: Option<usize>,
    pub layout: Option<CandidateLayoutHint>,
}

impl PanelSnapshot {
    pub fn of(panel: &InputPanel) -> Self {
        let preedit_cursor = panel
            .client_preedit()
            .cursor()
            .or_else(|| panel.preedit().cursor());
        let list = panel.candidate_list();
        Self {
            preedit: panel.preedit().to_plain_string(),
            client_preedit: panel.client_preedit().to_plain_string(),
            preedit_cursor,
            aux_up: panel.aux_up().to_plain_string(),
            candidates: list.map(|l| {
                l.words()
                    .iter()
                    .map(|w| w.text().to_plain_string())
                    .collect()
            }),
            candidate_cursor: list.and_then(|l| l.global_cursor_index()),
            layout: list.map(|l| l.layout_hint()),
        }
    }
}

/// Something the adapter asked the host to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Commit(String),
    UpdatePreedit,
    UpdateUserInterface {
        component: UserInterfaceComponent,
        panel: PanelSnapshot,
    },
}

/// A host event and the number of backend calls logged before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub event: HostEvent,
    pub backend_calls: usize,
}

/// Host input context double.
#[derive(Debug)]
pub struct RecordingContext {
    id: InputContextId,
    capabilities: CapabilityFlags,
    surrounding: SurroundingText,
    panel: InputPanel,
    events: Vec<RecordedEvent>,
    log: Option<CallLog>,
}

impl RecordingContext {
    pub fn new(id: InputContextId) -> Self {
        Self {
            id,
            capabilities: CapabilityFlags::NONE,
            surrounding: SurroundingText::new(),
            panel: InputPanel::new(),
            events: Vec::new(),
            log: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: CapabilityFlags) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Valid surrounding text with the caret at `cursor` characters.
    pub fn with_surrounding_text(mut self, text: &str, cursor: usize) -> Self {
        self.surrounding.set_text(text, cursor, cursor);
        self
    }

    /// Tag recorded events with the length of `log`.
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn set_capabilities(&mut self, capabilities: CapabilityFlags) {
        self.capabilities = capabilities;
    }

    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    pub fn host_events(&self) -> Vec<HostEvent> {
        self.events.iter().map(|e| e.event.clone()).collect()
    }

    pub fn commits(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match &e.event {
                HostEvent::Commit(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Panel snapshots taken at each input panel flush.
    pub fn ui_updates(&self) -> Vec<PanelSnapshot> {
        self.events
            .iter()
            .filter_map(|e| match &e.event {
                HostEvent::UpdateUserInterface {
                    component: UserInterfaceComponent::InputPanel,
                    panel,
                } => Some(panel.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    fn record(&mut self, event: HostEvent) {
        let backend_calls = self.log.as_ref().map_or(0, CallLog::len);
        self.events.push(RecordedEvent {
            event,
            backend_calls,
        });
    }
}

impl InputContext for RecordingContext {
    fn id(&self) -> InputContextId {
        self.id
    }

    fn capability_flags(&self) -> CapabilityFlags {
        self.capabilities
    }

    fn surrounding_text(&self) -> &SurroundingText {
        &self.surrounding
    }

    fn surrounding_text_mut(&mut self) -> &mut SurroundingText {
        &mut self.surrounding
    }

    fn input_panel(&self) -> &InputPanel {
        &self.panel
    }

    fn input_panel_mut(&mut self) -> &mut InputPanel {
        &mut self.panel
    }

    fn commit_string(&mut self, text: &str) {
        self.record(HostEvent::Commit(text.to_string()));
    }

    fn update_preedit(&mut self) {
        self.record(HostEvent::UpdatePreedit);
    }

    fn update_user_interface(&mut self, component: UserInterfaceComponent) {
        let panel = PanelSnapshot::of(&self.panel);
        self.record(HostEvent::UpdateUserInterface { component, panel });
    }
}
