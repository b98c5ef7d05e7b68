// core/tests/key_pipeline.rs
//
// Key event pipeline of the per-context adapter:
// - lazy, latched engine init with loading / failure hints
// - surrounding-text capture only in the Empty state
// - modifier translation and consumption
// - passthrough when the engine handle could not be allocated

use karukan_addon_core::testing::{
    BackendCall, CallLog, HostEvent, OutputFrame, PreeditFrame, RecordingContext, ScriptedBackend,
};
use karukan_addon_core::{
    AddonConfig, CapabilityFlags, InputContext, InputContextId, InputContextManager,
    InputMethodEngine, InputMethodEntry, KarukanAddon, Key, KeyEvent, KeyStates, Keysym,
};

struct Fixture {
    addon: KarukanAddon<ScriptedBackend>,
    log: CallLog,
    ic: RecordingContext,
    entry: InputMethodEntry,
}

impl Fixture {
    fn new(config: AddonConfig, init_code: i32, frames: Vec<OutputFrame>) -> Self {
        let log = CallLog::new();
        let backend_log = log.clone();
        let mut manager = InputContextManager::new();
        let addon = KarukanAddon::new(
            &mut manager,
            config,
            Box::new(move || {
                Some(
                    ScriptedBackend::new(backend_log.clone())
                        .with_init_code(init_code)
                        .with_frames(frames.clone()),
                )
            }),
        )
        .expect("addon");
        let ic = RecordingContext::new(InputContextId(1)).with_call_log(log.clone());
        Self {
            addon,
            log,
            ic,
            entry: InputMethodEntry::karukan(),
        }
    }

    fn with_frames(frames: Vec<OutputFrame>) -> Self {
        Self::new(AddonConfig::default(), 0, frames)
    }

    fn send(&mut self, mut event: KeyEvent) -> KeyEvent {
        self.addon.key_event(&self.entry, &mut self.ic, &mut event);
        event
    }

    fn press(&mut self, sym: Keysym) -> KeyEvent {
        self.send(KeyEvent::press(sym))
    }

    fn surrounding_calls(&self) -> Vec<BackendCall> {
        self.log
            .calls()
            .into_iter()
            .filter(|c| matches!(c, BackendCall::SetSurroundingText { .. }))
            .collect()
    }
}

fn composing(text: &str) -> OutputFrame {
    OutputFrame {
        consumed: true,
        preedit: Some(PreeditFrame {
            text: text.to_string(),
            caret: text.len() as u32,
        }),
        ..OutputFrame::default()
    }
}

#[test]
fn test_first_keystroke_initializes_engine() {
    let mut f = Fixture::with_frames(vec![]);
    f.press(Keysym::KEY_A);

    assert_eq!(
        f.log.calls(),
        vec![
            BackendCall::Init,
            BackendCall::SetSurroundingText {
                text: String::new(),
                cursor: 0
            },
            BackendCall::ProcessKey {
                keysym: 0x61,
                mask: 0,
                is_release: false
            },
        ]
    );

    // Loading hint is flushed before init runs, cleared right after it,
    // then the reconciliation flush follows the key dispatch.
    let at: Vec<usize> = f.ic.events().iter().map(|e| e.backend_calls).collect();
    assert_eq!(at, vec![0, 0, 1, 1, 3, 3]);

    let ui = f.ic.ui_updates();
    assert_eq!(ui.len(), 3);
    assert_eq!(ui[0].aux_up, "Karukan: Loading model...");
    assert_eq!(ui[1].aux_up, "");
    assert_eq!(ui[2].aux_up, "");

    assert!(f.addon.state(InputContextId(1)).unwrap().is_initialized());
}

#[test]
fn test_init_failure_is_latched() {
    let mut f = Fixture::new(AddonConfig::default(), -1, vec![]);
    f.press(Keysym::KEY_A);

    let ui = f.ic.ui_updates();
    assert_eq!(ui[0].aux_up, "Karukan: Loading model...");
    assert_eq!(ui.last().unwrap().aux_up, "Karukan: Model load failed");
    assert_eq!(
        f.ic.input_panel().aux_up().to_plain_string(),
        "Karukan: Model load failed"
    );

    // Key still reaches the engine
    assert_eq!(
        f.log.count_where(|c| matches!(c, BackendCall::ProcessKey { .. })),
        1
    );
    assert!(f.addon.state(InputContextId(1)).unwrap().is_initialized());

    f.press(Keysym::KEY_K);
    assert_eq!(f.log.count(&BackendCall::Init), 1);
    assert_eq!(
        f.log.count_where(|c| matches!(c, BackendCall::ProcessKey { .. })),
        2
    );
}

#[test]
fn test_init_runs_at_most_once() {
    let mut f = Fixture::with_frames(vec![composing("k"), composing("か")]);
    f.send(KeyEvent::release(Keysym::SHIFT_L));
    assert_eq!(f.log.position(|c| *c == BackendCall::Init), Some(0));

    for sym in [Keysym::KEY_K, Keysym::KEY_A, Keysym::RETURN, Keysym::ESCAPE] {
        f.press(sym);
        f.send(KeyEvent::release(sym));
    }
    assert_eq!(f.log.count(&BackendCall::Init), 1);
}

#[test]
fn test_terminal_without_surrounding_capability_gets_empty_context() {
    let mut f = Fixture::with_frames(vec![]);
    f.ic = RecordingContext::new(InputContextId(1))
        .with_surrounding_text("stale text", 5)
        .with_call_log(f.log.clone());

    f.press(Keysym::KEY_K);

    let calls = f.log.calls();
    let set_at = calls
        .iter()
        .position(|c| matches!(c, BackendCall::SetSurroundingText { .. }))
        .unwrap();
    let key_at = calls
        .iter()
        .position(|c| matches!(c, BackendCall::ProcessKey { .. }))
        .unwrap();
    assert!(set_at < key_at);
    assert_eq!(
        calls[set_at],
        BackendCall::SetSurroundingText {
            text: String::new(),
            cursor: 0
        }
    );
}

#[test]
fn test_surrounding_text_forwarded_as_byte_offset() {
    let mut f = Fixture::with_frames(vec![]);
    f.ic = RecordingContext::new(InputContextId(1))
        .with_capabilities(CapabilityFlags::SURROUNDING_TEXT)
        .with_surrounding_text("今日は", 2)
        .with_call_log(f.log.clone());

    f.press(Keysym::KEY_K);

    assert_eq!(
        f.surrounding_calls(),
        vec![BackendCall::SetSurroundingText {
            text: "今日は".to_string(),
            cursor: 6
        }]
    );
}

#[test]
fn test_invalid_snapshot_is_not_forwarded() {
    let mut f = Fixture::with_frames(vec![]);
    f.ic = RecordingContext::new(InputContextId(1))
        .with_capabilities(CapabilityFlags::SURROUNDING_TEXT)
        .with_call_log(f.log.clone());

    f.press(Keysym::KEY_K);

    assert_eq!(
        f.surrounding_calls(),
        vec![BackendCall::SetSurroundingText {
            text: String::new(),
            cursor: 0
        }]
    );
}

#[test]
fn test_context_capture_disabled_by_config() {
    let config = AddonConfig {
        capture_surrounding_text: false,
        ..AddonConfig::default()
    };
    let mut f = Fixture::new(config, 0, vec![]);
    f.ic = RecordingContext::new(InputContextId(1))
        .with_capabilities(CapabilityFlags::SURROUNDING_TEXT)
        .with_surrounding_text("前の文", 3)
        .with_call_log(f.log.clone());

    f.press(Keysym::KEY_K);

    assert_eq!(
        f.surrounding_calls(),
        vec![BackendCall::SetSurroundingText {
            text: String::new(),
            cursor: 0
        }]
    );
}

#[test]
fn test_context_not_overwritten_mid_composition() {
    let mut f = Fixture::with_frames(vec![composing("k"), composing("か"), composing("かn")]);
    f.ic = RecordingContext::new(InputContextId(1))
        .with_capabilities(CapabilityFlags::SURROUNDING_TEXT)
        .with_surrounding_text("abc", 3)
        .with_call_log(f.log.clone());

    f.press(Keysym::KEY_K);
    f.press(Keysym::KEY_A);
    f.press(Keysym(0x6e));

    assert_eq!(f.surrounding_calls().len(), 1);
}

#[test]
fn test_release_never_captures_context() {
    let mut f = Fixture::with_frames(vec![]);
    f.send(KeyEvent::release(Keysym::KEY_A));
    f.send(KeyEvent::release(Keysym::SHIFT_L));

    assert!(f.surrounding_calls().is_empty());
    assert_eq!(
        f.log.calls().last(),
        Some(&BackendCall::ProcessKey {
            keysym: Keysym::SHIFT_L.0,
            mask: 0,
            is_release: true
        })
    );
}

#[test]
fn test_modifier_mask_sent_to_engine() {
    let mut f = Fixture::with_frames(vec![]);
    let states = KeyStates::SHIFT | KeyStates::CTRL | KeyStates::CAPS_LOCK;
    f.send(KeyEvent::press(Key::new(Keysym::KEY_A, states)));
    f.send(KeyEvent::press(Key::new(
        Keysym::KEY_A,
        KeyStates::ALT | KeyStates::SUPER | KeyStates::NUM_LOCK,
    )));

    let masks: Vec<u32> = f
        .log
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            BackendCall::ProcessKey { mask, .. } => Some(mask),
            _ => None,
        })
        .collect();
    assert_eq!(masks, vec![1 | 4, 8 | 64]);
}

#[test]
fn test_consumed_key_is_filtered() {
    let mut f = Fixture::with_frames(vec![composing("k")]);
    let event = f.press(Keysym::KEY_K);
    assert!(event.filtered());
    assert!(event.accepted());
}

#[test]
fn test_unconsumed_key_still_reconciles() {
    let frame = OutputFrame {
        consumed: false,
        aux: Some("[カタカナ]".to_string()),
        ..OutputFrame::default()
    };
    let mut f = Fixture::with_frames(vec![frame]);
    let event = f.send(KeyEvent::release(Keysym::SHIFT_L));

    assert!(!event.filtered());
    assert_eq!(f.ic.ui_updates().last().unwrap().aux_up, "[カタカナ]");
    assert!(matches!(
        f.ic.host_events().last(),
        Some(HostEvent::UpdateUserInterface { .. })
    ));
}

fn unavailable_addon(config: AddonConfig) -> (KarukanAddon<ScriptedBackend>, RecordingContext) {
    let mut manager = InputContextManager::new();
    let addon = KarukanAddon::new(&mut manager, config, Box::new(|| None)).unwrap();
    (addon, RecordingContext::new(InputContextId(9)))
}

#[test]
fn test_unallocated_engine_passes_keys_through() {
    let (mut addon, mut ic) = unavailable_addon(AddonConfig::default());
    let entry = InputMethodEntry::karukan();
    let mut event = KeyEvent::press(Keysym::KEY_A);

    addon.key_event(&entry, &mut ic, &mut event);

    assert!(!event.filtered());
    assert!(ic.events().is_empty());
    assert!(!addon.state(InputContextId(9)).unwrap().is_initialized());
}

#[test]
fn test_unallocated_engine_reported_once_when_enabled() {
    let config = AddonConfig {
        report_unavailable_backend: true,
        ..AddonConfig::default()
    };
    let (mut addon, mut ic) = unavailable_addon(config);
    let entry = InputMethodEntry::karukan();

    for _ in 0..3 {
        let mut event = KeyEvent::press(Keysym::KEY_A);
        addon.key_event(&entry, &mut ic, &mut event);
        assert!(!event.filtered());
    }

    let ui = ic.ui_updates();
    assert_eq!(ui.len(), 1);
    assert_eq!(ui[0].aux_up, "Karukan: Engine unavailable");
}
