//! karukan-addon-core
//!
//! Input method addon logic that connects a host text-input framework to the
//! Karukan conversion engine. The engine itself is opaque (see [`Backend`]);
//! this crate translates host key events and editor context into engine
//! calls and turns the engine's output flags back into input panel updates.
//!
//! ## Architecture
//!
//! - **Host model**: keys, formatted text, surrounding text, the input panel
//!   and the [`InputContext`] trait the host implements
//! - **Backend**: the engine seam, one owned handle per input context
//! - **Candidate list**: nine-per-page list whose entries route back to the
//!   engine as digit keys
//! - **State**: the per-context adapter (lazy init, context capture, UI
//!   reconciliation, focus-loss flush)
//! - **Addon**: process-wide controller dispatching host callbacks to states
//!
//! ## Usage
//!
//! ```rust
//! use karukan_addon_core::testing::{CallLog, RecordingContext, ScriptedBackend};
//! use karukan_addon_core::{
//!     AddonFactory, AddonManager, InputContextId, InputMethodEngine, InputMethodEntry,
//!     KarukanAddonFactory, KeyEvent, Keysym,
//! };
//!
//! let log = CallLog::new();
//! let backend_log = log.clone();
//! let factory = KarukanAddonFactory::new(move || Some(ScriptedBackend::new(backend_log.clone())));
//! let mut addon = factory.create(&mut AddonManager::new()).unwrap();
//!
//! let entry = InputMethodEntry::karukan();
//! let mut ic = RecordingContext::new(InputContextId(1));
//! let mut event = KeyEvent::press(Keysym::KEY_A);
//! addon.key_event(&entry, &mut ic, &mut event);
//!
//! assert!(addon.state(InputContextId(1)).unwrap().is_initialized());
//! ```

pub mod addon;
pub mod backend;
pub mod candidate;
pub mod config;
pub mod input_context;
pub mod key;
pub mod logging;
pub mod panel;
pub mod property;
pub mod state;
pub mod surrounding;
pub mod testing;
pub mod text;

pub use addon::{
    AddonFactory, AddonManager, InputMethodEngine, InputMethodEntry, KarukanAddon,
    KarukanAddonFactory, PROPERTY_KEY,
};
pub use backend::{Backend, BackendFactory};
pub use candidate::{CandidateLayoutHint, CandidateList, CandidateWord, PAGE_SIZE};
pub use config::AddonConfig;
pub use input_context::{CapabilityFlags, InputContext, InputContextId, UserInterfaceComponent};
pub use key::{backend_modifier_mask, Key, KeyEvent, KeyStates, Keysym};
pub use panel::InputPanel;
pub use property::{InputContextManager, PropertyFactory};
pub use state::KarukanState;
pub use surrounding::SurroundingText;
pub use text::{Text, TextFormatFlags};
