//! Addon controller and its factory.
//!
//! One `KarukanAddon` exists per host process. It holds no session state of
//! its own: it registers the per-context property, lets the property
//! factory create a `KarukanState` for each input context, and forwards the
//! host's input method callbacks to the matching state.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::backend::{Backend, BackendFactory};
use crate::config::AddonConfig;
use crate::input_context::{InputContext, InputContextId};
use crate::key::{KeyEvent, Keysym};
use crate::logging::init_logging;
use crate::property::{InputContextManager, PropertyFactory};
use crate::state::KarukanState;

/// Name under which the per-context state is registered with the host.
pub const PROPERTY_KEY: &str = "karukanState";

/// Input method entry the host dispatches callbacks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputMethodEntry {
    unique_name: String,
    name: String,
    language_code: String,
}

impl InputMethodEntry {
    pub fn new(
        unique_name: impl Into<String>,
        name: impl Into<String>,
        language_code: impl Into<String>,
    ) -> Self {
        Self {
            unique_name: unique_name.into(),
            name: name.into(),
            language_code: language_code.into(),
        }
    }

    /// The entry this addon provides.
    pub fn karukan() -> Self {
        Self::new("karukan", "Karukan", "ja")
    }

    pub fn unique_name(&self) -> &str {
        &self.unique_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language_code(&self) -> &str {
        &self.language_code
    }
}

/// Input method engine surface the host calls into.
pub trait InputMethodEngine<C: InputContext> {
    fn key_event(&mut self, entry: &InputMethodEntry, ic: &mut C, event: &mut KeyEvent);

    fn reset(&mut self, entry: &InputMethodEntry, ic: &mut C);

    fn activate(&mut self, entry: &InputMethodEntry, ic: &mut C);

    fn deactivate(&mut self, entry: &InputMethodEntry, ic: &mut C);
}

/// Process-wide controller.
pub struct KarukanAddon<B: Backend> {
    config: Arc<AddonConfig>,
    factory: PropertyFactory<KarukanState<B>>,
}

impl<B: Backend + 'static> KarukanAddon<B> {
    /// Register the per-context property and build the state factory.
    pub fn new(
        manager: &mut InputContextManager,
        config: AddonConfig,
        backend_factory: BackendFactory<B>,
    ) -> Result<Self> {
        manager
            .register_property(PROPERTY_KEY)
            .context("registering karukan input context property")?;

        let config = Arc::new(config);
        let state_config = config.clone();
        let factory = PropertyFactory::new(PROPERTY_KEY, move |ic| {
            KarukanState::new(ic, backend_factory(), state_config.clone())
        });

        Ok(Self { config, factory })
    }

    pub fn config(&self) -> &AddonConfig {
        &self.config
    }

    /// State for `ic`, created on first use.
    pub fn state_for(&mut self, ic: InputContextId) -> &mut KarukanState<B> {
        self.factory.property_for(ic)
    }

    /// State for `ic` if one is live.
    pub fn state(&self, ic: InputContextId) -> Option<&KarukanState<B>> {
        self.factory.get(ic)
    }

    /// Host created a new input context.
    pub fn bind_input_context(&mut self, ic: InputContextId) {
        self.factory.bind(ic);
    }

    /// Host destroyed an input context; its engine handle goes with it.
    /// Returns false if nothing was bound for `ic`.
    pub fn release_input_context(&mut self, ic: InputContextId) -> bool {
        self.factory.release(ic).is_some()
    }

    pub fn live_contexts(&self) -> usize {
        self.factory.len()
    }

    /// A candidate was chosen in the host UI. `index` is the 0-based entry
    /// position; it reaches the engine as the digit key labelling it.
    pub fn select_candidate<C: InputContext>(&mut self, ic: &mut C, index: usize) {
        let state = self.factory.property_for(ic.id());
        let Some(backend) = state.backend_mut() else {
            return;
        };
        let Some(keysym) = Keysym::selection_digit(index) else {
            debug!(index, "candidate index has no selection digit, ignoring");
            return;
        };

        backend.process_key(keysym.0, 0, false);
        state.update_ui(ic);
    }
}

impl<B: Backend + 'static, C: InputContext> InputMethodEngine<C> for KarukanAddon<B> {
    fn key_event(&mut self, _entry: &InputMethodEntry, ic: &mut C, event: &mut KeyEvent) {
        self.factory.property_for(ic.id()).key_event(ic, event);
    }

    fn reset(&mut self, _entry: &InputMethodEntry, ic: &mut C) {
        self.factory.property_for(ic.id()).reset(ic);
    }

    fn activate(&mut self, _entry: &InputMethodEntry, ic: &mut C) {
        self.factory.property_for(ic.id()).activate(ic);
    }

    fn deactivate(&mut self, _entry: &InputMethodEntry, ic: &mut C) {
        self.factory.property_for(ic.id()).deactivate(ic);
    }
}

impl<B: Backend> std::fmt::Debug for KarukanAddon<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KarukanAddon")
            .field("config", &self.config)
            .field("factory", &self.factory)
            .finish()
    }
}

/// Host services handed to addon factories.
#[derive(Debug, Default)]
pub struct AddonManager {
    input_context_manager: InputContextManager,
    config_dir: Option<PathBuf>,
}

impl AddonManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look for the addon config file in `dir`.
    pub fn with_config_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    pub fn config_dir(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    pub fn input_context_manager(&self) -> &InputContextManager {
        &self.input_context_manager
    }

    pub fn input_context_manager_mut(&mut self) -> &mut InputContextManager {
        &mut self.input_context_manager
    }
}

/// Entry point the host uses to instantiate an addon.
pub trait AddonFactory {
    type Addon;

    fn create(&self, manager: &mut AddonManager) -> Result<Self::Addon>;
}

/// Builds the `KarukanAddon` for a process.
pub struct KarukanAddonFactory<B> {
    backend_factory: Rc<dyn Fn() -> Option<B>>,
}

impl<B: Backend + 'static> KarukanAddonFactory<B> {
    pub fn new<F>(backend_factory: F) -> Self
    where
        F: Fn() -> Option<B> + 'static,
    {
        Self {
            backend_factory: Rc::new(backend_factory),
        }
    }
}

impl<B: Backend + 'static> AddonFactory for KarukanAddonFactory<B> {
    type Addon = KarukanAddon<B>;

    fn create(&self, manager: &mut AddonManager) -> Result<KarukanAddon<B>> {
        let config = match manager.config_dir() {
            Some(dir) => AddonConfig::load_from_dir(dir)?,
            None => AddonConfig::default(),
        };
        init_logging(&config.log_filter);

        let backend_factory = self.backend_factory.clone();
        KarukanAddon::new(
            manager.input_context_manager_mut(),
            config,
            Box::new(move || backend_factory()),
        )
    }
}
