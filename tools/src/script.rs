//! Scenario files and key action parsing.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use karukan_addon_core::testing::OutputFrame;
use karukan_addon_core::{AddonConfig, CapabilityFlags, Key, KeyEvent, KeyStates, Keysym};
use serde::Deserialize;

/// One step of a replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Key(KeyEvent),
    Select(usize),
    Activate,
    Deactivate,
    Reset,
}

impl Action {
    /// Parse a token such as `a`, `space`, `S-a`, `C-Return`, `^Shift_L`,
    /// `select:2`, `activate`, `deactivate` or `reset`.
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "activate" => return Ok(Action::Activate),
            "deactivate" => return Ok(Action::Deactivate),
            "reset" => return Ok(Action::Reset),
            _ => {}
        }

        if let Some(index) = token.strip_prefix("select:") {
            let index = index
                .parse()
                .with_context(|| format!("bad candidate index in {token:?}"))?;
            return Ok(Action::Select(index));
        }

        let (is_release, mut rest) = match token.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, token),
        };

        let mut states = KeyStates::NONE;
        loop {
            let flag = match rest.get(..2) {
                Some("S-") => KeyStates::SHIFT,
                Some("C-") => KeyStates::CTRL,
                Some("A-") => KeyStates::ALT,
                Some("M-") => KeyStates::SUPER,
                _ => break,
            };
            states |= flag;
            rest = &rest[2..];
        }

        let sym = Keysym::from_name(rest).ok_or_else(|| anyhow!("unknown key {rest:?}"))?;
        Ok(Action::Key(KeyEvent::new(Key::new(sym, states), is_release)))
    }
}

pub fn parse_actions<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<Action>> {
    tokens.iter().map(|t| Action::parse(t.as_ref())).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Preedit,
    Password,
    FormattedPreedit,
    SurroundingText,
}

impl Capability {
    fn flag(self) -> CapabilityFlags {
        match self {
            Capability::Preedit => CapabilityFlags::PREEDIT,
            Capability::Password => CapabilityFlags::PASSWORD,
            Capability::FormattedPreedit => CapabilityFlags::FORMATTED_PREEDIT,
            Capability::SurroundingText => CapabilityFlags::SURROUNDING_TEXT,
        }
    }
}

pub fn capability_flags(capabilities: &[Capability]) -> CapabilityFlags {
    capabilities
        .iter()
        .fold(CapabilityFlags::NONE, |acc, c| acc | c.flag())
}

/// A scripted session: what the engine will answer and what to type.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    pub config: AddonConfig,

    /// Return code of the scripted engine's init
    pub init_code: i32,

    pub capabilities: Vec<Capability>,

    /// Editor text around the caret; `cursor` counts characters
    pub surrounding_text: Option<String>,
    pub cursor: usize,

    pub keys: Vec<String>,

    /// Engine answers, consumed one per dispatched key
    pub frames: Vec<OutputFrame>,
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("parsing scenario")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }

    pub fn actions(&self) -> Result<Vec<Action>> {
        if self.keys.is_empty() {
            bail!("scenario has no keys");
        }
        parse_actions(&self.keys)
    }
}
