//! Addon configuration.
//!
//! Every field has a default, so a user file only needs the keys it wants
//! to change. Unknown keys are rejected to catch typos early.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::candidate::CandidateLayoutHint;

/// File name looked up in the addon's config directory.
pub const CONFIG_FILE_NAME: &str = "karukan-addon.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AddonConfig {
    /// Aux text shown while the model loads on the first key press
    pub loading_message: String,

    /// Aux text left in place when the model fails to load
    pub load_failed_message: String,

    /// Show `unavailable_message` once when the engine handle could not be
    /// allocated. Off by default: such a context silently passes keys through.
    pub report_unavailable_backend: bool,
    pub unavailable_message: String,

    /// Forward the editor's surrounding text to the engine. When off, the
    /// engine always receives an empty context.
    pub capture_surrounding_text: bool,

    /// Layout hint for the candidate list
    pub candidate_layout: CandidateLayoutHint,

    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for AddonConfig {
    fn default() -> Self {
        Self {
            loading_message: "Karukan: Loading model...".to_string(),
            load_failed_message: "Karukan: Model load failed".to_string(),
            report_unavailable_backend: false,
            unavailable_message: "Karukan: Engine unavailable".to_string(),
            capture_surrounding_text: true,
            candidate_layout: CandidateLayoutHint::Vertical,
            log_filter: "warn".to_string(),
        }
    }
}

impl AddonConfig {
    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load `CONFIG_FILE_NAME` from `dir`, falling back to defaults when the
    /// file does not exist.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(CONFIG_FILE_NAME);
        if path.exists() {
            Self::load_toml(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;
        std::fs::write(path, content).with_context(|| format!("writing config {}", path.display()))
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AddonConfig::default();
        assert_eq!(config.loading_message, "Karukan: Loading model...");
        assert_eq!(config.load_failed_message, "Karukan: Model load failed");
        assert!(!config.report_unavailable_backend);
        assert!(config.capture_surrounding_text);
        assert_eq!(config.candidate_layout, CandidateLayoutHint::Vertical);
    }

    #[test]
    fn test_partial_config() {
        let config = AddonConfig::from_toml_str(
            r#"
            capture_surrounding_text = false
            candidate_layout = "horizontal"
            "#,
        )
        .unwrap();
        assert!(!config.capture_surrounding_text);
        assert_eq!(config.candidate_layout, CandidateLayoutHint::Horizontal);
        assert_eq!(config.loading_message, AddonConfig::default().loading_message);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(AddonConfig::from_toml_str("page_size = 5").is_err());
    }

    #[test]
    fn test_toml_string_roundtrip() {
        let mut config = AddonConfig::default();
        config.report_unavailable_backend = true;
        config.log_filter = "karukan_addon_core=debug".to_string();
        let toml = config.to_toml_string().unwrap();
        assert!(toml.contains("report_unavailable_backend = true"));
        assert_eq!(AddonConfig::from_toml_str(&toml).unwrap(), config);
    }

    #[test]
    fn test_load_from_dir() {
        let dir = std::env::temp_dir().join(format!("karukan-addon-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        // Missing file falls back to defaults
        let _ = std::fs::remove_file(dir.join(CONFIG_FILE_NAME));
        assert_eq!(AddonConfig::load_from_dir(&dir).unwrap(), AddonConfig::default());

        let mut config = AddonConfig::default();
        config.candidate_layout = CandidateLayoutHint::NotSet;
        config.save_toml(dir.join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(AddonConfig::load_from_dir(&dir).unwrap(), config);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
