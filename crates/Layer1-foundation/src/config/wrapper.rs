//! Wrapper Config - controller settings
//!
//! Resolved from defaults, then the global store, then the project store.

use crate::storage::JsonStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Config file name
pub const WRAPPER_CONFIG_FILE: &str = "wrapper.json";

/// Resolved controller settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrapperConfig {
    /// Lower bound of the progress range
    pub progress_minimum: i32,

    /// Upper bound of the progress range
    pub progress_maximum: i32,

    /// Append the error's debug rendering to Error lifecycle records
    pub show_error_detail: bool,

    /// Default for `start(emit_lifecycle_messages)` used by helpers and the CLI
    pub emit_lifecycle_messages: bool,

    /// Records kept in the progress channel history (0 disables history)
    pub history_size: usize,
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            progress_minimum: 0,
            progress_maximum: 100,
            show_error_detail: true,
            emit_lifecycle_messages: true,
            history_size: 0,
        }
    }
}

/// On-disk form: every field optional so files can override selectively
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrapperConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_minimum: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_maximum: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_error_detail: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emit_lifecycle_messages: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_size: Option<usize>,
}

impl WrapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// Global + project merged load
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        // 1. Global
        if let Ok(global) = JsonStore::global() {
            if let Some(file) = global.load_optional::<WrapperConfigFile>(WRAPPER_CONFIG_FILE)? {
                config.merge(file);
            }
        }

        // 2. Project
        if let Ok(project) = JsonStore::current_project() {
            if let Some(file) = project.load_optional::<WrapperConfigFile>(WRAPPER_CONFIG_FILE)? {
                config.merge(file);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a single store on top of the defaults
    pub fn load_from(store: &JsonStore) -> Result<Self> {
        let mut config = Self::new();
        if let Some(file) = store.load_optional::<WrapperConfigFile>(WRAPPER_CONFIG_FILE)? {
            config.merge(file);
        }
        config.validate()?;
        Ok(config)
    }

    // ========================================================================
    // Merge / Validate
    // ========================================================================

    /// Apply the fields present in `file` (file wins)
    pub fn merge(&mut self, file: WrapperConfigFile) {
        if let Some(v) = file.progress_minimum {
            self.progress_minimum = v;
        }
        if let Some(v) = file.progress_maximum {
            self.progress_maximum = v;
        }
        if let Some(v) = file.show_error_detail {
            self.show_error_detail = v;
        }
        if let Some(v) = file.emit_lifecycle_messages {
            self.emit_lifecycle_messages = v;
        }
        if let Some(v) = file.history_size {
            self.history_size = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.progress_minimum > self.progress_maximum {
            return Err(Error::invalid_bounds(
                self.progress_minimum,
                self.progress_maximum,
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn bounds(mut self, minimum: i32, maximum: i32) -> Self {
        self.progress_minimum = minimum;
        self.progress_maximum = maximum;
        self
    }

    pub fn show_error_detail(mut self, show: bool) -> Self {
        self.show_error_detail = show;
        self
    }

    pub fn emit_lifecycle_messages(mut self, emit: bool) -> Self {
        self.emit_lifecycle_messages = emit;
        self
    }

    pub fn history_size(mut self, size: usize) -> Self {
        self.history_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WrapperConfig::default();
        assert_eq!(config.progress_minimum, 0);
        assert_eq!(config.progress_maximum, 100);
        assert!(config.show_error_detail);
        assert!(config.emit_lifecycle_messages);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_only_present_fields() {
        let mut config = WrapperConfig::default();
        let file: WrapperConfigFile =
            serde_json::from_str(r#"{ "progressMaximum": 10, "showErrorDetail": false }"#)
                .unwrap();
        config.merge(file);

        assert_eq!(config.progress_minimum, 0);
        assert_eq!(config.progress_maximum, 10);
        assert!(!config.show_error_detail);
        assert!(config.emit_lifecycle_messages);
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let config = WrapperConfig::default().bounds(50, 10);
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_load_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::project(dir.path());

        // Missing file falls back to defaults
        assert_eq!(WrapperConfig::load_from(&store).unwrap(), WrapperConfig::default());

        let file = WrapperConfigFile {
            progress_minimum: Some(-5),
            history_size: Some(16),
            ..Default::default()
        };
        store.save(WRAPPER_CONFIG_FILE, &file).unwrap();

        let config = WrapperConfig::load_from(&store).unwrap();
        assert_eq!(config.progress_minimum, -5);
        assert_eq!(config.progress_maximum, 100);
        assert_eq!(config.history_size, 16);
    }

    #[test]
    fn test_load_from_store_invalid_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::project(dir.path());
        let file = WrapperConfigFile {
            progress_minimum: Some(200),
            ..Default::default()
        };
        store.save(WRAPPER_CONFIG_FILE, &file).unwrap();

        assert!(WrapperConfig::load_from(&store).is_err());
    }
}
