//! YAML-backed settings
//!
//! A flat mapping of setting keys to scalar values:
//!
//! ```yaml
//! postgame_enabled: true
//! postgame_mode: scenario
//! postgame_delay_scenario: 1.5
//! ```

use anyhow::{Context, Result};
use serde_yaml_ng::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::MemorySettings;

/// Settings file on disk
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file into a fresh in-memory provider
    ///
    /// A missing file yields an empty provider so every setting takes its
    /// default.
    pub fn load(&self) -> Result<MemorySettings> {
        if !self.path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.path.display()
            );
            return Ok(MemorySettings::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings: {}", self.path.display()))?;

        let raw: Option<BTreeMap<String, Value>> = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse settings: {}", self.path.display()))?;

        let values = raw
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(key, value)| match scalar_to_string(&value) {
                Some(text) => Some((key, text)),
                None => {
                    tracing::warn!("Ignoring non-scalar value for setting {}", key);
                    None
                }
            });

        let settings = MemorySettings::with_values(values);
        tracing::debug!("Loaded settings from {}", self.path.display());
        Ok(settings)
    }

    /// Write every value of a provider back to the file
    pub fn save(&self, settings: &MemorySettings) -> Result<()> {
        let sorted: BTreeMap<String, String> = settings.entries().into_iter().collect();
        let content = serde_yaml_ng::to_string(&sorted).context("Failed to serialize settings")?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory: {}", parent.display())
            })?;
        }

        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write settings: {}", self.path.display()))?;
        Ok(())
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}
