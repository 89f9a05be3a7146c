//! Configuration provider interface and the automation settings view
//!
//! The host owns settings persistence. The core only needs to read a named
//! value and to subscribe to future changes of it, so [`SettingsProvider`]
//! is deliberately narrow. [`MemorySettings`] is the in-process provider
//! and [`SettingsFile`] loads one from YAML.
//!
//! ## Setting keys
//!
//! | key | meaning | default |
//! |-----|---------|---------|
//! | `postgame_enabled` | master switch | `false` |
//! | `postgame_mode` | `freeplay`, `scenario`, `workshop` (or `0`/`1`/`2`) | `freeplay` |
//! | `postgame_freeplay_map` | arena code | `Stadium_P` |
//! | `postgame_quick_pick` | scenario code override | none |
//! | `postgame_workshop_path` | installed map file | none |
//! | `postgame_delay_*` | seconds before the load | `0` (floor-clamped) |
//! | `postgame_auto_requeue` | join matchmaking after loading | `false` |
//! | `postgame_delay_requeue` | seconds before requeue | `0` (floor-clamped) |

mod file;
mod paths;

pub use file::SettingsFile;
pub use paths::DataPaths;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

use crate::catalog::DEFAULT_FREEPLAY_MAP;

pub const KEY_ENABLED: &str = "postgame_enabled";
pub const KEY_MODE: &str = "postgame_mode";
pub const KEY_FREEPLAY_MAP: &str = "postgame_freeplay_map";
pub const KEY_QUICK_PICK: &str = "postgame_quick_pick";
pub const KEY_WORKSHOP_PATH: &str = "postgame_workshop_path";
pub const KEY_DELAY_FREEPLAY: &str = "postgame_delay_freeplay";
pub const KEY_DELAY_SCENARIO: &str = "postgame_delay_scenario";
pub const KEY_DELAY_WORKSHOP: &str = "postgame_delay_workshop";
pub const KEY_AUTO_REQUEUE: &str = "postgame_auto_requeue";
pub const KEY_DELAY_REQUEUE: &str = "postgame_delay_requeue";

/// Every key the core reads
pub const ALL_KEYS: &[&str] = &[
    KEY_ENABLED,
    KEY_MODE,
    KEY_FREEPLAY_MAP,
    KEY_QUICK_PICK,
    KEY_WORKSHOP_PATH,
    KEY_DELAY_FREEPLAY,
    KEY_DELAY_SCENARIO,
    KEY_DELAY_WORKSHOP,
    KEY_AUTO_REQUEUE,
    KEY_DELAY_REQUEUE,
];

/// Callback fired with `(key, new_value)` after a setting changes
pub type ChangeCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Read/notify access to host-owned settings
pub trait SettingsProvider: Send + Sync {
    /// Current value of a named setting, if set
    fn get(&self, key: &str) -> Option<String>;

    /// Be notified of future changes to a named setting
    fn subscribe(&self, key: &str, callback: ChangeCallback);
}

/// Thread-safe in-memory settings provider
#[derive(Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
    subscribers: Mutex<HashMap<String, Vec<ChangeCallback>>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a provider pre-populated with values
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let settings = Self::new();
        if let Ok(mut map) = settings.values.write() {
            for (k, v) in values {
                map.insert(k.into(), v.into());
            }
        }
        settings
    }

    /// Set a value and notify subscribers of that key
    ///
    /// Callbacks run after both locks are released so they may read or
    /// write settings themselves.
    pub fn set(&self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Ok(mut map) = self.values.write() {
            map.insert(key.to_string(), value.clone());
        }

        let callbacks = self
            .subscribers
            .lock()
            .map(|subs| subs.get(key).cloned().unwrap_or_default())
            .unwrap_or_default();

        for callback in callbacks {
            callback(key, &value);
        }
    }

    /// Remove a value (subscribers are not notified)
    pub fn unset(&self, key: &str) {
        if let Ok(mut map) = self.values.write() {
            map.remove(key);
        }
    }

    /// Copy of every stored value
    pub fn entries(&self) -> HashMap<String, String> {
        self.values.read().map(|m| m.clone()).unwrap_or_default()
    }
}

impl SettingsProvider for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().ok().and_then(|m| m.get(key).cloned())
    }

    fn subscribe(&self, key: &str, callback: ChangeCallback) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.entry(key.to_string()).or_default().push(callback);
        }
    }
}

/// What gets loaded after a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapMode {
    #[default]
    Freeplay,
    Scenario,
    Workshop,
}

impl FromStr for MapMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "freeplay" => Ok(MapMode::Freeplay),
            "1" | "scenario" | "training" => Ok(MapMode::Scenario),
            "2" | "workshop" => Ok(MapMode::Workshop),
            other => Err(format!("unknown map mode: {other}")),
        }
    }
}

impl fmt::Display for MapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MapMode::Freeplay => "freeplay",
            MapMode::Scenario => "scenario",
            MapMode::Workshop => "workshop",
        };
        f.write_str(name)
    }
}

/// Read-only snapshot of every setting the decision engine consumes
#[derive(Debug, Clone, PartialEq)]
pub struct AutomationSettings {
    pub enabled: bool,
    pub mode: MapMode,
    pub freeplay_map: String,
    pub quick_pick: Option<String>,
    pub workshop_path: Option<PathBuf>,
    pub freeplay_delay_secs: f64,
    pub scenario_delay_secs: f64,
    pub workshop_delay_secs: f64,
    pub auto_requeue: bool,
    pub requeue_delay_secs: f64,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: MapMode::Freeplay,
            freeplay_map: DEFAULT_FREEPLAY_MAP.to_string(),
            quick_pick: None,
            workshop_path: None,
            freeplay_delay_secs: 0.0,
            scenario_delay_secs: 0.0,
            workshop_delay_secs: 0.0,
            auto_requeue: false,
            requeue_delay_secs: 0.0,
        }
    }
}

impl AutomationSettings {
    /// Read the current values from a provider
    ///
    /// Absent keys take their defaults. Present but unparsable values are
    /// logged and also take their defaults.
    pub fn read(provider: &dyn SettingsProvider) -> Self {
        let defaults = Self::default();

        let text = |key: &str| {
            provider
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let freeplay_map = text(KEY_FREEPLAY_MAP).unwrap_or(defaults.freeplay_map);

        let settings = Self {
            enabled: read_parsed(provider, KEY_ENABLED, parse_bool, defaults.enabled),
            mode: read_parsed(provider, KEY_MODE, |v| v.parse().ok(), defaults.mode),
            freeplay_map,
            quick_pick: text(KEY_QUICK_PICK),
            workshop_path: text(KEY_WORKSHOP_PATH).map(PathBuf::from),
            freeplay_delay_secs: read_parsed(provider, KEY_DELAY_FREEPLAY, parse_secs, 0.0),
            scenario_delay_secs: read_parsed(provider, KEY_DELAY_SCENARIO, parse_secs, 0.0),
            workshop_delay_secs: read_parsed(provider, KEY_DELAY_WORKSHOP, parse_secs, 0.0),
            auto_requeue: read_parsed(provider, KEY_AUTO_REQUEUE, parse_bool, false),
            requeue_delay_secs: read_parsed(provider, KEY_DELAY_REQUEUE, parse_secs, 0.0),
        };

        debug!(mode = %settings.mode, enabled = settings.enabled, "Read automation settings");
        settings
    }

    /// Configured delay for a mode, before floor clamping
    pub fn delay_for(&self, mode: MapMode) -> f64 {
        match mode {
            MapMode::Freeplay => self.freeplay_delay_secs,
            MapMode::Scenario => self.scenario_delay_secs,
            MapMode::Workshop => self.workshop_delay_secs,
        }
    }
}

fn read_parsed<T>(
    provider: &dyn SettingsProvider,
    key: &str,
    parse: impl Fn(&str) -> Option<T>,
    default: T,
) -> T {
    match provider.get(key) {
        None => default,
        Some(raw) if raw.trim().is_empty() => default,
        Some(raw) => match parse(raw.trim()) {
            Some(value) => value,
            None => {
                warn!("Ignoring unparsable value {:?} for setting {}", raw, key);
                default
            }
        },
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_secs(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_defaults_when_empty() {
        let provider = MemorySettings::new();
        let settings = AutomationSettings::read(&provider);
        assert_eq!(settings, AutomationSettings::default());
        assert_eq!(settings.freeplay_map, DEFAULT_FREEPLAY_MAP);
    }

    #[test]
    fn test_read_values() {
        let provider = MemorySettings::with_values([
            (KEY_ENABLED, "1"),
            (KEY_MODE, "scenario"),
            (KEY_QUICK_PICK, "AAAA-AAAA-AAAA-AAAA"),
            (KEY_DELAY_SCENARIO, "2.5"),
            (KEY_AUTO_REQUEUE, "true"),
            (KEY_DELAY_REQUEUE, "4"),
        ]);

        let settings = AutomationSettings::read(&provider);
        assert!(settings.enabled);
        assert_eq!(settings.mode, MapMode::Scenario);
        assert_eq!(settings.quick_pick.as_deref(), Some("AAAA-AAAA-AAAA-AAAA"));
        assert_eq!(settings.delay_for(MapMode::Scenario), 2.5);
        assert!(settings.auto_requeue);
        assert_eq!(settings.requeue_delay_secs, 4.0);
    }

    #[test]
    fn test_numeric_mode_and_garbage() {
        let provider = MemorySettings::with_values([
            (KEY_MODE, "2"),
            (KEY_ENABLED, "maybe"),
            (KEY_DELAY_WORKSHOP, "soon"),
        ]);

        let settings = AutomationSettings::read(&provider);
        assert_eq!(settings.mode, MapMode::Workshop);
        assert!(!settings.enabled);
        assert_eq!(settings.workshop_delay_secs, 0.0);
    }

    #[test]
    fn test_subscribe_fires_on_set() {
        let provider = MemorySettings::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        provider.subscribe(
            KEY_MODE,
            Arc::new(move |key, value| {
                assert_eq!(key, KEY_MODE);
                assert_eq!(value, "workshop");
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        provider.set(KEY_MODE, "workshop");
        provider.set(KEY_ENABLED, "1");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(provider.get(KEY_MODE).as_deref(), Some("workshop"));
    }
}
