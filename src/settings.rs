use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::capture::Region;
use crate::sensing::CapturePlan;

pub const MIN_CAPTURE_INTERVAL_SECS: f64 = 0.1;
pub const MIN_HISTORY_WINDOW_MINUTES: f64 = 0.5;

#[cfg(target_os = "windows")]
const DEFAULT_TESSERACT_PATH: &str = r"C:\Program Files\Tesseract-OCR\tesseract.exe";
#[cfg(not(target_os = "windows"))]
const DEFAULT_TESSERACT_PATH: &str = "tesseract";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("unknown setting `{0}`")]
    UnknownKey(String),
    #[error("invalid value for `{key}`: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to save settings: {0}")]
    Persist(String),
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub tesseract_path: String,
    /// Seconds between samples.
    pub capture_interval: f64,
    pub parent_area: Region,
    /// OCR region in absolute screen coordinates.
    pub capture_area: Region,
    pub use_two_step_capture: bool,
    /// Trailing window, in minutes, for the amortized rate.
    pub gold_history_window: f64,
    pub target_upgrade_cost: Option<f64>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            tesseract_path: DEFAULT_TESSERACT_PATH.into(),
            capture_interval: 5.0,
            parent_area: Region::new(0, 0, 800, 600),
            capture_area: Region::new(0, 0, 300, 300),
            use_two_step_capture: true,
            gold_history_window: 5.0,
            target_upgrade_cost: None,
        }
    }
}

impl MonitorSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.capture_interval.is_finite() || self.capture_interval < MIN_CAPTURE_INTERVAL_SECS {
            return Err(ConfigError::invalid(
                "capture_interval",
                format!("must be at least {MIN_CAPTURE_INTERVAL_SECS} seconds"),
            ));
        }
        if !self.gold_history_window.is_finite()
            || self.gold_history_window < MIN_HISTORY_WINDOW_MINUTES
        {
            return Err(ConfigError::invalid(
                "gold_history_window",
                format!("must be at least {MIN_HISTORY_WINDOW_MINUTES} minutes"),
            ));
        }
        if let Some(target) = self.target_upgrade_cost {
            if !target.is_finite() || target <= 0.0 {
                return Err(ConfigError::invalid(
                    "target_upgrade_cost",
                    "must be a positive number",
                ));
            }
        }
        if self.parent_area.is_degenerate() {
            return Err(ConfigError::invalid(
                "parent_area",
                format!("{} has no area", self.parent_area),
            ));
        }
        if self.capture_area.is_degenerate() {
            return Err(ConfigError::invalid(
                "capture_area",
                format!("{} has no area", self.capture_area),
            ));
        }
        Ok(())
    }

    /// Resets each invalid value to its default and keeps everything else.
    /// Returns the keys that were reset.
    pub fn repair(&mut self) -> Vec<&'static str> {
        let defaults = MonitorSettings::default();
        let mut reset = Vec::new();

        while let Err(ConfigError::Invalid { key, .. }) = self.validate() {
            match key {
                "capture_interval" => self.capture_interval = defaults.capture_interval,
                "gold_history_window" => self.gold_history_window = defaults.gold_history_window,
                "target_upgrade_cost" => self.target_upgrade_cost = defaults.target_upgrade_cost,
                "parent_area" => self.parent_area = defaults.parent_area,
                "capture_area" => self.capture_area = defaults.capture_area,
                _ => {
                    *self = MonitorSettings::default();
                    reset.push(key);
                    break;
                }
            }
            reset.push(key);
        }
        reset
    }

    pub fn capture_plan(&self) -> CapturePlan {
        if self.use_two_step_capture {
            CapturePlan::TwoStep {
                parent: self.parent_area,
                sub: self.capture_area,
            }
        } else {
            CapturePlan::Direct(self.capture_area)
        }
    }
}

/// Flat JSON settings document with lock-free snapshot reads.
///
/// Writers are serialized, work on a copy, and only swap it in once it has
/// been validated and written to disk. Readers never see a half-applied update.
pub struct SettingsStore {
    path: Option<PathBuf>,
    data: ArcSwap<MonitorSettings>,
    write_lock: Mutex<()>,
}

impl SettingsStore {
    /// Loads settings from `path`, writing defaults when the file does not exist.
    /// A corrupted file falls back to defaults; invalid values fall back one key
    /// at a time. Either way the file is left as-is until the next save.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<MonitorSettings>(&contents) {
                Ok(mut settings) => {
                    let reset = settings.repair();
                    if !reset.is_empty() {
                        log::warn!(
                            "settings in {} had invalid {}; those keys were reset to defaults",
                            path.display(),
                            reset.join(", ")
                        );
                    }
                    settings
                }
                Err(err) => {
                    log::warn!(
                        "settings in {} unreadable ({err}); all keys reset to defaults",
                        path.display()
                    );
                    MonitorSettings::default()
                }
            }
        } else {
            let defaults = MonitorSettings::default();
            write_settings(&path, &defaults)?;
            defaults
        };

        Ok(Self {
            path: Some(path),
            data: ArcSwap::from_pointee(data),
            write_lock: Mutex::new(()),
        })
    }

    /// Store that never touches disk.
    pub fn in_memory(settings: MonitorSettings) -> Self {
        Self {
            path: None,
            data: ArcSwap::from_pointee(settings),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// A complete, immutable view of the current settings.
    pub fn snapshot(&self) -> Arc<MonitorSettings> {
        self.data.load_full()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        match serde_json::to_value(&**self.data.load()) {
            Ok(Value::Object(mut map)) => map.remove(key),
            _ => None,
        }
    }

    pub fn set(&self, key: &str, value: Value) -> Result<(), ConfigError> {
        self.update(|current| {
            let mut map: Map<String, Value> = match serde_json::to_value(&*current) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            };
            if !map.contains_key(key) {
                return Err(ConfigError::UnknownKey(key.to_string()));
            }
            map.insert(key.to_string(), value);
            *current = serde_json::from_value(Value::Object(map)).map_err(|source| {
                ConfigError::Decode {
                    key: key.to_string(),
                    source,
                }
            })?;
            Ok(())
        })
    }

    pub fn set_capture_interval(&self, seconds: f64) -> Result<(), ConfigError> {
        self.update(|current| {
            current.capture_interval = seconds;
            Ok(())
        })
    }

    pub fn set_history_window(&self, minutes: f64) -> Result<(), ConfigError> {
        self.update(|current| {
            current.gold_history_window = minutes;
            Ok(())
        })
    }

    pub fn set_target_upgrade_cost(&self, target: Option<f64>) -> Result<(), ConfigError> {
        self.update(|current| {
            current.target_upgrade_cost = target;
            Ok(())
        })
    }

    pub fn set_capture_area(&self, area: Region) -> Result<(), ConfigError> {
        self.update(|current| {
            current.capture_area = area;
            Ok(())
        })
    }

    pub fn set_parent_area(&self, area: Region) -> Result<(), ConfigError> {
        self.update(|current| {
            current.parent_area = area;
            Ok(())
        })
    }

    pub fn set_two_step(&self, enabled: bool) -> Result<(), ConfigError> {
        self.update(|current| {
            current.use_two_step_capture = enabled;
            Ok(())
        })
    }

    /// Applies a finished region selection in a single update.
    pub fn apply_selection(&self, parent: Region, sub: Region) -> Result<(), ConfigError> {
        self.update(|current| {
            current.parent_area = parent;
            current.capture_area = sub;
            current.use_two_step_capture = true;
            Ok(())
        })
    }

    fn update<F>(&self, apply: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut MonitorSettings) -> Result<(), ConfigError>,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut next = MonitorSettings::clone(&self.data.load());
        apply(&mut next)?;
        next.validate()?;

        if let Some(path) = &self.path {
            write_settings(path, &next).map_err(|err| ConfigError::Persist(format!("{err:#}")))?;
        }

        self.data.store(Arc::new(next));
        Ok(())
    }
}

fn write_settings(path: &Path, data: &MonitorSettings) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create settings directory {}", dir.display()))?;
    }
    let serialized = serde_json::to_string_pretty(data)?;
    fs::write(path, serialized)
        .with_context(|| format!("Failed to write settings to {}", path.display()))
}
