//! Key-value persistence for UI preferences, the detail-panel filters and
//! the last selected range.
//!
//! Reads never fail from the caller's point of view: an unavailable store or
//! a malformed blob falls back to defaults, and write failures are logged and
//! dropped.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{DateRange, StatusFilter};
use crate::error::CalendarError;
use crate::grid::ViewMode;

pub const VIEW_PREFS_KEY: &str = "calendar.view_prefs";
pub const DETAIL_FILTERS_KEY: &str = "calendar.detail_filters";
pub const LAST_RANGE_KEY: &str = "calendar.last_range";

/// String-keyed blob storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, CalendarError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), CalendarError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CalendarError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), CalendarError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// One JSON object on disk, rewritten on every `set`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Map<String, Value>,
}

impl JsonFileStore {
    /// Opens the store; a missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Map<String, Value>>(&raw) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(
                        "event=pref_file_malformed path={} error={}",
                        path.display(),
                        err
                    );
                    Map::new()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Map::new(),
            Err(err) => {
                warn!(
                    "event=pref_file_unreadable path={} error={}",
                    path.display(),
                    err
                );
                Map::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), CalendarError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(&self.entries)
            .map_err(|err| CalendarError::Store(err.to_string()))?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, CalendarError> {
        Ok(self.entries.get(key).map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }))
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), CalendarError> {
        self.entries.insert(key.to_string(), Value::String(value));
        self.flush()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DensityMode {
    #[default]
    Full,
    Compact,
}

impl DensityMode {
    pub fn toggled(self) -> Self {
        match self {
            DensityMode::Full => DensityMode::Compact,
            DensityMode::Compact => DensityMode::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPreferences {
    pub density_mode: DensityMode,
    pub focus_contrast: bool,
    pub view_mode: ViewMode,
}

impl ViewPreferences {
    /// Rehydrates field by field; a field of the wrong type keeps its default.
    pub fn from_value(value: &Value) -> Self {
        let mut prefs = Self::default();
        let Some(object) = value.as_object() else {
            return prefs;
        };

        if let Some(density_mode) = field::<DensityMode>(object, "density_mode") {
            prefs.density_mode = density_mode;
        }
        if let Some(focus_contrast) = object.get("focus_contrast").and_then(Value::as_bool) {
            prefs.focus_contrast = focus_contrast;
        }
        if let Some(view_mode) = field::<ViewMode>(object, "view_mode") {
            prefs.view_mode = view_mode;
        }
        prefs
    }
}

fn field<T: DeserializeOwned>(object: &Map<String, Value>, name: &str) -> Option<T> {
    object
        .get(name)
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}

/// Typed, failure-tolerant view over a [`KeyValueStore`].
pub struct PreferenceStore {
    inner: Option<Box<dyn KeyValueStore>>,
}

impl PreferenceStore {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            inner: Some(Box::new(store)),
        }
    }

    /// A store that remembers nothing.
    pub fn unavailable() -> Self {
        Self { inner: None }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        let store = self.inner.as_ref()?;
        match store.get(key) {
            Ok(value) => value,
            Err(err) => {
                warn!("event=pref_read_failed key={} error={}", key, err);
                None
            }
        }
    }

    fn write_raw(&mut self, key: &str, value: String) {
        let Some(store) = self.inner.as_mut() else {
            return;
        };
        if let Err(err) = store.set(key, value) {
            warn!("event=pref_write_failed key={} error={}", key, err);
        }
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("event=pref_malformed key={} error={}", key, err);
                None
            }
        }
    }

    fn write<T: Serialize>(&mut self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.write_raw(key, raw),
            Err(err) => warn!("event=pref_encode_failed key={} error={}", key, err),
        }
    }

    pub fn view_preferences(&self) -> ViewPreferences {
        self.read::<Value>(VIEW_PREFS_KEY)
            .map(|value| ViewPreferences::from_value(&value))
            .unwrap_or_default()
    }

    pub fn save_view_preferences(&mut self, prefs: &ViewPreferences) {
        self.write(VIEW_PREFS_KEY, prefs);
    }

    pub fn detail_filters(&self) -> StatusFilter {
        self.read(DETAIL_FILTERS_KEY).unwrap_or_default()
    }

    pub fn save_detail_filters(&mut self, filter: &StatusFilter) {
        self.write(DETAIL_FILTERS_KEY, filter);
    }

    /// Last persisted range, normalized; malformed blobs read as `None`.
    pub fn last_range(&self) -> Option<DateRange> {
        self.read::<DateRange>(LAST_RANGE_KEY)
            .map(DateRange::normalized)
    }

    pub fn save_last_range(&mut self, range: &DateRange) {
        self.write(LAST_RANGE_KEY, range);
    }
}

impl Default for PreferenceStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
