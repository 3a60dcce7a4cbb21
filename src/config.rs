use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::grid::WeekStart;
use crate::ics::IcsOptions;

pub const WEEK_START_ENV: &str = "PIPELINE_WEEK_START";
pub const LOG_LEVEL_ENV: &str = "PIPELINE_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub week_start: WeekStart,
    /// Chips per day cell before "+N more". Compact density shows one.
    pub max_visible_events_per_day: usize,
    pub product_id: String,
    pub uid_namespace: String,
    pub export_prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            week_start: WeekStart::Sunday,
            max_visible_events_per_day: 3,
            product_id: "PipelineCalendar".to_string(),
            uid_namespace: "pipeline-calendar".to_string(),
            export_prefix: "applications".to_string(),
            log_level: None,
        }
    }
}

impl CalendarConfig {
    /// Reads `path` and applies environment overrides. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let config = Self::load_from(path)?;
        Ok(config.with_overrides(|name| env::var(name).ok()))
    }

    pub fn load_from(path: &Path) -> Result<Self, StorageError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(err.into()),
        };
        Ok(toml::from_str(&raw)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(WEEK_START_ENV) {
            match WeekStart::parse(&raw) {
                Some(week_start) => self.week_start = week_start,
                None => warn!("event=config_override_ignored key={} value={}", WEEK_START_ENV, raw),
            }
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV).filter(|level| !level.trim().is_empty()) {
            self.log_level = Some(level);
        }
        self
    }

    pub fn ics_options(&self) -> IcsOptions {
        IcsOptions {
            product: self.product_id.clone(),
            namespace: self.uid_namespace.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{CalendarConfig, LOG_LEVEL_ENV, WEEK_START_ENV};
    use crate::grid::WeekStart;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let config = CalendarConfig::load_from(&dir.path().join("config.toml"))
            .expect("missing config should load");
        assert_eq!(config, CalendarConfig::default());
        assert_eq!(config.ics_options().namespace, "pipeline-calendar");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("config.toml");
        fs::write(&path, "week_start = \"monday\"\nexport_prefix = \"jobs\"\n")
            .expect("write should succeed");
        let config = CalendarConfig::load_from(&path).expect("config should load");
        assert_eq!(config.week_start, WeekStart::Monday);
        assert_eq!(config.export_prefix, "jobs");
        assert_eq!(config.max_visible_events_per_day, 3);

        fs::write(&path, "week_start = [").expect("write should succeed");
        assert!(CalendarConfig::load_from(&path).is_err());
    }

    #[test]
    fn env_overrides_apply_when_valid() {
        let config = CalendarConfig::default().with_overrides(|name| match name {
            WEEK_START_ENV => Some("1".to_string()),
            LOG_LEVEL_ENV => Some("debug".to_string()),
            _ => None,
        });
        assert_eq!(config.week_start, WeekStart::Monday);
        assert_eq!(config.log_level.as_deref(), Some("debug"));

        let config = CalendarConfig::default()
            .with_overrides(|name| (name == WEEK_START_ENV).then(|| "friday".to_string()));
        assert_eq!(config.week_start, WeekStart::Sunday);
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("nested").join("config.toml");
        let config = CalendarConfig {
            max_visible_events_per_day: 5,
            ..CalendarConfig::default()
        };
        config.save_to(&path).expect("save should succeed");
        assert_eq!(CalendarConfig::load_from(&path).expect("reload"), config);
    }
}
