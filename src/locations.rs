use std::env;
use std::fs;
use std::path::PathBuf;

pub const TRACKER_ENV: &str = "PIPELINE_TRACKER";
pub const STATE_DIR_ENV: &str = "PIPELINE_STATE_DIR";
const APP_DIR: &str = "pipeline_calendar";
const DEFAULT_TRACKER_FILE: &str = "applications.tracker";
const PREFERENCES_FILE: &str = "preferences.json";
const CONFIG_FILE: &str = "config.toml";
const LOG_DIR: &str = "logs";

/// Flag first, then `PIPELINE_TRACKER`, then the tracker kept in the state dir.
pub fn resolve_tracker_path(cli_path: Option<PathBuf>) -> PathBuf {
	if let Some(path) = cli_path {
		return absolutize(path);
	}

	if let Some(path) = env::var_os(TRACKER_ENV) {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			return absolutize(path);
		}
	}

	state_dir().join(DEFAULT_TRACKER_FILE)
}

pub fn preferences_path() -> PathBuf {
	state_dir().join(PREFERENCES_FILE)
}

pub fn config_path() -> PathBuf {
	state_dir().join(CONFIG_FILE)
}

pub fn log_dir() -> PathBuf {
	absolutize(state_dir().join(LOG_DIR))
}

pub fn state_dir() -> PathBuf {
	if let Some(path) = env::var_os(STATE_DIR_ENV) {
		if !path.is_empty() {
			return PathBuf::from(path);
		}
	}

	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(path).join(APP_DIR);
		}
	}

	if let Some(path) = env::var_os("XDG_STATE_HOME") {
		return PathBuf::from(path).join(APP_DIR);
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path).join(".local").join("state").join(APP_DIR);
	}

	PathBuf::from(format!(".{APP_DIR}"))
}

fn absolutize(path: PathBuf) -> PathBuf {
	let path = if path.is_absolute() {
		path
	} else if let Ok(cwd) = env::current_dir() {
		cwd.join(path)
	} else {
		path
	};

	if path.exists() {
		fs::canonicalize(&path).unwrap_or(path)
	} else {
		path
	}
}
