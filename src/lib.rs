pub mod analytics;
pub mod binder;
pub mod config;
pub mod detail;
pub mod domain;
pub mod error;
pub mod grid;
pub mod ics;
pub mod locations;
pub mod logging;
pub mod prefs;
pub mod selection;
pub mod storage;
pub mod ui;
pub mod visual;

pub use error::{CalendarError, StorageError};
