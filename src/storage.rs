use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::detail::ApplicationSink;
use crate::domain::{
    ApplicationPatch, ApplicationRecord, CalendarEvent, NewApplication, events_from_applications,
    generate_id, local_midnight,
};
use crate::error::{CalendarError, StorageError};

const RECORDS_MARKER: &str = "\n=== APPLICATIONS ===\n";
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerHeader {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

impl Default for TrackerHeader {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            owner: None,
        }
    }
}

/// The application list plus where it lives on disk.
///
/// A tracker with a path writes through on every change made via
/// [`ApplicationSink`].
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    pub header: TrackerHeader,
    pub applications: Vec<ApplicationRecord>,
    path: Option<PathBuf>,
}

impl Tracker {
    pub fn in_memory(applications: Vec<ApplicationRecord>) -> Self {
        Self {
            applications,
            ..Self::default()
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let mut tracker = load_tracker(&path)?;
        tracker.path = Some(path);
        Ok(tracker)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn save(&self) -> Result<(), StorageError> {
        match &self.path {
            Some(path) => save_tracker(path, self),
            None => Ok(()),
        }
    }

    pub fn find(&self, id: &str) -> Option<&ApplicationRecord> {
        self.applications.iter().find(|application| application.id == id)
    }

    pub fn events(&self) -> Vec<CalendarEvent> {
        events_from_applications(&self.applications)
    }

    fn unused_id(&self) -> String {
        loop {
            let id = generate_id();
            if self.find(&id).is_none() {
                return id;
            }
        }
    }
}

impl ApplicationSink for Tracker {
    fn create_application(&mut self, new: NewApplication) -> Result<ApplicationRecord, CalendarError> {
        let job_title = new.job_title.trim();
        let company = new.company.trim();
        if job_title.is_empty() || company.is_empty() {
            return Err(CalendarError::Invalid(
                "job title and company are required".to_string(),
            ));
        }

        let record = ApplicationRecord {
            id: self.unused_id(),
            job_title: job_title.to_string(),
            company: company.to_string(),
            status: new.status,
            applied_date: local_midnight(new.applied_on),
            interview_date: None,
            match_score: None,
        };
        self.applications.push(record.clone());
        if let Err(err) = self.save() {
            self.applications.pop();
            return Err(err.into());
        }
        info!(
            "event=application_created id={} status={}",
            record.id, record.status
        );
        Ok(record)
    }

    fn update_application(&mut self, id: &str, patch: &ApplicationPatch) -> Result<(), CalendarError> {
        let Some(index) = self
            .applications
            .iter()
            .position(|application| application.id == id)
        else {
            return Err(CalendarError::NotFound(id.to_string()));
        };

        let previous = self.applications[index].clone();
        self.applications[index].apply(patch);
        if let Err(err) = self.save() {
            self.applications[index] = previous;
            return Err(err.into());
        }
        info!("event=application_updated id={}", id);
        Ok(())
    }
}

pub fn load_tracker(path: &Path) -> Result<Tracker, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Tracker::default()),
        Err(err) => return Err(err.into()),
    };

    if raw.trim().is_empty() {
        return Ok(Tracker::default());
    }

    let (header_blob, records_blob) = raw
        .split_once(RECORDS_MARKER)
        .unwrap_or((raw.as_str(), ""));

    let header: TrackerHeader = toml::from_str(header_blob)?;
    let mut applications = Vec::new();
    for (index, line) in records_blob.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|source| StorageError::JsonDecode {
            line: index + 1,
            source,
        })?;
        applications.push(record);
    }

    Ok(Tracker {
        header,
        applications,
        path: None,
    })
}

pub fn save_tracker(path: &Path, tracker: &Tracker) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let header = toml::to_string_pretty(&tracker.header)?;
    let mut file = fs::File::create(path)?;
    file.write_all(header.as_bytes())?;
    file.write_all(RECORDS_MARKER.as_bytes())?;

    for application in &tracker.applications {
        let line = serde_json::to_string(application).map_err(StorageError::JsonEncode)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::NaiveDate;

    use super::{Tracker, load_tracker, save_tracker};
    use crate::detail::ApplicationSink;
    use crate::domain::{ApplicationPatch, ApplicationStatus, NewApplication};
    use crate::error::{CalendarError, StorageError};

    fn new_application(title: &str) -> NewApplication {
        NewApplication {
            job_title: title.to_string(),
            company: "Acme".to_string(),
            status: ApplicationStatus::Pending,
            applied_on: NaiveDate::from_ymd_opt(2024, 3, 5).expect("valid date"),
        }
    }

    #[test]
    fn round_trips_toml_and_jsonl() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("jobs.tracker");

        let mut tracker = Tracker::open(&path).expect("missing file opens empty");
        let created = tracker
            .create_application(new_application("Engineer"))
            .expect("create should succeed");
        tracker
            .update_application(&created.id, &ApplicationPatch::status(ApplicationStatus::Interview))
            .expect("update should succeed");

        let loaded = load_tracker(&path).expect("load should succeed");
        assert_eq!(loaded.header.schema_version, 1);
        assert_eq!(loaded.applications.len(), 1);
        assert_eq!(loaded.applications[0].status, ApplicationStatus::Interview);
        assert_eq!(loaded.applications[0].applied_date.date_naive().to_string(), "2024-03-05");
    }

    #[test]
    fn unknown_ids_and_blank_fields_are_rejected() {
        let mut tracker = Tracker::in_memory(Vec::new());
        let missing = tracker.update_application("nope", &ApplicationPatch::default());
        assert!(matches!(missing, Err(CalendarError::NotFound(_))));

        let blank = tracker.create_application(new_application("  "));
        assert!(matches!(blank, Err(CalendarError::Invalid(_))));
        assert!(tracker.applications.is_empty());
    }

    #[test]
    fn bad_record_line_is_reported() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("broken.tracker");
        save_tracker(&path, &Tracker::default()).expect("save should succeed");
        let mut raw = fs::read_to_string(&path).expect("file should exist");
        raw.push_str("{\"id\":\n");
        fs::write(&path, raw).expect("write should succeed");

        match load_tracker(&path) {
            Err(StorageError::JsonDecode { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected a decode error, got {other:?}"),
        }
    }

    #[test]
    fn empty_file_loads_as_new_tracker() {
        let dir = tempfile::tempdir().expect("temp dir should be created");
        let path = dir.path().join("empty.tracker");
        fs::write(&path, "  \n").expect("write should succeed");
        let tracker = load_tracker(&path).expect("empty file should load");
        assert!(tracker.applications.is_empty());
    }
}
