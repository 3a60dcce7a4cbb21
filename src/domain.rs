use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{
    DateTime, Duration, FixedOffset, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone,
};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Serialize};

use crate::error::CalendarError;

const ID_LEN: usize = 8;

/// Fixed pipeline vocabulary, in cycle order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ApplicationStatus {
    Pending,
    Applied,
    Interview,
    Offer,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        ApplicationStatus::Pending,
        ApplicationStatus::Applied,
        ApplicationStatus::Interview,
        ApplicationStatus::Offer,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "Pending",
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::Interview => "Interview",
            ApplicationStatus::Offer => "Offer",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Withdrawn => "Withdrawn",
        }
    }

    /// Case-insensitive lookup; unknown labels yield `None`.
    pub fn parse(label: &str) -> Option<Self> {
        let wanted = label.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
    }

    /// Next status in the vocabulary, wrapping from `Withdrawn` to `Pending`.
    pub fn next(self) -> Self {
        let index = Self::ALL
            .iter()
            .position(|status| *status == self)
            .unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

impl Display for ApplicationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = CalendarError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| CalendarError::Invalid(format!("unknown status: {value}")))
    }
}

/// A dated, optionally status-tagged item shown on the calendar grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub date: DateTime<FixedOffset>,
    pub title: String,
    pub subtitle: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: String,
    pub job_title: String,
    pub company: String,
    pub status: ApplicationStatus,
    pub applied_date: DateTime<FixedOffset>,
    #[serde(default)]
    pub interview_date: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub match_score: Option<f64>,
}

impl ApplicationRecord {
    pub fn apply(&mut self, patch: &ApplicationPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(interview_date) = patch.interview_date {
            self.interview_date = Some(interview_date);
        }
        if let Some(match_score) = patch.match_score {
            self.match_score = Some(match_score);
        }
    }

    pub fn interview_day(&self) -> Option<NaiveDate> {
        self.interview_date.map(|date| date.date_naive())
    }
}

/// Input to the external "create application" collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub job_title: String,
    pub company: String,
    pub status: ApplicationStatus,
    pub applied_on: NaiveDate,
}

/// Partial update handed to the external "update application" collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationPatch {
    pub status: Option<ApplicationStatus>,
    pub interview_date: Option<DateTime<FixedOffset>>,
    pub match_score: Option<f64>,
}

impl ApplicationPatch {
    pub fn status(status: ApplicationStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Anything that lands on exactly one calendar day.
///
/// The day is the wall-clock date in the offset the timestamp was recorded
/// with, never a UTC projection.
pub trait Dated {
    fn day(&self) -> NaiveDate;
    fn status_label(&self) -> Option<&str>;
}

impl Dated for CalendarEvent {
    fn day(&self) -> NaiveDate {
        self.date.date_naive()
    }

    fn status_label(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

impl Dated for ApplicationRecord {
    fn day(&self) -> NaiveDate {
        self.applied_date.date_naive()
    }

    fn status_label(&self) -> Option<&str> {
        Some(self.status.as_str())
    }
}

/// Inclusive day range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Builds a range from two days in any order.
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn normalized(self) -> Self {
        Self::new(self.start, self.end)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn is_single_day(&self) -> bool {
        self.start == self.end
    }

    /// Number of days covered, counting both ends.
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |day| *day <= self.end)
    }
}

/// Optional subset of the status vocabulary; empty means everything is visible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusFilter(BTreeSet<ApplicationStatus>);

impl StatusFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(statuses: impl IntoIterator<Item = ApplicationStatus>) -> Self {
        Self(statuses.into_iter().collect())
    }

    pub fn is_active(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn contains(&self, status: ApplicationStatus) -> bool {
        self.0.contains(&status)
    }

    pub fn toggle(&mut self, status: ApplicationStatus) {
        if !self.0.remove(&status) {
            self.0.insert(status);
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn statuses(&self) -> impl Iterator<Item = ApplicationStatus> + '_ {
        self.0.iter().copied()
    }

    /// Labels outside the vocabulary, and missing labels, never pass an active filter.
    pub fn matches(&self, label: Option<&str>) -> bool {
        if !self.is_active() {
            return true;
        }
        label
            .and_then(ApplicationStatus::parse)
            .is_some_and(|status| self.0.contains(&status))
    }
}

/// One event per application on its applied day, plus an `Interview` event
/// on the interview day when one is scheduled.
pub fn events_from_applications(applications: &[ApplicationRecord]) -> Vec<CalendarEvent> {
    let mut events = Vec::with_capacity(applications.len());
    for application in applications {
        events.push(CalendarEvent {
            id: application.id.clone(),
            date: application.applied_date,
            title: application.job_title.clone(),
            subtitle: non_empty(&application.company),
            status: Some(application.status.as_str().to_string()),
        });

        if let Some(interview_date) = application.interview_date {
            events.push(CalendarEvent {
                id: format!("{}-interview", application.id),
                date: interview_date,
                title: format!("Interview: {}", application.job_title),
                subtitle: non_empty(&application.company),
                status: Some(ApplicationStatus::Interview.as_str().to_string()),
            });
        }
    }
    events
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn generate_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Local midnight of `day`, skipping forward past a DST gap when needed.
pub fn local_midnight(day: NaiveDate) -> DateTime<FixedOffset> {
    let midnight = day.and_hms_opt(0, 0, 0).expect("midnight must be valid");
    local_naive_resolved(midnight)
}

fn local_naive(naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(local_datetime) => Some(local_datetime.fixed_offset()),
        LocalResult::Ambiguous(first, second) => Some(first.min(second).fixed_offset()),
        LocalResult::None => None,
    }
}

fn local_naive_resolved(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    let mut cursor = naive;
    for _ in 0..=120 {
        if let Some(timestamp) = local_naive(cursor) {
            return timestamp;
        }
        cursor += Duration::minutes(1);
    }

    // No local zone has a gap longer than two hours; fall back to a UTC reading.
    naive.and_utc().fixed_offset()
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` days (local midnight).
pub fn parse_timestamp(input: &str) -> Result<DateTime<FixedOffset>, CalendarError> {
    let trimmed = input.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(timestamp);
    }
    parse_day(trimmed).map(local_midnight)
}

pub fn parse_day(input: &str) -> Result<NaiveDate, CalendarError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|err| CalendarError::Invalid(format!("invalid date `{input}`: {err}")))
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    use super::{
        ApplicationRecord, ApplicationStatus, DateRange, Dated, StatusFilter,
        events_from_applications,
    };

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(
            ApplicationStatus::parse(" interview "),
            Some(ApplicationStatus::Interview)
        );
        assert_eq!(ApplicationStatus::parse("OFFER"), Some(ApplicationStatus::Offer));
        assert_eq!(ApplicationStatus::parse("ghosted"), None);
    }

    #[test]
    fn status_cycle_wraps() {
        assert_eq!(ApplicationStatus::Pending.next(), ApplicationStatus::Applied);
        assert_eq!(ApplicationStatus::Withdrawn.next(), ApplicationStatus::Pending);
    }

    #[test]
    fn date_range_normalizes_any_order() {
        let range = DateRange::new(day(2024, 3, 10), day(2024, 3, 5));
        assert_eq!(range.start, day(2024, 3, 5));
        assert_eq!(range.end, day(2024, 3, 10));
        assert_eq!(range.len_days(), 6);
        assert_eq!(range.days().count(), 6);
        assert!(DateRange::single(day(2024, 3, 5)).is_single_day());
    }

    #[test]
    fn active_filter_rejects_unknown_and_missing_labels() {
        let filter = StatusFilter::only([ApplicationStatus::Offer]);
        assert!(filter.matches(Some("offer")));
        assert!(!filter.matches(Some("Applied")));
        assert!(!filter.matches(Some("ghosted")));
        assert!(!filter.matches(None));
        assert!(StatusFilter::all().matches(None));
    }

    #[test]
    fn day_uses_recorded_offset_not_utc() {
        let pacific = FixedOffset::west_opt(8 * 3600).expect("valid offset");
        let late_evening = pacific
            .with_ymd_and_hms(2024, 3, 5, 22, 30, 0)
            .single()
            .expect("valid timestamp");
        let application = ApplicationRecord {
            id: "a1".to_string(),
            job_title: "Engineer".to_string(),
            company: "Acme".to_string(),
            status: ApplicationStatus::Applied,
            applied_date: late_evening,
            interview_date: None,
            match_score: None,
        };
        assert_eq!(application.day(), day(2024, 3, 5));
    }

    #[test]
    fn interview_dates_become_extra_events() {
        let utc = FixedOffset::east_opt(0).expect("valid offset");
        let application = ApplicationRecord {
            id: "a1".to_string(),
            job_title: "Engineer".to_string(),
            company: "Acme".to_string(),
            status: ApplicationStatus::Interview,
            applied_date: utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
            interview_date: Some(utc.with_ymd_and_hms(2024, 3, 8, 15, 0, 0).unwrap()),
            match_score: Some(72.0),
        };
        let events = events_from_applications(&[application]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].id, "a1-interview");
        assert_eq!(events[1].status.as_deref(), Some("Interview"));
        assert_eq!(events[1].day(), day(2024, 3, 8));
    }
}
