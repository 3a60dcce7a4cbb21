//! Secondary statistics and actions for a selected day or range.

use std::collections::BTreeMap;
use std::time::{Duration as StdDuration, Instant};

use chrono::{Duration, NaiveDate};
use csv::{QuoteStyle, WriterBuilder};
use log::{info, warn};
use serde::Serialize;

use crate::analytics::StatusCounts;
use crate::domain::{
    ApplicationPatch, ApplicationRecord, ApplicationStatus, DateRange, Dated, NewApplication,
    StatusFilter,
};
use crate::error::CalendarError;
use crate::prefs::PreferenceStore;

pub const TOP_COMPANY_LIMIT: usize = 5;
pub const DAY_TREND_DAYS: i64 = 7;
pub const RANGE_TREND_MAX_POINTS: i64 = 14;
pub const SUMMARY_LINE_LIMIT: usize = 50;
pub const COPY_FEEDBACK_TTL: StdDuration = StdDuration::from_secs(3);
pub const CSV_HEADER: &str = "job_title,company,status,applied_date,interview_date,match_score";

/// External "create/update application" collaborator.
pub trait ApplicationSink {
    fn create_application(&mut self, new: NewApplication) -> Result<ApplicationRecord, CalendarError>;
    fn update_application(&mut self, id: &str, patch: &ApplicationPatch) -> Result<(), CalendarError>;
}

/// System clipboard, or whatever the host uses instead.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<(), CalendarError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailScope {
    Day(NaiveDate),
    Range(DateRange),
}

impl DetailScope {
    pub fn contains(&self, day: NaiveDate) -> bool {
        match self {
            DetailScope::Day(selected) => *selected == day,
            DetailScope::Range(range) => range.contains(day),
        }
    }

    /// The selected day, or the first day of the range.
    pub fn start(&self) -> NaiveDate {
        match self {
            DetailScope::Day(day) => *day,
            DetailScope::Range(range) => range.start,
        }
    }

    pub fn label(&self) -> String {
        match self {
            DetailScope::Day(day) => day.format("%A, %d %B %Y").to_string(),
            DetailScope::Range(range) => format!(
                "{} to {}",
                range.start.format("%d %b %Y"),
                range.end.format("%d %b %Y")
            ),
        }
    }

    pub fn csv_file_name(&self, prefix: &str) -> String {
        match self {
            DetailScope::Day(day) => format!("{prefix}-{}.csv", day.format("%Y-%m-%d")),
            DetailScope::Range(range) => format!(
                "{prefix}-{}_{}.csv",
                range.start.format("%Y-%m-%d"),
                range.end.format("%Y-%m-%d")
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyCount {
    pub company: String,
    pub count: usize,
}

/// Most frequent companies, highest first; ties keep first-seen order.
pub fn top_companies<'a>(
    applications: impl IntoIterator<Item = &'a ApplicationRecord>,
    limit: usize,
) -> Vec<CompanyCount> {
    let mut ranking: Vec<CompanyCount> = Vec::new();
    for application in applications {
        let company = application.company.trim();
        if company.is_empty() {
            continue;
        }
        match ranking.iter_mut().find(|entry| entry.company == company) {
            Some(entry) => entry.count += 1,
            None => ranking.push(CompanyCount {
                company: company.to_string(),
                count: 1,
            }),
        }
    }
    // Stable sort keeps first-seen order among equal counts.
    ranking.sort_by(|left, right| right.count.cmp(&left.count));
    ranking.truncate(limit);
    ranking
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SparkPoint {
    pub day: NaiveDate,
    pub value: usize,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sparkline {
    pub points: Vec<SparkPoint>,
    pub max: usize,
}

impl Sparkline {
    /// Last seven days for a day scope; up to fourteen evenly spaced days
    /// for a range. Values count applications applied on each day.
    pub fn build<'a>(
        scope: DetailScope,
        applications: impl IntoIterator<Item = &'a ApplicationRecord>,
    ) -> Self {
        let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for application in applications {
            *per_day.entry(application.day()).or_insert(0) += 1;
        }

        let days = trend_days(scope);
        let values = days
            .iter()
            .map(|day| per_day.get(day).copied().unwrap_or(0))
            .collect::<Vec<_>>();
        let max = values.iter().copied().max().unwrap_or(0).max(1);
        let last_index = days.len().saturating_sub(1).max(1) as f64;

        let points = days
            .into_iter()
            .zip(values)
            .enumerate()
            .map(|(index, (day, value))| SparkPoint {
                day,
                value,
                x: index as f64 * 100.0 / last_index,
                y: 100.0 - (value as f64 / max as f64) * 100.0,
            })
            .collect();

        Self { points, max }
    }

    /// SVG-style path over a 100x100 box.
    pub fn path(&self) -> String {
        self.points
            .iter()
            .enumerate()
            .map(|(index, point)| {
                let command = if index == 0 { 'M' } else { 'L' };
                format!("{command}{},{}", trim_float(point.x), trim_float(point.y))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn values(&self) -> Vec<usize> {
        self.points.iter().map(|point| point.value).collect()
    }
}

fn trend_days(scope: DetailScope) -> Vec<NaiveDate> {
    match scope {
        DetailScope::Day(day) => (0..DAY_TREND_DAYS)
            .rev()
            .map(|back| day - Duration::days(back))
            .collect(),
        DetailScope::Range(range) => {
            let span = range.len_days() - 1;
            let count = range.len_days().min(RANGE_TREND_MAX_POINTS);
            if count <= 1 {
                return vec![range.start];
            }
            (0..count)
                .map(|index| {
                    let offset = (index as f64 * span as f64 / (count - 1) as f64).round() as i64;
                    range.start + Duration::days(offset)
                })
                .collect()
        }
    }
}

fn trim_float(value: f64) -> String {
    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text.is_empty() || text == "-" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

pub const SCORE_BUCKET_LABELS: [&str; 4] = ["0-24", "25-49", "50-74", "75-100"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreHistogram {
    pub buckets: [usize; 4],
    pub total: usize,
}

impl ScoreHistogram {
    pub fn build<'a>(applications: impl IntoIterator<Item = &'a ApplicationRecord>) -> Self {
        let mut histogram = Self::default();
        for application in applications {
            if let Some(score) = application.match_score {
                histogram.add(score);
            }
        }
        histogram
    }

    /// Out-of-range scores land in the nearest end bucket; NaN is skipped.
    pub fn add(&mut self, score: f64) {
        if score.is_nan() {
            return;
        }
        let index = if score < 25.0 {
            0
        } else if score < 50.0 {
            1
        } else if score < 75.0 {
            2
        } else {
            3
        };
        self.buckets[index] += 1;
        self.total += 1;
    }

    pub fn percentages(&self) -> [f64; 4] {
        let total = self.total.max(1) as f64;
        self.buckets.map(|count| count as f64 / total * 100.0)
    }
}

/// Everything the panel shows for one scope.
#[derive(Debug, Clone)]
pub struct DetailView<'a> {
    pub scope: DetailScope,
    /// In scope and passing the chip filter, by applied date.
    pub applications: Vec<&'a ApplicationRecord>,
    /// In scope, before the chip filter, so chips can show their counts.
    pub status_counts: StatusCounts,
    /// Interview timestamp inside the scope, whatever the current status.
    pub interviews: Vec<&'a ApplicationRecord>,
    pub top_companies: Vec<CompanyCount>,
    pub sparkline: Sparkline,
    pub histogram: ScoreHistogram,
}

impl<'a> DetailView<'a> {
    pub fn compute(scope: DetailScope, applications: &'a [ApplicationRecord], chips: &StatusFilter) -> Self {
        let in_scope = applications
            .iter()
            .filter(|application| scope.contains(application.day()))
            .collect::<Vec<_>>();
        let status_counts = StatusCounts::tally(in_scope.iter().copied());

        let mut visible = in_scope
            .into_iter()
            .filter(|application| chips.matches(application.status_label()))
            .collect::<Vec<_>>();
        visible.sort_by(|left, right| left.applied_date.cmp(&right.applied_date));

        let mut interviews = applications
            .iter()
            .filter(|application| {
                application
                    .interview_day()
                    .is_some_and(|day| scope.contains(day))
            })
            .collect::<Vec<_>>();
        interviews.sort_by(|left, right| left.interview_date.cmp(&right.interview_date));

        let sparkline = Sparkline::build(
            scope,
            applications
                .iter()
                .filter(|application| chips.matches(application.status_label())),
        );

        Self {
            scope,
            top_companies: top_companies(visible.iter().copied(), TOP_COMPANY_LIMIT),
            histogram: ScoreHistogram::build(visible.iter().copied()),
            applications: visible,
            status_counts,
            interviews,
            sparkline,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status_counts.total() == 0 && self.interviews.is_empty()
    }
}

/// Plain-text report: scope, totals, per-status counts and up to fifty
/// application lines.
pub fn summary_text(view: &DetailView<'_>) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Pipeline summary: {}", view.scope.label()));
    lines.push(format!("Applications: {}", view.applications.len()));
    lines.push(format!("Interviews: {}", view.interviews.len()));

    let known = view.status_counts.known();
    if !known.is_empty() {
        lines.push("By status:".to_string());
        for (status, count) in known {
            lines.push(format!("  {status}: {count}"));
        }
    }

    if !view.applications.is_empty() {
        lines.push("Applications:".to_string());
        for application in view.applications.iter().take(SUMMARY_LINE_LIMIT) {
            lines.push(format!(
                "  - {} @ {} [{}] {}",
                application.job_title,
                application.company,
                application.status,
                application.applied_date.format("%Y-%m-%d")
            ));
        }
        let hidden = view.applications.len().saturating_sub(SUMMARY_LINE_LIMIT);
        if hidden > 0 {
            lines.push(format!("  ... and {hidden} more"));
        }
    }

    lines.join("\n")
}

/// CSV with every field quoted and inner quotes doubled.
pub fn export_csv<'a>(
    applications: impl IntoIterator<Item = &'a ApplicationRecord>,
) -> Result<String, CalendarError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(Vec::new());

    let mut rows = 0usize;
    for application in applications {
        let applied_date = application.applied_date.to_rfc3339();
        let interview_date = application
            .interview_date
            .map(|date| date.to_rfc3339())
            .unwrap_or_default();
        let match_score = application
            .match_score
            .map(|score| score.to_string())
            .unwrap_or_default();
        writer.write_record([
            application.job_title.as_str(),
            application.company.as_str(),
            application.status.as_str(),
            applied_date.as_str(),
            interview_date.as_str(),
            match_score.as_str(),
        ])?;
        rows += 1;
    }

    let body = writer
        .into_inner()
        .map_err(|err| CalendarError::Io(err.into_error()))?;
    let body = String::from_utf8(body)
        .map_err(|err| CalendarError::Invalid(format!("csv output is not UTF-8: {err}")))?;
    info!("event=csv_exported rows={rows}");
    Ok(format!("{CSV_HEADER}\n{body}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyState {
    Idle,
    Copied,
    Failed,
}

/// Transient outcome of the last copy, reverting to idle after three seconds.
#[derive(Debug, Clone, Copy)]
pub struct CopyFeedback {
    state: CopyState,
    since: Option<Instant>,
}

impl Default for CopyFeedback {
    fn default() -> Self {
        Self {
            state: CopyState::Idle,
            since: None,
        }
    }
}

impl CopyFeedback {
    pub fn copy(&mut self, clipboard: &mut dyn Clipboard, text: &str, now: Instant) -> CopyState {
        self.state = match clipboard.write_text(text) {
            Ok(()) => CopyState::Copied,
            Err(err) => {
                warn!("event=copy_failed error={}", err);
                CopyState::Failed
            }
        };
        self.since = Some(now);
        self.state
    }

    pub fn state(&self, now: Instant) -> CopyState {
        match self.since {
            Some(since) if now.saturating_duration_since(since) < COPY_FEEDBACK_TTL => self.state,
            _ => CopyState::Idle,
        }
    }

    /// Drops an expired state; returns true when something changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.state != CopyState::Idle && self.state(now) == CopyState::Idle {
            self.state = CopyState::Idle;
            self.since = None;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone)]
pub struct QuickAddForm {
    pub job_title: String,
    pub company: String,
    pub status: ApplicationStatus,
    saving: bool,
}

impl Default for QuickAddForm {
    fn default() -> Self {
        Self {
            job_title: String::new(),
            company: String::new(),
            status: ApplicationStatus::Pending,
            saving: false,
        }
    }
}

impl QuickAddForm {
    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn can_submit(&self) -> bool {
        !self.saving && !self.job_title.trim().is_empty() && !self.company.trim().is_empty()
    }

    /// Marks the form as saving and returns the payload, or `None` while
    /// the form is incomplete or a save is already in flight.
    pub fn begin(&mut self, scope: DetailScope) -> Option<NewApplication> {
        if !self.can_submit() {
            return None;
        }
        self.saving = true;
        Some(NewApplication {
            job_title: self.job_title.trim().to_string(),
            company: self.company.trim().to_string(),
            status: self.status,
            applied_on: scope.start(),
        })
    }

    /// Clears the saving flag; a successful save also resets the inputs.
    pub fn finish<T>(&mut self, result: &Result<T, CalendarError>) {
        self.saving = false;
        if result.is_ok() {
            self.job_title.clear();
            self.company.clear();
            self.status = ApplicationStatus::Pending;
        }
    }

    pub fn submit(
        &mut self,
        scope: DetailScope,
        sink: &mut dyn ApplicationSink,
    ) -> Result<Option<ApplicationRecord>, CalendarError> {
        let Some(new) = self.begin(scope) else {
            return Ok(None);
        };
        let result = sink.create_application(new);
        self.finish(&result);
        match result {
            Ok(record) => {
                info!("event=quick_add status=ok id={}", record.id);
                Ok(Some(record))
            }
            Err(err) => {
                warn!("event=quick_add status=error error={}", err);
                Err(err)
            }
        }
    }
}

/// Moves an application to the next status in the vocabulary. Any
/// transition is allowed, including wrapping back to `Pending`.
pub fn cycle_status(
    application: &ApplicationRecord,
    sink: &mut dyn ApplicationSink,
) -> Result<ApplicationStatus, CalendarError> {
    let next = application.status.next();
    sink.update_application(&application.id, &ApplicationPatch::status(next))?;
    info!(
        "event=status_cycled id={} from={} to={}",
        application.id, application.status, next
    );
    Ok(next)
}

/// Toggles a chip and persists the chip set.
pub fn toggle_chip(chips: &mut StatusFilter, status: ApplicationStatus, store: &mut PreferenceStore) {
    chips.toggle(status);
    store.save_detail_filters(chips);
}
