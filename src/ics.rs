//! iCalendar (RFC 5545 subset) export.
//!
//! Only commas and semicolons are escaped in free text. Backslashes and line
//! breaks inside titles are written as-is, which some importers reject.

use chrono::{Datelike, NaiveDate, Utc};
use log::info;

use crate::domain::{CalendarEvent, DateRange, Dated, StatusFilter};
use crate::grid::first_day_of_month;

const CRLF: &str = "\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcsOptions {
    /// Product name written into `PRODID`.
    pub product: String,
    /// Domain-like suffix appended to every `UID`.
    pub namespace: String,
}

impl Default for IcsOptions {
    fn default() -> Self {
        Self {
            product: "PipelineCalendar".to_string(),
            namespace: "pipeline-calendar".to_string(),
        }
    }
}

/// What an export covers: the focal month, or the active range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    Month(NaiveDate),
    Range(DateRange),
}

impl ExportScope {
    /// Range wins over month when one is active.
    pub fn pick(focal_month: NaiveDate, range: Option<DateRange>) -> Self {
        match range {
            Some(range) => ExportScope::Range(range),
            None => ExportScope::Month(first_day_of_month(focal_month)),
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        match self {
            ExportScope::Month(month) => day.year() == month.year() && day.month() == month.month(),
            ExportScope::Range(range) => range.contains(day),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExportScope::Month(_) => "month",
            ExportScope::Range(_) => "range",
        }
    }
}

/// Events inside `scope` that pass `filter`, in date order.
pub fn scoped_events<'a>(
    events: &'a [CalendarEvent],
    scope: ExportScope,
    filter: &StatusFilter,
) -> Vec<&'a CalendarEvent> {
    let mut selected = events
        .iter()
        .filter(|event| filter.matches(event.status.as_deref()))
        .filter(|event| scope.contains(event.day()))
        .collect::<Vec<_>>();
    selected.sort_by(|left, right| left.date.cmp(&right.date).then_with(|| left.id.cmp(&right.id)));
    selected
}

pub fn export_ics<'a>(
    events: impl IntoIterator<Item = &'a CalendarEvent>,
    options: &IcsOptions,
) -> String {
    let mut out = String::new();
    push_line(&mut out, "BEGIN:VCALENDAR");
    push_line(&mut out, "VERSION:2.0");
    push_line(&mut out, &format!("PRODID:-//{}//Calendar//EN", options.product));

    for event in events {
        let stamp = event
            .date
            .with_timezone(&Utc)
            .format("%Y%m%dT%H%M%SZ")
            .to_string();
        push_line(&mut out, "BEGIN:VEVENT");
        push_line(&mut out, &format!("UID:{}@{}", event.id, options.namespace));
        push_line(&mut out, &format!("DTSTAMP:{stamp}"));
        push_line(&mut out, &format!("DTSTART:{stamp}"));
        push_line(&mut out, &format!("DTEND:{stamp}"));
        push_line(&mut out, &format!("SUMMARY:{}", escape_text(&event.title)));
        if let Some(subtitle) = &event.subtitle {
            push_line(&mut out, &format!("DESCRIPTION:{}", escape_text(subtitle)));
        }
        push_line(&mut out, "END:VEVENT");
    }

    push_line(&mut out, "END:VCALENDAR");
    out
}

/// Scopes, filters and serializes in one step; returns the file name and body.
pub fn export_scope(
    events: &[CalendarEvent],
    scope: ExportScope,
    filter: &StatusFilter,
    prefix: &str,
    options: &IcsOptions,
) -> (String, String) {
    let selected = scoped_events(events, scope, filter);
    let body = export_ics(selected.iter().copied(), options);
    info!(
        "event=ics_exported scope={} events={}",
        scope.label(),
        selected.len()
    );
    (ics_file_name(prefix, scope), body)
}

pub fn ics_file_name(prefix: &str, scope: ExportScope) -> String {
    match scope {
        ExportScope::Month(month) => format!("{prefix}-{}-month.ics", month.format("%Y-%m")),
        ExportScope::Range(range) => format!(
            "{prefix}-{}_{}-range.ics",
            range.start.format("%Y%m%d"),
            range.end.format("%Y%m%d")
        ),
    }
}

pub fn escape_text(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == ',' || ch == ';' {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push_str(CRLF);
}
