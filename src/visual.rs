//! Renderer-agnostic description of how one grid cell should look.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::binder::{Titled, heat_ratio};
use crate::domain::{ApplicationStatus, DateRange, Dated};
use crate::grid::DayCell;
use crate::prefs::{DensityMode, ViewPreferences};

pub const HEAT_LEVELS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusTone {
    Grey,
    Green,
    Cyan,
    Gold,
    Red,
    LightGrey,
    Dim,
}

impl StatusTone {
    pub fn for_label(label: Option<&str>) -> Self {
        match label.and_then(ApplicationStatus::parse) {
            Some(ApplicationStatus::Pending) => StatusTone::Grey,
            Some(ApplicationStatus::Applied) => StatusTone::Green,
            Some(ApplicationStatus::Interview) => StatusTone::Cyan,
            Some(ApplicationStatus::Offer) => StatusTone::Gold,
            Some(ApplicationStatus::Rejected) => StatusTone::Red,
            Some(ApplicationStatus::Withdrawn) => StatusTone::LightGrey,
            None => StatusTone::Dim,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chip {
    pub label: String,
    pub tone: StatusTone,
}

/// Where the cell sits relative to the active range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeMark {
    #[default]
    Outside,
    Start,
    Middle,
    End,
    /// Start and end on the same day.
    Single,
}

impl RangeMark {
    pub fn of(day: NaiveDate, range: Option<DateRange>) -> Self {
        let Some(range) = range.map(DateRange::normalized) else {
            return RangeMark::Outside;
        };
        if !range.contains(day) {
            RangeMark::Outside
        } else if range.is_single_day() {
            RangeMark::Single
        } else if day == range.start {
            RangeMark::Start
        } else if day == range.end {
            RangeMark::End
        } else {
            RangeMark::Middle
        }
    }

    pub fn in_range(self) -> bool {
        self != RangeMark::Outside
    }
}

/// Per-render context shared by every cell.
#[derive(Debug, Clone, Copy)]
pub struct CellContext {
    pub today: NaiveDate,
    pub selected: Option<NaiveDate>,
    pub range: Option<DateRange>,
    /// Pending click anchor, shown before the range completes.
    pub anchor: Option<NaiveDate>,
    pub max_count: usize,
    pub max_visible: usize,
    pub prefs: ViewPreferences,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellVisual {
    pub date: NaiveDate,
    pub day_number: u32,
    pub in_current_month: bool,
    pub is_today: bool,
    pub is_selected: bool,
    pub is_anchor: bool,
    pub range: RangeMark,
    pub count: usize,
    pub heat: f64,
    /// `0` for empty days, otherwise `1..=HEAT_LEVELS`.
    pub heat_level: u8,
    pub chips: Vec<Chip>,
    pub overflow: usize,
    pub dimmed: bool,
    pub compact: bool,
}

impl CellVisual {
    pub fn overflow_label(&self) -> Option<String> {
        (self.overflow > 0).then(|| format!("+{} more", self.overflow))
    }
}

/// Compact density caps chips at one regardless of the configured limit.
pub fn visible_chip_limit(prefs: &ViewPreferences, max_visible: usize) -> usize {
    match prefs.density_mode {
        DensityMode::Full => max_visible,
        DensityMode::Compact => max_visible.min(1),
    }
}

pub fn heat_level(ratio: f64) -> u8 {
    if ratio <= 0.0 {
        return 0;
    }
    ((ratio.min(1.0) * HEAT_LEVELS as f64).ceil() as u8).clamp(1, HEAT_LEVELS)
}

pub fn describe_cell<T: Dated + Titled>(cell: &DayCell, bucket: &[&T], context: &CellContext) -> CellVisual {
    let count = bucket.len();
    let heat = heat_ratio(count, context.max_count);
    let limit = visible_chip_limit(&context.prefs, context.max_visible);
    let chips = bucket
        .iter()
        .take(limit)
        .map(|item| Chip {
            label: item.title().to_string(),
            tone: StatusTone::for_label(item.status_label()),
        })
        .collect::<Vec<_>>();
    let range = RangeMark::of(cell.date, context.range);

    // Focus contrast fades everything outside an active range.
    let dimmed = !cell.in_current_month
        || (context.prefs.focus_contrast && context.range.is_some() && !range.in_range());

    CellVisual {
        date: cell.date,
        day_number: cell.date.day(),
        in_current_month: cell.in_current_month,
        is_today: cell.date == context.today,
        is_selected: context.selected == Some(cell.date),
        is_anchor: context.anchor == Some(cell.date),
        range,
        count,
        heat,
        heat_level: heat_level(heat),
        overflow: count.saturating_sub(chips.len()),
        chips,
        dimmed,
        compact: context.prefs.density_mode == DensityMode::Compact,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    use super::{CellContext, RangeMark, StatusTone, describe_cell, heat_level};
    use crate::domain::{CalendarEvent, DateRange};
    use crate::grid::DayCell;
    use crate::prefs::{DensityMode, ViewPreferences};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn event(id: &str, status: &str) -> CalendarEvent {
        let utc = FixedOffset::east_opt(0).expect("valid offset");
        CalendarEvent {
            id: id.to_string(),
            date: utc
                .with_ymd_and_hms(2024, 3, 5, 9, 0, 0)
                .single()
                .expect("valid timestamp"),
            title: format!("Role {id}"),
            subtitle: None,
            status: Some(status.to_string()),
        }
    }

    fn context() -> CellContext {
        CellContext {
            today: day(2024, 3, 5),
            selected: Some(day(2024, 3, 5)),
            range: None,
            anchor: None,
            max_count: 5,
            max_visible: 3,
            prefs: ViewPreferences::default(),
        }
    }

    #[test]
    fn chips_overflow_past_the_visible_limit() {
        let events = ["Applied", "Offer", "Rejected", "Interview", "Mystery"]
            .iter()
            .enumerate()
            .map(|(index, status)| event(&index.to_string(), status))
            .collect::<Vec<_>>();
        let bucket = events.iter().collect::<Vec<_>>();
        let cell = DayCell {
            date: day(2024, 3, 5),
            in_current_month: true,
        };

        let visual = describe_cell(&cell, &bucket, &context());
        assert_eq!(visual.chips.len(), 3);
        assert_eq!(visual.chips[1].tone, StatusTone::Gold);
        assert_eq!(visual.overflow, 2);
        assert_eq!(visual.overflow_label().as_deref(), Some("+2 more"));
        assert_eq!(visual.heat, 1.0);
        assert_eq!(visual.heat_level, 4);
        assert!(visual.is_today);
        assert!(visual.is_selected);
        assert!(!visual.dimmed);

        let mut compact = context();
        compact.prefs.density_mode = DensityMode::Compact;
        let visual = describe_cell(&cell, &bucket, &compact);
        assert_eq!(visual.chips.len(), 1);
        assert_eq!(visual.overflow, 4);
        assert!(visual.compact);
    }

    #[test]
    fn empty_cells_have_no_heat() {
        let bucket: Vec<&CalendarEvent> = Vec::new();
        let cell = DayCell {
            date: day(2024, 2, 28),
            in_current_month: false,
        };
        let mut ctx = context();
        ctx.max_count = 0;
        let visual = describe_cell(&cell, &bucket, &ctx);
        assert_eq!(visual.heat, 0.0);
        assert_eq!(visual.heat_level, 0);
        assert!(visual.dimmed);
        assert_eq!(visual.overflow_label(), None);
        assert_eq!(heat_level(0.2), 1);
        assert_eq!(heat_level(0.5), 2);
    }

    #[test]
    fn focus_contrast_dims_outside_the_range() {
        let bucket: Vec<&CalendarEvent> = Vec::new();
        let mut ctx = context();
        ctx.range = Some(DateRange::new(day(2024, 3, 4), day(2024, 3, 6)));
        ctx.prefs.focus_contrast = true;

        let inside = DayCell {
            date: day(2024, 3, 6),
            in_current_month: true,
        };
        let outside = DayCell {
            date: day(2024, 3, 10),
            in_current_month: true,
        };
        let inside = describe_cell(&inside, &bucket, &ctx);
        let outside = describe_cell(&outside, &bucket, &ctx);
        assert_eq!(inside.range, RangeMark::End);
        assert!(!inside.dimmed);
        assert!(outside.dimmed);

        ctx.prefs = ViewPreferences::default();
        let cell = DayCell {
            date: day(2024, 3, 10),
            in_current_month: true,
        };
        assert!(!describe_cell(&cell, &bucket, &ctx).dimmed);
    }

    #[test]
    fn range_marks_follow_bounds() {
        let range = Some(DateRange::new(day(2024, 3, 8), day(2024, 3, 4)));
        assert_eq!(RangeMark::of(day(2024, 3, 4), range), RangeMark::Start);
        assert_eq!(RangeMark::of(day(2024, 3, 6), range), RangeMark::Middle);
        assert_eq!(RangeMark::of(day(2024, 3, 8), range), RangeMark::End);
        assert_eq!(RangeMark::of(day(2024, 3, 9), range), RangeMark::Outside);
        assert_eq!(
            RangeMark::of(day(2024, 3, 9), Some(DateRange::single(day(2024, 3, 9)))),
            RangeMark::Single
        );
        assert_eq!(RangeMark::of(day(2024, 3, 9), None), RangeMark::Outside);
    }
}
