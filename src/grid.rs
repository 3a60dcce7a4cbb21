//! Month and week grids of day cells.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::DateRange;

/// Cells in a month grid: six weeks, always.
pub const MONTH_GRID_CELLS: usize = 42;
pub const WEEK_GRID_CELLS: usize = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

impl WeekStart {
    /// 0 for Sunday, 1 for Monday.
    pub fn index(self) -> u32 {
        match self {
            WeekStart::Sunday => 0,
            WeekStart::Monday => 1,
        }
    }

    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(WeekStart::Sunday),
            1 => Some(WeekStart::Monday),
            _ => None,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "0" | "sun" | "sunday" => Some(WeekStart::Sunday),
            "1" | "mon" | "monday" => Some(WeekStart::Monday),
            _ => None,
        }
    }

    /// Two-letter weekday labels in display order.
    pub fn weekday_labels(self) -> [&'static str; 7] {
        match self {
            WeekStart::Sunday => ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"],
            WeekStart::Monday => ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Month,
    Week,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCell {
    pub date: NaiveDate,
    pub in_current_month: bool,
}

/// 42 cells covering the month of `reference`, padded with the tail of the
/// previous month and the head of the next one.
pub fn month_grid(reference: NaiveDate, week_start: WeekStart) -> Vec<DayCell> {
    let first = first_day_of_month(reference);
    let first_weekday = first.weekday().num_days_from_sunday();
    let offset = (first_weekday + 7 - week_start.index()) % 7;
    let grid_start = first - Duration::days(offset.into());

    (0..MONTH_GRID_CELLS as i64)
        .map(|index| {
            let date = grid_start + Duration::days(index);
            DayCell {
                date,
                in_current_month: date.year() == first.year() && date.month() == first.month(),
            }
        })
        .collect()
}

/// Seven consecutive cells for the week containing `selected`.
///
/// `in_current_month` is relative to the month of `reference`.
pub fn week_grid(reference: NaiveDate, selected: NaiveDate, week_start: WeekStart) -> Vec<DayCell> {
    let start = start_of_week(selected, week_start);
    (0..WEEK_GRID_CELLS as i64)
        .map(|index| {
            let date = start + Duration::days(index);
            DayCell {
                date,
                in_current_month: date.year() == reference.year()
                    && date.month() == reference.month(),
            }
        })
        .collect()
}

pub fn build_grid(
    reference: NaiveDate,
    selected: NaiveDate,
    view_mode: ViewMode,
    week_start: WeekStart,
) -> Vec<DayCell> {
    match view_mode {
        ViewMode::Month => month_grid(reference, week_start),
        ViewMode::Week => week_grid(reference, selected, week_start),
    }
}

pub fn first_day_of_month(day: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(day.year(), day.month(), 1).expect("first day of month must be valid")
}

pub fn start_of_week(day: NaiveDate, week_start: WeekStart) -> NaiveDate {
    let weekday = day.weekday().num_days_from_sunday();
    let back = (weekday + 7 - week_start.index()) % 7;
    day - Duration::days(back.into())
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).expect("next year date should be valid")
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).expect("next month date should be valid")
    };
    (first_of_next - Duration::days(1)).day()
}

/// First through last day of the month containing `day`.
pub fn month_range(day: NaiveDate) -> DateRange {
    let first = first_day_of_month(day);
    let last = first + Duration::days(i64::from(days_in_month(first.year(), first.month())) - 1);
    DateRange::new(first, last)
}

/// Moves `day` by whole months, clamping the day-of-month.
pub fn shift_month(day: NaiveDate, delta: i32) -> NaiveDate {
    let mut year = day.year();
    let mut month = day.month() as i32 + delta;
    while month > 12 {
        year += 1;
        month -= 12;
    }
    while month < 1 {
        year -= 1;
        month += 12;
    }
    let month_u32 = month as u32;
    let max_day = days_in_month(year, month_u32);
    let target_day = day.day().min(max_day);
    NaiveDate::from_ymd_opt(year, month_u32, target_day).expect("shifted month date must be valid")
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate, Weekday};

    use super::{
        MONTH_GRID_CELLS, ViewMode, WeekStart, build_grid, month_grid, month_range, shift_month,
        start_of_week, week_grid,
    };

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn month_and_week_grids_have_fixed_sizes() {
        for year in [2023, 2024, 2025] {
            for month in 1..=12 {
                for week_start in [WeekStart::Sunday, WeekStart::Monday] {
                    let reference = day(year, month, 15);
                    let month_cells = build_grid(reference, reference, ViewMode::Month, week_start);
                    assert_eq!(month_cells.len(), MONTH_GRID_CELLS);
                    let week_cells = build_grid(reference, reference, ViewMode::Week, week_start);
                    assert_eq!(week_cells.len(), 7);

                    let first_cell = month_cells[0].date;
                    let expected = if week_start == WeekStart::Monday {
                        Weekday::Mon
                    } else {
                        Weekday::Sun
                    };
                    assert_eq!(first_cell.weekday(), expected);
                    assert!(month_cells.iter().any(|cell| cell.date == day(year, month, 1)));
                }
            }
        }
    }

    #[test]
    fn january_2024_monday_start_has_no_leading_padding() {
        let cells = month_grid(day(2024, 1, 20), WeekStart::Monday);
        assert_eq!(cells[0].date, day(2024, 1, 1));
        assert!(cells[0].in_current_month);
        assert_eq!(cells[31].date, day(2024, 2, 1));
        assert!(!cells[31].in_current_month);
    }

    #[test]
    fn sunday_start_pads_with_previous_month() {
        // 1 Jan 2024 is a Monday, so a Sunday grid starts on 31 Dec 2023.
        let cells = month_grid(day(2024, 1, 1), WeekStart::Sunday);
        assert_eq!(cells[0].date, day(2023, 12, 31));
        assert!(!cells[0].in_current_month);
        assert_eq!(cells[1].date, day(2024, 1, 1));
    }

    #[test]
    fn week_grid_respects_week_start() {
        // 6 Mar 2024 is a Wednesday.
        let selected = day(2024, 3, 6);
        let sunday = week_grid(selected, selected, WeekStart::Sunday);
        assert_eq!(sunday[0].date, day(2024, 3, 3));
        let monday = week_grid(selected, selected, WeekStart::Monday);
        assert_eq!(monday[0].date, day(2024, 3, 4));
        assert_eq!(monday[6].date, day(2024, 3, 10));
        assert_eq!(start_of_week(day(2024, 3, 3), WeekStart::Monday), day(2024, 2, 26));
    }

    #[test]
    fn shift_month_clamps_day() {
        assert_eq!(shift_month(day(2024, 1, 31), 1), day(2024, 2, 29));
        assert_eq!(shift_month(day(2024, 1, 15), -1), day(2023, 12, 15));
        assert_eq!(shift_month(day(2024, 11, 30), 14), day(2026, 1, 30));
    }

    #[test]
    fn month_range_covers_whole_month() {
        let range = month_range(day(2024, 2, 17));
        assert_eq!(range.start, day(2024, 2, 1));
        assert_eq!(range.end, day(2024, 2, 29));
        assert_eq!(range.len_days(), 29);
    }
}
