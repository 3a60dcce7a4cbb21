//! Groups dated items into per-day buckets for the grid and the heatmap.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::{Dated, StatusFilter};
use crate::grid::DayCell;

/// Items bound to their calendar day, after status filtering.
#[derive(Debug, Clone)]
pub struct DayBuckets<'a, T> {
    buckets: BTreeMap<NaiveDate, Vec<&'a T>>,
}

impl<'a, T> Default for DayBuckets<'a, T> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
        }
    }
}

impl<'a, T: Dated + Titled> DayBuckets<'a, T> {
    /// Binds every item passing `filter` to exactly one day. Each bucket is
    /// ordered by status label, then title (byte order).
    pub fn bind(items: &'a [T], filter: &StatusFilter) -> Self {
        let mut buckets: BTreeMap<NaiveDate, Vec<&'a T>> = BTreeMap::new();
        for item in items {
            if !filter.matches(item.status_label()) {
                continue;
            }
            buckets.entry(item.day()).or_default().push(item);
        }

        for bucket in buckets.values_mut() {
            bucket.sort_by(|left, right| {
                let left_status = left.status_label().unwrap_or("");
                let right_status = right.status_label().unwrap_or("");
                left_status
                    .cmp(right_status)
                    .then_with(|| left.title().cmp(right.title()))
            });
        }

        Self { buckets }
    }
}

impl<'a, T> DayBuckets<'a, T> {
    pub fn get(&self, day: NaiveDate) -> &[&'a T] {
        self.buckets.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn count(&self, day: NaiveDate) -> usize {
        self.buckets.get(&day).map(Vec::len).unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.buckets.keys().copied()
    }

    /// Items whose day falls inside `[start, end]`, in day order.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = &'a T> + '_ {
        self.buckets
            .range(start..=end)
            .flat_map(|(_, bucket)| bucket.iter().copied())
    }

    /// Largest bucket among the visible cells.
    pub fn max_count_over(&self, cells: &[DayCell]) -> usize {
        cells
            .iter()
            .map(|cell| self.count(cell.date))
            .max()
            .unwrap_or(0)
    }

    pub fn heat_ratio(&self, day: NaiveDate, max_count: usize) -> f64 {
        heat_ratio(self.count(day), max_count)
    }
}

/// `min(1, count / max)` with the denominator guarded to at least one.
pub fn heat_ratio(count: usize, max_count: usize) -> f64 {
    let denominator = max_count.max(1) as f64;
    (count as f64 / denominator).min(1.0)
}

/// Text used as the secondary sort key inside a day bucket.
pub trait Titled {
    fn title(&self) -> &str;
}

impl Titled for crate::domain::CalendarEvent {
    fn title(&self) -> &str {
        &self.title
    }
}

impl Titled for crate::domain::ApplicationRecord {
    fn title(&self) -> &str {
        &self.job_title
    }
}
