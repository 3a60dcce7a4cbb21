//! Funnel counts and conversion ratios over a day range.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::{ApplicationStatus, DateRange, Dated, StatusFilter};

/// Occurrences per status, keyed by the lowercased label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    counts: BTreeMap<String, usize>,
    total: usize,
}

impl StatusCounts {
    pub fn tally<'a, T: Dated + 'a>(items: impl IntoIterator<Item = &'a T>) -> Self {
        let mut counts = Self::default();
        for item in items {
            counts.add(item.status_label());
        }
        counts
    }

    pub fn add(&mut self, label: Option<&str>) {
        let key = label.map(|value| value.trim().to_lowercase()).unwrap_or_default();
        *self.counts.entry(key).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn get(&self, status: ApplicationStatus) -> usize {
        self.get_label(status.as_str())
    }

    pub fn get_label(&self, label: &str) -> usize {
        self.counts
            .get(&label.trim().to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Known statuses in vocabulary order, skipping zero counts.
    pub fn known(&self) -> Vec<(ApplicationStatus, usize)> {
        ApplicationStatus::ALL
            .into_iter()
            .map(|status| (status, self.get(status)))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(label, count)| (label.as_str(), *count))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Funnel {
    /// Applied plus Pending. Withdrawn never enters the denominator.
    pub applied: usize,
    pub interview: usize,
    pub offer: usize,
    pub rejection: usize,
    pub applied_to_interview: f64,
    pub interview_to_offer: f64,
    pub applied_to_offer: f64,
}

impl Funnel {
    pub fn from_counts(counts: &StatusCounts) -> Self {
        let applied = counts.get(ApplicationStatus::Applied) + counts.get(ApplicationStatus::Pending);
        let interview = counts.get(ApplicationStatus::Interview);
        let offer = counts.get(ApplicationStatus::Offer);
        let rejection = counts.get(ApplicationStatus::Rejected);

        Self {
            applied,
            interview,
            offer,
            rejection,
            applied_to_interview: ratio(interview, applied),
            interview_to_offer: ratio(offer, interview),
            applied_to_offer: ratio(offer, applied),
        }
    }
}

/// `numerator / denominator`, or 0 when the denominator is 0.
pub fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeAnalytics {
    pub counts: StatusCounts,
    pub funnel: Funnel,
}

/// Restricts `items` to `filter` and the inclusive `range`, then tallies.
pub fn aggregate<T: Dated>(items: &[T], range: DateRange, filter: &StatusFilter) -> RangeAnalytics {
    let range = range.normalized();
    let counts = StatusCounts::tally(
        items
            .iter()
            .filter(|item| filter.matches(item.status_label()))
            .filter(|item| range.contains(item.day())),
    );
    let funnel = Funnel::from_counts(&counts);
    RangeAnalytics { counts, funnel }
}

/// Remembers the last aggregate for a `(range, filter)` pair.
///
/// The item list is not part of the key; hosts call [`FunnelMemo::invalidate`]
/// when it changes.
#[derive(Debug, Default)]
pub struct FunnelMemo {
    cached: Option<((DateRange, StatusFilter), RangeAnalytics)>,
}

impl FunnelMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Dated>(
        &mut self,
        items: &[T],
        range: DateRange,
        filter: &StatusFilter,
    ) -> &RangeAnalytics {
        let key = (range.normalized(), filter.clone());
        let entry = match self.cached.take() {
            Some((cached_key, analytics)) if cached_key == key => (cached_key, analytics),
            _ => {
                let analytics = aggregate(items, key.0, filter);
                (key, analytics)
            }
        };
        &self.cached.insert(entry).1
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    use super::{FunnelMemo, aggregate, ratio};
    use crate::domain::{ApplicationStatus, CalendarEvent, DateRange, StatusFilter};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn events(rows: &[(u32, &str, usize)]) -> Vec<CalendarEvent> {
        let utc = FixedOffset::east_opt(0).expect("valid offset");
        let mut out = Vec::new();
        for (d, status, count) in rows {
            for index in 0..*count {
                out.push(CalendarEvent {
                    id: format!("{d}-{status}-{index}"),
                    date: utc
                        .with_ymd_and_hms(2024, 3, *d, 10, 0, 0)
                        .single()
                        .expect("valid timestamp"),
                    title: format!("Role {index}"),
                    subtitle: None,
                    status: Some(status.to_string()),
                });
            }
        }
        out
    }

    #[test]
    fn funnel_ratios_match_counts() {
        let items = events(&[(4, "Applied", 10), (6, "Interview", 4), (8, "Offer", 1)]);
        let analytics = aggregate(
            &items,
            DateRange::new(day(2024, 3, 1), day(2024, 3, 31)),
            &StatusFilter::all(),
        );
        let funnel = analytics.funnel;
        assert_eq!(funnel.applied, 10);
        assert!((funnel.applied_to_interview - 0.4).abs() < 1e-9);
        assert!((funnel.interview_to_offer - 0.25).abs() < 1e-9);
        assert!((funnel.applied_to_offer - 0.1).abs() < 1e-9);
    }

    #[test]
    fn pending_counts_as_applied_and_withdrawn_does_not() {
        let items = events(&[(4, "pending", 2), (4, "APPLIED", 2), (5, "Withdrawn", 5), (5, "interview", 1)]);
        let analytics = aggregate(&items, DateRange::single(day(2024, 3, 4)), &StatusFilter::all());
        assert_eq!(analytics.funnel.applied, 4);
        assert_eq!(analytics.funnel.interview, 0);

        let analytics = aggregate(
            &items,
            DateRange::new(day(2024, 3, 4), day(2024, 3, 5)),
            &StatusFilter::all(),
        );
        assert_eq!(analytics.funnel.applied, 4);
        assert_eq!(analytics.counts.get(ApplicationStatus::Withdrawn), 5);
        assert!((analytics.funnel.applied_to_interview - 0.25).abs() < 1e-9);
    }

    #[test]
    fn zero_applied_never_divides() {
        let items = events(&[(4, "Interview", 3), (4, "Offer", 1)]);
        let analytics = aggregate(&items, DateRange::single(day(2024, 3, 4)), &StatusFilter::all());
        assert_eq!(analytics.funnel.applied, 0);
        assert_eq!(analytics.funnel.applied_to_interview, 0.0);
        assert_eq!(analytics.funnel.applied_to_offer, 0.0);
        assert!((analytics.funnel.interview_to_offer - 1.0 / 3.0).abs() < 1e-9);

        let empty: Vec<CalendarEvent> = Vec::new();
        let analytics = aggregate(&empty, DateRange::single(day(2024, 3, 4)), &StatusFilter::all());
        assert_eq!(analytics.counts.total(), 0);
        assert_eq!(analytics.funnel.interview_to_offer, 0.0);
        assert_eq!(ratio(0, 0), 0.0);
    }

    #[test]
    fn range_bounds_are_inclusive_and_filter_applies_first() {
        let items = events(&[(1, "Applied", 1), (2, "Applied", 1), (3, "Applied", 1), (3, "Offer", 2)]);
        let analytics = aggregate(
            &items,
            DateRange::new(day(2024, 3, 3), day(2024, 3, 2)),
            &StatusFilter::only([ApplicationStatus::Applied]),
        );
        assert_eq!(analytics.counts.total(), 2);
        assert_eq!(analytics.funnel.offer, 0);
    }

    #[test]
    fn memo_recomputes_only_on_new_inputs() {
        let items = events(&[(4, "Applied", 2)]);
        let mut memo = FunnelMemo::new();
        let range = DateRange::single(day(2024, 3, 4));
        assert_eq!(memo.get(&items, range, &StatusFilter::all()).funnel.applied, 2);

        let more = events(&[(4, "Applied", 5)]);
        // Same key: cached value is returned until invalidated.
        assert_eq!(memo.get(&more, range, &StatusFilter::all()).funnel.applied, 2);
        memo.invalidate();
        assert_eq!(memo.get(&more, range, &StatusFilter::all()).funnel.applied, 5);
        let offers = StatusFilter::only([ApplicationStatus::Offer]);
        assert_eq!(memo.get(&more, range, &offers).funnel.applied, 0);
    }
}
