//! Range selection driven by pointer drags, discrete clicks and Shift+arrow
//! keys.
//!
//! Input reaches the engine through an [`InputPort`] that the widget
//! subscribes to while it is active. Every change the engine reports is
//! normalized (`start <= end`) and written to the preference store.

use std::collections::VecDeque;

use chrono::{Duration, NaiveDate};
use log::debug;

use crate::domain::DateRange;
use crate::prefs::PreferenceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowKey {
    Left,
    Right,
    Up,
    Down,
}

impl ArrowKey {
    pub fn day_delta(self) -> i64 {
        match self {
            ArrowKey::Left => -1,
            ArrowKey::Right => 1,
            ArrowKey::Up => -7,
            ArrowKey::Down => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    PointerDown(NaiveDate),
    PointerEnter(NaiveDate),
    /// Released anywhere, not necessarily over a day.
    PointerUp,
    Click(NaiveDate),
    Arrow { key: ArrowKey, shift: bool },
}

/// What the consumer should be told after an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeChange {
    Cleared,
    Selected(DateRange),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeSelection {
    range_start: Option<NaiveDate>,
    range_end: Option<NaiveDate>,
    dragging: bool,
}

impl RangeSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn anchor(&self) -> Option<NaiveDate> {
        self.range_start
    }

    /// The completed range, normalized.
    pub fn range(&self) -> Option<DateRange> {
        match (self.range_start, self.range_end) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)),
            _ => None,
        }
    }

    fn is_complete(&self) -> bool {
        self.range_start.is_some() && self.range_end.is_some()
    }

    pub fn clear(&mut self) -> RangeChange {
        self.range_start = None;
        self.range_end = None;
        self.dragging = false;
        RangeChange::Cleared
    }

    /// Restores a persisted range, if one is present and well formed.
    pub fn restore(&mut self, store: &PreferenceStore) -> Option<RangeChange> {
        let range = store.last_range()?;
        self.range_start = Some(range.start);
        self.range_end = Some(range.end);
        self.dragging = false;
        debug!(
            "event=range_restored start={} end={}",
            range.start, range.end
        );
        Some(RangeChange::Selected(range))
    }

    pub fn handle(
        &mut self,
        event: InputEvent,
        today: NaiveDate,
        store: &mut PreferenceStore,
    ) -> Option<RangeChange> {
        match event {
            InputEvent::PointerDown(date) => self.pointer_down(date, store),
            InputEvent::PointerEnter(date) => self.pointer_enter(date, store),
            InputEvent::PointerUp => {
                self.dragging = false;
                None
            }
            InputEvent::Click(date) => Some(self.click(date, store)),
            InputEvent::Arrow { key, shift } => {
                if shift {
                    Some(self.extend(key, today, store))
                } else {
                    None
                }
            }
        }
    }

    fn pointer_down(&mut self, date: NaiveDate, store: &mut PreferenceStore) -> Option<RangeChange> {
        self.dragging = true;
        if self.range_start.is_none() || self.is_complete() {
            self.range_start = Some(date);
            self.range_end = None;
            return Some(RangeChange::Cleared);
        }

        // A pending anchor from a discrete click: pressing completes it and
        // keeps the drag alive so the end can still move.
        Some(self.set_end(date, store))
    }

    fn pointer_enter(&mut self, date: NaiveDate, store: &mut PreferenceStore) -> Option<RangeChange> {
        if !self.dragging || self.range_start.is_none() {
            return None;
        }
        if self.range_end == Some(date) {
            return None;
        }
        Some(self.set_end(date, store))
    }

    fn click(&mut self, date: NaiveDate, store: &mut PreferenceStore) -> RangeChange {
        if self.range_start.is_none() || self.is_complete() {
            self.range_start = Some(date);
            self.range_end = None;
            self.dragging = false;
            return RangeChange::Cleared;
        }
        self.set_end(date, store)
    }

    fn extend(&mut self, key: ArrowKey, today: NaiveDate, store: &mut PreferenceStore) -> RangeChange {
        let from = self.range_end.or(self.range_start).unwrap_or(today);
        if self.range_start.is_none() {
            self.range_start = Some(from);
        }
        self.set_end(from + Duration::days(key.day_delta()), store)
    }

    fn set_end(&mut self, date: NaiveDate, store: &mut PreferenceStore) -> RangeChange {
        self.range_end = Some(date);
        let start = self.range_start.unwrap_or(date);
        let range = DateRange::new(start, date);
        store.save_last_range(&range);
        debug!(
            "event=range_changed start={} end={}",
            range.start, range.end
        );
        RangeChange::Selected(range)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Source of pointer and keyboard input for the widget.
pub trait InputPort {
    fn subscribe(&mut self) -> SubscriptionId;
    fn unsubscribe(&mut self, id: SubscriptionId);
    /// Next pending event for `id`; `None` once drained or unsubscribed.
    fn poll(&mut self, id: SubscriptionId) -> Option<InputEvent>;
}

/// In-process port: the host dispatches events, subscribers drain them.
/// Events dispatched while nobody is subscribed are dropped.
#[derive(Debug, Default)]
pub struct QueuedInputPort {
    next_id: u64,
    queues: Vec<(SubscriptionId, VecDeque<InputEvent>)>,
}

impl QueuedInputPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&mut self, event: InputEvent) {
        for (_, queue) in &mut self.queues {
            queue.push_back(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.queues.len()
    }
}

impl InputPort for QueuedInputPort {
    fn subscribe(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.queues.push((id, VecDeque::new()));
        id
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.queues.retain(|(subscriber, _)| *subscriber != id);
    }

    fn poll(&mut self, id: SubscriptionId) -> Option<InputEvent> {
        self.queues
            .iter_mut()
            .find(|(subscriber, _)| *subscriber == id)
            .and_then(|(_, queue)| queue.pop_front())
    }
}

/// Ties the selection engine to a port for the widget's lifetime.
#[derive(Debug)]
pub struct SelectionSession {
    selection: RangeSelection,
    subscription: Option<SubscriptionId>,
}

impl SelectionSession {
    /// Subscribes to `port` and re-emits any persisted range.
    pub fn attach(port: &mut dyn InputPort, store: &PreferenceStore) -> (Self, Option<RangeChange>) {
        let mut selection = RangeSelection::new();
        let restored = selection.restore(store);
        let session = Self {
            selection,
            subscription: Some(port.subscribe()),
        };
        (session, restored)
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn selection(&self) -> &RangeSelection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut RangeSelection {
        &mut self.selection
    }

    /// Drains pending input and returns every change, oldest first.
    pub fn pump(
        &mut self,
        port: &mut dyn InputPort,
        today: NaiveDate,
        store: &mut PreferenceStore,
    ) -> Vec<RangeChange> {
        let Some(id) = self.subscription else {
            return Vec::new();
        };
        let mut changes = Vec::new();
        while let Some(event) = port.poll(id) {
            if let Some(change) = self.selection.handle(event, today, store) {
                changes.push(change);
            }
        }
        changes
    }

    pub fn detach(&mut self, port: &mut dyn InputPort) {
        if let Some(id) = self.subscription.take() {
            port.unsubscribe(id);
        }
    }
}
