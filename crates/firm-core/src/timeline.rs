use crate::{TimelineEntry, TimelineEvent};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

pub const TIMELINE_CAPACITY: usize = 50;

/// Newest-first feed of timeline entries, capped at a fixed size.
#[derive(Debug, Clone)]
pub struct TimelineBuffer {
    entries: VecDeque<TimelineEntry>,
    capacity: usize,
    next_id: u64,
}

impl Default for TimelineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelineBuffer {
    pub fn new() -> Self {
        Self::with_capacity(TIMELINE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 0,
        }
    }

    /// Mints ids for a batch created at `at`: millisecond stamp plus position
    /// in the batch, never below the last id handed out.
    pub fn mint(&mut self, batch: Vec<TimelineEvent>, at: DateTime<Utc>) -> Vec<TimelineEntry> {
        let stamp = u64::try_from(at.timestamp_millis()).unwrap_or(0);
        let base = stamp.max(self.next_id);
        self.next_id = base + batch.len() as u64;
        batch
            .into_iter()
            .enumerate()
            .map(|(index, event)| TimelineEntry::mint(base + index as u64, event))
            .collect()
    }

    /// Prepends `batch` keeping its order, then drops the oldest entries past capacity.
    pub fn push(&mut self, batch: Vec<TimelineEntry>) {
        for entry in batch.into_iter().rev() {
            self.entries.push_front(entry);
        }
        self.entries.truncate(self.capacity);
    }

    pub fn record(&mut self, batch: Vec<TimelineEvent>, at: DateTime<Utc>) -> usize {
        let count = batch.len();
        if count == 0 {
            return 0;
        }
        let entries = self.mint(batch, at);
        self.push(entries);
        count
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimelineEntry> {
        self.entries.iter()
    }

    pub fn newest(&self) -> Option<&TimelineEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
