//! Local record of hours per (issue, day) and the remote work log behind each.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use timebook_core::ValidationError;
use timebook_tracker::WorklogHandle;

use crate::week::CalendarWeek;
use crate::worker::{BookingOutcome, WorkerEvent};

/// One cell of the grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorklogEntry {
    pub hours: f64,
    pub handle: Option<WorklogHandle>,
    /// Bookings queued for this cell whose outcome has not come back
    pub pending: u32,
    /// The latest booking for this cell did not reach the tracker
    pub failed: bool,
}

impl WorklogEntry {
    /// Hours match what the tracker holds, as far as this session knows.
    pub fn is_confirmed(&self) -> bool {
        self.pending == 0 && !self.failed
    }
}

/// Hours keyed by issue key, then date.
///
/// Owned by the UI thread. Rebuilt from scratch on every refresh and updated
/// in place by cell edits and by worker events.
#[derive(Debug, Clone, Default)]
pub struct WorklogLedger {
    rows: HashMap<String, BTreeMap<NaiveDate, WorklogEntry>>,
}

fn check_hours(hours: f64) -> Result<(), ValidationError> {
    if hours.is_nan() {
        return Err(ValidationError::NotANumber(hours.to_string()));
    }
    if !hours.is_finite() || hours < 0.0 {
        return Err(ValidationError::OutOfRange {
            value: hours,
            min: 0.0,
            max: f64::MAX,
        });
    }
    Ok(())
}

impl WorklogLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cell's entry, or zero hours without a record.
    pub fn get(&self, key: &str, date: NaiveDate) -> WorklogEntry {
        self.entry(key, date).cloned().unwrap_or_default()
    }

    pub fn entry(&self, key: &str, date: NaiveDate) -> Option<&WorklogEntry> {
        self.rows.get(key).and_then(|row| row.get(&date))
    }

    /// Whether the cell has an entry at all. A 0 h entry counts.
    pub fn contains(&self, key: &str, date: NaiveDate) -> bool {
        self.entry(key, date).is_some()
    }

    pub fn set(
        &mut self,
        key: &str,
        date: NaiveDate,
        hours: f64,
        handle: Option<WorklogHandle>,
    ) -> Result<(), ValidationError> {
        check_hours(hours)?;
        self.rows
            .entry(key.to_string())
            .or_default()
            .insert(
                date,
                WorklogEntry {
                    hours,
                    handle,
                    ..WorklogEntry::default()
                },
            );
        Ok(())
    }

    /// Record a local edit that is about to be queued.
    pub fn begin_booking(
        &mut self,
        key: &str,
        date: NaiveDate,
        hours: f64,
    ) -> Result<&WorklogEntry, ValidationError> {
        check_hours(hours)?;
        let entry = self
            .rows
            .entry(key.to_string())
            .or_default()
            .entry(date)
            .or_default();
        entry.hours = hours;
        entry.pending += 1;
        entry.failed = false;
        Ok(entry)
    }

    /// Hours across every date of a row.
    pub fn total_for(&self, key: &str) -> f64 {
        self.rows
            .get(key)
            .map(|row| row.values().map(|e| e.hours).sum())
            .unwrap_or(0.0)
    }

    /// Hours across every row on one date.
    pub fn total_for_date(&self, date: NaiveDate) -> f64 {
        self.rows
            .values()
            .filter_map(|row| row.get(&date))
            .map(|e| e.hours)
            .sum()
    }

    /// Hours of a row within one week.
    pub fn total_for_week(&self, key: &str, week: &CalendarWeek) -> f64 {
        self.rows
            .get(key)
            .map(|row| {
                row.range(week.monday()..=week.sunday())
                    .map(|(_, e)| e.hours)
                    .sum()
            })
            .unwrap_or(0.0)
    }

    /// Fold a worker outcome in.
    ///
    /// While later edits of the cell are still queued its hours are left as
    /// typed; the last outcome for a cell sets the hours the tracker now
    /// holds. A cell the ledger lost in between (a refresh that ran before
    /// the booking landed) is seeded from the request.
    pub fn apply(&mut self, event: &WorkerEvent) {
        match event {
            WorkerEvent::Booked { request, outcome } => {
                let entry = self
                    .rows
                    .entry(request.issue.key.clone())
                    .or_default()
                    .entry(request.date)
                    .or_insert_with(|| WorklogEntry {
                        hours: request.hours,
                        pending: 1,
                        ..WorklogEntry::default()
                    });
                entry.pending = entry.pending.saturating_sub(1);
                entry.failed = false;
                if entry.pending == 0 {
                    entry.hours = request.hours;
                }

                match outcome {
                    BookingOutcome::Created(handle) | BookingOutcome::Updated(handle) => {
                        entry.handle = Some(handle.clone());
                    }
                    BookingOutcome::Deleted(handle) => {
                        if entry.handle.as_ref() == Some(handle) {
                            entry.handle = None;
                        }
                    }
                    BookingOutcome::Skipped => {}
                }
            }
            WorkerEvent::Failed { request, .. } => {
                if let Some(entry) = self
                    .rows
                    .get_mut(&request.issue.key)
                    .and_then(|row| row.get_mut(&request.date))
                {
                    entry.pending = entry.pending.saturating_sub(1);
                    entry.failed = true;
                }
            }
            WorkerEvent::Stopped { .. } => {}
        }
    }

    /// Take over the edits of `previous` that are still on their way to the
    /// tracker, so a rebuilt ledger does not lose them.
    pub fn carry_pending(&mut self, previous: &WorklogLedger) {
        for (key, row) in &previous.rows {
            for (date, old) in row.iter().filter(|(_, e)| e.pending > 0) {
                let entry = self
                    .rows
                    .entry(key.clone())
                    .or_default()
                    .entry(*date)
                    .or_default();
                entry.hours = old.hours;
                entry.pending = old.pending;
                entry.failed = old.failed;
                if entry.handle.is_none() {
                    entry.handle = old.handle.clone();
                }
            }
        }
    }

    /// Number of cells with an entry.
    pub fn len(&self) -> usize {
        self.rows.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
