//! The surface a front-end drives: one week of one user's issues.

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::{RwLock, RwLockReadGuard};
use timebook_core::{TrackerConfig, ValidationError};
use timebook_tracker::{ErrorKind, Issue, IssueTracker};

use crate::coordinator::IssueSyncCoordinator;
use crate::error::SyncError;
use crate::hours::parse_hours;
use crate::ledger::WorklogLedger;
use crate::queue::{BookingRequest, EditQueue};
use crate::week::CalendarWeek;
use crate::worker::{BookingFailure, WorkerEvent, WorkerHandle, WorkerState, WorklogWorker};

/// Cells closer than this are the same value.
const HOURS_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct TimesheetSettings {
    /// Whose issues to show
    pub assignee: String,
    /// Only show work logs by this user
    pub author_filter: Option<String>,
    pub hours_per_story_point: f64,
}

impl TimesheetSettings {
    pub fn new(assignee: impl Into<String>) -> Self {
        Self {
            assignee: assignee.into(),
            author_filter: None,
            hours_per_story_point: 8.0,
        }
    }

    /// Settings for `login`, showing `assignee`'s issues (defaults to `login`).
    pub fn from_config(config: &TrackerConfig, login: &str, assignee: Option<&str>) -> Self {
        Self {
            assignee: assignee.unwrap_or(login).to_string(),
            author_filter: config.only_own_worklogs.then(|| login.to_string()),
            hours_per_story_point: config.hours_per_story_point,
        }
    }
}

/// Result of a cell edit that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum CellEdit {
    Queued(BookingRequest),
    /// Same value as before; nothing sent
    Unchanged,
}

/// What happened between the last poll and shutdown.
#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownReport {
    pub processed: usize,
    pub failed: usize,
    pub events: Vec<WorkerEvent>,
}

pub struct Timesheet<T: IssueTracker> {
    runtime: tokio::runtime::Runtime,
    coordinator: IssueSyncCoordinator<T>,
    settings: TimesheetSettings,
    queue: EditQueue,
    events: Receiver<WorkerEvent>,
    worker: Option<WorkerHandle>,
    ledger: Arc<RwLock<WorklogLedger>>,
    issues: Vec<Issue>,
    today: NaiveDate,
    week: CalendarWeek,
    last_refresh: Option<DateTime<Utc>>,
}

impl<T: IssueTracker> Timesheet<T> {
    /// Spawn the worker and return an empty timesheet for the week of `today`.
    /// Call [`Timesheet::refresh`] to load issues.
    pub fn start(
        tracker: Arc<T>,
        settings: TimesheetSettings,
        today: NaiveDate,
    ) -> Result<Self, SyncError> {
        // Multi-threaded so pooled connections stay driven between refreshes;
        // the worker shares them.
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("timebook-sync")
            .enable_all()
            .build()?;

        let mut coordinator = IssueSyncCoordinator::new(Arc::clone(&tracker));
        if let Some(author) = &settings.author_filter {
            coordinator = coordinator.only_authored_by(author.clone());
        }

        let (queue, receiver) = EditQueue::new();
        let (events_tx, events) = mpsc::channel();
        let worker = WorklogWorker::spawn(tracker, receiver, events_tx)?;

        tracing::info!("Timesheet started for {}", settings.assignee);

        Ok(Self {
            runtime,
            coordinator,
            settings,
            queue,
            events,
            worker: Some(worker),
            ledger: Arc::new(RwLock::new(WorklogLedger::new())),
            issues: Vec::new(),
            today,
            week: CalendarWeek::containing(today),
            last_refresh: None,
        })
    }

    /// Reload issues and work logs. On failure the current data is kept.
    pub fn refresh(&mut self) -> Result<(), SyncError> {
        let snapshot = self
            .runtime
            .block_on(self.coordinator.refresh(&self.settings.assignee))?;

        let mut fresh = snapshot.ledger;
        let mut ledger = self.ledger.write();
        fresh.carry_pending(&ledger);
        *ledger = fresh;
        drop(ledger);

        self.issues = snapshot.issues;
        self.last_refresh = Some(snapshot.fetched_at);
        Ok(())
    }

    pub fn week(&self) -> &CalendarWeek {
        &self.week
    }

    /// Move `delta` weeks from the one shown.
    pub fn navigate(&mut self, delta: i64) -> &CalendarWeek {
        self.week = CalendarWeek::for_offset(self.today, self.week.offset().saturating_add(delta));
        &self.week
    }

    pub fn today_week(&mut self) -> &CalendarWeek {
        self.week = CalendarWeek::containing(self.today);
        &self.week
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn ledger(&self) -> RwLockReadGuard<'_, WorklogLedger> {
        self.ledger.read()
    }

    pub fn shared_ledger(&self) -> Arc<RwLock<WorklogLedger>> {
        Arc::clone(&self.ledger)
    }

    pub fn settings(&self) -> &TimesheetSettings {
        &self.settings
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    pub fn worker_state(&self) -> WorkerState {
        self.worker
            .as_ref()
            .map_or(WorkerState::Stopped, WorkerHandle::state)
    }

    /// Hours logged on an issue, all weeks.
    pub fn row_total(&self, key: &str) -> f64 {
        self.ledger.read().total_for(key)
    }

    /// Hours logged on an issue in the displayed week.
    pub fn week_total(&self, key: &str) -> f64 {
        self.ledger.read().total_for_week(key, &self.week)
    }

    pub fn estimated_hours(&self, issue: &Issue) -> Option<f64> {
        issue.estimated_hours(self.settings.hours_per_story_point)
    }

    /// Set a cell of the displayed week from user input and queue the booking.
    ///
    /// `row` indexes [`Timesheet::issues`], `day` the week (0 = Monday).
    pub fn edit_cell(&mut self, row: usize, day: usize, text: &str) -> Result<CellEdit, SyncError> {
        let hours = parse_hours(text)?;
        let issue = self
            .issues
            .get(row)
            .ok_or(ValidationError::NoSuchCell { row, day })?;
        let date = self
            .week
            .day(day)
            .ok_or(ValidationError::NoSuchCell { row, day })?;

        let mut ledger = self.ledger.write();
        if let Some(entry) = ledger.entry(&issue.key, date) {
            // A failed cell is sent again even when the value is the same
            if !entry.failed && (entry.hours - hours).abs() < HOURS_EPSILON {
                return Ok(CellEdit::Unchanged);
            }
        }
        let entry = ledger.begin_booking(&issue.key, date, hours)?;
        let request = BookingRequest {
            issue: issue.issue_ref(),
            date,
            hours,
            existing_handle: entry.handle.clone(),
        };

        if let Err(e) = self.queue.enqueue(request.clone()) {
            ledger.apply(&WorkerEvent::Failed {
                request,
                error: BookingFailure {
                    kind: ErrorKind::Transport,
                    message: e.to_string(),
                },
            });
            return Err(e.into());
        }
        Ok(CellEdit::Queued(request))
    }

    /// Apply whatever the worker has reported so far and return it.
    pub fn poll_events(&mut self) -> Vec<WorkerEvent> {
        let events: Vec<WorkerEvent> = self.events.try_iter().collect();
        if !events.is_empty() {
            let mut ledger = self.ledger.write();
            for event in &events {
                ledger.apply(event);
            }
        }
        events
    }

    /// Finish every queued booking, stop the worker and apply the results.
    pub fn shutdown(mut self) -> Result<ShutdownReport, SyncError> {
        if self.queue.shutdown().is_err() {
            tracing::warn!("Worker already gone at shutdown");
        }
        if let Some(worker) = self.worker.take() {
            worker.join()?;
        }

        let events = self.poll_events();
        let (processed, failed) = events
            .iter()
            .find_map(|event| match event {
                WorkerEvent::Stopped { processed, failed } => Some((*processed, *failed)),
                _ => None,
            })
            .unwrap_or_default();

        tracing::info!("Timesheet shut down: {} bookings, {} failed", processed, failed);
        Ok(ShutdownReport {
            processed,
            failed,
            events,
        })
    }
}

impl<T: IssueTracker> Drop for Timesheet<T> {
    /// Dropping without [`Timesheet::shutdown`] still drains the queue.
    fn drop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        tracing::warn!("Timesheet dropped without shutdown, finishing queued bookings");
        if self.queue.shutdown().is_err() {
            tracing::debug!("Worker already gone");
        }
        if let Err(e) = worker.join() {
            tracing::error!("Worker did not stop cleanly: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use timebook_tracker::{InMemoryTracker, IssueStatus};

    fn wed() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
    }

    fn timesheet() -> (Arc<InMemoryTracker>, Timesheet<InMemoryTracker>) {
        let tracker = InMemoryTracker::new("alice");
        tracker.add_issue(
            "alice",
            Issue {
                id: "10001".into(),
                key: "ABC-1".into(),
                summary: "Thing".into(),
                status: IssueStatus::Open,
                story_points: Some(2.0),
            },
        );
        let tracker = Arc::new(tracker);
        let mut sheet =
            Timesheet::start(Arc::clone(&tracker), TimesheetSettings::new("alice"), wed()).unwrap();
        sheet.refresh().unwrap();
        (tracker, sheet)
    }

    #[test]
    fn test_invalid_input_is_not_queued() {
        let (tracker, mut sheet) = timesheet();

        assert!(matches!(
            sheet.edit_cell(0, 2, "abc"),
            Err(SyncError::Validation(ValidationError::NotANumber(_)))
        ));
        assert!(matches!(
            sheet.edit_cell(5, 2, "4"),
            Err(SyncError::Validation(ValidationError::NoSuchCell { row: 5, day: 2 }))
        ));
        assert!(matches!(
            sheet.edit_cell(0, 7, "4"),
            Err(SyncError::Validation(ValidationError::NoSuchCell { .. }))
        ));

        let report = sheet.shutdown().unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(tracker.create_count(), 0);
    }

    #[test]
    fn test_same_value_is_unchanged() {
        let (_tracker, mut sheet) = timesheet();

        assert!(matches!(sheet.edit_cell(0, 2, "4").unwrap(), CellEdit::Queued(_)));
        assert_eq!(sheet.edit_cell(0, 2, "4.0").unwrap(), CellEdit::Unchanged);

        let report = sheet.shutdown().unwrap();
        assert_eq!(report.processed, 1);
    }

    #[test]
    fn test_navigation() {
        let (_tracker, mut sheet) = timesheet();
        let monday = sheet.week().monday();

        sheet.navigate(-1);
        assert_eq!(sheet.week().offset(), -1);
        assert_eq!(sheet.week().monday(), monday - chrono::Duration::weeks(1));

        sheet.today_week();
        assert_eq!(sheet.week().monday(), monday);
        sheet.shutdown().unwrap();
    }

    #[test]
    fn test_estimate_uses_hours_per_point() {
        let (_tracker, sheet) = timesheet();
        assert_eq!(sheet.estimated_hours(&sheet.issues()[0]), Some(16.0));
        assert_eq!(sheet.worker_state(), WorkerState::Idle);
        sheet.shutdown().unwrap();
    }

    #[test]
    fn test_settings_from_config() {
        let config = TrackerConfig::default();
        let settings = TimesheetSettings::from_config(&config, "alice", Some("bob"));
        assert_eq!(settings.assignee, "bob");
        assert_eq!(settings.author_filter.as_deref(), Some("alice"));

        let settings = TimesheetSettings::from_config(&config, "alice", None);
        assert_eq!(settings.assignee, "alice");
    }
}
