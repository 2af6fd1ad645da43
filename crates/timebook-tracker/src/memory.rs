//! In-memory issue tracker.
//!
//! Backs `--demo` mode and the sync tests. Every call is recorded, and
//! failures can be scripted for the next read or write.

use std::collections::{HashMap, VecDeque};

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use parking_lot::Mutex;
use timebook_core::NetworkError;

use crate::error::TrackerError;
use crate::tracker::IssueTracker;
use crate::types::*;

/// Failure to inject on a later call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    Authentication,
    Transport,
}

impl ScriptedFailure {
    fn into_error(self) -> TrackerError {
        match self {
            Self::Authentication => TrackerError::Authentication { status: 401 },
            Self::Transport => TrackerError::Transport(NetworkError::ConnectionFailed(
                "scripted connection failure".into(),
            )),
        }
    }
}

/// A call made against the tracker, failed or not.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerCall {
    Myself,
    Search { assignee: String },
    ListWorklogs { issue_id: String },
    Create { issue_id: String, date: NaiveDate, hours: f64 },
    Update { handle: WorklogHandle, hours: f64 },
    Delete { handle: WorklogHandle },
}

#[derive(Default)]
struct State {
    user: TrackerUser,
    issues: Vec<(String, Issue)>,
    worklogs: HashMap<String, Vec<RemoteWorklog>>,
    next_worklog_id: u64,
    calls: Vec<TrackerCall>,
    read_failures: VecDeque<ScriptedFailure>,
    write_failures: VecDeque<ScriptedFailure>,
}

#[derive(Default)]
pub struct InMemoryTracker {
    state: Mutex<State>,
}

impl InMemoryTracker {
    pub fn new(username: &str) -> Self {
        let tracker = Self::default();
        tracker.state.lock().user = TrackerUser {
            name: Some(username.to_string()),
            display_name: Some(username.to_string()),
            ..TrackerUser::default()
        };
        tracker
    }

    /// A tracker seeded with a handful of issues and last week's bookings.
    pub fn demo(username: &str, today: NaiveDate) -> Self {
        let tracker = Self::new(username);
        let seed = [
            ("24033", "CEM200-24033", "Calibrate pressure sensors", "In Progress", Some(3.0)),
            ("24051", "CEM200-24051", "Release notes for 4.2", "Open", Some(1.0)),
            ("24102", "CEM200-24102", "Investigate flaky nightly build", "Open", None),
            ("23990", "CEM200-23990", "Migrate test rig", "Done", Some(5.0)),
            ("23871", "CEM200-23871", "Old dashboard", "Canceled", Some(2.0)),
        ];
        for (id, key, summary, status, points) in seed {
            tracker.add_issue(
                username,
                Issue {
                    id: id.to_string(),
                    key: key.to_string(),
                    summary: summary.to_string(),
                    status: IssueStatus::from_name(status),
                    story_points: points,
                },
            );
        }

        let week_start = today - chrono::Duration::days(7);
        tracker.add_worklog("24033", week_start, 4.0, username);
        tracker.add_worklog("24033", week_start + chrono::Duration::days(1), 6.5, username);
        tracker.add_worklog("24051", week_start + chrono::Duration::days(1), 1.5, username);
        tracker
    }

    /// Assign an issue to `assignee`.
    pub fn add_issue(&self, assignee: &str, issue: Issue) {
        self.state
            .lock()
            .issues
            .push((assignee.to_ascii_lowercase(), issue));
    }

    /// Record an existing work log, as if booked earlier. Returns its handle.
    pub fn add_worklog(&self, issue_id: &str, date: NaiveDate, hours: f64, author: &str) -> WorklogHandle {
        let mut state = self.state.lock();
        let author = TrackerUser {
            name: Some(author.to_string()),
            ..TrackerUser::default()
        };
        insert_worklog(&mut state, issue_id, date, NaiveTime::MIN, hours, Some(author))
    }

    pub fn calls(&self) -> Vec<TrackerCall> {
        self.state.lock().calls.clone()
    }

    /// Number of create calls attempted, successful or not.
    pub fn create_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, TrackerCall::Create { .. }))
            .count()
    }

    /// Work logs currently stored for an issue.
    pub fn worklogs(&self, issue_id: &str) -> Vec<RemoteWorklog> {
        self.state
            .lock()
            .worklogs
            .get(issue_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Hours stored for one issue and day, summed over records.
    pub fn hours_on(&self, issue_id: &str, date: NaiveDate) -> f64 {
        self.worklogs(issue_id)
            .iter()
            .filter(|w| w.date() == date)
            .map(RemoteWorklog::hours)
            .sum()
    }

    /// Fail the next create/update/delete.
    pub fn fail_next_write(&self, failure: ScriptedFailure) {
        self.state.lock().write_failures.push_back(failure);
    }

    /// Fail the next myself/search/list call.
    pub fn fail_next_read(&self, failure: ScriptedFailure) {
        self.state.lock().read_failures.push_back(failure);
    }

    fn begin_read(&self, call: TrackerCall) -> Result<parking_lot::MutexGuard<'_, State>, TrackerError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        match state.read_failures.pop_front() {
            Some(failure) => Err(failure.into_error()),
            None => Ok(state),
        }
    }

    fn begin_write(&self, call: TrackerCall) -> Result<parking_lot::MutexGuard<'_, State>, TrackerError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        match state.write_failures.pop_front() {
            Some(failure) => Err(failure.into_error()),
            None => Ok(state),
        }
    }
}

fn insert_worklog(
    state: &mut State,
    issue_id: &str,
    date: NaiveDate,
    time: NaiveTime,
    hours: f64,
    author: Option<TrackerUser>,
) -> WorklogHandle {
    state.next_worklog_id += 1;
    let handle = WorklogHandle {
        issue_id: issue_id.to_string(),
        worklog_id: state.next_worklog_id.to_string(),
    };
    let started = Utc.from_utc_datetime(&date.and_time(time)).fixed_offset();
    state
        .worklogs
        .entry(issue_id.to_string())
        .or_default()
        .push(RemoteWorklog {
            handle: handle.clone(),
            started,
            time_spent_seconds: hours_to_seconds(hours),
            author,
        });
    handle
}

fn not_found(what: &str) -> TrackerError {
    TrackerError::Api {
        status: 404,
        message: format!("{} does not exist", what),
    }
}

impl IssueTracker for InMemoryTracker {
    async fn myself(&self) -> Result<TrackerUser, TrackerError> {
        let state = self.begin_read(TrackerCall::Myself)?;
        Ok(state.user.clone())
    }

    async fn search_assigned(&self, assignee: &str) -> Result<Vec<Issue>, TrackerError> {
        let state = self.begin_read(TrackerCall::Search {
            assignee: assignee.to_string(),
        })?;
        let assignee = assignee.to_ascii_lowercase();
        Ok(state
            .issues
            .iter()
            .filter(|(owner, _)| *owner == assignee)
            .map(|(_, issue)| issue.clone())
            .collect())
    }

    async fn list_worklogs(&self, issue_id: &str) -> Result<Vec<RemoteWorklog>, TrackerError> {
        let state = self.begin_read(TrackerCall::ListWorklogs {
            issue_id: issue_id.to_string(),
        })?;
        Ok(state.worklogs.get(issue_id).cloned().unwrap_or_default())
    }

    async fn create_worklog(
        &self,
        issue_id: &str,
        hours: f64,
        date: NaiveDate,
    ) -> Result<WorklogHandle, TrackerError> {
        let mut state = self.begin_write(TrackerCall::Create {
            issue_id: issue_id.to_string(),
            date,
            hours,
        })?;
        if hours <= 0.0 {
            return Err(TrackerError::Api {
                status: 400,
                message: "timeSpentSeconds must be positive".into(),
            });
        }
        let author = Some(state.user.clone());
        let start = NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN);
        Ok(insert_worklog(&mut state, issue_id, date, start, hours, author))
    }

    async fn update_worklog(&self, handle: &WorklogHandle, hours: f64) -> Result<(), TrackerError> {
        let mut state = self.begin_write(TrackerCall::Update {
            handle: handle.clone(),
            hours,
        })?;
        let worklog = state
            .worklogs
            .get_mut(&handle.issue_id)
            .and_then(|logs| logs.iter_mut().find(|w| w.handle == *handle))
            .ok_or_else(|| not_found(&format!("work log {}", handle)))?;
        worklog.time_spent_seconds = hours_to_seconds(hours);
        Ok(())
    }

    async fn delete_worklog(&self, handle: &WorklogHandle) -> Result<(), TrackerError> {
        let mut state = self.begin_write(TrackerCall::Delete {
            handle: handle.clone(),
        })?;
        let logs = state
            .worklogs
            .get_mut(&handle.issue_id)
            .ok_or_else(|| not_found(&format!("work log {}", handle)))?;
        let before = logs.len();
        logs.retain(|w| w.handle != *handle);
        if logs.len() == before {
            return Err(not_found(&format!("work log {}", handle)));
        }
        Ok(())
    }
}
