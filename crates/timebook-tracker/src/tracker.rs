use std::future::Future;

use chrono::NaiveDate;

use crate::error::TrackerError;
use crate::types::{Issue, RemoteWorklog, TrackerUser, WorklogHandle};

/// What the sync pipeline needs from an issue tracker.
///
/// Every call can fail with an authentication error (re-prompt for
/// credentials) or a transport/API error (report and carry on); see
/// [`TrackerError::kind`].
pub trait IssueTracker: Send + Sync + 'static {
    /// The account the tracker is talking as.
    fn myself(&self) -> impl Future<Output = Result<TrackerUser, TrackerError>> + Send;

    /// All issues assigned to `assignee`, in tracker order, any status.
    fn search_assigned(
        &self,
        assignee: &str,
    ) -> impl Future<Output = Result<Vec<Issue>, TrackerError>> + Send;

    /// Every work log recorded on an issue.
    fn list_worklogs(
        &self,
        issue_id: &str,
    ) -> impl Future<Output = Result<Vec<RemoteWorklog>, TrackerError>> + Send;

    /// Book `hours` on `date`; returns the new record's handle.
    fn create_worklog(
        &self,
        issue_id: &str,
        hours: f64,
        date: NaiveDate,
    ) -> impl Future<Output = Result<WorklogHandle, TrackerError>> + Send;

    /// Set the duration of an existing record.
    fn update_worklog(
        &self,
        handle: &WorklogHandle,
        hours: f64,
    ) -> impl Future<Output = Result<(), TrackerError>> + Send;

    /// Remove a record. Used when a cell is set to zero: the tracker does not
    /// accept zero-length work logs.
    fn delete_worklog(
        &self,
        handle: &WorklogHandle,
    ) -> impl Future<Output = Result<(), TrackerError>> + Send;
}
