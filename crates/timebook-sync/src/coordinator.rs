//! Read path: pull assigned issues and their work logs into a fresh ledger.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use timebook_tracker::{Issue, IssueTracker, RemoteWorklog, TrackerError, WorklogHandle};

use crate::ledger::WorklogLedger;

/// Result of one refresh.
#[derive(Debug, Clone)]
pub struct SyncSnapshot {
    /// Active issues, in tracker order
    pub issues: Vec<Issue>,
    pub ledger: WorklogLedger,
    pub fetched_at: DateTime<Utc>,
}

pub struct IssueSyncCoordinator<T: IssueTracker> {
    tracker: Arc<T>,
    author: Option<String>,
}

impl<T: IssueTracker> IssueSyncCoordinator<T> {
    pub fn new(tracker: Arc<T>) -> Self {
        Self {
            tracker,
            author: None,
        }
    }

    /// Only seed the ledger from work logs written by `username`.
    pub fn only_authored_by(mut self, username: impl Into<String>) -> Self {
        self.author = Some(username.into());
        self
    }

    /// Fetch active issues assigned to `assignee` and their work logs.
    pub async fn refresh(&self, assignee: &str) -> Result<SyncSnapshot, TrackerError> {
        let issues: Vec<Issue> = self
            .tracker
            .search_assigned(assignee)
            .await?
            .into_iter()
            .filter(Issue::is_active)
            .collect();

        let mut ledger = WorklogLedger::new();
        for issue in &issues {
            for (date, hours, handle) in self.load_worklogs(issue).await? {
                if let Err(e) = ledger.set(&issue.key, date, hours, Some(handle)) {
                    tracing::warn!("Ignoring work log on {} {}: {}", issue.key, date, e);
                }
            }
        }

        tracing::info!(
            "Refreshed {} active issues, {} booked cells",
            issues.len(),
            ledger.len()
        );

        Ok(SyncSnapshot {
            issues,
            ledger,
            fetched_at: Utc::now(),
        })
    }

    /// One `(date, hours, handle)` per day that has work logged on `issue`.
    ///
    /// A day with several records keeps the one that started last.
    pub async fn load_worklogs(
        &self,
        issue: &Issue,
    ) -> Result<Vec<(NaiveDate, f64, WorklogHandle)>, TrackerError> {
        let worklogs = self.tracker.list_worklogs(&issue.id).await?;

        let mut by_date: BTreeMap<NaiveDate, RemoteWorklog> = BTreeMap::new();
        for worklog in worklogs.into_iter().filter(|w| self.is_own(w)) {
            let date = worklog.date();
            match by_date.get(&date) {
                Some(kept) => {
                    tracing::warn!(
                        "{} has several work logs on {}; showing the latest only",
                        issue.key,
                        date
                    );
                    if worklog.started >= kept.started {
                        by_date.insert(date, worklog);
                    }
                }
                None => {
                    by_date.insert(date, worklog);
                }
            }
        }

        Ok(by_date
            .into_iter()
            .map(|(date, w)| (date, w.hours(), w.handle))
            .collect())
    }

    fn is_own(&self, worklog: &RemoteWorklog) -> bool {
        match (&self.author, &worklog.author) {
            (None, _) => true,
            (Some(username), Some(author)) => author.matches(username),
            (Some(_), None) => false,
        }
    }
}
