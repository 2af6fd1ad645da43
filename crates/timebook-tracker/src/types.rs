//! Tracker data types and the Jira wire format they are read from.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Jira's `started` format, e.g. `2024-01-03T09:00:00.000+0000`.
pub const STARTED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Workflow status of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueStatus {
    Open,
    InProgress,
    Done,
    Canceled,
    Other(String),
}

impl IssueStatus {
    /// Map a tracker status name; unknown names are kept verbatim.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "open" | "to do" | "todo" => Self::Open,
            "in progress" => Self::InProgress,
            "done" => Self::Done,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Other(name.trim().to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
            Self::Canceled => "Canceled",
            Self::Other(name) => name,
        }
    }

    /// Terminal issues are hidden from the week grid.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Canceled)
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An issue snapshot as of the last refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Numeric tracker id, used in API paths
    pub id: String,
    /// Human key, e.g. `ABC-1`
    pub key: String,
    pub summary: String,
    pub status: IssueStatus,
    pub story_points: Option<f64>,
}

impl Issue {
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Estimate in hours, from story points.
    pub fn estimated_hours(&self, hours_per_point: f64) -> Option<f64> {
        self.story_points.map(|points| points * hours_per_point)
    }

    pub fn issue_ref(&self) -> IssueRef {
        IssueRef {
            id: self.id.clone(),
            key: self.key.clone(),
        }
    }
}

/// The parts of an issue a booking needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueRef {
    pub id: String,
    pub key: String,
}

/// Address of an existing remote work-log record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorklogHandle {
    pub issue_id: String,
    pub worklog_id: String,
}

impl std::fmt::Display for WorklogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.issue_id, self.worklog_id)
    }
}

/// Tracker account, as far as we care.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl TrackerUser {
    /// Whether this account is the one logged in as `username`.
    pub fn matches(&self, username: &str) -> bool {
        [&self.name, &self.account_id, &self.email_address]
            .into_iter()
            .flatten()
            .any(|id| id.eq_ignore_ascii_case(username))
    }
}

/// One existing work log on an issue.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteWorklog {
    pub handle: WorklogHandle,
    pub started: DateTime<FixedOffset>,
    pub time_spent_seconds: i64,
    pub author: Option<TrackerUser>,
}

impl RemoteWorklog {
    /// Calendar day the work was logged on, in the timestamp's own offset.
    pub fn date(&self) -> NaiveDate {
        self.started.date_naive()
    }

    pub fn hours(&self) -> f64 {
        self.time_spent_seconds as f64 / 3600.0
    }
}

/// Convert hours to the whole seconds Jira stores.
pub fn hours_to_seconds(hours: f64) -> i64 {
    (hours * 3600.0).round() as i64
}

// API Response Types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSearchResponse {
    #[serde(default)]
    pub start_at: u32,
    #[serde(default)]
    pub max_results: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub issues: Vec<ApiIssue>,
}

#[derive(Debug, Deserialize)]
pub struct ApiIssue {
    pub id: String,
    pub key: String,
    pub fields: ApiIssueFields,
}

#[derive(Debug, Deserialize)]
pub struct ApiIssueFields {
    #[serde(default)]
    pub summary: Option<String>,
    pub status: Option<ApiStatus>,
    /// Custom fields, story points among them
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ApiStatus {
    pub name: String,
}

impl ApiIssue {
    pub fn into_issue(self, story_points_field: &str) -> Issue {
        let story_points = self
            .fields
            .extra
            .get(story_points_field)
            .and_then(serde_json::Value::as_f64);

        Issue {
            id: self.id,
            key: self.key,
            summary: self.fields.summary.unwrap_or_default(),
            status: self
                .fields
                .status
                .map(|s| IssueStatus::from_name(&s.name))
                .unwrap_or(IssueStatus::Open),
            story_points,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiWorklogPage {
    #[serde(default)]
    pub start_at: u32,
    #[serde(default)]
    pub max_results: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub worklogs: Vec<ApiWorklog>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiWorklog {
    pub id: String,
    #[serde(default)]
    pub issue_id: Option<String>,
    pub started: String,
    pub time_spent_seconds: i64,
    #[serde(default)]
    pub author: Option<TrackerUser>,
}

impl ApiWorklog {
    /// `issue_id` is the issue the page was fetched for; Jira usually echoes it.
    pub fn into_worklog(self, issue_id: &str) -> Result<RemoteWorklog, String> {
        let started = parse_started(&self.started)?;
        Ok(RemoteWorklog {
            handle: WorklogHandle {
                issue_id: self.issue_id.unwrap_or_else(|| issue_id.to_string()),
                worklog_id: self.id,
            },
            started,
            time_spent_seconds: self.time_spent_seconds,
            author: self.author,
        })
    }
}

/// Body for creating a work log.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorklogRequest {
    pub started: String,
    pub time_spent_seconds: i64,
}

/// Body for updating a work log's duration.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorklogRequest {
    pub time_spent_seconds: i64,
}

/// Parse Jira's `started` timestamp (RFC 3339 accepted as a fallback).
pub fn parse_started(raw: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_str(raw, STARTED_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map_err(|e| format!("bad worklog timestamp '{}': {}", raw, e))
}
