//! Jira REST v2 client.

use std::time::Duration;

use chrono::{FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use reqwest::header;
use timebook_auth::Session;
use timebook_core::Config;
use tracing::instrument;
use url::Url;

use crate::error::TrackerError;
use crate::retry::{with_retry, RetryPolicy};
use crate::tracker::IssueTracker;
use crate::types::*;

const USER_AGENT: &str = "timebook";

/// Knobs for [`JiraClient`], usually taken from [`Config`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub story_points_field: String,
    pub page_size: u32,
    /// Wall-clock time new work logs start at
    pub worklog_start: NaiveTime,
    /// Offset sent with `worklog_start`; `None` uses the local zone
    pub utc_offset: Option<FixedOffset>,
    pub retry: RetryPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ClientOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: Duration::from_secs(config.tracker.request_timeout_secs),
            story_points_field: config.tracker.story_points_field.clone(),
            page_size: config.tracker.page_size.max(1),
            worklog_start: config
                .tracker
                .worklog_start()
                .unwrap_or(NaiveTime::MIN),
            utc_offset: None,
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

pub struct JiraClient {
    client: reqwest::Client,
    session: Session,
    options: ClientOptions,
}

impl JiraClient {
    /// Create a client bound to one session. Nothing is sent until the first
    /// call; use [`IssueTracker::myself`] to check the credentials.
    pub fn new(session: Session, options: ClientOptions) -> Result<Self, TrackerError> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            session,
            options,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn endpoint(&self, path: &str) -> Result<Url, TrackerError> {
        Ok(self.session.base_url().join(path)?)
    }

    fn worklog_endpoint(&self, handle: &WorklogHandle) -> Result<Url, TrackerError> {
        self.endpoint(&format!(
            "rest/api/2/issue/{}/worklog/{}",
            urlencoding::encode(&handle.issue_id),
            urlencoding::encode(&handle.worklog_id),
        ))
    }

    /// Add auth and content negotiation headers
    fn build_request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.basic_auth(self.session.username(), Some(self.session.secret()))
            .header(header::ACCEPT, "application/json")
    }

    /// `started` value for a new work log on `date`.
    ///
    /// Sent with the user's offset so the tracker, which answers in the
    /// user's zone, reports the work log on the same calendar day.
    fn started_for(&self, date: NaiveDate) -> String {
        let local = date.and_time(self.options.worklog_start);
        let offset = self.options.utc_offset.unwrap_or_else(|| {
            Local
                .offset_from_local_datetime(&local)
                .earliest()
                .unwrap_or_else(|| Local.offset_from_utc_datetime(&local))
        });
        format_started(local, offset)
    }

    /// Helper to handle API responses and errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, TrackerError> {
        let response = self.check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| TrackerError::InvalidResponse(format!("JSON parse error: {}", e)))
    }

    /// Map non-success statuses to errors, passing successful responses through.
    async fn check_status(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, TrackerError> {
        let status = response.status();

        if status.is_success() {
            Ok(response)
        } else if status.as_u16() == 401 || status.as_u16() == 403 {
            tracing::warn!("Tracker rejected credentials for {}", self.session.username());
            Err(TrackerError::Authentication {
                status: status.as_u16(),
            })
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(TrackerError::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}

impl IssueTracker for JiraClient {
    #[instrument(skip(self), level = "info")]
    async fn myself(&self) -> Result<TrackerUser, TrackerError> {
        let url = self.endpoint("rest/api/2/myself")?;

        let response = with_retry(&self.options.retry, || {
            self.build_request(self.client.get(url.clone())).send()
        })
        .await?;

        self.handle_response(response).await
    }

    #[instrument(skip(self), level = "info")]
    async fn search_assigned(&self, assignee: &str) -> Result<Vec<Issue>, TrackerError> {
        let url = self.endpoint("rest/api/2/search")?;
        let jql = format!("assignee = \"{}\"", escape_jql(assignee));
        let fields = format!("summary,status,{}", self.options.story_points_field);
        let page_size = self.options.page_size.to_string();

        let mut issues = Vec::new();
        let mut start_at: u32 = 0;

        loop {
            let start = start_at.to_string();
            let response = with_retry(&self.options.retry, || {
                self.build_request(self.client.get(url.clone()).query(&[
                    ("jql", jql.as_str()),
                    ("startAt", start.as_str()),
                    ("maxResults", page_size.as_str()),
                    ("fields", fields.as_str()),
                ]))
                .send()
            })
            .await?;

            let page: ApiSearchResponse = self.handle_response(response).await?;
            let received = page.issues.len() as u32;
            issues.extend(
                page.issues
                    .into_iter()
                    .map(|issue| issue.into_issue(&self.options.story_points_field)),
            );

            start_at += received;
            if received == 0 || start_at >= page.total {
                break;
            }
        }

        tracing::info!("Fetched {} issues assigned to {}", issues.len(), assignee);
        Ok(issues)
    }

    #[instrument(skip(self), level = "info")]
    async fn list_worklogs(&self, issue_id: &str) -> Result<Vec<RemoteWorklog>, TrackerError> {
        let url = self.endpoint(&format!(
            "rest/api/2/issue/{}/worklog",
            urlencoding::encode(issue_id)
        ))?;
        let page_size = self.options.page_size.to_string();

        let mut worklogs = Vec::new();
        let mut start_at: u32 = 0;

        loop {
            let start = start_at.to_string();
            let response = with_retry(&self.options.retry, || {
                self.build_request(self.client.get(url.clone()).query(&[
                    ("startAt", start.as_str()),
                    ("maxResults", page_size.as_str()),
                ]))
                .send()
            })
            .await?;

            let page: ApiWorklogPage = self.handle_response(response).await?;
            let received = page.worklogs.len() as u32;
            for worklog in page.worklogs {
                worklogs.push(
                    worklog
                        .into_worklog(issue_id)
                        .map_err(TrackerError::InvalidResponse)?,
                );
            }

            start_at += received;
            if received == 0 || start_at >= page.total {
                break;
            }
        }

        tracing::debug!("Fetched {} work logs for issue {}", worklogs.len(), issue_id);
        Ok(worklogs)
    }

    #[instrument(skip(self), level = "info")]
    async fn create_worklog(
        &self,
        issue_id: &str,
        hours: f64,
        date: NaiveDate,
    ) -> Result<WorklogHandle, TrackerError> {
        let url = self.endpoint(&format!(
            "rest/api/2/issue/{}/worklog",
            urlencoding::encode(issue_id)
        ))?;
        let body = CreateWorklogRequest {
            started: self.started_for(date),
            time_spent_seconds: hours_to_seconds(hours),
        };

        // Sent exactly once, see the retry module.
        let response = self
            .build_request(self.client.post(url).json(&body))
            .send()
            .await?;

        let created: ApiWorklog = self.handle_response(response).await?;
        let handle = WorklogHandle {
            issue_id: created.issue_id.unwrap_or_else(|| issue_id.to_string()),
            worklog_id: created.id,
        };

        tracing::info!("Created work log {} ({}h on {})", handle, hours, date);
        Ok(handle)
    }

    #[instrument(skip(self), level = "info")]
    async fn update_worklog(&self, handle: &WorklogHandle, hours: f64) -> Result<(), TrackerError> {
        let url = self.worklog_endpoint(handle)?;
        let body = UpdateWorklogRequest {
            time_spent_seconds: hours_to_seconds(hours),
        };

        let response = with_retry(&self.options.retry, || {
            self.build_request(self.client.put(url.clone()).json(&body))
                .send()
        })
        .await?;
        self.check_status(response).await?;

        tracing::info!("Updated work log {} to {}h", handle, hours);
        Ok(())
    }

    #[instrument(skip(self), level = "info")]
    async fn delete_worklog(&self, handle: &WorklogHandle) -> Result<(), TrackerError> {
        let url = self.worklog_endpoint(handle)?;

        let response = with_retry(&self.options.retry, || {
            self.build_request(self.client.delete(url.clone())).send()
        })
        .await?;
        self.check_status(response).await?;

        tracing::info!("Deleted work log {}", handle);
        Ok(())
    }
}

/// Jira's timestamp format: `2024-01-03T09:00:00.000-1000`.
fn format_started(local: NaiveDateTime, offset: FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.unsigned_abs() / 60;
    format!(
        "{}{}{:02}{:02}",
        local.format("%Y-%m-%dT%H:%M:%S%.3f"),
        sign,
        minutes / 60,
        minutes % 60
    )
}

/// Quote-escape a value for use inside a JQL string literal.
fn escape_jql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
