//! Backoff for idempotent tracker calls.
//!
//! Reads, work-log updates and deletes may be sent more than once. Creating a
//! work log may not: a create whose response was lost would book the hours
//! twice if repeated, so the client sends creates exactly once.
//!
//! Transient failures are timeouts, refused connections, 5xx, 408 and 429.
//! Everything else (401 and 403 included) is returned at once.

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};
use timebook_core::RetrySettings;

/// How many times to resend and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Resends after the first attempt
    pub max_retries: u32,
    /// Wait before the first resend; doubles each time
    pub initial_delay: Duration,
    /// Upper bound on any single wait
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_retries,
            settings.initial_delay_ms,
            settings.max_delay_ms,
        )
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(0, 0, 0)
    }

    /// Wait before resend number `retry + 1`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let base = u64::try_from(self.initial_delay.as_millis()).unwrap_or(u64::MAX);
        let cap = u64::try_from(self.max_delay.as_millis()).unwrap_or(u64::MAX);
        let millis = base.saturating_mul(2u64.saturating_pow(retry));
        Duration::from_millis(millis.min(cap))
    }
}

/// Whether a response status is worth another attempt.
pub fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

/// Whether a transport error is worth another attempt.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    if error.is_timeout() || error.is_connect() {
        return true;
    }
    error.status().is_some_and(is_transient_status)
}

/// Send with `send` until the result is final or the policy is used up.
///
/// The last response is returned even when its status is an error; mapping
/// statuses to errors is the caller's business.
pub async fn with_retry<F, Fut>(policy: &RetryPolicy, send: F) -> Result<Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut retry = 0;

    loop {
        let result = send().await;
        let transient = match &result {
            Ok(response) => is_transient_status(response.status()),
            Err(e) => is_transient_error(e),
        };

        if !transient || retry >= policy.max_retries {
            if retry > 0 && transient {
                tracing::error!("Giving up after {} resends", retry);
            } else if retry > 0 {
                tracing::info!("Request went through after {} resends", retry);
            }
            return result;
        }

        let wait = policy.backoff(retry);
        retry += 1;
        match &result {
            Ok(response) => tracing::warn!(
                "Tracker answered {}, resend {}/{} in {:?}",
                response.status(),
                retry,
                policy.max_retries,
                wait
            ),
            Err(e) => tracing::warn!(
                "Request failed ({}), resend {}/{} in {:?}",
                e,
                retry,
                policy.max_retries,
                wait
            ),
        }
        tokio::time::sleep(wait).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_follows_settings() {
        let policy = RetryPolicy::default();
        assert_eq!(policy, RetryPolicy::new(3, 100, 5000));
        assert_eq!(RetryPolicy::none().max_retries, 0);
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::new(3, 100, 5000);
        let waits: Vec<u128> = (0..4).map(|r| policy.backoff(r).as_millis()).collect();
        assert_eq!(waits, vec![100, 200, 400, 800]);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::new(10, 100, 1000);
        assert_eq!(policy.backoff(4), Duration::from_millis(1000));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_millis(1000));
    }

    #[test]
    fn test_transient_statuses() {
        for status in [
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::REQUEST_TIMEOUT,
        ] {
            assert!(is_transient_status(status), "{}", status);
        }
        for status in [
            StatusCode::OK,
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::NOT_FOUND,
        ] {
            assert!(!is_transient_status(status), "{}", status);
        }
    }
}
