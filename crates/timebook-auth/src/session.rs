//! Login credentials and the explicit session object handed to the tracker
//! client and the sync pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use timebook_core::{AppError, AuthError, ConfigError};
use url::Url;

/// Reasons a session cannot be built.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("username and secret are both required")]
    IncompleteCredentials,

    #[error("invalid tracker URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::IncompleteCredentials => AppError::Auth(AuthError::InvalidCredentials),
            SessionError::InvalidUrl(e) => AppError::Config(ConfigError::Invalid(e.to_string())),
        }
    }
}

/// Username and secret (password or API token) for HTTP basic auth.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Both parts must be present before we try them against the server.
    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.secret.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// An authenticated context: which server, as whom.
///
/// Sessions are immutable. Re-authenticating builds a new session (and a new
/// tracker client and sync pipeline on top of it).
#[derive(Debug, Clone)]
pub struct Session {
    base_url: Url,
    credentials: Credentials,
}

impl Session {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, SessionError> {
        if !credentials.is_complete() {
            return Err(SessionError::IncompleteCredentials);
        }

        let mut base_url = Url::parse(base_url)?;

        // Url::join drops the last path segment unless the base ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    pub fn secret(&self) -> &str {
        &self.credentials.secret
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("alice", "hunter2");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("alice"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_incomplete_credentials_rejected() {
        let result = Session::new("https://jira.acme.test", Credentials::new("  ", "pw"));
        assert!(matches!(result, Err(SessionError::IncompleteCredentials)));

        let result = Session::new("https://jira.acme.test", Credentials::new("alice", ""));
        assert!(matches!(result, Err(SessionError::IncompleteCredentials)));
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let session =
            Session::new("https://acme.test/jira", Credentials::new("alice", "pw")).unwrap();
        assert_eq!(session.base_url().as_str(), "https://acme.test/jira/");
        assert_eq!(
            session.base_url().join("rest/api/2/myself").unwrap().as_str(),
            "https://acme.test/jira/rest/api/2/myself"
        );
    }

    #[test]
    fn test_invalid_url() {
        let err = Session::new("not a url", Credentials::new("alice", "pw")).unwrap_err();
        assert!(matches!(err, SessionError::InvalidUrl(_)));
        let app: AppError = err.into();
        assert!(matches!(app, AppError::Config(_)));
    }
}
