//! Tracker-specific error types.

use thiserror::Error;
use timebook_core::{AppError, AuthError, NetworkError, ReqwestErrorExt};

/// Coarse classification callers branch on: re-prompt for credentials, or
/// report a (possibly transient) failure and carry on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Transport,
}

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Authentication failed (HTTP {status})")]
    Authentication { status: u16 },

    #[error("Transport error: {0}")]
    Transport(#[from] NetworkError),

    #[error("Tracker API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TrackerError::InvalidResponse(err.to_string())
        } else {
            TrackerError::Transport(err.into_network_error())
        }
    }
}

impl TrackerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::Authentication,
            _ => ErrorKind::Transport,
        }
    }

    /// Whether the user must sign in again before this can succeed.
    pub fn should_reauthenticate(&self) -> bool {
        self.kind() == ErrorKind::Authentication
    }

    /// The tracker says the issue or work log does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// Whether trying the same call later might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            _ => false,
        }
    }

    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        match self {
            Self::Authentication { .. } => {
                "Wrong credentials or unable to access the tracker. Please log in again."
                    .to_string()
            }
            Self::Transport(e) => e.user_message().to_string(),
            Self::Api { status, .. } if *status == 404 => {
                "The issue or work log no longer exists. Please refresh.".to_string()
            }
            Self::Api { status, message } => format!("Tracker error ({}): {}", status, message),
            Self::InvalidResponse(_) => "Received an unexpected response from the tracker.".to_string(),
            Self::Url(_) => "The tracker URL is invalid. Check your settings.".to_string(),
        }
    }
}

impl From<TrackerError> for AppError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::Authentication { .. } => AppError::Auth(AuthError::InvalidCredentials),
            TrackerError::Transport(e) => AppError::Network(e),
            TrackerError::Api { status, message } => {
                AppError::Network(NetworkError::ServerError { status, message })
            }
            TrackerError::InvalidResponse(msg) => {
                AppError::Network(NetworkError::InvalidResponse(msg))
            }
            TrackerError::Url(e) => {
                AppError::Config(timebook_core::ConfigError::Invalid(e.to_string()))
            }
        }
    }
}
