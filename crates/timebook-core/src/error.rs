//! Error taxonomy shared by the Timebook crates.
//!
//! Every variant has a `user_message()` fit for showing in the console; the
//! `Display` output is meant for logs.

use thiserror::Error;

/// Anything the front-end may have to report.
///
/// Errors from the tracker, the sync pipeline and the credential store are
/// all convertible to this type. Use `user_message()` to get a UI-appropriate
/// message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("tracker unreachable: {0}")]
    Network(#[from] NetworkError),

    #[error("bad configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("not authenticated: {0}")]
    Auth(#[from] AuthError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Auth(e) => e.user_message(),
            AppError::Validation(e) => e.user_message(),
            AppError::Io(_) => "Reading or writing a local file failed.",
            AppError::Other(_) => "Something went wrong. See the log for details.",
        }
    }

    /// Whether the user has to sign in again before retrying.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            AppError::Auth(AuthError::InvalidCredentials | AuthError::NotSignedIn)
        )
    }
}

/// Failures talking HTTP to the tracker.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("could not connect: {0}")]
    ConnectionFailed(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("unreadable response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to reach the issue tracker. Check your connection."
            }
            NetworkError::Timeout => "The issue tracker did not answer in time. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The issue tracker is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The issue tracker rejected the request.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response from the issue tracker."
            }
        }
    }
}

/// Settings that cannot be used as given.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Invalid(String),

    #[error("{0} is not set")]
    MissingSetting(&'static str),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "A setting in config.toml is invalid.",
            ConfigError::MissingSetting(_) => "A required setting is missing from config.toml.",
        }
    }
}

/// Login problems.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credentials rejected")]
    InvalidCredentials,

    #[error("no saved credentials")]
    NotSignedIn,

    #[error("credential store: {0}")]
    StorageError(String),
}

impl AuthError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "Wrong credentials or unable to access the tracker.",
            AuthError::NotSignedIn => "Not signed in. Please log in.",
            AuthError::StorageError(_) => "Failed to access saved credentials.",
        }
    }
}

/// Malformed local input, rejected before anything is queued.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("'{0}' is not a number")]
    NotANumber(String),

    #[error("hours must be between {min} and {max}, got {value}")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("at most one decimal place is allowed: '{0}'")]
    TooPrecise(String),

    #[error("no cell at row {row}, day {day}")]
    NoSuchCell { row: usize, day: usize },
}

impl ValidationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ValidationError::NotANumber(_) => "Enter hours as a number, for example 4 or 2.5.",
            ValidationError::OutOfRange { .. } => "Hours must be between 0 and 8.9.",
            ValidationError::TooPrecise(_) => "Use at most one decimal place.",
            ValidationError::NoSuchCell { .. } => "That cell does not exist.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingSetting("tracker.base_url");
        assert_eq!(err.to_string(), "tracker.base_url is not set");
        assert!(err.user_message().contains("config.toml"));
    }

    #[test]
    fn test_rejected_credentials_require_login() {
        let app_err: AppError = AuthError::InvalidCredentials.into();
        assert!(app_err.requires_login());

        let app_err: AppError = AuthError::StorageError("locked".into()).into();
        assert!(!app_err.requires_login());
    }

    #[test]
    fn test_network_error_does_not_require_login() {
        let app_err = AppError::Network(NetworkError::Timeout);
        assert!(!app_err.requires_login());
    }

    #[test]
    fn test_server_error_messages_depend_on_status() {
        let outage = NetworkError::ServerError {
            status: 503,
            message: "down".into(),
        };
        let rejected = NetworkError::ServerError {
            status: 400,
            message: "bad".into(),
        };
        assert!(outage.user_message().contains("later"));
        assert!(rejected.user_message().contains("rejected"));
    }

    #[test]
    fn test_user_message_propagation() {
        let app_err = AppError::Validation(ValidationError::OutOfRange {
            value: 12.0,
            min: 0.0,
            max: 8.9,
        });
        assert_eq!(app_err.user_message(), "Hours must be between 0 and 8.9.");
    }
}
