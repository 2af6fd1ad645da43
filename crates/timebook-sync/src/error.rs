use thiserror::Error;
use timebook_core::{AppError, ValidationError};
use timebook_tracker::TrackerError;

use crate::queue::QueueClosed;
use crate::worker::WorkerPanicked;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    QueueClosed(#[from] QueueClosed),

    #[error(transparent)]
    WorkerPanicked(#[from] WorkerPanicked),

    #[error("Failed to start sync runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl SyncError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.user_message().to_string(),
            Self::Tracker(e) => e.user_message(),
            Self::QueueClosed(_) | Self::WorkerPanicked(_) => {
                "Background sync has stopped. Restart to keep booking hours.".to_string()
            }
            Self::Runtime(_) => "Could not start background sync.".to_string(),
        }
    }

    pub fn should_reauthenticate(&self) -> bool {
        matches!(self, Self::Tracker(e) if e.should_reauthenticate())
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Validation(e) => AppError::Validation(e),
            SyncError::Tracker(e) => e.into(),
            SyncError::Runtime(e) => AppError::Io(e),
            other => AppError::Other(anyhow::anyhow!(other.to_string())),
        }
    }
}
