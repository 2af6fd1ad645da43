//! Issue tracker integration for Timebook.
//!
//! Provides the `IssueTracker` capability, a Jira REST v2 client implementing
//! it, and an in-memory tracker for demo mode and tests.

pub mod client;
pub mod error;
pub mod memory;
pub mod retry;
pub mod tracker;
pub mod types;

pub use client::{ClientOptions, JiraClient};
pub use error::{ErrorKind, TrackerError};
pub use memory::{InMemoryTracker, ScriptedFailure, TrackerCall};
pub use retry::RetryPolicy;
pub use tracker::IssueTracker;
pub use types::{Issue, IssueRef, IssueStatus, RemoteWorklog, TrackerUser, WorklogHandle};
