//! Credentials and sessions for talking to the tracker.

pub mod session;
pub mod storage;

pub use session::{Credentials, Session, SessionError};
pub use storage::{open_store, CredentialStore, FileCredentialStore, KeyringCredentialStore};
