use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use timebook_core::CredentialBackend;

use crate::session::Credentials;

/// Keyring service name and the fixed account the credential blob lives under.
const KEYRING_SERVICE: &str = "timebook";
const KEYRING_ACCOUNT: &str = "login";

/// Persistent home for the login credentials.
///
/// `load` returning `Ok(None)` means "nothing saved yet"; errors are reserved
/// for storage that exists but cannot be read.
pub trait CredentialStore: Send + Sync {
    /// Human-readable backend name for logs
    fn name(&self) -> &str;

    fn load(&self) -> Result<Option<Credentials>>;

    fn save(&self, credentials: &Credentials) -> Result<()>;

    /// Remove saved credentials (no-op when there are none)
    fn clear(&self) -> Result<()>;
}

/// Open the store selected in config.
pub fn open_store(backend: CredentialBackend, config_dir: &Path) -> Box<dyn CredentialStore> {
    match backend {
        CredentialBackend::Keyring => Box::new(KeyringCredentialStore::new()),
        CredentialBackend::File => Box::new(FileCredentialStore::new(
            config_dir.join("credentials.json"),
        )),
    }
}

/// Credentials kept as JSON in a file (user config directory by default).
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<config_dir>/timebook/credentials.json`
    pub fn in_config_dir() -> Result<Self> {
        let path = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("timebook")
            .join("credentials.json");
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn name(&self) -> &str {
        "file"
    }

    fn load(&self) -> Result<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path).context("Failed to read credentials file")?;

        let credentials: Credentials =
            serde_json::from_str(&json).context("Failed to deserialize credentials")?;

        tracing::info!("Loaded credentials for {} from file", credentials.username);
        Ok(Some(credentials))
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create credentials directory")?;
        }

        let json =
            serde_json::to_string_pretty(credentials).context("Failed to serialize credentials")?;

        fs::write(&self.path, &json).context("Failed to write credentials file")?;

        tracing::info!("Stored credentials for {} at {:?}", credentials.username, self.path);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).context("Failed to delete credentials file")?;
            tracing::info!("Deleted credentials file {:?}", self.path);
        }
        Ok(())
    }
}

/// Credentials kept in the operating system keyring.
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, KEYRING_ACCOUNT).context("Failed to open keyring entry")
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn name(&self) -> &str {
        "keyring"
    }

    fn load(&self) -> Result<Option<Credentials>> {
        let json = match self.entry()?.get_password() {
            Ok(json) => json,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(e) => return Err(e).context("Failed to read credentials from keyring"),
        };

        let credentials: Credentials =
            serde_json::from_str(&json).context("Failed to deserialize credentials")?;

        tracing::info!("Loaded credentials for {} from keyring", credentials.username);
        Ok(Some(credentials))
    }

    fn save(&self, credentials: &Credentials) -> Result<()> {
        let json = serde_json::to_string(credentials).context("Failed to serialize credentials")?;

        self.entry()?
            .set_password(&json)
            .context("Failed to write credentials to keyring")?;

        tracing::info!("Stored credentials for {} in keyring", credentials.username);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credentials from keyring"),
        }
    }
}
