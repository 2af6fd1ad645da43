use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Prefix for environment overrides, e.g. `TIMEBOOK__TRACKER__BASE_URL`.
const ENV_PREFIX: &str = "TIMEBOOK";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory (not persisted)
    #[serde(skip, default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Issue tracker connection and field mapping
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Retry policy for idempotent tracker calls
    #[serde(default)]
    pub retry: RetrySettings,

    /// Where login credentials are kept
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Base URL of the Jira server
    pub base_url: String,

    /// Custom field holding story points
    #[serde(default = "default_story_points_field")]
    pub story_points_field: String,

    /// Hours one story point stands for
    #[serde(default = "default_hours_per_story_point")]
    pub hours_per_story_point: f64,

    /// Only seed the week grid with work logs authored by the signed-in user
    #[serde(default = "default_only_own_worklogs")]
    pub only_own_worklogs: bool,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Time of day (HH:MM, UTC) used as the start of newly created work logs
    #[serde(default = "default_worklog_start_time")]
    pub worklog_start_time: String,

    /// Page size for issue search
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_story_points_field() -> String {
    "customfield_10006".to_string()
}

fn default_hours_per_story_point() -> f64 {
    8.0
}

fn default_only_own_worklogs() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_worklog_start_time() -> String {
    "09:00".to_string()
}

fn default_page_size() -> u32 {
    50
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://jira.example.com".to_string(),
            story_points_field: default_story_points_field(),
            hours_per_story_point: default_hours_per_story_point(),
            only_own_worklogs: default_only_own_worklogs(),
            request_timeout_secs: default_request_timeout_secs(),
            worklog_start_time: default_worklog_start_time(),
            page_size: default_page_size(),
        }
    }
}

impl TrackerConfig {
    /// Check if the server URL was changed from the shipped placeholder
    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.base_url.contains("example.com")
    }

    /// Parsed `worklog_start_time`, if well-formed
    pub fn worklog_start(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(&self.worklog_start_time, "%H:%M").ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries (doubles each attempt)
    pub initial_delay_ms: u64,
    /// Maximum delay between retries
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

/// Credential storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    /// System keyring (Secret Service, Keychain, Credential Manager)
    #[default]
    Keyring,
    /// JSON file in the config directory
    File,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub backend: CredentialBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("timebook")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            tracker: TrackerConfig::default(),
            retry: RetrySettings::default(),
            credentials: CredentialsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, overlaid with `TIMEBOOK__*`
    /// environment variables.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            let config = Self::default();
            config.save_to(config_path)?;
            tracing::info!("Wrote default config to {}", config_path.display());
            return Ok(config);
        }

        let mut config: Config = config::Config::builder()
            .add_source(config::File::from(config_path).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read config file")?
            .try_deserialize()
            .context("Failed to parse config file")?;

        if let Some(parent) = config_path.parent() {
            config.config_dir = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.tracker.base_url, "tracker.base_url", &mut result);

        if !self.tracker.is_configured() {
            result.add_warning(
                "tracker.base_url",
                "Tracker URL is still the placeholder - set it before logging in",
            );
        }

        if self.tracker.story_points_field.trim().is_empty() {
            result.add_error("tracker.story_points_field", "Field name must not be empty");
        }

        if !(self.tracker.hours_per_story_point > 0.0) {
            result.add_error(
                "tracker.hours_per_story_point",
                "Hours per story point must be greater than 0",
            );
        }

        if self.tracker.request_timeout_secs == 0 {
            result.add_error(
                "tracker.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        } else if self.tracker.request_timeout_secs > 600 {
            result.add_warning(
                "tracker.request_timeout_secs",
                "Request timeout is more than 10 minutes",
            );
        }

        if self.tracker.worklog_start().is_none() {
            result.add_error(
                "tracker.worklog_start_time",
                format!(
                    "Expected HH:MM, got: {}",
                    self.tracker.worklog_start_time
                ),
            );
        }

        if self.tracker.page_size == 0 || self.tracker.page_size > 1000 {
            result.add_error("tracker.page_size", "Page size must be between 1 and 1000");
        }

        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            result.add_warning(
                "retry.max_delay_ms",
                "Maximum delay is below the initial delay; every retry waits the maximum",
            );
        }

        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            result.add_error(
                "logging.level",
                format!("Invalid log filter: {}", self.logging.level),
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("timebook");

        Ok(config_dir.join("config.toml"))
    }
}
