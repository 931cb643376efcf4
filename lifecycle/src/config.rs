use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_LOGIN_PATH: &str = "/auth/";
const DEFAULT_LOGIN_ANCHOR: &str = "login";
const DEFAULT_REASON_PARAMETER: &str = "reason";
const DEFAULT_WEBSITE_URL: &str = "https://courier.example.com/";
const DEFAULT_NOTIFICATION_CHECK_DELAY_MS: u64 = 10_000;
const DEFAULT_EVENT_BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    EmptyLoginPath,
    RelativeLoginPath { configured: String },
    InvalidWebsiteUrl { configured: String },
    ZeroEventBusCapacity,
}

impl ConfigValidationError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigValidationError::EmptyLoginPath => {
                "login_path must not be empty".to_string()
            }
            ConfigValidationError::RelativeLoginPath { configured } => {
                format!("login_path '{configured}' must start with '/'")
            }
            ConfigValidationError::InvalidWebsiteUrl { configured } => {
                format!("website_url '{configured}' must be an http(s) URL")
            }
            ConfigValidationError::ZeroEventBusCapacity => {
                "event_bus_capacity must be greater than zero".to_string()
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(String),
    #[error("Failed to deserialize config: {0}")]
    Deserialize(String),
    #[error("Configuration validation failed:\n{}", join_messages(.0))]
    Validation(Vec<ConfigValidationError>),
}

fn join_messages(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(ConfigValidationError::user_message)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct LoggingConfig {
    level: Option<String>,
    file: Option<String>,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or("info")
    }

    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }
}

/// Settings of the lifecycle core.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct LifecycleConfig {
    app_version: Option<String>,
    /// Running embedded in a desktop shell.
    desktop: Option<bool>,
    login_path: Option<String>,
    login_anchor: Option<String>,
    reason_parameter: Option<String>,
    /// Public landing page for temporary guests leaving the app.
    website_url: Option<String>,
    notification_check_delay_ms: Option<u64>,
    event_bus_capacity: Option<usize>,
    localhost_hosts: Option<Vec<String>>,
    #[serde(default)]
    logging: LoggingConfig,
}

impl LifecycleConfig {
    /// Parses a TOML document, without environment overrides.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        let parsed: LifecycleConfig = config
            .try_deserialize()
            .map_err(|e| ConfigError::Deserialize(e.to_string()))?;
        parsed.validate().map_err(ConfigError::Validation)?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        let login_path = self.login_path();
        if login_path.is_empty() {
            errors.push(ConfigValidationError::EmptyLoginPath);
        } else if !login_path.starts_with('/') {
            errors.push(ConfigValidationError::RelativeLoginPath {
                configured: login_path.to_string(),
            });
        }

        let website_url = self.website_url();
        if !(website_url.starts_with("https://") || website_url.starts_with("http://")) {
            errors.push(ConfigValidationError::InvalidWebsiteUrl {
                configured: website_url.to_string(),
            });
        }

        if self.event_bus_capacity() == 0 {
            errors.push(ConfigValidationError::ZeroEventBusCapacity);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn app_version(&self) -> &str {
        self.app_version
            .as_deref()
            .unwrap_or(env!("CARGO_PKG_VERSION"))
    }

    pub fn desktop(&self) -> bool {
        self.desktop.unwrap_or(false)
    }

    pub fn login_path(&self) -> &str {
        self.login_path.as_deref().unwrap_or(DEFAULT_LOGIN_PATH)
    }

    pub fn login_anchor(&self) -> &str {
        self.login_anchor.as_deref().unwrap_or(DEFAULT_LOGIN_ANCHOR)
    }

    pub fn reason_parameter(&self) -> &str {
        self.reason_parameter
            .as_deref()
            .unwrap_or(DEFAULT_REASON_PARAMETER)
    }

    pub fn website_url(&self) -> &str {
        self.website_url.as_deref().unwrap_or(DEFAULT_WEBSITE_URL)
    }

    pub fn notification_check_delay(&self) -> Duration {
        Duration::from_millis(
            self.notification_check_delay_ms
                .unwrap_or(DEFAULT_NOTIFICATION_CHECK_DELAY_MS),
        )
    }

    pub fn event_bus_capacity(&self) -> usize {
        self.event_bus_capacity
            .unwrap_or(DEFAULT_EVENT_BUS_CAPACITY)
    }

    pub fn localhost_hosts(&self) -> Vec<String> {
        self.localhost_hosts
            .clone()
            .unwrap_or_else(|| vec!["localhost".to_string(), "127.0.0.1".to_string()])
    }

    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }
}

/// `<config dir>/courier/config.toml`, if the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut path| {
        path.push("courier");
        path.push("config.toml");
        path
    })
}

/// Loads the configuration from `path` (or the default location) with
/// `COURIER__*` environment overrides.
///
/// An explicit `path` must exist; the default file is optional.
pub fn load_config(path: Option<&Path>) -> Result<LifecycleConfig, ConfigError> {
    dotenv::dotenv().ok();

    let mut builder = Config::builder();
    match path {
        Some(path) => builder = builder.add_source(File::from(path).required(true)),
        None => {
            if let Some(default_path) = default_config_path() {
                builder = builder.add_source(File::from(default_path).required(false));
            }
        }
    }

    let config = builder
        .add_source(Environment::with_prefix("COURIER").separator("__"))
        .build()
        .map_err(|e| {
            ConfigError::Load(format!(
                "{e}. Please check your config.toml file and environment variables."
            ))
        })?;

    let parsed: LifecycleConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Deserialize(e.to_string()))?;

    if let Err(errors) = parsed.validate() {
        log::error!("Configuration validation failed with {} errors", errors.len());
        return Err(ConfigError::Validation(errors));
    }

    log::info!("Configuration loaded successfully");
    Ok(parsed)
}
