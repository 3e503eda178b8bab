//! Session configuration management
//!
//! Handles loading configuration from TOML files, environment variables, and
//! CLI arguments. The result seeds a [`Settings`](crate::patterns::Settings).

use chrono::NaiveDate;
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Unknown log level string
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unparseable evaluation date
    #[error("Invalid evaluation date: {0}. Expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Unparseable boolean flag
    #[error("Invalid flag value for {name}: {value}. Expected true or false")]
    InvalidFlag {
        /// Variable or option name
        name: String,
        /// Offending value
        value: String,
    },

    /// File could not be read or parsed
    #[error("Configuration file error: {0}")]
    FileError(String),
}

/// Log levels understood by the tracing filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Every registration and notification
    Trace,
    /// Recalculations and relinks
    Debug,
    /// Session lifecycle
    #[default]
    Info,
    /// Failing observers and missing overrides
    Warn,
    /// Errors only
    Error,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl LogLevel {
    /// Convert log level to tracing filter string
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

/// Session configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Log level
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    /// Pinned evaluation date; `None` follows the system clock
    pub evaluation_date: Option<NaiveDate>,
    /// Whether events on the reference date count as not yet happened
    pub include_reference_date_events: bool,
    /// Whether lazy objects forward only the first notification after a
    /// calculation
    pub forward_first_notification_only: bool,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    LogLevel::from_str(&s).map_err(serde::de::Error::custom)
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ConfigError::InvalidDate(value.to_string()))
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            evaluation_date: None,
            include_reference_date_events: false,
            forward_first_notification_only: false,
        }
    }
}

impl SessionConfig {
    /// Create a new SessionConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `BINDING_*` environment variables on top of `self`
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(log_level) = std::env::var("BINDING_LOG_LEVEL") {
            self.log_level = LogLevel::from_str(&log_level)?;
        }

        if let Ok(date) = std::env::var("BINDING_EVALUATION_DATE") {
            self.evaluation_date = Some(parse_date(&date)?);
        }

        if let Ok(flag) = std::env::var("BINDING_INCLUDE_REFERENCE_DATE_EVENTS") {
            self.include_reference_date_events =
                parse_flag("BINDING_INCLUDE_REFERENCE_DATE_EVENTS", &flag)?;
        }

        if let Ok(flag) = std::env::var("BINDING_FORWARD_FIRST_ONLY") {
            self.forward_first_notification_only = parse_flag("BINDING_FORWARD_FIRST_ONLY", &flag)?;
        }

        Ok(())
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::FileError(format!("Failed to parse TOML: {}", e)))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileError(format!("Failed to read config file: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Merge with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&mut self, cli: &CliArgs) -> Result<(), ConfigError> {
        if let Some(log_level) = &cli.log_level {
            self.log_level = LogLevel::from_str(log_level)?;
        }
        if let Some(date) = &cli.evaluation_date {
            self.evaluation_date = Some(parse_date(date)?);
        }
        if cli.forward_first_notification_only {
            self.forward_first_notification_only = true;
        }
        Ok(())
    }
}

/// CLI arguments structure
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Config file path
    pub config_file: Option<PathBuf>,
    /// Log level override
    pub log_level: Option<String>,
    /// Evaluation date override (YYYY-MM-DD)
    pub evaluation_date: Option<String>,
    /// Force first-notification-only forwarding
    pub forward_first_notification_only: bool,
}

/// Build configuration from all sources
///
/// Priority (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables
/// 3. Config file
/// 4. Default values
pub fn build_config(cli: &CliArgs) -> Result<SessionConfig, ConfigError> {
    let mut config = if let Some(config_path) = &cli.config_file {
        SessionConfig::from_file(config_path)?
    } else {
        SessionConfig::default()
    };

    config.apply_env()?;
    config.merge_with_cli(cli)?;

    Ok(config)
}
