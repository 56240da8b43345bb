//! TOML-based configuration for orql.
//!
//! Supports a config file (orql.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [metadata]
//! model = "${ORQL_HOME}/model.toml"
//!
//! [sql]
//! secondary_table_join = "mapped"
//!
//! [logging]
//! level = "debug"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::sql::{ConverterOptions, SecondaryTableJoinPolicy};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Where the entity model comes from.
    pub metadata: MetadataSettings,

    /// SQL generation.
    pub sql: SqlSettings,

    /// Log output of the CLI.
    pub logging: LoggingSettings,
}

/// Metadata configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MetadataSettings {
    /// Path to the model file (supports ${ENV_VAR} expansion).
    pub model: Option<String>,
}

impl MetadataSettings {
    /// Get the model path with environment variables expanded.
    pub fn resolved_model(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.model
            .as_deref()
            .map(|path| expand_env_vars(path).map(PathBuf::from))
            .transpose()
    }
}

/// SQL generation settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SqlSettings {
    /// Join type for the second and later tables of a multi-table entity.
    pub secondary_table_join: SecondaryTableJoinPolicy,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter when `ORQL_LOG` is unset ("info", "debug", ...).
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `ORQL_CONFIG`
    /// 2. `./orql.toml`
    /// 3. `~/.config/orql/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("ORQL_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("orql.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("orql").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        Ok(Settings::default())
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(SettingsError::InvalidConfig(format!(
                "unknown log level '{}' (expected one of: {})",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }

    /// Options for lowering queries to SQL.
    pub fn converter_options(&self) -> ConverterOptions {
        ConverterOptions {
            secondary_table_join: self.sql.secondary_table_join,
        }
    }
}

impl From<&Settings> for ConverterOptions {
    fn from(settings: &Settings) -> Self {
        settings.converter_options()
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.next_if_eq(&'{').is_some() {
            let name: String = std::iter::from_fn(|| chars.next_if(|ch| *ch != '}')).collect();
            if chars.next_if_eq(&'}').is_none() {
                return Err(SettingsError::InvalidConfig(format!(
                    "unterminated variable reference '${{{}'",
                    name
                )));
            }
            name
        } else {
            // $VAR (ends at non-alphanumeric/underscore)
            std::iter::from_fn(|| chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_')).collect()
        };

        if var_name.is_empty() {
            // Just a lone $, keep it
            result.push('$');
            continue;
        }
        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
