//! Configuration module for orql.
//!
//! Handles the config file, environment variables and converter settings.

mod settings;

pub use settings::{
    expand_env_vars, LoggingSettings, MetadataSettings, Settings, SettingsError, SqlSettings,
};
