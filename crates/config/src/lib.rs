//! Configuration management for the narration pipeline
//!
//! Supports loading configuration from:
//! - An optional TOML file
//! - `NARRATA_`-prefixed environment variables
//! - Built-in defaults (§6 "Configuration (enumerated)")

pub mod pipeline;
pub mod settings;

pub use pipeline::PipelineConfig;
pub use settings::{load_settings, AuthConfig, ServerConfig, Settings};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for narrata_core::Error {
    fn from(err: ConfigError) -> Self {
        narrata_core::Error::Config(err.to_string())
    }
}
