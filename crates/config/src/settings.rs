//! Settings loader: defaults, optional file, environment overrides
//!
//! Three-source precedence: built-in defaults, an optional config file, then
//! `NARRATA_`-prefixed environment variables win last.

use crate::pipeline::PipelineConfig;
use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// Bearer-token authentication for the HTTP surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    /// Path prefixes that bypass authentication even when enabled
    pub public_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            public_paths: vec!["/health".to_string(), "/ready".to_string(), "/metrics".to_string()],
        }
    }
}

/// Server-facing settings, layered on top of `PipelineConfig`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_enabled: bool,
    pub cors_origins: Vec<String>,
    pub auth: AuthConfig,
    /// Segments per shard in the ZIP bundle layout (§6)
    pub bundle_shard_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_enabled: true,
            cors_origins: Vec::new(),
            auth: AuthConfig::default(),
            bundle_shard_size: 100,
        }
    }
}

/// Top-level settings bundle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
}

/// Load settings from defaults, an optional file at `path`, then
/// `NARRATA_`-prefixed environment variables.
pub fn load_settings(path: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(config::Config::try_from(&Settings::default()).map_err(|e| {
            ConfigError::ParseError(e.to_string())
        })?);

    if let Some(path) = path {
        builder = builder.add_source(config::File::with_name(path).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("NARRATA")
            .separator("__")
            .try_parsing(true),
    );

    let settings = builder.build()?;
    settings.try_deserialize().map_err(ConfigError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_with_no_file_returns_defaults() {
        let settings = load_settings(None).unwrap();
        assert_eq!(settings.pipeline.initial_gate, 5);
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let settings = load_settings(Some("/nonexistent/path/config")).unwrap();
        assert_eq!(settings.pipeline.tts_concurrency, 3);
    }
}
