//! Configuration module for the ww host
//!
//! Loaded from TOML. The file is taken from an explicit path, else from the
//! `WW_CONFIG` environment variable, else defaults are used.

pub mod types;

pub use types::*;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use ww_lang::runtime::RuntimeError;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "WW_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid seed at {path}: {message}")]
    Seed { path: String, message: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for RuntimeError {
    fn from(err: ConfigError) -> Self {
        RuntimeError::Internal(err.to_string())
    }
}

impl WwConfig {
    /// Loads and validates the configuration.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let config = match path {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("no config file given, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), seeds = config.seeds.len(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_yields_defaults() {
        let config = WwConfig::from_toml("").unwrap();
        assert_eq!(config, WwConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn sections_override_defaults() {
        let config = WwConfig::from_toml(
            r#"
            [host]
            id = "node-a"

            [rpc]
            call_timeout_ms = 250

            [lang]
            import_paths = ["lib", "vendor/ww"]

            [[seed]]
            path = "/cluster/node1"
            value = "42"

            [[seed]]
            path = "/cluster/tags"
            value = "[\"a\" \"b\"]"
            "#,
        )
        .unwrap();

        assert_eq!(config.host.id, "node-a");
        assert_eq!(config.rpc.call_timeout_ms, 250);
        assert_eq!(config.rpc.protocol, RpcConfig::default().protocol);
        assert_eq!(config.lang.import_paths.len(), 2);
        assert_eq!(config.lang.max_call_depth, 512);
        assert_eq!(config.seeds.len(), 2);
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = WwConfig::default();
        config.rpc.call_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = WwConfig::default();
        config.seeds.push(SeedConfig {
            path: "no/leading/slash".to_string(),
            value: "1".to_string(),
        });
        assert!(matches!(config.validate(), Err(ConfigError::Seed { .. })));
    }
}
