//! Host configuration types
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working single-host setup.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use ww_lang::anchor::Path;
use ww_lang::runtime::DEFAULT_MAX_CALL_DEPTH;

use super::ConfigError;

/// Top-level configuration, one TOML table per section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct WwConfig {
    pub host: HostConfig,
    pub rpc: RpcConfig,
    pub lang: LangConfig,
    pub log: LogConfig,
    /// Values pre-loaded into the namespace, `[[seed]]` in TOML
    #[serde(rename = "seed")]
    pub seeds: Vec<SeedConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// Identifier reported in logs and process records
    pub id: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            id: "ww-local".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RpcConfig {
    /// Upper bound for a whole command, dial included
    pub call_timeout_ms: u64,
    /// Protocol identifier negotiated on dial
    pub protocol: String,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 5_000,
            protocol: crate::rpc::ANCHOR_PROTOCOL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LangConfig {
    /// Directories searched, in order, for relative import locations
    pub import_paths: Vec<PathBuf>,
    pub max_call_depth: usize,
}

impl Default for LangConfig {
    fn default() -> Self {
        Self {
            import_paths: vec![PathBuf::from(".")],
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// A value stored at `path` when the host starts. `value` is source text and
/// is read, not evaluated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeedConfig {
    pub path: String,
    pub value: String,
}

impl WwConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "rpc.call_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if !self.rpc.protocol.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "rpc.protocol '{}' must start with '/'",
                self.rpc.protocol
            )));
        }
        if self.lang.max_call_depth == 0 {
            return Err(ConfigError::Invalid(
                "lang.max_call_depth must be greater than zero".to_string(),
            ));
        }
        for seed in &self.seeds {
            Path::parse(&seed.path).map_err(|e| ConfigError::Seed {
                path: seed.path.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.rpc.call_timeout_ms)
    }
}
