//! Plugin-side configuration.
//!
//! The host passes configuration through Extism's plugin config map. All
//! settings live as one JSON object under [`CONFIG_KEY`]; anything missing
//! takes its default.

use serde::{Deserialize, Serialize};

use crate::error::{BusError, BusResult};
use crate::log::LogLevel;

/// Extism config key holding the JSON settings object.
pub const CONFIG_KEY: &str = "akcore";

/// Timeout applied to KV, template and other one-shot host requests.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 1000;

/// Timeout applied to cached web downloads unless the caller overrides it.
pub const DEFAULT_DOWNLOAD_TIMEOUT_MS: u64 = 30_000;

/// Client settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// How long a request waits for its reply.
    pub request_timeout_ms: u64,
    /// How long a cached download waits for its reply.
    pub download_timeout_ms: u64,
    /// Lowest level forwarded to the host by [`crate::HostLogLayer`].
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            download_timeout_ms: DEFAULT_DOWNLOAD_TIMEOUT_MS,
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Parse settings from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Config`] on malformed JSON, unknown keys, or a
    /// zero timeout.
    pub fn from_json(raw: &str) -> BusResult<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| BusError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load settings from the host's plugin config, falling back to
    /// defaults when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Config`] if the host config cannot be read or
    /// does not parse.
    #[cfg(target_arch = "wasm32")]
    pub fn from_host() -> BusResult<Self> {
        match extism_pdk::config::get(CONFIG_KEY) {
            Ok(Some(raw)) => Self::from_json(&raw),
            Ok(None) => Ok(Self::default()),
            Err(e) => Err(BusError::Config(e.to_string())),
        }
    }

    fn validate(&self) -> BusResult<()> {
        if self.request_timeout_ms == 0 {
            return Err(BusError::Config("request_timeout_ms must be non-zero".into()));
        }
        if self.download_timeout_ms == 0 {
            return Err(BusError::Config("download_timeout_ms must be non-zero".into()));
        }
        Ok(())
    }
}
