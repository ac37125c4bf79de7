//! Configuration types and loading.
//!
//! Config is loaded once at startup from a YAML file (default `./config.yaml`) and
//! environment, then shared read-only by every request.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Used when `authstr` is absent from the config file. Override it in any real deployment.
pub const DEFAULT_AUTHSTR: &str = "ddu9a1XR56ZExcjg";

/// Top-level gateway config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP port (default 10020). Accepts a number or a numeric string.
    #[serde(default = "default_port", deserialize_with = "deserialize_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Shared secret for `Authorization: Bearer <authstr>`. Absent => [`DEFAULT_AUTHSTR`];
    /// present but empty => `/run` is disabled. Overridden by CMDGATE_AUTHSTR env.
    #[serde(default)]
    pub authstr: Option<String>,

    /// Whitelist patterns, checked in order.
    #[serde(default)]
    pub commands: Vec<String>,

    /// Per-command execution budget in seconds (default 60). 0 = no limit.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// When true, GET /ping is served without authorization.
    #[serde(default)]
    pub public_ping: bool,
}

fn default_port() -> u16 {
    10020
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            authstr: None,
            commands: Vec::new(),
            timeout_secs: default_timeout_secs(),
            public_ping: false,
        }
    }
}

impl Config {
    /// Execution timeout, `None` when disabled.
    pub fn exec_timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u64),
        Text(String),
    }

    let cannot_parse = |v: &dyn std::fmt::Display| -> D::Error {
        serde::de::Error::custom(format!("cannot parse port: {}", v))
    };
    match PortValue::deserialize(deserializer)? {
        PortValue::Number(n) => u16::try_from(n).map_err(|_| cannot_parse(&n)),
        PortValue::Text(s) => {
            let t = s.trim();
            if t.is_empty() {
                Ok(default_port())
            } else {
                t.parse::<u16>().map_err(|_| cannot_parse(&s))
            }
        }
    }
}

/// Resolve the auth token: env CMDGATE_AUTHSTR overrides config; absent key falls back to
/// [`DEFAULT_AUTHSTR`]. An empty result means the execution endpoint is disabled.
pub fn resolve_authstr(config: &Config) -> String {
    std::env::var("CMDGATE_AUTHSTR")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .unwrap_or_else(|| match &config.authstr {
            Some(s) => s.clone(),
            None => {
                log::warn!("authstr not configured, using the built-in default token");
                DEFAULT_AUTHSTR.to_string()
            }
        })
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("CMDGATE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yaml"))
}

/// Load config from `path` (or the default path). A missing file is an error.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let config =
        parse_config(&s).with_context(|| format!("parsing config from {}", path.display()))?;
    log::debug!(
        "loaded config from {}: port {}, {} whitelist pattern(s)",
        path.display(),
        config.port,
        config.commands.len()
    );
    Ok((config, path))
}

/// Parse YAML config text. An empty document yields the defaults.
pub fn parse_config(s: &str) -> Result<Config> {
    if s.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(s)?)
}
