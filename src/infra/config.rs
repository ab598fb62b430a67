//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! After the file is read, environment variables are layered on top:
//! - `TRANSLOC_API_KEY` - upstream API key (never stored in the repo)
//! - `BUS_STOP_<NAME>=<code>` - add or override a stop code
//! - `BUS_ROUTE_<NAME>=<code>` - add or override a route code

use crate::domain::speech::UNAVAILABLE_MESSAGE;
use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

pub const API_KEY_ENV: &str = "TRANSLOC_API_KEY";
pub const STOP_ENV_PREFIX: &str = "BUS_STOP_";
pub const ROUTE_ENV_PREFIX: &str = "BUS_ROUTE_";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: default_bind_address(), port: default_port() }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslocConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_agency")]
    pub agency: String,
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,
    /// Prefer the TRANSLOC_API_KEY environment variable over this field
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for TranslocConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            agency: default_agency(),
            api_key_header: default_api_key_header(),
            api_key: None,
        }
    }
}

fn default_base_url() -> String {
    "https://transloc-api-1-2.p.mashape.com".to_string()
}

fn default_agency() -> String {
    "176".to_string()
}

fn default_api_key_header() -> String {
    "X-Mashape-Key".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    #[serde(default = "default_unavailable_message")]
    pub unavailable_message: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self { unavailable_message: default_unavailable_message() }
    }
}

fn default_unavailable_message() -> String {
    UNAVAILABLE_MESSAGE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub transloc: TranslocConfig,
    #[serde(default)]
    pub stops: BTreeMap<String, u64>,
    #[serde(default)]
    pub routes: BTreeMap<String, u64>,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
///
/// Stop and route keys are stored normalized (trimmed, lowercase).
#[derive(Debug, Clone)]
pub struct Config {
    bind_address: String,
    port: u16,
    transloc_base_url: String,
    transloc_agency: String,
    transloc_api_key_header: String,
    transloc_api_key: Option<String>,
    stops: BTreeMap<String, u64>,
    routes: BTreeMap<String, u64>,
    unavailable_message: String,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            transloc_base_url: default_base_url(),
            transloc_agency: default_agency(),
            transloc_api_key_header: default_api_key_header(),
            transloc_api_key: None,
            stops: Self::default_stops(),
            // No known-good route ids; deployments supply them via [routes] or BUS_ROUTE_<NAME>
            routes: BTreeMap::new(),
            unavailable_message: default_unavailable_message(),
            metrics_interval_secs: default_metrics_interval(),
            config_file: "default".to_string(),
        }
    }
}

fn normalize_keys(map: BTreeMap<String, u64>) -> BTreeMap<String, u64> {
    map.into_iter().map(|(k, v)| (k.trim().to_lowercase(), v)).collect()
}

impl Config {
    fn default_stops() -> BTreeMap<String, u64> {
        BTreeMap::from([("west".to_string(), 4146366), ("east".to_string(), 4117202)])
    }

    /// Determine config file path: CLI value, then CONFIG_FILE, then config/dev.toml
    pub fn resolve_config_path(cli: Option<String>) -> String {
        Self::pick_config_path(cli, env::var("CONFIG_FILE").ok())
    }

    fn pick_config_path(cli: Option<String>, env_path: Option<String>) -> String {
        cli.or(env_path).unwrap_or_else(|| "config/dev.toml".to_string())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            bind_address: toml_config.server.bind_address,
            port: toml_config.server.port,
            transloc_base_url: toml_config.transloc.base_url,
            transloc_agency: toml_config.transloc.agency,
            transloc_api_key_header: toml_config.transloc.api_key_header,
            transloc_api_key: toml_config.transloc.api_key.filter(|k| !k.is_empty()),
            stops: normalize_keys(toml_config.stops),
            routes: normalize_keys(toml_config.routes),
            unavailable_message: toml_config.speech.unavailable_message,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration from a path, falling back to defaults, then apply the environment
    pub fn load_from_path(path: &str) -> Self {
        let config = match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "config_load_failed_using_defaults");
                Self::default()
            }
        };
        config.with_env(env::vars())
    }

    /// Layer environment variables over the file configuration
    pub fn with_env<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if key == API_KEY_ENV {
                if !value.is_empty() {
                    self.transloc_api_key = Some(value);
                }
            } else if let Some(name) = key.strip_prefix(STOP_ENV_PREFIX) {
                Self::insert_code(&mut self.stops, name, &key, &value);
            } else if let Some(name) = key.strip_prefix(ROUTE_ENV_PREFIX) {
                Self::insert_code(&mut self.routes, name, &key, &value);
            }
        }
        self
    }

    fn insert_code(map: &mut BTreeMap<String, u64>, name: &str, key: &str, value: &str) {
        // Underscores stand in for spaces in variable names
        let name = name.trim().replace('_', " ").to_lowercase();
        if name.is_empty() {
            return;
        }
        match value.trim().parse::<u64>() {
            Ok(code) => {
                map.insert(name, code);
            }
            Err(e) => {
                warn!(key = %key, error = %e, "config_env_code_invalid");
            }
        }
    }

    pub fn bind_address(&self) -> &str {
        &self.bind_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn transloc_base_url(&self) -> &str {
        &self.transloc_base_url
    }

    pub fn transloc_agency(&self) -> &str {
        &self.transloc_agency
    }

    pub fn transloc_api_key_header(&self) -> &str {
        &self.transloc_api_key_header
    }

    pub fn transloc_api_key(&self) -> Option<&str> {
        self.transloc_api_key.as_deref()
    }

    pub fn stops(&self) -> &BTreeMap<String, u64> {
        &self.stops
    }

    pub fn routes(&self) -> &BTreeMap<String, u64> {
        &self.routes
    }

    pub fn unavailable_message(&self) -> &str {
        &self.unavailable_message
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to point the client at a local stub
    pub fn with_transloc_base_url(mut self, url: &str) -> Self {
        self.transloc_base_url = url.to_string();
        self
    }

    /// Builder method for tests to set the API key
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.transloc_api_key = Some(key.to_string());
        self
    }
}
