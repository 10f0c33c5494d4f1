//! Configuration file resolution and loading
//!
//! Bootstrap configuration lives in a small TOML file per service. The file
//! is located by priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config directory (`~/.config/rollcall/<module>.toml`)
//! 4. System config directory (`/etc/rollcall/<module>.toml`)
//!
//! A missing file is not fatal: the service logs a warning and starts with
//! compiled defaults. An explicitly named file (CLI or environment) that
//! cannot be read is an error.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ROLLCALL_CONFIG";

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where the config file path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    UserConfig,
    SystemConfig,
    CompiledDefaults,
}

/// Result of config file resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Locates the TOML config file for one module
pub struct ConfigResolver {
    module_name: String,
    env_var_name: String,
}

impl ConfigResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            env_var_name: CONFIG_ENV_VAR.to_string(),
        }
    }

    /// Use a different environment variable than [`CONFIG_ENV_VAR`]
    pub fn with_env_var(mut self, env_var_name: &str) -> Self {
        self.env_var_name = env_var_name.to_string();
        self
    }

    /// Resolve the config file path following the priority order
    pub fn resolve(&self, cli_arg: Option<&Path>) -> ResolvedConfig {
        if let Some(path) = cli_arg {
            return ResolvedConfig {
                path: Some(path.to_path_buf()),
                source: ConfigSource::CommandLine,
            };
        }

        if let Ok(path) = std::env::var(&self.env_var_name) {
            if !path.trim().is_empty() {
                return ResolvedConfig {
                    path: Some(PathBuf::from(path)),
                    source: ConfigSource::Environment,
                };
            }
        }

        let file_name = format!("{}.toml", self.module_name);

        if let Some(user_path) = dirs::config_dir().map(|d| d.join("rollcall").join(&file_name)) {
            if user_path.exists() {
                return ResolvedConfig {
                    path: Some(user_path),
                    source: ConfigSource::UserConfig,
                };
            }
        }

        let system_path = PathBuf::from("/etc/rollcall").join(&file_name);
        if cfg!(unix) && system_path.exists() {
            return ResolvedConfig {
                path: Some(system_path),
                source: ConfigSource::SystemConfig,
            };
        }

        ResolvedConfig {
            path: None,
            source: ConfigSource::CompiledDefaults,
        }
    }
}

/// Parse a TOML document into `T`
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(toml::from_str(content)?)
}

/// Load the resolved config, falling back to `T::default()` when no file exists
pub fn load_toml_or_default<T>(resolved: &ResolvedConfig) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = &resolved.path else {
        warn!("No configuration file found, using compiled defaults");
        return Ok(T::default());
    };

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    let config = parse_toml(&content)?;
    info!("Loaded configuration from {} ({:?})", path.display(), resolved.source);
    Ok(config)
}
