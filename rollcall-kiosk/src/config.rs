//! Kiosk configuration
//!
//! Bootstrap settings come from a TOML file located by
//! [`rollcall_common::config::ConfigResolver`]. Every section is optional;
//! missing keys fall back to built-in defaults. A handful of settings can be
//! overridden from the command line after the file is loaded.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1"
//! port = 5780
//!
//! [backend]
//! base_url = "http://127.0.0.1:8000"
//! request_timeout_ms = 5000
//!
//! [camera]
//! snapshot_url = "http://127.0.0.1:8081/snapshot.jpg"
//! timeout_ms = 2000
//!
//! [kiosk]
//! mode = "auto"
//! probe_interval_ms = 1000
//! result_dwell_ms = 2000
//! admin_pin = "1234"
//! display_utc_offset_minutes = 345
//!
//! [logging]
//! level = "info"
//! ```

use chrono::FixedOffset;
use rollcall_common::config::{load_toml_or_default, ConfigResolver, LoggingConfig};
use rollcall_common::time::millis_to_duration;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::error::{KioskError, Result};
use crate::orchestrator::TimingPolicy;
use crate::session::Mode;

/// Module name used for config file discovery (`kiosk.toml`)
pub const MODULE_NAME: &str = "kiosk";

/// Complete kiosk configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct KioskConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub kiosk: KioskSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Control API listener
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    /// Default: 5780
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Attendance backend endpoints
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub base_url: String,
    /// Per-request bound; an expired request counts as a network error
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Still-frame source
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CameraConfig {
    #[serde(default = "default_snapshot_url")]
    pub snapshot_url: String,
    #[serde(default = "default_camera_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            snapshot_url: default_snapshot_url(),
            timeout_ms: default_camera_timeout_ms(),
        }
    }
}

/// Session behavior
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct KioskSettings {
    /// Operating mode at startup
    #[serde(default = "default_mode")]
    pub mode: Mode,
    #[serde(default = "default_probe_interval_ms")]
    pub probe_interval_ms: u64,
    #[serde(default = "default_result_dwell_ms")]
    pub result_dwell_ms: u64,
    #[serde(default = "default_admin_pin")]
    pub admin_pin: String,
    /// Offset used for displayed times, in minutes east of UTC (345 = UTC+05:45)
    #[serde(default = "default_display_offset")]
    pub display_utc_offset_minutes: i32,
}

impl Default for KioskSettings {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            probe_interval_ms: default_probe_interval_ms(),
            result_dwell_ms: default_result_dwell_ms(),
            admin_pin: default_admin_pin(),
            display_utc_offset_minutes: default_display_offset(),
        }
    }
}

fn default_bind() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    5780
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_snapshot_url() -> String {
    "http://127.0.0.1:8081/snapshot.jpg".to_string()
}

fn default_camera_timeout_ms() -> u64 {
    2000
}

fn default_mode() -> Mode {
    Mode::Auto
}

fn default_probe_interval_ms() -> u64 {
    1000
}

fn default_result_dwell_ms() -> u64 {
    2000
}

fn default_admin_pin() -> String {
    "1234".to_string()
}

fn default_display_offset() -> i32 {
    345
}

/// Command-line overrides applied on top of the file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub backend_url: Option<String>,
    pub mode: Option<Mode>,
}

impl KioskConfig {
    /// Resolve, load, override, and validate the configuration
    pub fn load(cli_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let resolved = ConfigResolver::new(MODULE_NAME).resolve(cli_path);
        let mut config: KioskConfig = load_toml_or_default(&resolved)?;
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(url) = overrides.backend_url {
            self.backend.base_url = url;
        }
        if let Some(mode) = overrides.mode {
            self.kiosk.mode = mode;
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("backend.base_url", &self.backend.base_url),
            ("camera.snapshot_url", &self.camera.snapshot_url),
        ] {
            reqwest::Url::parse(url)
                .map_err(|e| KioskError::Config(format!("{} '{}' is not a valid URL: {}", name, url, e)))?;
        }

        for (name, value) in [
            ("backend.request_timeout_ms", self.backend.request_timeout_ms),
            ("camera.timeout_ms", self.camera.timeout_ms),
            ("kiosk.probe_interval_ms", self.kiosk.probe_interval_ms),
            ("kiosk.result_dwell_ms", self.kiosk.result_dwell_ms),
        ] {
            if value == 0 {
                return Err(KioskError::Config(format!("{} must be greater than 0", name)));
            }
        }

        if self.kiosk.admin_pin.is_empty() {
            return Err(KioskError::Config("kiosk.admin_pin must not be empty".to_string()));
        }

        self.display_offset()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.bind, self.server.port)
    }

    pub fn timing(&self) -> TimingPolicy {
        TimingPolicy {
            probe_interval: millis_to_duration(self.kiosk.probe_interval_ms),
            result_dwell: millis_to_duration(self.kiosk.result_dwell_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        millis_to_duration(self.backend.request_timeout_ms)
    }

    pub fn camera_timeout(&self) -> Duration {
        millis_to_duration(self.camera.timeout_ms)
    }

    pub fn display_offset(&self) -> Result<FixedOffset> {
        Ok(rollcall_common::time::offset_from_minutes(
            self.kiosk.display_utc_offset_minutes,
        )?)
    }
}
