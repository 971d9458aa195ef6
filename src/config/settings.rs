//! Application settings and paths.
//!
//! Settings live in the XDG configuration directory as JSON. Every field has
//! a default, so a partial file only overrides what it names.

use crate::error::{ConfigError, ConfigResult};
use crate::scanner::ScanOptions;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory paths.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/hostsweep)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Resolve the paths. Nothing is created on disk.
    pub fn new() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("com", "hostsweep", "hostsweep").ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Probes in flight during an active scan.
    pub default_concurrency: usize,
    /// Per-probe timeout in milliseconds.
    pub default_timeout_ms: u64,
    /// ICMP echoes per host.
    pub default_probe_count: u32,
    /// Passive capture length in seconds.
    pub default_capture_seconds: u64,
    /// Listening window after the last ARP request, in milliseconds.
    pub arp_grace_ms: u64,
    /// Maximum probes per second, 0 for unlimited.
    pub default_rate_limit: u32,
    /// Reverse-resolve hosts found by active scans.
    pub resolve_hostnames: bool,
    pub dns_concurrency: usize,
    pub dns_timeout_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            default_concurrency: 50,
            default_timeout_ms: 2000,
            default_probe_count: 1,
            default_capture_seconds: 30,
            arp_grace_ms: 3000,
            default_rate_limit: 0,
            resolve_hostnames: true,
            dns_concurrency: 20,
            dns_timeout_ms: 2000,
        }
    }
}

impl AppSettings {
    /// Load settings from the default location.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::new()?.settings_file();

        if !file.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
    }

    /// Save settings to a specific file.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Scanner options seeded from these settings.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions::default()
            .with_concurrency(self.default_concurrency)
            .with_timeout(Duration::from_millis(self.default_timeout_ms))
            .with_count(self.default_probe_count)
            .with_arp_grace(Duration::from_millis(self.arp_grace_ms))
            .with_rate_limit(self.default_rate_limit)
            .with_dns(self.dns_concurrency, Duration::from_millis(self.dns_timeout_ms))
    }

    pub fn capture_duration(&self) -> Duration {
        Duration::from_secs(self.default_capture_seconds)
    }
}
