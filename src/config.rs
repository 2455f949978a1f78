use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use log::{debug, info};

use crate::error::{MonitorError, Result};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/api/statements/upload";

const ENDPOINT_ENV: &str = "UPLOAD_MONITOR_ENDPOINT";
const WATCH_DIR_ENV: &str = "UPLOAD_MONITOR_DIR";

/// Runtime settings. Every field is optional in the JSON file.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub endpoint: String,
    pub watch_dir: Option<PathBuf>, // Falls back to ~/Downloads when unset
    pub stability_threshold_ms: u64, // Quiet time required before a file is uploaded
    pub check_interval_ms: u64, // How often an unstable file is re-checked
    pub settle_delay_ms: u64, // Pause after a create event before the file is looked at
    pub request_timeout_secs: u64,
    pub scrollback_lines: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            watch_dir: None,
            stability_threshold_ms: 2000,
            check_interval_ms: 500,
            settle_delay_ms: 100,
            request_timeout_secs: 30,
            scrollback_lines: 100,
        }
    }
}

impl MonitorConfig {
    /// Read the JSON config at `path`, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            MonitorError::config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let config: MonitorConfig = serde_json::from_str(&raw).map_err(|e| {
            MonitorError::config(format!("invalid config {}: {}", path.display(), e))
        })?;

        info!("Config loaded from {}", path.display());
        config.with_env_overrides().validated()
    }

    /// Defaults plus environment overrides, for running without a config file.
    pub fn from_env() -> Result<Self> {
        MonitorConfig::default().with_env_overrides().validated()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            debug!("{} overrides endpoint", ENDPOINT_ENV);
            self.endpoint = endpoint;
        }
        if let Ok(dir) = std::env::var(WATCH_DIR_ENV) {
            debug!("{} overrides watch_dir", WATCH_DIR_ENV);
            self.watch_dir = Some(PathBuf::from(dir));
        }
        self
    }

    pub fn validated(self) -> Result<Self> {
        if self.endpoint.trim().is_empty() {
            return Err(MonitorError::config("endpoint must not be empty"));
        }
        if self.stability_threshold_ms == 0 || self.check_interval_ms == 0 {
            return Err(MonitorError::config("stability intervals must be greater than zero"));
        }
        if self.request_timeout_secs == 0 {
            return Err(MonitorError::config("request timeout must be greater than zero"));
        }
        if self.scrollback_lines == 0 {
            return Err(MonitorError::config("scrollback must keep at least one line"));
        }
        Ok(self)
    }

    pub fn stability_threshold(&self) -> Duration {
        Duration::from_millis(self.stability_threshold_ms)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Configured directory, or the user's Downloads folder.
    pub fn resolve_watch_dir(&self) -> Result<PathBuf> {
        match &self.watch_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_watch_dir(),
        }
    }
}

/// `<home>/Downloads`, which must already exist.
pub fn default_watch_dir() -> Result<PathBuf> {
    let downloads = home_dir()?.join("Downloads");
    if !downloads.is_dir() {
        return Err(MonitorError::config(format!(
            "Downloads folder not found: {}",
            downloads.display()
        )));
    }
    Ok(downloads)
}

#[cfg(unix)]
fn home_dir() -> Result<PathBuf> {
    home_from_var("HOME")
}

#[cfg(windows)]
fn home_dir() -> Result<PathBuf> {
    home_from_var("USERPROFILE")
}

#[cfg(not(any(unix, windows)))]
fn home_dir() -> Result<PathBuf> {
    Err(MonitorError::config(format!(
        "unsupported platform: {}",
        std::env::consts::OS
    )))
}

#[cfg(any(unix, windows))]
fn home_from_var(var: &str) -> Result<PathBuf> {
    match std::env::var_os(var) {
        Some(home) if !home.is_empty() => Ok(PathBuf::from(home)),
        _ => Err(MonitorError::config(format!(
            "cannot determine home directory: {} is not set",
            var
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_timings() {
        let config = MonitorConfig::default();
        assert_eq!(config.stability_threshold(), Duration::from_secs(2));
        assert_eq!(config.check_interval(), Duration::from_millis(500));
        assert_eq!(config.settle_delay(), Duration::from_millis(100));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.scrollback_lines, 100);
        assert!(config.validated().is_ok());
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let config: MonitorConfig = serde_json::from_str(
            r#"{ "endpoint": "http://example.test/upload", "check_interval_ms": 250 }"#,
        )
        .unwrap();
        assert_eq!(config.endpoint, "http://example.test/upload");
        assert_eq!(config.check_interval(), Duration::from_millis(250));
        assert_eq!(config.stability_threshold_ms, 2000);
        assert_eq!(config.watch_dir, None);
    }

    #[test]
    fn load_reads_file_and_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();

        let good = dir.path().join("good.json");
        let mut file = fs::File::create(&good).unwrap();
        write!(file, r#"{{ "settle_delay_ms": 50, "watch_dir": "/tmp/inbox" }}"#).unwrap();
        let config = MonitorConfig::load(&good).unwrap();
        assert_eq!(config.settle_delay(), Duration::from_millis(50));

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "not json").unwrap();
        assert!(matches!(
            MonitorConfig::load(&bad),
            Err(MonitorError::Configuration(_))
        ));

        assert!(matches!(
            MonitorConfig::load(dir.path().join("missing.json")),
            Err(MonitorError::Configuration(_))
        ));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let config = MonitorConfig {
            check_interval_ms: 0,
            ..MonitorConfig::default()
        };
        assert!(config.validated().is_err());

        let config = MonitorConfig {
            endpoint: "  ".into(),
            ..MonitorConfig::default()
        };
        assert!(config.validated().is_err());
    }

    #[test]
    fn explicit_watch_dir_wins_over_default() {
        let config = MonitorConfig {
            watch_dir: Some(PathBuf::from("/data/incoming")),
            ..MonitorConfig::default()
        };
        assert_eq!(config.resolve_watch_dir().unwrap(), PathBuf::from("/data/incoming"));
    }
}
