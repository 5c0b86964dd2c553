use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Minimum time between two outbound alert emails, across all alert kinds.
pub const NOTIFICATION_COOLDOWN: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub cpu_pct: u8,
    pub memory_pct: u8,
    pub disk_pct: u8,
    /// MiB per second, applied to sent and received rates independently.
    pub network_mbps: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_pct: 80,
            memory_pct: 80,
            disk_pct: 90,
            network_mbps: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub from: String,
    pub to: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from: "your_email@example.com".to_string(),
            to: "admin@example.com".to_string(),
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            username: "your_email@example.com".to_string(),
            password: "your_password".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub thresholds: Thresholds,
    pub scan_dirs: Vec<PathBuf>,
    pub email: EmailConfig,
    pub notifications_enabled: bool,
    pub log_dir: PathBuf,
    #[serde(skip, default = "default_cooldown")]
    pub cooldown: Duration,
}

fn default_cooldown() -> Duration {
    NOTIFICATION_COOLDOWN
}

/// The system directory swept for insecure files when none is configured.
pub fn default_scan_dir() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\ProgramData")
    } else {
        PathBuf::from("/etc")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            scan_dirs: vec![default_scan_dir()],
            email: EmailConfig::default(),
            notifications_enabled: true,
            log_dir: PathBuf::from("."),
            cooldown: NOTIFICATION_COOLDOWN,
        }
    }
}

impl Config {
    /// Reads a JSON config file. Keys missing from the file keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let net = self.thresholds.network_mbps;
        if !net.is_finite() || net < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "network threshold must be a non-negative number, got {}",
                net
            )));
        }
        if self.notifications_enabled && self.email.smtp_host.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "smtp host is empty while notifications are enabled".to_string(),
            ));
        }
        Ok(())
    }
}
