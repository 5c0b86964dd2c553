use anyhow::{Context, Result};
use clap::Parser;
use hostwatch_core::Config;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "hostwatch-tui", about = "System health and security monitor", version)]
pub struct Cli {
    /// JSON config file; flags given on the command line take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// CPU usage warning threshold (%)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub cpu: Option<u8>,

    /// Memory usage warning threshold (%)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub memory: Option<u8>,

    /// Disk usage warning threshold (%)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub disk: Option<u8>,

    /// Network usage warning threshold (MB/s)
    #[arg(long)]
    pub network: Option<f64>,

    /// Directories to scan for insecure files
    #[arg(long = "insecure-dirs", num_args = 0..)]
    pub insecure_dirs: Option<Vec<PathBuf>>,

    /// Sender email address
    #[arg(long)]
    pub email_from: Option<String>,

    /// Recipient email address
    #[arg(long)]
    pub email_to: Option<String>,

    /// SMTP server address
    #[arg(long)]
    pub smtp_server: Option<String>,

    /// SMTP server port
    #[arg(long)]
    pub smtp_port: Option<u16>,

    #[arg(long)]
    pub smtp_username: Option<String>,

    #[arg(long)]
    pub smtp_password: Option<String>,

    /// Directory for the warning and network log files
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Log alerts without sending email
    #[arg(long)]
    pub no_email: bool,
}

impl Cli {
    pub fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(cpu) = self.cpu {
            config.thresholds.cpu_pct = cpu;
        }
        if let Some(memory) = self.memory {
            config.thresholds.memory_pct = memory;
        }
        if let Some(disk) = self.disk {
            config.thresholds.disk_pct = disk;
        }
        if let Some(network) = self.network {
            config.thresholds.network_mbps = network;
        }
        if let Some(dirs) = self.insecure_dirs {
            config.scan_dirs = dirs;
        }

        let email = &mut config.email;
        if let Some(from) = self.email_from {
            email.from = from;
        }
        if let Some(to) = self.email_to {
            email.to = to;
        }
        if let Some(host) = self.smtp_server {
            email.smtp_host = host;
        }
        if let Some(port) = self.smtp_port {
            email.smtp_port = port;
        }
        if let Some(username) = self.smtp_username {
            email.username = username;
        }
        if let Some(password) = self.smtp_password {
            email.password = password;
        }

        if let Some(log_dir) = self.log_dir {
            config.log_dir = log_dir;
        }
        if self.no_email {
            config.notifications_enabled = false;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("hostwatch-tui").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn no_flags_gives_defaults() {
        assert_eq!(parse(&[]).into_config().unwrap(), Config::default());
    }

    #[test]
    fn flags_override_thresholds_and_email() {
        let config = parse(&[
            "--cpu",
            "70",
            "--network",
            "12.5",
            "--insecure-dirs",
            "/srv",
            "/opt",
            "--smtp-server",
            "mail.internal",
            "--smtp-port",
            "2525",
            "--no-email",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.thresholds.cpu_pct, 70);
        assert_eq!(config.thresholds.memory_pct, 80);
        assert_eq!(config.thresholds.network_mbps, 12.5);
        assert_eq!(config.scan_dirs, vec![PathBuf::from("/srv"), PathBuf::from("/opt")]);
        assert_eq!(config.email.smtp_host, "mail.internal");
        assert_eq!(config.email.smtp_port, 2525);
        assert!(!config.notifications_enabled);
    }

    #[test]
    fn percent_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["hostwatch-tui", "--cpu", "150"]).is_err());
    }

    #[test]
    fn flags_take_precedence_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "thresholds": {{ "cpu_pct": 60, "disk_pct": 70 }} }}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = parse(&["--config", &path, "--cpu", "65"]).into_config().unwrap();

        assert_eq!(config.thresholds.cpu_pct, 65);
        assert_eq!(config.thresholds.disk_pct, 70);
    }

    #[test]
    fn bare_insecure_dirs_flag_clears_scan_list() {
        let config = parse(&["--insecure-dirs"]).into_config().unwrap();
        assert!(config.scan_dirs.is_empty());
    }

    #[test]
    fn invalid_network_threshold_fails_validation() {
        assert!(parse(&["--network=-3"]).into_config().is_err());
    }
}
