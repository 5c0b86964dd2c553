//! The two append-only log streams.
//!
//! Every WARN-or-above record lands in the warnings file. The per-tick
//! network-rate records are emitted on [`NETWORK_TARGET`] at INFO and land in
//! the network file. Both files are line oriented (`timestamp LEVEL message`)
//! and are read back by the display for its log tabs.

use crate::error::LoggingError;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Target of the per-tick network-rate records.
pub const NETWORK_TARGET: &str = "hostwatch::network";

pub const WARNINGS_LOG_FILE: &str = "hostwatch-warnings.log";
pub const NETWORK_LOG_FILE: &str = "hostwatch-network.log";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    pub warnings: PathBuf,
    pub network: PathBuf,
}

impl LogPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            warnings: dir.join(WARNINGS_LOG_FILE),
            network: dir.join(NETWORK_LOG_FILE),
        }
    }
}

/// Keeps the background writers alive; dropping it flushes both files.
pub struct LogGuards {
    _warnings: WorkerGuard,
    _network: WorkerGuard,
}

pub fn warning_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_filter(LevelFilter::WARN)
}

pub fn network_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_filter(Targets::new().with_target(NETWORK_TARGET, Level::INFO))
}

/// Installs the global subscriber writing both streams under `log_dir`.
pub fn init(log_dir: &Path) -> Result<LogGuards, LoggingError> {
    std::fs::create_dir_all(log_dir).map_err(|source| LoggingError::Io {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let (warnings, warnings_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, WARNINGS_LOG_FILE));
    let (network, network_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, NETWORK_LOG_FILE));

    tracing_subscriber::registry()
        .with(warning_layer(warnings))
        .with(network_layer(network))
        .try_init()?;

    Ok(LogGuards {
        _warnings: warnings_guard,
        _network: network_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_split_between_streams() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LogPaths::in_dir(dir.path());

        let subscriber = tracing_subscriber::registry()
            .with(warning_layer(tracing_appender::rolling::never(dir.path(), WARNINGS_LOG_FILE)))
            .with(network_layer(tracing_appender::rolling::never(dir.path(), NETWORK_LOG_FILE)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: NETWORK_TARGET, "Sent: 1.00 MB/s, Recv: 2.00 MB/s");
            tracing::warn!("High network usage detected!");
            tracing::info!("routine record that goes nowhere");
        });

        let warnings = std::fs::read_to_string(&paths.warnings).unwrap();
        let network = std::fs::read_to_string(&paths.network).unwrap();

        assert_eq!(warnings.lines().count(), 1);
        assert!(warnings.contains("WARN"));
        assert!(warnings.contains("High network usage detected!"));

        assert_eq!(network.lines().count(), 1);
        assert!(network.contains("INFO"));
        assert!(network.contains("Sent: 1.00 MB/s, Recv: 2.00 MB/s"));
        assert!(!network.contains("routine record"));
    }

    #[test]
    fn streams_append_across_writers() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LogPaths::in_dir(dir.path());

        for round in 0..2 {
            let subscriber = tracing_subscriber::registry().with(warning_layer(
                tracing_appender::rolling::never(dir.path(), WARNINGS_LOG_FILE),
            ));
            tracing::subscriber::with_default(subscriber, || {
                tracing::warn!("round {}", round);
            });
        }

        let warnings = std::fs::read_to_string(&paths.warnings).unwrap();
        assert_eq!(warnings.lines().count(), 2);
    }

    #[test]
    fn log_paths_use_fixed_file_names() {
        let paths = LogPaths::in_dir("/var/log/hostwatch");
        assert_eq!(paths.warnings, Path::new("/var/log/hostwatch/hostwatch-warnings.log"));
        assert_eq!(paths.network, Path::new("/var/log/hostwatch/hostwatch-network.log"));
    }
}
