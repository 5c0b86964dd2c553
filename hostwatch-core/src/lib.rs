pub mod alert;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod platform;
pub mod sampler;
pub mod scanner;
pub mod scheduler;
pub mod threshold;

pub use alert::{AlertDispatcher, AlertKind, DispatchOutcome, Notifier, SmtpNotifier};
pub use config::{Config, EmailConfig, Thresholds};
pub use error::{ConfigError, LoggingError, NotifyError, ScanError};
pub use logging::LogPaths;
pub use metrics::*;
pub use platform::{PlatformAdapter, PosixAdapter, WindowsAdapter};
pub use sampler::{MetricSampler, MetricSource, SysinfoSource};
pub use scanner::{ScanResult, SecurityScanner};
pub use scheduler::{MonitorHandle, MonitorScheduler, MonitorUpdate};
