use hostwatch_core::{BreachFlags, Config, LogPaths, MetricSnapshot, MonitorUpdate, ScanResult};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;

/// Lines kept from each log file for the Logs tab.
const LOG_TAIL_LINES: usize = 200;
/// Only the end of a log file is read when tailing.
const LOG_TAIL_BYTES: u64 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Monitoring,
    Logs,
}

pub struct App {
    pub config: Arc<Config>,
    pub log_paths: LogPaths,
    pub current_tab: Tab,
    pub snapshot: Option<MetricSnapshot>,
    pub breaches: BreachFlags,
    pub scan: Option<ScanResult>,
    pub warning_tail: Vec<String>,
    pub network_tail: Vec<String>,
    pub scroll_offset: usize,
    pub monitor_stopped: bool,
    updates: UnboundedReceiver<MonitorUpdate>,
    last_log_refresh: Option<Instant>,
    log_refresh_interval: Duration,
}

impl App {
    pub fn new(config: Arc<Config>, updates: UnboundedReceiver<MonitorUpdate>) -> Self {
        let log_paths = LogPaths::in_dir(&config.log_dir);

        Self {
            config,
            log_paths,
            current_tab: Tab::Monitoring,
            snapshot: None,
            breaches: BreachFlags::default(),
            scan: None,
            warning_tail: Vec::new(),
            network_tail: Vec::new(),
            scroll_offset: 0,
            monitor_stopped: false,
            updates,
            last_log_refresh: None,
            log_refresh_interval: Duration::from_secs(2),
        }
    }

    /// Drains pending monitor updates and re-reads the log tails when due.
    pub fn update(&mut self) {
        loop {
            match self.updates.try_recv() {
                Ok(update) => self.apply(update),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.monitor_stopped = true;
                    break;
                }
            }
        }

        let due = self
            .last_log_refresh
            .map_or(true, |at| at.elapsed() >= self.log_refresh_interval);
        if due {
            self.refresh_logs();
        }
    }

    pub fn apply(&mut self, update: MonitorUpdate) {
        match update {
            MonitorUpdate::Metrics { snapshot, breaches } => {
                self.snapshot = Some(snapshot);
                self.breaches = breaches;
            }
            MonitorUpdate::Scan(result) => {
                let count = result.insecure_files.len();
                if self.scroll_offset >= count {
                    self.scroll_offset = count.saturating_sub(1);
                }
                self.scan = Some(result);
            }
        }
    }

    pub fn refresh_logs(&mut self) {
        self.warning_tail = tail_lines(&self.log_paths.warnings, LOG_TAIL_LINES).unwrap_or_default();
        self.network_tail = tail_lines(&self.log_paths.network, LOG_TAIL_LINES).unwrap_or_default();
        self.last_log_refresh = Some(Instant::now());
    }

    pub fn next_tab(&mut self) {
        self.current_tab = match self.current_tab {
            Tab::Monitoring => Tab::Logs,
            Tab::Logs => Tab::Monitoring,
        };
    }

    pub fn set_tab(&mut self, index: usize) {
        self.current_tab = match index {
            0 => Tab::Monitoring,
            _ => Tab::Logs,
        };
    }

    pub fn get_tab_index(&self) -> usize {
        match self.current_tab {
            Tab::Monitoring => 0,
            Tab::Logs => 1,
        }
    }

    pub fn scroll_up(&mut self, amount: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(amount);
    }

    pub fn scroll_down(&mut self, amount: usize) {
        let count = self.scan.as_ref().map_or(0, |s| s.insecure_files.len());
        self.scroll_offset = (self.scroll_offset + amount).min(count.saturating_sub(1));
    }
}

/// Last `max_lines` lines of a log file; a missing file has no lines.
pub fn tail_lines(path: &Path, max_lines: usize) -> io::Result<Vec<String>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let len = file.metadata()?.len();
    let start = len.saturating_sub(LOG_TAIL_BYTES);
    // One byte before the window tells whether its first line is whole
    file.seek(SeekFrom::Start(start.saturating_sub(1)))?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;

    let window: &[u8] = match buf.split_first() {
        Some((&before, rest)) if start > 0 => {
            if before == b'\n' {
                rest
            } else {
                match rest.iter().position(|&b| b == b'\n') {
                    Some(end) => &rest[end + 1..],
                    None => &[],
                }
            }
        }
        _ => &buf,
    };
    let text = String::from_utf8_lossy(window);
    let lines: Vec<&str> = text.lines().collect();

    let skip = lines.len().saturating_sub(max_lines);
    Ok(lines[skip..].iter().map(|l| l.to_string()).collect())
}
