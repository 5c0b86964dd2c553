use crate::metrics::{MetricSnapshot, NetworkCounters, BYTES_PER_MIB};
use std::path::Path;
use std::time::Duration;
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, Networks, RefreshKind, System};

/// CPU utilisation is averaged over this window. It also paces the fast loop.
pub const CPU_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Raw host readings behind the sampler.
pub trait MetricSource: Send {
    /// Blocks for `window` and returns the global CPU usage over it.
    fn cpu_percent(&mut self, window: Duration) -> f32;
    fn memory_percent(&mut self) -> f32;
    fn disk_percent(&mut self) -> f32;
    fn network_counters(&mut self) -> NetworkCounters;
}

pub struct SysinfoSource {
    system: System,
    disks: Disks,
    networks: Networks,
}

impl SysinfoSource {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::new().with_cpu_usage())
                .with_memory(MemoryRefreshKind::new().with_ram()),
        );

        Self {
            system,
            disks: Disks::new_with_refreshed_list(),
            networks: Networks::new_with_refreshed_list(),
        }
    }

    fn root_mount() -> &'static Path {
        if cfg!(windows) {
            Path::new("C:\\")
        } else {
            Path::new("/")
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for SysinfoSource {
    fn cpu_percent(&mut self, window: Duration) -> f32 {
        // sysinfo computes usage as the difference between two refreshes
        self.system.refresh_cpu_usage();
        std::thread::sleep(window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
        self.system.refresh_cpu_usage();
        self.system.global_cpu_usage()
    }

    fn memory_percent(&mut self) -> f32 {
        self.system.refresh_memory();
        percent(self.system.used_memory(), self.system.total_memory())
    }

    fn disk_percent(&mut self) -> f32 {
        self.disks.refresh();
        let root = Self::root_mount();

        match self.disks.iter().find(|disk| disk.mount_point() == root) {
            Some(disk) => {
                let total = disk.total_space();
                percent(total.saturating_sub(disk.available_space()), total)
            }
            None => {
                tracing::debug!(mount = %root.display(), "root filesystem not found among disks");
                0.0
            }
        }
    }

    fn network_counters(&mut self) -> NetworkCounters {
        self.networks.refresh();

        self.networks
            .iter()
            .fold(NetworkCounters::default(), |acc, (_, data)| NetworkCounters {
                bytes_sent: acc.bytes_sent + data.total_transmitted(),
                bytes_recv: acc.bytes_recv + data.total_received(),
            })
    }
}

fn percent(used: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64 * 100.0) as f32
}

/// Produces one `MetricSnapshot` per call and owns the previous network
/// counters used for the rate.
pub struct MetricSampler<S> {
    source: S,
    previous: Option<NetworkCounters>,
    cpu_window: Duration,
}

impl<S: MetricSource> MetricSampler<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            previous: None,
            cpu_window: CPU_SAMPLE_WINDOW,
        }
    }

    /// Blocks for the CPU measurement window.
    pub fn sample(&mut self) -> MetricSnapshot {
        let cpu_pct = self.source.cpu_percent(self.cpu_window);
        let memory_pct = self.source.memory_percent();
        let disk_pct = self.source.disk_percent();

        let current = self.source.network_counters();
        let (sent_mbps, recv_mbps) = self.advance_counters(current);

        MetricSnapshot {
            timestamp: chrono::Utc::now(),
            cpu_pct,
            memory_pct,
            disk_pct,
            sent_mbps,
            recv_mbps,
        }
    }

    /// Rates in MiB since the previous call. The first call seeds the state
    /// and reports zero; counters that went backwards also report zero.
    fn advance_counters(&mut self, current: NetworkCounters) -> (f64, f64) {
        let previous = self.previous.replace(current).unwrap_or(current);

        let sent = current.bytes_sent.saturating_sub(previous.bytes_sent);
        let recv = current.bytes_recv.saturating_sub(previous.bytes_recv);

        (sent as f64 / BYTES_PER_MIB, recv as f64 / BYTES_PER_MIB)
    }

    #[cfg(test)]
    pub(crate) fn previous_counters(&self) -> Option<NetworkCounters> {
        self.previous
    }
}
