use serde::{Deserialize, Serialize};

/// Bytes per MiB, the unit of the network rates.
pub const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub cpu_pct: f32,
    pub memory_pct: f32,
    pub disk_pct: f32,
    pub sent_mbps: f64,
    pub recv_mbps: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreachFlags {
    pub cpu: bool,
    pub memory: bool,
    pub disk: bool,
    pub network: bool,
}

impl BreachFlags {
    pub fn any(&self) -> bool {
        self.cpu || self.memory || self.disk || self.network
    }
}

/// Cumulative byte counters summed over all network interfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
}

impl Default for MetricSnapshot {
    fn default() -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            cpu_pct: 0.0,
            memory_pct: 0.0,
            disk_pct: 0.0,
            sent_mbps: 0.0,
            recv_mbps: 0.0,
        }
    }
}
