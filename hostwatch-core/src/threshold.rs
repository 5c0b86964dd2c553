use crate::config::Thresholds;
use crate::metrics::{BreachFlags, MetricSnapshot};

/// Classifies each metric as breached when it is strictly above its limit.
pub fn evaluate(snapshot: &MetricSnapshot, thresholds: &Thresholds) -> BreachFlags {
    BreachFlags {
        cpu: snapshot.cpu_pct > f32::from(thresholds.cpu_pct),
        memory: snapshot.memory_pct > f32::from(thresholds.memory_pct),
        disk: snapshot.disk_pct > f32::from(thresholds.disk_pct),
        network: snapshot.sent_mbps > thresholds.network_mbps
            || snapshot.recv_mbps > thresholds.network_mbps,
    }
}
