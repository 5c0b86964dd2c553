use crate::alert::{AlertDispatcher, AlertKind, Notifier, SmtpNotifier};
use crate::config::Config;
use crate::metrics::{BreachFlags, MetricSnapshot};
use crate::sampler::{MetricSampler, MetricSource, SysinfoSource};
use crate::scanner::{ScanResult, SecurityScanner};
use crate::threshold;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Nominal fast-loop period. The blocking CPU sample takes about as long, so
/// the effective period is the tick duration.
pub const METRICS_INTERVAL: Duration = Duration::from_millis(1000);
pub const SCAN_INTERVAL: Duration = Duration::from_millis(60_000);
/// A metrics tick slower than this raises a performance alert.
pub const SLOW_TICK_BUDGET: Duration = Duration::from_secs(2);

/// What the loops publish to the display.
#[derive(Debug, Clone)]
pub enum MonitorUpdate {
    Metrics {
        snapshot: MetricSnapshot,
        breaches: BreachFlags,
    },
    Scan(ScanResult),
}

/// Fast loop: sample, evaluate, log, alert, publish.
pub struct MetricsLoop<S> {
    config: Arc<Config>,
    sampler: Arc<Mutex<MetricSampler<S>>>,
    dispatcher: Arc<AlertDispatcher>,
    updates: UnboundedSender<MonitorUpdate>,
    slow_tick_budget: Duration,
}

impl<S: MetricSource + 'static> MetricsLoop<S> {
    pub async fn tick(&self) -> Option<(MetricSnapshot, BreachFlags)> {
        let started = Instant::now();

        let sampler = self.sampler.clone();
        let sampled = tokio::task::spawn_blocking(move || {
            let mut sampler = sampler.lock();
            sampler.sample()
        })
        .await;
        let snapshot = match sampled {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Metric sampling failed: {}", e);
                return None;
            }
        };

        let breaches = threshold::evaluate(&snapshot, &self.config.thresholds);
        self.dispatcher.record_network_rate(&snapshot);

        if breaches.network {
            let message = format!(
                "High network usage detected! Sent: {:.2} MB/s, Recv: {:.2} MB/s",
                snapshot.sent_mbps, snapshot.recv_mbps
            );
            self.dispatcher
                .dispatch(AlertKind::NetworkUsage, &message, chrono::Utc::now())
                .await;
        }

        let elapsed = started.elapsed();
        if elapsed > self.slow_tick_budget {
            let message = format!(
                "Metrics tick is too slow! Execution time: {:.2} seconds",
                elapsed.as_secs_f64()
            );
            self.dispatcher
                .dispatch(AlertKind::SlowExecution, &message, chrono::Utc::now())
                .await;
        }

        publish(
            &self.updates,
            MonitorUpdate::Metrics {
                snapshot: snapshot.clone(),
                breaches,
            },
        );
        Some((snapshot, breaches))
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(METRICS_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}

/// Slow loop: security scan, publish.
pub struct ScanLoop {
    config: Arc<Config>,
    scanner: Arc<SecurityScanner>,
    updates: UnboundedSender<MonitorUpdate>,
}

impl ScanLoop {
    pub async fn tick(&self) -> Option<ScanResult> {
        let scanner = self.scanner.clone();
        let config = self.config.clone();

        let result = match tokio::task::spawn_blocking(move || scanner.scan(&config.scan_dirs)).await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Security scan failed: {}", e);
                return None;
            }
        };

        publish(&self.updates, MonitorUpdate::Scan(result.clone()));
        Some(result)
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval(SCAN_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}

fn publish(updates: &UnboundedSender<MonitorUpdate>, update: MonitorUpdate) {
    // The display may be gone; monitoring and alerting carry on without it
    if updates.send(update).is_err() {
        tracing::trace!("update receiver dropped");
    }
}

/// Owns both periodic loops and the state they share.
pub struct MonitorScheduler<S> {
    metrics: MetricsLoop<S>,
    scan: ScanLoop,
}

impl<S: MetricSource + 'static> MonitorScheduler<S> {
    pub fn new(
        config: Arc<Config>,
        source: S,
        dispatcher: Arc<AlertDispatcher>,
        scanner: Arc<SecurityScanner>,
        updates: UnboundedSender<MonitorUpdate>,
    ) -> Self {
        Self {
            metrics: MetricsLoop {
                config: config.clone(),
                sampler: Arc::new(Mutex::new(MetricSampler::new(source))),
                dispatcher,
                updates: updates.clone(),
                slow_tick_budget: SLOW_TICK_BUDGET,
            },
            scan: ScanLoop {
                config,
                scanner,
                updates,
            },
        }
    }

    pub fn metrics_loop(&self) -> &MetricsLoop<S> {
        &self.metrics
    }

    pub fn scan_loop(&self) -> &ScanLoop {
        &self.scan
    }

    /// Starts both loops on the current tokio runtime.
    pub fn spawn(self) -> MonitorHandle {
        tracing::debug!(
            metrics_interval_ms = METRICS_INTERVAL.as_millis() as u64,
            scan_interval_ms = SCAN_INTERVAL.as_millis() as u64,
            "starting monitor loops"
        );

        MonitorHandle {
            metrics: tokio::spawn(self.metrics.run()),
            scan: tokio::spawn(self.scan.run()),
        }
    }
}

impl MonitorScheduler<SysinfoSource> {
    /// Production wiring: sysinfo metrics, SMTP alerts, native scanner.
    pub fn from_config(config: Arc<Config>, updates: UnboundedSender<MonitorUpdate>) -> Self {
        let notifier: Option<Arc<dyn Notifier>> = if config.notifications_enabled {
            Some(Arc::new(SmtpNotifier::new(config.email.clone())))
        } else {
            None
        };
        let dispatcher = Arc::new(AlertDispatcher::new(notifier, config.cooldown));

        Self::new(
            config,
            SysinfoSource::new(),
            dispatcher,
            Arc::new(SecurityScanner::native()),
            updates,
        )
    }
}

pub struct MonitorHandle {
    metrics: JoinHandle<()>,
    scan: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stops both loops; in-flight blocking work finishes in the background.
    pub fn abort(&self) {
        self.metrics.abort();
        self.scan.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::tests::RecordingNotifier;
    use crate::platform::{ListenerCommand, PlatformAdapter};
    use crate::sampler::tests::ScriptedSource;
    use std::io;
    use std::path::Path;
    use std::sync::atomic::Ordering;
    use tokio::sync::mpsc;

    const MIB: u64 = 1024 * 1024;

    struct EchoAdapter;

    impl PlatformAdapter for EchoAdapter {
        fn open_ports_command(&self) -> ListenerCommand {
            ListenerCommand {
                program: "hostwatch-no-such-command",
                args: &[],
            }
        }

        fn is_insecure(&self, path: &Path) -> io::Result<bool> {
            Ok(path.extension().is_some_and(|ext| ext == "pub"))
        }
    }

    struct Harness {
        scheduler: MonitorScheduler<ScriptedSource>,
        notifier: Arc<RecordingNotifier>,
        updates: mpsc::UnboundedReceiver<MonitorUpdate>,
    }

    fn harness(source: ScriptedSource, scan_dirs: Vec<std::path::PathBuf>) -> Harness {
        let config = Arc::new(Config {
            scan_dirs,
            ..Config::default()
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let dispatcher = Arc::new(AlertDispatcher::new(
            Some(notifier.clone() as Arc<dyn Notifier>),
            config.cooldown,
        ));
        let (tx, rx) = mpsc::unbounded_channel();

        Harness {
            scheduler: MonitorScheduler::new(
                config,
                source,
                dispatcher,
                Arc::new(SecurityScanner::new(Arc::new(EchoAdapter))),
                tx,
            ),
            notifier,
            updates: rx,
        }
    }

    #[tokio::test]
    async fn metrics_tick_publishes_snapshot_and_flags() {
        let mut source = ScriptedSource::new(vec![(0, 0)]);
        source.cpu = 85.0;
        source.memory = 50.0;
        source.disk = 95.0;
        let mut h = harness(source, vec![]);

        h.scheduler.metrics_loop().tick().await.unwrap();

        match h.updates.recv().await.unwrap() {
            MonitorUpdate::Metrics { snapshot, breaches } => {
                assert_eq!(snapshot.cpu_pct, 85.0);
                assert_eq!(snapshot.sent_mbps, 0.0);
                assert_eq!(
                    breaches,
                    BreachFlags {
                        cpu: true,
                        memory: false,
                        disk: true,
                        network: false,
                    }
                );
            }
            other => panic!("unexpected update {:?}", other),
        }
        assert_eq!(h.notifier.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn network_breach_alerts_once_per_cooldown() {
        let source = ScriptedSource::new(vec![(0, 0), (200 * MIB, 0), (400 * MIB, 0), (600 * MIB, 0)]);
        let h = harness(source, vec![]);
        let metrics = h.scheduler.metrics_loop();

        let (_, first) = metrics.tick().await.unwrap();
        assert!(!first.network);

        for _ in 0..3 {
            let (snapshot, breaches) = metrics.tick().await.unwrap();
            assert_eq!(snapshot.sent_mbps, 200.0);
            assert!(breaches.network);
        }

        assert_eq!(h.notifier.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(
            *h.notifier.subjects.lock(),
            vec!["Network Monitor Warning".to_string()]
        );
    }

    #[tokio::test]
    async fn slow_tick_raises_performance_alert() {
        let mut h = harness(ScriptedSource::new(vec![(0, 0)]), vec![]);
        h.scheduler.metrics.slow_tick_budget = Duration::ZERO;

        h.scheduler.metrics_loop().tick().await.unwrap();

        assert_eq!(
            *h.notifier.subjects.lock(),
            vec!["Performance Warning".to_string()]
        );
    }

    #[tokio::test]
    async fn fast_tick_within_budget_is_quiet() {
        let h = harness(ScriptedSource::new(vec![(0, 0)]), vec![]);
        h.scheduler.metrics_loop().tick().await.unwrap();
        assert_eq!(h.notifier.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ticks_continue_after_display_goes_away() {
        let h = harness(ScriptedSource::new(vec![(0, 0)]), vec![]);
        drop(h.updates);

        assert!(h.scheduler.metrics_loop().tick().await.is_some());
        assert!(h.scheduler.scan_loop().tick().await.is_some());
    }

    #[tokio::test]
    async fn scan_tick_publishes_result() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("key.pub"), "x").unwrap();
        std::fs::write(dir.path().join("key"), "x").unwrap();
        let mut h = harness(ScriptedSource::new(vec![(0, 0)]), vec![dir.path().to_path_buf()]);

        h.scheduler.scan_loop().tick().await.unwrap();

        match h.updates.recv().await.unwrap() {
            MonitorUpdate::Scan(result) => {
                assert_eq!(result.insecure_files, vec![dir.path().join("key.pub")]);
                assert!(result.open_ports.starts_with("Error retrieving open ports:"));
            }
            other => panic!("unexpected update {:?}", other),
        }
    }

    #[tokio::test]
    async fn scan_tick_without_directories_still_lists_ports() {
        let mut h = harness(ScriptedSource::new(vec![(0, 0)]), vec![]);

        h.scheduler.scan_loop().tick().await.unwrap();

        match h.updates.recv().await.unwrap() {
            MonitorUpdate::Scan(result) => {
                assert!(result.insecure_files.is_empty());
                assert!(!result.open_ports.is_empty());
            }
            other => panic!("unexpected update {:?}", other),
        }
    }

    #[tokio::test]
    async fn spawned_loops_publish_both_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let Harness {
            scheduler,
            mut updates,
            ..
        } = harness(ScriptedSource::new(vec![(0, 0)]), vec![dir.path().to_path_buf()]);
        let handle = scheduler.spawn();

        let mut saw_metrics = false;
        let mut saw_scan = false;
        while !(saw_metrics && saw_scan) {
            let update = tokio::time::timeout(Duration::from_secs(5), updates.recv())
                .await
                .expect("loops stalled")
                .expect("channel closed");
            match update {
                MonitorUpdate::Metrics { .. } => saw_metrics = true,
                MonitorUpdate::Scan(_) => saw_scan = true,
            }
        }

        handle.abort();
    }
}
