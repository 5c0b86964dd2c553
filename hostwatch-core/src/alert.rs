use crate::config::EmailConfig;
use crate::error::NotifyError;
use crate::logging::NETWORK_TARGET;
use crate::metrics::MetricSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    NetworkUsage,
    SlowExecution,
}

impl AlertKind {
    pub fn subject(&self) -> &'static str {
        match self {
            AlertKind::NetworkUsage => "Network Monitor Warning",
            AlertKind::SlowExecution => "Performance Warning",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::NetworkUsage => write!(f, "network usage"),
            AlertKind::SlowExecution => write!(f, "slow execution"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The notification went out and the cooldown window restarted.
    Sent,
    /// Another notification is in flight or the last one is too recent.
    Suppressed,
    /// The send was attempted and failed; the cooldown is unchanged.
    Failed,
    /// No notifier is configured; only the log record was written.
    LogOnly,
}

/// Outbound alert channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Sends plain-text alert emails over STARTTLS with username/password auth.
pub struct SmtpNotifier {
    config: EmailConfig,
}

impl SmtpNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, subject: &str, body: &str) -> Result<lettre::Message, NotifyError> {
        use lettre::message::header::ContentType;

        lettre::Message::builder()
            .from(self.config.from.parse()?)
            .to(self.config.to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

        let email = self.build_message(subject, body)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        mailer.send(email).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct AlertState {
    last_sent: Option<DateTime<Utc>>,
    in_flight: bool,
}

/// Releases the in-flight claim even if the send future is dropped.
struct Claim<'a> {
    state: &'a Mutex<AlertState>,
}

impl Claim<'_> {
    fn record_success(self, timestamp: DateTime<Utc>) {
        {
            let mut state = self.state.lock();
            state.last_sent = Some(match state.last_sent {
                Some(previous) if previous > timestamp => previous,
                _ => timestamp,
            });
        }
        // Dropping the claim releases in_flight
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.state.lock().in_flight = false;
    }
}

/// Writes alert records and forwards them to the notifier, at most once per
/// cooldown window across all alert kinds.
pub struct AlertDispatcher {
    notifier: Option<Arc<dyn Notifier>>,
    cooldown: Duration,
    host: String,
    state: Mutex<AlertState>,
}

impl AlertDispatcher {
    pub fn new(notifier: Option<Arc<dyn Notifier>>, cooldown: Duration) -> Self {
        Self {
            notifier,
            cooldown,
            host: sysinfo::System::host_name().unwrap_or_else(|| "unknown host".to_string()),
            state: Mutex::new(AlertState::default()),
        }
    }

    pub fn last_sent(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_sent
    }

    /// Per-tick network rate record, written regardless of thresholds.
    pub fn record_network_rate(&self, snapshot: &MetricSnapshot) {
        tracing::info!(
            target: NETWORK_TARGET,
            "Sent: {:.2} MB/s, Recv: {:.2} MB/s",
            snapshot.sent_mbps,
            snapshot.recv_mbps
        );
    }

    pub async fn dispatch(
        &self,
        kind: AlertKind,
        message: &str,
        timestamp: DateTime<Utc>,
    ) -> DispatchOutcome {
        tracing::warn!("{}", message);

        let Some(notifier) = &self.notifier else {
            return DispatchOutcome::LogOnly;
        };

        let Some(claim) = self.try_claim(timestamp) else {
            tracing::debug!(%kind, "alert email suppressed by cooldown");
            return DispatchOutcome::Suppressed;
        };

        let body = format!(
            "{}\n\nHost: {}\nTime: {}",
            message,
            self.host,
            timestamp.to_rfc3339()
        );

        match notifier.send(kind.subject(), &body).await {
            Ok(()) => {
                claim.record_success(timestamp);
                tracing::debug!(%kind, "alert email sent");
                DispatchOutcome::Sent
            }
            Err(e) => {
                drop(claim);
                tracing::warn!("Failed to send alert email: {}", e);
                DispatchOutcome::Failed
            }
        }
    }

    fn try_claim(&self, timestamp: DateTime<Utc>) -> Option<Claim<'_>> {
        let mut state = self.state.lock();
        if state.in_flight {
            return None;
        }

        if let Some(last) = state.last_sent {
            // A timestamp before the last send counts as inside the window
            let elapsed = (timestamp - last).to_std().ok()?;
            if elapsed < self.cooldown {
                return None;
            }
        }

        state.in_flight = true;
        Some(Claim { state: &self.state })
    }
}
