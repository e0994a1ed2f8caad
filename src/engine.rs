use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::alert::{Notification, Notifier};
use crate::config::MonitorConfig;
use crate::models::{MonitorStatus, SessionStatus, StatusEntry};
use crate::probe::{self, Prober};
use crate::store::LogStore;

/// Synchronous session-start rejection.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("invalid host {0:?}: must start with https:// and name a valid domain")]
    InvalidHost(String),
    #[error("poll interval must be greater than zero")]
    ZeroInterval,
}

/// The per-tick state machine.
///
/// Owns the previous-tick status exclusively; observers only ever see the
/// derived [`SessionStatus`] through the watch channel.
struct Engine {
    config: MonitorConfig,
    prober: Arc<dyn Prober>,
    store: Arc<LogStore>,
    notifier: Arc<dyn Notifier>,
    status_tx: Arc<watch::Sender<SessionStatus>>,
    prev: Option<MonitorStatus>,
}

impl Engine {
    /// Resolve the current status: no internet trumps the host probe, and
    /// the host probe is only consulted when connectivity exists.
    async fn resolve_status(&self) -> MonitorStatus {
        if !self.prober.is_internet_available().await {
            MonitorStatus::NoInternet
        } else if !self.prober.is_host_reachable(&self.config.host).await {
            MonitorStatus::Down
        } else {
            MonitorStatus::Up
        }
    }

    /// One polling tick: resolve, publish, and on a status change persist
    /// a log entry and raise the alert. An unchanged status only
    /// refreshes the displayed timestamp, silently.
    async fn tick(&mut self) {
        let current = self.resolve_status().await;
        let _ = self.status_tx.send(current.into());

        let changed = self.prev != Some(current);
        let text = self.status_text(current);

        if changed {
            self.store
                .append(&StatusEntry::new(current.is_down(), self.log_message(current)));
            self.notifier.notify(Notification {
                text,
                severity_high: current.is_down(),
                audible: current.is_down(),
            });
        } else {
            self.notifier.notify(Notification {
                text,
                severity_high: current.is_down(),
                audible: false,
            });
        }

        self.prev = Some(current);
    }

    fn log_message(&self, status: MonitorStatus) -> String {
        match status {
            MonitorStatus::NoInternet => "No Internet Connection".to_string(),
            MonitorStatus::Down => format!("Host {} is DOWN", self.config.host),
            MonitorStatus::Up => format!("Host {} is UP", self.config.host),
        }
    }

    fn status_text(&self, status: MonitorStatus) -> String {
        let stamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
        match status {
            MonitorStatus::NoInternet => format!("Waiting for internet...\nLast check: {stamp}"),
            MonitorStatus::Down => {
                format!("Alert: {} is DOWN!\nLast check: {stamp}", self.config.host)
            }
            MonitorStatus::Up => {
                format!("Server is UP: {}\nLast check: {stamp}", self.config.host)
            }
        }
    }

    async fn run(mut self, cancel: CancellationToken) {
        info!(
            host = %self.config.host,
            interval_secs = self.config.poll_interval_secs,
            "monitoring started"
        );
        self.store.append(&StatusEntry::new(
            false,
            format!(
                "Started monitoring {} (every {})",
                self.config.host,
                human_interval(self.config.poll_interval_secs)
            ),
        ));
        let _ = self.status_tx.send(SessionStatus::Monitoring);

        let interval = Duration::from_secs(self.config.poll_interval_secs);
        loop {
            self.tick().await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!("monitoring loop exited");
    }
}

fn human_interval(secs: u64) -> String {
    if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

struct Session {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the at-most-one active monitoring session per process and the
/// published session status.
pub struct Controller {
    config: MonitorConfig,
    store: Arc<LogStore>,
    prober: Arc<dyn Prober>,
    notifier: Arc<dyn Notifier>,
    status_tx: Arc<watch::Sender<SessionStatus>>,
    session: Mutex<Option<Session>>,
}

impl Controller {
    pub fn new(
        config: MonitorConfig,
        store: Arc<LogStore>,
        prober: Arc<dyn Prober>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Idle);
        Self {
            config,
            store,
            prober,
            notifier,
            status_tx: Arc::new(status_tx),
            session: Mutex::new(None),
        }
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn current_status(&self) -> SessionStatus {
        *self.status_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Start monitoring. Returns `Ok(false)` without touching the running
    /// session when one is already active; rejects an invalid host or a
    /// zero interval before any session state changes.
    pub async fn start(&self) -> Result<bool, StartError> {
        if !probe::is_valid_host(&self.config.host) {
            return Err(StartError::InvalidHost(self.config.host.clone()));
        }
        if self.config.poll_interval_secs == 0 {
            return Err(StartError::ZeroInterval);
        }

        let mut session = self.session.lock().await;
        if let Some(current) = session.as_ref() {
            if !current.task.is_finished() {
                info!("monitoring already running, start ignored");
                return Ok(false);
            }
        }

        let cancel = CancellationToken::new();
        let engine = Engine {
            config: self.config.clone(),
            prober: Arc::clone(&self.prober),
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            status_tx: Arc::clone(&self.status_tx),
            prev: None,
        };
        let task = tokio::spawn(engine.run(cancel.clone()));
        *session = Some(Session { cancel, task });
        Ok(true)
    }

    /// Stop monitoring. Idempotent: always lands on `Idle` and records the
    /// stop in the log. The loop task is joined before the stopped entry
    /// is written, so no in-flight tick can append after it.
    pub async fn stop(&self) {
        let mut session = self.session.lock().await;
        if let Some(session) = session.take() {
            session.cancel.cancel();
            if let Err(e) = session.task.await {
                error!(error = %e, "monitor task join failed");
            }
        }
        self.store.append(&StatusEntry::new(false, "Monitoring stopped"));
        let _ = self.status_tx.send(SessionStatus::Idle);
    }
}
