use std::io::Write;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Structured payload handed to the notification seam.
#[derive(Debug, Clone)]
pub struct Notification {
    pub text: String,
    pub severity_high: bool,
    pub audible: bool,
}

/// Presentation seam. The monitor loop talks to this and nothing else;
/// concrete delivery (webhook, sound, log output) lives behind it.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Fans one notification out to every configured delivery mechanism.
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(sinks: Vec<Arc<dyn Notifier>>) -> Self {
        Self { sinks }
    }
}

impl Notifier for FanoutNotifier {
    fn notify(&self, notification: Notification) {
        for sink in &self.sinks {
            sink.notify(notification.clone());
        }
    }
}

/// Status line presentation for a headless process: notifications land in
/// the diagnostic log.
pub struct TraceNotifier;

impl Notifier for TraceNotifier {
    fn notify(&self, notification: Notification) {
        let text = notification.text.replace('\n', " | ");
        if notification.severity_high {
            warn!("{text}");
        } else {
            info!("{text}");
        }
    }
}

/// Pushes status text to a webhook as an embed, colored by severity.
/// Delivery is fire-and-forget; a failed post is a diagnostic, not an
/// error.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, notification: Notification) {
        let client = self.client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            let color = if notification.severity_high { 0xE74C3C } else { 0x2ECC71 };
            let payload = serde_json::json!({
                "username": "HostPulse",
                "embeds": [{
                    "title": "Host status",
                    "description": notification.text,
                    "color": color,
                    "timestamp": Utc::now().to_rfc3339(),
                }]
            });
            if let Err(e) = client.post(&url).json(&payload).send().await {
                debug!(error = %e, "webhook delivery failed");
            }
        });
    }
}

/// Playback backend for the audible alert.
pub trait AlertPlayer: Send + Sync {
    /// Begin playback, replacing any playback already in progress.
    fn start(&self);
    /// Whether the most recently started playback is still running.
    fn is_playing(&self) -> bool;
}

/// Delay between starting playback and the repetition check.
const REPEAT_CHECK_DELAY: Duration = Duration::from_secs(3);

/// Audible alert delivery with a best-effort emphasis heuristic: when more
/// than one repetition is configured, re-check after a fixed delay and
/// trigger one extra playback unless the first is still audible. A new
/// alert replaces a still-pending one; alerts never stack.
pub struct Alerter {
    player: Arc<dyn AlertPlayer>,
    repeat: u32,
    current: Mutex<Option<CancellationToken>>,
}

impl Alerter {
    pub fn new(player: Arc<dyn AlertPlayer>, repeat: u32) -> Self {
        Self {
            player,
            repeat: repeat.max(1),
            current: Mutex::new(None),
        }
    }

    /// Start playback on its own task so a slow audio subsystem can never
    /// stall the polling loop.
    pub fn trigger(&self) {
        let token = CancellationToken::new();
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let player = Arc::clone(&self.player);
        let repeat = self.repeat;
        tokio::spawn(async move {
            player.start();
            if repeat > 1 {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(REPEAT_CHECK_DELAY) => {}
                }
                if !player.is_playing() {
                    player.start();
                }
            }
        });
    }
}

impl Notifier for Alerter {
    fn notify(&self, notification: Notification) {
        if notification.audible {
            self.trigger();
        }
    }
}

/// Plays the alert by spawning a user-configured command (for example
/// `paplay alert.ogg`). A command that cannot be spawned falls back to the
/// default sound.
pub struct CommandPlayer {
    command: String,
    child: Mutex<Option<Child>>,
}

impl CommandPlayer {
    pub fn new(command: String) -> Self {
        Self {
            command,
            child: Mutex::new(None),
        }
    }
}

impl AlertPlayer for CommandPlayer {
    fn start(&self) {
        let mut slot = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut previous) = slot.take() {
            let _ = previous.start_kill();
        }
        let spawned = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(child) => *slot = Some(child),
            Err(e) => {
                warn!(command = %self.command, error = %e, "alert playback failed, using default sound");
                BellPlayer.start();
            }
        }
    }

    fn is_playing(&self) -> bool {
        let mut slot = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

/// Default sound: the terminal bell.
pub struct BellPlayer;

impl AlertPlayer for BellPlayer {
    fn start(&self) {
        let mut out = std::io::stdout();
        let _ = out.write_all(b"\x07");
        let _ = out.flush();
    }

    fn is_playing(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FakePlayer {
        plays: AtomicUsize,
        playing: AtomicBool,
    }

    impl FakePlayer {
        fn new(playing: bool) -> Arc<Self> {
            Arc::new(Self {
                plays: AtomicUsize::new(0),
                playing: AtomicBool::new(playing),
            })
        }
    }

    impl AlertPlayer for FakePlayer {
        fn start(&self) {
            self.plays.fetch_add(1, Ordering::SeqCst);
        }

        fn is_playing(&self) -> bool {
            self.playing.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn single_repeat_plays_once() {
        let player = FakePlayer::new(false);
        let alerter = Alerter::new(Arc::clone(&player) as Arc<dyn AlertPlayer>, 1);

        alerter.trigger();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(player.plays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_playback_is_repeated() {
        let player = FakePlayer::new(false);
        let alerter = Alerter::new(Arc::clone(&player) as Arc<dyn AlertPlayer>, 2);

        alerter.trigger();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(player.plays.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn still_playing_suppresses_repeat() {
        let player = FakePlayer::new(true);
        let alerter = Alerter::new(Arc::clone(&player) as Arc<dyn AlertPlayer>, 2);

        alerter.trigger();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(player.plays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retrigger_cancels_pending_repeat() {
        let player = FakePlayer::new(false);
        let alerter = Alerter::new(Arc::clone(&player) as Arc<dyn AlertPlayer>, 2);

        alerter.trigger();
        tokio::time::sleep(Duration::from_secs(1)).await;
        // The second alert replaces the first before its repeat check
        // fires, so only the second one repeats.
        alerter.trigger();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(player.plays.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn non_audible_notification_does_not_play() {
        let player = FakePlayer::new(false);
        let alerter = Alerter::new(Arc::clone(&player) as Arc<dyn AlertPlayer>, 2);

        alerter.notify(Notification {
            text: "Server is UP".into(),
            severity_high: false,
            audible: false,
        });
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(player.plays.load(Ordering::SeqCst), 0);
    }
}
