use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Monitored host, e.g. `https://example.com`.
    pub host: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// How many times a single alert should be heard (best effort).
    #[serde(default = "default_alert_repeat")]
    pub alert_repeat: u32,
    /// Command used to play the alert sound; terminal bell when unset.
    #[serde(default)]
    pub alert_sound: Option<String>,
    #[serde(default)]
    pub retention: Retention,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
}

fn default_poll_interval() -> u64 {
    300
}

fn default_alert_repeat() -> u32 {
    1
}

fn default_api_port() -> u16 {
    3000
}

fn default_log_path() -> PathBuf {
    PathBuf::from("monitor_logs.txt")
}

/// How long log entries are kept before startup pruning discards them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retention {
    Day,
    ThreeDays,
    #[default]
    Week,
    Forever,
}

impl Retention {
    /// Maximum entry age in milliseconds; `None` retains forever.
    pub fn max_age_millis(self) -> Option<i64> {
        match self {
            Retention::Day => Some(86_400_000),
            Retention::ThreeDays => Some(259_200_000),
            Retention::Week => Some(604_800_000),
            Retention::Forever => None,
        }
    }
}
