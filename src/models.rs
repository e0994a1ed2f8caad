use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Resolved outcome of one polling tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorStatus {
    NoInternet,
    Down,
    Up,
}

impl MonitorStatus {
    /// Whether the log records this status as a "down" event.
    pub fn is_down(self) -> bool {
        !matches!(self, MonitorStatus::Up)
    }
}

/// Session state published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Idle,
    Monitoring,
    NoInternet,
    Down,
    Up,
}

impl SessionStatus {
    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Idle => "Idle",
            SessionStatus::Monitoring => "Monitoring...",
            SessionStatus::NoInternet => "No Internet",
            SessionStatus::Down => "DOWN",
            SessionStatus::Up => "UP",
        }
    }
}

impl From<MonitorStatus> for SessionStatus {
    fn from(status: MonitorStatus) -> Self {
        match status {
            MonitorStatus::NoInternet => SessionStatus::NoInternet,
            MonitorStatus::Down => SessionStatus::Down,
            MonitorStatus::Up => SessionStatus::Up,
        }
    }
}

/// One persisted log record.
///
/// Stored one per line as `<unix_millis>|<true|false>|<message>`. The
/// message is the remainder of the line, so it may itself contain the
/// separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub timestamp_millis: i64,
    pub is_down: bool,
    pub message: String,
}

impl StatusEntry {
    pub fn new(is_down: bool, message: impl Into<String>) -> Self {
        Self {
            timestamp_millis: Utc::now().timestamp_millis(),
            is_down,
            message: message.into(),
        }
    }

    /// Serialize for the log file. Newlines are flattened so one entry
    /// always occupies one line.
    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}",
            self.timestamp_millis,
            self.is_down,
            self.message.replace(['\n', '\r'], " ")
        )
    }

    /// Parse one stored line; `None` when it does not have the
    /// three-field shape.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.splitn(3, '|');
        let timestamp_millis = parts.next()?.parse().ok()?;
        let is_down = match parts.next()? {
            "true" => true,
            "false" => false,
            _ => return None,
        };
        let message = parts.next()?.to_string();
        Some(Self {
            timestamp_millis,
            is_down,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_round_trip() {
        let entry = StatusEntry {
            timestamp_millis: 1722950400123,
            is_down: true,
            message: "Host https://example.com is DOWN".into(),
        };
        let parsed = StatusEntry::parse_line(&entry.to_line()).expect("line should parse");
        assert_eq!(parsed, entry);
    }

    #[test]
    fn message_may_contain_separator() {
        let parsed = StatusEntry::parse_line("100|false|left|right|end").expect("should parse");
        assert_eq!(parsed.message, "left|right|end");
    }

    #[test]
    fn newlines_are_flattened_on_write() {
        let entry = StatusEntry {
            timestamp_millis: 5,
            is_down: false,
            message: "two\nlines".into(),
        };
        assert_eq!(entry.to_line(), "5|false|two lines");
    }

    #[test]
    fn malformed_lines_are_rejected() {
        assert!(StatusEntry::parse_line("").is_none());
        assert!(StatusEntry::parse_line("not-a-number|true|msg").is_none());
        assert!(StatusEntry::parse_line("100|maybe|msg").is_none());
        assert!(StatusEntry::parse_line("100|true").is_none());
    }

    #[test]
    fn session_status_labels() {
        assert_eq!(SessionStatus::from(MonitorStatus::NoInternet).label(), "No Internet");
        assert_eq!(SessionStatus::from(MonitorStatus::Down).label(), "DOWN");
        assert_eq!(SessionStatus::from(MonitorStatus::Up).label(), "UP");
        assert_eq!(SessionStatus::Monitoring.label(), "Monitoring...");
        assert_eq!(SessionStatus::Idle.label(), "Idle");
    }
}
