use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use tracing::warn;

use crate::config::Retention;
use crate::models::StatusEntry;

/// Append-only, line-oriented event log.
///
/// One record per line, `<unix_millis>|<true|false>|<message>`. All file
/// access is serialized behind a mutex; `prune` rewrites the file and is
/// not atomic per line. A failed write costs that one event, never the
/// caller: I/O errors are reported through the diagnostic log and
/// swallowed.
pub struct LogStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn append(&self, entry: &StatusEntry) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| writeln!(file, "{}", entry.to_line()));
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to append log entry");
        }
    }

    /// All stored entries, newest first. Lines that do not parse into the
    /// three-field shape are skipped.
    pub fn read_all(&self) -> Vec<StatusEntry> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read log file");
                return Vec::new();
            }
        };
        content
            .lines()
            .rev()
            .filter_map(StatusEntry::parse_line)
            .collect()
    }

    pub fn clear(&self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.path.exists() {
            return;
        }
        if let Err(e) = fs::write(&self.path, "") {
            warn!(path = %self.path.display(), error = %e, "failed to clear log file");
        }
    }

    /// Drop every entry older than the retention window, preserving the
    /// order of survivors. A `Forever` policy leaves the file untouched.
    pub fn prune(&self, retention: Retention) {
        let Some(max_age) = retention.max_age_millis() else {
            return;
        };
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read log file for pruning");
                return;
            }
        };

        let cutoff = Utc::now().timestamp_millis() - max_age;
        let surviving: Vec<&str> = content
            .lines()
            .filter(|line| {
                StatusEntry::parse_line(line).is_some_and(|e| e.timestamp_millis >= cutoff)
            })
            .collect();

        let mut output = surviving.join("\n");
        if !output.is_empty() {
            output.push('\n');
        }
        if let Err(e) = fs::write(&self.path, output) {
            warn!(path = %self.path.display(), error = %e, "failed to rewrite log file after pruning");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &tempfile::TempDir) -> LogStore {
        LogStore::new(dir.path().join("monitor_logs.txt"))
    }

    #[test]
    fn append_then_read_returns_entry_first() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(&dir);

        let entry = StatusEntry::new(true, "Host https://example.com is DOWN");
        store.append(&entry);

        let read = store.read_all();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0], entry);
    }

    #[test]
    fn read_all_is_newest_first() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(&dir);

        for i in 0..3 {
            store.append(&StatusEntry {
                timestamp_millis: i,
                is_down: false,
                message: format!("event {i}"),
            });
        }

        let read = store.read_all();
        assert_eq!(read[0].message, "event 2");
        assert_eq!(read[1].message, "event 1");
        assert_eq!(read[2].message, "event 0");
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(&dir);
        assert!(store.read_all().is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("monitor_logs.txt");
        fs::write(&path, "garbage\n100|true|real entry\n|||\n").expect("write");

        let store = LogStore::new(path);
        let read = store.read_all();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].message, "real entry");
    }

    #[test]
    fn clear_is_idempotent_and_append_still_works() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(&dir);

        store.append(&StatusEntry::new(false, "before clear"));
        store.clear();
        store.clear();
        assert!(store.read_all().is_empty());

        let entry = StatusEntry::new(false, "after clear");
        store.append(&entry);
        let read = store.read_all();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0], entry);
    }

    #[test]
    fn prune_drops_only_expired_entries_in_order() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(&dir);
        let now = Utc::now().timestamp_millis();

        store.append(&StatusEntry {
            timestamp_millis: now - 2 * 86_400_000,
            is_down: true,
            message: "two days old".into(),
        });
        store.append(&StatusEntry {
            timestamp_millis: now - 3_600_000,
            is_down: false,
            message: "one hour old".into(),
        });
        store.append(&StatusEntry {
            timestamp_millis: now,
            is_down: false,
            message: "fresh".into(),
        });

        store.prune(Retention::Day);

        let read = store.read_all();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].message, "fresh");
        assert_eq!(read[1].message, "one hour old");
    }

    #[test]
    fn prune_forever_is_a_no_op() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(&dir);

        store.append(&StatusEntry {
            timestamp_millis: 0,
            is_down: true,
            message: "ancient".into(),
        });
        store.prune(Retention::Forever);

        assert_eq!(store.read_all().len(), 1);
    }

    #[test]
    fn prune_on_missing_file_is_a_no_op() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(&dir);
        store.prune(Retention::Day);
        assert!(store.read_all().is_empty());
    }
}
