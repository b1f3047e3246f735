use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::TapsightResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub ts: i64,
    pub run_id: String,
    pub kind: String,
    pub payload: serde_json::Value,
}

/// Append-only JSONL record of one run. Write failures are logged, never returned.
pub struct RunJournal {
    pub run_id: String,
    file_path: Option<PathBuf>,
}

impl RunJournal {
    /// Journal at `<dir>/run_<run_id>.jsonl`. `None` keeps entries in the log only.
    pub fn open(dir: Option<&Path>, run_id: &str) -> Self {
        let file_path = dir.and_then(|d| match std::fs::create_dir_all(d) {
            Ok(()) => Some(d.join(format!("run_{run_id}.jsonl"))),
            Err(e) => {
                tracing::warn!(dir = %d.display(), error = %e, "journal directory unavailable, journal disabled");
                None
            }
        });
        Self {
            run_id: run_id.to_string(),
            file_path,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn record<T: Serialize>(&self, kind: &str, payload: &T) {
        if let Err(e) = self.append(kind, payload) {
            tracing::warn!(run_id = %self.run_id, kind, error = %e, "journal write failed");
        }
    }

    fn append<T: Serialize>(&self, kind: &str, payload: &T) -> TapsightResult<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        let entry = JournalEntry {
            ts: chrono::Utc::now().timestamp_millis(),
            run_id: self.run_id.clone(),
            kind: kind.to_string(),
            payload: serde_json::to_value(payload)?,
        };
        let line = serde_json::to_string(&entry)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", line)?;
        tracing::debug!(path = %path.display(), kind, "journal entry flushed");
        Ok(())
    }
}

pub fn new_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entries_are_appended_as_lines() {
        let dir = tempfile::tempdir().unwrap();
        let journal = RunJournal::open(Some(dir.path()), "abc");
        journal.record("start", &json!({"goal": "log in"}));
        journal.record("step", &json!({"step": 1}));

        let content = std::fs::read_to_string(journal.path().unwrap()).unwrap();
        let entries: Vec<JournalEntry> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, "start");
        assert_eq!(entries[1].payload["step"], 1);
        assert_eq!(entries[1].run_id, "abc");
    }

    #[test]
    fn test_unwritable_directory_does_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let journal = RunJournal::open(Some(&blocker.join("nested")), "abc");
        assert!(journal.path().is_none());
        journal.record("step", &json!({}));
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(new_run_id(), new_run_id());
    }
}
