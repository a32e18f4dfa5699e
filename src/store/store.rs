//! JSONL persistence for events, achievements and final session snapshots

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, warn};

use super::atomic::{atomic_write, cleanup_temp_files};
use crate::milestones::AchievementNotifier;
use crate::types::{Event, MilestoneAchievement, StatsSnapshot};

/// Configuration for the JsonlStore
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the data directory
    pub data_dir: PathBuf,
    /// fsync the event log after every append
    pub sync_events: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            sync_events: false,
        }
    }
}

impl StoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Get path to events.jsonl
    pub fn events_path(&self) -> PathBuf {
        self.data_dir.join("events.jsonl")
    }

    /// Get path to milestones.jsonl
    pub fn milestones_path(&self) -> PathBuf {
        self.data_dir.join("milestones.jsonl")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    /// Snapshot file for a session; the id is reduced to a safe file name
    pub fn session_snapshot_path(&self, session_id: &str) -> PathBuf {
        let file_name: String = session_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.sessions_dir().join(format!("{}.json", file_name))
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Append-only JSONL files plus one snapshot file per finished session
pub struct JsonlStore {
    config: StoreConfig,
    /// Serializes appends so concurrent lines never interleave
    append_lock: Mutex<()>,
}

impl JsonlStore {
    /// Open the store, creating the data directory and clearing stale
    /// temp files
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let cleaned = cleanup_temp_files(config.sessions_dir())?;
        if cleaned > 0 {
            warn!(cleaned, "removed leftover snapshot temp files");
        }

        Ok(Self {
            config,
            append_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn append_event(&self, event: &Event) -> StoreResult<()> {
        let line = event.to_json_line()?;
        self.append_line(&self.config.events_path(), &line, self.config.sync_events)
    }

    /// Achievements are always synced to disk
    pub fn append_achievement(&self, achievement: &MilestoneAchievement) -> StoreResult<()> {
        let line = serde_json::to_string(achievement)?;
        self.append_line(&self.config.milestones_path(), &line, true)
    }

    /// Write the session's final snapshot, replacing any earlier one
    pub fn save_session_snapshot(&self, snapshot: &StatsSnapshot) -> StoreResult<PathBuf> {
        let path = self.config.session_snapshot_path(&snapshot.session_id);
        let content = serde_json::to_string_pretty(snapshot)?;
        atomic_write(&path, &content)?;
        Ok(path)
    }

    pub fn load_session_snapshot(&self, session_id: &str) -> StoreResult<Option<StatsSnapshot>> {
        let path = self.config.session_snapshot_path(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Read every recorded achievement, skipping corrupted lines
    pub fn read_achievements(&self) -> StoreResult<Vec<MilestoneAchievement>> {
        self.read_lines(&self.config.milestones_path())
    }

    /// Read every recorded event, skipping corrupted lines
    pub fn read_events(&self) -> StoreResult<Vec<Event>> {
        self.read_lines(&self.config.events_path())
    }

    fn append_line(&self, path: &Path, line: &str, sync: bool) -> StoreResult<()> {
        let _guard = self.append_lock.lock();

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
        if sync {
            file.sync_all()?;
        }
        Ok(())
    }

    fn read_lines<T: serde::de::DeserializeOwned>(&self, path: &Path) -> StoreResult<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %path.display(), line = line_num + 1, error = %e, "skipping corrupted record");
                }
            }
        }
        Ok(records)
    }
}

impl AchievementNotifier for JsonlStore {
    fn notify(&self, achievement: &MilestoneAchievement) {
        if let Err(e) = self.append_achievement(achievement) {
            error!(
                session_id = %achievement.session_id,
                milestone_id = %achievement.milestone.id(),
                error = %e,
                "failed to persist milestone achievement"
            );
        }
    }
}
