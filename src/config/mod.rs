//! Process configuration loaded from environment variables
//!
//! | Variable               | Default                        |
//! |------------------------|--------------------------------|
//! | `SERVER_PORT`          | `8080`                         |
//! | `SERVER_READ_TIMEOUT`  | `15` (seconds)                 |
//! | `SERVER_WRITE_TIMEOUT` | `15` (seconds)                 |
//! | `WORKER_COUNT`         | `10`                           |
//! | `EVENT_QUEUE_SIZE`     | `10000`                        |
//! | `MILESTONE_THRESHOLDS` | `100,500,1000,5000,10000`      |
//! | `LIVEPULSE_DATA_DIR`   | `data`                         |
//! | `BROADCAST_CAPACITY`   | `1024`                         |

use std::env;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Configuration errors, reported before the pipeline starts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("worker count must be positive")]
    InvalidWorkerCount,

    #[error("event queue size must be positive")]
    InvalidQueueSize,

    #[error("broadcast capacity must be positive")]
    InvalidBroadcastCapacity,

    #[error("server read and write timeouts are too large")]
    InvalidTimeout,

    #[error("data directory is required")]
    MissingDataDir,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl ServerConfig {
    /// Budget for handling one request: read plus write timeout
    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        self.read_timeout
            .checked_add(self.write_timeout)
            .ok_or(ConfigError::InvalidTimeout)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub count: usize,
    pub event_queue_size: usize,
}

impl WorkerConfig {
    pub fn worker_count(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.count).ok_or(ConfigError::InvalidWorkerCount)
    }

    pub fn queue_capacity(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.event_queue_size).ok_or(ConfigError::InvalidQueueSize)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MilestoneConfig {
    /// Seed thresholds for new sessions' `total_reactions` milestones
    pub thresholds: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

/// All application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub worker: WorkerConfig,
    pub milestone: MilestoneConfig,
    pub storage: StorageConfig,
    pub broadcast_capacity: usize,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through `lookup`, falling back to defaults for
    /// unset or empty variables
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            server: ServerConfig {
                port: get("SERVER_PORT", "8080").trim().parse().unwrap_or(8080),
                read_timeout: parse_timeout(&get("SERVER_READ_TIMEOUT", "15")),
                write_timeout: parse_timeout(&get("SERVER_WRITE_TIMEOUT", "15")),
            },
            worker: WorkerConfig {
                count: parse_count(&get("WORKER_COUNT", "10")),
                event_queue_size: parse_count(&get("EVENT_QUEUE_SIZE", "10000")),
            },
            milestone: MilestoneConfig {
                thresholds: parse_thresholds(&get(
                    "MILESTONE_THRESHOLDS",
                    "100,500,1000,5000,10000",
                )),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from(get("LIVEPULSE_DATA_DIR", "data")),
            },
            broadcast_capacity: parse_count(&get("BROADCAST_CAPACITY", "1024")),
        }
    }

    /// Check the numeric ranges the pipeline depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.worker.worker_count()?;
        self.worker.queue_capacity()?;
        self.server.request_timeout()?;
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::InvalidBroadcastCapacity);
        }
        if self.storage.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingDataDir);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Unparsable counts become 0 so validation rejects them
fn parse_count(value: &str) -> usize {
    value.trim().parse().unwrap_or(0)
}

/// Whole seconds, optionally suffixed with `s`
fn parse_timeout(value: &str) -> Duration {
    let secs = value
        .trim()
        .trim_end_matches('s')
        .parse()
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

/// Comma-separated thresholds; entries that do not parse are skipped
fn parse_thresholds(value: &str) -> Vec<u64> {
    value
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}
