//! Healthz file touched by the main tick
//!
//! The tick writes `{"last_check": <RFC3339>}` after every iteration; the
//! readiness probe calls [`HealthFile::pong`], which reports unhealthy once
//! the file is older than the configured interval.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use polyaxon_common::{Error, Result};

#[derive(Debug, Deserialize, Serialize)]
struct HealthStamp {
    last_check: DateTime<Utc>,
}

/// Health file handle owned by the main tick
#[derive(Clone, Debug)]
pub struct HealthFile {
    path: PathBuf,
    interval: Duration,
}

impl HealthFile {
    pub fn new(path: impl Into<PathBuf>, interval: std::time::Duration) -> Self {
        Self {
            path: path.into(),
            interval: Duration::from_std(interval).unwrap_or(Duration::MAX),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record that the tick is alive right now
    pub fn touch(&self) -> Result<()> {
        let stamp = HealthStamp {
            last_check: Utc::now(),
        };
        let content = serde_json::to_string(&stamp)
            .map_err(|e| Error::serialization(e.to_string()))?;
        std::fs::write(&self.path, content)
            .map_err(|e| Error::internal("health", format!("failed to write health file: {e}")))
    }

    /// Whether the last recorded check is still fresh.
    ///
    /// Stale iff `now - last_check >= interval`; an unreadable or malformed
    /// file counts as stale.
    pub fn pong(&self) -> bool {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "health file unreadable");
                return false;
            }
        };
        let stamp: HealthStamp = match serde_json::from_str(&content) {
            Ok(stamp) => stamp,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "health file malformed");
                return false;
            }
        };
        Utc::now() - stamp.last_check < self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_health(name: &str, interval: std::time::Duration) -> HealthFile {
        let path = std::env::temp_dir().join(format!("plx-health-{name}-{}", std::process::id()));
        HealthFile::new(path, interval)
    }

    #[test]
    fn fresh_touch_is_healthy() {
        let health = temp_health("fresh", std::time::Duration::from_secs(60));
        health.touch().unwrap();
        assert!(health.pong());
        std::fs::remove_file(health.path()).unwrap();
    }

    #[test]
    fn stale_stamp_is_unhealthy() {
        let health = temp_health("stale", std::time::Duration::from_secs(5));
        let old = HealthStamp {
            last_check: Utc::now() - Duration::seconds(5),
        };
        std::fs::write(health.path(), serde_json::to_string(&old).unwrap()).unwrap();
        assert!(!health.pong());
        std::fs::remove_file(health.path()).unwrap();
    }

    #[test]
    fn missing_or_malformed_file_is_unhealthy() {
        let health = temp_health("missing", std::time::Duration::from_secs(60));
        assert!(!health.pong());

        std::fs::write(health.path(), "not json").unwrap();
        assert!(!health.pong());
        std::fs::remove_file(health.path()).unwrap();
    }
}
