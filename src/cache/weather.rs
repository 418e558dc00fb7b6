//! On-disk forecast cache: one JSON file per (name, lat, lon).
//!
//! Upstream publishes new forecasts on a quarter-hour schedule, so a
//! cached file counts as fresh while its mtime is at or after the most
//! recent 15-minute UTC wall-clock boundary. Writes go through a
//! temporary file and a rename so concurrent readers never observe a
//! partial forecast.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::normalize::sanitize_key_for_path;

const FRESHNESS_WINDOW_SECS: i64 = 15 * 60;

pub struct WeatherCache {
    dir: PathBuf,
}

impl WeatherCache {
    pub async fn init(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str, lat: f64, lon: f64) -> PathBuf {
        self.dir.join(format!(
            "{}-{:.4}-{:.4}.json",
            sanitize_key_for_path(key),
            lat,
            lon
        ))
    }

    /// Return the cached body when the file exists and is fresh.
    /// I/O problems count as a miss.
    pub async fn get_by_coords(&self, key: &str, lat: f64, lon: f64) -> Option<String> {
        let path = self.entry_path(key, lat, lon);
        let metadata = tokio::fs::metadata(&path).await.ok()?;
        let modified: DateTime<Utc> = metadata.modified().ok()?.into();

        if modified < freshness_boundary(Utc::now()) {
            tracing::debug!(path = %path.display(), "cached forecast is stale");
            return None;
        }

        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read cached forecast");
                None
            }
        }
    }

    /// Store a forecast body atomically (`.tmp` then rename).
    pub async fn set_by_coords(
        &self,
        key: &str,
        lat: f64,
        lon: f64,
        body: &str,
    ) -> std::io::Result<()> {
        let path = self.entry_path(key, lat, lon);
        let tmp = PathBuf::from(format!("{}.tmp", path.display()));
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!(path = %path.display(), bytes = body.len(), "cached forecast");
        Ok(())
    }

    /// Drop a cached entry; absent files are fine.
    pub async fn remove_by_coords(&self, key: &str, lat: f64, lon: f64) -> std::io::Result<()> {
        let path = self.entry_path(key, lat, lon);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Unlink cached `.json` files older than `max_age`. Returns how
    /// many files were removed.
    pub async fn cleanup(&self, max_age: Duration) -> std::io::Result<usize> {
        let cutoff = std::time::SystemTime::now() - max_age;
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            if modified < cutoff {
                if tokio::fs::remove_file(&path).await.is_ok() {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

/// The most recent UTC instant of the form HH:MM:00 with MM in
/// {00, 15, 30, 45}.
pub fn freshness_boundary(now: DateTime<Utc>) -> DateTime<Utc> {
    let secs = now.timestamp();
    let floored = secs - secs.rem_euclid(FRESHNESS_WINDOW_SECS);
    DateTime::from_timestamp(floored, 0).unwrap_or(now)
}

/// Periodically sweep stale forecasts out of the cache directory.
pub fn start_cleanup_task(cache: Arc<WeatherCache>, interval: Duration, max_age: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match cache.cleanup(max_age).await {
                Ok(0) => {}
                Ok(removed) => {
                    tracing::debug!(removed, "weather cache cleanup completed");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "weather cache cleanup failed");
                }
            }
        }
    });
}
