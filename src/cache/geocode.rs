//! CSV-backed geocoding cache.
//!
//! An insertion-ordered map from normalized city name to coordinates
//! and canonical display name, persisted as one line per entry:
//! `name,lat,lon` with coordinates at four decimals. The normalized
//! display name is the identity; duplicate keys collapse to the first
//! occurrence on load and to a single line on save.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::normalize::normalize_city;

const CACHE_FILE: &str = "location_coordinates.csv";
// Misspelled name used by earlier deployments, migrated on load.
const LEGACY_CACHE_FILE: &str = "location_cordinates.csv";

#[derive(Error, Debug)]
pub enum GeoCacheError {
    #[error("coordinates ({0}, {1}) rejected")]
    IllegalCoordinates(f64, f64),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoEntry {
    /// Canonical display name as reported by the geocoding API.
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

pub struct GeoCache {
    path: PathBuf,
    entries: RwLock<IndexMap<String, GeoEntry>>,
    dirty: AtomicBool,
}

impl GeoCache {
    /// Load the cache file under `cache_dir`, creating the directory if
    /// needed. A legacy misspelled cache file is renamed into place
    /// when the canonical file does not exist yet.
    pub async fn load(cache_dir: impl AsRef<Path>) -> Result<Self, GeoCacheError> {
        let cache_dir = cache_dir.as_ref();
        tokio::fs::create_dir_all(cache_dir).await?;

        let path = cache_dir.join(CACHE_FILE);
        let legacy = cache_dir.join(LEGACY_CACHE_FILE);
        if !path.exists() && legacy.exists() {
            tracing::info!(from = %legacy.display(), to = %path.display(), "migrating legacy cache file");
            tokio::fs::rename(&legacy, &path).await?;
        }

        let mut entries = IndexMap::new();
        if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            for (lineno, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match parse_line(line) {
                    Some((key, entry)) => {
                        // first occurrence wins
                        entries.entry(key).or_insert(entry);
                    }
                    None => {
                        tracing::warn!(line = lineno + 1, "skipping malformed cache line");
                    }
                }
            }
            tracing::info!(count = entries.len(), path = %path.display(), "loaded geocode cache");
        } else {
            tracing::debug!(path = %path.display(), "geocode cache file does not exist, starting fresh");
        }

        Ok(Self {
            path,
            entries: RwLock::new(entries),
            dirty: AtomicBool::new(false),
        })
    }

    /// Case-insensitive lookup: the caller's name is normalized and
    /// compared against stored keys.
    pub async fn lookup(&self, name: &str) -> Option<GeoEntry> {
        let key = normalize_city(name);
        self.entries.read().await.get(&key).cloned()
    }

    /// Insert or update the entry for `requested`. Coordinates at the
    /// null island are rejected. The cache persists immediately.
    pub async fn insert(
        &self,
        requested: &str,
        canonical: &str,
        lat: f64,
        lon: f64,
    ) -> Result<(), GeoCacheError> {
        if lat.abs() < 1e-4 && lon.abs() < 1e-4 {
            return Err(GeoCacheError::IllegalCoordinates(lat, lon));
        }

        let key = normalize_city(requested);
        let entry = GeoEntry {
            name: sanitize_display_name(canonical),
            lat,
            lon,
        };
        {
            let mut entries = self.entries.write().await;
            entries.insert(key, entry);
        }
        self.dirty.store(true, Ordering::Relaxed);
        self.save().await
    }

    /// Persist all entries atomically, one line per key.
    pub async fn save(&self) -> Result<(), GeoCacheError> {
        let content = {
            let entries = self.entries.read().await;
            let mut out = String::with_capacity(entries.len() * 32);
            for entry in entries.values() {
                out.push_str(&format!("{},{:.4},{:.4}\n", entry.name, entry.lat, entry.lon));
            }
            out
        };

        let tmp = self.path.with_extension("csv.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        self.dirty.store(false, Ordering::Relaxed);

        tracing::debug!(path = %self.path.display(), "saved geocode cache");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }
}

fn parse_line(line: &str) -> Option<(String, GeoEntry)> {
    let mut fields = line.split(',');
    let name = fields.next()?.trim();
    let lat: f64 = fields.next()?.trim().parse().ok()?;
    let lon: f64 = fields.next()?.trim().parse().ok()?;
    if fields.next().is_some() || name.is_empty() {
        return None;
    }
    let key = normalize_city(name);
    Some((
        key,
        GeoEntry {
            name: name.to_string(),
            lat,
            lon,
        },
    ))
}

/// Display names must not break the one-line-per-entry format.
fn sanitize_display_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            ',' | '\n' | '\r' => ' ',
            other => other,
        })
        .collect()
}
