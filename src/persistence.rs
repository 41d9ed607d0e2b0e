//! Snapshotting of the workout list into a key-value store.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use crate::form::validate;
use crate::workout::{Coords, Workout, WorkoutId, WorkoutType, date_from_id};

pub const DEFAULT_KEY: &str = "workouts";

#[derive(Debug)]
pub enum StorageError {
    QuotaExceeded { needed: usize, quota: usize },
    Io(io::Error),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::QuotaExceeded { needed, quota } => {
                write!(f, "storage quota exceeded ({needed} bytes, quota {quota})")
            }
            StorageError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::QuotaExceeded { .. } => None,
            StorageError::Io(e) => Some(e),
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Minimal string key-value storage primitive.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> io::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

fn check_quota(quota: Option<usize>, value: &str) -> Result<(), StorageError> {
    match quota {
        Some(quota) if value.len() > quota => Err(StorageError::QuotaExceeded {
            needed: value.len(),
            quota,
        }),
        _ => Ok(()),
    }
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    quota: Option<usize>,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            quota: None,
        }
    }

    pub fn with_quota(mut self, quota: Option<usize>) -> Self {
        self.quota = quota;
        self
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        check_quota(self.quota, value)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: HashMap::new(),
            quota: Some(quota),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        check_quota(self.quota, value)?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Numbers may have been persisted as raw input text.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredNumber {
    Number(f64),
    Text(String),
}

impl StoredNumber {
    fn value(&self) -> f64 {
        match self {
            StoredNumber::Number(v) => *v,
            StoredNumber::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
        }
    }
}

/// Loosely typed view of a persisted record. Derived fields (`pace`,
/// `speed`, `description`) are ignored and recomputed.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredWorkout {
    id: WorkoutId,
    #[serde(default)]
    date: Option<DateTime<Utc>>,
    coords: Coords,
    distance: StoredNumber,
    duration: StoredNumber,
    #[serde(rename = "type")]
    kind: String,
    cadence: Option<StoredNumber>,
    elevation_gain: Option<StoredNumber>,
}

impl StoredWorkout {
    fn into_workout(self) -> Option<Workout> {
        let kind = WorkoutType::parse(&self.kind)?;
        let extra = match kind {
            WorkoutType::Running => self.cadence?.value(),
            WorkoutType::Cycling => self.elevation_gain?.value(),
        };
        let distance = self.distance.value();
        let duration = self.duration.value();
        validate(&[distance, duration, extra]).ok()?;
        let date = self
            .date
            .or_else(|| date_from_id(&self.id, Utc::now()))
            .unwrap_or_else(Utc::now);
        Some(Workout::build(
            kind,
            self.id,
            date,
            self.coords,
            distance,
            duration,
            extra,
        ))
    }
}

/// Saves and restores the ordered workout list under a single key.
pub struct WorkoutRepository<S> {
    storage: S,
    key: String,
}

impl<S: KeyValueStore> WorkoutRepository<S> {
    pub fn new(storage: S, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Overwrite the stored snapshot. Failures are logged, not returned.
    pub fn save(&mut self, workouts: &[Workout]) {
        let data = match serde_json::to_string(workouts) {
            Ok(data) => data,
            Err(e) => {
                log::error!("Failed to serialize workouts: {e}");
                return;
            }
        };
        if let Err(e) = self.storage.set(&self.key, &data) {
            log::error!("Failed to save {} workouts: {e}", workouts.len());
        }
    }

    /// Restore the snapshot, rebuilding each record from its type tag.
    ///
    /// Missing or unreadable data yields an empty list.
    pub fn load(&self) -> Vec<Workout> {
        let data = match self.storage.get(&self.key) {
            Ok(Some(data)) => data,
            Ok(None) => return Vec::new(),
            Err(e) => {
                log::warn!("Failed to read saved workouts: {e}");
                return Vec::new();
            }
        };
        let records: Vec<serde_json::Value> = match serde_json::from_str(&data) {
            Ok(serde_json::Value::Array(records)) => records,
            Ok(serde_json::Value::Null) => return Vec::new(),
            Ok(_) => {
                log::warn!("Saved workouts are not a list, ignoring");
                return Vec::new();
            }
            Err(e) => {
                log::warn!("Saved workouts are malformed, ignoring: {e}");
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let mut workouts = Vec::with_capacity(records.len());
        for (idx, record) in records.into_iter().enumerate() {
            let rebuilt = serde_json::from_value::<StoredWorkout>(record)
                .ok()
                .and_then(StoredWorkout::into_workout);
            match rebuilt {
                Some(w) if seen.insert(w.id.clone()) => workouts.push(w),
                Some(w) => log::warn!("Skipping duplicate workout {}", w.id),
                None => log::warn!("Skipping unreadable workout record #{idx}"),
            }
        }
        workouts
    }

    pub fn clear(&mut self) {
        if let Err(e) = self.storage.remove(&self.key) {
            log::error!("Failed to clear saved workouts: {e}");
        }
    }
}
