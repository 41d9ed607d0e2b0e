//! Persistent user settings.

use dirs_next as dirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::persistence::DEFAULT_KEY;
use crate::workout::Coords;

const LOCATION_ENV: &str = "MAPTY_LOCATION";

/// Configuration stored as JSON next to other user config files.
///
/// Every field is `#[serde(default)]` so older files keep loading when new
/// options are added.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub zoom_level: u8,
    pub tile_url: String,
    pub attribution: String,
    pub storage_key: String,
    /// Directory for saved workouts; the platform data dir when unset.
    pub data_dir: Option<String>,
    /// Largest snapshot in bytes the store accepts.
    pub storage_quota: Option<usize>,
    /// Fixed map centre, skipping the network lookup.
    pub home_location: Option<Coords>,
    pub geolocation_url: String,
    pub banner_secs: u64,
    pub form_transition_ms: u64,
    pub pan_secs: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            zoom_level: 13,
            tile_url: "https://{s}.tile.openstreetmap.fr/hot/{z}/{x}/{y}.png".into(),
            attribution: "© OpenStreetMap contributors".into(),
            storage_key: DEFAULT_KEY.into(),
            data_dir: None,
            storage_quota: Some(5 * 1024 * 1024),
            home_location: None,
            geolocation_url: "http://ip-api.com/json".into(),
            banner_secs: 3,
            form_transition_ms: 1000,
            pan_secs: 1.0,
        }
    }
}

impl Settings {
    const FILE: &'static str = "mapty_settings.json";

    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(Self::FILE))
    }

    /// Load settings, falling back to defaults for a missing or broken file.
    pub fn load() -> Self {
        if let Some(path) = Self::path() {
            if let Ok(data) = std::fs::read_to_string(&path) {
                match serde_json::from_str(&data) {
                    Ok(cfg) => return cfg,
                    Err(e) => log::warn!("Ignoring unreadable {}: {e}", path.display()),
                }
            }
        }
        Self::default()
    }

    pub fn save(&self) {
        if let Some(path) = Self::path() {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Ok(data) = serde_json::to_string_pretty(self) {
                let _ = std::fs::write(path, data);
            }
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("mapty"),
        }
    }

    pub fn banner_duration(&self) -> Duration {
        Duration::from_secs(self.banner_secs)
    }

    pub fn form_transition(&self) -> Duration {
        Duration::from_millis(self.form_transition_ms)
    }

    pub fn pan_duration(&self) -> Duration {
        Duration::from_secs_f32(self.pan_secs.max(0.0))
    }

    /// Fixed location to use instead of a lookup.
    ///
    /// The `MAPTY_LOCATION` environment variable (`"lat,lng"`) takes
    /// precedence over `home_location`.
    pub fn fixed_location(&self) -> Option<Coords> {
        std::env::var(LOCATION_ENV)
            .ok()
            .and_then(|v| parse_location(&v))
            .or(self.home_location)
    }
}

pub fn parse_location(text: &str) -> Option<Coords> {
    let (lat, lng) = text.split_once(',')?;
    let lat: f64 = lat.trim().parse().ok()?;
    let lng: f64 = lng.trim().parse().ok()?;
    let valid = (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng);
    valid.then(|| Coords::new(lat, lng))
}
