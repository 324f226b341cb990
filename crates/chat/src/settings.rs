//! User settings persisted between launches

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::{GeoPoint, UserId};

/// Settings filename in the Souk config directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Default store search radius in kilometres
pub const DEFAULT_DISTANCE_KM: u32 = 10;

/// Search radius, last known position and signed-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub distance_km: u32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub user_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            distance_km: DEFAULT_DISTANCE_KM,
            latitude: None,
            longitude: None,
            user_id: None,
        }
    }
}

impl Settings {
    /// Load from ~/.config/souk/settings.json, or defaults if absent
    pub fn load() -> Result<Self> {
        if config::config_exists(SETTINGS_FILE) {
            return config::load_json(SETTINGS_FILE);
        }
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        config::load_json_file_or_default(path)
    }

    pub fn save(&self) -> Result<()> {
        config::save_json(SETTINGS_FILE, self)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        config::save_json_file(path, self)
    }

    pub fn location(&self) -> Option<GeoPoint> {
        Some(GeoPoint::new(self.latitude?, self.longitude?))
    }

    pub fn set_location(&mut self, point: GeoPoint) {
        self.latitude = Some(point.latitude);
        self.longitude = Some(point.longitude);
    }

    pub fn user(&self) -> Option<UserId> {
        self.user_id.as_deref().map(UserId::from)
    }

    /// Forget the signed-in user (logout); distance and position are kept
    pub fn sign_out(&mut self) {
        self.user_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.distance_km, 10);
        assert!(settings.location().is_none());
        assert!(settings.user().is_none());
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);

        let mut settings = Settings::default();
        settings.distance_km = 25;
        settings.set_location(GeoPoint::new(40.41, -3.70));
        settings.user_id = Some("u1".to_string());
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.location(), Some(GeoPoint::new(40.41, -3.70)));
        assert_eq!(loaded.user(), Some(UserId::new("u1")));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{ "userId": "u7" }"#).unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.distance_km, DEFAULT_DISTANCE_KM);
        assert_eq!(settings.user_id.as_deref(), Some("u7"));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_sign_out_keeps_location() {
        let mut settings = Settings {
            user_id: Some("u1".to_string()),
            ..Settings::default()
        };
        settings.set_location(GeoPoint::new(1.0, 2.0));
        settings.sign_out();
        assert!(settings.user().is_none());
        assert!(settings.location().is_some());
    }
}
