//! Store profile model representing the counterparty of a conversation

use serde::{Deserialize, Serialize};

/// Unique identifier for a store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreId(pub String);

impl StoreId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StoreId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StoreId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Build from GeoJSON `[longitude, latitude]` coordinates
    pub fn from_geojson(coordinates: &[f64]) -> Option<Self> {
        match coordinates {
            [longitude, latitude, ..] => Some(Self::new(*latitude, *longitude)),
            _ => None,
        }
    }

    /// GeoJSON `[longitude, latitude]` coordinates
    pub fn to_geojson(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

/// Contact details published by a store
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone_number: String,
    pub email_address: String,
    pub website: String,
}

/// A store's public profile
///
/// Immutable once fetched for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreProfile {
    pub id: StoreId,
    pub name: String,
    /// Reference to the store's image (URL)
    pub image_url: String,
    pub location: Option<GeoPoint>,
    pub contact: ContactInfo,
    pub description: String,
}

impl StoreProfile {
    pub fn new(id: StoreId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            image_url: String::new(),
            location: None,
            contact: ContactInfo::default(),
            description: String::new(),
        }
    }
}

/// What is currently known about a store's profile
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileLookup {
    Found(StoreProfile),
    /// Never requested, or the fetch is still in flight
    NotYetResolved,
    /// The fetch settled with an error
    Failed(String),
}

impl ProfileLookup {
    pub fn profile(&self) -> Option<&StoreProfile> {
        match self {
            ProfileLookup::Found(profile) => Some(profile),
            _ => None,
        }
    }

    /// Name to show for a conversation, falling back to the raw store ID
    pub fn display_name<'a>(&'a self, id: &'a StoreId) -> &'a str {
        match self {
            ProfileLookup::Found(profile) => &profile.name,
            _ => id.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geojson_order() {
        let point = GeoPoint::from_geojson(&[-3.70, 40.41]).unwrap();
        assert_eq!(point.latitude, 40.41);
        assert_eq!(point.longitude, -3.70);
        assert_eq!(point.to_geojson(), [-3.70, 40.41]);
    }

    #[test]
    fn test_geojson_too_short() {
        assert!(GeoPoint::from_geojson(&[1.0]).is_none());
    }

    #[test]
    fn test_display_name_fallback() {
        let id = StoreId::new("s1");
        assert_eq!(ProfileLookup::NotYetResolved.display_name(&id), "s1");
        assert_eq!(
            ProfileLookup::Failed("timeout".to_string()).display_name(&id),
            "s1"
        );

        let found = ProfileLookup::Found(StoreProfile::new(id.clone(), "Corner Shop"));
        assert_eq!(found.display_name(&id), "Corner Shop");
        assert!(found.profile().is_some());
    }
}
