//! Place and visit records.
//!
//! A place belongs to exactly one collection and carries the visits a user
//! logged there. Places with no visits are orphans and are kept out of the
//! search index.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// Geographic coordinates in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    /// Create coordinates, rejecting values outside the WGS84 range.
    pub fn new(lat: f64, lng: f64) -> Result<Self, TypesError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(TypesError::InvalidInput(format!("latitude out of range: {}", lat)));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(TypesError::InvalidInput(format!("longitude out of range: {}", lng)));
        }
        Ok(Self { lat, lng })
    }
}

/// A single logged visit to a place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    /// Identifier, unique within the place
    pub id: String,

    /// When the visit happened
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub visited_at: DateTime<Utc>,

    /// Free-form note
    #[serde(default)]
    pub note: Option<String>,

    /// Rating from 1 to 5
    #[serde(default)]
    pub rating: Option<u8>,

    /// Uploaded photo URLs
    #[serde(default)]
    pub photo_urls: Vec<String>,
}

impl Visit {
    /// Create a visit with no note, rating or photos.
    pub fn new(id: impl Into<String>, visited_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            visited_at,
            note: None,
            rating: None,
            photo_urls: Vec::new(),
        }
    }

    /// Attach a rating (1..=5).
    pub fn with_rating(mut self, rating: u8) -> Result<Self, TypesError> {
        if !(1..=5).contains(&rating) {
            return Err(TypesError::InvalidInput(format!("rating must be 1-5, got {}", rating)));
        }
        self.rating = Some(rating);
        Ok(self)
    }

    /// Attach a note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A place inside a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Identifier, unique within its collection
    pub id: String,

    /// Display name
    pub name: String,

    /// Street address
    #[serde(default)]
    pub address: String,

    /// Location
    #[serde(default)]
    pub coordinates: Coordinates,

    /// Logged visits
    #[serde(default)]
    pub visits: Vec<Visit>,
}

impl Place {
    /// Create a place with no visits.
    pub fn new(id: impl Into<String>, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: address.into(),
            coordinates: Coordinates::default(),
            visits: Vec::new(),
        }
    }

    /// Set the coordinates.
    pub fn at(mut self, coordinates: Coordinates) -> Self {
        self.coordinates = coordinates;
        self
    }

    /// Append a visit.
    pub fn with_visit(mut self, visit: Visit) -> Self {
        self.visits.push(visit);
        self
    }

    /// A place without visits is orphaned.
    pub fn is_orphan(&self) -> bool {
        self.visits.is_empty()
    }

    /// Most recent visit time, if any.
    pub fn last_visited(&self) -> Option<DateTime<Utc>> {
        self.visits.iter().map(|v| v.visited_at).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_coordinates_range() {
        assert!(Coordinates::new(48.85, 2.35).is_ok());
        assert!(Coordinates::new(91.0, 0.0).is_err());
        assert!(Coordinates::new(0.0, -181.0).is_err());
    }

    #[test]
    fn test_orphan() {
        let place = Place::new("p1", "Cafe", "1 Main St");
        assert!(place.is_orphan());

        let ts = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let place = place.with_visit(Visit::new("v1", ts));
        assert!(!place.is_orphan());
        assert_eq!(place.last_visited(), Some(ts));
    }

    #[test]
    fn test_rating_bounds() {
        let ts = Utc.timestamp_millis_opt(0).unwrap();
        assert!(Visit::new("v1", ts).with_rating(5).is_ok());
        assert!(Visit::new("v1", ts).with_rating(0).is_err());
        assert!(Visit::new("v1", ts).with_rating(6).is_err());
    }

    #[test]
    fn test_place_deserialize_defaults() {
        let json = r#"{"id": "p1", "name": "Bakery"}"#;
        let place: Place = serde_json::from_str(json).unwrap();
        assert_eq!(place.address, "");
        assert!(place.visits.is_empty());
    }
}
