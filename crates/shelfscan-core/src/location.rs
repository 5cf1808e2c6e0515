//! Delivery location presets and overrides.
//!
//! The storefront serves different catalogs, availability and imagery per
//! locality, so every fetch carries a [`DeliveryLocation`]. Users pick one of
//! the named presets or pass a raw JSON object; both resolve to the same
//! canonical structure before use.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("unknown location preset \"{name}\" (expected one of: delhi, mumbai, bangalore, gurugram, or a JSON object)")]
    UnknownPreset { name: String },

    #[error("invalid location JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("location {field} {value} is out of range")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("location locality must not be empty")]
    MissingLocality,
}

/// Canonical delivery location, in the storefront's own `coords` schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryLocation {
    pub lat: f64,
    pub lon: f64,
    pub locality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub is_top_city: bool,
}

impl DeliveryLocation {
    /// Check coordinates and locality.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::OutOfRange`] for latitude outside ±90 or
    /// longitude outside ±180, and [`LocationError::MissingLocality`] for a
    /// blank locality.
    pub fn validate(&self) -> Result<(), LocationError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(LocationError::OutOfRange {
                field: "lat",
                value: self.lat,
            });
        }
        if !self.lon.is_finite() || !(-180.0..=180.0).contains(&self.lon) {
            return Err(LocationError::OutOfRange {
                field: "lon",
                value: self.lon,
            });
        }
        if self.locality.trim().is_empty() {
            return Err(LocationError::MissingLocality);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationPreset {
    Delhi,
    Mumbai,
    Bangalore,
    Gurugram,
}

impl LocationPreset {
    pub const ALL: [LocationPreset; 4] = [
        LocationPreset::Delhi,
        LocationPreset::Mumbai,
        LocationPreset::Bangalore,
        LocationPreset::Gurugram,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            LocationPreset::Delhi => "delhi",
            LocationPreset::Mumbai => "mumbai",
            LocationPreset::Bangalore => "bangalore",
            LocationPreset::Gurugram => "gurugram",
        }
    }

    /// Case-insensitive lookup by preset name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|p| p.name() == wanted)
    }

    #[must_use]
    pub fn location(self) -> DeliveryLocation {
        let (lat, lon, locality, id, city_name, landmark) = match self {
            LocationPreset::Delhi => (
                28.6139,
                77.2090,
                "New Delhi",
                1,
                "DL-NCR",
                "Connaught Place, New Delhi, Delhi 110001, India",
            ),
            LocationPreset::Mumbai => (
                19.0760,
                72.8777,
                "Mumbai",
                2,
                "Mumbai",
                "Andheri West, Mumbai, Maharashtra 400053, India",
            ),
            LocationPreset::Bangalore => (
                12.9716,
                77.5946,
                "Bengaluru",
                3,
                "Bangalore",
                "Koramangala, Bengaluru, Karnataka 560034, India",
            ),
            LocationPreset::Gurugram => (
                28.465_204,
                77.06159,
                "Gurugram",
                1849,
                "HR-NCR",
                "B62, Pocket B, South City I, Sector 30, Gurugram, Haryana 122001, India",
            ),
        };
        DeliveryLocation {
            lat,
            lon,
            locality: locality.to_owned(),
            city_name: Some(city_name.to_owned()),
            landmark: Some(landmark.to_owned()),
            id: Some(id),
            is_top_city: true,
        }
    }
}

/// A location as configured: a named preset or an explicit structure.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationSpec {
    Preset(LocationPreset),
    Explicit(DeliveryLocation),
}

impl LocationSpec {
    #[must_use]
    pub fn resolve(&self) -> DeliveryLocation {
        match self {
            LocationSpec::Preset(preset) => preset.location(),
            LocationSpec::Explicit(location) => location.clone(),
        }
    }
}

impl Default for LocationSpec {
    fn default() -> Self {
        LocationSpec::Preset(LocationPreset::Gurugram)
    }
}

impl FromStr for LocationSpec {
    type Err = LocationError;

    /// Accepts a preset name or a JSON object. The object may be the flat
    /// `{"lat": .., "lon": .., "locality": ..}` form or wrapped in
    /// `{"coords": {..}}` as the storefront stores it.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if let Some(preset) = LocationPreset::from_name(trimmed) {
            return Ok(LocationSpec::Preset(preset));
        }
        if !trimmed.starts_with('{') {
            return Err(LocationError::UnknownPreset {
                name: trimmed.to_owned(),
            });
        }

        let mut value: serde_json::Value = serde_json::from_str(trimmed)?;
        if let Some(coords) = value.get_mut("coords").map(serde_json::Value::take) {
            value = coords;
        }
        let location: DeliveryLocation = serde_json::from_value(value)?;
        location.validate()?;
        Ok(LocationSpec::Explicit(location))
    }
}
