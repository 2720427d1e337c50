//! Location model for a resolved place

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A place resolved by the geocoding provider
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    /// Canonical place name
    pub name: String,
    /// Country name as reported by the provider
    pub country: String,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

impl Location {
    /// Create a new location
    #[must_use]
    pub fn new(name: String, country: String, latitude: f64, longitude: f64) -> Self {
        Self {
            name,
            country,
            latitude,
            longitude,
        }
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Round coordinates for cache key generation
    #[must_use]
    pub fn rounded_coordinates(&self, precision: u32) -> (f64, f64) {
        let multiplier = 10_f64.powi(i32::try_from(precision).unwrap_or(4));
        let lat = (self.latitude * multiplier).round() / multiplier;
        let lon = (self.longitude * multiplier).round() / multiplier;
        (lat, lon)
    }

    /// Generate a forecast cache key for this location and day
    #[must_use]
    pub fn cache_key(&self, scope: &str, date: NaiveDate) -> String {
        let (lat, lon) = self.rounded_coordinates(2);
        format!("forecast:{scope}:{lat:.2}:{lon:.2}:{date}")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name: {}, country: {}", self.name, self.country)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn haifa() -> Location {
        Location::new("Haifa".into(), "Israel".into(), 32.81841, 34.9885)
    }

    #[test]
    fn test_location_cache_key() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        assert_eq!(
            haifa().cache_key("daily", date),
            "forecast:daily:32.82:34.99:2023-12-01"
        );
    }

    #[test]
    fn test_location_rounded_coordinates() {
        let location = Location::new("Test".into(), "Nowhere".into(), 46.818_234, 8.227_456);
        let (lat, lon) = location.rounded_coordinates(2);
        assert_eq!(lat, 46.82);
        assert_eq!(lon, 8.23);
    }

    #[test]
    fn test_display() {
        assert_eq!(haifa().to_string(), "name: Haifa, country: Israel");
        assert_eq!(haifa().format_coordinates(), "32.8184, 34.9885");
    }
}
