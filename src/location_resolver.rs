//! Location Resolution Module
//!
//! Resolves a free-text place name into a [`Location`] using the geocoding
//! provider's best match.

use crate::error::WeatherError;
use crate::http::{ProviderClient, url_with_params};
use crate::models::Location;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Anything that can turn a place name into a [`Location`]
#[async_trait]
pub trait LocationLookup: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<Location, WeatherError>;
}

/// First element of the geocoding `results` array
#[derive(Debug, Deserialize)]
struct GeocodingMatch {
    name: String,
    country: String,
    latitude: f64,
    longitude: f64,
}

impl From<GeocodingMatch> for Location {
    fn from(matched: GeocodingMatch) -> Self {
        Location::new(matched.name, matched.country, matched.latitude, matched.longitude)
    }
}

/// Resolver backed by the geocoding provider
#[derive(Clone)]
pub struct LocationResolver {
    http: ProviderClient,
    base_url: Url,
}

impl LocationResolver {
    /// Create a resolver for the geocoding search endpoint at `base_url`
    pub fn new(http: ProviderClient, base_url: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid geocoding URL: {base_url}"))?;
        Ok(Self { http, base_url })
    }

    /// Search URL asking for the single best English match
    #[must_use]
    pub fn search_url(&self, name: &str) -> Url {
        url_with_params(
            &self.base_url,
            [
                ("name", name.trim()),
                ("count", "1"),
                ("language", "en"),
                ("format", "json"),
            ],
        )
    }
}

/// Pick the first match out of a geocoding response body
pub fn first_match(body: &Value, query: &str) -> Result<Location, WeatherError> {
    let results = match body.get("results") {
        None | Some(Value::Null) => {
            return Err(WeatherError::city_not_found(format!("No results found for {query}")));
        }
        Some(Value::Array(results)) => results,
        Some(other) => {
            return Err(WeatherError::invalid_data(format!(
                "Geocoding 'results' is not a list: {other}"
            )));
        }
    };

    let first = results
        .first()
        .ok_or_else(|| WeatherError::city_not_found(format!("No results found for {query}")))?;

    GeocodingMatch::deserialize(first)
        .map(Location::from)
        .map_err(|e| WeatherError::invalid_data(format!("Malformed geocoding result: {e}")))
}

#[async_trait]
impl LocationLookup for LocationResolver {
    #[instrument(skip(self), fields(provider = self.http.service()))]
    async fn resolve(&self, name: &str) -> Result<Location, WeatherError> {
        let query = name.trim();
        if query.is_empty() {
            warn!("Refusing to geocode an empty name");
            return Err(WeatherError::city_not_found("Empty city name provided"));
        }

        debug!("Geocoding location name: {}", query);
        let body = self.http.get_json(self.search_url(query)).await?;
        let location = first_match(&body, query)?;

        info!(
            "Resolved '{}' to {} at ({}, {})",
            query, location, location.latitude, location.longitude
        );

        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::error::ErrorKind;
    use crate::http::build_client;
    use serde_json::json;

    fn resolver() -> LocationResolver {
        let http = ProviderClient::new("Geocoding", build_client(&HttpConfig::default()).unwrap());
        LocationResolver::new(http, "https://geocoding-api.open-meteo.com/v1/search").unwrap()
    }

    #[test]
    fn test_search_url() {
        let url = resolver().search_url("  San Francisco ");
        let query = url.query().unwrap();
        assert!(query.contains("name=San+Francisco"));
        assert!(query.contains("count=1"));
        assert!(query.contains("language=en"));
        assert!(query.contains("format=json"));
    }

    #[test]
    fn test_first_match_copies_coordinates() {
        let body = json!({
            "results": [
                {"name": "Test City", "country": "Test Country", "latitude": 32.0, "longitude": 34.0, "elevation": 12.0},
                {"name": "Other", "country": "Elsewhere", "latitude": 1.0, "longitude": 2.0}
            ]
        });
        let location = first_match(&body, "test").unwrap();
        assert_eq!(location.name, "Test City");
        assert_eq!(location.country, "Test Country");
        assert_eq!(location.latitude, 32.0);
        assert_eq!(location.longitude, 34.0);
    }

    #[test]
    fn test_first_match_without_results() {
        for body in [json!({"results": []}), json!({}), json!({"results": null}), json!([1, 2])] {
            let err = first_match(&body, "Atlantis").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::CityNotFound);
        }
    }

    #[test]
    fn test_first_match_with_malformed_fields() {
        let missing_country = json!({"results": [{"name": "X", "latitude": 1.0, "longitude": 2.0}]});
        let err = first_match(&missing_country, "X").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(err.message().unwrap().contains("country"));

        let wrong_type = json!({"results": [{"name": "X", "country": "Y", "latitude": "north", "longitude": 2.0}]});
        assert_eq!(first_match(&wrong_type, "X").unwrap_err().kind(), ErrorKind::InvalidData);

        let not_a_list = json!({"results": "nope"});
        assert_eq!(first_match(&not_a_list, "X").unwrap_err().kind(), ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_empty_name_is_city_not_found() {
        for name in ["", "   ", "\t\n"] {
            let err = resolver().resolve(name).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::CityNotFound);
        }
    }
}
