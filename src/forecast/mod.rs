//! Forecast retrieval
//!
//! Two provider shapes are supported behind [`ForecastSource`]:
//! - daily: the provider returns one value per day per variable
//! - hourly: the provider returns sub-daily samples that are aggregated locally
//!
//! Both produce the same ordered [`DailySummary`] sequence.

pub mod daily;
pub mod hourly;

use crate::error::{ErrorKind, WeatherError};
use crate::http::{ProviderClient, url_with_params};
use crate::models::{DailySummary, Location};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub use daily::DailyForecastClient;
pub use hourly::HourlyForecastClient;

/// Which response shape the forecast provider is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastMode {
    #[default]
    Daily,
    Hourly,
}

impl ForecastMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ForecastMode::Daily => "daily",
            ForecastMode::Hourly => "hourly",
        }
    }
}

impl fmt::Display for ForecastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider of daily forecast summaries for a location
#[async_trait]
pub trait ForecastSource: Send + Sync {
    fn mode(&self) -> ForecastMode;

    async fn daily_summaries(&self, location: &Location) -> Result<Vec<DailySummary>, WeatherError>;
}

/// Endpoint and transport shared by both forecast clients
#[derive(Clone)]
struct ForecastEndpoint {
    http: ProviderClient,
    base_url: Url,
}

impl ForecastEndpoint {
    fn new(http: ProviderClient, base_url: &str) -> anyhow::Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid forecast URL: {base_url}"))?;
        Ok(Self { http, base_url })
    }

    /// `section` is "daily" or "hourly", `variables` the requested keys
    fn url(&self, location: &Location, section: &str, variables: &[&str]) -> Url {
        let latitude = location.latitude.to_string();
        let longitude = location.longitude.to_string();
        let variables = variables.join(",");
        url_with_params(
            &self.base_url,
            [
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                (section, variables.as_str()),
                ("timezone", "auto"),
            ],
        )
    }

    /// Fetch the raw payload, which must be a JSON object
    async fn fetch(&self, url: Url) -> Result<Value, WeatherError> {
        let payload = self.http.get_json(url).await?;
        if !payload.is_object() {
            return Err(WeatherError::invalid_data(
                "Forecast response is not a JSON object",
            ));
        }
        Ok(payload)
    }
}

/// Look up a keyed section (e.g. `daily`) of a forecast payload
fn section<'a>(
    payload: &'a Value,
    name: &str,
) -> Result<&'a serde_json::Map<String, Value>, WeatherError> {
    payload
        .get(name)
        .ok_or_else(|| WeatherError::invalid_data(format!("Missing '{name}' section in forecast response")))?
        .as_object()
        .ok_or_else(|| WeatherError::invalid_data(format!("'{name}' section is not an object")))
}

/// Look up a column of a section; every column must be an array as long as `time`
fn column<'a>(
    section: &'a serde_json::Map<String, Value>,
    section_name: &str,
    key: &str,
    expected_len: Option<usize>,
) -> Result<&'a [Value], WeatherError> {
    let values = section
        .get(key)
        .ok_or_else(|| WeatherError::invalid_data(format!("Missing key in {section_name} data: {key}")))?
        .as_array()
        .ok_or_else(|| WeatherError::invalid_data(format!("'{key}' in {section_name} data is not a list")))?;

    if let Some(expected) = expected_len
        && values.len() != expected
    {
        return Err(WeatherError::invalid_data(format!(
            "Length mismatch for '{key}': expected {expected} values, found {}",
            values.len()
        )));
    }

    Ok(values)
}

/// Shape failures from parsing or aggregation are invalid data
fn shape_error(err: anyhow::Error) -> WeatherError {
    WeatherError::classify(err, ErrorKind::InvalidData)
}
