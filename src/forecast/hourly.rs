//! Hourly mode: raw samples from the provider, aggregated into days locally

use super::{ForecastEndpoint, ForecastMode, ForecastSource, column, section, shape_error};
use crate::aggregate::aggregate;
use crate::error::WeatherError;
use crate::http::ProviderClient;
use crate::models::{DailySummary, HourlySample, Location};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info, instrument};

pub const TEMPERATURE_KEY: &str = "temperature_2m";
pub const HUMIDITY_KEY: &str = "relative_humidity_2m";

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Forecast client for providers that only expose sub-daily values
#[derive(Clone)]
pub struct HourlyForecastClient {
    endpoint: ForecastEndpoint,
}

impl HourlyForecastClient {
    pub fn new(http: ProviderClient, base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            endpoint: ForecastEndpoint::new(http, base_url)?,
        })
    }

    #[must_use]
    pub fn forecast_url(&self, location: &Location) -> Url {
        self.endpoint
            .url(location, "hourly", &[TEMPERATURE_KEY, HUMIDITY_KEY])
    }

    /// Retrieve the raw provider payload for `location`
    #[instrument(skip(self), fields(location = %location.name))]
    pub async fn fetch(&self, location: &Location) -> Result<Value, WeatherError> {
        debug!(
            "Fetching hourly forecast for {}",
            location.format_coordinates()
        );
        self.endpoint.fetch(self.forecast_url(location)).await
    }
}

#[async_trait]
impl ForecastSource for HourlyForecastClient {
    fn mode(&self) -> ForecastMode {
        ForecastMode::Hourly
    }

    async fn daily_summaries(&self, location: &Location) -> Result<Vec<DailySummary>, WeatherError> {
        let payload = self.fetch(location).await?;
        let samples = parse_hourly(&payload).map_err(shape_error)?;
        let days = aggregate(&samples).map_err(shape_error)?;
        info!(
            "Aggregated {} samples into {} days for {}",
            samples.len(),
            days.len(),
            location.name
        );
        Ok(days)
    }
}

/// Turn an hourly-mode payload into samples.
///
/// Samples with a `null` temperature or humidity are gaps and are skipped.
pub fn parse_hourly(payload: &Value) -> Result<Vec<HourlySample>> {
    let hourly = section(payload, "hourly")?;
    let time = column(hourly, "hourly", "time", None)?;
    let temperature = column(hourly, "hourly", TEMPERATURE_KEY, Some(time.len()))?;
    let humidity = column(hourly, "hourly", HUMIDITY_KEY, Some(time.len()))?;

    let mut samples = Vec::with_capacity(time.len());
    for (index, ((time, temperature), humidity)) in
        time.iter().zip(temperature).zip(humidity).enumerate()
    {
        if temperature.is_null() || humidity.is_null() {
            debug!("Skipping hourly sample {} with missing values", index);
            continue;
        }

        let sample = sample(time, temperature, humidity)
            .with_context(|| format!("Malformed hourly sample at index {index}"))?;
        samples.push(sample);
    }

    Ok(samples)
}

fn sample(time: &Value, temperature: &Value, humidity: &Value) -> Result<HourlySample> {
    let raw = time
        .as_str()
        .ok_or_else(|| anyhow!("time value {time} is not a string"))?;
    let timestamp = TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| anyhow!("invalid timestamp '{raw}'"))?;

    Ok(HourlySample {
        timestamp,
        temperature: temperature
            .as_f64()
            .ok_or_else(|| anyhow!("{TEMPERATURE_KEY}: expected a number, found {temperature}"))?,
        humidity: humidity
            .as_f64()
            .ok_or_else(|| anyhow!("{HUMIDITY_KEY}: expected a number, found {humidity}"))?,
    })
}
