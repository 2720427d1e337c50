//! Daily mode: the provider aggregates each day itself

use super::{ForecastEndpoint, ForecastMode, ForecastSource, column, section, shape_error};
use crate::error::WeatherError;
use crate::http::ProviderClient;
use crate::models::forecast::round_half_away;
use crate::models::{DailySummary, DayDetails, Location, ProviderDay};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info, instrument};

/// Variables requested per day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyVariable {
    TemperatureMax,
    TemperatureMin,
    Sunrise,
    Sunset,
    Showers,
    Snowfall,
    PrecipitationProbability,
}

impl DailyVariable {
    pub const ALL: [DailyVariable; 7] = [
        DailyVariable::TemperatureMax,
        DailyVariable::TemperatureMin,
        DailyVariable::Sunrise,
        DailyVariable::Sunset,
        DailyVariable::Showers,
        DailyVariable::Snowfall,
        DailyVariable::PrecipitationProbability,
    ];

    /// Provider key for this variable
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            DailyVariable::TemperatureMax => "temperature_2m_max",
            DailyVariable::TemperatureMin => "temperature_2m_min",
            DailyVariable::Sunrise => "sunrise",
            DailyVariable::Sunset => "sunset",
            DailyVariable::Showers => "showers_sum",
            DailyVariable::Snowfall => "snowfall_sum",
            DailyVariable::PrecipitationProbability => "precipitation_probability_max",
        }
    }

    fn keys() -> Vec<&'static str> {
        Self::ALL.iter().map(|v| v.key()).collect()
    }
}

/// Forecast client for the provider's pre-aggregated daily mode
#[derive(Clone)]
pub struct DailyForecastClient {
    endpoint: ForecastEndpoint,
}

impl DailyForecastClient {
    pub fn new(http: ProviderClient, base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            endpoint: ForecastEndpoint::new(http, base_url)?,
        })
    }

    #[must_use]
    pub fn forecast_url(&self, location: &Location) -> Url {
        self.endpoint
            .url(location, "daily", &DailyVariable::keys())
    }

    /// Retrieve the raw provider payload for `location`
    #[instrument(skip(self), fields(location = %location.name))]
    pub async fn fetch(&self, location: &Location) -> Result<Value, WeatherError> {
        debug!(
            "Fetching daily forecast for {}",
            location.format_coordinates()
        );
        self.endpoint.fetch(self.forecast_url(location)).await
    }
}

#[async_trait]
impl ForecastSource for DailyForecastClient {
    fn mode(&self) -> ForecastMode {
        ForecastMode::Daily
    }

    async fn daily_summaries(&self, location: &Location) -> Result<Vec<DailySummary>, WeatherError> {
        let payload = self.fetch(location).await?;
        let days = parse_daily(&payload).map_err(shape_error)?;
        info!("Parsed {} daily summaries for {}", days.len(), location.name);
        Ok(days)
    }
}

/// Columns of the `daily` section, validated once
struct DailyColumns<'a> {
    time: &'a [Value],
    temperature_max: &'a [Value],
    temperature_min: &'a [Value],
    sunrise: &'a [Value],
    sunset: &'a [Value],
    showers: &'a [Value],
    snowfall: &'a [Value],
    precipitation_probability: &'a [Value],
}

impl DailyColumns<'_> {
    fn row(&self, index: usize) -> Result<DailySummary> {
        let day = parse_day(cell(self.time, index, "time")?)?;

        let temperature_max = rounded(cell(self.temperature_max, index, DailyVariable::TemperatureMax.key())?)
            .context(DailyVariable::TemperatureMax.key())?;
        let temperature_min = rounded(cell(self.temperature_min, index, DailyVariable::TemperatureMin.key())?)
            .context(DailyVariable::TemperatureMin.key())?;

        let details = ProviderDay {
            sunrise: text(cell(self.sunrise, index, DailyVariable::Sunrise.key())?)
                .context(DailyVariable::Sunrise.key())?,
            sunset: text(cell(self.sunset, index, DailyVariable::Sunset.key())?)
                .context(DailyVariable::Sunset.key())?,
            showers: optional_number(cell(self.showers, index, DailyVariable::Showers.key())?)
                .context(DailyVariable::Showers.key())?,
            snowfall: optional_number(cell(self.snowfall, index, DailyVariable::Snowfall.key())?)
                .context(DailyVariable::Snowfall.key())?,
            precipitation_probability: optional_percent(cell(
                self.precipitation_probability,
                index,
                DailyVariable::PrecipitationProbability.key(),
            )?)
            .context(DailyVariable::PrecipitationProbability.key())?,
        };

        Ok(DailySummary::new(
            day,
            temperature_max,
            temperature_min,
            DayDetails::Provider(details),
        ))
    }
}

/// Turn a daily-mode payload into one summary per `time` entry.
///
/// `time` must be strictly ascending; entry `i` of the result is `time[i]`.
pub fn parse_daily(payload: &Value) -> Result<Vec<DailySummary>> {
    let daily = section(payload, "daily")?;
    let time = column(daily, "daily", "time", None)?;
    let len = Some(time.len());
    let get = |variable: DailyVariable| column(daily, "daily", variable.key(), len);

    let columns = DailyColumns {
        time,
        temperature_max: get(DailyVariable::TemperatureMax)?,
        temperature_min: get(DailyVariable::TemperatureMin)?,
        sunrise: get(DailyVariable::Sunrise)?,
        sunset: get(DailyVariable::Sunset)?,
        showers: get(DailyVariable::Showers)?,
        snowfall: get(DailyVariable::Snowfall)?,
        precipitation_probability: get(DailyVariable::PrecipitationProbability)?,
    };

    let mut days: Vec<DailySummary> = Vec::with_capacity(time.len());
    for index in 0..time.len() {
        let summary = columns
            .row(index)
            .with_context(|| format!("Malformed daily forecast entry at index {index}"))?;
        // one entry per day, ascending
        if let Some(previous) = days.last()
            && summary.day <= previous.day
        {
            bail!(
                "Daily forecast entry at index {index} ({}) does not follow {}",
                summary.day,
                previous.day
            );
        }
        days.push(summary);
    }

    Ok(days)
}

fn cell<'a>(values: &'a [Value], index: usize, key: &str) -> Result<&'a Value> {
    values
        .get(index)
        .ok_or_else(|| anyhow!("index {index} out of range for '{key}'"))
}

fn parse_day(value: &Value) -> Result<NaiveDate> {
    let raw = value
        .as_str()
        .ok_or_else(|| anyhow!("time value {value} is not a string"))?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("invalid date '{raw}'"))
}

fn rounded(value: &Value) -> Result<i32> {
    let number = value
        .as_f64()
        .ok_or_else(|| anyhow!("expected a number, found {value}"))?;
    round_half_away(number).ok_or_else(|| anyhow!("{number} cannot be rounded to an integer"))
}

fn text(value: &Value) -> Result<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("expected a string, found {value}"))
}

fn optional_number(value: &Value) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        other => other
            .as_f64()
            .map(Some)
            .ok_or_else(|| anyhow!("expected a number, found {other}")),
    }
}

fn optional_percent(value: &Value) -> Result<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        other => match other.as_i64() {
            Some(percent) => Ok(Some(percent)),
            None => rounded(other).map(|percent| Some(i64::from(percent))),
        },
    }
}
