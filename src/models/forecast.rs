//! Daily forecast summaries and the query result handed to callers

use super::Location;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Label format used for summary dates, e.g. "December 01"
pub const DATE_LABEL_FORMAT: &str = "%B %d";

/// Round to the nearest integer, ties away from zero.
///
/// Returns `None` for non-finite values or values outside the `i32` range.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn round_half_away(value: f64) -> Option<i32> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round();
    if rounded < f64::from(i32::MIN) || rounded > f64::from(i32::MAX) {
        return None;
    }
    Some(rounded as i32)
}

/// Format a calendar day as a summary label
#[must_use]
pub fn date_label(day: NaiveDate) -> String {
    day.format(DATE_LABEL_FORMAT).to_string()
}

/// Values the provider reports per day in daily mode
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProviderDay {
    /// Sunrise as sent by the provider
    pub sunrise: String,
    /// Sunset as sent by the provider
    pub sunset: String,
    /// Total showers in mm
    pub showers: Option<f64>,
    /// Total snowfall in mm
    pub snowfall: Option<f64>,
    /// Maximum precipitation probability in percent
    pub precipitation_probability: Option<i64>,
}

/// Mode-specific part of a daily summary
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DayDetails {
    /// Pre-aggregated by the provider
    Provider(ProviderDay),
    /// Derived locally from hourly samples
    Aggregated {
        temperature_mean: i32,
        humidity_mean: i32,
    },
}

/// One calendar day of forecast, ready for display
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DailySummary {
    /// Calendar day in the location's timezone
    pub day: NaiveDate,
    /// Display label, e.g. "December 01"
    pub date: String,
    /// Maximum temperature in Celsius, rounded
    pub temperature_max: i32,
    /// Minimum temperature in Celsius, rounded
    pub temperature_min: i32,
    pub details: DayDetails,
}

impl DailySummary {
    #[must_use]
    pub fn new(day: NaiveDate, temperature_max: i32, temperature_min: i32, details: DayDetails) -> Self {
        Self {
            day,
            date: date_label(day),
            temperature_max,
            temperature_min,
            details,
        }
    }
}

/// One hourly (or sub-daily) sample, already in the location's timezone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlySample {
    pub timestamp: NaiveDateTime,
    /// Temperature in Celsius
    pub temperature: f64,
    /// Relative humidity in percent
    pub humidity: f64,
}

/// Resolved location plus its ordered daily summaries
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct QueryResult {
    pub location: Location,
    pub days: Vec<DailySummary>,
}

impl QueryResult {
    #[must_use]
    pub fn new(location: Location, days: Vec<DailySummary>) -> Self {
        Self { location, days }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(25.5, Some(26))]
    #[case(25.49, Some(25))]
    #[case(15.2, Some(15))]
    #[case(-2.5, Some(-3))]
    #[case(-0.4, Some(0))]
    #[case(f64::NAN, None)]
    #[case(f64::INFINITY, None)]
    #[case(1e12, None)]
    fn test_round_half_away(#[case] value: f64, #[case] expected: Option<i32>) {
        assert_eq!(round_half_away(value), expected);
    }

    #[test]
    fn test_date_label() {
        let day = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
        assert_eq!(date_label(day), "December 01");

        let summary = DailySummary::new(
            day,
            26,
            15,
            DayDetails::Aggregated {
                temperature_mean: 20,
                humidity_mean: 60,
            },
        );
        assert_eq!(summary.date, "December 01");
    }
}
