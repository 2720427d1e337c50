//! Aggregation of sub-daily samples into daily summaries
//!
//! Samples are bucketed by the calendar date of their timestamp. Timestamps are
//! already in the location's timezone, so no conversion happens here. Only days
//! that have at least one sample are emitted, in ascending order.

use crate::error::WeatherError;
use crate::models::forecast::round_half_away;
use crate::models::{DailySummary, DayDetails, HourlySample};
use anyhow::{Result, anyhow, bail};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Running totals for one calendar day
struct DayBucket {
    count: u32,
    temperature_sum: f64,
    humidity_sum: f64,
    temperature_max: f64,
    temperature_min: f64,
}

impl Default for DayBucket {
    fn default() -> Self {
        Self {
            count: 0,
            temperature_sum: 0.0,
            humidity_sum: 0.0,
            temperature_max: f64::NEG_INFINITY,
            temperature_min: f64::INFINITY,
        }
    }
}

impl DayBucket {
    fn add(&mut self, sample: &HourlySample) {
        self.count += 1;
        self.temperature_sum += sample.temperature;
        self.humidity_sum += sample.humidity;
        self.temperature_max = self.temperature_max.max(sample.temperature);
        self.temperature_min = self.temperature_min.min(sample.temperature);
    }

    fn summarize(&self, day: NaiveDate) -> Result<DailySummary> {
        let count = f64::from(self.count);
        let round = |value: f64, field: &str| {
            round_half_away(value).ok_or_else(|| anyhow!("{field} for {day} is not representable: {value}"))
        };

        Ok(DailySummary::new(
            day,
            round(self.temperature_max, "maximum temperature")?,
            round(self.temperature_min, "minimum temperature")?,
            DayDetails::Aggregated {
                temperature_mean: round(self.temperature_sum / count, "mean temperature")?,
                humidity_mean: round(self.humidity_sum / count, "mean humidity")?,
            },
        ))
    }
}

/// Collapse samples into one summary per calendar day, ascending by date
pub fn aggregate(samples: &[HourlySample]) -> Result<Vec<DailySummary>> {
    let mut buckets: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();

    for sample in samples {
        if !sample.temperature.is_finite() || !sample.humidity.is_finite() {
            bail!(WeatherError::invalid_data(format!(
                "Non-finite sample at {}",
                sample.timestamp
            )));
        }
        buckets
            .entry(sample.timestamp.date())
            .or_default()
            .add(sample);
    }

    buckets
        .iter()
        .map(|(day, bucket)| bucket.summarize(*day))
        .collect()
}
