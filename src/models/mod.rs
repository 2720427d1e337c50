//! Data models for the weather lookup pipeline
//!
//! - Location: resolved place and its coordinates
//! - Forecast: daily summaries, hourly samples and the query result

pub mod forecast;
pub mod location;

// Re-export all public types for convenient access
pub use forecast::{DailySummary, DayDetails, HourlySample, ProviderDay, QueryResult};
pub use location::Location;
