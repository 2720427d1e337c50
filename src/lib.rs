//! `CityWeather` - resolve a place name and summarize its weather forecast
//!
//! A query geocodes the name, fetches the forecast for the resolved
//! coordinates and returns one ordered list of daily summaries, or one error
//! from a closed taxonomy that the front end can render.

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod forecast;
pub mod http;
pub mod location_resolver;
pub mod logging;
pub mod models;
pub mod service;
pub mod web;

// Re-export core types for public API
pub use config::WeatherAppConfig;
pub use error::{ErrorKind, UserMessage, WeatherError, user_message, user_message_for_code};
pub use models::{DailySummary, Location, QueryResult};
pub use service::WeatherService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
