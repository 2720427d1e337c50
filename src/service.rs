//! Weather query orchestration
//!
//! [`WeatherService::get_weather`] is the single entry point: it resolves the
//! name, fetches the forecast for the resolved location and returns one
//! [`QueryResult`] or one [`WeatherError`]. Provider responses are optionally
//! served from a [`ResponseCache`].

use crate::cache::ResponseCache;
use crate::config::WeatherAppConfig;
use crate::error::WeatherError;
use crate::forecast::{DailyForecastClient, ForecastMode, ForecastSource, HourlyForecastClient};
use crate::http::{ProviderClient, build_client};
use crate::location_resolver::{LocationLookup, LocationResolver};
use crate::models::{DailySummary, Location, QueryResult};
use anyhow::Result;
use chrono::Utc;
use futures::FutureExt;
use serde::{Serialize, de::DeserializeOwned};
use std::any::Any;
use std::fmt::Debug;
use std::panic::AssertUnwindSafe;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub struct WeatherService {
    locations: Box<dyn LocationLookup>,
    forecasts: Box<dyn ForecastSource>,
    cache: Option<ResponseCache>,
}

/// Cache key for a geocoding query: trimmed, lower-cased, inner whitespace collapsed
#[must_use]
pub fn geocode_cache_key(name: &str) -> String {
    let normalized = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    format!("geocode:{normalized}")
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl WeatherService {
    pub fn new(locations: Box<dyn LocationLookup>, forecasts: Box<dyn ForecastSource>) -> Self {
        Self {
            locations,
            forecasts,
            cache: None,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Wire the providers, transport and cache described by `config`
    pub fn from_config(config: &WeatherAppConfig) -> Result<Self> {
        let locations = LocationResolver::new(
            ProviderClient::new("Geocoding", build_client(&config.http)?),
            &config.providers.geocoding_url,
        )?;

        let weather = ProviderClient::new("Weather", build_client(&config.http)?);
        let forecasts: Box<dyn ForecastSource> = match config.providers.mode {
            ForecastMode::Daily => Box::new(DailyForecastClient::new(
                weather,
                &config.providers.forecast_url,
            )?),
            ForecastMode::Hourly => Box::new(HourlyForecastClient::new(
                weather,
                &config.providers.forecast_url,
            )?),
        };

        let service = Self::new(Box::new(locations), forecasts);
        if !config.cache.enabled {
            return Ok(service);
        }

        let directory = config.cache.directory();
        match ResponseCache::open(&directory, config.cache.ttl()) {
            Ok(cache) => {
                info!("Response cache opened at {}", directory.display());
                Ok(service.with_cache(cache))
            }
            Err(e) => {
                warn!(
                    "Could not open response cache at {}, continuing without it: {:#}",
                    directory.display(),
                    e
                );
                Ok(service)
            }
        }
    }

    /// Resolve `name` and return its daily forecast summaries
    #[instrument(skip(self), fields(mode = %self.forecasts.mode()))]
    pub async fn get_weather(&self, name: &str) -> Result<QueryResult, WeatherError> {
        if name.trim().is_empty() {
            return Err(WeatherError::city_not_found("Empty city name provided"));
        }

        match AssertUnwindSafe(self.run_query(name)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Weather query for '{}' panicked: {}", name, message);
                Err(WeatherError::server(format!("Unexpected failure: {message}")))
            }
        }
    }

    /// Like [`get_weather`](Self::get_weather), but aborts as soon as `token` is cancelled
    pub async fn get_weather_cancellable(
        &self,
        name: &str,
        token: &CancellationToken,
    ) -> Result<QueryResult, WeatherError> {
        if name.trim().is_empty() {
            return Err(WeatherError::city_not_found("Empty city name provided"));
        }

        tokio::select! {
            biased;
            () = token.cancelled() => {
                info!("Weather query for '{}' cancelled", name);
                Err(WeatherError::network("Request cancelled"))
            }
            result = self.get_weather(name) => result,
        }
    }

    async fn run_query(&self, name: &str) -> Result<QueryResult, WeatherError> {
        let location = self.resolve(name).await?;
        let days = self.daily_summaries(&location).await?;
        info!("Returning {} days for {}", days.len(), location);
        Ok(QueryResult::new(location, days))
    }

    async fn resolve(&self, name: &str) -> Result<Location, WeatherError> {
        let key = geocode_cache_key(name);
        self.cached(&key, || self.locations.resolve(name)).await
    }

    async fn daily_summaries(&self, location: &Location) -> Result<Vec<DailySummary>, WeatherError> {
        let key = location.cache_key(self.forecasts.mode().as_str(), Utc::now().date_naive());
        self.cached(&key, || self.forecasts.daily_summaries(location))
            .await
    }

    /// Serve `key` from the cache, or compute it with `fetch` and store the result.
    ///
    /// Callers racing on one key wait for the first to finish. Errors are
    /// returned but never stored.
    async fn cached<T, F, Fut>(&self, key: &str, fetch: F) -> Result<T, WeatherError>
    where
        T: Serialize + DeserializeOwned + Clone + Debug + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, WeatherError>>,
    {
        let Some(cache) = &self.cache else {
            return fetch().await;
        };

        let _guard = cache.lock(key).await;
        match cache.get::<T>(key).await {
            Ok(Some(value)) => {
                debug!("Cache hit for {}", key);
                return Ok(value);
            }
            Ok(None) => debug!("Cache miss for {}", key),
            Err(e) => warn!("Cache read failed for {}: {:#}", key, e),
        }

        let value = fetch().await?;
        if let Err(e) = cache.put(key, value.clone()).await {
            warn!("Cache write failed for {}: {:#}", key, e);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::DayDetails;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeLookup {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl LocationLookup for FakeLookup {
        async fn resolve(&self, name: &str) -> Result<Location, WeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match name.trim() {
                "Atlantis" => Err(WeatherError::city_not_found("No results found for Atlantis")),
                "Crash" => panic!("lookup exploded"),
                "Slow" => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    unreachable!()
                }
                other => Ok(Location::new(other.to_string(), "Test Country".to_string(), 32.0, 34.0)),
            }
        }
    }

    #[derive(Default)]
    struct FakeForecast {
        calls: Arc<AtomicUsize>,
        fail: Option<ErrorKind>,
    }

    #[async_trait]
    impl ForecastSource for FakeForecast {
        fn mode(&self) -> ForecastMode {
            ForecastMode::Daily
        }

        async fn daily_summaries(&self, _location: &Location) -> Result<Vec<DailySummary>, WeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(kind) = self.fail {
                return Err(WeatherError::new(kind));
            }
            Ok(vec![DailySummary::new(
                NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
                26,
                15,
                DayDetails::Aggregated {
                    temperature_mean: 20,
                    humidity_mean: 60,
                },
            )])
        }
    }

    fn service() -> (WeatherService, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let lookup = FakeLookup::default();
        let forecast = FakeForecast::default();
        let (lookups, forecasts) = (lookup.calls.clone(), forecast.calls.clone());
        (
            WeatherService::new(Box::new(lookup), Box::new(forecast)),
            lookups,
            forecasts,
        )
    }

    #[test]
    fn test_geocode_cache_key_normalizes_names() {
        assert_eq!(geocode_cache_key("  New   York "), "geocode:new york");
        assert_eq!(geocode_cache_key("BERLIN"), "geocode:berlin");
    }

    #[tokio::test]
    async fn test_get_weather_combines_location_and_days() {
        let (service, _, _) = service();
        let result = service.get_weather("Test City").await.unwrap();
        assert_eq!(result.location.name, "Test City");
        assert_eq!(result.days.len(), 1);
        assert_eq!(result.days[0].date, "December 01");
        assert_eq!(result.days[0].temperature_max, 26);
    }

    #[tokio::test]
    async fn test_empty_name_never_reaches_providers() {
        let (service, lookups, forecasts) = service();
        for name in ["", "  ", "\t"] {
            let err = service.get_weather(name).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::CityNotFound);
        }
        assert_eq!(lookups.load(Ordering::SeqCst), 0);
        assert_eq!(forecasts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_skips_forecast() {
        let (service, _, forecasts) = service();
        let err = service.get_weather("Atlantis").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CityNotFound);
        assert_eq!(forecasts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_forecast_error_kind_is_preserved() {
        let forecast = FakeForecast {
            fail: Some(ErrorKind::ApiError),
            ..FakeForecast::default()
        };
        let service = WeatherService::new(Box::new(FakeLookup::default()), Box::new(forecast));
        let err = service.get_weather("Test City").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ApiError);
    }

    #[tokio::test]
    async fn test_panic_becomes_server_error() {
        let (service, _, _) = service();
        let err = service.get_weather("Crash").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServerError);
        assert!(err.message().unwrap().contains("lookup exploded"));
    }

    #[tokio::test]
    async fn test_cancellation_is_network_error() {
        let (service, _, _) = service();
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = service
            .get_weather_cancellable("Slow", &token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkError);
    }

    #[tokio::test]
    async fn test_empty_name_wins_over_cancelled_token() {
        let (service, lookups, _) = service();
        let token = CancellationToken::new();
        token.cancel();

        let err = service.get_weather_cancellable("  ", &token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CityNotFound);
        assert_eq!(lookups.load(Ordering::SeqCst), 0);

        let err = service
            .get_weather_cancellable("Test City", &token)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkError);
    }

    #[tokio::test]
    async fn test_cached_queries_hit_providers_once() {
        let dir = TempDir::new().unwrap();
        let (service, lookups, forecasts) = service();
        let service =
            service.with_cache(ResponseCache::open(dir.path(), Duration::from_secs(600)).unwrap());

        let first = service.get_weather("Test City").await.unwrap();
        let second = service.get_weather("  test   city").await.unwrap();
        assert_eq!(first.days, second.days);
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
        assert_eq!(forecasts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let dir = TempDir::new().unwrap();
        let (service, lookups, _) = service();
        let service =
            service.with_cache(ResponseCache::open(dir.path(), Duration::from_secs(600)).unwrap());

        for _ in 0..2 {
            let err = service.get_weather("Atlantis").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::CityNotFound);
        }
        assert_eq!(lookups.load(Ordering::SeqCst), 2);
    }
}
