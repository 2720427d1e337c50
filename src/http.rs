//! HTTP transport shared by the geocoding and forecast providers
//!
//! Every request goes through a retrying, time-bounded client. Responses are
//! classified into the error taxonomy here so both providers behave the same:
//! transport failures are network errors, 404 means "not found", any other
//! non-200 status is an API error and a 200 body must be JSON.

use crate::config::HttpConfig;
use crate::error::WeatherError;
use anyhow::{Context, Result};
use reqwest::{StatusCode, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const USER_AGENT: &str = concat!("CityWeather/", env!("CARGO_PKG_VERSION"));

/// Build the retrying client used for provider calls
pub fn build_client(config: &HttpConfig) -> Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .user_agent(USER_AGENT)
        .build()
        .with_context(|| "Failed to create HTTP client")?;

    let retry_policy = ExponentialBackoff::builder()
        .retry_bounds(
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
        .build_with_max_retries(config.max_retries);

    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// A named provider endpoint client
#[derive(Clone)]
pub struct ProviderClient {
    client: ClientWithMiddleware,
    service: &'static str,
}

impl ProviderClient {
    /// `service` names the provider in diagnostics, e.g. "Geocoding"
    #[must_use]
    pub fn new(service: &'static str, client: ClientWithMiddleware) -> Self {
        Self { client, service }
    }

    #[must_use]
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// GET `url` and return its JSON body, classifying every failure
    #[instrument(level = "debug", skip(self, url), fields(service = self.service, url = %url))]
    pub async fn get_json(&self, url: Url) -> Result<Value, WeatherError> {
        let start_time = Instant::now();

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!("{} request failed: {}", self.service, e);
            WeatherError::network(format!(
                "Could not connect to {} service: {e}",
                self.service.to_lowercase()
            ))
        })?;

        let status = response.status();
        debug!(
            "{} responded {} in {:.3}s",
            self.service,
            status,
            start_time.elapsed().as_secs_f64()
        );

        match status {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                return Err(WeatherError::city_not_found(format!(
                    "{} service returned 404",
                    self.service
                )));
            }
            other => {
                return Err(WeatherError::api(format!(
                    "{} API error: {}",
                    self.service,
                    other.as_u16()
                )));
            }
        }

        let body = response.text().await.map_err(|e| {
            WeatherError::network(format!("Failed to read {} response: {e}", self.service))
        })?;

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            warn!("{} returned a body that is not JSON: {}", self.service, e);
            WeatherError::invalid_data(format!("Invalid response from {} service: {e}", self.service))
        })?;

        info!(
            "{} request completed in {:.3}s",
            self.service,
            start_time.elapsed().as_secs_f64()
        );

        Ok(value)
    }
}

/// Build a form-encoded query URL (spaces become `+`)
pub fn url_with_params<'a, I>(base: &Url, params: I) -> Url
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut url = base.clone();
    url.query_pairs_mut().extend_pairs(params);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_with_params_encodes_spaces_as_plus() {
        let base = Url::parse("https://geocoding-api.open-meteo.com/v1/search").unwrap();
        let url = url_with_params(&base, [("name", "New York"), ("count", "1")]);
        assert_eq!(
            url.as_str(),
            "https://geocoding-api.open-meteo.com/v1/search?name=New+York&count=1"
        );
    }

    #[test]
    fn test_build_client_with_defaults() {
        let client = build_client(&HttpConfig::default());
        assert!(client.is_ok());
        let provider = ProviderClient::new("Weather", client.unwrap());
        assert_eq!(provider.service(), "Weather");
    }
}
