use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::VERSION;
use crate::config::ServerConfig;
use crate::error::{ErrorKind, WeatherError};
use crate::models::QueryResult;
use crate::service::WeatherService;

#[derive(Deserialize)]
pub struct WeatherQuery {
    pub city: Option<String>,
}

/// Error payload rendered for the front end
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub heading: String,
    pub message: String,
}

#[must_use]
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::CityNotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidData | ErrorKind::ApiError => StatusCode::BAD_GATEWAY,
        ErrorKind::NetworkError => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for WeatherError {
    fn into_response(self) -> Response {
        let user_message = self.user_message();
        let body = ErrorBody {
            kind: self.kind(),
            heading: user_message.heading.to_string(),
            message: user_message.message.to_string(),
        };
        (status_for(self.kind()), Json(body)).into_response()
    }
}

async fn weather(
    State(service): State<Arc<WeatherService>>,
    Query(query): Query<WeatherQuery>,
) -> Result<Json<QueryResult>, WeatherError> {
    let city = query.city.unwrap_or_default();
    let result = service.get_weather(&city).await.inspect_err(|e| {
        tracing::error!(kind = %e.kind(), "Weather query for '{}' failed: {}", city, e);
    })?;
    Ok(Json(result))
}

/// Liveness payload for container health checks
#[derive(Serialize, Deserialize, Debug)]
pub struct HealthBody {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: VERSION.to_string(),
    })
}

pub fn router(service: Arc<WeatherService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/weather", get(weather))
        .route("/health", get(health))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run(service: Arc<WeatherService>, config: &ServerConfig) -> Result<()> {
    let addr = config.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Web server running at http://{}", addr);

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
        .with_context(|| "Web server failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{ForecastMode, ForecastSource};
    use crate::location_resolver::LocationLookup;
    use crate::models::{DailySummary, DayDetails, Location};
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use chrono::NaiveDate;
    use rstest::rstest;
    use tower::ServiceExt;

    struct Lookup;

    #[async_trait]
    impl LocationLookup for Lookup {
        async fn resolve(&self, name: &str) -> Result<Location, WeatherError> {
            match name {
                "Offline" => Err(WeatherError::network("connection refused")),
                "Broken" => Err(WeatherError::api("Weather API error: 500")),
                "Nowhere" => Err(WeatherError::city_not_found("No results found for Nowhere")),
                other => Ok(Location::new(other.to_string(), "Test Country".to_string(), 32.0, 34.0)),
            }
        }
    }

    struct Forecast;

    #[async_trait]
    impl ForecastSource for Forecast {
        fn mode(&self) -> ForecastMode {
            ForecastMode::Daily
        }

        async fn daily_summaries(&self, _location: &Location) -> Result<Vec<DailySummary>, WeatherError> {
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

    fn app() -> Router {
        router(Arc::new(WeatherService::new(Box::new(Lookup), Box::new(Forecast))))
    }

    async fn get(uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_health() {
        let before = Utc::now();
        let (status, body) = get("/health").await;
        assert_eq!(status, StatusCode::OK);
        let health: HealthBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.version, VERSION);
        assert!(health.timestamp >= before);
    }

    #[tokio::test]
    async fn test_weather_returns_query_result() {
        let (status, body) = get("/api/weather?city=Test%20City").await;
        assert_eq!(status, StatusCode::OK);
        let result: QueryResult = serde_json::from_slice(&body).unwrap();
        assert_eq!(result.location.name, "Test City");
        assert_eq!(result.days[0].date, "December 01");
    }

    #[rstest]
    #[case("/api/weather?city=Nowhere", StatusCode::NOT_FOUND, ErrorKind::CityNotFound)]
    #[case("/api/weather?city=Offline", StatusCode::SERVICE_UNAVAILABLE, ErrorKind::NetworkError)]
    #[case("/api/weather?city=Broken", StatusCode::BAD_GATEWAY, ErrorKind::ApiError)]
    #[case("/api/weather", StatusCode::NOT_FOUND, ErrorKind::CityNotFound)]
    #[tokio::test]
    async fn test_weather_errors(
        #[case] uri: &str,
        #[case] expected_status: StatusCode,
        #[case] expected_kind: ErrorKind,
    ) {
        let (status, body) = get(uri).await;
        assert_eq!(status, expected_status);
        let error: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.kind, expected_kind);
        assert_eq!(error.heading, crate::error::user_message(expected_kind).heading);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::InvalidData), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::ServerError), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
